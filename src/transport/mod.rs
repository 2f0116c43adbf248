//! Device transport layer.
//!
//! The register protocol driver talks to the board through the [`Transport`]
//! trait rather than a concrete USB handle, so the driver, the board
//! initializer and the poll loop can all run against a simulated device in
//! tests. The production implementation lives in [`usb`].

pub mod usb;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("usb transfer failed: {0}")]
    Usb(#[from] rusb::Error),

    #[error("transport task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Raw report-level access to an opened board.
///
/// Implementations own the device for their whole lifetime and release it on
/// drop.
#[async_trait]
pub trait Transport: Send {
    /// Write one request report to the device.
    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Perform a single read of up to `max_len` bytes.
    async fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Bus/address filter for device discovery. Zero matches any.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSelector {
    pub bus: u8,
    pub device: u8,
}

impl DeviceSelector {
    pub fn matches(&self, bus: u8, device: u8) -> bool {
        (self.bus == 0 || self.bus == bus) && (self.device == 0 || self.device == device)
    }
}
