//! Error taxonomy for the exporter.
//!
//! Everything here ends a board's run: the variants cover configuration
//! mistakes, device discovery failures, and protocol failures during
//! startup. Poll-time read failures are deliberately absent; the poll loop
//! logs and contains them without ever constructing one of these.

use thiserror::Error;

use crate::board::protocol::ProtocolError;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No board matched the configured bus/device selector (0 = any).
    #[error("ioboard device not found (bus {bus}, device {device})")]
    DeviceNotFound { bus: u8, device: u8 },

    #[error("device open error: {0}")]
    DeviceOpen(#[source] TransportError),

    #[error("pin {name}: invalid port {port:?}")]
    InvalidPort { name: String, port: String },

    #[error("pin {name}: pin {pin} is not present on port {port}")]
    PinNotAllowed { name: String, port: String, pin: u8 },

    #[error("pin {name}: pull-up is not allowed on port {port}")]
    PullUpNotAllowed { name: String, port: String },

    /// A register write failed while programming a pin at startup.
    #[error("pin {name}: {step}: {source}")]
    PinSetup {
        name: String,
        step: &'static str,
        source: ProtocolError,
    },

    #[error("pin {name}: metric registration failed: {source}")]
    Metric {
        name: String,
        source: prometheus::Error,
    },

    #[error("metrics server error: {0}")]
    Server(#[from] hyper::Error),

    #[error("signal handler error: {0}")]
    Signal(#[source] std::io::Error),
}
