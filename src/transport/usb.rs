//! USB transport for the I/O expansion board.
//!
//! The board enumerates as a vendor HID device (Microchip `04d8:003f`) and
//! exchanges fixed-size reports over interrupt endpoints. libusb's calls are
//! blocking, so discovery and per-transfer work run on the blocking pool;
//! each transfer is bounded by the caller's timeout.

use async_trait::async_trait;
use rusb::{Device, DeviceHandle, GlobalContext};
use std::sync::Arc;
use std::time::Duration;

use super::{DeviceSelector, Transport, TransportError};

pub const VENDOR_ID: u16 = 0x04d8;
pub const PRODUCT_ID: u16 = 0x003f;

const EP_OUT: u8 = 0x01;
const EP_IN: u8 = 0x81;
const INTERFACE: u8 = 0;

/// An opened board. Dropping the last handle releases the interface and
/// closes the device.
pub struct UsbIoBoard {
    handle: Arc<DeviceHandle<GlobalContext>>,
    bus: u8,
    address: u8,
}

/// Walk the bus and return the first board matching `selector`, unopened.
///
/// Discovery is a one-shot startup check; callers treat `None` as a
/// configuration error rather than retrying.
pub fn find(selector: &DeviceSelector) -> Result<Option<Device<GlobalContext>>, TransportError> {
    for device in rusb::devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(_) => continue,
        };

        if descriptor.vendor_id() == VENDOR_ID
            && descriptor.product_id() == PRODUCT_ID
            && selector.matches(device.bus_number(), device.address())
        {
            return Ok(Some(device));
        }
    }

    Ok(None)
}

/// Open a discovered board and claim its HID interface.
pub fn open(device: &Device<GlobalContext>) -> Result<UsbIoBoard, TransportError> {
    let handle = device.open()?;
    // The kernel's HID driver holds the interface until detached; auto-detach
    // is not supported on every platform, so a failure here is only fatal if
    // the claim below also fails.
    let _ = handle.set_auto_detach_kernel_driver(true);
    handle.claim_interface(INTERFACE)?;

    Ok(UsbIoBoard {
        handle: Arc::new(handle),
        bus: device.bus_number(),
        address: device.address(),
    })
}

impl UsbIoBoard {
    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

#[async_trait]
impl Transport for UsbIoBoard {
    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let handle = Arc::clone(&self.handle);
        let data = data.to_vec();
        let written =
            tokio::task::spawn_blocking(move || handle.write_interrupt(EP_OUT, &data, timeout))
                .await??;
        Ok(written)
    }

    async fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let handle = Arc::clone(&self.handle);
        let buffer = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, rusb::Error> {
            let mut buffer = vec![0u8; max_len];
            let received = handle.read_interrupt(EP_IN, &mut buffer, timeout)?;
            buffer.truncate(received);
            Ok(buffer)
        })
        .await??;
        Ok(buffer)
    }
}
