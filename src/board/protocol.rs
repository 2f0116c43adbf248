//! Register protocol driver for the I/O expansion board.
//!
//! The board speaks a bit-addressed vendor protocol over fixed-size reports:
//! a 14-byte request selects a command, a register address and a bit index,
//! and the reply carries the result in byte offset 1. Only two commands
//! exist, single-bit get and single-bit set. The driver is stateless: it
//! frames requests, performs one bounded write/read round-trip on an
//! already-open transport, and parses the reply. Retries are the caller's
//! decision.

use std::time::Duration;
use thiserror::Error;

use crate::transport::{Transport, TransportError};

/// Read one register bit.
pub const CMD_GET_REG_BIT: u8 = 0x9a;
/// Write one register bit.
pub const CMD_SET_REG_BIT: u8 = 0x9b;

/// Analog-select register block, one register per port. 0 = digital.
pub const REG_ANSEL: u8 = 0x5b;
/// Input-latch register block, one register per port.
pub const REG_PORT: u8 = 0x80;
/// Weak pull-up enable bits for port B.
pub const REG_WPU_B: u8 = 0x85;
/// Data-direction register block, one register per port. 1 = input.
pub const REG_TRIS: u8 = 0x92;
/// Interrupt control register; bit 7 low enables port-B pull-ups globally.
pub const REG_INT_CON2: u8 = 0xf1;

/// Request frames are fixed length; fields beyond the active ones are zero.
pub const FRAME_LEN: usize = 14;

/// Bound on each direction of a round-trip.
const IO_TIMEOUT: Duration = Duration::from_millis(100);

/// The device replies with one full report; never read more than this.
const MAX_RESPONSE_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The reply must carry at least the status byte and the result byte.
    #[error("short response from device ({len} bytes)")]
    ShortResponse { len: usize },
}

/// Write a single register bit. Returns the byte echoed by the device.
pub async fn set_reg_bit<T: Transport>(
    dev: &mut T,
    reg: u8,
    bit: u8,
    value: u8,
) -> Result<u8, ProtocolError> {
    round_trip(dev, request_frame(CMD_SET_REG_BIT, reg, bit, value)).await
}

/// Read a single register bit. Returns the raw result byte.
pub async fn get_reg_bit<T: Transport>(dev: &mut T, reg: u8, bit: u8) -> Result<u8, ProtocolError> {
    round_trip(dev, request_frame(CMD_GET_REG_BIT, reg, bit, 0)).await
}

fn request_frame(cmd: u8, reg: u8, bit: u8, value: u8) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = cmd;
    frame[10] = reg;
    frame[11] = bit;
    frame[12] = value;
    frame
}

async fn round_trip<T: Transport>(
    dev: &mut T,
    frame: [u8; FRAME_LEN],
) -> Result<u8, ProtocolError> {
    dev.write(&frame, IO_TIMEOUT).await?;

    let response = dev.read(MAX_RESPONSE_LEN, IO_TIMEOUT).await?;
    if response.len() < 2 {
        return Err(ProtocolError::ShortResponse {
            len: response.len(),
        });
    }

    Ok(response[1])
}

#[cfg(test)]
mod frame_tests {
    use super::*;
    use crate::transport::mock::MockBoard;

    #[tokio::test]
    async fn get_frame_matches_wire_format() {
        let mut board = MockBoard::default();
        get_reg_bit(&mut board, REG_PORT + 2, 6).await.unwrap();

        assert_frame_eq(
            &board.writes[0],
            &[
                0x9a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x82, 0x06, 0x00,
                0x00,
            ],
        );
    }

    #[tokio::test]
    async fn set_frame_matches_wire_format() {
        let mut board = MockBoard::default();
        set_reg_bit(&mut board, REG_WPU_B, 1, 1).await.unwrap();

        assert_frame_eq(
            &board.writes[0],
            &[
                0x9b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x85, 0x01, 0x01,
                0x00,
            ],
        );
    }

    #[tokio::test]
    async fn clear_frame_has_zero_value_byte() {
        let mut board = MockBoard::default();
        set_reg_bit(&mut board, REG_INT_CON2, 7, 0).await.unwrap();

        assert_frame_eq(
            &board.writes[0],
            &[
                0x9b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf1, 0x07, 0x00,
                0x00,
            ],
        );
    }

    fn assert_frame_eq(actual: &[u8], expect: &[u8]) {
        assert_eq!(
            actual,
            expect,
            "\nFrame mismatch!\nExpected: {}\nActual:   {}",
            as_hex(expect),
            as_hex(actual)
        );
    }

    fn as_hex(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<String>>()
            .join(" ")
    }
}
