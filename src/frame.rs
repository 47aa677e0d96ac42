//! Wire frames and their CRC-8 integrity check.
//!
//! Every frame opens with the target address shifted left one bit, the low
//! bit carrying the transfer direction (1 = write). A write frame is four
//! bytes ending in a CRC-8 over the first three. A read request is three
//! bytes; the device answers with the payload followed by a CRC-8 computed
//! over the request bytes and the payload together. Multi-byte payloads
//! are big-endian.

use arrayvec::ArrayVec;
use crc::{Crc, CRC_8_SMBUS};
use snafu::ensure;

use crate::types::Target;
use crate::{CrcSnafu, Error};

/// CRC-8, polynomial x⁸ + x² + x¹ + x⁰, initial value 0. Shared by the
/// wire frames and the telemetry buffer trailer.
pub(crate) const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Longest frame on the wire: a two-register read with its response
/// (3 request bytes + 2 payload bytes + CRC).
pub(crate) const FRAME_MAX: usize = 6;

pub(crate) type FrameBytes = ArrayVec<u8, FRAME_MAX>;

const WRITE_BIT: u8 = 0x01;

/// Payload width of a read frame. Registers are one byte; measurement
/// registers pair up into big-endian 16-bit values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadWidth {
    /// A single register byte.
    Byte = 1,
    /// A big-endian register pair.
    Word = 2,
}

impl ReadWidth {
    pub(crate) const fn count(self) -> u8 {
        self as u8
    }
}

/// A logical request frame, before wire encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Register write. The broadcast and discovery targets are write-only.
    Write {
        target: Target,
        register: u8,
        data: u8,
    },
    /// Register read from one addressed device.
    Read {
        target: Target,
        register: u8,
        width: ReadWidth,
    },
}

impl Frame {
    /// Encode the frame for the wire. Writes carry their trailing CRC-8;
    /// reads stop after three bytes and leave the rest of the transfer to
    /// the responding device.
    pub fn to_bytes(&self) -> FrameBytes {
        let mut buf = FrameBytes::new();
        match *self {
            Frame::Write {
                target,
                register,
                data,
            } => {
                buf.push(target.to_byte() << 1 | WRITE_BIT);
                buf.push(register);
                buf.push(data);
                buf.push(CRC8.checksum(&buf));
            }
            Frame::Read {
                target,
                register,
                width,
            } => {
                buf.push(target.to_byte() << 1);
                buf.push(register);
                buf.push(width.count());
            }
        }
        buf
    }

    /// Total bytes clocked on the bus for this frame, response included.
    pub(crate) fn wire_len(&self) -> usize {
        match *self {
            Frame::Write { .. } => 4,
            Frame::Read { width, .. } => 4 + width.count() as usize,
        }
    }
}

/// Check the CRC-8 of a read response and extract the payload value.
///
/// `request` is the three-byte read request; `response` is the full
/// capture of the transfer, three dead bytes while the request was clocked
/// out, then the payload and the CRC. The CRC covers the request bytes
/// followed by the payload.
///
/// # Errors
/// Returns [`Error::Crc`] on a mismatch; no value is produced.
pub(crate) fn decode_read_response(request: &[u8], response: &[u8]) -> Result<u16, Error> {
    debug_assert_eq!(request.len(), 3);
    let count = usize::from(request[2]);
    debug_assert_eq!(response.len(), 3 + count + 1);
    let payload = &response[3..3 + count];
    let received = response[3 + count];

    let mut digest = CRC8.digest();
    digest.update(request);
    digest.update(payload);
    let computed = digest.finalize();
    ensure!(computed == received, CrcSnafu { computed, received });

    Ok(if count == 1 {
        u16::from(payload[0])
    } else {
        u16::from_be_bytes([payload[0], payload[1]])
    })
}
