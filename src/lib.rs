//! Protocol engine for a chain of TI bq76pl536 battery-monitor ICs sharing
//! one SPI bus.
//!
//! The bq76pl536 is a stackable monitor: devices are daisy-chained and
//! addressed over a single bus, with every frame protected by a CRC-8.
//! This crate implements the chain side of that protocol:
//!
//! * [`Frame`]: wire frame encoding and response decoding with CRC-8,
//! * [`Bus`] / [`Transfer`]: the batched transaction transport,
//! * chain discovery, assigning contiguous addresses 1..N,
//! * the cell census, probing which of the six voltage taps per device
//!   actually have a cell wired up,
//! * telemetry acquisition into a single CRC-tailed buffer,
//! * fault/alert acknowledgement and classification.
//!
//! The low-level bus transfer itself is left to the caller: implement
//! [`Bus`] on top of whatever SPI controller is available and hand it to
//! [`Monitor::attach`] (or [`Chain::attach`] for single-threaded use).
//!
//! # Telemetry layout
//!
//! Each poll cycle produces one buffer, all fields a single byte:
//!
//! | field | count | meaning |
//! |---|---|---|
//! | cell count  | 1 | voltage bytes to follow |
//! | voltage     | cell count | 0–5.10 V at 0.02 V/unit |
//! | device count| 1 | device groups to follow |
//! | cell count, temp1, temp2, status, fault, alert, uv, ov | 8 × device count | temperatures are signed °C |
//! | crc         | 1 | CRC-8 over every byte above |
//!
//! The CRC-8 polynomial is x⁸ + x² + x¹ + x⁰ with initial value 0, the
//! same algorithm that protects the wire frames.
//!
//! # Example
//!
//! ```no_run
//! use bq76_chain::{Bus, BusError, Config, Monitor, Transfer};
//!
//! struct Spi; // your platform's SPI controller
//!
//! impl Bus for Spi {
//!     fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError> {
//!         // clock each transfer in order, capturing inbound bytes into `rx`
//!         # let _ = batch;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), bq76_chain::Error> {
//! let monitor = Monitor::new();
//! monitor.attach(Spi, &Config::new(&[4, 4, 4, 3])?)?;
//!
//! let mut buf = [0u8; 128];
//! let len = monitor.read_into(&mut buf)?;
//! # let _ = len;
//! # Ok(()) }
//! ```

use snafu::Snafu;

mod census;
mod chain;
mod discovery;
mod fault;
mod frame;
pub mod regs;
mod telemetry;
mod transport;
mod types;

pub use chain::{CellTap, Chain, Config, Device, Monitor};
pub use fault::{classify_alert, classify_fault, AlertCause, FaultCause};
pub use frame::{Frame, ReadWidth};
pub use telemetry::Telemetry;
pub use transport::{Bus, BusError, Transfer, BATCH_CAPACITY};
pub use types::{addr, Address, CellCount, Target, MAX_DEVICES};

/// Error type for the whole crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The bus primitive reported a non-zero completion status.
    #[snafu(display("bus transfer failed: {source}"))]
    Transport {
        /// Status reported by the bus controller.
        source: BusError,
    },

    /// A queued transaction would have exceeded the transfer batch
    /// capacity. This is a configuration error in the calling code, not a
    /// bus condition; the batch is left untouched.
    #[snafu(display("transaction batch overflow: capacity is {capacity} transfers"))]
    Framing {
        /// Fixed capacity of the transfer batch.
        capacity: usize,
    },

    /// A received frame failed its CRC-8 integrity check. The read
    /// produced no value and is not retried.
    #[snafu(display("response CRC mismatch: computed {computed:#04x}, received {received:#04x}"))]
    Crc {
        /// CRC computed over the received bytes.
        computed: u8,
        /// Trailing CRC byte the device sent.
        received: u8,
    },

    /// The data-ready bit stayed clear for a whole polling window. The
    /// telemetry aggregator turns this into an empty result; the next
    /// poll cycle starts over.
    #[snafu(display("conversion not ready after {attempts} polling attempts"))]
    ConversionTimeout {
        /// Number of status reads that came back without the bit set.
        attempts: u32,
    },

    /// The value is not a valid chain address.
    #[snafu(display("invalid device address"))]
    InvalidAddress,

    /// A configured per-device cell count is outside 3..=6.
    #[snafu(display("cell count {count} is not in 3..=6"))]
    InvalidCellCount {
        /// The rejected count.
        count: u8,
    },

    /// The configured device count is outside 1..=32.
    #[snafu(display("device count {count} is not in 1..=32"))]
    InvalidDeviceCount {
        /// The rejected count.
        count: usize,
    },

    /// A chain is already attached to this monitor.
    #[snafu(display("a chain is already attached"))]
    AlreadyAttached,

    /// No chain is attached to this monitor.
    #[snafu(display("no chain is attached"))]
    NotAttached,
}
