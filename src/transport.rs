//! Batched transaction transport for the chain bus.
//!
//! Writes accumulate in a fixed-capacity batch and only hit the bus when a
//! read is queued or the batch is explicitly flushed; reads execute the
//! whole batch synchronously and block until the bus reports completion.
//! The bus itself is a primitive supplied by the caller via [`Bus`].

use arrayvec::ArrayVec;
use log::trace;
use snafu::{ensure, ResultExt, Snafu};

use crate::frame::{self, Frame, FrameBytes, ReadWidth};
use crate::types::{Address, Target};
use crate::{Error, FramingSnafu, TransportSnafu};

/// Most transfers one batch can hold. Queueing beyond this is a
/// configuration error reported as [`Error::Framing`].
pub const BATCH_CAPACITY: usize = 10;

/// Completion status of a failed bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("bus status {status}"))]
pub struct BusError {
    /// Non-zero status code reported by the bus controller.
    pub status: i32,
}

/// One chip-select-delimited transfer within a batch.
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Outbound frame bytes. For reads only the three request bytes are
    /// meaningful; the device ignores whatever is clocked after them.
    pub tx: FrameBytes,
    /// Inbound capture buffer, zeroed to the full transfer length for
    /// reads and empty for writes. The bus fills it while clocking.
    pub rx: FrameBytes,
    /// Toggle chip select after this transfer, so that every frame is
    /// presented to the chain as a separate transaction.
    pub cs_change: bool,
}

impl Transfer {
    /// Total bytes the bus must clock for this transfer.
    pub fn len(&self) -> usize {
        self.tx.len().max(self.rx.len())
    }

    /// True for transfers that carry no frame at all.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty() && self.rx.is_empty()
    }
}

/// Bus primitive executing one batch of transfers.
///
/// Implementations clock [`Transfer::len`] bytes for each transfer in
/// order, capture inbound bytes into `rx` up to its length, and block
/// until the whole batch has completed. A controller failure is reported
/// as a [`BusError`] carrying the non-zero status.
pub trait Bus {
    fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError>;
}

impl<T: Bus + ?Sized> Bus for &mut T {
    fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError> {
        (**self).transfer(batch)
    }
}

/// The transaction batch in front of a [`Bus`].
#[derive(Debug)]
pub(crate) struct Transport<B> {
    bus: B,
    batch: ArrayVec<Transfer, BATCH_CAPACITY>,
}

impl<B: Bus> Transport<B> {
    pub(crate) fn new(bus: B) -> Self {
        Self {
            bus,
            batch: ArrayVec::new(),
        }
    }

    /// Hand the bus primitive back.
    pub(crate) fn into_bus(self) -> B {
        self.bus
    }

    /// Start a fresh batch. Pending unflushed writes are discarded.
    pub(crate) fn begin(&mut self) {
        self.batch.clear();
    }

    /// Queue one write frame. Nothing touches the bus until the batch is
    /// executed by a read or an explicit [`flush`](Self::flush).
    pub(crate) fn queue_write(&mut self, target: Target, register: u8, data: u8) -> Result<(), Error> {
        ensure!(
            !self.batch.is_full(),
            FramingSnafu {
                capacity: BATCH_CAPACITY
            }
        );
        trace!(
            "write reg({:#04x} {:#04x}) = {:#04x}",
            target.to_byte(),
            register,
            data
        );
        self.batch.push(Transfer {
            tx: Frame::Write {
                target,
                register,
                data,
            }
            .to_bytes(),
            rx: FrameBytes::new(),
            cs_change: true,
        });
        Ok(())
    }

    /// Execute every queued transfer now. The batch is consumed whether
    /// the bus succeeds or not.
    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        let result = self.bus.transfer(&mut self.batch).context(TransportSnafu);
        self.batch.clear();
        result
    }

    /// Read one register byte from an addressed device.
    pub(crate) fn read_u8(&mut self, address: Address, register: u8) -> Result<u8, Error> {
        Ok(self.read(address, register, ReadWidth::Byte)? as u8)
    }

    /// Read a big-endian register pair from an addressed device.
    pub(crate) fn read_u16(&mut self, address: Address, register: u8) -> Result<u16, Error> {
        self.read(address, register, ReadWidth::Word)
    }

    /// Queue a read and run the whole batch, blocking until the bus
    /// completes. The response CRC is checked before any value is
    /// returned.
    fn read(&mut self, address: Address, register: u8, width: ReadWidth) -> Result<u16, Error> {
        ensure!(
            !self.batch.is_full(),
            FramingSnafu {
                capacity: BATCH_CAPACITY
            }
        );
        let request = Frame::Read {
            target: Target::Device(address),
            register,
            width,
        };
        let mut rx = FrameBytes::new();
        for _ in 0..request.wire_len() {
            rx.push(0);
        }
        self.batch.push(Transfer {
            tx: request.to_bytes(),
            rx,
            cs_change: true,
        });

        let value = self
            .bus
            .transfer(&mut self.batch)
            .context(TransportSnafu)
            .and_then(|()| {
                let transfer = &self.batch[self.batch.len() - 1];
                frame::decode_read_response(&transfer.tx, &transfer.rx)
            });
        self.batch.clear();

        if let Ok(value) = &value {
            trace!("read reg({} {:#04x}) = {:#x}", address, register, value);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CRC8;
    use crate::types::addr;
    use crate::Error;

    /// Bus double that answers every read with a fixed register value and
    /// remembers each executed batch.
    struct ScriptedBus {
        value: u16,
        fail_with: Option<i32>,
        batches: Vec<Vec<Transfer>>,
    }

    impl ScriptedBus {
        fn new(value: u16) -> Self {
            Self {
                value,
                fail_with: None,
                batches: Vec::new(),
            }
        }
    }

    impl Bus for ScriptedBus {
        fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError> {
            if let Some(status) = self.fail_with.take() {
                return Err(BusError { status });
            }
            for transfer in batch.iter_mut() {
                if transfer.rx.is_empty() {
                    continue;
                }
                let count = usize::from(transfer.tx[2]);
                if count == 1 {
                    transfer.rx[3] = self.value as u8;
                } else {
                    transfer.rx[3] = (self.value >> 8) as u8;
                    transfer.rx[4] = self.value as u8;
                }
                let mut digest = CRC8.digest();
                digest.update(&transfer.tx[..3]);
                digest.update(&transfer.rx[3..3 + count]);
                transfer.rx[3 + count] = digest.finalize();
            }
            self.batches.push(batch.to_vec());
            Ok(())
        }
    }

    #[test]
    fn writes_accumulate_until_flushed() {
        let mut tr = Transport::new(ScriptedBus::new(0));
        tr.begin();
        tr.queue_write(Target::Broadcast, 0x34, 0x01).unwrap();
        tr.queue_write(Target::Discovery, 0x3B, 0x01).unwrap();
        assert!(tr.bus.batches.is_empty());

        tr.flush().unwrap();
        assert_eq!(tr.bus.batches.len(), 1);
        assert_eq!(tr.bus.batches[0].len(), 2);
        assert!(tr.bus.batches[0].iter().all(|t| t.cs_change));

        // The batch was consumed: flushing again sends nothing new.
        tr.flush().unwrap();
        assert_eq!(tr.bus.batches[1].len(), 0);
    }

    #[test]
    fn read_executes_pending_writes_first() {
        let mut tr = Transport::new(ScriptedBus::new(0x1234));
        tr.begin();
        tr.queue_write(Target::Broadcast, 0x34, 0x01).unwrap();
        let value = tr.read_u16(addr(1), 0x03).unwrap();
        assert_eq!(value, 0x1234);

        let batch = &tr.bus.batches[0];
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].tx[1], 0x34); // the queued write went out first
        assert_eq!(batch[1].tx.as_slice(), &[1 << 1, 0x03, 2]);
        assert_eq!(batch[1].rx.len(), 6);
    }

    #[test]
    fn batch_overflow_is_a_framing_error() {
        let mut tr = Transport::new(ScriptedBus::new(0));
        tr.begin();
        for _ in 0..BATCH_CAPACITY {
            tr.queue_write(Target::Broadcast, 0x34, 0x01).unwrap();
        }
        let err = tr.queue_write(Target::Broadcast, 0x34, 0x01).unwrap_err();
        assert!(matches!(
            err,
            Error::Framing {
                capacity: BATCH_CAPACITY
            }
        ));
        // The batch itself is untouched and still executable.
        tr.flush().unwrap();
        assert_eq!(tr.bus.batches[0].len(), BATCH_CAPACITY);
    }

    #[test]
    fn bus_failure_aborts_the_read() {
        let mut tr = Transport::new(ScriptedBus::new(0x42));
        tr.bus.fail_with = Some(-5);
        tr.begin();
        let err = tr.read_u8(addr(1), 0x00).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                source: BusError { status: -5 }
            }
        ));
        // The failed batch was discarded; the next read starts clean.
        assert_eq!(tr.read_u8(addr(1), 0x00).unwrap(), 0x42);
        assert_eq!(tr.bus.batches[0].len(), 1);
    }
}
