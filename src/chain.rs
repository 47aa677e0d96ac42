//! The owned chain context: pack configuration, the attach/detach
//! lifecycle and the concurrency gates in front of it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};
use snafu::{ensure, OptionExt};

use crate::census;
use crate::discovery;
use crate::fault;
use crate::regs;
use crate::telemetry::{self, Telemetry};
use crate::transport::{Bus, Transport};
use crate::types::{Address, CellCount, Target, MAX_DEVICES};
use crate::{AlreadyAttachedSnafu, Error, InvalidDeviceCountSnafu, NotAttachedSnafu};

/// Pack definition consumed at attach: how many devices the chain should
/// hold and how many cells each is expected to carry.
///
/// Validation happens here, before anything touches the bus. What is
/// actually discovered on the bus wins over this description; the only
/// effect of a wrong definition is a logged mismatch.
#[derive(Debug, Clone)]
pub struct Config {
    cells_per_device: Vec<CellCount>,
}

impl Config {
    /// One entry per expected device, in chain order.
    ///
    /// # Errors
    /// Refuses empty definitions, more than 32 devices, and any cell
    /// count outside 3..=6.
    pub fn new(cells_per_device: &[u8]) -> Result<Self, Error> {
        ensure!(
            (1..=MAX_DEVICES).contains(&cells_per_device.len()),
            InvalidDeviceCountSnafu {
                count: cells_per_device.len()
            }
        );
        let cells_per_device = cells_per_device
            .iter()
            .map(|&count| CellCount::new(count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { cells_per_device })
    }

    pub fn device_count(&self) -> u8 {
        self.cells_per_device.len() as u8
    }

    pub(crate) fn expected_cells(&self, index: usize) -> u8 {
        self.cells_per_device
            .get(index)
            .map_or(0, |count| count.get())
    }
}

/// One addressed monitor in the chain, with the last observed snapshot of
/// its status registers.
#[derive(Debug, Clone)]
pub struct Device {
    address: Address,
    cells: u8,
    status: u8,
    fault: u8,
    alert: u8,
    uv_fault: u8,
    ov_fault: u8,
}

impl Device {
    pub(crate) fn new(address: Address, cells: u8) -> Self {
        Self {
            address,
            cells,
            status: 0,
            fault: 0,
            alert: 0,
            uv_fault: 0,
            ov_fault: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Cell count for this device: the configured expectation until the
    /// census replaces it with what is actually wired up.
    pub fn cells(&self) -> u8 {
        self.cells
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn fault(&self) -> u8 {
        self.fault
    }

    pub fn alert(&self) -> u8 {
        self.alert
    }

    pub fn uv_fault(&self) -> u8 {
        self.uv_fault
    }

    pub fn ov_fault(&self) -> u8 {
        self.ov_fault
    }

    pub(crate) fn set_cells(&mut self, cells: u8) {
        self.cells = cells;
    }

    pub(crate) fn set_status(&mut self, status: u8) {
        self.status = status;
    }

    pub(crate) fn update_snapshot(
        &mut self,
        status: u8,
        fault: u8,
        alert: u8,
        uv_fault: u8,
        ov_fault: u8,
    ) {
        self.status = status;
        self.fault = fault;
        self.alert = alert;
        self.uv_fault = uv_fault;
        self.ov_fault = ov_fault;
    }
}

/// One populated cell-voltage input, identified by device address and
/// voltage register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CellTap {
    device: Address,
    register: u8,
}

impl CellTap {
    pub(crate) fn new(device: Address, register: u8) -> Self {
        Self { device, register }
    }

    pub fn device(&self) -> Address {
        self.device
    }

    pub fn register(&self) -> u8 {
        self.register
    }
}

/// The chain context: transport, device list and cell-tap table, owned
/// exclusively. Built by [`Chain::attach`], torn down by dropping it or
/// via [`Chain::into_bus`].
#[derive(Debug)]
pub struct Chain<B: Bus> {
    transport: Transport<B>,
    devices: Vec<Device>,
    taps: Vec<CellTap>,
}

impl<B: Bus> Chain<B> {
    /// Bring the chain up: assign addresses, broadcast the default
    /// configuration, sweep device status and take the cell census.
    ///
    /// Finding fewer devices than configured is not an error; the
    /// discovered topology is adopted and the mismatch logged.
    pub fn attach(bus: B, config: &Config) -> Result<Self, Error> {
        let mut transport = Transport::new(bus);

        let count = discovery::discover(&mut transport, config.device_count())?;
        if count == config.device_count() {
            info!("found {count} devices");
        } else {
            warn!("expected {} devices, found {}", config.device_count(), count);
        }

        let mut devices = Vec::with_capacity(usize::from(count));
        for n in 1..=count {
            let address = Address::new(n)?;
            devices.push(Device::new(
                address,
                config.expected_cells(usize::from(n) - 1),
            ));
        }

        write_defaults(&mut transport)?;

        for dev in devices.iter_mut() {
            let status = fault::check_device_status(&mut transport, dev.address())?;
            dev.set_status(status);
        }

        let taps = census::census(&mut transport, &mut devices)?;

        Ok(Self {
            transport,
            devices,
            taps,
        })
    }

    /// Run one telemetry poll cycle. An empty result means the cycle was
    /// abandoned (conversion never became ready) and should be retried.
    pub fn poll(&mut self) -> Result<Telemetry, Error> {
        telemetry::acquire(&mut self.transport, &mut self.devices, &self.taps)
    }

    /// Devices in address order, addresses 1..N.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Populated cell taps in (device, register) order.
    pub fn cell_taps(&self) -> &[CellTap] {
        &self.taps
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn total_cells(&self) -> usize {
        self.taps.len()
    }

    /// Smallest caller buffer that holds a full, untruncated telemetry
    /// frame from this chain.
    pub fn buffer_capacity(&self) -> usize {
        // cell count + voltages + device count + 8 bytes per device + crc
        2 + self.taps.len() + self.devices.len() * 8 + 1
    }

    /// Tear the context down, handing the bus primitive back.
    pub fn into_bus(self) -> B {
        self.transport.into_bus()
    }
}

/// Broadcast the power-on defaults to every device: all six cell inputs
/// and both temperature sensors enabled, thermistors connected, the
/// protection setpoints written, and a first conversion started so the
/// census has voltages to look at.
fn write_defaults<B: Bus>(tr: &mut Transport<B>) -> Result<(), Error> {
    tr.begin();
    tr.queue_write(
        Target::Broadcast,
        regs::ADC_CONTROL,
        regs::AC_CELL_SEL_6 | regs::AC_TS1 | regs::AC_TS2,
    )?;
    tr.queue_write(Target::Broadcast, regs::IO_CONTROL, regs::IO_TS1 | regs::IO_TS2)?;
    tr.queue_write(Target::Broadcast, regs::SHDW_CTRL, regs::SC_ENABLE)?;
    tr.queue_write(Target::Broadcast, regs::ADC_CONVERT, regs::AC_CONV)?;

    // Group-3 registers need the shadow-control unlock before every write.
    tr.queue_write(Target::Broadcast, regs::SHDW_CTRL, regs::SC_ENABLE)?;
    tr.queue_write(Target::Broadcast, regs::CONFIG_COV, regs::COV_350)?;
    tr.queue_write(Target::Broadcast, regs::SHDW_CTRL, regs::SC_ENABLE)?;
    tr.queue_write(Target::Broadcast, regs::CONFIG_CUV, regs::CUV_300)?;
    tr.queue_write(Target::Broadcast, regs::SHDW_CTRL, regs::SC_ENABLE)?;
    tr.queue_write(Target::Broadcast, regs::CONFIG_COVT, regs::CC_USMS | 1)?;
    tr.flush()
}

/// Thread-safe front for a chain, gating attach/detach and consumer
/// telemetry reads behind two coarse permits.
///
/// Attach/detach and telemetry never interleave; a second concurrent
/// read blocks until the first releases its permit. No operation
/// supports cancellation.
#[derive(Debug)]
pub struct Monitor<B: Bus> {
    chain: Mutex<Option<Chain<B>>>,
    read_permit: Mutex<()>,
}

impl<B: Bus> Default for Monitor<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bus> Monitor<B> {
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(None),
            read_permit: Mutex::new(()),
        }
    }

    /// Discover and initialize the chain on `bus`. Fails without touching
    /// the bus if a chain is already attached.
    pub fn attach(&self, bus: B, config: &Config) -> Result<(), Error> {
        let mut guard = lock(&self.chain);
        ensure!(guard.is_none(), AlreadyAttachedSnafu);
        *guard = Some(Chain::attach(bus, config)?);
        Ok(())
    }

    /// Tear the chain down, handing the bus primitive back if one was
    /// attached.
    pub fn detach(&self) -> Option<B> {
        lock(&self.chain).take().map(Chain::into_bus)
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.chain).is_some()
    }

    /// Smallest caller buffer that holds a full telemetry frame.
    pub fn buffer_capacity(&self) -> Result<usize, Error> {
        Ok(lock(&self.chain)
            .as_ref()
            .context(NotAttachedSnafu)?
            .buffer_capacity())
    }

    /// Run one poll cycle and return the whole telemetry frame.
    pub fn poll(&self) -> Result<Telemetry, Error> {
        let _permit = lock(&self.read_permit);
        let mut guard = lock(&self.chain);
        guard.as_mut().context(NotAttachedSnafu)?.poll()
    }

    /// Run one poll cycle and copy the telemetry into `buf`, truncating
    /// if the buffer is smaller than the produced frame. Returns the
    /// number of bytes copied; zero means the cycle was abandoned and
    /// should simply be retried.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let telemetry = self.poll()?;
        let len = telemetry.len().min(buf.len());
        buf[..len].copy_from_slice(&telemetry.as_bytes()[..len]);
        Ok(len)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
