//! Telemetry acquisition: drive one ADC conversion cycle across the chain
//! and aggregate every reading into a single CRC-tailed buffer.

use log::{info, trace, warn};

use crate::chain::{CellTap, Device};
use crate::frame::CRC8;
use crate::regs;
use crate::transport::{Bus, Transport};
use crate::types::{addr, Address, Target};
use crate::{ConversionTimeoutSnafu, Error};

/// How many times the status register is polled for the data-ready bit
/// before the cycle is abandoned.
pub(crate) const DATA_READY_ATTEMPTS: u32 = 6;

/// Aggregated result of one poll cycle.
///
/// See the crate-level documentation for the byte layout. An empty value
/// means the cycle was abandoned (the conversion never became ready, or
/// starting it failed) and should simply be retried next cycle.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    bytes: Vec<u8>,
}

impl Telemetry {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Telemetry {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Squeeze a raw 16-bit cell voltage into one byte, 0-5.10 V at 20 mV
/// per unit. Rounds to nearest and saturates, so a full-scale raw reading
/// cannot wrap. The 6250/327660 ratio is the device's calibration
/// constant; do not simplify it without re-deriving the rounding against
/// the datasheet.
pub(crate) fn scale_voltage(raw: u16) -> u8 {
    let scaled = (u32::from(raw) * 6250 + 327_660 / 2) / 327_660;
    scaled.min(255) as u8
}

/// Convert a raw differential thermistor reading to whole degrees
/// Celsius, clamped to the byte the output layout affords it.
pub(crate) fn scale_temperature(raw: u16) -> i8 {
    let degrees = (i32::from(raw) - 2048) / 120;
    degrees.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// Poll the first device's status register until the data-ready bit comes
/// up. By the time the first device in the chain reports ready, the rest
/// have finished as well.
fn wait_data_ready<B: Bus>(tr: &mut Transport<B>, first: Address) -> Result<(), Error> {
    for attempt in 1..=DATA_READY_ATTEMPTS {
        tr.begin();
        match tr.read_u8(first, regs::DEVICE_STATUS) {
            Ok(status) if status & regs::DRDY != 0 => {
                trace!("data ready, attempt {attempt}");
                return Ok(());
            }
            Ok(status) => trace!("status {status:#04x}, not ready (attempt {attempt})"),
            Err(err @ Error::Framing { .. }) => return Err(err),
            Err(err) => warn!("status poll failed: {err} (attempt {attempt})"),
        }
    }
    ConversionTimeoutSnafu {
        attempts: DATA_READY_ATTEMPTS,
    }
    .fail()
}

/// Run one full poll cycle and aggregate the chain's readings.
///
/// A failure to start the conversion or to see it complete abandons the
/// cycle with an empty result; the caller retries next cycle. Failures
/// while the buffer is being filled are surfaced as errors.
pub(crate) fn acquire<B: Bus>(
    tr: &mut Transport<B>,
    devices: &mut [Device],
    taps: &[CellTap],
) -> Result<Telemetry, Error> {
    // Start the conversion everywhere at once.
    tr.begin();
    tr.queue_write(Target::Broadcast, regs::ADC_CONVERT, regs::AC_CONV)?;
    if let Err(err) = tr.flush() {
        warn!("telemetry: conversion start failed: {err}");
        return Ok(Telemetry::empty());
    }

    let first = devices.first().map(Device::address).unwrap_or(addr(1));
    match wait_data_ready(tr, first) {
        Ok(()) => {}
        Err(err @ Error::Framing { .. }) => return Err(err),
        Err(err) => {
            warn!("telemetry: giving up: {err}");
            return Ok(Telemetry::empty());
        }
    }

    let mut buf = Vec::with_capacity(2 + taps.len() + devices.len() * 8 + 1);

    buf.push(taps.len() as u8);
    for tap in taps {
        tr.begin();
        let raw = tr.read_u16(tap.device(), tap.register())?;
        buf.push(scale_voltage(raw));
    }

    buf.push(devices.len() as u8);
    for dev in devices.iter_mut() {
        buf.push(dev.cells());

        tr.begin();
        let t1 = tr.read_u16(dev.address(), regs::TEMPERATURE1)?;
        buf.push(scale_temperature(t1) as u8);
        tr.begin();
        let t2 = tr.read_u16(dev.address(), regs::TEMPERATURE2)?;
        buf.push(scale_temperature(t2) as u8);

        tr.begin();
        let status = tr.read_u8(dev.address(), regs::DEVICE_STATUS)?;
        let fault = tr.read_u8(dev.address(), regs::FAULT_STATUS)?;
        let alert = tr.read_u8(dev.address(), regs::ALERT_STATUS)?;
        let uv_fault = tr.read_u8(dev.address(), regs::CUV_FAULT)?;
        let ov_fault = tr.read_u8(dev.address(), regs::COV_FAULT)?;
        dev.update_snapshot(status, fault, alert, uv_fault, ov_fault);
        buf.extend_from_slice(&[status, fault, alert, uv_fault, ov_fault]);
    }

    buf.push(CRC8.checksum(&buf));
    info!(
        "telemetry: {} bytes, {} cells, {} devices",
        buf.len(),
        taps.len(),
        devices.len()
    );
    Ok(Telemetry::from_bytes(buf))
}
