//! Fault and alert observation.
//!
//! When a status read shows the fault or alert bit, the corresponding
//! source register is read, acknowledged by writing the value back,
//! cleared with a zero write, and its set bits are named in the log.
//! Observation never changes the outcome of the operation that exposed
//! the condition.

use log::{info, warn};

use crate::regs;
use crate::transport::{Bus, Transport};
use crate::types::Address;
use crate::Error;

/// Individual conditions the fault register can report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultCause {
    /// Internal register consistency check failed.
    InternalConsistency,
    /// The force-fault bit was set.
    Forced,
    /// The device went through a power-on reset.
    PowerOnReset,
    /// The device saw a frame with a bad CRC.
    CrcError,
    /// At least one cell is under the undervoltage setpoint.
    Undervoltage,
    /// At least one cell is over the overvoltage setpoint.
    Overvoltage,
}

/// Individual conditions the alert register can report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlertCause {
    /// No address has been assigned.
    AddressNotSet,
    /// The group-3 protected registers failed their parity check.
    ParityError,
    /// The OTP EPROM registers are not valid.
    EccError,
    /// The force-alert bit was set.
    Forced,
    /// Thermal shutdown.
    ThermalShutdown,
    /// Sleep mode was activated.
    Sleep,
    /// Over temperature on sensor 2.
    OverTemperature2,
    /// Over temperature on sensor 1.
    OverTemperature1,
}

const FAULT_BITS: [(u8, FaultCause); 6] = [
    (regs::FS_I_FAULT, FaultCause::InternalConsistency),
    (regs::FS_FORCE, FaultCause::Forced),
    (regs::FS_POR, FaultCause::PowerOnReset),
    (regs::FS_CRC, FaultCause::CrcError),
    (regs::FS_CUV, FaultCause::Undervoltage),
    (regs::FS_COV, FaultCause::Overvoltage),
];

const ALERT_BITS: [(u8, AlertCause); 8] = [
    (regs::AS_AR, AlertCause::AddressNotSet),
    (regs::AS_PARITY, AlertCause::ParityError),
    (regs::AS_ECC_ERR, AlertCause::EccError),
    (regs::AS_FORCE, AlertCause::Forced),
    (regs::AS_TSD, AlertCause::ThermalShutdown),
    (regs::AS_SLEEP, AlertCause::Sleep),
    (regs::AS_OT2, AlertCause::OverTemperature2),
    (regs::AS_OT1, AlertCause::OverTemperature1),
];

/// Name every condition set in a fault register value.
pub fn classify_fault(bits: u8) -> Vec<FaultCause> {
    FAULT_BITS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|&(_, cause)| cause)
        .collect()
}

/// Name every condition set in an alert register value.
pub fn classify_alert(bits: u8) -> Vec<AlertCause> {
    ALERT_BITS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|&(_, cause)| cause)
        .collect()
}

/// Read one device's status register, decoding and acknowledging any
/// fault or alert it reports. Returns the raw status byte.
pub(crate) fn check_device_status<B: Bus>(
    tr: &mut Transport<B>,
    address: Address,
) -> Result<u8, Error> {
    tr.begin();
    let status = tr.read_u8(address, regs::DEVICE_STATUS)?;
    info!("device {address} status = {status:#04x}");
    if status & regs::DS_ADDR_RQST == 0 {
        warn!("device {address}: no address assigned");
    }
    if status & regs::DS_FAULT != 0 {
        decode_fault(tr, address)?;
    }
    if status & regs::DS_ALERT != 0 {
        decode_alert(tr, address)?;
    }
    Ok(status)
}

fn decode_fault<B: Bus>(tr: &mut Transport<B>, address: Address) -> Result<u8, Error> {
    tr.begin();
    let fault = tr.read_u8(address, regs::FAULT_STATUS)?;
    tr.queue_write(address.into(), regs::FAULT_STATUS, fault)?; // acknowledge
    tr.queue_write(address.into(), regs::FAULT_STATUS, 0)?; // clear
    tr.flush()?;

    for cause in classify_fault(fault) {
        warn!("device {address} fault: {cause:?}");
    }
    if fault & regs::FS_COV != 0 {
        tr.begin();
        let cells = tr.read_u8(address, regs::COV_FAULT)?;
        let setpoint = tr.read_u8(address, regs::CONFIG_COV)?;
        info!("device {address}: overvoltage cells {cells:#04x}, setpoint {setpoint:#04x}");
    }
    Ok(fault)
}

fn decode_alert<B: Bus>(tr: &mut Transport<B>, address: Address) -> Result<u8, Error> {
    tr.begin();
    let alert = tr.read_u8(address, regs::ALERT_STATUS)?;
    tr.queue_write(address.into(), regs::ALERT_STATUS, alert)?; // acknowledge
    tr.queue_write(address.into(), regs::ALERT_STATUS, 0)?; // clear
    tr.flush()?;

    for cause in classify_alert(alert) {
        warn!("device {address} alert: {cause:?}");
    }
    if alert & regs::AS_AR == 0 {
        tr.begin();
        let address_reg = tr.read_u8(address, regs::ADDRESS_CONTROL)?;
        info!("device {address}: address register = {address_reg:#04x}");
    }
    Ok(alert)
}
