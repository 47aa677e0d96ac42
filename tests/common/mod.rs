#![allow(dead_code)]

//! A simulated chain of bq76pl536 devices behind the batch bus primitive,
//! with hooks for injecting transfer failures and CRC corruption.
//!
//! The chain state lives behind an `Arc<Mutex<_>>` so a test can keep
//! poking at it (and inspecting logs) while a `Chain` owns the [`SimBus`]
//! handle.

use std::sync::{Arc, Mutex};

use bq76_chain::{regs, Bus, BusError, Transfer};
use crc::{Crc, CRC_8_SMBUS};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One simulated device: a register file plus the analog inputs the ADC
/// would sample.
pub struct SimDevice {
    pub address: Option<u8>,
    pub address_control: u8,
    /// Raw 16-bit readings for the six voltage taps. Floating taps read
    /// low; populated ones read well above the census threshold.
    pub cell_voltages: [u16; 6],
    pub temperatures: [u16; 2],
    pub fault: u8,
    pub alert: u8,
    pub uv_fault: u8,
    pub ov_fault: u8,
    pub cov_config: u8,
    pub drdy: bool,
    /// Ignore address assignment during discovery, so the verify read
    /// sees nobody at the offered address.
    pub reject_address: bool,
    /// Latch the address but answer the verify read without the
    /// address-request bit.
    pub bad_request_bit: bool,
    /// Every write delivered to this device, as (register, value).
    pub write_log: Vec<(u8, u8)>,
}

impl SimDevice {
    pub fn new(cells: usize) -> Self {
        let mut cell_voltages = [500u16; 6];
        for v in cell_voltages.iter_mut().take(cells) {
            *v = 9000;
        }
        Self {
            address: None,
            address_control: 0,
            cell_voltages,
            temperatures: [2048; 2],
            fault: 0,
            alert: 0,
            uv_fault: 0,
            ov_fault: 0,
            cov_config: regs::COV_350,
            drdy: false,
            reject_address: false,
            bad_request_bit: false,
            write_log: Vec::new(),
        }
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.address.is_some() {
            status |= regs::DS_ADDR_RQST;
        }
        if self.fault != 0 {
            status |= regs::DS_FAULT;
        }
        if self.alert != 0 {
            status |= regs::DS_ALERT;
        }
        if self.drdy {
            status |= regs::DRDY;
        }
        status
    }

    fn read_reg(&self, register: u8) -> u16 {
        match register {
            regs::DEVICE_STATUS => self.status().into(),
            regs::ADDRESS_CONTROL => self.address_control.into(),
            regs::TEMPERATURE1 => self.temperatures[0],
            regs::TEMPERATURE2 => self.temperatures[1],
            regs::FAULT_STATUS => self.fault.into(),
            regs::ALERT_STATUS => self.alert.into(),
            regs::CUV_FAULT => self.uv_fault.into(),
            regs::COV_FAULT => self.ov_fault.into(),
            regs::CONFIG_COV => self.cov_config.into(),
            r if (regs::VCELL1..=regs::VCELL6).contains(&r) && (r - regs::VCELL1) % 2 == 0 => {
                self.cell_voltages[usize::from((r - regs::VCELL1) / 2)]
            }
            _ => 0,
        }
    }

    fn write_reg(&mut self, register: u8, value: u8) {
        self.write_log.push((register, value));
        match register {
            regs::ADC_CONVERT if value & regs::AC_CONV != 0 => self.drdy = true,
            regs::FAULT_STATUS if value == 0 => self.fault = 0,
            regs::ALERT_STATUS if value == 0 => self.alert = 0,
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.address = None;
        self.address_control = 0;
    }
}

/// The daisy chain: devices in physical order plus failure injection.
pub struct SimChain {
    pub devices: Vec<SimDevice>,
    /// Fail the n-th upcoming transfer call (0 = the next one) with the
    /// given status.
    pub fail_in: Option<(usize, i32)>,
    /// Corrupt the CRC of the n-th upcoming read (0 = the next one).
    pub corrupt_read_in: Option<usize>,
    /// Conversions never complete: the data-ready bit stays clear.
    pub suppress_drdy: bool,
    /// Every read that went on the bus, as (address, register).
    pub read_log: Vec<(u8, u8)>,
}

impl SimChain {
    pub fn new(cells_per_device: &[usize]) -> Arc<Mutex<SimChain>> {
        Arc::new(Mutex::new(SimChain {
            devices: cells_per_device.iter().map(|&c| SimDevice::new(c)).collect(),
            fail_in: None,
            corrupt_read_in: None,
            suppress_drdy: false,
            read_log: Vec::new(),
        }))
    }

    pub fn device(&self, address: u8) -> &SimDevice {
        self.devices
            .iter()
            .find(|d| d.address == Some(address))
            .expect("no device with that address")
    }

    pub fn device_mut(&mut self, address: u8) -> &mut SimDevice {
        self.devices
            .iter_mut()
            .find(|d| d.address == Some(address))
            .expect("no device with that address")
    }

    /// Reads of `register` on `address` seen so far.
    pub fn reads_of(&self, address: u8, register: u8) -> usize {
        self.read_log
            .iter()
            .filter(|&&r| r == (address, register))
            .count()
    }

    fn handle_write(&mut self, target: u8, register: u8, value: u8) {
        match target {
            regs::BROADCAST_ADDRESS => {
                if register == regs::RESET && value == regs::RESET_COMMAND {
                    for dev in &mut self.devices {
                        dev.reset();
                    }
                } else {
                    for dev in &mut self.devices {
                        dev.write_reg(register, value);
                    }
                }
            }
            regs::DISCOVERY_ADDRESS => {
                if let Some(dev) = self.devices.iter_mut().find(|d| d.address.is_none()) {
                    if register == regs::ADDRESS_CONTROL {
                        if dev.reject_address {
                            dev.address_control = 0;
                        } else if dev.bad_request_bit {
                            dev.address = Some(value & 0x3F);
                            dev.address_control = value & !regs::AC_ADDR_RQST;
                        } else {
                            dev.address = Some(value & 0x3F);
                            dev.address_control = value | regs::AC_ADDR_RQST;
                        }
                    } else {
                        dev.write_reg(register, value);
                    }
                }
            }
            address => {
                if let Some(dev) = self
                    .devices
                    .iter_mut()
                    .find(|d| d.address == Some(address))
                {
                    dev.write_reg(register, value);
                }
            }
        }
    }

    fn handle_read(&mut self, transfer: &mut Transfer) {
        let address = transfer.tx[0] >> 1;
        let register = transfer.tx[1];
        let count = usize::from(transfer.tx[2]);
        self.read_log.push((address, register));

        let dev = self.devices.iter().find(|d| d.address == Some(address));
        let raw = dev.map_or(0, |d| d.read_reg(register));
        if count == 1 {
            transfer.rx[3] = raw as u8;
        } else {
            transfer.rx[3] = (raw >> 8) as u8;
            transfer.rx[4] = raw as u8;
        }

        let mut digest = CRC8.digest();
        digest.update(&transfer.tx[..3]);
        digest.update(&transfer.rx[3..3 + count]);
        let mut crc = digest.finalize();
        if dev.is_none() {
            // Nobody drove the bus; whatever was sampled fails the check.
            crc ^= 0xFF;
        }
        if let Some(countdown) = self.corrupt_read_in {
            if countdown == 0 {
                self.corrupt_read_in = None;
                crc ^= 0x01;
            } else {
                self.corrupt_read_in = Some(countdown - 1);
            }
        }
        transfer.rx[3 + count] = crc;
    }

    fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError> {
        if let Some((countdown, status)) = self.fail_in {
            if countdown == 0 {
                self.fail_in = None;
                return Err(BusError { status });
            }
            self.fail_in = Some((countdown - 1, status));
        }

        for transfer in batch.iter_mut() {
            assert!(transfer.cs_change);
            if transfer.rx.is_empty() {
                // Write frame: four bytes, write bit set, valid CRC.
                assert_eq!(transfer.tx.len(), 4);
                assert_eq!(transfer.tx[0] & 1, 1);
                assert_eq!(transfer.tx[3], CRC8.checksum(&transfer.tx[..3]));
                self.handle_write(transfer.tx[0] >> 1, transfer.tx[1], transfer.tx[2]);
            } else {
                assert_eq!(transfer.tx.len(), 3);
                assert_eq!(transfer.tx[0] & 1, 0);
                self.handle_read(transfer);
            }
        }

        if self.suppress_drdy {
            for dev in &mut self.devices {
                dev.drdy = false;
            }
        }
        Ok(())
    }
}

/// Bus handle a `Chain` can own while the test keeps the state.
pub struct SimBus(Arc<Mutex<SimChain>>);

impl SimBus {
    pub fn new(sim: &Arc<Mutex<SimChain>>) -> SimBus {
        SimBus(Arc::clone(sim))
    }
}

impl Bus for SimBus {
    fn transfer(&mut self, batch: &mut [Transfer]) -> Result<(), BusError> {
        self.0.lock().unwrap().transfer(batch)
    }
}
