//! Register map and bit assignments of the bq76pl536, from the datasheet.
//!
//! Cell-voltage and temperature readings are 16-bit big-endian register
//! pairs; everything else is a single byte.

/// Reserved write-only address accepted by every device in the chain.
pub const BROADCAST_ADDRESS: u8 = 0x3F;
/// Reserved pseudo-address answered only by the device that currently has
/// no assigned address.
pub const DISCOVERY_ADDRESS: u8 = 0x00;

/// Magic value written to [`RESET`] to reset the addressable devices plus
/// one unaddressed device.
pub const RESET_COMMAND: u8 = 0xA5;

/// Device status register.
pub const DEVICE_STATUS: u8 = 0x00;
/// Address has been assigned.
pub const DS_ADDR_RQST: u8 = 0x80;
/// Fault pending, see [`FAULT_STATUS`].
pub const DS_FAULT: u8 = 0x40;
/// Alert pending, see [`ALERT_STATUS`].
pub const DS_ALERT: u8 = 0x20;
/// One-bit error found and fixed in the OTP EPROM.
pub const DS_ECC_COR: u8 = 0x08;
/// Supply undervoltage lockout.
pub const DS_UVLO: u8 = 0x04;
/// Cell balance timer is running.
pub const DS_CBT: u8 = 0x02;
/// Conversion data ready.
pub const DRDY: u8 = 0x01;

/// General-purpose analog input measurement, 16 bits.
pub const GPAI: u8 = 0x01;

/// Cell 1 voltage, 16 bits. Cells 2..6 follow at stride 2.
pub const VCELL1: u8 = 0x03;
pub const VCELL2: u8 = 0x05;
pub const VCELL3: u8 = 0x07;
pub const VCELL4: u8 = 0x09;
pub const VCELL5: u8 = 0x0B;
pub const VCELL6: u8 = 0x0D;

/// TS1+ to TS1- differential voltage, 16 bits.
pub const TEMPERATURE1: u8 = 0x0F;
/// TS2+ to TS2- differential voltage, 16 bits.
pub const TEMPERATURE2: u8 = 0x11;

/// Source of the ALERT signal; write the read value back to acknowledge,
/// then zero to clear.
pub const ALERT_STATUS: u8 = 0x20;
/// Address not set.
pub const AS_AR: u8 = 0x80;
/// Group-3 protected registers are invalid.
pub const AS_PARITY: u8 = 0x40;
/// OTP EPROM registers are not valid.
pub const AS_ECC_ERR: u8 = 0x20;
/// Set to force an alert.
pub const AS_FORCE: u8 = 0x10;
/// Thermal shutdown.
pub const AS_TSD: u8 = 0x08;
/// Sleep was activated.
pub const AS_SLEEP: u8 = 0x04;
/// Over temperature, sensor 2.
pub const AS_OT2: u8 = 0x02;
/// Over temperature, sensor 1.
pub const AS_OT1: u8 = 0x01;

/// Source of the FAULT signal; same acknowledge/clear protocol as
/// [`ALERT_STATUS`].
pub const FAULT_STATUS: u8 = 0x21;
/// Internal register consistency check failed.
pub const FS_I_FAULT: u8 = 0x20;
/// Set to force a fault.
pub const FS_FORCE: u8 = 0x10;
/// Power-on reset.
pub const FS_POR: u8 = 0x08;
/// Frame CRC error seen by the device.
pub const FS_CRC: u8 = 0x04;
/// Cell undervoltage.
pub const FS_CUV: u8 = 0x02;
/// Cell overvoltage.
pub const FS_COV: u8 = 0x01;

/// Per-cell overvoltage fault state.
pub const COV_FAULT: u8 = 0x22;
/// Per-cell undervoltage fault state.
pub const CUV_FAULT: u8 = 0x23;

/// ADC measurement control.
pub const ADC_CONTROL: u8 = 0x30;
/// Keep the ADC subsystem on between conversions.
pub const AC_ADC_ON: u8 = 0x40;
/// Enable temperature sensor 2.
pub const AC_TS2: u8 = 0x20;
/// Enable temperature sensor 1.
pub const AC_TS1: u8 = 0x10;
/// Enable the general-purpose analog input.
pub const AC_GPAI: u8 = 0x08;
/// Convert cells 1-6.
pub const AC_CELL_SEL_6: u8 = 0x05;

/// I/O pin control.
pub const IO_CONTROL: u8 = 0x31;
/// Connect the AUX pin to REG50.
pub const IO_AUX: u8 = 0x80;
/// Enter sleep mode.
pub const IO_SLEEP: u8 = 0x04;
/// Enable thermistor 2.
pub const IO_TS2: u8 = 0x02;
/// Enable thermistor 1.
pub const IO_TS1: u8 = 0x01;

/// Cell-balancing output control.
pub const CB_CTRL: u8 = 0x32;
/// Cell-balancing maximum on time.
pub const CB_TIME: u8 = 0x33;

/// ADC conversion start.
pub const ADC_CONVERT: u8 = 0x34;
/// Start the conversion.
pub const AC_CONV: u8 = 0x01;

/// Write access gate for the group-3 registers (0x40..0x4F); must be
/// rewritten with [`SC_ENABLE`] before every protected write.
pub const SHDW_CTRL: u8 = 0x3A;
/// Value that unlocks one group-3 write.
pub const SC_ENABLE: u8 = 0x35;

/// Address register; assigned during discovery.
pub const ADDRESS_CONTROL: u8 = 0x3B;
/// Address request bit, set by the device once an address sticks.
pub const AC_ADDR_RQST: u8 = 0x80;

/// Reset control register, accepts [`RESET_COMMAND`].
pub const RESET: u8 = 0x3C;

/// Default device configuration (group 3, EPROM backed).
pub const FUNCTION_CONFIG: u8 = 0x40;
/// I/O pin configuration (group 3).
pub const IO_CONFIG: u8 = 0x41;

/// Overvoltage setpoint: low 6 bits are 0-63 * 50 mV + 2 V.
pub const CONFIG_COV: u8 = 0x42;
/// 3.50 V overvoltage setpoint.
pub const COV_350: u8 = 0x1E;
/// Overvoltage time-delay filter.
pub const CONFIG_COVT: u8 = 0x43;
/// Time-delay unit select: 0 = us, 1 = ms; low 5 bits 0-31 * 100.
pub const CC_USMS: u8 = 0x80;

/// Undervoltage setpoint: low 5 bits are 0-31 * 100 mV + 0.7 V.
pub const CONFIG_CUV: u8 = 0x44;
/// 3.00 V undervoltage setpoint.
pub const CUV_300: u8 = 0x17;
/// Undervoltage time-delay filter.
pub const CONFIG_CUVT: u8 = 0x45;

/// Overtemperature setpoint.
pub const CONFIG_OT: u8 = 0x46;
/// Overtemperature time delay, 0-255 * 10 ms.
pub const CONFIG_OTT: u8 = 0x47;
