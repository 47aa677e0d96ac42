//! Range-checked types for chain addresses and pack configuration, meant
//! to simplify correct usage of the API.

use core::convert::TryInto;
use core::fmt;
use core::ops::Deref;

use snafu::{ensure, OptionExt};

use crate::{regs, Error, InvalidAddressSnafu, InvalidCellCountSnafu};

/// Longest chain the discovery walk will address.
pub const MAX_DEVICES: usize = 32;

/// `Address` is a range-checked \[1, 32\] integer naming one device slot
/// in the chain. Address 0 and 0x3F are reserved on the wire for the
/// discovery and broadcast pseudo-targets, see [`Target`].
///
/// ## Example
/// ```
/// use bq76_chain::Address;
/// let first = Address::new(1).unwrap();
/// assert_eq!(*first, 1);
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Address(u8);

/// Create a new [`Address`], panics if it is out of range.
pub const fn addr(a: u8) -> Address {
    if a >= 1 && a <= MAX_DEVICES as u8 {
        return Address(a);
    }
    panic!("Invalid address.")
}

impl Address {
    /// Create a new address, checking that it is in \[1, 32\].
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().context(InvalidAddressSnafu)?;
        ensure!(
            (1..=MAX_DEVICES as u8).contains(&address),
            InvalidAddressSnafu
        );
        Ok(Self(address))
    }

    pub(crate) const fn get(self) -> u8 {
        self.0
    }
}

impl Deref for Address {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<u8> for Address {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Addressing target of an outbound frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    /// Reserved address accepted by every device in the chain; writes
    /// only, no device answers.
    Broadcast,
    /// Reserved pseudo-address reaching only the device that currently
    /// holds no assigned address.
    Discovery,
    /// One addressed device.
    Device(Address),
}

impl Target {
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Target::Broadcast => regs::BROADCAST_ADDRESS,
            Target::Discovery => regs::DISCOVERY_ADDRESS,
            Target::Device(address) => address.get(),
        }
    }
}

impl From<Address> for Target {
    fn from(address: Address) -> Self {
        Target::Device(address)
    }
}

/// Declared number of series cells wired to one device, range-checked to
/// \[3, 6\]. The bq76pl536 has six voltage taps but supports packs down to
/// three cells per device.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct CellCount(u8);

impl CellCount {
    /// Create a new `CellCount`, checking that it is in \[3, 6\].
    /// # Errors
    /// Returns [`Error::InvalidCellCount`] if `count` is out of range.
    pub fn new(count: u8) -> Result<Self, Error> {
        ensure!((3..=6).contains(&count), InvalidCellCountSnafu { count });
        Ok(Self(count))
    }

    pub(crate) const fn get(self) -> u8 {
        self.0
    }
}

impl Deref for CellCount {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
