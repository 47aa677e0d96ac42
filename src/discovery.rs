//! Chain discovery: walk the unaddressed daisy chain and hand out
//! contiguous addresses starting at 1.
//!
//! Straight from the flow chart in the datasheet. A broadcast RESET
//! returns every addressed device plus exactly one unaddressed device to
//! the discovery state, so each outer pass re-resets and re-walks the
//! whole chain one device further; this recovers devices that came up
//! holding a stale address from a previous run.

use log::{info, warn};

use crate::regs;
use crate::transport::{Bus, Transport};
use crate::types::{Address, Target};
use crate::Error;

/// Assign addresses 1..N to the chain and verify each one, growing the
/// walk until `configured` devices have been seen or the chain runs out.
///
/// Returns the number of devices that verified their address, which may
/// be less than `configured`: a failed bus transfer, a CRC error or a
/// verification mismatch stops the walk there and the devices verified so
/// far stand. Only a batch overflow is fatal.
pub(crate) fn discover<B: Bus>(tr: &mut Transport<B>, configured: u8) -> Result<u8, Error> {
    let mut look_for: u8 = 0;
    tr.begin();
    loop {
        // Reset every addressed device plus the next unaddressed one.
        tr.queue_write(Target::Broadcast, regs::RESET, regs::RESET_COMMAND)?;
        look_for += 1;
        let mut n: u8 = 0;
        while n < look_for {
            n += 1;
            // Offer address n to whichever device is listening on the
            // discovery address, then read it back from address n.
            tr.queue_write(Target::Discovery, regs::ADDRESS_CONTROL, n)?;
            let expected = n | regs::AC_ADDR_RQST;
            match tr.read_u8(Address::new(n)?, regs::ADDRESS_CONTROL) {
                Ok(verify) if verify == expected => {}
                Ok(verify) => {
                    warn!("discovery: device {n} answered {verify:#04x}, expected {expected:#04x}");
                    return Ok(n - 1);
                }
                Err(err @ Error::Framing { .. }) => return Err(err),
                Err(err) => {
                    warn!("discovery: probe of device {n} failed: {err}");
                    return Ok(n - 1);
                }
            }
            tr.begin();
        }
        if n >= configured {
            info!("discovery: verified {n} devices");
            return Ok(n);
        }
    }
}
