//! Cell census: probe the six candidate voltage taps of every device to
//! learn which ones actually have a cell wired up.

use log::{info, warn};

use crate::chain::{CellTap, Device};
use crate::regs;
use crate::transport::{Bus, Transport};
use crate::Error;

/// Raw ADC readings at or below this value mark a floating tap.
pub(crate) const CELL_MISSING_THRESHOLD: u16 = 1000;

/// The six candidate cell-voltage registers, in tap order.
pub(crate) fn cell_registers() -> impl Iterator<Item = u8> {
    (regs::VCELL1..=regs::VCELL6).step_by(2)
}

/// Read every candidate tap of every device and build the table of
/// populated ones, ordered by (device, register).
///
/// A device whose populated count disagrees with its declared expectation
/// gets the discovered count adopted as authoritative; the disagreement
/// is logged, not fatal.
pub(crate) fn census<B: Bus>(
    tr: &mut Transport<B>,
    devices: &mut [Device],
) -> Result<Vec<CellTap>, Error> {
    let mut taps = Vec::new();
    for dev in devices.iter_mut() {
        let mut found: u8 = 0;
        for register in cell_registers() {
            tr.begin();
            let raw = tr.read_u16(dev.address(), register)?;
            if raw > CELL_MISSING_THRESHOLD {
                found += 1;
                taps.push(CellTap::new(dev.address(), register));
            }
        }
        if found != dev.cells() {
            // The only effect of a wrong pack definition.
            warn!(
                "device {}: expected {} cells, found {}",
                dev.address(),
                dev.cells(),
                found
            );
            dev.set_cells(found);
        }
    }
    info!("census: {} cells total", taps.len());
    Ok(taps)
}
