//! Serpentine cycle through the lattice.
//!
//! The walk heads down even columns (outbound), crosses into the adjacent odd
//! column once half the dancers are placed, and climbs back through the odd
//! columns (inbound). Outbound dancers at `(x, y)` therefore face inbound
//! dancers at `(x + 1, y)`, and rotating the cycle brings every pair together.

use crate::{DanceError, Lattice, LatticeCell};

/// Row the walk starts on; row 0 of the origin column pair is kept free.
pub const START_ROW: usize = 1;

/// Ordered snake cells for `count` dancers.
///
/// Deterministic in `count` and the lattice dimensions; occupancy is not
/// consulted, so callers claim the returned cells themselves.
pub fn generate(lattice: &Lattice, count: usize) -> Result<Vec<LatticeCell>, DanceError> {
    let cols = lattice.cols() as isize;
    let rows = lattice.rows() as isize;
    let overflow = || DanceError::SnakeOverflow {
        count,
        cols: lattice.cols(),
        rows: lattice.rows(),
    };

    let num_outbound = count / 2;
    let mut cells = Vec::with_capacity(count);
    let mut outbound = true;
    let (mut x, mut y, mut dy) = (0_isize, START_ROW as isize, 1_isize);

    for placed in 0..count {
        if !(0..cols).contains(&x) || !(0..rows).contains(&y) {
            return Err(overflow());
        }
        cells.push(LatticeCell::new(x as usize, y as usize));

        let at_edge = !(0..rows).contains(&(y + dy));
        if outbound {
            if placed + 1 == num_outbound {
                outbound = false;
                x += 1;
                dy = -dy;
            } else if at_edge {
                x += 2;
                dy = -dy;
            } else {
                y += dy;
            }
        } else if at_edge {
            x -= 2;
            dy = -dy;
        } else {
            y += dy;
        }
    }
    Ok(cells)
}
