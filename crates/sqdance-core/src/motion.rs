//! Bounded per-round movement toward a waypoint.

use crate::{Displacement, MAX_STEP, Position};

/// Step from `current` toward `destination`, capped at one unit.
///
/// Destinations within `MAX_STEP + epsilon` are reached this round; farther
/// ones are approached along the unit vector.
#[must_use]
pub fn step_toward(destination: Position, current: Position, epsilon: f64) -> Displacement {
    let delta = Displacement::between(current, destination);
    let length = delta.magnitude();
    if length <= MAX_STEP + epsilon {
        delta
    } else {
        Displacement::new(delta.dx / length * MAX_STEP, delta.dy / length * MAX_STEP)
    }
}
