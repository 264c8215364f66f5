//! Waypoint lattice covering the room, with per-cell occupancy.

use serde::{Deserialize, Serialize};

use crate::{DanceConfig, DanceError, Position};

/// Column/row address of a lattice waypoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticeCell {
    pub x: usize,
    pub y: usize,
}

impl LatticeCell {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Cell in the odd column paired with this one.
    #[must_use]
    pub const fn partner(self) -> Self {
        Self::new(self.x + 1, self.y)
    }
}

/// Who currently claims a lattice cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Free,
    /// Slot of the live snake.
    Snake,
    /// Permanently taken by a matched pair.
    Parked,
    /// Lattice origin: never on the snake, never a parking slot.
    Reserved,
}

impl CellState {
    #[must_use]
    pub const fn is_occupied(self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Largest lattice `Lattice::build` lays out.
pub const MAX_LATTICE_CELLS: usize = 1 << 24;

/// Waypoints along one axis: `trunc(side / gap)`, capped so the last one
/// (at `offset + (n - 1) * gap`) stays inside the room.
fn fitting_count(arena_side: f64, offset: f64, gap: f64) -> f64 {
    if offset > arena_side {
        return 0.0;
    }
    (arena_side / gap)
        .trunc()
        .min(((arena_side - offset) / gap).floor() + 1.0)
}

/// Evenly spaced waypoints with an occupancy map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lattice {
    cols: usize,
    rows: usize,
    points: Vec<Position>,
    cells: Vec<CellState>,
}

impl Lattice {
    /// Lays out the lattice for a square room of side `arena_side`.
    pub fn build(arena_side: f64, config: &DanceConfig) -> Result<Self, DanceError> {
        if !(arena_side.is_finite() && arena_side > 0.0) {
            return Err(DanceError::InvalidConfig("arena side must be positive"));
        }
        config.validate()?;

        let cols = fitting_count(arena_side, config.grid_offset_x, config.grid_gap);
        let cols = cols - cols % 2.0;
        let rows = fitting_count(arena_side, config.grid_offset_y, config.grid_gap);
        if cols < 2.0 || rows < 2.0 {
            return Err(DanceError::InvalidConfig(
                "room is too small for a 2x2 lattice",
            ));
        }
        if cols * rows > MAX_LATTICE_CELLS as f64 {
            return Err(DanceError::InvalidConfig(
                "room is too large for the lattice",
            ));
        }
        let (cols, rows) = (cols as usize, rows as usize);

        let mut points = Vec::with_capacity(cols * rows);
        for y in 0..rows {
            for x in 0..cols {
                let mut px = config.grid_offset_x + x as f64 * config.grid_gap;
                let py = config.grid_offset_y + y as f64 * config.grid_gap;
                if x % 2 == 1 {
                    px -= config.odd_column_jitter;
                }
                points.push(Position::new(px, py));
            }
        }

        Ok(Self {
            cols,
            rows,
            points,
            cells: vec![CellState::Free; cols * rows],
        })
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.cols * self.rows
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn contains(&self, cell: LatticeCell) -> bool {
        cell.x < self.cols && cell.y < self.rows
    }

    /// Returns the flat index for `cell` without bounds checks.
    #[inline]
    fn offset(&self, cell: LatticeCell) -> usize {
        cell.y * self.cols + cell.x
    }

    /// Waypoint coordinates of `cell`.
    #[must_use]
    pub fn point(&self, cell: LatticeCell) -> Option<Position> {
        self.contains(cell).then(|| self.points[self.offset(cell)])
    }

    #[must_use]
    pub fn state(&self, cell: LatticeCell) -> Option<CellState> {
        self.contains(cell).then(|| self.cells[self.offset(cell)])
    }

    /// True when `cell` lies on the lattice and nobody claims it.
    #[must_use]
    pub fn is_free(&self, cell: LatticeCell) -> bool {
        self.state(cell) == Some(CellState::Free)
    }

    /// Marks a free cell with `state`.
    pub fn claim(&mut self, cell: LatticeCell, state: CellState) -> Result<(), DanceError> {
        match self.state(cell) {
            Some(CellState::Free) => {
                let idx = self.offset(cell);
                self.cells[idx] = state;
                Ok(())
            }
            Some(_) => Err(DanceError::CellOccupied {
                x: cell.x,
                y: cell.y,
            }),
            None => Err(DanceError::CellOutOfRange {
                x: cell.x,
                y: cell.y,
            }),
        }
    }

    /// Frees every cell held by the snake; parked and reserved cells stay.
    pub fn release_snake(&mut self) {
        for cell in &mut self.cells {
            if *cell == CellState::Snake {
                *cell = CellState::Free;
            }
        }
    }

    /// Number of cells in `state`.
    #[must_use]
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| **c == state).count()
    }

    /// Left cells of every column pair (`x` even), column-major.
    pub fn column_pair_slots(&self) -> impl Iterator<Item = LatticeCell> + '_ {
        (0..self.cols)
            .step_by(2)
            .flat_map(move |x| (0..self.rows).map(move |y| LatticeCell::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_room_forces_even_columns() {
        let lattice = Lattice::build(2.0, &DanceConfig::default()).expect("lattice");
        assert_eq!(lattice.cols(), 2);
        assert_eq!(lattice.rows(), 3);
        assert_eq!(lattice.len(), 6);
    }

    #[test]
    fn odd_columns_are_jittered() {
        let config = DanceConfig::default();
        let lattice = Lattice::build(10.0, &config).expect("lattice");
        assert_eq!(lattice.cols() % 2, 0);
        let even = lattice.point(LatticeCell::new(2, 3)).expect("even");
        let odd = lattice.point(LatticeCell::new(3, 3)).expect("odd");
        assert!((even.x - (0.4 + 2.0 * config.grid_gap)).abs() < 1e-12);
        assert!((odd.x - (0.4 + 3.0 * config.grid_gap - config.odd_column_jitter)).abs() < 1e-12);
        assert_eq!(even.y, odd.y);
    }

    #[test]
    fn geometry_is_idempotent() {
        let config = DanceConfig::default();
        let a = Lattice::build(17.3, &config).expect("a");
        let b = Lattice::build(17.3, &config).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn waypoints_stay_inside_the_room() {
        for side in [2.0, 5.5, 20.0, 63.0] {
            let lattice = Lattice::build(side, &DanceConfig::default()).expect("lattice");
            for x in 0..lattice.cols() {
                for y in 0..lattice.rows() {
                    let p = lattice.point(LatticeCell::new(x, y)).expect("point");
                    assert!((0.0..=side).contains(&p.x) && (0.0..=side).contains(&p.y));
                }
            }
        }
    }

    #[test]
    fn rejects_degenerate_rooms() {
        let config = DanceConfig::default();
        assert_eq!(
            Lattice::build(0.0, &config),
            Err(DanceError::InvalidConfig("arena side must be positive"))
        );
        assert!(Lattice::build(-3.0, &config).is_err());
        assert!(Lattice::build(f64::NAN, &config).is_err());
        assert_eq!(
            Lattice::build(0.9, &config),
            Err(DanceError::InvalidConfig("room is too small for a 2x2 lattice"))
        );
    }

    #[test]
    fn offsets_shrink_the_lattice_to_fit() {
        let config = DanceConfig {
            grid_offset_x: 0.6,
            grid_offset_y: 0.6,
            ..DanceConfig::default()
        };
        let lattice = Lattice::build(1.6, &config).expect("lattice");
        assert_eq!((lattice.cols(), lattice.rows()), (2, 2));

        let config = DanceConfig {
            grid_offset_x: 1.3,
            grid_offset_y: 2.2,
            ..DanceConfig::default()
        };
        for side in [4.0, 7.7, 12.0] {
            let lattice = Lattice::build(side, &config).expect("lattice");
            for x in 0..lattice.cols() {
                for y in 0..lattice.rows() {
                    let p = lattice.point(LatticeCell::new(x, y)).expect("point");
                    assert!(p.x <= side && p.y <= side, "({}, {}) outside {side}", p.x, p.y);
                }
            }
        }

        let config = DanceConfig {
            grid_offset_y: 5.0,
            ..DanceConfig::default()
        };
        assert_eq!(
            Lattice::build(4.0, &config),
            Err(DanceError::InvalidConfig("room is too small for a 2x2 lattice"))
        );
    }

    #[test]
    fn huge_rooms_are_rejected() {
        let config = DanceConfig::default();
        for side in [1e25, f64::MAX] {
            assert_eq!(
                Lattice::build(side, &config),
                Err(DanceError::InvalidConfig("room is too large for the lattice"))
            );
        }
        let lattice = Lattice::build(1000.0, &config).expect("lattice");
        assert!(lattice.len() <= MAX_LATTICE_CELLS);
    }

    #[test]
    fn claim_refuses_double_assignment() {
        let mut lattice = Lattice::build(4.0, &DanceConfig::default()).expect("lattice");
        let cell = LatticeCell::new(2, 2);
        lattice.claim(cell, CellState::Snake).expect("claim");
        assert_eq!(
            lattice.claim(cell, CellState::Parked),
            Err(DanceError::CellOccupied { x: 2, y: 2 })
        );
        lattice.release_snake();
        assert!(lattice.is_free(cell));
        lattice.claim(cell, CellState::Parked).expect("park");
        lattice.release_snake();
        assert_eq!(lattice.state(cell), Some(CellState::Parked));
        assert_eq!(lattice.count(CellState::Parked), 1);
    }

    #[test]
    fn column_pair_slots_cover_even_columns() {
        let lattice = Lattice::build(3.0, &DanceConfig::default()).expect("lattice");
        let slots: Vec<_> = lattice.column_pair_slots().collect();
        assert_eq!(slots.len(), lattice.cols() / 2 * lattice.rows());
        assert!(slots.iter().all(|c| c.x % 2 == 0 && lattice.contains(c.partner())));
    }
}
