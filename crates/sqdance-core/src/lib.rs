//! Core types and the lattice snake formation strategy for the square dance simulation.

use serde::{Deserialize, Serialize};
use sqdance_index::{BucketGridIndex, IndexError, LinearScanIndex, SlotIndex};
use thiserror::Error;

pub mod formation;
pub mod lattice;
pub mod motion;
pub mod snake;
pub mod strategy;

pub use formation::{FormationController, MatchedPair, Phase};
pub use lattice::{CellState, Lattice, LatticeCell, MAX_LATTICE_CELLS};
pub use motion::step_toward;
pub use strategy::{DanceStrategy, RoundFeedback, SnakeStrategy};

/// Maximum displacement the engine accepts per round.
pub const MAX_STEP: f64 = 1.0;
/// Partner id reported for dancers without a partner.
pub const NO_PARTNER: i32 = -1;

/// Point in the room (metres from the bottom-left corner).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn offset(self, delta: Displacement) -> Self {
        Self::new(self.x + delta.dx, self.y + delta.dy)
    }
}

/// Per-round movement request for one dancer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    /// Construct a new displacement vector.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self { dx: 0.0, dy: 0.0 }
    }

    /// Vector from `from` to `to`.
    #[must_use]
    pub fn between(from: Position, to: Position) -> Self {
        Self::new(to.x - from.x, to.y - from.y)
    }

    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.dx.hypot(self.dy)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// Rounds processed since initialization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Round(pub u64);

impl Round {
    /// Returns the next sequential round.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Enjoyment tier reported by the engine for the most recent round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Enjoyment {
    /// Dancer stood too close to someone else.
    Incompatible,
    /// No dance this round.
    Idle,
    Stranger,
    Friend,
    Soulmate,
}

impl Enjoyment {
    /// Raw value as reported by the engine.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Incompatible => -5,
            Self::Idle => 0,
            Self::Stranger => 3,
            Self::Friend => 4,
            Self::Soulmate => 6,
        }
    }

    /// Total enjoyment a relationship of this tier can ever yield.
    pub fn total_budget(self) -> Result<u32, DanceError> {
        match self {
            Self::Stranger => Ok(60),
            Self::Friend => Ok(200),
            Self::Soulmate => Ok(10_800),
            Self::Incompatible | Self::Idle => Err(DanceError::NotDancing(self)),
        }
    }
}

impl TryFrom<i32> for Enjoyment {
    type Error = DanceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -5 => Ok(Self::Incompatible),
            0 => Ok(Self::Idle),
            3 => Ok(Self::Stranger),
            4 => Ok(Self::Friend),
            6 => Ok(Self::Soulmate),
            other => Err(DanceError::InvalidEnjoyment(other)),
        }
    }
}

/// Errors raised by the formation strategy.
#[derive(Debug, Error, PartialEq)]
pub enum DanceError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The snake walk ran off the lattice.
    #[error("snake of {count} dancers does not fit a {cols}x{rows} lattice")]
    SnakeOverflow {
        count: usize,
        cols: usize,
        rows: usize,
    },
    /// No free column pair was left to park a matched pair.
    #[error("no free lattice slot left to park dancers {first} and {second}")]
    NoFreeSlot { first: usize, second: usize },
    /// Attempted to claim a lattice cell that is already taken.
    #[error("lattice cell ({x}, {y}) is already occupied")]
    CellOccupied { x: usize, y: usize },
    #[error("lattice cell ({x}, {y}) is outside the lattice")]
    CellOutOfRange { x: usize, y: usize },
    #[error("enjoyment value {0} is not one of -5, 0, 3, 4, 6")]
    InvalidEnjoyment(i32),
    #[error("enjoyment tier {0:?} does not come from a dance")]
    NotDancing(Enjoyment),
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("dancer {dancer} reported out-of-range partner {partner}")]
    InvalidPartner { dancer: usize, partner: i32 },
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// How the controller treats the snake once dancers start matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FormationPolicy {
    /// Dancer 0 stays on the origin; everyone else cycles forever.
    CycleOnly,
    /// All dancers cycle; soulmate pairs leave the snake and park on free cells.
    #[default]
    ExtractOnMatch,
}

impl FormationPolicy {
    /// Dancer that never joins the snake, if any.
    #[must_use]
    pub const fn stationary_dancer(self) -> Option<usize> {
        match self {
            Self::CycleOnly => Some(0),
            Self::ExtractOnMatch => None,
        }
    }

    /// Number of leading snake slots that keep their dancer when the snake crawls.
    #[must_use]
    pub const fn pinned_slots(self) -> usize {
        match self {
            Self::CycleOnly => 0,
            Self::ExtractOnMatch => 1,
        }
    }

    #[must_use]
    pub const fn extracts_matches(self) -> bool {
        matches!(self, Self::ExtractOnMatch)
    }
}

/// Nearest free slot search used when parking matched pairs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum SlotSearchKind {
    #[default]
    LinearScan,
    BucketGrid { cell_size: f64 },
}

impl SlotSearchKind {
    /// Instantiate the configured index.
    pub fn build(self) -> Result<Box<dyn SlotIndex>, DanceError> {
        Ok(match self {
            Self::LinearScan => Box::new(LinearScanIndex::new()),
            Self::BucketGrid { cell_size } => Box::new(BucketGridIndex::new(cell_size)?),
        })
    }
}

/// Static configuration for a snake formation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DanceConfig {
    /// Distance between neighbouring lattice waypoints; slightly over 0.5 so
    /// adjacent dancers never sit exactly on the pairing boundary.
    pub grid_gap: f64,
    /// Horizontal offset of lattice cell (0, 0) from the room corner.
    pub grid_offset_x: f64,
    /// Vertical offset of lattice cell (0, 0) from the room corner.
    pub grid_offset_y: f64,
    /// Shift applied to odd columns so nearest-neighbour ties never occur.
    pub odd_column_jitter: f64,
    /// Round-off allowance when deciding whether a destination is within one step.
    pub arrival_epsilon: f64,
    pub policy: FormationPolicy,
    pub slot_search: SlotSearchKind,
}

impl Default for DanceConfig {
    fn default() -> Self {
        Self {
            grid_gap: 0.5001,
            grid_offset_x: 0.4,
            grid_offset_y: 0.4,
            odd_column_jitter: 0.000_01,
            arrival_epsilon: 1e-8,
            policy: FormationPolicy::default(),
            slot_search: SlotSearchKind::default(),
        }
    }
}

impl DanceConfig {
    /// Validates the configuration values that do not depend on the room.
    pub fn validate(&self) -> Result<(), DanceError> {
        if !(self.grid_gap.is_finite() && self.grid_gap > 0.0) {
            return Err(DanceError::InvalidConfig("grid_gap must be positive"));
        }
        if !(self.grid_offset_x.is_finite() && self.grid_offset_y.is_finite())
            || self.grid_offset_x < 0.0
            || self.grid_offset_y < 0.0
        {
            return Err(DanceError::InvalidConfig(
                "grid offsets must be finite and non-negative",
            ));
        }
        if !(0.0..self.grid_gap).contains(&self.odd_column_jitter) {
            return Err(DanceError::InvalidConfig(
                "odd_column_jitter must be in [0, grid_gap)",
            ));
        }
        if !(self.arrival_epsilon.is_finite() && self.arrival_epsilon >= 0.0) {
            return Err(DanceError::InvalidConfig(
                "arrival_epsilon must be non-negative",
            ));
        }
        match self.slot_search {
            SlotSearchKind::BucketGrid { cell_size }
                if !(cell_size.is_finite() && cell_size > 0.0) =>
            {
                Err(DanceError::InvalidConfig(
                    "bucket grid cell_size must be positive",
                ))
            }
            _ => Ok(()),
        }
    }
}
