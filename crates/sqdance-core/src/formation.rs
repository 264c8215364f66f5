//! Snake formation state machine: observe, then crawl or extract soulmates.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqdance_index::SlotIndex;
use tracing::{debug, info, warn};

use crate::strategy::RoundReport;
use crate::{
    CellState, DanceConfig, DanceError, Displacement, Enjoyment, FormationPolicy, Lattice,
    LatticeCell, Position, Round, snake, step_toward,
};

/// What the controller does on the next call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Phase {
    /// Everyone holds still so the engine can score the dances.
    #[default]
    Observe,
    /// Destinations are recomputed and dancers move.
    Advance,
}

impl Phase {
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Observe => Self::Advance,
            Self::Advance => Self::Observe,
        }
    }
}

/// Soulmates removed from the snake and parked side by side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedPair {
    /// Dancer that reported the match; parked on the even column.
    pub first: usize,
    /// Reported partner; parked on the odd column.
    pub second: usize,
    /// Even-column cell of the parking slot.
    pub slot: LatticeCell,
}

/// Owns the lattice, the live snake and every dancer's destination.
pub struct FormationController {
    policy: FormationPolicy,
    arrival_epsilon: f64,
    dancers: usize,
    lattice: Lattice,
    snake: Vec<LatticeCell>,
    active: Vec<usize>,
    destinations: Vec<Option<Position>>,
    parked: Vec<MatchedPair>,
    phase: Phase,
    round: Round,
    slots: Vec<LatticeCell>,
    slot_index: Box<dyn SlotIndex>,
}

impl fmt::Debug for FormationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormationController")
            .field("policy", &self.policy)
            .field("dancers", &self.dancers)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("active", &self.active.len())
            .field("parked", &self.parked.len())
            .field("slot_index", &self.slot_index.kind())
            .finish()
    }
}

impl FormationController {
    /// Lays out the lattice and threads every cycling dancer onto the initial snake.
    pub fn new(dancers: usize, arena_side: f64, config: &DanceConfig) -> Result<Self, DanceError> {
        if dancers == 0 {
            return Err(DanceError::InvalidConfig("dancer count must be positive"));
        }
        let mut lattice = Lattice::build(arena_side, config)?;
        // The origin never joins a snake; reserving it also keeps parked pairs
        // off (1, 0), which odd-length snakes spill into.
        lattice.claim(LatticeCell::new(0, 0), CellState::Reserved)?;

        let slots: Vec<LatticeCell> = lattice.column_pair_slots().collect();
        let mut slot_index = config.slot_search.build()?;
        let coords = slots
            .iter()
            .filter_map(|cell| lattice.point(*cell))
            .map(|p| (p.x, p.y))
            .collect::<Vec<_>>();
        slot_index.rebuild(&coords)?;

        let policy = config.policy;
        let mut destinations = vec![None; dancers];
        if let Some(stationary) = policy.stationary_dancer() {
            destinations[stationary] = lattice.point(LatticeCell::new(0, 0));
        }
        let active = (0..dancers)
            .filter(|id| Some(*id) != policy.stationary_dancer())
            .collect();

        let mut controller = Self {
            policy,
            arrival_epsilon: config.arrival_epsilon,
            dancers,
            lattice,
            snake: Vec::new(),
            active,
            destinations,
            parked: Vec::new(),
            phase: Phase::Observe,
            round: Round::default(),
            slots,
            slot_index,
        };
        controller.rethread()?;
        debug!(
            dancers,
            cols = controller.lattice.cols(),
            rows = controller.lattice.rows(),
            snake = controller.snake.len(),
            index = controller.slot_index.kind(),
            "formation initialised"
        );
        Ok(controller)
    }

    #[must_use]
    pub const fn policy(&self) -> FormationPolicy {
        self.policy
    }

    #[must_use]
    pub const fn dancers(&self) -> usize {
        self.dancers
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn round(&self) -> Round {
        self.round
    }

    #[must_use]
    pub const fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Dancers currently cycling, in snake slot order.
    #[must_use]
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    #[must_use]
    pub fn snake(&self) -> &[LatticeCell] {
        &self.snake
    }

    #[must_use]
    pub fn parked(&self) -> &[MatchedPair] {
        &self.parked
    }

    /// Current destination of `dancer`, if the controller assigned one.
    #[must_use]
    pub fn destination(&self, dancer: usize) -> Option<Position> {
        self.destinations.get(dancer).copied().flatten()
    }

    /// True once every cycling dancer has been parked.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.active.is_empty()
    }

    /// Processes one round of engine feedback and returns every dancer's move.
    pub(crate) fn step(
        &mut self,
        positions: &[Position],
        report: &RoundReport,
    ) -> Result<Vec<Displacement>, DanceError> {
        self.round = self.round.next();
        if self.active.is_empty() {
            return Ok(vec![Displacement::zero(); self.dancers]);
        }

        match self.phase {
            Phase::Observe => {
                self.phase = self.phase.flip();
                Ok(vec![Displacement::zero(); self.dancers])
            }
            Phase::Advance => {
                let matches = if self.policy.extracts_matches() {
                    self.detect_soulmates(report)
                } else {
                    Vec::new()
                };
                if matches.is_empty() {
                    self.crawl();
                } else {
                    self.extract(&matches, positions)?;
                }
                self.phase = self.phase.flip();
                Ok(self.displacements(positions))
            }
        }
    }

    /// Soulmate pairs reported by the outbound half of the snake.
    fn detect_soulmates(&self, report: &RoundReport) -> Vec<(usize, usize)> {
        let active: HashSet<usize> = self.active.iter().copied().collect();
        let mut matched = HashSet::new();
        let mut pairs = Vec::new();
        for &dancer in &self.active[..self.active.len() / 2] {
            if report.enjoyment[dancer] != Enjoyment::Soulmate || matched.contains(&dancer) {
                continue;
            }
            let Some(partner) = report.partners[dancer] else {
                warn!(dancer, round = self.round.0, "soulmate reported without a partner");
                continue;
            };
            if partner == dancer || !active.contains(&partner) || matched.contains(&partner) {
                warn!(dancer, partner, round = self.round.0, "ignoring soulmate report");
                continue;
            }
            matched.insert(dancer);
            matched.insert(partner);
            pairs.push((dancer, partner));
        }
        pairs
    }

    /// Moves the last dancer to the first unpinned slot; everyone else shifts up one.
    fn crawl(&mut self) {
        let pinned = self.policy.pinned_slots();
        if self.active.len() > pinned {
            self.active[pinned..].rotate_right(1);
        }
        self.assign_slots();
        debug!(round = self.round.0, active = self.active.len(), "snake crawled");
    }

    fn extract(
        &mut self,
        pairs: &[(usize, usize)],
        positions: &[Position],
    ) -> Result<(), DanceError> {
        let leaving: HashSet<usize> = pairs.iter().flat_map(|(a, b)| [*a, *b]).collect();
        self.active.retain(|dancer| !leaving.contains(dancer));
        self.rethread()?;

        for &(first, second) in pairs {
            let slot = self.nearest_free_slot(positions[first]).ok_or(DanceError::NoFreeSlot {
                first,
                second,
            })?;
            self.lattice.claim(slot, CellState::Parked)?;
            self.lattice.claim(slot.partner(), CellState::Parked)?;
            self.destinations[first] = self.lattice.point(slot);
            self.destinations[second] = self.lattice.point(slot.partner());
            self.parked.push(MatchedPair {
                first,
                second,
                slot,
            });
            info!(
                first,
                second,
                x = slot.x,
                y = slot.y,
                round = self.round.0,
                "soulmates parked"
            );
        }

        if self.active.is_empty() {
            info!(
                round = self.round.0,
                pairs = self.parked.len(),
                "every dancer has found a soulmate"
            );
        }
        Ok(())
    }

    /// Rebuilds the snake for the current active list and reassigns slots in list order.
    fn rethread(&mut self) -> Result<(), DanceError> {
        self.lattice.release_snake();
        self.snake = snake::generate(&self.lattice, self.active.len())?;
        for cell in &self.snake {
            self.lattice.claim(*cell, CellState::Snake)?;
        }
        self.assign_slots();
        debug!(
            round = self.round.0,
            length = self.snake.len(),
            "snake regenerated"
        );
        Ok(())
    }

    fn assign_slots(&mut self) {
        for (dancer, cell) in self.active.iter().zip(&self.snake) {
            self.destinations[*dancer] = self.lattice.point(*cell);
        }
    }

    /// Free column pair closest to `origin`.
    fn nearest_free_slot(&self, origin: Position) -> Option<LatticeCell> {
        let lattice = &self.lattice;
        let slots = &self.slots;
        self.slot_index
            .nearest((origin.x, origin.y), &mut |idx| {
                let cell = slots[idx];
                lattice.is_free(cell) && lattice.is_free(cell.partner())
            })
            .map(|(idx, _)| slots[idx])
    }

    fn displacements(&self, positions: &[Position]) -> Vec<Displacement> {
        positions
            .iter()
            .zip(&self.destinations)
            .map(|(current, destination)| match destination {
                Some(target) => step_toward(*target, *current, self.arrival_epsilon),
                None => Displacement::zero(),
            })
            .collect()
    }
}
