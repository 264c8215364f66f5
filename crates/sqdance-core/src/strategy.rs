//! Round-trip contract between the dance engine and a movement strategy.

use tracing::info;

use crate::{
    DanceConfig, DanceError, Displacement, Enjoyment, FormationController, NO_PARTNER, Position,
};

/// Everything the engine reports at the start of a round, indexed by dancer id.
#[derive(Debug, Clone, Copy)]
pub struct RoundFeedback<'a> {
    pub positions: &'a [Position],
    /// Cumulative scores; carried for strategies that weigh them.
    pub scores: &'a [i32],
    /// Partner of each dancer last round, `-1` when alone.
    pub partner_ids: &'a [i32],
    /// Enjoyment gained last round: one of -5, 0, 3, 4, 6.
    pub enjoyment_gained: &'a [i32],
}

/// Feedback after validation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoundReport {
    pub(crate) partners: Vec<Option<usize>>,
    pub(crate) enjoyment: Vec<Enjoyment>,
}

impl RoundFeedback<'_> {
    /// Checks lengths, partner ids and enjoyment tiers for `dancers` dancers.
    pub(crate) fn check(&self, dancers: usize) -> Result<RoundReport, DanceError> {
        for (field, actual) in [
            ("positions", self.positions.len()),
            ("scores", self.scores.len()),
            ("partner_ids", self.partner_ids.len()),
            ("enjoyment_gained", self.enjoyment_gained.len()),
        ] {
            if actual != dancers {
                return Err(DanceError::LengthMismatch {
                    field,
                    expected: dancers,
                    actual,
                });
            }
        }

        let partners = self
            .partner_ids
            .iter()
            .enumerate()
            .map(|(dancer, &partner)| match partner {
                NO_PARTNER => Ok(None),
                p if p >= 0 && (p as usize) < dancers => Ok(Some(p as usize)),
                p => Err(DanceError::InvalidPartner { dancer, partner: p }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let enjoyment = self
            .enjoyment_gained
            .iter()
            .map(|value| Enjoyment::try_from(*value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RoundReport {
            partners,
            enjoyment,
        })
    }
}

/// Movement strategy driven by the dance engine.
pub trait DanceStrategy: Send {
    /// Stable identifier for logging.
    fn name(&self) -> &'static str;

    /// Number of dancers this strategy controls.
    fn dancers(&self) -> usize;

    /// Where each dancer starts, indexed by dancer id.
    fn starting_positions(&self) -> Vec<Position>;

    /// Requested displacement of every dancer for the coming round.
    fn play(&mut self, feedback: &RoundFeedback<'_>) -> Result<Vec<Displacement>, DanceError>;
}

/// Lattice snake strategy: cycles dancers past each other and parks soulmates.
#[derive(Debug)]
pub struct SnakeStrategy {
    controller: FormationController,
    starting: Vec<Position>,
}

impl SnakeStrategy {
    /// One-time setup for `dancers` dancers in a square room of side `arena_side`.
    pub fn initialize(
        dancers: usize,
        arena_side: f64,
        config: &DanceConfig,
    ) -> Result<Self, DanceError> {
        let controller = FormationController::new(dancers, arena_side, config)?;
        let starting = (0..dancers)
            .map(|id| controller.destination(id).unwrap_or_default())
            .collect();
        info!(
            dancers,
            arena_side,
            policy = ?config.policy,
            cols = controller.lattice().cols(),
            rows = controller.lattice().rows(),
            "snake strategy initialised"
        );
        Ok(Self {
            controller,
            starting,
        })
    }

    /// Initialize with the default configuration.
    pub fn new(dancers: usize, arena_side: f64) -> Result<Self, DanceError> {
        Self::initialize(dancers, arena_side, &DanceConfig::default())
    }

    #[must_use]
    pub const fn controller(&self) -> &FormationController {
        &self.controller
    }
}

impl DanceStrategy for SnakeStrategy {
    fn name(&self) -> &'static str {
        "snake"
    }

    fn dancers(&self) -> usize {
        self.controller.dancers()
    }

    fn starting_positions(&self) -> Vec<Position> {
        self.starting.clone()
    }

    fn play(&mut self, feedback: &RoundFeedback<'_>) -> Result<Vec<Displacement>, DanceError> {
        let report = feedback.check(self.controller.dancers())?;
        self.controller.step(feedback.positions, &report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rejects_malformed_feedback() {
        let positions = vec![Position::default(); 3];
        let scores = vec![0; 3];
        let partners = vec![-1, 2, 1];
        let enjoyment = vec![0, 3, 3];
        let feedback = RoundFeedback {
            positions: &positions,
            scores: &scores,
            partner_ids: &partners,
            enjoyment_gained: &enjoyment,
        };
        let report = feedback.check(3).expect("valid");
        assert_eq!(report.partners, vec![None, Some(2), Some(1)]);
        assert_eq!(
            report.enjoyment,
            vec![Enjoyment::Idle, Enjoyment::Stranger, Enjoyment::Stranger]
        );

        assert_eq!(
            feedback.check(4),
            Err(DanceError::LengthMismatch {
                field: "positions",
                expected: 4,
                actual: 3
            })
        );

        let bad_partner = vec![-1, 7, 1];
        let feedback = RoundFeedback {
            partner_ids: &bad_partner,
            ..feedback
        };
        assert_eq!(
            feedback.check(3),
            Err(DanceError::InvalidPartner {
                dancer: 1,
                partner: 7
            })
        );

        let bad_enjoyment = vec![0, 5, 3];
        let feedback = RoundFeedback {
            partner_ids: &partners,
            enjoyment_gained: &bad_enjoyment,
            ..feedback
        };
        assert_eq!(feedback.check(3), Err(DanceError::InvalidEnjoyment(5)));
    }

    #[test]
    fn starting_positions_follow_the_snake() {
        let strategy = SnakeStrategy::new(8, 6.0).expect("strategy");
        let starting = strategy.starting_positions();
        let controller = strategy.controller();
        assert_eq!(starting.len(), 8);
        for (slot, cell) in controller.snake().iter().enumerate() {
            assert_eq!(Some(starting[slot]), controller.lattice().point(*cell));
        }
    }

    #[test]
    fn offset_lattice_keeps_dancers_in_the_room() {
        let config = DanceConfig {
            grid_offset_x: 0.6,
            grid_offset_y: 0.6,
            ..DanceConfig::default()
        };
        let strategy = SnakeStrategy::initialize(6, 3.2, &config).expect("strategy");
        for p in strategy.starting_positions() {
            assert!((0.0..=3.2).contains(&p.x) && (0.0..=3.2).contains(&p.y), "{p:?}");
        }
        assert_eq!(
            SnakeStrategy::new(4, 1e25).unwrap_err(),
            DanceError::InvalidConfig("room is too large for the lattice")
        );
    }

    #[test]
    fn rejects_empty_floor() {
        assert_eq!(
            SnakeStrategy::new(0, 10.0).unwrap_err(),
            DanceError::InvalidConfig("dancer count must be positive")
        );
    }
}
