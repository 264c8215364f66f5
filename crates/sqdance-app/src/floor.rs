//! Reference dance floor: applies moves, pairs dancers and scores the round.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sqdance_core::{DanceError, Displacement, Enjoyment, MAX_STEP, NO_PARTNER, Position, RoundFeedback};
use thiserror::Error;

/// Closer than this and two dancers bump into each other.
pub const COLLISION_DISTANCE: f64 = 0.1;
/// Farthest two dancers can be and still dance together.
pub const DANCE_DISTANCE: f64 = 2.0;

const STEP_TOLERANCE: f64 = 1e-7;

/// Errors raised while running the floor.
#[derive(Debug, Error)]
pub enum FloorError {
    #[error("invalid floor configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("dancer {dancer} asked to move {length:.6}m in one round")]
    StepTooLong { dancer: usize, length: f64 },
    #[error("strategy returned {actual} moves for {expected} dancers")]
    WrongMoveCount { expected: usize, actual: usize },
    #[error("got {actual} starting positions for {expected} dancers")]
    StartingCountMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Strategy(#[from] DanceError),
}

/// Relationship between two dancers, fixed for the whole session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Relation {
    Stranger,
    Friend,
    Soulmate,
}

impl Relation {
    #[must_use]
    pub const fn enjoyment(self) -> Enjoyment {
        match self {
            Self::Stranger => Enjoyment::Stranger,
            Self::Friend => Enjoyment::Friend,
            Self::Soulmate => Enjoyment::Soulmate,
        }
    }
}

/// Session parameters for the reference floor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloorConfig {
    pub dancers: usize,
    pub room_side: f64,
    /// Friendships drawn per dancer (symmetric, so real counts may be higher).
    pub friends_per_dancer: usize,
    pub rng_seed: Option<u64>,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            dancers: 40,
            room_side: 20.0,
            friends_per_dancer: 2,
            rng_seed: None,
        }
    }
}

impl FloorConfig {
    fn validate(&self) -> Result<(), FloorError> {
        if self.dancers == 0 {
            return Err(FloorError::InvalidConfig("dancers must be positive"));
        }
        if !(self.room_side.is_finite() && self.room_side > 0.0) {
            return Err(FloorError::InvalidConfig("room_side must be positive"));
        }
        Ok(())
    }

    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}

/// Positions, relationships and per-round outcomes of every dancer.
#[derive(Debug, Clone)]
pub struct DanceFloor {
    room_side: f64,
    positions: Vec<Position>,
    relations: Vec<Relation>,
    remaining: Vec<u32>,
    moved: Vec<bool>,
    scores: Vec<i32>,
    partner_ids: Vec<i32>,
    enjoyment: Vec<i32>,
}

impl DanceFloor {
    /// Draws relationships and places dancers at `starting`.
    pub fn new(config: &FloorConfig, starting: Vec<Position>) -> Result<Self, FloorError> {
        config.validate()?;
        let n = config.dancers;
        if starting.len() != n {
            return Err(FloorError::StartingCountMismatch {
                expected: n,
                actual: starting.len(),
            });
        }

        let mut rng = config.seeded_rng();
        let mut relations = vec![Relation::Stranger; n * n];
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        for pair in order.chunks_exact(2) {
            relations[pair[0] * n + pair[1]] = Relation::Soulmate;
            relations[pair[1] * n + pair[0]] = Relation::Soulmate;
        }
        if n > 2 {
            for dancer in 0..n {
                for _ in 0..config.friends_per_dancer {
                    let other = rng.random_range(0..n);
                    if other != dancer && relations[dancer * n + other] == Relation::Stranger {
                        relations[dancer * n + other] = Relation::Friend;
                        relations[other * n + dancer] = Relation::Friend;
                    }
                }
            }
        }

        let mut remaining = Vec::with_capacity(n * n);
        for relation in &relations {
            remaining.push(relation.enjoyment().total_budget()?);
        }

        Ok(Self {
            room_side: config.room_side,
            positions: starting,
            relations,
            remaining,
            moved: vec![false; n],
            scores: vec![0; n],
            partner_ids: vec![NO_PARTNER; n],
            enjoyment: vec![0; n],
        })
    }

    #[must_use]
    pub fn dancers(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    #[must_use]
    pub fn scores(&self) -> &[i32] {
        &self.scores
    }

    #[must_use]
    pub fn relation(&self, a: usize, b: usize) -> Relation {
        self.relations[a * self.dancers() + b]
    }

    /// Feedback for the strategy's next call.
    #[must_use]
    pub fn feedback(&self) -> RoundFeedback<'_> {
        RoundFeedback {
            positions: &self.positions,
            scores: &self.scores,
            partner_ids: &self.partner_ids,
            enjoyment_gained: &self.enjoyment,
        }
    }

    /// Applies one move per dancer, clamping everyone to the room.
    pub fn apply(&mut self, moves: &[Displacement]) -> Result<(), FloorError> {
        if moves.len() != self.dancers() {
            return Err(FloorError::WrongMoveCount {
                expected: self.dancers(),
                actual: moves.len(),
            });
        }
        if let Some((dancer, step)) = moves
            .iter()
            .enumerate()
            .find(|(_, step)| step.magnitude() > MAX_STEP + STEP_TOLERANCE)
        {
            return Err(FloorError::StepTooLong {
                dancer,
                length: step.magnitude(),
            });
        }
        for ((position, step), moved) in self.positions.iter_mut().zip(moves).zip(&mut self.moved) {
            let next = position.offset(*step);
            *position = Position::new(
                next.x.clamp(0.0, self.room_side),
                next.y.clamp(0.0, self.room_side),
            );
            *moved = !step.is_zero();
        }
        Ok(())
    }

    /// Pairs mutual nearest neighbours and scores the round.
    pub fn resolve_round(&mut self) {
        let n = self.dancers();
        let nearest: Vec<Option<(usize, f64)>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|j| *j != i)
                    .map(|j| (j, self.positions[i].distance(self.positions[j])))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
            })
            .collect();

        self.partner_ids.fill(NO_PARTNER);
        self.enjoyment.fill(Enjoyment::Idle.value());
        for i in 0..n {
            let Some((j, distance)) = nearest[i] else {
                continue;
            };
            if distance < COLLISION_DISTANCE {
                self.enjoyment[i] = Enjoyment::Incompatible.value();
                continue;
            }
            let mutual = matches!(nearest[j], Some((k, _)) if k == i);
            if !mutual || distance > DANCE_DISTANCE || self.moved[i] || self.moved[j] {
                continue;
            }
            self.partner_ids[i] = j as i32;
            let relation = self.relation(i, j);
            let budget = &mut self.remaining[i * n + j];
            let gained = relation.enjoyment().value() as u32;
            if *budget >= gained {
                *budget -= gained;
                self.enjoyment[i] = gained as i32;
            }
        }
        for (score, gained) in self.scores.iter_mut().zip(&self.enjoyment) {
            *score += gained;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor(positions: Vec<Position>) -> DanceFloor {
        let config = FloorConfig {
            dancers: positions.len(),
            room_side: 10.0,
            friends_per_dancer: 0,
            rng_seed: Some(7),
        };
        DanceFloor::new(&config, positions).expect("floor")
    }

    #[test]
    fn mutual_neighbours_dance() {
        let mut floor = floor(vec![
            Position::new(1.0, 1.0),
            Position::new(1.5, 1.0),
            Position::new(6.0, 6.0),
        ]);
        floor.resolve_round();
        let feedback = floor.feedback();
        assert_eq!(feedback.partner_ids, &[1, 0, NO_PARTNER]);
        assert!(feedback.enjoyment_gained[0] > 0);
        assert_eq!(feedback.enjoyment_gained[2], 0);
    }

    #[test]
    fn moving_dancers_do_not_dance() {
        let mut floor = floor(vec![Position::new(1.0, 1.0), Position::new(1.5, 1.0)]);
        floor
            .apply(&[Displacement::new(0.0, 0.2), Displacement::zero()])
            .expect("apply");
        floor.resolve_round();
        assert_eq!(floor.feedback().partner_ids, &[NO_PARTNER, NO_PARTNER]);
    }

    #[test]
    fn collisions_cost_enjoyment() {
        let mut floor = floor(vec![Position::new(1.0, 1.0), Position::new(1.05, 1.0)]);
        floor.resolve_round();
        assert_eq!(floor.scores(), &[-5, -5]);
    }

    #[test]
    fn oversized_steps_are_rejected() {
        let mut floor = floor(vec![Position::new(1.0, 1.0), Position::new(3.0, 1.0)]);
        let err = floor
            .apply(&[Displacement::new(1.0, 1.0), Displacement::zero()])
            .unwrap_err();
        assert!(matches!(err, FloorError::StepTooLong { dancer: 0, .. }));
    }

    #[test]
    fn starting_positions_must_match_the_dancer_count() {
        let config = FloorConfig {
            dancers: 3,
            ..FloorConfig::default()
        };
        let err = DanceFloor::new(&config, vec![Position::default(); 2]).unwrap_err();
        assert!(matches!(
            err,
            FloorError::StartingCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(err.to_string(), "got 2 starting positions for 3 dancers");
    }

    #[test]
    fn wrong_move_count_is_rejected() {
        let mut floor = floor(vec![Position::new(1.0, 1.0), Position::new(3.0, 1.0)]);
        let err = floor.apply(&[Displacement::zero()]).unwrap_err();
        assert!(matches!(
            err,
            FloorError::WrongMoveCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn two_dancers_are_soulmates() {
        let floor = floor(vec![Position::new(1.0, 1.0), Position::new(2.0, 1.0)]);
        assert_eq!(floor.relation(0, 1), Relation::Soulmate);
    }
}
