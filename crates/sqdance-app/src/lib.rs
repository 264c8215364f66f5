//! Headless round driver for sqdance strategies.

use serde::Serialize;
use sqdance_core::{DanceStrategy, SnakeStrategy};
use tracing::{debug, info};

pub mod floor;

pub use floor::{DanceFloor, FloorConfig, FloorError, Relation};

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub rounds: usize,
    pub dancers: usize,
    pub total_score: i64,
    pub best_score: i32,
    pub worst_score: i32,
    /// Dancers still cycling on the snake.
    pub active_dancers: usize,
    /// Soulmate pairs parked off the snake.
    pub parked_pairs: usize,
}

/// Drives `strategy` on `floor` for `rounds` rounds.
pub fn run_session(
    strategy: &mut dyn DanceStrategy,
    floor: &mut DanceFloor,
    rounds: usize,
) -> Result<(), FloorError> {
    for round in 0..rounds {
        let moves = strategy.play(&floor.feedback())?;
        floor.apply(&moves)?;
        floor.resolve_round();
        debug!(round, "round resolved");
    }
    Ok(())
}

/// Runs the snake strategy end to end and summarises the floor.
pub fn run_snake_session(
    strategy: &mut SnakeStrategy,
    floor_config: &FloorConfig,
    rounds: usize,
) -> Result<SessionSummary, FloorError> {
    let mut floor = DanceFloor::new(floor_config, strategy.starting_positions())?;
    info!(
        strategy = strategy.name(),
        dancers = floor.dancers(),
        rounds,
        "starting session"
    );
    run_session(strategy, &mut floor, rounds)?;

    let scores = floor.scores();
    let controller = strategy.controller();
    Ok(SessionSummary {
        rounds,
        dancers: floor.dancers(),
        total_score: scores.iter().map(|s| i64::from(*s)).sum(),
        best_score: scores.iter().copied().max().unwrap_or_default(),
        worst_score: scores.iter().copied().min().unwrap_or_default(),
        active_dancers: controller.active().len(),
        parked_pairs: controller.parked().len(),
    })
}
