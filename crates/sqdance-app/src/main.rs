use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sqdance_app::{FloorConfig, run_snake_session};
use sqdance_core::{DanceConfig, FormationPolicy, SnakeStrategy};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Dancer 0 stands still, everyone else cycles forever.
    Cycle,
    /// Soulmates leave the snake and park on free lattice cells.
    Extract,
}

impl From<PolicyArg> for FormationPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Cycle => Self::CycleOnly,
            PolicyArg::Extract => Self::ExtractOnMatch,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sqdance",
    version,
    about = "Run the lattice snake strategy on a reference dance floor"
)]
struct Cli {
    /// Number of dancers on the floor.
    #[arg(short, long, default_value_t = 40)]
    dancers: usize,
    /// Side length of the square room in metres.
    #[arg(long, default_value_t = 20.0)]
    room_side: f64,
    /// Rounds to simulate.
    #[arg(short, long, default_value_t = 1_800)]
    rounds: usize,
    /// Formation policy; overrides the config file.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Friendships drawn per dancer.
    #[arg(long, default_value_t = 2)]
    friends: usize,
    /// Seed for the floor's relationships.
    #[arg(long, env = "SQDANCE_SEED")]
    seed: Option<u64>,
    /// JSON file with a strategy configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(policy) = cli.policy {
        config.policy = policy.into();
    }
    let floor_config = FloorConfig {
        dancers: cli.dancers,
        room_side: cli.room_side,
        friends_per_dancer: cli.friends,
        rng_seed: cli.seed,
    };

    let mut strategy = SnakeStrategy::initialize(cli.dancers, cli.room_side, &config)
        .context("failed to initialise snake strategy")?;
    let summary = run_snake_session(&mut strategy, &floor_config, cli.rounds)
        .context("session aborted")?;

    info!(
        rounds = summary.rounds,
        total_score = summary.total_score,
        best = summary.best_score,
        worst = summary.worst_score,
        parked_pairs = summary.parked_pairs,
        "session finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<DanceConfig> {
    let Some(path) = path else {
        return Ok(DanceConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: DanceConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
