use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use sqdance_core::{
    DanceConfig, DanceStrategy, NO_PARTNER, RoundFeedback, SlotSearchKind, SnakeStrategy,
};
use std::time::Duration;

fn bench_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("snake_rounds");
    let rounds: usize = std::env::var("SQDANCE_BENCH_ROUNDS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(200);
    group.measurement_time(Duration::from_secs(5));

    for (dancers, side) in [(200_usize, 30.0), (1000, 60.0)] {
        for (label, search) in [
            ("linear", SlotSearchKind::LinearScan),
            ("bucket", SlotSearchKind::BucketGrid { cell_size: 2.0 }),
        ] {
            let config = DanceConfig {
                slot_search: search,
                ..DanceConfig::default()
            };
            group.bench_function(format!("{label}_dancers{dancers}_rounds{rounds}"), |b| {
                b.iter_batched(
                    || SnakeStrategy::initialize(dancers, side, &config).expect("strategy"),
                    |mut strategy| {
                        let mut positions = strategy.starting_positions();
                        let scores = vec![0; dancers];
                        let mut partners = vec![NO_PARTNER; dancers];
                        let mut enjoyment = vec![0; dancers];
                        for round in 0..rounds {
                            // Pair the head of the snake with its neighbour every few rounds.
                            if round % 6 == 5 {
                                let active = strategy.controller().active();
                                if active.len() >= 2 {
                                    let (a, b) = (active[0], active[active.len() - 1]);
                                    partners[a] = b as i32;
                                    partners[b] = a as i32;
                                    enjoyment[a] = 6;
                                    enjoyment[b] = 6;
                                }
                            }
                            let moves = strategy
                                .play(&RoundFeedback {
                                    positions: &positions,
                                    scores: &scores,
                                    partner_ids: &partners,
                                    enjoyment_gained: &enjoyment,
                                })
                                .expect("round");
                            for (p, m) in positions.iter_mut().zip(&moves) {
                                *p = p.offset(*m);
                            }
                            partners.fill(NO_PARTNER);
                            enjoyment.fill(0);
                        }
                        strategy
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_rounds);
criterion_main!(benches);
