use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::Rng;
use rand_core::SeedableRng;

use duelmind::game::{Catalog, Controller};
use duelmind::strategies::mcts::ucb::{UcbConfig, UcbSearch};
use duelmind::strategies::{AiPlayer, AiWorker};

fn random_playout(c: &mut Criterion) {
    let catalog = Catalog::new();
    c.bench_function("random_playout", |b| {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut moves = Vec::new();
        b.iter(|| {
            let mut game = Controller::new(&catalog, &mut rng);
            loop {
                game.enumerate_moves(&mut moves);
                let mv = moves[rng.gen_range(0..moves.len())];
                if game.play(mv, &mut rng) {
                    break;
                }
            }
            game.winner()
        });
    });
}

fn ucb_decision(c: &mut Criterion) {
    let catalog = Catalog::new();
    let mut group = c.benchmark_group("ucb_decision");
    group.sample_size(10);
    for iterations in [250, 500, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &iterations| {
                let mut rng = SmallRng::seed_from_u64(2);
                let game = Controller::with_auto_draft(&catalog, &mut rng);
                let mut moves = Vec::new();
                game.enumerate_moves(&mut moves);
                let search = UcbSearch::new(UcbConfig {
                    iterations,
                    samples: 2,
                    ..Default::default()
                });
                b.iter(|| {
                    let mut worker = search.worker();
                    worker.select_move(&game, &moves, &mut rng)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, random_playout, ucb_decision);
criterion_main!(benches);
