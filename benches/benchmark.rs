use criterion::BenchmarkId;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use kbest_linear_assignment::{ForwardAuctionSolver, MurtyRanker, RankConfig, WeightMatrix};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

type UInt = u32;

fn gen_dense_matrix(seed: u64, num_rows: usize, num_cols: usize) -> WeightMatrix {
    let mut val_rng = ChaCha8Rng::seed_from_u64(seed);
    let between = Uniform::from(1..100);
    let values = (0..num_rows * num_cols)
        .map(|_| between.sample(&mut val_rng) as f64)
        .collect();
    WeightMatrix::new(num_rows, num_cols, values).expect("valid dimensions")
}

fn bench_kbest_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("murty_auction");
    for &size in [5usize, 8, 10].iter() {
        let num_cols = size + 2;
        let weights = gen_dense_matrix(1, size, num_cols);
        let ranker = MurtyRanker::new(RankConfig::default());
        group.bench_with_input(BenchmarkId::new("kbest10", size), &size, |b, _| {
            b.iter_batched(
                || ForwardAuctionSolver::<UInt>::new(size, num_cols, size * num_cols),
                |mut solver| {
                    ranker
                        .rank::<UInt, _>(&mut solver, &weights, 10)
                        .expect("ranking succeeds")
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kbest_ranking);
criterion_main!(benches);
