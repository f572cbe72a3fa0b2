use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::config::CatConfig;
use adaptest_core::estimator::AbilityEstimator;
use adaptest_core::irt::{information, test_information};
use adaptest_core::model::ItemParams;

fn item_bank(n: usize) -> Vec<ItemParams> {
    (0..n)
        .map(|i| {
            let b = -3.0 + 6.0 * i as f64 / n.max(2) as f64;
            ItemParams::new(0.8 + (i % 4) as f64 * 0.3, b, 0.2, 0.95)
        })
        .collect()
}

fn responses(n: usize) -> Vec<bool> {
    (0..n).map(|i| i % 3 != 0).collect()
}

fn bench_information(c: &mut Criterion) {
    let mut group = c.benchmark_group("information");

    group.bench_function("single item", |b| {
        b.iter(|| information(black_box(0.3), 1.2, 0.0, 0.2, 0.95))
    });

    let bank = item_bank(40);
    group.bench_function("test information, 40 items", |b| {
        b.iter(|| test_information(black_box(0.3), black_box(&bank)))
    });

    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate");
    let estimator = AbilityEstimator::new(CatConfig::default());

    for n in [3usize, 12, 40] {
        let items = item_bank(n);
        let answers = responses(n);
        group.bench_function(format!("mle, {n} responses"), |b| {
            b.iter(|| estimator.estimate(black_box(&answers), black_box(&items), 0.0))
        });
    }

    let items = item_bank(12);
    let all_correct = vec![true; 12];
    group.bench_function("ceiling, 12 responses", |b| {
        b.iter(|| estimator.estimate(black_box(&all_correct), black_box(&items), 0.0))
    });

    group.finish();
}

criterion_group!(benches, bench_information, bench_estimate);
criterion_main!(benches);
