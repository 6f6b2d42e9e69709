//! Benchmark of random forest fitting and the randomized search
//!
//! Run with: cargo bench --bench forest_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use faer::Mat;
use rand::prelude::*;
use rand::SeedableRng;

use boxoffice::pipeline::models::{ForestParams, RandomForestRegressor, Regressor};
use boxoffice::pipeline::tune::{randomized_search, ForestParamGrid, SearchConfig};

/// Features in [0, 100) and a target that depends on the first three
fn generate_regression_data(n_rows: usize, n_features: usize, seed: u64) -> (Mat<f64>, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..n_rows * n_features)
        .map(|_| rng.gen::<f64>() * 100.0)
        .collect();
    let x = Mat::from_fn(n_rows, n_features, |i, j| values[i * n_features + j]);
    let y = (0..n_rows)
        .map(|i| 3.0 * x[(i, 0)] - 2.0 * x[(i, 1)] + x[(i, 2)] * x[(i, 2)] / 50.0 + rng.gen::<f64>())
        .collect();
    (x, y)
}

fn benchmark_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit_by_rows");
    group.sample_size(10);

    for n_rows in [500, 1_000, 4_000] {
        let (x, y) = generate_regression_data(n_rows, 20, 42);
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut forest = RandomForestRegressor::new(ForestParams {
                    n_estimators: 50,
                    ..Default::default()
                });
                let _ = forest.fit(black_box(*x), black_box(*y));
            });
        });
    }

    group.finish();
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("randomized_search");
    group.sample_size(10);

    let (x, y) = generate_regression_data(1_000, 20, 11);
    let grid = ForestParamGrid {
        n_estimators: vec![20, 50],
        ..Default::default()
    };

    for n_iter in [2, 5] {
        let config = SearchConfig {
            n_iter,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(n_iter), &config, |b, config| {
            b.iter(|| {
                let _ = randomized_search(black_box(&x), black_box(&y), &grid, config);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_forest_fit, benchmark_search);
criterion_main!(benches);
