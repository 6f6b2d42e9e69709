//! Benchmark of nearest-neighbour imputation by table size and weighting
//!
//! Run with: cargo bench --bench imputation_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use boxoffice::pipeline::{KnnImputer, Weighting};

/// Numeric movie-like columns with about 5% of cells missing
fn generate_test_dataframe(n_rows: usize, n_features: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let columns: Vec<Column> = (0..n_features)
        .map(|i| {
            let scale = 10f64.powi((i % 6) as i32 + 1);
            let values: Vec<Option<f64>> = (0..n_rows)
                .map(|_| {
                    if rng.gen::<f64>() < 0.05 {
                        None
                    } else {
                        Some(rng.gen::<f64>() * scale)
                    }
                })
                .collect();
            Column::new(format!("feature_{}", i).into(), values)
        })
        .collect();

    DataFrame::new(columns).expect("Failed to create DataFrame")
}

fn benchmark_imputation_by_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_imputation_by_rows");
    group.sample_size(10);

    let n_cols = 8;
    for n_rows in [500, 1_000, 2_500, 5_000] {
        let df = generate_test_dataframe(n_rows, n_cols, 42);
        let names: Vec<String> = (0..n_cols).map(|i| format!("feature_{}", i)).collect();
        group.throughput(Throughput::Elements(n_rows as u64));

        for weighting in [Weighting::Uniform, Weighting::Distance] {
            let imputer = KnnImputer::new(5, weighting);
            group.bench_with_input(
                BenchmarkId::new(weighting.to_string(), n_rows),
                &(&df, &names),
                |b, (df, names)| {
                    b.iter(|| {
                        let _ = imputer.fit_transform(black_box(*df), black_box(*names));
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_imputation_by_neighbors(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_imputation_by_neighbors");
    group.sample_size(10);

    let df = generate_test_dataframe(2_000, 8, 7);
    let names: Vec<String> = (0..8).map(|i| format!("feature_{}", i)).collect();

    for k in [1, 5, 15, 50] {
        let imputer = KnnImputer::new(k, Weighting::Distance);
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, _| {
            b.iter(|| {
                let _ = imputer.fit_transform(black_box(&df), black_box(&names));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_imputation_by_rows,
    benchmark_imputation_by_neighbors
);
criterion_main!(benches);
