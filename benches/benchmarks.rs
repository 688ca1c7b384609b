use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mosaic_compute::linear_ops::{eigen, generate_grid, rotation_matrix, transform, PointSource};
use mosaic_compute::statistics::{compute_statistics, correlation, histogram};
use mosaic_compute::{Dataset, PCA};
use ndarray::{Array, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn generate_data(n_samples: usize, n_features: usize) -> Array2<f64> {
    Array::random((n_samples, n_features), Uniform::new(0., 10.))
}

/// CSV text with `n_cols` numeric columns and roughly 5% missing cells.
fn generate_csv(n_rows: usize, n_cols: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let header: Vec<String> = (0..n_cols).map(|c| format!("c{}", c)).collect();
    let mut text = header.join(",");
    text.push('\n');
    for _ in 0..n_rows {
        let row: Vec<String> = (0..n_cols)
            .map(|_| {
                if rng.gen_bool(0.05) {
                    String::new()
                } else {
                    format!("{:.4}", rng.gen_range(-100.0..100.0))
                }
            })
            .collect();
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

fn bench_pca_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("PCA_fit");

    for &(n_samples, n_features) in [(100, 2), (1000, 2), (500, 10), (2000, 32)].iter() {
        let data = generate_data(n_samples, n_features);
        group.throughput(Throughput::Elements((n_samples * n_features) as u64));
        group.bench_with_input(
            BenchmarkId::new("fit", format!("{}x{}", n_samples, n_features)),
            &data,
            |b, data_matrix| {
                b.iter_with_setup(
                    || (PCA::new(), data_matrix.clone()),
                    |(mut pca, data_to_fit)| pca.fit(data_to_fit).unwrap(),
                );
            },
        );
    }
    group.finish();
}

fn bench_linear_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_ops");

    for &order in [2usize, 8, 32].iter() {
        let matrix = generate_data(order, order);
        group.bench_with_input(BenchmarkId::new("eigen", order), &matrix, |b, m| {
            b.iter(|| eigen(m).unwrap())
        });
    }

    let rotation = rotation_matrix(0.3);
    for &size in [10usize, 100, 500].iter() {
        group.throughput(Throughput::Elements((2 * size * size) as u64));
        group.bench_with_input(BenchmarkId::new("transform_grid", size), &size, |b, &size| {
            b.iter(|| transform(&rotation, PointSource::Grid { size, range: 5.0 }, 500).unwrap())
        });
    }
    group.bench_function("generate_grid_100", |b| b.iter(|| generate_grid(100, 5.0)));
    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for &(n_rows, n_cols) in [(1_000, 4), (10_000, 8), (50_000, 16)].iter() {
        let text = generate_csv(n_rows, n_cols, 7);
        let label = format!("{}x{}", n_rows, n_cols);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", &label), &text, |b, text| {
            b.iter(|| Dataset::parse(text.as_bytes()).unwrap())
        });

        let dataset = Dataset::parse(text.as_bytes()).unwrap();
        group.bench_with_input(BenchmarkId::new("describe", &label), &dataset, |b, ds| {
            b.iter(|| compute_statistics(ds))
        });
        group.bench_with_input(BenchmarkId::new("histogram_50", &label), &dataset, |b, ds| {
            b.iter(|| histogram(ds, "c0", 50).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("correlation", &label), &dataset, |b, ds| {
            b.iter(|| correlation(ds))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pca_fit, bench_linear_ops, bench_statistics);
criterion_main!(benches);
