use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};
use single_correlation::{decompose, kendall_pearson, spearman_pearson};
use std::time::Duration;

#[derive(Clone)]
pub struct DecomposeConfig {
    seed: u64,
    dimensions: Vec<usize>,
    retentions: Vec<f64>,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dimensions: vec![4, 16, 64, 256],
            retentions: vec![0.9, 1.0],
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

fn create_covariance(m: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value_dist = Uniform::try_from(-1.0..1.0).unwrap();
    let b = Array2::from_shape_fn((m, m), |_| value_dist.sample(&mut rng));
    b.dot(&b.t()).iter().copied().collect()
}

fn configure_group<'a, M: Measurement>(
    c: &'a mut Criterion<M>,
    name: &str,
    config: &DecomposeConfig,
) -> BenchmarkGroup<'a, M> {
    let mut group = c.benchmark_group(name);
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);
    group
}

pub fn bench_decompose(c: &mut Criterion) {
    let config = DecomposeConfig::default();
    let mut group = configure_group(c, "Decompose", &config);

    for &m in config.dimensions.iter() {
        let covariance = create_covariance(m, config.seed + m as u64);
        for &retention in config.retentions.iter() {
            group.bench_with_input(
                BenchmarkId::new("decompose", format!("{}x{}_r{}", m, m, retention)),
                &(m, retention),
                |b, &(m, retention)| {
                    b.iter(|| decompose(&covariance, m, retention).unwrap());
                },
            );
        }
    }

    group.finish();
}

pub fn bench_coefficients(c: &mut Criterion) {
    let config = DecomposeConfig::default();
    let mut group = configure_group(c, "Coefficients", &config);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let value_dist = Uniform::try_from(-1.0..1.0).unwrap();
    let coefficients: Vec<f64> = (0..100_000).map(|_| value_dist.sample(&mut rng)).collect();

    group.bench_function("spearman_pearson", |b| {
        b.iter(|| spearman_pearson(&coefficients))
    });
    group.bench_function("kendall_pearson", |b| {
        b.iter(|| kendall_pearson(&coefficients))
    });

    group.finish();
}

criterion_group!(benches, bench_decompose, bench_coefficients);
criterion_main!(benches);
