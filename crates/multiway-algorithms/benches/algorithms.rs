//! Performance benchmarks for the multiway algorithms
//!
//! Every build runs a fixed number of iterations so timings are comparable
//! across sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use multiway_algorithms::{
    Criterion as StopCriterion, Model, NPls, NPlsConfig, Ntf, NtfConfig, NtfUpdate, Parafac,
    ParafacConfig, PcaConfig, Pls2, PlsConfig, Supervised, TwoWayPca, Unsupervised,
};
use multiway_core::Tensor;
use std::hint::black_box;

// ============================================================================
// Decompositions
// ============================================================================

fn bench_parafac(c: &mut Criterion) {
    let mut group = c.benchmark_group("parafac");

    for &(size, rank) in &[(16, 2), (16, 4), (32, 4)] {
        let x = Tensor::random_normal(&[size, size, size], 1);

        group.throughput(Throughput::Elements((size * size * size) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}x{}_r{}", size, size, size, rank)),
            &(x, rank),
            |b, (x, rank)| {
                b.iter(|| {
                    let mut model =
                        Parafac::with_config(ParafacConfig::default().with_num_components(*rank));
                    model.add_criterion(StopCriterion::iterations(10)).ok();
                    black_box(model.build(black_box(x)))
                })
            },
        );
    }

    group.finish();
}

fn bench_ntf(c: &mut Criterion) {
    let mut group = c.benchmark_group("ntf");
    let x = Tensor::random_normal(&[20, 20, 20], 2).abs();

    for update in [NtfUpdate::Normalized, NtfUpdate::IterationCustom] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", update)),
            &update,
            |b, &update| {
                b.iter(|| {
                    let config = NtfConfig::default().with_num_components(4).with_update(update);
                    let mut model = Ntf::with_config(config);
                    model.add_criterion(StopCriterion::iterations(20)).ok();
                    black_box(model.build(black_box(&x)))
                })
            },
        );
    }

    group.finish();
}

fn bench_pca(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_way_pca");

    for &(rows, cols) in &[(200, 20), (20, 200)] {
        let x = Tensor::random_normal(&[rows, cols], 3);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", rows, cols)),
            &x,
            |b, x| {
                b.iter(|| {
                    let mut model =
                        TwoWayPca::with_config(PcaConfig::default().with_num_components(5));
                    black_box(model.build(black_box(x)))
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Regression
// ============================================================================

fn bench_pls2(c: &mut Criterion) {
    let mut group = c.benchmark_group("pls2");

    for &(rows, cols) in &[(100, 10), (100, 50)] {
        let x = Tensor::random_normal(&[rows, cols], 4);
        let y = Tensor::random_normal(&[rows, 3], 5);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", rows, cols)),
            &(x, y),
            |b, (x, y)| {
                b.iter(|| {
                    let mut model = Pls2::with_config(PlsConfig::default().with_num_components(5));
                    black_box(model.build(black_box(x), black_box(y)))
                })
            },
        );
    }

    group.finish();
}

fn bench_npls(c: &mut Criterion) {
    let mut group = c.benchmark_group("npls");
    group.sample_size(20);

    let x = Tensor::random_normal(&[50, 10, 8], 6);
    let y = Tensor::random_normal(&[50, 2], 7);
    group.bench_function("50x10x8_a3", |b| {
        b.iter(|| {
            let mut model = NPls::with_config(NPlsConfig::default().with_num_components(3));
            black_box(model.build(black_box(&x), black_box(&y)))
        })
    });

    group.finish();
}

criterion_group!(decompositions, bench_parafac, bench_ntf, bench_pca);
criterion_group!(regression, bench_pls2, bench_npls);
criterion_main!(decompositions, regression);
