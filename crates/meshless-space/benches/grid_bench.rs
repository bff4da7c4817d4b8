//! Benchmarks for meshless-space
//!
//! Measures performance of:
//! - Cell grid construction
//! - Ball queries at neighbor-search radii
//! - Slab decomposition

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshless_space::{CellGrid, DVec3, Domain, NeighborQuery, PeriodicBox};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn cloud(n: usize, side: f64) -> Vec<DVec3> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|_| DVec3::new(rng.gen_range(0.0..side), rng.gen_range(0.0..side), rng.gen_range(0.0..side)))
        .collect()
}

/// Benchmark grid construction at increasing sizes
fn bench_grid_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_build");

    for &n in &[1_000usize, 10_000, 100_000] {
        let side = (n as f64).cbrt();
        let positions = cloud(n, side);
        let members: Vec<usize> = (0..n).collect();
        let pbox = PeriodicBox::cube(side).ok();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| CellGrid::build(black_box(&positions), &members, 2.0, pbox))
        });
    }
    group.finish();
}

/// Benchmark queries with radii enclosing ~32 and ~64 members
fn bench_grid_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_query");

    let n = 20_000;
    let side = (n as f64).cbrt();
    let positions = cloud(n, side);
    let members: Vec<usize> = (0..n).collect();
    let pbox = PeriodicBox::cube(side).ok();
    let grid = CellGrid::build(&positions, &members, 2.0, pbox).unwrap();

    for &radius in &[1.97f64, 2.48] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("radius", radius), &radius, |b, &r| {
            let mut k = 0usize;
            b.iter(|| {
                k = (k + 7919) % n;
                grid.query(black_box(positions[k]), r).count()
            })
        });
    }
    group.finish();
}

/// Benchmark slab decomposition
fn bench_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");

    let n = 50_000;
    let side = (n as f64).cbrt();
    let positions = cloud(n, side);
    let members: Vec<usize> = (0..n).collect();

    for &parts in &[1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(parts), &parts, |b, &p| {
            b.iter(|| Domain::decompose(black_box(&positions), &members, p, 2.0, None))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid_build, bench_grid_query, bench_decompose);
criterion_main!(benches);
