//! Criterion micro-benchmarks for pool allocation, reset, and teardown.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use regionpool::Pool;
use regionpool_bench::{request_sizes, session_workload};

/// Benchmark: 1000 aligned small allocations into a fresh 16 KiB pool.
fn bench_small_alloc_1k(c: &mut Criterion) {
    let sizes = request_sizes(1000, 128, 42);
    c.bench_function("small_alloc_1k", |b| {
        b.iter(|| {
            let mut pool = Pool::new().unwrap();
            for &size in &sizes {
                black_box(pool.allocate(size).unwrap());
            }
            black_box(pool.destroy());
        });
    });
}

/// Benchmark: 1000 small allocations into a pool reset between iterations,
/// so block growth is paid only once.
fn bench_small_alloc_after_reset(c: &mut Criterion) {
    let sizes = request_sizes(1000, 128, 42);
    let mut pool = Pool::new().unwrap();
    c.bench_function("small_alloc_after_reset", |b| {
        b.iter(|| {
            for &size in &sizes {
                black_box(pool.allocate(size).unwrap());
            }
            pool.reset();
        });
    });
}

/// Benchmark: oversized allocate + free cycle hitting slot reuse.
fn bench_oversized_reuse(c: &mut Criterion) {
    let mut pool = Pool::new().unwrap();
    c.bench_function("oversized_alloc_free", |b| {
        b.iter(|| {
            let handle = pool.allocate(64 * 1024).unwrap();
            pool.free(black_box(&handle));
        });
    });
}

/// Benchmark: a full call-scoped session followed by destroy.
fn bench_session(c: &mut Criterion) {
    let sizes = request_sizes(256, 256, 7);
    c.bench_function("session_destroy", |b| {
        b.iter(|| {
            let mut pool = Pool::new().unwrap();
            let total = session_workload(&mut pool, &sizes, 32, true).unwrap();
            black_box(total);
            black_box(pool.destroy());
        });
    });
}

criterion_group!(
    benches,
    bench_small_alloc_1k,
    bench_small_alloc_after_reset,
    bench_oversized_reuse,
    bench_session
);
criterion_main!(benches);
