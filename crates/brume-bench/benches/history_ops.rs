//! Criterion micro-benchmarks for history rotation and restart storage.

use std::sync::Arc;

use brume_adjoint::HistoryRotator;
use brume_bench::{seeded_archive, unsteady_zone};
use brume_core::{ModuleKind, ZoneId};
use brume_physics::{MemoryStorage, RestartStorage, SnapshotKey};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Benchmark: shift the three-level history of a 100K-point zone by
/// one physical step.
fn bench_advance_histories_100k(c: &mut Criterion) {
    let mut zone = unsteady_zone(100_000);

    c.bench_function("advance_histories_100k", |b| {
        b.iter(|| {
            zone.advance_histories();
            black_box(zone.module_count());
        });
    });
}

/// Benchmark: store and reload one 100K-point snapshot.
fn bench_snapshot_roundtrip_100k(c: &mut Criterion) {
    let mut storage = MemoryStorage::new();
    let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 0);
    let data = vec![1.5_f64; 100_000];

    c.bench_function("snapshot_roundtrip_100k", |b| {
        b.iter(|| {
            storage.store(key, data.clone());
            let loaded = storage.load(key).unwrap();
            black_box(loaded.len());
        });
    });
}

/// Benchmark: a cold rotation at 10K points, fetching all three time
/// levels from the archive.
fn bench_cold_rotation_10k(c: &mut Criterion) {
    let mut zone = unsteady_zone(10_000);
    let rotator = HistoryRotator::new(Arc::new(seeded_archive(10_000, 10)), 10);

    c.bench_function("cold_rotation_10k", |b| {
        b.iter(|| {
            let report = rotator.rotate(&mut zone, 0);
            black_box(report.loads.len());
        });
    });
}

criterion_group!(
    benches,
    bench_advance_histories_100k,
    bench_snapshot_roundtrip_100k,
    bench_cold_rotation_10k
);
criterion_main!(benches);
