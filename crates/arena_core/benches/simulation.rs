//! Simulation benchmarks for arena_core.
//!
//! Run with: `cargo bench -p arena_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use arena_test_utils::fixtures;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Tick cost for a typical wave, a boss fight, and a large horde.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_combat_wave", |b| {
        let mut sim = fixtures::combat_scenario(42);
        b.iter(|| {
            black_box(sim.tick());
        });
    });

    c.bench_function("tick_twin_boss", |b| {
        let mut sim = fixtures::twin_boss_scenario(42);
        b.iter(|| {
            black_box(sim.tick());
        });
    });

    c.bench_function("tick_horde_100", |b| {
        let mut sim = fixtures::horde_scenario(42, 100);
        b.iter(|| {
            black_box(sim.tick());
        });
    });

    c.bench_function("state_hash_horde_100", |b| {
        let sim = fixtures::horde_scenario(42, 100);
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
