// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
// criterion_group!/criterion_main! expand to undocumented functions that cannot
// carry #[allow] (attributes on macro invocations are ignored). Crate-level
// suppress is required for benchmark binaries using Criterion.
#![allow(missing_docs)]
//! Engine step benchmarks.
//!
//! - `sequential_step_N`: one evaluate/resolve/execute cycle on a shuffled array
//! - `run_to_convergence`: sequential vs barrier full runs on the same input
//! - `resolve_conflicts_N`: arbitration of a dense adjacent proposal set
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use doom_core::population::shuffled_values;
use doom_core::{
    resolve_conflicts, Algotype, BarrierEngine, CellArena, Engine, EngineConfig, EngineParts,
    Prng, SequentialEngine, SortDirection, SteppedEngine, SwapProposal,
};
use std::time::Duration;

fn shuffled_arena(n: usize, seed: u64) -> CellArena<i64> {
    let values = shuffled_values(n, &mut Prng::from_seed_u64(seed));
    CellArena::uniform(values, Algotype::Bubble, SortDirection::Ascending)
}

fn quiet_config() -> EngineConfig {
    EngineConfig {
        record_trajectory: false,
        ..EngineConfig::default()
    }
}

fn bench_sequential_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_step");
    for &n in &[64usize, 256, 1_024] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let parts = EngineParts::from_config(&quiet_config()).unwrap();
                    let mut engine = SequentialEngine::new(shuffled_arena(n, 7), parts).unwrap();
                    engine.start().unwrap();
                    engine
                },
                |mut engine| criterion::black_box(engine.step().unwrap()),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_run_to_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_to_convergence");
    group
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(10);
    let n = 32;
    group.bench_function(BenchmarkId::new("sequential", n), |b| {
        b.iter_batched(
            || {
                let parts = EngineParts::from_config(&quiet_config()).unwrap();
                SequentialEngine::new(shuffled_arena(n, 3), parts).unwrap()
            },
            |mut engine| criterion::black_box(engine.run_until_convergence(100_000).unwrap()),
            BatchSize::SmallInput,
        )
    });
    group.bench_function(BenchmarkId::new("barrier", n), |b| {
        b.iter_batched(
            || {
                let parts = EngineParts::from_config(&quiet_config()).unwrap();
                BarrierEngine::new(shuffled_arena(n, 3), parts).unwrap()
            },
            |mut engine| {
                let steps = engine.run_until_convergence(100_000).unwrap();
                engine.shutdown();
                criterion::black_box(steps)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_resolve_conflicts(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_conflicts");
    for &n in &[256usize, 4_096] {
        // Every cell proposes to its right neighbor: maximal overlap.
        let proposals: Vec<SwapProposal> = (0..n - 1).map(|i| SwapProposal::new(i, i + 1)).collect();
        group.throughput(Throughput::Elements(proposals.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &proposals, |b, proposals| {
            b.iter_batched(
                || proposals.clone(),
                |p| criterion::black_box(resolve_conflicts(p)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_step,
    bench_run_to_convergence,
    bench_resolve_conflicts
);
criterion_main!(benches);
