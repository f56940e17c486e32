// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, is_ascending};
use doom_core::conformance::{run_pair_determinism, DeterminismError, PairConfig};
use doom_core::population::shuffled_values;
use doom_core::{
    Algotype, AlgotypeMix, BarrierEngine, BasicProbe, BubblePolicy, CellArena, Engine,
    EngineConfig, EngineParts, EngineState, ExecutionMode, FrozenState, LockEngine, Prng,
    SequentialEngine, SortDirection, SteppedEngine,
};
use doom_dry_tests::ArenaBuilder;

fn shuffled_bubble(seed: u64, n: usize) -> impl Fn() -> CellArena<i64> + Send + Sync + 'static {
    move || {
        let mut rng = Prng::from_seed_u64(seed);
        CellArena::uniform(
            shuffled_values(n, &mut rng),
            Algotype::Bubble,
            SortDirection::Ascending,
        )
    }
}

#[test]
fn sequential_and_barrier_agree_step_for_step() {
    for seed in [1_u64, 7, 42, 0xFEED] {
        let engine = EngineConfig {
            seed,
            ..config(BubblePolicy::RandomNeighbor, 20)
        };
        let a = PairConfig::new(
            "sequential",
            ExecutionMode::Sequential,
            engine.clone(),
            shuffled_bubble(seed, 16),
        );
        let b = PairConfig::new("barrier", ExecutionMode::Barrier, engine, shuffled_bubble(seed, 16));
        let report = run_pair_determinism(&a, &b, 5_000).expect("pair agrees");
        assert!(report.converged, "seed {seed} did not converge");
        assert!(report.steps > 0);
    }
}

#[test]
fn stepped_engines_share_phase_states_and_receipts() {
    let cfg = config(BubblePolicy::BothNeighbors, 3);
    let arena = || {
        CellArena::uniform(vec![4, 2, 5, 1, 3], Algotype::Bubble, SortDirection::Ascending)
    };
    let parts = || EngineParts::from_config(&cfg).expect("parts");
    let mut seq = SequentialEngine::new(arena(), parts()).expect("sequential");
    let mut bar = BarrierEngine::new(arena(), parts()).expect("barrier");
    seq.start().expect("start");
    bar.start().expect("start");

    while !seq.is_converged() {
        let a = seq.step().expect("seq step");
        let b = bar.step().expect("barrier step");
        assert_eq!(a, b);
        assert_eq!(seq.state(), bar.state(), "step {}", a.step);
        assert_eq!(seq.last_receipt(), bar.last_receipt(), "step {}", a.step);
        assert!(a.step < 100);
    }
    assert!(bar.is_converged());
    assert_eq!(seq.state(), EngineState::Converged);
    assert_eq!(seq.cells(), vec![1, 2, 3, 4, 5]);
    bar.shutdown();
}

#[test]
fn chimeric_population_agrees_across_modes() {
    let arena = || {
        let mut rng = Prng::from_seed_u64(99);
        let mix = AlgotypeMix::new(vec![
            (Algotype::Bubble, 0.4),
            (Algotype::Insertion, 0.3),
            (Algotype::Selection, 0.3),
        ])
        .expect("mix");
        let metadata = mix
            .metadata(12, SortDirection::Ascending, &mut rng)
            .expect("metadata");
        let mut arena =
            CellArena::new(shuffled_values(12, &mut rng), metadata).expect("arena");
        arena.freeze(5, FrozenState::Movable).expect("freeze");
        arena
    };
    let engine = config(BubblePolicy::RandomNeighbor, 20);
    let a = PairConfig::new("sequential", ExecutionMode::Sequential, engine.clone(), arena);
    let b = PairConfig::new("barrier", ExecutionMode::Barrier, engine, arena);
    run_pair_determinism(&a, &b, 2_000).expect("pair agrees");
}

#[test]
fn different_inputs_are_reported_as_divergent() {
    let engine = config(BubblePolicy::RandomNeighbor, 3);
    let a = PairConfig::new("reversed", ExecutionMode::Sequential, engine.clone(), || {
        CellArena::uniform((1..=8).rev().collect::<Vec<i64>>(), Algotype::Bubble, SortDirection::Ascending)
    });
    let b = PairConfig::new("sorted", ExecutionMode::Sequential, engine, || {
        CellArena::uniform((1..=8).collect::<Vec<i64>>(), Algotype::Bubble, SortDirection::Ascending)
    });
    let err = run_pair_determinism(&a, &b, 100).expect_err("inputs differ");
    match err {
        DeterminismError::SnapshotMismatch {
            step,
            label_a,
            label_b,
            ..
        } => {
            assert_eq!(step, 1);
            assert_eq!(label_a, "reversed");
            assert_eq!(label_b, "sorted");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lock_engine_sorts_around_an_immovable_cell() {
    let arena = ArenaBuilder::new(vec![3, 1, 0, 2, 4, 9, 7, 5, 8, 6])
        .frozen_at(4, FrozenState::Immovable)
        .build()
        .expect("arena");
    let cfg = EngineConfig {
        lock_poll_interval: Duration::from_millis(10),
        lock_required_stable_polls: 50,
        ..config(BubblePolicy::RandomNeighbor, 3)
    };
    let probe = Arc::new(BasicProbe::new());
    let parts = EngineParts::from_config(&cfg)
        .expect("parts")
        .with_probe(probe.clone());
    let mut engine = LockEngine::new(arena, parts).expect("engine");
    let steps = engine.run_until_convergence(100_000).expect("run");

    assert!(engine.is_converged());
    assert_eq!(steps, engine.total_swaps());
    let cells = engine.cells();
    assert!(is_ascending(&cells), "{cells:?}");
    assert_eq!(engine.arena().frozen()[4], FrozenState::Immovable);
    for snap in probe.snapshots() {
        assert_eq!(snap.cells()[4], 4, "moved at swap {}", snap.step());
        assert!(snap.swap_count() <= 1);
    }
    engine.shutdown();
}
