// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{config, is_ascending, is_descending, sequential};
use doom_core::{
    build_engine, Algotype, BasicProbe, BubblePolicy, CellArena, Engine, EngineParts,
    ExecutionMode, FrozenState, SortDirection, SteppedEngine,
};
use doom_dry_tests::{ArenaBuilder, RemainderCell};

#[test]
fn bubble_cells_sort_a_small_array() {
    let arena = CellArena::uniform(vec![5, 3, 8, 1], Algotype::Bubble, SortDirection::Ascending);
    let (mut engine, _) = sequential(arena, &config(BubblePolicy::BothNeighbors, 3));
    engine.run_until_convergence(1_000).expect("run");
    assert!(engine.is_converged());
    assert_eq!(engine.cells(), vec![1, 3, 5, 8]);
}

#[test]
fn random_neighbor_bubble_sorts_with_a_long_stable_window() {
    let arena = CellArena::uniform(
        vec![9, 4, 7, 1, 8, 2, 6, 3, 5, 0],
        Algotype::Bubble,
        SortDirection::Ascending,
    );
    let (mut engine, _) = sequential(arena, &config(BubblePolicy::RandomNeighbor, 40));
    engine.run_until_convergence(10_000).expect("run");
    assert!(engine.is_converged());
    assert_eq!(engine.cells(), (0..10).collect::<Vec<_>>());
}

#[test]
fn immovable_cell_never_leaves_its_index() {
    let arena = ArenaBuilder::new(vec![3, 1, 0, 2, 4, 9, 7, 5, 8, 6])
        .frozen_at(4, FrozenState::Immovable)
        .build()
        .expect("arena");
    let (mut engine, probe) = sequential(arena, &config(BubblePolicy::BothNeighbors, 3));
    engine.run_until_convergence(1_000).expect("run");

    assert_eq!(engine.cells(), (0..10).collect::<Vec<_>>());
    assert_eq!(engine.arena().frozen()[4], FrozenState::Immovable);
    let snapshots = probe.snapshots();
    assert!(snapshots.len() > 1);
    for snap in snapshots {
        assert_eq!(snap.cells()[4], 4, "moved at step {}", snap.step());
    }
}

#[test]
fn misplaced_immovable_cell_splits_the_array() {
    // Insertion cells on the left never look right; bubble cells on the right
    // bounce off the wall at index 4 and sort among themselves.
    for mode in [ExecutionMode::Sequential, ExecutionMode::Barrier] {
        let arena = ArenaBuilder::new(vec![9, 3, 7, 1, 0, 8, 2, 6, 4, 5])
            .algotype(Algotype::Bubble)
            .algotype_at(0, Algotype::Insertion)
            .algotype_at(1, Algotype::Insertion)
            .algotype_at(2, Algotype::Insertion)
            .algotype_at(3, Algotype::Insertion)
            .frozen_at(4, FrozenState::Immovable)
            .build()
            .expect("arena");
        let probe = Arc::new(BasicProbe::<i32>::new());
        let parts = EngineParts::from_config(&config(BubblePolicy::RandomNeighbor, 40))
            .expect("config")
            .with_probe(probe.clone());
        let mut engine = build_engine(mode, arena, parts).expect("engine");
        engine.run_until_convergence(10_000).expect("run");
        engine.shutdown();

        assert!(engine.is_converged(), "{mode:?}");
        let cells = engine.cells();
        assert_eq!(cells[4], 0, "{mode:?}");
        assert_eq!(&cells[..4], &[1, 3, 7, 9], "{mode:?}");
        assert_eq!(&cells[5..], &[2, 4, 5, 6, 8], "{mode:?}");
        assert!(probe.frozen_swap_attempts() > 0, "{mode:?}");
        for snap in probe.snapshots() {
            assert_eq!(snap.cells()[4], 0, "{mode:?} moved at step {}", snap.step());
        }
    }
}

#[test]
fn insertion_cells_sort_a_reversed_triple() {
    let arena = CellArena::uniform(vec![3, 2, 1], Algotype::Insertion, SortDirection::Ascending);
    let (mut engine, _) = sequential(arena, &config(BubblePolicy::default(), 3));
    engine.run_until_convergence(1_000).expect("run");
    assert_eq!(engine.cells(), vec![1, 2, 3]);
}

#[test]
fn selection_ideal_positions_only_advance() {
    let arena = CellArena::uniform(vec![3, 1, 2], Algotype::Selection, SortDirection::Ascending);
    let (mut engine, _) = sequential(arena, &config(BubblePolicy::default(), 3));
    engine.start().expect("start");

    let ideal_by_value = |arena: &CellArena<i32>| -> HashMap<i32, usize> {
        arena
            .cells()
            .iter()
            .zip(arena.metadata())
            .map(|(&v, m)| (v, m.ideal_position()))
            .collect()
    };
    let mut previous = ideal_by_value(&engine.arena());
    assert!(previous.values().all(|&p| p == 0));

    while !engine.is_converged() && engine.current_step() < 100 {
        engine.step().expect("step");
        let arena = engine.arena();
        let current = ideal_by_value(&arena);
        for (value, &ideal) in &current {
            assert!(ideal >= previous[value], "agent {value} moved its target back");
            assert!(ideal < arena.len());
        }
        previous = current;
    }
    assert!(engine.is_converged());
    assert_eq!(engine.cells(), vec![1, 2, 3]);
}

#[test]
fn descending_bubble_and_insertion_sort_high_to_low() {
    for algotype in [Algotype::Bubble, Algotype::Insertion] {
        let arena = CellArena::uniform(vec![1, 5, 2, 4, 3], algotype, SortDirection::Descending);
        let (mut engine, _) = sequential(arena, &config(BubblePolicy::BothNeighbors, 3));
        engine.run_until_convergence(1_000).expect("run");
        let cells = engine.cells();
        assert!(is_descending(&cells), "{algotype}: {cells:?}");
        assert_eq!(cells, vec![5, 4, 3, 2, 1]);
    }
}

#[test]
fn descending_selection_starts_at_the_right_boundary() {
    let arena = CellArena::uniform(vec![1, 5, 2, 4, 3], Algotype::Selection, SortDirection::Descending);
    assert!(arena.metadata().iter().all(|m| m.ideal_position() == 4));
}

#[test]
fn engines_sort_by_ord_not_by_value_projection() {
    let raws = [7, 3, 12, 5, 9, 10, 1];
    let cells = RemainderCell::many(raws, 5);
    let mut expected = cells.clone();
    expected.sort();

    let arena = CellArena::uniform(cells, Algotype::Bubble, SortDirection::Ascending);
    let (mut engine, _) = sequential(arena, &config(BubblePolicy::BothNeighbors, 3));
    engine.run_until_convergence(1_000).expect("run");
    let sorted = engine.cells();
    assert!(is_ascending(&sorted));
    assert_eq!(sorted, expected);
}

#[test]
fn sorted_input_never_swaps() {
    let arena = CellArena::uniform((0..8).collect::<Vec<i32>>(), Algotype::Bubble, SortDirection::Ascending);
    let (mut engine, probe) = sequential(arena, &config(BubblePolicy::RandomNeighbor, 5));
    let steps = engine.run_until_convergence(1_000).expect("run");
    assert_eq!(steps, 5);
    assert_eq!(probe.total_swaps(), 0);
    assert!(probe.compare_and_swap_count() > 0);
}
