// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use proptest::prelude::*;

use common::{config, sequential};
use doom_core::{
    resolve_conflicts, Algotype, BubblePolicy, CellArena, CellMetadata, Engine, FrozenState,
    SortDirection, SteppedEngine, SwapProposal,
};

fn proposal() -> impl Strategy<Value = SwapProposal> {
    (0_usize..24, 0_usize..24)
        .prop_filter("distinct endpoints", |(i, j)| i != j)
        .prop_map(|(i, j)| SwapProposal::new(i, j))
}

fn algotype() -> impl Strategy<Value = Algotype> {
    prop_oneof![
        Just(Algotype::Bubble),
        Just(Algotype::Insertion),
        Just(Algotype::Selection),
    ]
}

fn frozen_state() -> impl Strategy<Value = FrozenState> {
    prop_oneof![
        6 => Just(FrozenState::None),
        1 => Just(FrozenState::Movable),
        1 => Just(FrozenState::Immovable),
    ]
}

/// Values, algotypes and frozen states for one arena.
fn population() -> impl Strategy<Value = (Vec<i32>, Vec<Algotype>, Vec<FrozenState>)> {
    (2_usize..14).prop_flat_map(|n| {
        (
            prop::collection::vec(-50_i32..50, n),
            prop::collection::vec(algotype(), n),
            prop::collection::vec(frozen_state(), n),
        )
    })
}

fn build(
    values: Vec<i32>,
    algotypes: &[Algotype],
    frozen: &[FrozenState],
    direction: SortDirection,
) -> CellArena<i32> {
    let n = values.len();
    let metadata = algotypes
        .iter()
        .map(|&a| CellMetadata::new(a, direction, n))
        .collect();
    let mut arena = CellArena::new(values, metadata).expect("arena");
    for (i, &state) in frozen.iter().enumerate() {
        arena.freeze(i, state).expect("freeze");
    }
    arena
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn resolved_swaps_never_share_an_endpoint(proposals in prop::collection::vec(proposal(), 0..40)) {
        let resolution = resolve_conflicts(proposals.clone());

        for (k, a) in resolution.accepted.iter().enumerate() {
            for b in &resolution.accepted[k + 1..] {
                prop_assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
        prop_assert!(resolution
            .accepted
            .windows(2)
            .all(|w| w[0] <= w[1]));
        for (dropped, blocker) in &resolution.conflicts {
            prop_assert!(resolution.accepted.contains(blocker));
            prop_assert!(dropped.overlaps(blocker));
        }

        let mut seen: Vec<SwapProposal> = resolution
            .accepted
            .iter()
            .copied()
            .chain(resolution.conflicts.iter().map(|(p, _)| *p))
            .collect();
        let mut input = proposals;
        seen.sort_unstable();
        input.sort_unstable();
        prop_assert_eq!(seen, input);
    }

    #[test]
    fn frozen_restrictions_hold_every_step(
        (values, algotypes, frozen) in population(),
        descending in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let direction = if descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        let arena = build(values.clone(), &algotypes, &frozen, direction);
        let n = arena.len();
        let mut cfg = config(BubblePolicy::RandomNeighbor, 5);
        cfg.seed = seed;
        let (mut engine, _) = sequential(arena, &cfg);
        engine.start().expect("start");

        for _ in 0..60 {
            let before = engine.arena();
            let report = engine.step().expect("step");
            let after = engine.arena();
            let receipt = engine.last_receipt().expect("receipt");

            prop_assert_eq!(receipt.executed().count(), report.swaps);
            for swap in receipt.executed() {
                prop_assert_eq!(before.frozen()[swap.initiator], FrozenState::None);
                prop_assert_ne!(before.frozen()[swap.target], FrozenState::Immovable);
            }
            for (i, &state) in frozen.iter().enumerate() {
                if state == FrozenState::Immovable {
                    prop_assert_eq!(after.cells()[i], values[i]);
                    prop_assert_eq!(after.frozen()[i], FrozenState::Immovable);
                }
            }
            for meta in after.metadata() {
                prop_assert!(meta.ideal_position() < n);
            }

            let mut sorted_before = before.cells().to_vec();
            let mut sorted_after = after.cells().to_vec();
            sorted_before.sort_unstable();
            sorted_after.sort_unstable();
            prop_assert_eq!(sorted_before, sorted_after);

            if report.converged {
                break;
            }
        }
    }

    #[test]
    fn unfrozen_bubble_arrays_always_sort(
        values in prop::collection::vec(-1_000_i32..1_000, 0..24),
    ) {
        let mut expected = values.clone();
        expected.sort_unstable();
        let arena = CellArena::uniform(values, Algotype::Bubble, SortDirection::Ascending);
        let (mut engine, probe) = sequential(arena, &config(BubblePolicy::BothNeighbors, 3));
        engine.run_until_convergence(10_000).expect("run");
        prop_assert!(engine.is_converged());
        prop_assert_eq!(engine.cells(), expected);
        prop_assert_eq!(probe.frozen_swap_attempts(), 0);
    }
}
