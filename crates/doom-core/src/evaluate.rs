// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-cell evaluation: topology, random choice and decision in one place.
//!
//! Every engine funnels through [`evaluate_cell`], which is what keeps the
//! strategies behaviorally compatible. Random neighbor picks are drawn up
//! front by [`ChoicePlan::draw`], in index order, so a parallel evaluation
//! consumes the random source exactly like a sequential one.
use crate::arena::CellArena;
use crate::cell::Cell;
use crate::decision::{should_swap, SwapDecision};
use crate::metadata::Algotype;
use crate::rng::RandomSource;
use crate::scheduler::SwapProposal;
use crate::topology::{bubble_neighbors, candidates};

/// How a bubble cell chooses among its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BubblePolicy {
    /// One neighbor, drawn uniformly from the random source each step.
    #[default]
    RandomNeighbor,
    /// Left then right; the first that qualifies is proposed. Draws nothing.
    BothNeighbors,
}

/// Pre-drawn bubble neighbor picks for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoicePlan {
    picks: Vec<usize>,
}

impl ChoicePlan {
    /// Draws one pick per bubble cell, in index order.
    ///
    /// Only [`BubblePolicy::RandomNeighbor`] consumes randomness, and only for
    /// cells that have at least one neighbor.
    pub fn draw<C: Cell>(
        arena: &CellArena<C>,
        policy: BubblePolicy,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let n = arena.len();
        let mut picks = vec![0; n];
        if policy == BubblePolicy::RandomNeighbor {
            for (i, meta) in arena.metadata().iter().enumerate() {
                if meta.algotype() != Algotype::Bubble {
                    continue;
                }
                let neighbors = bubble_neighbors(i, n);
                if !neighbors.is_empty() {
                    picks[i] = rng.next_below(neighbors.len());
                }
            }
        }
        Self { picks }
    }

    /// Pick for the cell at `index` (0 when none was drawn).
    pub fn pick(&self, index: usize) -> usize {
        self.picks.get(index).copied().unwrap_or(0)
    }
}

/// What one cell wants this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Swap the cell proposes, if any.
    pub proposal: Option<SwapProposal>,
    /// Selection denial: advance the cell's ideal position in the execute
    /// window.
    pub advance_ideal: bool,
    /// Pairs compared (reported to the probe as compare-and-swap events).
    pub comparisons: u32,
}

/// Evaluates the cell at `index` against a read-only arena.
///
/// Frozen cells are evaluated too. Whether a frozen initiator may act is the
/// swap executor's call, which is where denied attempts get counted.
pub fn evaluate_cell<C: Cell>(
    arena: &CellArena<C>,
    index: usize,
    policy: BubblePolicy,
    pick: usize,
) -> Evaluation {
    let Some(meta) = arena.metadata().get(index) else {
        return Evaluation::default();
    };
    let (cells, frozen) = (arena.cells(), arena.frozen());
    let targets = candidates(index, meta, arena.len());
    let mut eval = Evaluation::default();

    let considered: &[usize] = match (meta.algotype(), policy) {
        (Algotype::Bubble, BubblePolicy::RandomNeighbor) => {
            let all = targets.as_slice();
            match all.get(pick) {
                Some(j) => std::slice::from_ref(j),
                None => &[],
            }
        }
        _ => targets.as_slice(),
    };

    for &j in considered {
        eval.comparisons += 1;
        match should_swap(cells, frozen, index, j, meta.algotype(), meta.direction()) {
            SwapDecision::Swap => {
                eval.proposal = Some(SwapProposal::new(index, j));
                break;
            }
            SwapDecision::Advance => eval.advance_ideal = true,
            SwapDecision::Hold => {}
        }
    }
    eval
}
