// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Swap decision predicate.
//!
//! Pure over a read-only arena view. The only side effect a decision can ask
//! for, a selection target advance, is returned as [`SwapDecision::Advance`]
//! and applied later by whoever holds the write permit.
use std::cmp::Ordering;

use crate::cell::Cell;
use crate::frozen::FrozenState;
use crate::metadata::{Algotype, SortDirection};

/// Result of evaluating one `(initiator, target)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDecision {
    /// Propose the swap.
    Swap,
    /// Leave things as they are.
    Hold,
    /// Selection denial: hold, and advance the initiator's ideal position.
    Advance,
}

impl SwapDecision {
    /// `true` for [`SwapDecision::Swap`].
    pub const fn is_swap(self) -> bool {
        matches!(self, Self::Swap)
    }
}

/// Whether the unfrozen prefix `[0, index)` is sorted in `direction`.
///
/// Scans left to right with a running sentinel starting at the extreme of the
/// direction. A frozen position is skipped and restarts the sentinel, so
/// frozen cells split the prefix into independently checked runs.
pub fn is_left_sorted<C: Cell>(
    cells: &[C],
    frozen: &[FrozenState],
    index: usize,
    direction: SortDirection,
) -> bool {
    let start = match direction {
        SortDirection::Ascending => i64::MIN,
        SortDirection::Descending => i64::MAX,
    };
    let mut sentinel = start;
    for (cell, state) in cells.iter().zip(frozen).take(index) {
        if state.is_frozen() {
            sentinel = start;
            continue;
        }
        let value = cell.value();
        let out_of_order = match direction {
            SortDirection::Ascending => value < sentinel,
            SortDirection::Descending => value > sentinel,
        };
        if out_of_order {
            return false;
        }
        sentinel = value;
    }
    true
}

/// Decides whether the agent at `i` wants to swap with `j`.
///
/// `algotype` and `direction` are those of the agent at `i`.
pub fn should_swap<C: Cell>(
    cells: &[C],
    frozen: &[FrozenState],
    i: usize,
    j: usize,
    algotype: Algotype,
    direction: SortDirection,
) -> SwapDecision {
    let (Some(a), Some(b)) = (cells.get(i), cells.get(j)) else {
        return SwapDecision::Hold;
    };
    let cmp = a.cmp(b);
    // Ascending wants smaller values moving left; descending the reverse.
    let wants_left = |cmp: Ordering| match direction {
        SortDirection::Ascending => cmp == Ordering::Less,
        SortDirection::Descending => cmp == Ordering::Greater,
    };
    let verdict = |yes: bool| {
        if yes {
            SwapDecision::Swap
        } else {
            SwapDecision::Hold
        }
    };

    match algotype {
        Algotype::Bubble => {
            if j + 1 == i {
                verdict(wants_left(cmp))
            } else if j == i + 1 {
                verdict(wants_left(cmp.reverse()))
            } else {
                SwapDecision::Hold
            }
        }
        Algotype::Insertion => {
            let gated = j + 1 == i && is_left_sorted(cells, frozen, i, direction);
            verdict(gated && wants_left(cmp))
        }
        Algotype::Selection => {
            if i == j {
                SwapDecision::Hold
            } else if wants_left(cmp) {
                SwapDecision::Swap
            } else {
                SwapDecision::Advance
            }
        }
    }
}
