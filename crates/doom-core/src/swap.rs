// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frozen-aware swap executor.
use crate::arena::WritePermit;
use crate::cell::Cell;
use crate::frozen::FrozenState;
use crate::probe::ProbeCounters;

/// Why the executor refused a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrozenDenial {
    /// The initiator is frozen (movable or immovable) and may not act.
    InitiatorFrozen,
    /// The target is immovable.
    TargetImmovable,
}

/// Result of one swap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Positions exchanged.
    Swapped,
    /// Refused; nothing moved.
    Denied(FrozenDenial),
}

/// Checks frozen restrictions for `initiator -> target`, initiator first.
pub fn check_frozen(frozen: &[FrozenState], initiator: usize, target: usize) -> Option<FrozenDenial> {
    let at = |k: usize| frozen.get(k).copied().unwrap_or_default();
    if !at(initiator).can_initiate() {
        Some(FrozenDenial::InitiatorFrozen)
    } else if !at(target).can_be_displaced() {
        Some(FrozenDenial::TargetImmovable)
    } else {
        None
    }
}

/// Sole writer of cell positions during a step; counts executed swaps.
#[derive(Debug, Default)]
pub struct SwapExecutor {
    swaps: usize,
}

impl SwapExecutor {
    /// Fresh executor with a zero counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts `initiator <-> target` under `permit`.
    ///
    /// On success cells, metadata and frozen state move together and the
    /// counter increments. On denial the probe's frozen-attempt counter
    /// increments instead.
    pub fn attempt_swap<C: Cell>(
        &mut self,
        permit: &mut WritePermit<'_, C>,
        initiator: usize,
        target: usize,
        probe: &dyn ProbeCounters,
    ) -> SwapOutcome {
        if let Some(denial) = check_frozen(permit.arena().frozen(), initiator, target) {
            probe.count_frozen_swap_attempt();
            return SwapOutcome::Denied(denial);
        }
        permit.swap(initiator, target);
        self.swaps += 1;
        SwapOutcome::Swapped
    }

    /// Swaps executed since the last reset.
    pub fn swap_count(&self) -> usize {
        self.swaps
    }

    /// Zeroes the counter (start of each step).
    pub fn reset_count(&mut self) {
        self.swaps = 0;
    }
}
