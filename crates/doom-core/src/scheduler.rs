// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Deterministic conflict resolver.
//!
//! Ordering invariant:
//! - Proposals are considered in ascending initiator order (leftmost priority).
//! - A proposal is accepted only if neither endpoint is already committed
//!   this step; otherwise it is dropped and attributed to the accepted
//!   proposal that holds the endpoint.
//! - The output depends only on the proposal set, never on arrival order, so
//!   sequential and parallel evaluation resolve identically.

use rustc_hash::FxHashMap;

/// A cell's request to exchange positions with `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapProposal {
    /// Index of the proposing cell. Field order makes the derived `Ord`
    /// initiator-major.
    pub initiator: usize,
    /// Index the initiator wants to move to.
    pub target: usize,
}

impl SwapProposal {
    /// Creates a proposal.
    pub const fn new(initiator: usize, target: usize) -> Self {
        Self { initiator, target }
    }

    /// `true` when the two proposals share an endpoint.
    pub fn overlaps(&self, other: &Self) -> bool {
        let mine = [self.initiator, self.target];
        mine.contains(&other.initiator) || mine.contains(&other.target)
    }
}

/// Outcome of resolving one step's proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Non-overlapping proposals, ascending by initiator.
    pub accepted: Vec<SwapProposal>,
    /// Dropped proposals paired with the accepted proposal that blocked them.
    pub conflicts: Vec<(SwapProposal, SwapProposal)>,
}

/// Endpoints committed so far in one step, keyed to their owning proposal.
#[derive(Debug, Default)]
struct Committed {
    owner: FxHashMap<usize, SwapProposal>,
}

impl Committed {
    fn blocker(&self, p: &SwapProposal) -> Option<SwapProposal> {
        self.owner
            .get(&p.initiator)
            .or_else(|| self.owner.get(&p.target))
            .copied()
    }

    fn commit(&mut self, p: SwapProposal) {
        self.owner.insert(p.initiator, p);
        self.owner.insert(p.target, p);
    }
}

/// Selects a maximal leftmost-priority non-overlapping subset.
pub fn resolve_conflicts(mut proposals: Vec<SwapProposal>) -> Resolution {
    proposals.sort_unstable();
    let mut committed = Committed::default();
    let mut out = Resolution::default();
    for p in proposals {
        match committed.blocker(&p) {
            Some(blocked_by) => out.conflicts.push((p, blocked_by)),
            None => {
                committed.commit(p);
                out.accepted.push(p);
            }
        }
    }
    out
}
