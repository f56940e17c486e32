// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Step receipts: what happened to every proposal in one step.
//!
//! A receipt lists each candidate proposal in initiator order with its
//! disposition. It answers "why didn't cell 7 move?" without replaying the
//! step, and its digest lets two engines compare resolution decisions
//! cheaply.

use blake3::Hasher;

use crate::probe::Digest;
use crate::scheduler::{Resolution, SwapProposal};
use crate::swap::{FrozenDenial, SwapOutcome};

/// Outcome of one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Accepted and executed.
    Executed,
    /// Dropped by the resolver because an endpoint was already committed.
    Conflict {
        /// Accepted proposal that owned the shared endpoint.
        blocked_by: SwapProposal,
    },
    /// Accepted by the resolver, refused by the executor.
    Denied(FrozenDenial),
}

/// One proposal and its disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptEntry {
    /// The proposal.
    pub proposal: SwapProposal,
    /// What became of it.
    pub disposition: Disposition,
}

/// Per-step record of proposals and dispositions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReceipt {
    step: u64,
    entries: Vec<ReceiptEntry>,
}

impl StepReceipt {
    /// Assembles a receipt from the resolver output and the executor outcome
    /// for each accepted proposal (parallel to `resolution.accepted`).
    pub(crate) fn assemble(step: u64, resolution: &Resolution, outcomes: &[SwapOutcome]) -> Self {
        let mut entries: Vec<ReceiptEntry> = resolution
            .accepted
            .iter()
            .zip(outcomes)
            .map(|(&proposal, outcome)| ReceiptEntry {
                proposal,
                disposition: match *outcome {
                    SwapOutcome::Swapped => Disposition::Executed,
                    SwapOutcome::Denied(d) => Disposition::Denied(d),
                },
            })
            .chain(
                resolution
                    .conflicts
                    .iter()
                    .map(|&(proposal, blocked_by)| ReceiptEntry {
                        proposal,
                        disposition: Disposition::Conflict { blocked_by },
                    }),
            )
            .collect();
        entries.sort_by_key(|e| e.proposal);
        Self { step, entries }
    }

    /// Step the receipt belongs to.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Entries in initiator order.
    pub fn entries(&self) -> &[ReceiptEntry] {
        &self.entries
    }

    /// Proposals that actually moved cells.
    pub fn executed(&self) -> impl Iterator<Item = SwapProposal> + '_ {
        self.entries
            .iter()
            .filter(|e| e.disposition == Disposition::Executed)
            .map(|e| e.proposal)
    }

    /// Canonical digest over entries (step excluded).
    pub fn digest(&self) -> Digest {
        let mut hasher = Hasher::new();
        hasher.update(&1u16.to_le_bytes());
        hasher.update(&(self.entries.len() as u64).to_le_bytes());
        for e in &self.entries {
            hasher.update(&(e.proposal.initiator as u64).to_le_bytes());
            hasher.update(&(e.proposal.target as u64).to_le_bytes());
            let code = match e.disposition {
                Disposition::Executed => 1u8,
                Disposition::Conflict { .. } => 2,
                Disposition::Denied(FrozenDenial::InitiatorFrozen) => 3,
                Disposition::Denied(FrozenDenial::TargetImmovable) => 4,
            };
            hasher.update(&[code]);
        }
        hasher.finalize().into()
    }
}
