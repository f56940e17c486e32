// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Coordinator-side step machinery shared by the stepped engines.
use std::sync::Arc;

use tracing::debug;

use super::{CancelToken, EngineParts, StepReport};
use crate::arena::CellArena;
use crate::cell::Cell;
use crate::config::EngineConfig;
use crate::convergence::ConvergenceDetector;
use crate::evaluate::{ChoicePlan, Evaluation};
use crate::probe::Probe;
use crate::receipt::StepReceipt;
use crate::rng::RandomSource;
use crate::scheduler::{resolve_conflicts, Resolution};
use crate::swap::{SwapExecutor, SwapOutcome};

/// Arbitrated proposals awaiting execution.
pub(super) struct Resolved {
    resolution: Resolution,
    proposed: usize,
}

/// Owns everything a step touches except the arena and the evaluators.
pub(super) struct Stepper<C> {
    pub(super) config: EngineConfig,
    pub(super) probe: Arc<dyn Probe<C>>,
    detector: Arc<dyn ConvergenceDetector>,
    rng: Box<dyn RandomSource>,
    pub(super) cancel: CancelToken,
    executor: SwapExecutor,
    step: u64,
    converged: bool,
    last_receipt: Option<StepReceipt>,
}

impl<C: Cell> Stepper<C> {
    pub(super) fn new(parts: EngineParts<C>) -> Self {
        Self {
            config: parts.config,
            probe: parts.probe,
            detector: parts.detector,
            rng: parts.rng,
            cancel: parts.cancel,
            executor: SwapExecutor::new(),
            step: 0,
            converged: false,
            last_receipt: None,
        }
    }

    pub(super) fn step(&self) -> u64 {
        self.step
    }

    pub(super) fn converged(&self) -> bool {
        self.converged
    }

    pub(super) fn last_receipt(&self) -> Option<&StepReceipt> {
        self.last_receipt.as_ref()
    }

    /// Records the step-0 snapshot.
    pub(super) fn record_initial(&self, arena: &CellArena<C>) {
        self.probe.record_snapshot(0, arena.cells(), 0);
    }

    /// Draws this step's bubble picks in index order.
    pub(super) fn draw_plan(&mut self, arena: &CellArena<C>) -> ChoicePlan {
        ChoicePlan::draw(arena, self.config.bubble_policy, self.rng.as_mut())
    }

    /// Resolve window: tallies comparisons and arbitrates the proposals.
    pub(super) fn resolve(&self, evaluations: &[Evaluation]) -> Resolved {
        let probe = self.probe.as_ref();
        let mut proposals = Vec::new();
        for eval in evaluations {
            for _ in 0..eval.comparisons {
                probe.record_compare_and_swap();
            }
            proposals.extend(eval.proposal);
        }
        let proposed = proposals.len();
        Resolved {
            resolution: resolve_conflicts(proposals),
            proposed,
        }
    }

    /// Execute window.
    ///
    /// `evaluations` is indexed by cell position. Selection advances are
    /// applied first (they belong to the agent that evaluated, before it
    /// moves), then accepted proposals execute in initiator order.
    pub(super) fn execute(
        &mut self,
        arena: &mut CellArena<C>,
        evaluations: &[Evaluation],
        resolved: Resolved,
    ) -> StepReport {
        let probe = self.probe.as_ref();
        let Resolved {
            resolution,
            proposed,
        } = resolved;

        let mut permit = arena.write_permit();
        for (index, _) in evaluations.iter().enumerate().filter(|(_, e)| e.advance_ideal) {
            permit.bump_ideal_position(index);
        }

        self.executor.reset_count();
        let outcomes: Vec<SwapOutcome> = resolution
            .accepted
            .iter()
            .map(|p| {
                self.executor
                    .attempt_swap(&mut permit, p.initiator, p.target, probe)
            })
            .collect();
        let swaps = self.executor.swap_count();

        self.step += 1;
        let receipt = StepReceipt::assemble(self.step, &resolution, &outcomes);
        probe.record_snapshot(self.step, arena.cells(), swaps);
        self.converged = self.detector.has_converged(probe, self.step);

        debug!(
            step = self.step,
            proposals = proposed,
            accepted = resolution.accepted.len(),
            swaps,
            "step complete"
        );
        self.last_receipt = Some(receipt);
        StepReport {
            step: self.step,
            proposals: proposed,
            accepted: resolution.accepted.len(),
            swaps,
            converged: self.converged,
        }
    }

    /// Zeroes counters, resets selection targets and re-records step 0.
    pub(super) fn reset(&mut self, arena: &mut CellArena<C>) {
        self.step = 0;
        self.converged = false;
        self.last_receipt = None;
        self.executor.reset_count();
        arena.write_permit().reset_ideal_positions();
        self.probe.clear();
        self.record_initial(arena);
    }
}
