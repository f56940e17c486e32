// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single-threaded reference engine.
use tracing::instrument;

use super::stepper::Stepper;
use super::{
    run_stepped, CancelToken, Engine, EngineParts, EngineState, StepReport, SteppedEngine,
};
use crate::arena::CellArena;
use crate::cell::Cell;
use crate::error::EngineError;
use crate::evaluate::{evaluate_cell, Evaluation};
use crate::probe::Probe;
use crate::receipt::StepReceipt;

/// Evaluates every cell in index order on the calling thread.
pub struct SequentialEngine<C> {
    arena: CellArena<C>,
    stepper: Stepper<C>,
    state: EngineState,
    started: bool,
}

impl<C: Cell> SequentialEngine<C> {
    /// Builds the engine and records the step-0 snapshot.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `parts.config` does not validate.
    pub fn new(arena: CellArena<C>, parts: EngineParts<C>) -> Result<Self, EngineError> {
        parts.config.validate()?;
        let stepper = Stepper::new(parts);
        stepper.record_initial(&arena);
        Ok(Self {
            arena,
            stepper,
            state: EngineState::Idle,
            started: false,
        })
    }

    /// Read access to the live arena.
    pub fn arena_ref(&self) -> &CellArena<C> {
        &self.arena
    }

    /// Probe this engine reports to.
    pub fn probe(&self) -> &dyn Probe<C> {
        self.stepper.probe.as_ref()
    }

    fn guard(&self) -> Result<(), EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if !self.started {
            return Err(EngineError::NotStarted);
        }
        if self.stepper.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }
}

impl<C: Cell> Engine<C> for SequentialEngine<C> {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if self.started {
            return Err(EngineError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(mode = "sequential", cells = self.arena.len()))]
    fn run_until_convergence(&mut self, max_steps: u64) -> Result<u64, EngineError> {
        run_stepped(self, max_steps)
    }

    fn shutdown(&mut self) {
        self.started = false;
        self.state = EngineState::Stopped;
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.stepper.reset(&mut self.arena);
        self.started = false;
        self.state = EngineState::Idle;
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn current_step(&self) -> u64 {
        self.stepper.step()
    }

    fn is_converged(&self) -> bool {
        self.stepper.converged()
    }

    fn arena(&self) -> CellArena<C> {
        self.arena.clone()
    }

    fn cancel_token(&self) -> CancelToken {
        self.stepper.cancel.clone()
    }
}

impl<C: Cell> SteppedEngine<C> for SequentialEngine<C> {
    fn step(&mut self) -> Result<StepReport, EngineError> {
        self.guard()?;
        self.state = EngineState::Evaluating;
        let plan = self.stepper.draw_plan(&self.arena);
        let policy = self.stepper.config.bubble_policy;
        let evaluations: Vec<Evaluation> = (0..self.arena.len())
            .map(|i| evaluate_cell(&self.arena, i, policy, plan.pick(i)))
            .collect();
        self.state = EngineState::Resolving;
        let resolved = self.stepper.resolve(&evaluations);
        self.state = EngineState::Executing;
        let report = self.stepper.execute(&mut self.arena, &evaluations, resolved);
        self.state = if report.converged {
            EngineState::Converged
        } else {
            EngineState::Idle
        };
        Ok(report)
    }

    fn last_receipt(&self) -> Option<&StepReceipt> {
        self.stepper.last_receipt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::metadata::{Algotype, SortDirection};
    use crate::probe::ProbeCounters;

    fn engine(values: Vec<i32>) -> SequentialEngine<i32> {
        let arena = CellArena::uniform(values, Algotype::Bubble, SortDirection::Ascending);
        let config = EngineConfig {
            required_stable_steps: 20,
            seed: 11,
            ..EngineConfig::default()
        };
        SequentialEngine::new(arena, EngineParts::from_config(&config).unwrap()).unwrap()
    }

    #[test]
    fn step_requires_start() {
        let mut e = engine(vec![2, 1]);
        assert!(matches!(e.step(), Err(EngineError::NotStarted)));
        e.start().unwrap();
        assert!(matches!(e.start(), Err(EngineError::AlreadyStarted)));
        e.step().unwrap();
        assert_eq!(e.current_step(), 1);
    }

    #[test]
    fn shutdown_is_terminal_until_reset() {
        let mut e = engine(vec![2, 1]);
        e.start().unwrap();
        e.shutdown();
        assert_eq!(e.state(), EngineState::Stopped);
        assert!(matches!(e.step(), Err(EngineError::ShutDown)));
        assert!(matches!(e.run_until_convergence(10), Err(EngineError::ShutDown)));
        e.reset().unwrap();
        assert_eq!(e.state(), EngineState::Idle);
        e.run_until_convergence(1_000).unwrap();
        assert_eq!(e.cells(), vec![1, 2]);
    }

    #[test]
    fn cancellation_sticks() {
        let mut e = engine(vec![3, 2, 1]);
        e.start().unwrap();
        e.cancel_token().cancel();
        assert!(matches!(e.step(), Err(EngineError::Cancelled)));
        assert!(matches!(e.step(), Err(EngineError::Cancelled)));
        assert!(e.cancel_token().is_cancelled());
    }

    #[test]
    fn sorted_input_converges_after_stable_window() {
        let mut e = engine(vec![1, 2, 3, 4]);
        let steps = e.run_until_convergence(1_000).unwrap();
        assert_eq!(steps, 20);
        assert!(e.is_converged());
        assert_eq!(e.state(), EngineState::Converged);
        assert_eq!(e.probe().steps_since_last_swap(), 20);
    }

    #[test]
    fn receipt_reflects_last_step() {
        let mut e = engine(vec![2, 1]);
        e.start().unwrap();
        let report = e.step().unwrap();
        let receipt = e.last_receipt().unwrap();
        assert_eq!(receipt.step(), report.step);
        assert_eq!(receipt.executed().count(), report.swaps);
    }
}
