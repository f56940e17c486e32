// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Execution engines.
//!
//! Three in-trial strategies share one lifecycle:
//!
//! - [`SequentialEngine`]: evaluates every cell on the calling thread.
//! - [`BarrierEngine`]: one worker thread per cell, three rendezvous per step.
//! - [`LockEngine`]: one worker thread per cell racing for a single mutex.
//!
//! Sequential and barrier engines are stepped and produce identical
//! trajectories for the same seed. The lock engine has no global step; it
//! counts swaps and detects convergence by polling.
//!
//! Lifecycle: construct → `start` → `step`/`run_until_convergence` →
//! `shutdown`. `reset` returns an engine to its freshly constructed state.

mod barrier;
mod lock;
mod sequential;
mod stepper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use barrier::BarrierEngine;
pub use lock::LockEngine;
pub use sequential::SequentialEngine;

use crate::arena::CellArena;
use crate::cell::Cell;
use crate::config::EngineConfig;
use crate::convergence::{ConvergenceDetector, NoSwapConvergence};
use crate::error::EngineError;
use crate::probe::{BasicProbe, Probe};
use crate::receipt::StepReceipt;
use crate::rng::{Prng, RandomSource};

/// Phase an engine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Between steps (or not yet started).
    Idle,
    /// Cells are evaluating.
    Evaluating,
    /// Proposals are being arbitrated.
    Resolving,
    /// Surviving swaps are being applied.
    Executing,
    /// The convergence detector fired after the last step.
    Converged,
    /// Shut down; only `reset` revives the engine.
    Stopped,
}

/// In-trial execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionMode {
    /// Single-threaded stepping.
    #[default]
    Sequential,
    /// Thread per cell, barrier-synchronized steps.
    Barrier,
    /// Thread per cell, one global mutex.
    LockContended,
}

/// Cooperative cancellation flag shared between a caller and an engine.
///
/// Once set it stays set; engines observe it and return
/// [`EngineError::Cancelled`] without clearing it. A [`child`](Self::child)
/// token observes its parent but cancelling it leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    /// Fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh token that also reports cancellation when `self` (or any of its
    /// ancestors) is cancelled.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested here or on an ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }
}

/// Summary of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Step number just completed.
    pub step: u64,
    /// Proposals produced by evaluation.
    pub proposals: usize,
    /// Proposals surviving conflict resolution.
    pub accepted: usize,
    /// Swaps actually executed.
    pub swaps: usize,
    /// Whether the detector fired after this step.
    pub converged: bool,
}

/// Collaborators handed to an engine at construction.
pub struct EngineParts<C> {
    /// Run settings.
    pub config: EngineConfig,
    /// Step observer.
    pub probe: Arc<dyn Probe<C>>,
    /// Convergence predicate.
    pub detector: Arc<dyn ConvergenceDetector>,
    /// Random source for neighbor choice.
    pub rng: Box<dyn RandomSource>,
    /// Cancellation flag.
    pub cancel: CancelToken,
}

impl<C: Cell> EngineParts<C> {
    /// Default collaborators for `config`: a [`BasicProbe`] honoring
    /// `record_trajectory`, a [`NoSwapConvergence`] detector and a [`Prng`]
    /// seeded from `config.seed`.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `config` does not validate.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            probe: Arc::new(BasicProbe::<C>::with_recording(config.record_trajectory)),
            detector: Arc::new(NoSwapConvergence::new(config.required_stable_steps)?),
            rng: Box::new(Prng::from_seed_u64(config.seed)),
            cancel: CancelToken::new(),
        })
    }

    /// Replaces the probe.
    pub fn with_probe(mut self, probe: Arc<dyn Probe<C>>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the convergence detector.
    pub fn with_detector(mut self, detector: Arc<dyn ConvergenceDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Replaces the random source.
    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Shares an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl<C> std::fmt::Debug for EngineParts<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineParts")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Lifecycle shared by every in-trial strategy.
pub trait Engine<C: Cell>: Send {
    /// Spawns workers (if any) and permits stepping.
    ///
    /// # Errors
    /// [`EngineError::AlreadyStarted`], [`EngineError::ShutDown`], or
    /// [`EngineError::Spawn`].
    fn start(&mut self) -> Result<(), EngineError>;

    /// Runs until the detector fires or `max_steps` is reached, starting the
    /// engine first if needed. Returns the final step counter.
    ///
    /// # Errors
    /// Any step error; the engine is left in whatever state the failing step
    /// produced.
    fn run_until_convergence(&mut self, max_steps: u64) -> Result<u64, EngineError>;

    /// Stops workers. Idempotent.
    fn shutdown(&mut self);

    /// Returns to the freshly constructed state: step and counters zeroed,
    /// selection targets reset, probe cleared with a new step-0 snapshot.
    /// Cell positions are kept.
    ///
    /// # Errors
    /// Engine-specific teardown failures.
    fn reset(&mut self) -> Result<(), EngineError>;

    /// Current phase.
    fn state(&self) -> EngineState;

    /// Completed steps (swap count for the lock engine).
    fn current_step(&self) -> u64;

    /// Whether the detector has fired.
    fn is_converged(&self) -> bool;

    /// Copy of the arena.
    fn arena(&self) -> CellArena<C>;

    /// Copy of the cells.
    fn cells(&self) -> Vec<C> {
        self.arena().into_cells()
    }

    /// Handle for cooperative cancellation.
    fn cancel_token(&self) -> CancelToken;
}

/// Engines with a globally ordered step.
pub trait SteppedEngine<C: Cell>: Engine<C> {
    /// Executes one evaluate/resolve/execute cycle.
    ///
    /// # Errors
    /// [`EngineError::NotStarted`], [`EngineError::ShutDown`],
    /// [`EngineError::Cancelled`], or a strategy-specific failure.
    fn step(&mut self) -> Result<StepReport, EngineError>;

    /// Receipt for the most recent step.
    fn last_receipt(&self) -> Option<&StepReceipt>;
}

/// Builds an engine of the requested strategy.
///
/// # Errors
/// [`EngineError::InvalidConfig`] when `parts.config` does not validate.
pub fn build_engine<C: Cell>(
    mode: ExecutionMode,
    arena: CellArena<C>,
    parts: EngineParts<C>,
) -> Result<Box<dyn Engine<C>>, EngineError> {
    let engine: Box<dyn Engine<C>> = match mode {
        ExecutionMode::Sequential => Box::new(SequentialEngine::new(arena, parts)?),
        ExecutionMode::Barrier => Box::new(BarrierEngine::new(arena, parts)?),
        ExecutionMode::LockContended => Box::new(LockEngine::new(arena, parts)?),
    };
    Ok(engine)
}

fn run_stepped<C: Cell, E: SteppedEngine<C> + ?Sized>(
    engine: &mut E,
    max_steps: u64,
) -> Result<u64, EngineError> {
    if engine.state() == EngineState::Stopped {
        return Err(EngineError::ShutDown);
    }
    match engine.start() {
        Ok(()) | Err(EngineError::AlreadyStarted) => {}
        Err(e) => return Err(e),
    }
    while !engine.is_converged() && engine.current_step() < max_steps {
        engine.step()?;
    }
    if engine.is_converged() {
        tracing::info!(steps = engine.current_step(), "converged");
    } else {
        tracing::info!(steps = engine.current_step(), "step budget exhausted");
    }
    Ok(engine.current_step())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_but_not_the_reverse() {
        let root = CancelToken::new();
        let child = root.child();
        let grandchild = child.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!root.is_cancelled());

        let fresh = root.child().child();
        assert!(!fresh.is_cancelled());
        root.cancel();
        assert!(fresh.is_cancelled());
    }
}
