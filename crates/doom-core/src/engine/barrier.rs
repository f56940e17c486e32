// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Barrier-parallel engine: one worker per cell, three rendezvous per step.
//!
//! ```text
//! coordinator            workers (cell-0 .. cell-n-1)
//!   draw plan
//!   ── Release ──────────── wake
//!                          evaluate under arena read lock
//!   ── Evaluated ────────── publish evaluation
//!   resolve + execute
//!   under arena write lock
//!   ── Executed ─────────── loop
//! ```
//!
//! Workers only read the arena; every mutation happens on the coordinator
//! inside the execute window, so results match [`super::SequentialEngine`]
//! exactly for the same seed.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use tracing::{instrument, warn};

use super::stepper::Stepper;
use super::{
    run_stepped, CancelToken, Engine, EngineParts, EngineState, StepReport, SteppedEngine,
};
use crate::arena::CellArena;
use crate::cell::Cell;
use crate::error::{BarrierPhase, EngineError};
use crate::evaluate::{evaluate_cell, BubblePolicy, ChoicePlan, Evaluation};
use crate::receipt::StepReceipt;
use crate::rendezvous::{Rendezvous, RendezvousError};

/// State shared with workers for the engine's whole life.
struct Shared<C> {
    arena: RwLock<CellArena<C>>,
    plan: RwLock<ChoicePlan>,
    evaluations: Mutex<Vec<Evaluation>>,
    policy: BubblePolicy,
    panicked: Mutex<Option<usize>>,
}

/// State of one started run; rebuilt by every `start`.
struct Crew {
    rendezvous: Arc<Rendezvous>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

/// Thread-per-cell engine synchronized by an N+1 rendezvous.
pub struct BarrierEngine<C> {
    shared: Arc<Shared<C>>,
    stepper: Stepper<C>,
    crew: Option<Crew>,
    state: EngineState,
}

impl<C: Cell> BarrierEngine<C> {
    /// Builds the engine and records the step-0 snapshot. No threads are
    /// spawned until [`Engine::start`].
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `parts.config` does not validate.
    pub fn new(arena: CellArena<C>, parts: EngineParts<C>) -> Result<Self, EngineError> {
        parts.config.validate()?;
        let stepper = Stepper::new(parts);
        stepper.record_initial(&arena);
        let n = arena.len();
        let shared = Shared {
            arena: RwLock::new(arena),
            plan: RwLock::new(ChoicePlan::default()),
            evaluations: Mutex::new(vec![Evaluation::default(); n]),
            policy: stepper.config.bubble_policy,
            panicked: Mutex::new(None),
        };
        Ok(Self {
            shared: Arc::new(shared),
            stepper,
            crew: None,
            state: EngineState::Idle,
        })
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.crew.as_ref().map_or(0, |c| c.workers.len())
    }

    fn len(&self) -> usize {
        read(&self.shared.arena).len()
    }

    fn spawn_crew(&self) -> Result<Crew, EngineError> {
        let n = self.len();
        let rendezvous = Arc::new(Rendezvous::new(n + 1));
        let stop = Arc::new(AtomicBool::new(false));
        let mut crew = Crew {
            rendezvous,
            stop,
            workers: Vec::with_capacity(n),
        };
        for index in 0..n {
            let shared = Arc::clone(&self.shared);
            let rendezvous = Arc::clone(&crew.rendezvous);
            let stop = Arc::clone(&crew.stop);
            let cancel = self.stepper.cancel.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("cell-{index}"))
                .spawn(move || worker_loop(index, &shared, &rendezvous, &stop, &cancel));
            match spawned {
                Ok(handle) => crew.workers.push(handle),
                Err(err) => {
                    dismiss(crew);
                    return Err(EngineError::Spawn(err));
                }
            }
        }
        Ok(crew)
    }

    /// Breaks down the crew after a failed rendezvous and classifies the
    /// failure.
    fn fail(&mut self, err: RendezvousError, phase: BarrierPhase) -> EngineError {
        let step = self.stepper.step() + 1;
        if let Some(crew) = self.crew.take() {
            dismiss(crew);
        }
        self.state = EngineState::Stopped;
        let panicked = *self
            .shared
            .panicked
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = panicked {
            warn!(worker, step, %phase, "worker panicked");
            return EngineError::WorkerPanicked { worker };
        }
        if self.stepper.cancel.is_cancelled() {
            warn!(step, %phase, "cancelled");
            return EngineError::Cancelled;
        }
        match err {
            RendezvousError::Timeout => {
                let timeout = self.stepper.config.barrier_timeout;
                warn!(step, %phase, ?timeout, "barrier timeout");
                EngineError::BarrierTimeout {
                    step,
                    phase,
                    timeout,
                }
            }
            RendezvousError::Broken | RendezvousError::Aborted => {
                warn!(step, %phase, "barrier broken");
                EngineError::BarrierBroken { step, phase }
            }
        }
    }

    fn rendezvous(&mut self, phase: BarrierPhase) -> Result<(), EngineError> {
        let Some(crew) = self.crew.as_ref() else {
            return Err(EngineError::NotStarted);
        };
        let cancel = self.stepper.cancel.clone();
        let outcome = crew.rendezvous.wait(
            Some(self.stepper.config.barrier_timeout),
            &|| cancel.is_cancelled(),
        );
        match outcome {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail(err, phase)),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Signals stop, breaks the rendezvous and joins every worker.
fn dismiss(crew: Crew) {
    crew.stop.store(true, Ordering::Release);
    crew.rendezvous.break_barrier();
    for handle in crew.workers {
        if handle.join().is_err() {
            warn!("worker thread exited by panic");
        }
    }
}

fn worker_loop<C: Cell>(
    index: usize,
    shared: &Shared<C>,
    rendezvous: &Rendezvous,
    stop: &AtomicBool,
    cancel: &CancelToken,
) {
    let abort = || stop.load(Ordering::Acquire) || cancel.is_cancelled();
    loop {
        if abort() {
            rendezvous.break_barrier();
            return;
        }
        if rendezvous.wait(None, &abort).is_err() {
            return;
        }
        let evaluated = catch_unwind(AssertUnwindSafe(|| {
            let arena = read(&shared.arena);
            let pick = read(&shared.plan).pick(index);
            evaluate_cell(&arena, index, shared.policy, pick)
        }));
        match evaluated {
            Ok(eval) => {
                let mut slots = shared
                    .evaluations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(slot) = slots.get_mut(index) {
                    *slot = eval;
                }
            }
            Err(_) => {
                let mut panicked = shared.panicked.lock().unwrap_or_else(PoisonError::into_inner);
                panicked.get_or_insert(index);
                drop(panicked);
                rendezvous.break_barrier();
                return;
            }
        }
        if rendezvous.wait(None, &abort).is_err() {
            return;
        }
        if rendezvous.wait(None, &abort).is_err() {
            return;
        }
    }
}

impl<C: Cell> Engine<C> for BarrierEngine<C> {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if self.crew.is_some() {
            return Err(EngineError::AlreadyStarted);
        }
        self.crew = Some(self.spawn_crew()?);
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(mode = "barrier", cells = self.len()))]
    fn run_until_convergence(&mut self, max_steps: u64) -> Result<u64, EngineError> {
        run_stepped(self, max_steps)
    }

    fn shutdown(&mut self) {
        if let Some(crew) = self.crew.take() {
            dismiss(crew);
        }
        self.state = EngineState::Stopped;
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        if let Some(crew) = self.crew.take() {
            dismiss(crew);
        }
        *self
            .shared
            .panicked
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        let mut arena = write(&self.shared.arena);
        self.stepper.reset(&mut arena);
        drop(arena);
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
        read(&self.shared.arena).clone()
    }

    fn cancel_token(&self) -> CancelToken {
        self.stepper.cancel.clone()
    }
}

impl<C: Cell> SteppedEngine<C> for BarrierEngine<C> {
    fn step(&mut self) -> Result<StepReport, EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if self.crew.is_none() {
            return Err(EngineError::NotStarted);
        }
        if self.stepper.cancel.is_cancelled() {
            if let Some(crew) = self.crew.take() {
                dismiss(crew);
            }
            self.state = EngineState::Stopped;
            warn!(step = self.stepper.step() + 1, "cancelled");
            return Err(EngineError::Cancelled);
        }

        self.state = EngineState::Evaluating;
        let plan = {
            let arena = read(&self.shared.arena);
            self.stepper.draw_plan(&arena)
        };
        *write(&self.shared.plan) = plan;

        self.rendezvous(BarrierPhase::Release)?;
        self.rendezvous(BarrierPhase::Evaluated)?;

        self.state = EngineState::Resolving;
        let evaluations = self
            .shared
            .evaluations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let resolved = self.stepper.resolve(&evaluations);
        self.state = EngineState::Executing;
        let report = {
            let mut arena = write(&self.shared.arena);
            self.stepper.execute(&mut arena, &evaluations, resolved)
        };

        self.rendezvous(BarrierPhase::Executed)?;
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

impl<C> Drop for BarrierEngine<C> {
    fn drop(&mut self) {
        if let Some(crew) = self.crew.take() {
            dismiss(crew);
        }
    }
}
