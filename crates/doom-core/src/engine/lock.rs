// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lock-contended engine.
//!
//! Every cell runs on its own thread and repeatedly takes one global mutex to
//! evaluate itself and, if it wants to, swap. There is no global step: the
//! counter advances once per executed swap and each swap records a snapshot.
//! Thread scheduling decides the order of turns, so runs are not
//! reproducible. Convergence is detected by polling the swap counter.
//!
//! A cell blocked by a frozen neighbor would otherwise retry the same denied
//! swap on every turn. A denial is counted once per arrangement: the same
//! `initiator -> target` pair is skipped until some swap changes the arena.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use rustc_hash::FxHashSet;
use tracing::{info, instrument, warn};

use super::{CancelToken, Engine, EngineParts, EngineState};
use crate::arena::CellArena;
use crate::cell::Cell;
use crate::config::EngineConfig;
use crate::convergence::ConvergenceDetector;
use crate::error::EngineError;
use crate::evaluate::{evaluate_cell, BubblePolicy};
use crate::metadata::Algotype;
use crate::probe::Probe;
use crate::rng::RandomSource;
use crate::swap::{SwapExecutor, SwapOutcome};
use crate::topology::bubble_neighbors;

/// Everything guarded by the global lock.
struct Critical<C> {
    arena: CellArena<C>,
    rng: Box<dyn RandomSource>,
    executor: SwapExecutor,
    step: u64,
    denied: FxHashSet<(usize, usize)>,
}

struct Shared<C> {
    critical: Mutex<Critical<C>>,
    probe: Arc<dyn Probe<C>>,
    policy: BubblePolicy,
    running: AtomicBool,
    total_swaps: AtomicU64,
}

impl<C: Cell> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Critical<C>> {
        self.critical.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One cell's turn inside the critical section.
    fn turn(&self, index: usize) {
        let mut guard = self.lock();
        let critical = &mut *guard;
        let n = critical.arena.len();
        let Some(meta) = critical.arena.metadata().get(index).copied() else {
            return;
        };
        let random_bubble =
            meta.algotype() == Algotype::Bubble && self.policy == BubblePolicy::RandomNeighbor;
        let pick = if random_bubble {
            let neighbors = bubble_neighbors(index, n);
            if neighbors.is_empty() {
                return;
            }
            critical.rng.next_below(neighbors.len())
        } else {
            0
        };

        let eval = evaluate_cell(&critical.arena, index, self.policy, pick);
        let probe = self.probe.as_ref();
        for _ in 0..eval.comparisons {
            probe.record_compare_and_swap();
        }
        let mut permit = critical.arena.write_permit();
        if eval.advance_ideal {
            permit.bump_ideal_position(index);
        }
        let Some(proposal) = eval.proposal else {
            return;
        };
        let pair = (proposal.initiator, proposal.target);
        if critical.denied.contains(&pair) {
            return;
        }
        let outcome =
            critical
                .executor
                .attempt_swap(&mut permit, proposal.initiator, proposal.target, probe);
        match outcome {
            SwapOutcome::Swapped => {
                critical.denied.clear();
                self.total_swaps.fetch_add(1, Ordering::AcqRel);
                critical.step += 1;
                probe.record_snapshot(critical.step, critical.arena.cells(), 1);
            }
            SwapOutcome::Denied(_) => {
                critical.denied.insert(pair);
            }
        }
    }
}

struct Crew {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

/// Thread-per-cell engine serialized by a single mutex.
pub struct LockEngine<C> {
    shared: Arc<Shared<C>>,
    config: EngineConfig,
    detector: Arc<dyn ConvergenceDetector>,
    cancel: CancelToken,
    crew: Option<Crew>,
    state: EngineState,
    converged: bool,
}

impl<C: Cell> LockEngine<C> {
    /// Builds the engine and records the step-0 snapshot.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `parts.config` does not validate.
    pub fn new(arena: CellArena<C>, parts: EngineParts<C>) -> Result<Self, EngineError> {
        parts.config.validate()?;
        parts.probe.record_snapshot(0, arena.cells(), 0);
        let shared = Shared {
            critical: Mutex::new(Critical {
                arena,
                rng: parts.rng,
                executor: SwapExecutor::new(),
                step: 0,
                denied: FxHashSet::default(),
            }),
            probe: parts.probe,
            policy: parts.config.bubble_policy,
            running: AtomicBool::new(false),
            total_swaps: AtomicU64::new(0),
        };
        Ok(Self {
            shared: Arc::new(shared),
            config: parts.config,
            detector: parts.detector,
            cancel: parts.cancel,
            crew: None,
            state: EngineState::Idle,
            converged: false,
        })
    }

    /// Swaps executed so far.
    pub fn total_swaps(&self) -> u64 {
        self.shared.total_swaps.load(Ordering::Acquire)
    }

    fn halt(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(crew) = self.crew.take() {
            crew.join();
        }
    }
}

impl Crew {
    /// Signals stop and joins every worker.
    fn join(self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.workers {
            if handle.join().is_err() {
                warn!("lock worker exited by panic");
            }
        }
    }
}

fn worker_loop<C: Cell>(index: usize, shared: &Shared<C>, stop: &AtomicBool, cancel: &CancelToken) {
    while shared.running.load(Ordering::Acquire)
        && !stop.load(Ordering::Acquire)
        && !cancel.is_cancelled()
    {
        shared.turn(index);
        std::thread::yield_now();
    }
}

impl<C: Cell> Engine<C> for LockEngine<C> {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if self.crew.is_some() {
            return Err(EngineError::AlreadyStarted);
        }
        let n = self.shared.lock().arena.len();
        let stop = Arc::new(AtomicBool::new(false));
        self.shared.running.store(true, Ordering::Release);
        let mut workers = Vec::with_capacity(n);
        for index in 0..n {
            let shared = Arc::clone(&self.shared);
            let stop_flag = Arc::clone(&stop);
            let cancel = self.cancel.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("lock-cell-{index}"))
                .spawn(move || worker_loop(index, &shared, &stop_flag, &cancel));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    self.crew = Some(Crew { stop, workers });
                    self.halt();
                    return Err(EngineError::Spawn(err));
                }
            }
        }
        self.crew = Some(Crew { stop, workers });
        self.state = EngineState::Executing;
        Ok(())
    }

    /// Polls every `lock_poll_interval` until the detector fires, the swap
    /// counter stays flat for `lock_required_stable_polls` polls, or the
    /// step counter reaches `max_steps`. Workers are joined before returning.
    #[instrument(level = "debug", skip(self), fields(mode = "lock"))]
    fn run_until_convergence(&mut self, max_steps: u64) -> Result<u64, EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::ShutDown);
        }
        if self.crew.is_none() {
            self.start()?;
        }
        let mut last_swaps = self.total_swaps();
        let mut stable_polls = 0_u32;
        while !self.converged && self.current_step() < max_steps {
            std::thread::sleep(self.config.lock_poll_interval);
            if self.cancel.is_cancelled() {
                self.halt();
                self.state = EngineState::Stopped;
                warn!(step = self.current_step(), "cancelled");
                return Err(EngineError::Cancelled);
            }
            if self
                .detector
                .has_converged(self.shared.probe.as_ref(), self.current_step())
            {
                self.converged = true;
                break;
            }
            let swaps = self.total_swaps();
            if swaps == last_swaps {
                stable_polls += 1;
                if stable_polls >= self.config.lock_required_stable_polls {
                    self.converged = true;
                }
            } else {
                stable_polls = 0;
                last_swaps = swaps;
            }
        }
        self.halt();
        self.state = if self.converged {
            info!(steps = self.current_step(), "converged");
            EngineState::Converged
        } else {
            info!(steps = self.current_step(), "step budget exhausted");
            EngineState::Idle
        };
        Ok(self.current_step())
    }

    fn shutdown(&mut self) {
        self.halt();
        self.state = EngineState::Stopped;
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.halt();
        {
            let mut critical = self.shared.lock();
            critical.step = 0;
            critical.denied.clear();
            critical.executor.reset_count();
            critical.arena.write_permit().reset_ideal_positions();
            self.shared.probe.clear();
            self.shared.probe.record_snapshot(0, critical.arena.cells(), 0);
        }
        self.shared.total_swaps.store(0, Ordering::Release);
        self.converged = false;
        self.state = EngineState::Idle;
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn current_step(&self) -> u64 {
        self.shared.lock().step
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn arena(&self) -> CellArena<C> {
        self.shared.lock().arena.clone()
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl<C> Drop for LockEngine<C> {
    fn drop(&mut self) {
        if let Some(crew) = self.crew.take() {
            crew.join();
        }
    }
}
