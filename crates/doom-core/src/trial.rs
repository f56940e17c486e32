// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trial-parallel batch runner.
//!
//! Trials are independent, so there is no per-step synchronization: a scoped
//! pool of workers claims trial indices from an atomic counter and runs each
//! trial start to finish with its own arena, probe and seeded random source.
//! Every trial is deterministic on its own; only completion order varies.
//!
//! Each trial is isolated with `catch_unwind`, so a panicking trial becomes a
//! [`TrialFailureKind::Panicked`] instead of tearing down the batch.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::arena::CellArena;
use crate::cell::Cell;
use crate::config::{EngineConfig, ExperimentConfig};
use crate::engine::{build_engine, CancelToken, EngineParts};
use crate::error::EngineError;
use crate::metadata::SortDirection;
use crate::population::{shuffled_values, AlgotypeMix};
use crate::probe::{BasicProbe, StepSnapshot};
use crate::rng::Prng;

/// What a failing trial does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailurePolicy {
    /// Cancel remaining trials and report the lowest-indexed failure.
    #[default]
    FailFast,
    /// Record the failure and keep going.
    FaultTolerant,
}

/// Why a trial failed.
#[derive(Debug, Error)]
pub enum TrialFailureKind {
    /// Setup or engine returned an error.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The trial panicked; carries the panic message when it was a string.
    #[error("trial panicked: {0}")]
    Panicked(String),
}

/// Batch-level failure under [`FailurePolicy::FailFast`].
#[derive(Debug, Error)]
#[error("trial {trial} failed: {kind}")]
pub struct TrialError {
    /// Index of the failing trial.
    pub trial: usize,
    /// Failure detail.
    pub kind: TrialFailureKind,
}

/// Measurements from one completed trial.
#[derive(Debug, Clone)]
pub struct TrialResult<C> {
    /// Trial index within the batch.
    pub trial: usize,
    /// Seed the trial derived from the batch seed.
    pub seed: u64,
    /// Steps executed.
    pub steps: u64,
    /// Whether the detector fired before the step budget ran out.
    pub converged: bool,
    /// Executed swaps.
    pub total_swaps: u64,
    /// Compare-and-swap events.
    pub compare_and_swaps: u64,
    /// Swaps denied by frozen restrictions.
    pub frozen_swap_attempts: u64,
    /// Cells at the end of the run.
    pub final_cells: Vec<C>,
    /// Per-step snapshots when trajectory recording was on.
    pub trajectory: Option<Vec<StepSnapshot<C>>>,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// Per-trial outcome in a batch report.
#[derive(Debug)]
pub enum TrialOutcome<C> {
    /// Ran to completion.
    Completed(TrialResult<C>),
    /// Failed; recorded under [`FailurePolicy::FaultTolerant`].
    Failed(TrialFailureKind),
    /// Skipped or interrupted by cancellation.
    Cancelled,
}

/// Outcomes of a batch, indexed by trial.
#[derive(Debug)]
pub struct BatchReport<C> {
    outcomes: Vec<TrialOutcome<C>>,
    elapsed: Duration,
}

impl<C> BatchReport<C> {
    /// Outcomes in trial order.
    pub fn outcomes(&self) -> &[TrialOutcome<C>] {
        &self.outcomes
    }

    /// Completed trials in trial order.
    pub fn completed(&self) -> impl Iterator<Item = &TrialResult<C>> + '_ {
        self.outcomes.iter().filter_map(|o| match o {
            TrialOutcome::Completed(r) => Some(r),
            _ => None,
        })
    }

    /// Failed trials with their index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &TrialFailureKind)> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| match o {
                TrialOutcome::Failed(kind) => Some((i, kind)),
                _ => None,
            })
    }

    /// Fraction of completed trials that converged.
    pub fn convergence_rate(&self) -> Option<f64> {
        let (total, converged) = self
            .completed()
            .fold((0_u32, 0_u32), |(t, c), r| (t + 1, c + u32::from(r.converged)));
        (total > 0).then(|| f64::from(converged) / f64::from(total))
    }

    /// Mean steps over completed trials.
    pub fn mean_steps(&self) -> Option<f64> {
        let (count, sum) = self
            .completed()
            .fold((0_u32, 0_u64), |(n, s), r| (n + 1, s + r.steps));
        (count > 0).then(|| sum as f64 / f64::from(count))
    }

    /// Wall-clock duration of the whole batch.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Runs a batch of independent trials across a worker pool.
#[derive(Debug, Clone)]
pub struct TrialRunner {
    config: ExperimentConfig,
    cancel: CancelToken,
}

impl TrialRunner {
    /// Creates a runner.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `config` does not validate.
    pub fn new(config: ExperimentConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Shares a cancellation token with every trial.
    ///
    /// The runner only reads it. A fail-fast abort cancels a batch-local child
    /// token, so the runner stays usable for the next batch.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Batch configuration.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Batch cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Seed for trial `trial` derived from the batch base seed.
    pub fn trial_seed(&self, trial: usize) -> u64 {
        Prng::derive_seed(self.config.engine.seed, trial as u64)
    }

    /// Runs every trial.
    ///
    /// `setup` builds the arena for a trial from its index and a generator
    /// seeded from the trial seed.
    ///
    /// # Errors
    /// Under [`FailurePolicy::FailFast`], the lowest-indexed failure. Under
    /// [`FailurePolicy::FaultTolerant`] failures are reported in the batch.
    #[instrument(skip_all, fields(trials = self.config.trials, mode = ?self.config.mode))]
    pub fn run<C, F>(&self, setup: F) -> Result<BatchReport<C>, TrialError>
    where
        C: Cell,
        F: Fn(usize, &mut Prng) -> Result<CellArena<C>, EngineError> + Sync,
    {
        let started = Instant::now();
        let trials = self.config.trials;
        let workers = self.config.effective_workers();
        let next = AtomicUsize::new(0);
        let batch = self.cancel.child();

        let mut slots: Vec<Option<TrialOutcome<C>>> = (0..trials).map(|_| None).collect();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let next = &next;
                    let setup = &setup;
                    let batch = &batch;
                    s.spawn(move || {
                        let mut local = Vec::new();
                        loop {
                            let trial = next.fetch_add(1, Ordering::Relaxed);
                            if trial >= trials {
                                break;
                            }
                            let outcome = self.run_isolated(trial, setup, batch);
                            local.push((trial, outcome));
                        }
                        local
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(local) => {
                        for (trial, outcome) in local {
                            slots[trial] = Some(outcome);
                        }
                    }
                    Err(e) => std::panic::resume_unwind(e),
                }
            }
        });

        let mut outcomes: Vec<TrialOutcome<C>> = slots
            .into_iter()
            .map(|o| o.unwrap_or(TrialOutcome::Cancelled))
            .collect();

        if self.config.failure_policy == FailurePolicy::FailFast {
            let first = outcomes
                .iter()
                .position(|o| matches!(o, TrialOutcome::Failed(_)));
            if let Some(trial) = first {
                let failed = std::mem::replace(&mut outcomes[trial], TrialOutcome::Cancelled);
                if let TrialOutcome::Failed(kind) = failed {
                    warn!(trial, error = %kind, "batch aborted");
                    return Err(TrialError { trial, kind });
                }
            }
        }

        let report = BatchReport {
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            completed = report.completed().count(),
            failed = report.failures().count(),
            elapsed = ?report.elapsed,
            "batch complete"
        );
        Ok(report)
    }

    /// Runs a batch over shuffled `1..=array_size` arrays whose algotypes are
    /// drawn from `mix`.
    ///
    /// # Errors
    /// As [`run`](Self::run).
    pub fn run_population(
        &self,
        mix: &AlgotypeMix,
        direction: SortDirection,
    ) -> Result<BatchReport<i64>, TrialError> {
        let size = self.config.array_size;
        self.run(|_, rng| {
            let metadata = mix.metadata(size, direction, rng)?;
            CellArena::new(shuffled_values(size, rng), metadata)
        })
    }

    fn run_isolated<C, F>(&self, trial: usize, setup: &F, batch: &CancelToken) -> TrialOutcome<C>
    where
        C: Cell,
        F: Fn(usize, &mut Prng) -> Result<CellArena<C>, EngineError> + Sync,
    {
        if batch.is_cancelled() {
            return TrialOutcome::Cancelled;
        }
        let result = catch_unwind(AssertUnwindSafe(|| self.execute(trial, setup, batch)))
            .unwrap_or_else(|payload| Err(TrialFailureKind::Panicked(panic_message(&*payload))));
        match result {
            Ok(r) => TrialOutcome::Completed(r),
            Err(TrialFailureKind::Engine(EngineError::Cancelled)) => TrialOutcome::Cancelled,
            Err(kind) => {
                warn!(trial, error = %kind, "trial failed");
                if self.config.failure_policy == FailurePolicy::FailFast {
                    batch.cancel();
                }
                TrialOutcome::Failed(kind)
            }
        }
    }

    /// Runs one trial on the calling thread.
    ///
    /// # Errors
    /// Setup or engine failure.
    pub fn run_trial<C, F>(&self, trial: usize, setup: &F) -> Result<TrialResult<C>, TrialFailureKind>
    where
        C: Cell,
        F: Fn(usize, &mut Prng) -> Result<CellArena<C>, EngineError>,
    {
        self.execute(trial, setup, &self.cancel)
    }

    fn execute<C, F>(
        &self,
        trial: usize,
        setup: &F,
        cancel: &CancelToken,
    ) -> Result<TrialResult<C>, TrialFailureKind>
    where
        C: Cell,
        F: Fn(usize, &mut Prng) -> Result<CellArena<C>, EngineError>,
    {
        let started = Instant::now();
        let seed = self.trial_seed(trial);
        let mut setup_rng = Prng::from_seed_u64(seed);
        let arena = setup(trial, &mut setup_rng)?;

        let engine_config = EngineConfig {
            seed: Prng::derive_seed(seed, 1),
            ..self.config.engine.clone()
        };
        let probe = Arc::new(BasicProbe::<C>::with_recording(engine_config.record_trajectory));
        let parts = EngineParts::from_config(&engine_config)?
            .with_probe(probe.clone())
            .with_cancel(cancel.clone());
        let mut engine = build_engine(self.config.mode, arena, parts)?;
        let steps = engine.run_until_convergence(engine_config.max_steps);
        engine.shutdown();
        let steps = steps?;

        Ok(TrialResult {
            trial,
            seed,
            steps,
            converged: engine.is_converged(),
            total_swaps: probe.total_swaps(),
            compare_and_swaps: probe.compare_and_swap_count(),
            frozen_swap_attempts: probe.frozen_swap_attempts(),
            final_cells: engine.cells(),
            trajectory: engine_config.record_trajectory.then(|| probe.snapshots()),
            elapsed: started.elapsed(),
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
