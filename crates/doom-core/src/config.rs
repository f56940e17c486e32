// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine and experiment configuration.
//!
//! Plain data with `Default` and `validate()`. Persistence lives in
//! `doom-config`; these types only derive serde behind the `serde` feature.
use std::time::Duration;

use crate::engine::ExecutionMode;
use crate::error::EngineError;
use crate::evaluate::BubblePolicy;
use crate::trial::FailurePolicy;

/// Knobs for a single engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Upper bound on steps per run.
    pub max_steps: u64,
    /// Quiet steps required before declaring convergence.
    pub required_stable_steps: u64,
    /// Capture a snapshot per step.
    pub record_trajectory: bool,
    /// Bound on every barrier rendezvous.
    pub barrier_timeout: Duration,
    /// Lock-mode convergence poll period.
    pub lock_poll_interval: Duration,
    /// Lock-mode polls with no new swaps before declaring convergence.
    pub lock_required_stable_polls: u32,
    /// Bubble neighbor choice.
    pub bubble_policy: BubblePolicy,
    /// Seed for the engine's random source.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            required_stable_steps: 3,
            record_trajectory: true,
            barrier_timeout: Duration::from_millis(5_000),
            lock_poll_interval: Duration::from_millis(10),
            lock_required_stable_polls: 30,
            bubble_policy: BubblePolicy::RandomNeighbor,
            seed: 0x00C0_FFEE,
        }
    }
}

impl EngineConfig {
    /// Rejects configurations no engine can run with.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.required_stable_steps == 0 {
            return Err(EngineError::InvalidConfig(
                "required_stable_steps must be at least 1",
            ));
        }
        if self.barrier_timeout.is_zero() {
            return Err(EngineError::InvalidConfig("barrier_timeout must be non-zero"));
        }
        if self.lock_poll_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "lock_poll_interval must be non-zero",
            ));
        }
        if self.lock_required_stable_polls == 0 {
            return Err(EngineError::InvalidConfig(
                "lock_required_stable_polls must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A batch of independent trials.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExperimentConfig {
    /// Cells per trial.
    pub array_size: usize,
    /// Number of trials.
    pub trials: usize,
    /// In-trial execution strategy.
    pub mode: ExecutionMode,
    /// What a failing trial does to the batch.
    pub failure_policy: FailurePolicy,
    /// Worker threads; `0` means one per available CPU, capped at `trials`.
    pub workers: usize,
    /// Per-trial engine settings. `engine.seed` is the batch base seed.
    pub engine: EngineConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            array_size: 100,
            trials: 10,
            mode: ExecutionMode::Sequential,
            failure_policy: FailurePolicy::FailFast,
            workers: 0,
            engine: EngineConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Validates the batch and its engine settings.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.trials == 0 {
            return Err(EngineError::InvalidConfig("trials must be at least 1"));
        }
        if self.array_size == 0 {
            return Err(EngineError::InvalidConfig("array_size must be at least 1"));
        }
        self.engine.validate()
    }

    /// Worker count actually used for the batch.
    pub fn effective_workers(&self) -> usize {
        let requested = if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.workers
        };
        requested.clamp(1, self.trials.max(1))
    }
}
