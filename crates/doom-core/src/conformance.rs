// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Side-by-side determinism checks between stepped engines.
//!
//! Each side is described by a [`PairConfig`]: an execution mode, engine
//! settings and an arena factory, so both sides start from fresh, identical
//! state. Steps are driven in lockstep on the calling thread and the
//! snapshot digests compared after every step.
use std::sync::Arc;

use thiserror::Error;

use crate::arena::CellArena;
use crate::cell::Cell;
use crate::config::EngineConfig;
use crate::engine::{BarrierEngine, EngineParts, ExecutionMode, SequentialEngine, SteppedEngine};
use crate::error::EngineError;
use crate::probe::{Digest, StepSnapshot};

/// Describes one side of a determinism pair.
#[derive(Clone)]
pub struct PairConfig<C> {
    /// Human label for reports.
    pub label: String,
    /// Stepped execution mode.
    pub mode: ExecutionMode,
    /// Engine settings.
    pub engine: EngineConfig,
    /// Factory producing the starting arena.
    pub arena: Arc<dyn Fn() -> CellArena<C> + Send + Sync>,
}

impl<C: Cell> PairConfig<C> {
    /// Convenience constructor.
    pub fn new<F>(label: impl Into<String>, mode: ExecutionMode, engine: EngineConfig, arena: F) -> Self
    where
        F: Fn() -> CellArena<C> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            mode,
            engine,
            arena: Arc::new(arena),
        }
    }
}

impl<C> std::fmt::Debug for PairConfig<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairConfig")
            .field("label", &self.label)
            .field("mode", &self.mode)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Determinism check failure.
#[derive(Debug, Error)]
pub enum DeterminismError {
    /// Snapshot digests diverged at a given step.
    #[error(
        "determinism mismatch at step {step}: {label_a}={} vs {label_b}={}",
        hex::encode(.hash_a),
        hex::encode(.hash_b)
    )]
    SnapshotMismatch {
        /// Step where divergence was detected.
        step: u64,
        /// Label of the first side.
        label_a: String,
        /// Label of the second side.
        label_b: String,
        /// Snapshot digest of the first side.
        hash_a: Digest,
        /// Snapshot digest of the second side.
        hash_b: Digest,
    },
    /// One side reported convergence and the other did not.
    #[error("convergence diverged at step {step}: {label} converged alone")]
    ConvergenceMismatch {
        /// Step where only one side converged.
        step: u64,
        /// Label of the side that converged.
        label: String,
    },
    /// The mode has no global step to compare.
    #[error("{0:?} engines are not stepped")]
    NotStepped(ExecutionMode),
    /// An engine failed while stepping.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Summary of a matching pair run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReport {
    /// Steps compared.
    pub steps: u64,
    /// Whether both sides converged.
    pub converged: bool,
    /// Digest of the last compared snapshot.
    pub final_digest: Digest,
}

/// Builds a fresh stepped engine from `cfg`.
///
/// # Errors
/// [`DeterminismError::NotStepped`] for [`ExecutionMode::LockContended`], or
/// the engine's construction error.
pub fn build_stepped<C: Cell>(cfg: &PairConfig<C>) -> Result<Box<dyn SteppedEngine<C>>, DeterminismError> {
    let parts = EngineParts::from_config(&cfg.engine)?;
    let arena = (cfg.arena)();
    let engine: Box<dyn SteppedEngine<C>> = match cfg.mode {
        ExecutionMode::Sequential => Box::new(SequentialEngine::new(arena, parts)?),
        ExecutionMode::Barrier => Box::new(BarrierEngine::new(arena, parts)?),
        ExecutionMode::LockContended => return Err(DeterminismError::NotStepped(cfg.mode)),
    };
    Ok(engine)
}

/// Runs two engines in lockstep for up to `steps` steps and compares
/// snapshot digests after each one. Stops early once both converge.
///
/// # Errors
/// [`DeterminismError::SnapshotMismatch`] at the first diverging step,
/// [`DeterminismError::ConvergenceMismatch`] when only one side converges,
/// or any engine error.
pub fn run_pair_determinism<C: Cell>(
    cfg_a: &PairConfig<C>,
    cfg_b: &PairConfig<C>,
    steps: u64,
) -> Result<PairReport, DeterminismError> {
    let mut a = build_stepped(cfg_a)?;
    let mut b = build_stepped(cfg_b)?;
    a.start()?;
    b.start()?;

    let mut report = PairReport {
        steps: 0,
        converged: false,
        final_digest: StepSnapshot::new(0, &a.cells(), 0).digest(),
    };
    let result = lockstep(&mut *a, &mut *b, cfg_a, cfg_b, steps, &mut report);
    a.shutdown();
    b.shutdown();
    result.map(|()| report)
}

fn lockstep<C: Cell>(
    a: &mut dyn SteppedEngine<C>,
    b: &mut dyn SteppedEngine<C>,
    cfg_a: &PairConfig<C>,
    cfg_b: &PairConfig<C>,
    steps: u64,
    report: &mut PairReport,
) -> Result<(), DeterminismError> {
    for _ in 0..steps {
        let ra = a.step()?;
        let rb = b.step()?;
        let hash_a = StepSnapshot::new(ra.step, &a.cells(), ra.swaps).digest();
        let hash_b = StepSnapshot::new(rb.step, &b.cells(), rb.swaps).digest();
        if hash_a != hash_b {
            return Err(DeterminismError::SnapshotMismatch {
                step: ra.step,
                label_a: cfg_a.label.clone(),
                label_b: cfg_b.label.clone(),
                hash_a,
                hash_b,
            });
        }
        if ra.converged != rb.converged {
            let label = if ra.converged { &cfg_a.label } else { &cfg_b.label };
            return Err(DeterminismError::ConvergenceMismatch {
                step: ra.step,
                label: label.clone(),
            });
        }
        report.steps = ra.step;
        report.final_digest = hash_a;
        if ra.converged {
            report.converged = true;
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Algotype, SortDirection};

    fn side(label: &str, mode: ExecutionMode, values: Vec<i32>) -> PairConfig<i32> {
        let engine = EngineConfig {
            seed: 5,
            ..EngineConfig::default()
        };
        PairConfig::new(label, mode, engine, move || {
            CellArena::uniform(values.clone(), Algotype::Bubble, SortDirection::Ascending)
        })
    }

    #[test]
    fn identical_sequential_pair_matches() {
        let a = side("a", ExecutionMode::Sequential, vec![6, 2, 5, 1, 4, 3]);
        let b = side("b", ExecutionMode::Sequential, vec![6, 2, 5, 1, 4, 3]);
        let report = run_pair_determinism(&a, &b, 1_000).unwrap();
        assert!(report.converged);
    }

    #[test]
    fn divergence_is_reported_at_first_step() {
        let a = side("a", ExecutionMode::Sequential, vec![2, 1]);
        let b = side("b", ExecutionMode::Sequential, vec![1, 2]);
        let err = run_pair_determinism(&a, &b, 10).unwrap_err();
        match err {
            DeterminismError::SnapshotMismatch {
                step,
                label_a,
                label_b,
                ..
            } => {
                assert_eq!(step, 1);
                assert_eq!((label_a.as_str(), label_b.as_str()), ("a", "b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lock_mode_is_rejected() {
        let a = side("a", ExecutionMode::LockContended, vec![1]);
        assert!(matches!(
            build_stepped(&a),
            Err(DeterminismError::NotStepped(ExecutionMode::LockContended))
        ));
    }
}
