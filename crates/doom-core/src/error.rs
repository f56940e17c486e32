// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine error surface.
use std::time::Duration;

use thiserror::Error;

/// Rendezvous point inside a barrier-parallel step.
///
/// Each step crosses the same three points in order; the phase is carried in
/// timeout and breakage errors so callers can tell where a step stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BarrierPhase {
    /// Coordinator releases workers to evaluate.
    Release,
    /// All workers have published their evaluation.
    Evaluated,
    /// Coordinator finished resolve + execute; workers may loop.
    Executed,
}

impl std::fmt::Display for BarrierPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Release => "release",
            Self::Evaluated => "evaluated",
            Self::Executed => "executed",
        };
        f.write_str(name)
    }
}

/// Errors emitted by engines, arenas and metadata parsing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `step` was called before `start`.
    #[error("engine not started; call start() first")]
    NotStarted,
    /// `start` was called on an engine that is already running.
    #[error("engine already started")]
    AlreadyStarted,
    /// The engine was shut down and cannot be stepped again.
    #[error("engine has been shut down")]
    ShutDown,
    /// A rendezvous did not complete within the configured timeout.
    #[error("barrier timeout at step {step} ({phase}) after {timeout:?}")]
    BarrierTimeout {
        /// Step that was in flight.
        step: u64,
        /// Rendezvous point that timed out.
        phase: BarrierPhase,
        /// Configured bound.
        timeout: Duration,
    },
    /// Another participant broke the rendezvous (timeout, panic or shutdown).
    #[error("barrier broken at step {step} ({phase})")]
    BarrierBroken {
        /// Step that was in flight.
        step: u64,
        /// Rendezvous point where breakage was observed.
        phase: BarrierPhase,
    },
    /// Cooperative cancellation was requested.
    #[error("run cancelled")]
    Cancelled,
    /// A worker thread panicked.
    #[error("worker {worker} panicked")]
    WorkerPanicked {
        /// Index of the worker (its cell index).
        worker: usize,
    },
    /// Spawning a worker thread failed.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// Text or ordinal did not name a known algotype.
    #[error("unknown algotype: {0}")]
    UnknownAlgotype(String),
    /// Parallel arrays disagree in length.
    #[error("length mismatch: {cells} cells but {metadata} metadata records")]
    LengthMismatch {
        /// Cell count.
        cells: usize,
        /// Metadata count.
        metadata: usize,
    },
    /// Index outside the arena.
    #[error("index {index} out of range for {len} cells")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Arena length.
        len: usize,
    },
    /// Configuration rejected by `validate`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Population construction failed.
    #[error(transparent)]
    Population(#[from] crate::population::PopulationError),
}
