// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! doom-core: emergent cell-view sorting engine.
//!
//! Every array element is an autonomous cell that only looks at its own
//! neighborhood and decides whether to swap. Global order emerges from those
//! local decisions. Cells follow one of three algotypes (Bubble, Insertion,
//! Selection), may be frozen in place, and are driven by one of three
//! execution engines:
//!
//! - sequential: deterministic, single-threaded reference;
//! - barrier: thread per cell, lockstep steps, same trajectory as sequential;
//! - lock-contended: thread per cell racing for one mutex.
//!
//! [`TrialRunner`] runs many independent trials across a worker pool, and
//! [`conformance`] checks stepped engines against each other step by step.
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod arena;
mod cell;
pub mod config;
pub mod conformance;
mod convergence;
mod decision;
pub mod engine;
mod error;
mod evaluate;
mod frozen;
mod metadata;
pub mod population;
mod probe;
mod receipt;
mod rendezvous;
mod rng;
mod scheduler;
mod swap;
mod topology;
pub mod trial;

/// Cell storage and the write capability.
pub use arena::{CellArena, WritePermit};
/// Element contract.
pub use cell::Cell;
/// Run and batch settings.
pub use config::{EngineConfig, ExperimentConfig};
/// Convergence strategies.
pub use convergence::{ConvergenceDetector, NoSwapConvergence};
/// Pure swap decisions.
pub use decision::{is_left_sorted, should_swap, SwapDecision};
/// Engines and their lifecycle.
pub use engine::{
    build_engine, BarrierEngine, CancelToken, Engine, EngineParts, EngineState, ExecutionMode,
    LockEngine, SequentialEngine, StepReport, SteppedEngine,
};
/// Error surface.
pub use error::{BarrierPhase, EngineError};
/// Per-cell evaluation.
pub use evaluate::{evaluate_cell, BubblePolicy, ChoicePlan, Evaluation};
/// Frozen restrictions.
pub use frozen::FrozenState;
/// Algotypes, directions and per-cell metadata.
pub use metadata::{Algotype, CellMetadata, SortDirection};
/// Population builders.
pub use population::{AlgotypeMix, PopulationError};
/// Step observation.
pub use probe::{BasicProbe, Digest, Probe, ProbeCounters, StepSnapshot};
/// Per-step receipts.
pub use receipt::{Disposition, ReceiptEntry, StepReceipt};
/// Reusable rendezvous barrier.
pub use rendezvous::{Rendezvous, RendezvousError};
/// Deterministic randomness.
pub use rng::{Prng, RandomSource};
/// Conflict resolution.
pub use scheduler::{resolve_conflicts, Resolution, SwapProposal};
/// Frozen-aware swap execution.
pub use swap::{check_frozen, FrozenDenial, SwapExecutor, SwapOutcome};
/// Neighborhood resolution.
pub use topology::{bubble_neighbors, candidates, insertion_target, selection_target, Candidates};
/// Batch execution.
pub use trial::{
    BatchReport, FailurePolicy, TrialError, TrialFailureKind, TrialOutcome, TrialResult,
    TrialRunner,
};
