// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for doom crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`arena`] - Arena builder with per-cell algotype, direction and frozen state
//! - [`cells`] - Custom cell types for exercising the `Cell` contract
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`random`] - Scripted random source
//! - [`trace`] - Test tracing subscriber

pub mod arena;
pub mod cells;
pub mod config;
pub mod random;
pub mod trace;

pub use arena::ArenaBuilder;
pub use cells::RemainderCell;
pub use config::InMemoryConfigStore;
pub use random::ScriptedRandom;
pub use trace::init_test_tracing;
