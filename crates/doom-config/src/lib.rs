// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config persistence for doom experiments.
//!
//! [`ConfigService`] validates experiment configs, serializes them as JSON
//! and hands raw bytes to a [`ConfigStore`]. [`FsConfigStore`] keeps one file per key under the
//! platform config directory; tests use an in-memory store instead.
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod fs;
mod service;

pub use fs::FsConfigStore;
pub use service::{ConfigError, ConfigService, ConfigStore, EXPERIMENT_KEY};
