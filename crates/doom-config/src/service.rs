// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port.

use doom_core::config::ExperimentConfig;
use thiserror::Error;
use tracing::debug;

/// Key under which the default experiment is stored.
pub const EXPERIMENT_KEY: &str = "experiment";

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// Key is empty or would escape the store.
    #[error("invalid config key: {0:?}")]
    InvalidKey(String),
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored experiment failed validation.
    #[error("invalid experiment: {0}")]
    Invalid(#[from] doom_core::EngineError),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Validates experiments, encodes them as JSON and delegates storage to a
/// [`ConfigStore`]. Several experiments can live side by side under
/// different keys.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Raw blob for `key`. A missing key and an empty blob both read as `None`.
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Loads and validates the experiment stored under `key`. Returns
    /// `Ok(None)` if missing. Missing fields take their default values.
    pub fn load(&self, key: &str) -> Result<Option<ExperimentConfig>, ConfigError> {
        let Some(bytes) = self.fetch(key)? else {
            debug!(key, "no stored experiment");
            return Ok(None);
        };
        let config: ExperimentConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        debug!(key, trials = config.trials, mode = ?config.mode, "experiment loaded");
        Ok(Some(config))
    }

    /// Validates `config` and persists it under `key`. Nothing is written
    /// when validation fails.
    pub fn save(&self, key: &str, config: &ExperimentConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let data = serde_json::to_vec_pretty(config)?;
        self.store.save_raw(key, &data)?;
        debug!(key, bytes = data.len(), "experiment saved");
        Ok(())
    }

    /// Loads the experiment under [`EXPERIMENT_KEY`], falling back to
    /// defaults when absent.
    pub fn load_experiment(&self) -> Result<ExperimentConfig, ConfigError> {
        Ok(self.load(EXPERIMENT_KEY)?.unwrap_or_default())
    }

    /// Stores `config` under [`EXPERIMENT_KEY`].
    pub fn save_experiment(&self, config: &ExperimentConfig) -> Result<(), ConfigError> {
        self.save(EXPERIMENT_KEY, config)
    }
}
