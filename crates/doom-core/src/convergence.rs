// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Convergence detection.
use crate::error::EngineError;
use crate::probe::ProbeCounters;

/// Decides when a run has settled.
pub trait ConvergenceDetector: Send + Sync {
    /// Consulted after every recorded step.
    fn has_converged(&self, probe: &dyn ProbeCounters, current_step: u64) -> bool;
}

/// Converged once `required_stable_steps` consecutive steps executed no swap.
///
/// Reads only the probe's running streak, so it works with snapshot
/// recording disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSwapConvergence {
    required_stable_steps: u64,
}

impl NoSwapConvergence {
    /// Creates a detector.
    ///
    /// # Errors
    /// [`EngineError::InvalidConfig`] when `required_stable_steps` is zero.
    pub fn new(required_stable_steps: u64) -> Result<Self, EngineError> {
        if required_stable_steps == 0 {
            return Err(EngineError::InvalidConfig(
                "required stable steps must be at least 1",
            ));
        }
        Ok(Self {
            required_stable_steps,
        })
    }

    /// Configured streak length.
    pub fn required_stable_steps(&self) -> u64 {
        self.required_stable_steps
    }
}

impl ConvergenceDetector for NoSwapConvergence {
    fn has_converged(&self, probe: &dyn ProbeCounters, _current_step: u64) -> bool {
        probe.steps_since_last_swap() >= self.required_stable_steps
    }
}
