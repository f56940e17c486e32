// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted random source.

use std::sync::{Arc, Mutex};

use doom_core::RandomSource;

/// Replays a fixed script of draws, cycling when exhausted.
///
/// Each draw is reduced modulo the requested bound, so a script of `0`s
/// always picks the first candidate and `1`s the second (when present).
/// Every requested bound is logged for inspection through clones.
///
/// ```
/// use doom_core::RandomSource;
/// use doom_dry_tests::ScriptedRandom;
///
/// let mut rng = ScriptedRandom::new([1, 0]);
/// assert_eq!(rng.next_below(2), 1);
/// assert_eq!(rng.next_below(2), 0);
/// assert_eq!(rng.next_below(2), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: Vec<usize>,
    cursor: usize,
    bounds: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedRandom {
    /// Script to replay. An empty script always draws `0`.
    pub fn new(script: impl IntoIterator<Item = usize>) -> Self {
        Self {
            script: script.into_iter().collect(),
            cursor: 0,
            bounds: Arc::default(),
        }
    }

    /// Always draws `value` (reduced by the bound).
    pub fn constant(value: usize) -> Self {
        Self::new([value])
    }

    /// Bounds requested so far, in order.
    pub fn requested_bounds(&self) -> Vec<usize> {
        self.bounds.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_below(&mut self, bound: usize) -> usize {
        self.bounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(bound);
        let raw = if self.script.is_empty() {
            0
        } else {
            let v = self.script[self.cursor % self.script.len()];
            self.cursor += 1;
            v
        };
        if bound <= 1 {
            0
        } else {
            raw % bound
        }
    }
}
