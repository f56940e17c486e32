// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Custom cell types.

use std::cmp::Ordering;

use doom_core::Cell;

/// Cell ordered by `raw mod modulus`, ties broken by `raw`.
///
/// `value()` projects to the remainder, so the numeric projection agrees with
/// `Ord` without being the identity. Useful for checking that engines sort by
/// `Ord` and only use `value()` where intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemainderCell {
    raw: i64,
    modulus: i64,
}

impl RemainderCell {
    /// Creates a cell. `modulus` must be positive.
    pub fn new(raw: i64, modulus: i64) -> Self {
        Self {
            raw,
            modulus: modulus.max(1),
        }
    }

    /// Cells for each of `raws` sharing `modulus`.
    pub fn many(raws: impl IntoIterator<Item = i64>, modulus: i64) -> Vec<Self> {
        raws.into_iter().map(|r| Self::new(r, modulus)).collect()
    }

    /// Underlying value.
    pub fn raw(&self) -> i64 {
        self.raw
    }

    /// `raw` reduced into `0..modulus`.
    pub fn remainder(&self) -> i64 {
        self.raw.rem_euclid(self.modulus)
    }
}

impl Ord for RemainderCell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.remainder()
            .cmp(&other.remainder())
            .then(self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for RemainderCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Cell for RemainderCell {
    fn value(&self) -> i64 {
        self.remainder()
    }
}
