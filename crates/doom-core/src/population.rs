// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Population builders: uniform and chimeric (mixed-algotype) arrays.
//!
//! A chimeric population assigns algotypes by percentage. Bucket sizes are
//! computed in alphabetical algotype order, each rounded to the nearest cell,
//! with the last bucket taking whatever remains so the total always equals the
//! requested size. The assignment list is then shuffled with the caller's
//! seeded generator, so the same seed always yields the same layout.
use thiserror::Error;

use crate::metadata::{Algotype, CellMetadata, SortDirection};
use crate::rng::Prng;

/// Tolerance on the sum of mix weights.
pub const MIX_SUM_TOLERANCE: f64 = 0.01;

/// Errors building a population.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PopulationError {
    /// The mix named no algotypes.
    #[error("algotype mix is empty")]
    EmptyMix,
    /// An algotype appeared more than once.
    #[error("algotype {0} listed more than once")]
    DuplicateAlgotype(Algotype),
    /// A weight was negative or not finite.
    #[error("weight for {algotype} must be a finite non-negative fraction, got {weight}")]
    InvalidWeight {
        /// Algotype carrying the weight.
        algotype: Algotype,
        /// Rejected weight.
        weight: f64,
    },
    /// Weights do not sum to 1.0 within [`MIX_SUM_TOLERANCE`].
    #[error("algotype weights must sum to 1.0, got {sum}")]
    BadSum {
        /// Actual sum.
        sum: f64,
    },
    /// A population of zero cells was requested.
    #[error("population size must be positive")]
    EmptyPopulation,
}

/// Percentage distribution of algotypes across a population.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgotypeMix {
    // Sorted by algotype name.
    weights: Vec<(Algotype, f64)>,
}

impl AlgotypeMix {
    /// Validates and stores a distribution.
    ///
    /// # Errors
    /// [`PopulationError`] when the mix is empty, repeats an algotype, has a
    /// negative or non-finite weight, or does not sum to 1.0.
    pub fn new<I>(weights: I) -> Result<Self, PopulationError>
    where
        I: IntoIterator<Item = (Algotype, f64)>,
    {
        let mut weights: Vec<(Algotype, f64)> = weights.into_iter().collect();
        if weights.is_empty() {
            return Err(PopulationError::EmptyMix);
        }
        weights.sort_by_key(|(a, _)| a.name());
        for pair in weights.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(PopulationError::DuplicateAlgotype(pair[0].0));
            }
        }
        if let Some(&(algotype, weight)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(PopulationError::InvalidWeight { algotype, weight });
        }
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > MIX_SUM_TOLERANCE {
            return Err(PopulationError::BadSum { sum });
        }
        Ok(Self { weights })
    }

    /// A mix with a single algotype.
    pub fn pure(algotype: Algotype) -> Self {
        Self {
            weights: vec![(algotype, 1.0)],
        }
    }

    /// Weights in bucket order.
    pub fn weights(&self) -> &[(Algotype, f64)] {
        &self.weights
    }

    /// Cells per algotype for a population of `size`, in bucket order.
    ///
    /// Counts always sum to `size`. When rounding overshoots, later buckets
    /// are clipped to what is left.
    pub fn counts(&self, size: usize) -> Vec<(Algotype, usize)> {
        let mut remaining = size;
        let last = self.weights.len() - 1;
        self.weights
            .iter()
            .enumerate()
            .map(|(i, &(algotype, weight))| {
                let count = if i == last {
                    remaining
                } else {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let rounded = (weight * size as f64).round() as usize;
                    rounded.min(remaining)
                };
                remaining -= count;
                (algotype, count)
            })
            .collect()
    }

    /// Shuffled per-position algotype assignment.
    ///
    /// # Errors
    /// [`PopulationError::EmptyPopulation`] when `size` is zero.
    pub fn assign(&self, size: usize, rng: &mut Prng) -> Result<Vec<Algotype>, PopulationError> {
        if size == 0 {
            return Err(PopulationError::EmptyPopulation);
        }
        let mut out = Vec::with_capacity(size);
        for (algotype, count) in self.counts(size) {
            out.extend(std::iter::repeat_n(algotype, count));
        }
        rng.shuffle(&mut out);
        Ok(out)
    }

    /// Metadata for a chimeric population sorting in `direction`.
    ///
    /// # Errors
    /// [`PopulationError::EmptyPopulation`] when `size` is zero.
    pub fn metadata(
        &self,
        size: usize,
        direction: SortDirection,
        rng: &mut Prng,
    ) -> Result<Vec<CellMetadata>, PopulationError> {
        Ok(self
            .assign(size, rng)?
            .into_iter()
            .map(|algotype| CellMetadata::new(algotype, direction, size))
            .collect())
    }
}

/// Metadata for `len` cells sharing one algotype and direction.
pub fn uniform_metadata(algotype: Algotype, direction: SortDirection, len: usize) -> Vec<CellMetadata> {
    (0..len)
        .map(|_| CellMetadata::new(algotype, direction, len))
        .collect()
}

/// The values `1..=n` in seeded random order.
pub fn shuffled_values(n: usize, rng: &mut Prng) -> Vec<i64> {
    let mut values: Vec<i64> = (1..=n as i64).collect();
    rng.shuffle(&mut values);
    values
}

/// Cells in `metadata` carrying `algotype`.
pub fn count_algotype(metadata: &[CellMetadata], algotype: Algotype) -> usize {
    metadata.iter().filter(|m| m.algotype() == algotype).count()
}
