// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena builder for tests.

use std::ops::RangeInclusive;

use doom_core::{Algotype, Cell, CellArena, CellMetadata, EngineError, FrozenState, SortDirection};

/// Builds a [`CellArena`] with per-cell overrides.
///
/// # Example
///
/// ```
/// use doom_core::{Algotype, FrozenState};
/// use doom_dry_tests::ArenaBuilder;
///
/// let arena = ArenaBuilder::new(vec![3, 1, 2])
///     .algotype_at(2, Algotype::Selection)
///     .frozen_at(0, FrozenState::Immovable)
///     .build()
///     .unwrap();
/// assert_eq!(arena.count_frozen(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ArenaBuilder<C> {
    cells: Vec<C>,
    algotypes: Vec<Algotype>,
    directions: Vec<SortDirection>,
    frozen: Vec<(usize, FrozenState)>,
    groups: Vec<RangeInclusive<usize>>,
}

impl<C: Cell> ArenaBuilder<C> {
    /// All cells Bubble, ascending, unfrozen.
    pub fn new(cells: Vec<C>) -> Self {
        let n = cells.len();
        Self {
            cells,
            algotypes: vec![Algotype::Bubble; n],
            directions: vec![SortDirection::Ascending; n],
            frozen: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Sets every cell's algotype.
    pub fn algotype(mut self, algotype: Algotype) -> Self {
        self.algotypes.fill(algotype);
        self
    }

    /// Sets every cell's direction.
    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.directions.fill(direction);
        self
    }

    /// Overrides one cell's algotype. Out-of-range indices are ignored.
    pub fn algotype_at(mut self, index: usize, algotype: Algotype) -> Self {
        if let Some(slot) = self.algotypes.get_mut(index) {
            *slot = algotype;
        }
        self
    }

    /// Assigns algotypes position by position, cycling through `pattern`.
    pub fn algotype_pattern(mut self, pattern: &[Algotype]) -> Self {
        if !pattern.is_empty() {
            for (i, slot) in self.algotypes.iter_mut().enumerate() {
                *slot = pattern[i % pattern.len()];
            }
        }
        self
    }

    /// Freezes one cell. Validated at build time.
    pub fn frozen_at(mut self, index: usize, state: FrozenState) -> Self {
        self.frozen.push((index, state));
        self
    }

    /// Restricts a range to its own group bounds. Applied in call order.
    pub fn group(mut self, range: RangeInclusive<usize>) -> Self {
        self.groups.push(range);
        self
    }

    /// Builds the arena.
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] for a frozen index or group end past
    /// the last cell.
    pub fn build(self) -> Result<CellArena<C>, EngineError> {
        let n = self.cells.len();
        let metadata = self
            .algotypes
            .iter()
            .zip(&self.directions)
            .map(|(&a, &d)| CellMetadata::new(a, d, n))
            .collect();
        let mut arena = CellArena::new(self.cells, metadata)?;
        for range in self.groups {
            arena.reset_boundaries(range)?;
        }
        for (index, state) in self.frozen {
            arena.freeze(index, state)?;
        }
        Ok(arena)
    }
}
