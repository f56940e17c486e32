// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parallel-array storage for cells, metadata and frozen state.
//!
//! The three arrays are addressed by position and always have equal length.
//! Reads go through `&CellArena`. Every write goes through a [`WritePermit`],
//! which exposes a single swap primitive exchanging all three arrays at once,
//! so there is no way to move a cell without its metadata.
use std::ops::RangeInclusive;

use crate::cell::Cell;
use crate::error::EngineError;
use crate::frozen::FrozenState;
use crate::metadata::{Algotype, CellMetadata, SortDirection};

/// Cells plus per-position agent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellArena<C> {
    cells: Vec<C>,
    metadata: Vec<CellMetadata>,
    frozen: Vec<FrozenState>,
}

impl<C: Cell> CellArena<C> {
    /// Builds an arena from cells and one metadata record per cell.
    ///
    /// # Errors
    /// [`EngineError::LengthMismatch`] when the arrays differ in length.
    pub fn new(cells: Vec<C>, metadata: Vec<CellMetadata>) -> Result<Self, EngineError> {
        if cells.len() != metadata.len() {
            return Err(EngineError::LengthMismatch {
                cells: cells.len(),
                metadata: metadata.len(),
            });
        }
        let frozen = vec![FrozenState::None; cells.len()];
        Ok(Self {
            cells,
            metadata,
            frozen,
        })
    }

    /// Every cell shares one algotype and direction over the full range.
    pub fn uniform(cells: Vec<C>, algotype: Algotype, direction: SortDirection) -> Self {
        let n = cells.len();
        let metadata = vec![CellMetadata::new(algotype, direction, n); n];
        let frozen = vec![FrozenState::None; n];
        Self {
            cells,
            metadata,
            frozen,
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when the arena holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in position order.
    pub fn cells(&self) -> &[C] {
        &self.cells
    }

    /// Metadata in position order.
    pub fn metadata(&self) -> &[CellMetadata] {
        &self.metadata
    }

    /// Frozen states in position order.
    pub fn frozen(&self) -> &[FrozenState] {
        &self.frozen
    }

    /// Number of positions whose state is not [`FrozenState::None`].
    pub fn count_frozen(&self) -> usize {
        self.frozen.iter().filter(|f| f.is_frozen()).count()
    }

    /// Consumes the arena and returns the cells.
    pub fn into_cells(self) -> Vec<C> {
        self.cells
    }

    /// Grants exclusive write access.
    pub fn write_permit(&mut self) -> WritePermit<'_, C> {
        WritePermit { arena: self }
    }

    /// Shorthand for [`WritePermit::freeze`].
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] for an index past the end.
    pub fn freeze(&mut self, index: usize, state: FrozenState) -> Result<(), EngineError> {
        self.write_permit().freeze(index, state)
    }

    /// Shorthand for [`WritePermit::freeze_all`].
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] for any index past the end; no state
    /// is changed in that case.
    pub fn freeze_all<I>(&mut self, indices: I, state: FrozenState) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = usize>,
    {
        self.write_permit().freeze_all(indices, state)
    }

    /// Shorthand for [`WritePermit::reset_boundaries`].
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] when the range leaves the arena.
    pub fn reset_boundaries(&mut self, range: RangeInclusive<usize>) -> Result<(), EngineError> {
        self.write_permit().reset_boundaries(range)
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(EngineError::IndexOutOfRange {
                index,
                len: self.len(),
            })
        }
    }
}

/// Exclusive write capability over a [`CellArena`].
///
/// Engines hand one out only inside the execute window (or the lock-mode
/// critical section). Holding `&mut` to the arena makes concurrent readers
/// impossible for the permit's lifetime.
#[derive(Debug)]
pub struct WritePermit<'a, C> {
    arena: &'a mut CellArena<C>,
}

impl<C: Cell> WritePermit<'_, C> {
    /// Read access through the permit.
    pub fn arena(&self) -> &CellArena<C> {
        self.arena
    }

    /// Exchanges cells, metadata and frozen state at `i` and `j`.
    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        self.arena.cells.swap(i, j);
        self.arena.metadata.swap(i, j);
        self.arena.frozen.swap(i, j);
    }

    /// Advances the selection target of the agent at `index`, clamped to
    /// the last position. Returns `true` when the target moved.
    pub(crate) fn bump_ideal_position(&mut self, index: usize) -> bool {
        let max_index = self.arena.len().saturating_sub(1);
        self.arena
            .metadata
            .get_mut(index)
            .is_some_and(|m| m.bump_ideal_position(max_index))
    }

    /// Sets the frozen state of the agent at `index`.
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] for an index past the end.
    pub fn freeze(&mut self, index: usize, state: FrozenState) -> Result<(), EngineError> {
        self.arena.check_index(index)?;
        self.arena.frozen[index] = state;
        Ok(())
    }

    /// Sets the frozen state of every listed index.
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] for any index past the end; no state
    /// is changed in that case.
    pub fn freeze_all<I>(&mut self, indices: I, state: FrozenState) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = usize>,
    {
        let indices: Vec<usize> = indices.into_iter().collect();
        for &index in &indices {
            self.arena.check_index(index)?;
        }
        for index in indices {
            self.arena.frozen[index] = state;
        }
        Ok(())
    }

    /// Moves every agent in `range` into a group spanning exactly `range`
    /// and resets their selection targets to the new boundary.
    ///
    /// # Errors
    /// [`EngineError::IndexOutOfRange`] when the range leaves the arena.
    pub fn reset_boundaries(&mut self, range: RangeInclusive<usize>) -> Result<(), EngineError> {
        let (left, right) = (*range.start(), *range.end());
        self.arena.check_index(right)?;
        if left > right {
            return Ok(());
        }
        for meta in &mut self.arena.metadata[left..=right] {
            meta.set_boundaries(left, right);
        }
        Ok(())
    }

    /// Returns every selection target to its direction boundary.
    pub fn reset_ideal_positions(&mut self) {
        for meta in &mut self.arena.metadata {
            meta.reset_ideal_position();
        }
    }
}
