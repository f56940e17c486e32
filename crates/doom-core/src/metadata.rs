// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-position agent metadata.
//!
//! Metadata describes the agent currently occupying an index, not the index
//! itself. The arena moves it together with the cell on every swap, so code
//! reading `metadata[i]` always sees the policy of whoever sits at `i` now.
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Behavioral policy of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algotype {
    /// Compares against one adjacent neighbor.
    Bubble,
    /// Moves left only while the prefix to its left is sorted.
    Insertion,
    /// Chases an ideal target index that advances on every denial.
    Selection,
}

impl Algotype {
    /// All algotypes in ordinal (and alphabetical) order.
    pub const ALL: [Self; 3] = [Self::Bubble, Self::Insertion, Self::Selection];

    /// Stable ordinal, used by text formats and population buckets.
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Bubble => 0,
            Self::Insertion => 1,
            Self::Selection => 2,
        }
    }

    /// Canonical upper-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bubble => "BUBBLE",
            Self::Insertion => "INSERTION",
            Self::Selection => "SELECTION",
        }
    }

    /// One-line description of the policy.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Bubble => "local adjacent bidirectional value-based sorting",
            Self::Insertion => "prefix left view with conservative left-only swaps",
            Self::Selection => "ideal target position chasing with incremental convergence",
        }
    }
}

impl fmt::Display for Algotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algotype {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EngineError::UnknownAlgotype(s.to_owned()))
    }
}

impl TryFrom<u8> for Algotype {
    type Error = EngineError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|a| a.ordinal() == ordinal)
            .ok_or_else(|| EngineError::UnknownAlgotype(format!("ordinal {ordinal}")))
    }
}

/// Direction a cell tries to sort toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortDirection {
    /// Smaller values to the left.
    #[default]
    Ascending,
    /// Larger values to the left.
    Descending,
}

impl SortDirection {
    /// `true` for [`SortDirection::Ascending`].
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }
}

/// Policy, direction, selection target and group bounds of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellMetadata {
    algotype: Algotype,
    direction: SortDirection,
    ideal_position: usize,
    left_boundary: usize,
    right_boundary: usize,
}

impl CellMetadata {
    /// Metadata for an agent whose group spans the whole array of `len` cells.
    ///
    /// The ideal position starts at the direction-appropriate boundary.
    pub fn new(algotype: Algotype, direction: SortDirection, len: usize) -> Self {
        Self::with_boundaries(algotype, direction, 0, len.saturating_sub(1))
    }

    /// Metadata with explicit group bounds (inclusive).
    pub fn with_boundaries(
        algotype: Algotype,
        direction: SortDirection,
        left_boundary: usize,
        right_boundary: usize,
    ) -> Self {
        let mut meta = Self {
            algotype,
            direction,
            ideal_position: 0,
            left_boundary,
            right_boundary,
        };
        meta.reset_ideal_position();
        meta
    }

    /// Behavioral policy.
    pub const fn algotype(&self) -> Algotype {
        self.algotype
    }

    /// Sort direction.
    pub const fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Current selection target.
    pub const fn ideal_position(&self) -> usize {
        self.ideal_position
    }

    /// Inclusive left bound of the agent's group.
    pub const fn left_boundary(&self) -> usize {
        self.left_boundary
    }

    /// Inclusive right bound of the agent's group.
    pub const fn right_boundary(&self) -> usize {
        self.right_boundary
    }

    /// Advances the ideal position by one, clamped to `max_index`.
    ///
    /// Returns `true` when the position moved.
    pub(crate) fn bump_ideal_position(&mut self, max_index: usize) -> bool {
        if self.ideal_position < max_index {
            self.ideal_position += 1;
            true
        } else {
            false
        }
    }

    /// Ascending agents restart at the left bound, descending at the right.
    pub(crate) fn reset_ideal_position(&mut self) {
        self.ideal_position = match self.direction {
            SortDirection::Ascending => self.left_boundary,
            SortDirection::Descending => self.right_boundary,
        };
    }

    pub(crate) fn set_boundaries(&mut self, left: usize, right: usize) {
        self.left_boundary = left;
        self.right_boundary = right;
        self.reset_ideal_position();
    }
}
