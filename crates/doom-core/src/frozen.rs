// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frozen-cell restrictions.

/// Restriction placed on the agent at an index.
///
/// The state travels with the agent: swapping `i` and `j` exchanges their
/// frozen states together with cells and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrozenState {
    /// Unrestricted.
    #[default]
    None,
    /// Cannot initiate a swap, but may be displaced by a neighbor.
    Movable,
    /// Cannot initiate and cannot be displaced.
    Immovable,
}

impl FrozenState {
    /// `true` for anything other than [`FrozenState::None`].
    pub const fn is_frozen(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether an agent in this state may initiate a swap.
    pub const fn can_initiate(self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether an agent in this state may be displaced by an initiator.
    pub const fn can_be_displaced(self) -> bool {
        !matches!(self, Self::Immovable)
    }
}
