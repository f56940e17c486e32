// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Candidate targets per algotype.
use crate::metadata::{Algotype, CellMetadata};

/// Up to two candidate targets, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Candidates {
    slots: [usize; 2],
    len: usize,
}

impl Candidates {
    fn one(target: usize) -> Self {
        Self {
            slots: [target, 0],
            len: 1,
        }
    }

    fn push(&mut self, target: usize) {
        if self.len < self.slots.len() {
            self.slots[self.len] = target;
            self.len += 1;
        }
    }

    /// Targets as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.slots[..self.len]
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when there is nothing to compare against.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Existing members of `{i - 1, i + 1}`, left first.
pub fn bubble_neighbors(index: usize, len: usize) -> Candidates {
    let mut out = Candidates::default();
    if index > 0 && index < len {
        out.push(index - 1);
    }
    if index + 1 < len {
        out.push(index + 1);
    }
    out
}

/// Left neighbor only. The sorted-prefix gate is applied by the decision step.
pub fn insertion_target(index: usize) -> Candidates {
    if index == 0 {
        Candidates::default()
    } else {
        Candidates::one(index - 1)
    }
}

/// Current ideal position, clamped into the array.
pub fn selection_target(meta: &CellMetadata, len: usize) -> Candidates {
    if len == 0 {
        return Candidates::default();
    }
    Candidates::one(meta.ideal_position().min(len - 1))
}

/// Candidates for the agent at `index` under its own algotype.
pub fn candidates(index: usize, meta: &CellMetadata, len: usize) -> Candidates {
    match meta.algotype() {
        Algotype::Bubble => bubble_neighbors(index, len),
        Algotype::Insertion => insertion_target(index),
        Algotype::Selection => selection_target(meta, len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SortDirection;

    #[test]
    fn bubble_edges_have_one_neighbor() {
        assert_eq!(bubble_neighbors(0, 4).as_slice(), &[1]);
        assert_eq!(bubble_neighbors(3, 4).as_slice(), &[2]);
        assert_eq!(bubble_neighbors(2, 4).as_slice(), &[1, 3]);
        assert!(bubble_neighbors(0, 1).is_empty());
    }

    #[test]
    fn insertion_looks_left_only() {
        assert!(insertion_target(0).is_empty());
        assert_eq!(insertion_target(5).as_slice(), &[4]);
    }

    #[test]
    fn selection_target_is_clamped() {
        let meta = CellMetadata::with_boundaries(Algotype::Selection, SortDirection::Descending, 0, 9);
        assert_eq!(selection_target(&meta, 4).as_slice(), &[3]);
        assert!(selection_target(&meta, 0).is_empty());
    }
}
