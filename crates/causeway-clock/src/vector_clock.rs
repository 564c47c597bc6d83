//! Fixed-width vector clock.
//!
//! A vector clock summarizes the causal knowledge of one node by tracking,
//! for every participant in the group, how many of that participant's send
//! events have been observed. The width is fixed at construction time and
//! equals the number of nodes in the group; index `i` belongs to node `i`.
//!
//! All operations assume both operands have the same width. Mixing widths or
//! indexing past the end is a caller bug and panics.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Position of a node inside the group, also its component in every clock.
pub type NodeIndex = usize;

/// Causal relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausalOrder {
    /// First clock happened before the second.
    Before,
    /// First clock happened after the second.
    After,
    /// Clocks are identical.
    Equal,
    /// Neither clock dominates the other.
    Concurrent,
}

/// A vector of per-node event counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock {
    entries: Vec<u64>,
}

impl VectorClock {
    /// Create an all-zero clock for a group of `len` nodes.
    pub fn new(len: usize) -> Self {
        VectorClock {
            entries: vec![0; len],
        }
    }

    /// Number of components (the group size).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a clock with zero components.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counter for node `index`.
    pub fn get(&self, index: NodeIndex) -> u64 {
        self.entries[index]
    }

    /// Bump the counter for `index`, returning the new value.
    pub fn increment(&mut self, index: NodeIndex) -> u64 {
        let entry = &mut self.entries[index];
        *entry += 1;
        *entry
    }

    /// A copy of this clock with component `index` bumped by one.
    #[must_use]
    pub fn incremented(&self, index: NodeIndex) -> VectorClock {
        let mut next = self.clone();
        next.increment(index);
        next
    }

    /// Absorb an observed value for one component (`max`).
    pub fn merge_component(&mut self, index: NodeIndex, observed: u64) {
        let entry = &mut self.entries[index];
        *entry = (*entry).max(observed);
    }

    /// Component-wise max with another clock of the same width.
    pub fn merge(&mut self, other: &VectorClock) {
        self.assert_same_width(other);
        for (mine, &theirs) in self.entries.iter_mut().zip(&other.entries) {
            *mine = (*mine).max(theirs);
        }
    }

    /// Merged copy, leaving `self` untouched.
    #[must_use]
    pub fn merged_with(&self, other: &VectorClock) -> VectorClock {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Component-wise `self <= other`.
    pub fn leq(&self, other: &VectorClock) -> bool {
        self.assert_same_width(other);
        self.entries
            .iter()
            .zip(&other.entries)
            .all(|(mine, theirs)| mine <= theirs)
    }

    /// Determine the happens-before relation between two clocks.
    pub fn causal_order(&self, other: &VectorClock) -> CausalOrder {
        match (self.leq(other), other.leq(self)) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::Before,
            (false, true) => CausalOrder::After,
            (false, false) => CausalOrder::Concurrent,
        }
    }

    /// Check if neither clock dominates the other.
    pub fn is_concurrent_with(&self, other: &VectorClock) -> bool {
        self.causal_order(other) == CausalOrder::Concurrent
    }

    /// Total number of events observed across all nodes.
    pub fn sum(&self) -> u64 {
        self.entries.iter().sum()
    }

    /// Iterate over `(index, counter)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, u64)> + '_ {
        self.entries.iter().copied().enumerate()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.entries
    }

    fn assert_same_width(&self, other: &VectorClock) {
        assert_eq!(
            self.len(),
            other.len(),
            "vector clock width mismatch: {} vs {}",
            self.len(),
            other.len()
        );
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.causal_order(other) {
            CausalOrder::Before => Some(Ordering::Less),
            CausalOrder::After => Some(Ordering::Greater),
            CausalOrder::Equal => Some(Ordering::Equal),
            CausalOrder::Concurrent => None,
        }
    }
}

impl From<Vec<u64>> for VectorClock {
    fn from(entries: Vec<u64>) -> Self {
        VectorClock { entries }
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_clock_basic() {
        let mut vc = VectorClock::new(3);
        assert_eq!(vc.len(), 3);
        assert_eq!(vc.get(1), 0);

        let value = vc.increment(1);
        assert_eq!(value, 1);
        assert_eq!(vc.as_slice(), &[0, 1, 0]);
    }

    #[test]
    fn test_incremented_leaves_original() {
        let vc = VectorClock::from(vec![1, 0, 0]);
        let next = vc.incremented(0);

        assert_eq!(vc.as_slice(), &[1, 0, 0]);
        assert_eq!(next.as_slice(), &[2, 0, 0]);
    }

    #[test]
    fn test_merge_component_takes_max() {
        let mut vc = VectorClock::from(vec![3, 2, 0]);
        vc.merge_component(1, 5);
        vc.merge_component(0, 1);

        assert_eq!(vc.as_slice(), &[3, 5, 0]);
    }

    #[test]
    fn test_vector_clock_merge() {
        let a = VectorClock::from(vec![5, 3, 0]);
        let b = VectorClock::from(vec![3, 7, 1]);

        let merged = a.merged_with(&b);
        assert_eq!(merged.as_slice(), &[5, 7, 1]);
    }

    #[test]
    fn test_vector_clock_order() {
        let a = VectorClock::from(vec![1, 0, 0]);
        let b = VectorClock::from(vec![1, 1, 0]);
        let c = VectorClock::from(vec![0, 0, 1]);

        assert_eq!(a.causal_order(&b), CausalOrder::Before);
        assert_eq!(b.causal_order(&a), CausalOrder::After);
        assert_eq!(a.causal_order(&a.clone()), CausalOrder::Equal);
        assert!(a.is_concurrent_with(&c));
        assert!(a < b);
        assert_eq!(a.partial_cmp(&c), None);
    }

    #[test]
    fn test_vector_clock_display() {
        let vc = VectorClock::from(vec![1, 1, 0]);
        assert_eq!(vc.to_string(), "[1, 1, 0]");
        assert_eq!(VectorClock::new(0).to_string(), "[]");
    }

    #[test]
    fn test_vector_clock_serialization() {
        let vc = VectorClock::from(vec![2, 0, 7]);

        let json = serde_json::to_string(&vc).unwrap();
        let deserialized: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(vc, deserialized);
    }

    #[test]
    #[should_panic(expected = "width mismatch")]
    fn test_width_mismatch_panics() {
        let a = VectorClock::new(2);
        let b = VectorClock::new(3);
        a.leq(&b);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_increment_panics() {
        let mut vc = VectorClock::new(2);
        vc.increment(2);
    }
}
