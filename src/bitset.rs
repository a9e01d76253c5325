//! Compact bitset representation for taxon sets.
//!
//! # Overview
//! A bitset is an efficient way to represent which taxa belong to a cluster,
//! a forest component, or the current leaf set of the reference tree.
//! Each bit position corresponds to a taxon index in the taxon ordering.
//!
//! # Example
//! For taxa [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Component {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Component {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)
//!
//! The derived `Ord` (lexicographic over the words) is the canonical ordering
//! used to sort component fingerprints.

/// A compact bitset for representing which taxa belong to a set.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 taxon indices.
///
/// # Memory efficiency
/// - Traditional HashSet<usize>: ~24 bytes per element + overhead
/// - Bitset: 1 bit per possible element (8 bytes per 64 taxa)
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate as `num_taxa.div_ceil(64)`
    ///
    /// # Example
    /// ```
    /// # use maaf_search::bitset::Bitset;
    /// // For 100 taxa, need 2 words (128 bits)
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use maaf_search::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Returns true if the bit at `idx` is set.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        let word = idx >> 6;
        let bit = idx & 63;
        word < self.0.len() && (self.0[word] >> bit) & 1 == 1
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two taxon sets: `self` becomes `self ∪ other`
    ///
    /// # Example
    /// ```
    /// # use maaf_search::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);   // {0}
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);  // {1}
    ///
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Returns `self ∩ other` as a new bitset.
    #[inline]
    pub fn and(&self, other: &Bitset) -> Bitset {
        Bitset(self.0.iter().zip(&other.0).map(|(a, b)| a & b).collect())
    }

    /// True if the two sets share at least one index.
    #[inline]
    pub fn intersects(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).any(|(a, b)| a & b != 0)
    }

    /// True if every index of `self` is also in `other` (equality included).
    ///
    /// # Example
    /// ```
    /// # use maaf_search::bitset::Bitset;
    /// let mut small = Bitset::zeros(1);
    /// small.set(1);
    /// let mut big = small.clone();
    /// big.set(3);
    /// assert!(small.is_subset_of(&big));
    /// assert!(big.is_subset_of(&big));
    /// assert!(!big.is_subset_of(&small));
    /// ```
    #[inline]
    pub fn is_subset_of(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & !b == 0)
    }

    /// Counts the number of set bits (population count).
    ///
    /// # Example
    /// ```
    /// # use maaf_search::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(2);
    /// bs.set(5);
    /// assert_eq!(bs.count_ones(), 3);
    /// ```
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    /// Iterates over the set indices in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(w, &word)| {
            (0..64).filter(move |b| (word >> b) & 1 == 1).map(move |b| w * 64 + b)
        })
    }

    /// Rough heap footprint, used by the memoization store.
    pub fn heap_bytes(&self) -> usize {
        self.0.len() * std::mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = Bitset::zeros(1);
        bs.set(0);
        bs.set(2);
        assert_eq!(bs.0[0], 0b0101);
        assert!(bs.contains(2));
        assert!(!bs.contains(1));
        assert!(!bs.contains(200));
    }

    #[test]
    fn test_bitset_or_and() {
        let mut bs1 = Bitset::zeros(1);
        bs1.set(0);
        bs1.set(1);

        let mut bs2 = Bitset::zeros(1);
        bs2.set(1);
        bs2.set(3);

        assert!(bs1.intersects(&bs2));
        assert_eq!(bs1.and(&bs2).0[0], 0b0010);

        bs1.or_assign(&bs2);
        assert_eq!(bs1.0[0], 0b1011);
    }

    /// Visual example: clusters of a small tree
    ///
    /// ```text
    ///           root
    ///          /    \
    ///        node1   D
    ///        /   \
    ///       A    node2
    ///            /   \
    ///           B     C
    /// ```
    ///
    /// Taxon mapping: A=0, B=1, C=2, D=3
    ///
    /// - node2: {B, C} → `0b0110`
    /// - node1: {A, B, C} → `0b0111`, and node2 ⊆ node1
    #[test]
    fn test_mini_tree_clusters() {
        let mut node2 = Bitset::zeros(1);
        node2.set(1);
        node2.set(2);

        let mut node1 = Bitset::zeros(1);
        node1.set(0);
        node1.or_assign(&node2);
        assert_eq!(node1.0[0], 0b0111);
        assert!(node2.is_subset_of(&node1));
        assert!(!node1.is_subset_of(&node2));
        assert_eq!(node1.ones().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_large_sets() {
        // More than 64 taxa (multiple words)
        let mut bs = Bitset::zeros(2);
        bs.set(0);
        bs.set(63);
        bs.set(64);
        bs.set(127);

        assert_eq!(bs.count_ones(), 4);
        assert_eq!(bs.ones().collect::<Vec<_>>(), vec![0, 63, 64, 127]);
        assert_eq!(bs.heap_bytes(), 16);
        assert!(!bs.is_empty());
        assert!(Bitset::zeros(2).is_empty());
    }
}
