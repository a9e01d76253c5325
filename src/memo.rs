//! Memoization of fully explored search states.
//!
//! A state is keyed by the reference tree it was explored with (which taxa
//! it still covers and how they are grouped into leaves) and valued by the
//! partition of the forest into components. A stored partition *dominates* a
//! new one for the same key if every new component fits inside some stored
//! component: the new state is a refinement of a state whose whole subtree
//! was already searched, so it cannot lead anywhere new.
//!
//! States are recorded only once their subtree is finished. The store
//! estimates its own heap use and stops taking new entries when it reaches
//! [`MEMO_PRESSURE_THRESHOLD`] of the configured capacity; lookups keep
//! working against what was stored.

use std::collections::HashMap;

use log::{debug, warn};

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::forest::Forest;
use crate::taxa::TaxonSet;
use crate::working::WorkingTree;

/// Fraction of the memo capacity above which no new states are recorded.
pub const MEMO_PRESSURE_THRESHOLD: f64 = 0.5;

/// The reference-tree half of a state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    covered: Bitset,
    leaves: Vec<Bitset>,
}

/// Canonical, order-independent description of a search state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    key: ReferenceKey,
    components: Vec<Bitset>,
}

impl Fingerprint {
    pub fn of(reference: &WorkingTree, forest: &Forest, taxa: &TaxonSet) -> Result<Self> {
        let mut covered = taxa.empty_set();
        let mut leaves = Vec::with_capacity(reference.leaf_count());
        for idx in reference.leaves() {
            let label = reference.label(idx).ok_or(MaafError::UnlabeledLeaf)?;
            let bits = taxa.label_bits(label)?;
            covered.or_assign(&bits);
            leaves.push(bits);
        }
        leaves.sort();

        let mut components = forest.component_bits(taxa)?;
        components.sort();

        Ok(Fingerprint {
            key: ReferenceKey { covered, leaves },
            components,
        })
    }

    /// True if every component of `self` lies inside a component of `other`.
    pub fn is_dominated_by(&self, other: &[Bitset]) -> bool {
        self.components
            .iter()
            .all(|c| other.iter().any(|o| c.is_subset_of(o)))
    }

    fn key_bytes(&self) -> usize {
        self.key.covered.heap_bytes() + self.key.leaves.iter().map(Bitset::heap_bytes).sum::<usize>()
    }

    fn partition_bytes(&self) -> usize {
        self.components.iter().map(Bitset::heap_bytes).sum::<usize>()
            + std::mem::size_of::<Vec<Bitset>>()
    }
}

#[derive(Debug)]
pub struct StateMemo {
    store: HashMap<ReferenceKey, Vec<Vec<Bitset>>>,
    capacity_bytes: usize,
    used_bytes: usize,
    saturated: bool,
    hits: usize,
}

impl StateMemo {
    pub fn new(capacity_bytes: usize) -> Self {
        StateMemo {
            store: HashMap::new(),
            capacity_bytes,
            used_bytes: 0,
            saturated: false,
            hits: 0,
        }
    }

    /// True if an explored state for the same reference dominates `(reference, forest)`.
    pub fn contains(&mut self, reference: &WorkingTree, forest: &Forest, taxa: &TaxonSet) -> Result<bool> {
        let fingerprint = Fingerprint::of(reference, forest, taxa)?;
        Ok(self.contains_fingerprint(&fingerprint))
    }

    pub fn contains_fingerprint(&mut self, fingerprint: &Fingerprint) -> bool {
        let hit = self.store.get(&fingerprint.key).is_some_and(|stored| {
            stored
                .iter()
                .any(|partition| fingerprint.is_dominated_by(partition))
        });
        if hit {
            self.hits += 1;
        }
        hit
    }

    /// Record an explored state. Returns false once the store is under pressure.
    pub fn record(&mut self, reference: &WorkingTree, forest: &Forest, taxa: &TaxonSet) -> Result<bool> {
        let fingerprint = Fingerprint::of(reference, forest, taxa)?;
        Ok(self.record_fingerprint(fingerprint))
    }

    pub fn record_fingerprint(&mut self, fingerprint: Fingerprint) -> bool {
        if self.pressure() >= MEMO_PRESSURE_THRESHOLD {
            if !self.saturated {
                warn!(
                    "State memo reached {:.0}% of its {} byte capacity, no further states will be recorded",
                    MEMO_PRESSURE_THRESHOLD * 100.0,
                    self.capacity_bytes
                );
                self.saturated = true;
            }
            return false;
        }

        let key_cost = fingerprint.key_bytes();
        let cost = fingerprint.partition_bytes();
        let Fingerprint { key, components } = fingerprint;
        match self.store.get_mut(&key) {
            Some(partitions) => partitions.push(components),
            None => {
                self.used_bytes += key_cost;
                self.store.insert(key, vec![components]);
            }
        }
        self.used_bytes += cost;
        true
    }

    /// Estimated heap use over capacity; a zero capacity is always saturated.
    pub fn pressure(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.capacity_bytes as f64
    }

    pub fn len(&self) -> usize {
        self.store.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn log_summary(&self) {
        debug!(
            "State memo: {} states under {} references, {} hits, ~{} bytes",
            self.len(),
            self.store.len(),
            self.hits,
            self.used_bytes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseTree;
    use phylotree::tree::Tree as PhyloTree;

    fn working(newick: &str) -> WorkingTree {
        WorkingTree::from_sparse(&SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap()).unwrap())
    }

    fn setup() -> (TaxonSet, WorkingTree, Forest) {
        let taxa = TaxonSet::new(&["A", "B", "C", "D"]).unwrap();
        (taxa, working("((A,B),(C,D));"), Forest::new(working("((A,C),(B,D));")))
    }

    #[test]
    fn test_recorded_state_is_found() {
        let (taxa, reference, forest) = setup();
        let mut memo = StateMemo::new(1 << 20);
        assert!(!memo.contains(&reference, &forest, &taxa).unwrap());
        assert!(memo.record(&reference, &forest, &taxa).unwrap());
        assert!(memo.contains(&reference, &forest, &taxa).unwrap());
        assert_eq!(memo.hits(), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_refined_forest_is_dominated() {
        let (taxa, reference, forest) = setup();
        let mut memo = StateMemo::new(1 << 20);
        memo.record(&reference, &forest, &taxa).unwrap();

        let mut refined = forest.clone();
        let (comp, c) = refined.locate("C").unwrap();
        refined.cut(comp, c).unwrap();
        assert!(memo.contains(&reference, &refined, &taxa).unwrap());

        // the coarser forest is not dominated by the refined one
        let mut memo = StateMemo::new(1 << 20);
        memo.record(&reference, &refined, &taxa).unwrap();
        assert!(!memo.contains(&reference, &forest, &taxa).unwrap());
    }

    #[test]
    fn test_different_reference_is_a_miss() {
        let (taxa, reference, forest) = setup();
        let mut memo = StateMemo::new(1 << 20);
        memo.record(&reference, &forest, &taxa).unwrap();

        let mut contracted = reference.clone();
        let a = contracted.find_leaf("A").unwrap();
        let b = contracted.find_leaf("B").unwrap();
        contracted.contract(a, b).unwrap();
        assert!(!memo.contains(&contracted, &forest, &taxa).unwrap());
    }

    #[test]
    fn test_pressure_stops_recording() {
        let (taxa, reference, forest) = setup();
        let mut memo = StateMemo::new(0);
        assert!(!memo.record(&reference, &forest, &taxa).unwrap());
        assert!(memo.is_empty());
        assert!(!memo.contains(&reference, &forest, &taxa).unwrap());
    }

    fn contracted(reference: &WorkingTree, x: &str, y: &str) -> WorkingTree {
        let mut tree = reference.clone();
        let a = tree.find_leaf(x).unwrap();
        let b = tree.find_leaf(y).unwrap();
        tree.contract(a, b).unwrap();
        tree
    }

    #[test]
    fn test_recording_stops_at_half_capacity() {
        let (taxa, reference, forest) = setup();
        let with_ab = contracted(&reference, "A", "B");
        let with_cd = contracted(&reference, "C", "D");

        let first = Fingerprint::of(&reference, &forest, &taxa).unwrap();
        let second = Fingerprint::of(&with_ab, &forest, &taxa).unwrap();
        let cost = |f: &Fingerprint| f.key_bytes() + f.partition_bytes();
        let capacity = 2 * (cost(&first) + cost(&second));

        let mut memo = StateMemo::new(capacity);
        assert!(memo.record_fingerprint(first));
        assert!(memo.pressure() < MEMO_PRESSURE_THRESHOLD);
        assert!(memo.record_fingerprint(second));
        assert!(memo.pressure() >= MEMO_PRESSURE_THRESHOLD);

        assert!(!memo.record(&with_cd, &forest, &taxa).unwrap());
        assert_eq!(memo.len(), 2);
        assert!(!memo.contains(&with_cd, &forest, &taxa).unwrap());
        assert!(memo.contains(&reference, &forest, &taxa).unwrap());
        assert!(memo.contains(&with_ab, &forest, &taxa).unwrap());
    }
}
