//! Leaf lookup for both sides of the search and cherry enumeration on the
//! reference tree.

use std::collections::HashMap;

use itertools::Itertools;

use crate::forest::Forest;
use crate::working::{NodeIdx, WorkingTree};

/// Label → leaf maps for the reference tree and every forest component.
///
/// Arena indices are stable under every edit, so entries only go stale when
/// a leaf is removed or contracted away.
#[derive(Debug, Clone, Default)]
pub struct SiblingIndex {
    reference: HashMap<String, NodeIdx>,
    forest: HashMap<String, (usize, NodeIdx)>,
}

impl SiblingIndex {
    pub fn build(reference: &WorkingTree, forest: &Forest) -> Self {
        let mut index = SiblingIndex {
            reference: reference.leaf_map(),
            forest: HashMap::new(),
        };
        for comp in 0..forest.len() {
            index.reindex_component(forest, comp);
        }
        index
    }

    pub fn leaf_in_reference(&self, taxon: &str) -> Option<NodeIdx> {
        self.reference.get(taxon).copied()
    }

    /// Component index and node of the forest leaf labeled `taxon`.
    pub fn leaf_in_forest(&self, taxon: &str) -> Option<(usize, NodeIdx)> {
        self.forest.get(taxon).copied()
    }

    /// True if the two labels are sibling leaves of the same forest component.
    pub fn siblings_in_forest(&self, forest: &Forest, x: &str, y: &str) -> bool {
        match (self.leaf_in_forest(x), self.leaf_in_forest(y)) {
            (Some((cx, nx)), Some((cy, ny))) => {
                cx == cy && forest.component(cx).tree.are_siblings(nx, ny)
            }
            _ => false,
        }
    }

    /// Drop the entries of labels that are no longer leaves.
    pub fn remove_stale_entries(&mut self, labels: &[String]) {
        for label in labels {
            self.reference.remove(label);
            self.forest.remove(label);
        }
    }

    /// Refresh the entries of one forest component, e.g. after a cut moved
    /// leaves into it.
    pub fn reindex_component(&mut self, forest: &Forest, comp: usize) {
        for (label, node) in forest.component(comp).tree.leaf_map() {
            self.forest.insert(label, (comp, node));
        }
    }

    /// Every pair of sibling leaves of `reference`, in postorder of their parents.
    ///
    /// A cherry is the set of leaf children of one internal node; with more
    /// than two leaf children each pair is reported, left to right.
    pub fn cherries(reference: &WorkingTree) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for idx in reference.postorder() {
            let node = reference.node(idx);
            if node.is_leaf() {
                continue;
            }
            let leaf_labels: Vec<&str> = node
                .children
                .iter()
                .filter(|&&c| reference.node(c).is_leaf())
                .filter_map(|&c| reference.label(c))
                .collect();
            pairs.extend(
                leaf_labels
                    .into_iter()
                    .tuple_combinations()
                    .map(|(a, b)| (a.to_string(), b.to_string())),
            );
        }
        pairs
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

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_cherries_in_postorder() {
        let tree = working("(((A,B),C),(D,E));");
        assert_eq!(SiblingIndex::cherries(&tree), vec![pair("A", "B"), pair("D", "E")]);
    }

    #[test]
    fn test_cherries_of_multifurcation() {
        let tree = working("((A,B,C),(D,E));");
        assert_eq!(
            SiblingIndex::cherries(&tree),
            vec![pair("A", "B"), pair("A", "C"), pair("B", "C"), pair("D", "E")]
        );
    }

    #[test]
    fn test_lookup_after_cut() {
        let reference = working("((A,B),(C,D));");
        let mut forest = Forest::new(working("((A,C),(B,D));"));
        let mut index = SiblingIndex::build(&reference, &forest);

        assert!(index.siblings_in_forest(&forest, "A", "C"));
        assert!(!index.siblings_in_forest(&forest, "A", "B"));

        let (comp, c) = index.leaf_in_forest("C").unwrap();
        let new_comp = forest.cut(comp, c).unwrap();
        index.reindex_component(&forest, new_comp);
        assert_eq!(index.leaf_in_forest("C"), Some((1, 0)));
        assert!(index.siblings_in_forest(&forest, "B", "D"));

        index.remove_stale_entries(&["D".to_string()]);
        assert_eq!(index.leaf_in_forest("D"), None);
        assert_eq!(index.leaf_in_reference("D"), None);
        assert!(index.leaf_in_reference("A").is_some());
    }
}
