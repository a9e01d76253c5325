//! Isomorphism test for rooted, leaf-labeled binary trees.
//!
//! Both trees are reduced in lock step: collect every cherry, compare the
//! two cherry sets, contract all of them, repeat. Since leaf labels are
//! unique the trees are isomorphic exactly when every round agrees.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::sparse::SparseTree;
use crate::working::WorkingTree;

/// True if `a` and `b` have the same leaf labels and the same topology.
/// Neither input is modified.
pub fn isomorphic(a: &WorkingTree, b: &WorkingTree) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();

    let labels_a: BTreeSet<String> = a.leaf_labels().into_iter().collect();
    let labels_b: BTreeSet<String> = b.leaf_labels().into_iter().collect();
    if labels_a != labels_b {
        return false;
    }

    loop {
        if a.leaf_count() <= 2 {
            return b.leaf_count() <= 2;
        }
        let cherries_a = cherry_groups(&a);
        let cherries_b = cherry_groups(&b);
        if cherries_a != cherries_b || cherries_a.is_empty() {
            return false;
        }
        for group in &cherries_a {
            if contract_group(&mut a, group).is_none() || contract_group(&mut b, group).is_none() {
                return false;
            }
        }
    }
}

/// [`isomorphic`] for read-only trees.
pub fn isomorphic_sparse(a: &SparseTree, b: &SparseTree) -> bool {
    isomorphic(&WorkingTree::from_sparse(a), &WorkingTree::from_sparse(b))
}

/// Leaf children of each internal node with at least two of them, labels sorted.
fn cherry_groups(tree: &WorkingTree) -> BTreeSet<Vec<String>> {
    tree.postorder()
        .into_iter()
        .filter(|&idx| !tree.node(idx).is_leaf())
        .filter_map(|idx| {
            let group: Vec<String> = tree
                .node(idx)
                .children
                .iter()
                .filter(|&&c| tree.node(c).is_leaf())
                .filter_map(|&c| tree.label(c).map(str::to_string))
                .sorted()
                .collect();
            (group.len() >= 2).then_some(group)
        })
        .collect()
}

/// Fold the group into one composite leaf, first label first.
fn contract_group(tree: &mut WorkingTree, group: &[String]) -> Option<()> {
    let (first, rest) = group.split_first()?;
    let mut current = tree.find_leaf(first)?;
    for label in rest {
        let next = tree.find_leaf(label)?;
        current = tree.contract(current, next).ok()?;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylotree::tree::Tree as PhyloTree;

    fn parse(newick: &str) -> SparseTree {
        SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap()).unwrap()
    }

    #[test]
    fn test_child_order_does_not_matter() {
        assert!(isomorphic_sparse(
            &parse("(((A,B),C),(D,E));"),
            &parse("((E,D),(C,(B,A)));")
        ));
    }

    #[test]
    fn test_different_topologies() {
        assert!(!isomorphic_sparse(
            &parse("(((A,B),C),D);"),
            &parse("(((A,C),B),D);")
        ));
        assert!(!isomorphic_sparse(
            &parse("((A,B),(C,D));"),
            &parse("(((A,B),C),D);")
        ));
    }

    #[test]
    fn test_different_leaf_sets() {
        assert!(!isomorphic_sparse(&parse("(A,B);"), &parse("(A,C);")));
        assert!(!isomorphic_sparse(&parse("((A,B),C);"), &parse("(A,B);")));
    }

    #[test]
    fn test_small_trees() {
        assert!(isomorphic_sparse(&SparseTree::leaf("A"), &SparseTree::leaf("A")));
        assert!(isomorphic_sparse(&parse("(A,B);"), &parse("(B,A);")));
    }

    #[test]
    fn test_inputs_are_untouched() {
        let a = WorkingTree::from_sparse(&parse("(((A,B),C),D);"));
        let b = WorkingTree::from_sparse(&parse("(D,(C,(A,B)));"));
        assert!(isomorphic(&a, &b));
        assert_eq!(a.leaf_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(b.leaf_labels(), vec!["D", "C", "A", "B"]);
    }
}
