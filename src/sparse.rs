//! Read-only tree copies and the cluster index over them.
//!
//! # Overview
//! A [`SparseTree`] is a simplified, immutable copy of a rooted tree: an arena
//! of nodes with labels, children and parent links, nothing else. It is the
//! boundary type of the crate:
//! - input trees are read once from the persistent [`PhyloTree`] collaborator
//!   (see [`SparseTree::from_phylo`]), restricted and rooted with `ρ`;
//! - every forest component of a result is handed back as a `SparseTree`
//!   (and can be turned into a [`PhyloTree`] for newick output).
//!
//! # Clusters
//! The [`ClusterIndex`] stores, for every node, the bitset of taxa below it.
//! This is all the ancestor/LCA service the search needs:
//! - the LCA of a taxon set is the node with the smallest cluster containing it;
//! - `u` is a strict ancestor of `v` iff `cluster(v) ⊊ cluster(u)`.
//!
//! ```text
//!        root {A,B,C}
//!        /     \
//!   n1 {A,B}    C {C}
//!    /   \
//!   A     B
//! ```
//! LCA({A,B}) = n1, LCA({A,C}) = root, root is a strict ancestor of n1.

use phylotree::tree::{Node as PhyloNode, Tree as PhyloTree};

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::taxa::{ROOT_MARKER, TaxonSet};

/// One node of a [`SparseTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseNode {
    pub label: Option<String>,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

/// An immutable, arena-backed rooted tree.
#[derive(Debug, Clone)]
pub struct SparseTree {
    nodes: Vec<SparseNode>,
    root: usize,
}

impl SparseTree {
    /// Assemble a tree from an arena. Indices must form a single rooted tree.
    pub(crate) fn from_parts(nodes: Vec<SparseNode>, root: usize) -> Self {
        SparseTree { nodes, root }
    }

    /// A tree consisting of a single labeled leaf.
    pub fn leaf(label: &str) -> Self {
        SparseTree {
            nodes: vec![SparseNode {
                label: Some(label.to_string()),
                children: Vec::new(),
                parent: None,
            }],
            root: 0,
        }
    }

    /// Copy the topology and leaf labels of a persistent tree.
    ///
    /// Internal node names and branch lengths are dropped.
    ///
    /// # Errors
    /// - `MaafError::Tree` if the tree has no root
    /// - [`MaafError::UnlabeledLeaf`] if a leaf carries no name
    pub fn from_phylo(tree: &PhyloTree) -> Result<Self> {
        let phylo_root = tree.get_root()?;
        let mut nodes: Vec<SparseNode> = Vec::new();

        // (phylo id, parent in new arena)
        let mut stack = vec![(phylo_root, None)];
        while let Some((id, parent)) = stack.pop() {
            let node = tree.get(&id)?;
            let idx = nodes.len();
            let label = if node.children.is_empty() {
                let name = node.name.clone().filter(|n| !n.is_empty());
                Some(name.ok_or(MaafError::UnlabeledLeaf)?)
            } else {
                None
            };
            nodes.push(SparseNode { label, children: Vec::new(), parent });
            if let Some(p) = parent {
                nodes[p].children.push(idx);
            }
            // reversed so children keep their original order
            for &child in node.children.iter().rev() {
                stack.push((child, Some(idx)));
            }
        }

        Ok(SparseTree { nodes, root: 0 })
    }

    /// Copy this tree into a persistent tree, e.g. for newick output.
    pub fn to_phylo(&self) -> Result<PhyloTree> {
        let mut tree = PhyloTree::new();
        let root_id = tree.add(self.phylo_node(self.root));

        let mut stack = vec![(self.root, root_id)];
        while let Some((idx, id)) = stack.pop() {
            for &child in &self.nodes[idx].children {
                let child_id = tree.add_child(self.phylo_node(child), id, None)?;
                stack.push((child, child_id));
            }
        }
        Ok(tree)
    }

    /// Topology-only newick string (leaf labels, no branch lengths), children
    /// in stored order.
    pub fn to_newick(&self) -> String {
        fn build_newick(tree: &SparseTree, newick: &mut String, idx: usize) {
            let node = &tree.nodes[idx];
            if node.children.is_empty() {
                newick.push_str(node.label.as_deref().unwrap_or_default());
                return;
            }
            newick.push('(');
            for (i, &child) in node.children.iter().enumerate() {
                if i > 0 {
                    newick.push(',');
                }
                build_newick(tree, newick, child);
            }
            newick.push(')');
        }

        let mut newick = String::with_capacity(self.nodes.len() * 4);
        build_newick(self, &mut newick, self.root);
        newick.push(';');
        newick
    }

    fn phylo_node(&self, idx: usize) -> PhyloNode {
        match &self.nodes[idx].label {
            Some(label) => PhyloNode::new_named(label),
            None => PhyloNode::new(),
        }
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, idx: usize) -> &SparseNode {
        &self.nodes[idx]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_leaf(&self, idx: usize) -> bool {
        self.nodes[idx].children.is_empty()
    }

    /// Node indices in postorder (children before parents, left to right).
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
                continue;
            }
            stack.push((idx, true));
            for &child in self.nodes[idx].children.iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Leaf indices, left to right.
    pub fn leaves(&self) -> Vec<usize> {
        self.postorder()
            .into_iter()
            .filter(|&i| self.is_leaf(i))
            .collect()
    }

    pub fn leaf_labels(&self) -> Vec<&str> {
        self.leaves()
            .into_iter()
            .filter_map(|i| self.nodes[i].label.as_deref())
            .collect()
    }

    /// True if every internal node has exactly two children.
    pub fn is_binary(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.children.is_empty() || n.children.len() == 2)
    }

    /// Restrict the tree to the leaves accepted by `keep`, suppressing nodes
    /// left with a single child. Returns `None` if no leaf survives.
    ///
    /// # Example
    /// ```text
    ///   ((A,B),C)  restricted to {A,C}  →  (A,C)
    /// ```
    pub fn restrict<F: Fn(&str) -> bool>(&self, keep: F) -> Option<SparseTree> {
        let mut nodes: Vec<SparseNode> = Vec::new();
        // new index for every old node, None if nothing survived below it
        let mut mapped: Vec<Option<usize>> = vec![None; self.nodes.len()];

        for idx in self.postorder() {
            let old = &self.nodes[idx];
            if old.children.is_empty() {
                if old.label.as_deref().is_some_and(&keep) {
                    mapped[idx] = Some(nodes.len());
                    nodes.push(SparseNode {
                        label: old.label.clone(),
                        children: Vec::new(),
                        parent: None,
                    });
                }
                continue;
            }

            let kept: Vec<usize> = old.children.iter().filter_map(|&c| mapped[c]).collect();
            mapped[idx] = match kept.len() {
                0 => None,
                // suppress unary node: its single child takes its place
                1 => Some(kept[0]),
                _ => {
                    let new_idx = nodes.len();
                    for &c in &kept {
                        nodes[c].parent = Some(new_idx);
                    }
                    nodes.push(SparseNode { label: None, children: kept, parent: None });
                    Some(new_idx)
                }
            };
        }

        let root = mapped[self.root]?;
        nodes[root].parent = None;
        Some(SparseTree { nodes, root })
    }

    /// New tree `(self, ρ)`: the root marker becomes the sibling of the old root.
    pub fn with_root_marker(&self) -> SparseTree {
        let mut nodes = self.nodes.clone();
        let marker = nodes.len();
        nodes.push(SparseNode {
            label: Some(ROOT_MARKER.to_string()),
            children: Vec::new(),
            parent: None,
        });
        let root = nodes.len();
        nodes.push(SparseNode {
            label: None,
            children: vec![self.root, marker],
            parent: None,
        });
        nodes[self.root].parent = Some(root);
        nodes[marker].parent = Some(root);
        SparseTree { nodes, root }
    }

    /// Compute the cluster of every node over `taxa`.
    pub fn clusters(&self, taxa: &TaxonSet) -> Result<ClusterIndex> {
        ClusterIndex::build(self, taxa)
    }
}

/// Per-node cluster bitsets of a [`SparseTree`]: the ancestor/LCA service.
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    clusters: Vec<Bitset>,
}

impl ClusterIndex {
    /// Bottom-up pass over the tree.
    ///
    /// # Algorithm
    /// - **Leaf node**: bitset of the taxa its (possibly composite) label stands for
    /// - **Internal node**: OR together all child bitsets
    pub fn build(tree: &SparseTree, taxa: &TaxonSet) -> Result<Self> {
        let mut clusters = vec![taxa.empty_set(); tree.len()];
        for idx in tree.postorder() {
            let node = tree.node(idx);
            if node.children.is_empty() {
                let label = node.label.as_deref().ok_or(MaafError::UnlabeledLeaf)?;
                clusters[idx] = taxa.label_bits(label)?;
            } else {
                let mut bits = taxa.empty_set();
                for &child in &node.children {
                    bits.or_assign(&clusters[child]);
                }
                clusters[idx] = bits;
            }
        }
        Ok(ClusterIndex { clusters })
    }

    pub fn cluster(&self, idx: usize) -> &Bitset {
        &self.clusters[idx]
    }

    /// Lowest node whose cluster contains every taxon of `set`.
    ///
    /// Returns `None` when no node covers the set (taxa outside the tree).
    pub fn lca(&self, set: &Bitset) -> Option<usize> {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| set.is_subset_of(c))
            .min_by_key(|(_, c)| c.count_ones())
            .map(|(idx, _)| idx)
    }

    /// True if `u` lies strictly above `v`.
    pub fn is_strict_ancestor(&self, u: usize, v: usize) -> bool {
        u != v
            && self.clusters[v].is_subset_of(&self.clusters[u])
            && self.clusters[u] != self.clusters[v]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(newick: &str) -> SparseTree {
        SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap()).unwrap()
    }

    #[test]
    fn test_from_phylo_keeps_leaf_order() {
        let tree = parse("((A,B),(C,D));");
        assert_eq!(tree.leaf_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.len(), 7);
        assert!(tree.is_binary());
        assert_eq!(tree.node(tree.root()).parent, None);
    }

    #[test]
    fn test_round_trip_through_phylo() {
        let tree = parse("((A,B),C);");
        let phylo = tree.to_phylo().unwrap();
        let back = SparseTree::from_phylo(&phylo).unwrap();
        assert_eq!(back.leaf_labels(), vec!["A", "B", "C"]);
        assert_eq!(back.len(), 5);
        assert_eq!(back.to_newick(), "((A,B),C);");
        assert_eq!(SparseTree::leaf("A").to_newick(), "A;");
    }

    /// ```text
    ///        /\                      /\
    ///       /\ D   keep {A,C,D}     /\ D
    ///      /\ C        →           A  C
    ///     A  B
    /// ```
    #[test]
    fn test_restrict_suppresses_unary_nodes() {
        let tree = parse("(((A,B),C),D);");
        let restricted = tree.restrict(|l| l != "B").unwrap();
        assert_eq!(restricted.leaf_labels(), vec!["A", "C", "D"]);
        assert_eq!(restricted.len(), 5);
        assert!(restricted.is_binary());

        let single = tree.restrict(|l| l == "D").unwrap();
        assert_eq!(single.len(), 1);
        assert!(tree.restrict(|_| false).is_none());
    }

    #[test]
    fn test_clusters_and_lca() {
        let taxa = TaxonSet::new(&["A", "B", "C"]).unwrap();
        let tree = parse("((A,B),C);").with_root_marker();
        let index = tree.clusters(&taxa).unwrap();

        let root = tree.root();
        assert_eq!(index.cluster(root).count_ones(), 4);

        let ab = taxa.label_bits("A|B").unwrap();
        let lca_ab = index.lca(&ab).unwrap();
        assert_eq!(index.cluster(lca_ab), &ab);

        let ac = taxa.label_bits("A|C").unwrap();
        let lca_ac = index.lca(&ac).unwrap();
        assert!(index.is_strict_ancestor(lca_ac, lca_ab));
        assert!(index.is_strict_ancestor(root, lca_ac));
        assert!(!index.is_strict_ancestor(lca_ab, lca_ac));
        assert!(!index.is_strict_ancestor(root, root));
    }
}
