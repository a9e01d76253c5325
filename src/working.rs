//! Mutable trees edited by the forest search.
//!
//! # Overview
//! A [`WorkingTree`] owns an arena of [`WorkingNode`]s addressed by index.
//! Parent, child and contracted-pair links are plain indices into that arena,
//! so cloning a tree (copy-on-branch) is a plain `Vec` copy and no node is
//! ever shared between two search branches.
//!
//! Nodes are never removed from the arena. An edit that takes a node out of
//! the tree clears its `attached` flag instead; contracted children stay in
//! the arena, hidden below the composite leaf that replaced them, until
//! [`WorkingTree::expand_contractions`] puts them back.
//!
//! # Edits
//! - [`delete`](WorkingTree::delete): drop a leaf and restrict the tree
//! - [`contract`](WorkingTree::contract): merge a sibling pair into a composite leaf
//! - [`prune_subtree`](WorkingTree::prune_subtree): cut a subtree out as a new tree
//! - [`graft_subtree`](WorkingTree::graft_subtree): attach another tree below a node
//!
//! Every edit invalidates the cached postorder; the next traversal recomputes it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::sparse::{SparseNode, SparseTree};
use crate::taxa::{TaxonSet, composite_label};

/// Index of a node inside its tree's arena.
pub type NodeIdx = usize;

/// A node of a [`WorkingTree`].
///
/// # Invariants
/// - a node without children is a leaf and carries a label
/// - internal nodes carry no label
/// - `contracted` is set only on composite leaves, and names the two hidden
///   nodes the leaf replaced
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingNode {
    pub label: Option<String>,
    pub children: Vec<NodeIdx>,
    pub parent: Option<NodeIdx>,
    /// Leaf that may never be removed as an isolated singleton
    pub solid: bool,
    /// Scaffolding inserted while grafting, see [`WorkingTree::strip_scaffolding`]
    pub added: bool,
    /// The pair this composite leaf was contracted from
    pub contracted: Option<(NodeIdx, NodeIdx)>,
    attached: bool,
}

impl WorkingNode {
    fn new(label: Option<String>, parent: Option<NodeIdx>) -> Self {
        WorkingNode {
            label,
            children: Vec::new(),
            parent,
            solid: false,
            added: false,
            contracted: None,
            attached: true,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Arena-backed mutable rooted tree with a lazily rebuilt postorder cache.
#[derive(Debug, Clone)]
pub struct WorkingTree {
    nodes: Vec<WorkingNode>,
    root: Option<NodeIdx>,
    postorder: RefCell<Option<Vec<NodeIdx>>>,
}

impl WorkingTree {
    /// Copy a read-only tree. Arena indices are preserved.
    pub fn from_sparse(tree: &SparseTree) -> Self {
        let nodes = (0..tree.len())
            .map(|i| {
                let src = tree.node(i);
                let mut node = WorkingNode::new(src.label.clone(), src.parent);
                node.children = src.children.clone();
                node
            })
            .collect();
        WorkingTree {
            nodes,
            root: Some(tree.root()),
            postorder: RefCell::new(None),
        }
    }

    /// A tree made of one labeled leaf.
    pub fn leaf(label: &str) -> Self {
        WorkingTree {
            nodes: vec![WorkingNode::new(Some(label.to_string()), None)],
            root: Some(0),
            postorder: RefCell::new(None),
        }
    }

    /// Compact read-only copy of the visible tree (hidden contracted nodes
    /// are not part of it). `None` for an empty tree.
    pub fn to_sparse(&self) -> Option<SparseTree> {
        let root = self.root?;
        let order = self.postorder();
        let mut mapped: HashMap<NodeIdx, usize> = HashMap::with_capacity(order.len());
        let mut nodes: Vec<SparseNode> = Vec::with_capacity(order.len());

        for &idx in &order {
            let node = &self.nodes[idx];
            let children: Vec<usize> = node.children.iter().map(|c| mapped[c]).collect();
            let new_idx = nodes.len();
            for &c in &children {
                nodes[c].parent = Some(new_idx);
            }
            nodes.push(SparseNode {
                label: node.label.clone(),
                children,
                parent: None,
            });
            mapped.insert(idx, new_idx);
        }
        Some(SparseTree::from_parts(nodes, mapped[&root]))
    }

    // ##########
    // # ACCESS #
    // ##########

    pub fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Unchecked access; panics if `idx` is outside the arena.
    pub fn node(&self, idx: NodeIdx) -> &WorkingNode {
        &self.nodes[idx]
    }

    /// Checked access to a node that is currently part of the tree.
    pub fn get(&self, idx: NodeIdx) -> Result<&WorkingNode> {
        self.check_attached(idx)?;
        Ok(&self.nodes[idx])
    }

    fn check_attached(&self, idx: NodeIdx) -> Result<()> {
        match self.nodes.get(idx) {
            None => Err(MaafError::MissingNode(idx)),
            Some(node) if !node.attached => Err(MaafError::DetachedNode(idx)),
            Some(_) => Ok(()),
        }
    }

    pub fn label(&self, idx: NodeIdx) -> Option<&str> {
        self.nodes[idx].label.as_deref()
    }

    /// Postorder over the visible tree, recomputed after every edit.
    pub fn postorder(&self) -> Vec<NodeIdx> {
        if let Some(cached) = self.postorder.borrow().as_ref() {
            return cached.clone();
        }

        let mut order = Vec::new();
        if let Some(root) = self.root {
            let mut stack = vec![(root, false)];
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
        }
        *self.postorder.borrow_mut() = Some(order.clone());
        order
    }

    fn invalidate(&mut self) {
        *self.postorder.get_mut() = None;
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<NodeIdx> {
        self.postorder()
            .into_iter()
            .filter(|&i| self.nodes[i].is_leaf())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    pub fn leaf_labels(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .filter_map(|i| self.nodes[i].label.clone())
            .collect()
    }

    /// Label → leaf lookup for the visible leaves.
    pub fn leaf_map(&self) -> HashMap<String, NodeIdx> {
        self.leaves()
            .into_iter()
            .filter_map(|i| self.nodes[i].label.clone().map(|l| (l, i)))
            .collect()
    }

    pub fn find_leaf(&self, label: &str) -> Option<NodeIdx> {
        self.leaves()
            .into_iter()
            .find(|&i| self.nodes[i].label.as_deref() == Some(label))
    }

    /// Number of edges between `idx` and the root.
    pub fn depth(&self, idx: NodeIdx) -> usize {
        let mut depth = 0;
        let mut current = idx;
        while let Some(p) = self.nodes[current].parent {
            depth += 1;
            current = p;
        }
        depth
    }

    /// Lowest common ancestor of two visible nodes.
    pub fn lca(&self, a: NodeIdx, b: NodeIdx) -> Result<NodeIdx> {
        self.check_attached(a)?;
        self.check_attached(b)?;

        let mut ancestors = HashSet::new();
        let mut current = Some(a);
        while let Some(idx) = current {
            ancestors.insert(idx);
            current = self.nodes[idx].parent;
        }

        let mut current = Some(b);
        while let Some(idx) = current {
            if ancestors.contains(&idx) {
                return Ok(idx);
            }
            current = self.nodes[idx].parent;
        }
        // both attached, so they share the root
        Err(MaafError::DetachedNode(b))
    }

    /// True if both nodes are visible and share a parent.
    pub fn are_siblings(&self, a: NodeIdx, b: NodeIdx) -> bool {
        a != b
            && self.check_attached(a).is_ok()
            && self.check_attached(b).is_ok()
            && self.nodes[a].parent.is_some()
            && self.nodes[a].parent == self.nodes[b].parent
    }

    /// Taxa covered by the visible leaves (composites expanded).
    pub fn taxa_bits(&self, taxa: &TaxonSet) -> Result<Bitset> {
        let mut bits = taxa.empty_set();
        for idx in self.leaves() {
            let label = self.label(idx).ok_or(MaafError::UnlabeledLeaf)?;
            bits.or_assign(&taxa.label_bits(label)?);
        }
        Ok(bits)
    }

    /// Cluster of every visible node, indexed by arena position.
    pub fn clusters(&self, taxa: &TaxonSet) -> Result<Vec<Option<Bitset>>> {
        let mut clusters: Vec<Option<Bitset>> = vec![None; self.nodes.len()];
        for idx in self.postorder() {
            let node = &self.nodes[idx];
            let bits = if node.is_leaf() {
                taxa.label_bits(node.label.as_deref().ok_or(MaafError::UnlabeledLeaf)?)?
            } else {
                let mut bits = taxa.empty_set();
                for &c in &node.children {
                    if let Some(child) = &clusters[c] {
                        bits.or_assign(child);
                    }
                }
                bits
            };
            clusters[idx] = Some(bits);
        }
        Ok(clusters)
    }

    /// Mark the leaf labeled `label` as solid. Returns false if there is no such leaf.
    pub fn mark_solid(&mut self, label: &str) -> bool {
        match self.find_leaf(label) {
            Some(idx) => {
                self.nodes[idx].solid = true;
                true
            }
            None => false,
        }
    }

    // #########
    // # EDITS #
    // #########

    /// Remove a visible node (normally a leaf) and restrict the tree.
    ///
    /// A parent left with a single child is suppressed: the child is spliced
    /// into the parent's slot. An unlabeled parent left without children is
    /// removed as well.
    pub fn delete(&mut self, idx: NodeIdx) -> Result<()> {
        self.check_attached(idx)?;
        let parent = self.unlink(idx);
        self.mark_detached(idx);
        if let Some(p) = parent {
            self.restrict_at(p);
        }
        self.invalidate();
        Ok(())
    }

    /// Merge two sibling leaves into one composite leaf and return its index.
    ///
    /// If the parent has exactly these two children the parent itself becomes
    /// the composite leaf; otherwise a new composite leaf takes the place of
    /// `a` and `b` disappears. Either way the pair is recorded so
    /// [`expand_contractions`](Self::expand_contractions) can restore it.
    ///
    /// ```text
    ///      p                 p = "A|B"
    ///     / \      →
    ///    A   B
    /// ```
    ///
    /// # Errors
    /// [`MaafError::NotSiblings`] if the nodes do not share a parent.
    pub fn contract(&mut self, a: NodeIdx, b: NodeIdx) -> Result<NodeIdx> {
        self.check_attached(a)?;
        self.check_attached(b)?;
        let label_a = self.label(a).ok_or(MaafError::UnlabeledLeaf)?.to_string();
        let label_b = self.label(b).ok_or(MaafError::UnlabeledLeaf)?.to_string();
        if !self.are_siblings(a, b) || !self.nodes[a].is_leaf() || !self.nodes[b].is_leaf() {
            return Err(MaafError::NotSiblings(label_a, label_b));
        }

        let parent = self.nodes[a].parent.ok_or(MaafError::DetachedNode(a))?;
        let composite = composite_label(&label_a, &label_b);

        // keep the pair in child order so expansion restores the layout
        let pos_a = self.position_in_parent(a, parent);
        let pos_b = self.position_in_parent(b, parent);
        let pair = if pos_a < pos_b { (a, b) } else { (b, a) };

        let merged = if self.nodes[parent].children.len() == 2 {
            let node = &mut self.nodes[parent];
            node.children.clear();
            node.label = Some(composite);
            node.contracted = Some(pair);
            parent
        } else {
            let merged = self.nodes.len();
            let mut node = WorkingNode::new(Some(composite), Some(parent));
            node.contracted = Some(pair);
            self.nodes.push(node);

            let children = &mut self.nodes[parent].children;
            let first = children.iter().position(|&c| c == pair.0).unwrap_or(0);
            children[first] = merged;
            children.retain(|&c| c != pair.1);

            self.nodes[a].parent = Some(merged);
            self.nodes[b].parent = Some(merged);
            merged
        };

        self.nodes[a].attached = false;
        self.nodes[b].attached = false;
        self.invalidate();
        Ok(merged)
    }

    /// Undo every contraction in the tree, recursively.
    pub fn expand_contractions(&mut self) {
        let Some(root) = self.root else { return };

        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if let Some((a, b)) = self.nodes[idx].contracted.take() {
                let node = &mut self.nodes[idx];
                node.label = None;
                node.children = vec![a, b];
                for child in [a, b] {
                    self.nodes[child].parent = Some(idx);
                    self.nodes[child].attached = true;
                }
            }
            stack.extend(self.nodes[idx].children.iter().copied());
        }
        self.invalidate();
    }

    /// Detach the subtree rooted at `idx` and return it as a standalone tree.
    ///
    /// The vacated parent is restricted as in [`delete`](Self::delete).
    /// Hidden contracted nodes travel with the subtree.
    pub fn prune_subtree(&mut self, idx: NodeIdx) -> Result<WorkingTree> {
        self.check_attached(idx)?;
        let subtree = self.extract(idx);
        let parent = self.unlink(idx);
        self.mark_detached(idx);
        if let Some(p) = parent {
            self.restrict_at(p);
        }
        self.invalidate();
        Ok(subtree)
    }

    /// Copy `subtree` into this arena as a new child of `target`; returns the
    /// index of the copied root.
    pub fn graft_subtree(&mut self, target: NodeIdx, subtree: &WorkingTree) -> Result<NodeIdx> {
        self.check_attached(target)?;
        let Some(sub_root) = subtree.root else {
            return Err(MaafError::EmptyTree);
        };

        let offset = self.nodes.len();
        for node in &subtree.nodes {
            let mut copy = node.clone();
            copy.parent = copy.parent.map(|p| p + offset);
            copy.children.iter_mut().for_each(|c| *c += offset);
            copy.contracted = copy.contracted.map(|(a, b)| (a + offset, b + offset));
            self.nodes.push(copy);
        }

        let new_root = sub_root + offset;
        self.nodes[new_root].parent = Some(target);
        self.nodes[target].children.push(new_root);
        self.invalidate();
        Ok(new_root)
    }

    /// Insert a new scaffolding node on the edge above `idx` (or above the
    /// root) and return it. The new node has `idx` as its only child until
    /// something is grafted onto it.
    pub fn subdivide_above(&mut self, idx: NodeIdx) -> Result<NodeIdx> {
        self.check_attached(idx)?;
        let parent = self.nodes[idx].parent;

        let new_idx = self.nodes.len();
        let mut node = WorkingNode::new(None, parent);
        node.added = true;
        node.children = vec![idx];
        self.nodes.push(node);

        match parent {
            Some(p) => {
                let pos = self.position_in_parent(idx, p);
                self.nodes[p].children[pos] = new_idx;
            }
            None => self.root = Some(new_idx),
        }
        self.nodes[idx].parent = Some(new_idx);
        self.invalidate();
        Ok(new_idx)
    }

    /// Remove scaffolding left behind by grafting: added nodes with a single
    /// child are suppressed, childless ones dropped.
    pub fn strip_scaffolding(&mut self) {
        let added: Vec<NodeIdx> = self
            .postorder()
            .into_iter()
            .filter(|&i| self.nodes[i].added && self.nodes[i].children.len() <= 1)
            .collect();
        for idx in added {
            if self.nodes[idx].attached {
                self.restrict_at(idx);
            }
        }
        self.invalidate();
    }

    // ###########
    // # HELPERS #
    // ###########

    fn position_in_parent(&self, idx: NodeIdx, parent: NodeIdx) -> usize {
        self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == idx)
            .unwrap_or(0)
    }

    /// Remove `idx` from its parent's child list (or clear the root).
    fn unlink(&mut self, idx: NodeIdx) -> Option<NodeIdx> {
        match self.nodes[idx].parent.take() {
            Some(p) => {
                self.nodes[p].children.retain(|&c| c != idx);
                Some(p)
            }
            None => {
                self.root = None;
                None
            }
        }
    }

    fn mark_detached(&mut self, idx: NodeIdx) {
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            self.nodes[i].attached = false;
            stack.extend(self.nodes[i].children.iter().copied());
        }
    }

    /// Restore the tree invariants at `idx` after it lost a child.
    fn restrict_at(&mut self, idx: NodeIdx) {
        match self.nodes[idx].children.len() {
            0 if self.nodes[idx].label.is_none() => {
                let parent = self.unlink(idx);
                self.nodes[idx].attached = false;
                if let Some(p) = parent {
                    self.restrict_at(p);
                }
            }
            1 => {
                let child = self.nodes[idx].children[0];
                let parent = self.nodes[idx].parent;
                let solid = self.nodes[idx].solid;

                self.nodes[child].parent = parent;
                self.nodes[child].solid |= solid;
                match parent {
                    Some(p) => {
                        let pos = self.position_in_parent(idx, p);
                        self.nodes[p].children[pos] = child;
                    }
                    None => self.root = Some(child),
                }
                let node = &mut self.nodes[idx];
                node.children.clear();
                node.parent = None;
                node.attached = false;
            }
            _ => {}
        }
    }

    /// Copy the subtree below `idx`, hidden contracted nodes included, into
    /// a fresh arena.
    fn extract(&self, idx: NodeIdx) -> WorkingTree {
        let mut order = Vec::new();
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.nodes[i].children.iter().copied());
            if let Some((a, b)) = self.nodes[i].contracted {
                stack.push(a);
                stack.push(b);
            }
        }

        let mapped: HashMap<NodeIdx, NodeIdx> =
            order.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let nodes = order
            .iter()
            .map(|&old| {
                let mut copy = self.nodes[old].clone();
                copy.parent = if old == idx {
                    None
                } else {
                    copy.parent.and_then(|p| mapped.get(&p).copied())
                };
                copy.children = copy.children.iter().map(|c| mapped[c]).collect();
                copy.contracted = copy.contracted.map(|(a, b)| (mapped[&a], mapped[&b]));
                copy
            })
            .collect();

        WorkingTree {
            nodes,
            root: Some(0),
            postorder: RefCell::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylotree::tree::Tree as PhyloTree;

    fn working(newick: &str) -> WorkingTree {
        let phylo = PhyloTree::from_newick(newick).unwrap();
        WorkingTree::from_sparse(&SparseTree::from_phylo(&phylo).unwrap())
    }

    fn leaf(tree: &WorkingTree, label: &str) -> NodeIdx {
        tree.find_leaf(label).unwrap()
    }

    #[test]
    fn test_postorder_cache_is_invalidated() {
        let mut tree = working("((A,B),(C,D));");
        assert_eq!(tree.leaf_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.postorder().len(), 7);

        tree.delete(leaf(&tree, "C")).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["A", "B", "D"]);
        assert_eq!(tree.postorder().len(), 5);
    }

    /// ```text
    ///        r                r
    ///       / \              / \
    ///      x   D   del B    A   D
    ///     / \       →
    ///    A   B
    /// ```
    #[test]
    fn test_delete_suppresses_unary_parent() {
        let mut tree = working("((A,B),D);");
        let a = leaf(&tree, "A");
        let root = tree.root().unwrap();

        tree.delete(leaf(&tree, "B")).unwrap();
        assert_eq!(tree.node(a).parent, Some(root));
        assert_eq!(tree.node(root).children.len(), 2);
        assert_eq!(tree.depth(a), 1);
    }

    #[test]
    fn test_delete_down_to_single_leaf() {
        let mut tree = working("(A,B);");
        let a_idx = leaf(&tree, "A");
        tree.nodes[a_idx].solid = true;
        tree.delete(leaf(&tree, "B")).unwrap();
        let a = tree.root().unwrap();
        assert_eq!(tree.label(a), Some("A"));
        assert!(tree.node(a).solid);
        assert_eq!(tree.node(a).parent, None);

        tree.delete(a).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_contract_binary_pair() {
        let mut tree = working("((A,B),C);");
        let (a, b) = (leaf(&tree, "A"), leaf(&tree, "B"));
        let merged = tree.contract(b, a).unwrap();

        assert_eq!(tree.label(merged), Some("A|B"));
        assert_eq!(tree.node(merged).contracted, Some((a, b)));
        assert_eq!(tree.leaf_labels(), vec!["A|B", "C"]);
        assert!(matches!(tree.get(a), Err(MaafError::DetachedNode(_))));
    }

    #[test]
    fn test_contract_inside_multifurcation() {
        let mut tree = working("(A,B,C);");
        let merged = tree.contract(leaf(&tree, "A"), leaf(&tree, "B")).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["A|B", "C"]);
        assert_eq!(tree.node(merged).parent, tree.root());
    }

    #[test]
    fn test_contract_rejects_non_siblings() {
        let mut tree = working("((A,B),C);");
        let err = tree.contract(leaf(&tree, "A"), leaf(&tree, "C")).unwrap_err();
        assert!(matches!(err, MaafError::NotSiblings(_, _)));
    }

    #[test]
    fn test_contract_then_expand_round_trip() {
        let mut tree = working("(((A,B),C),(D,E));");
        let ab = tree.contract(leaf(&tree, "A"), leaf(&tree, "B")).unwrap();
        let abc = tree.contract(ab, leaf(&tree, "C")).unwrap();
        tree.contract(leaf(&tree, "D"), leaf(&tree, "E")).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["A|B|C", "D|E"]);
        assert_eq!(tree.label(abc), Some("A|B|C"));

        tree.expand_contractions();
        assert_eq!(tree.leaf_labels(), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(tree.postorder().len(), 9);
        assert_eq!(tree.depth(leaf(&tree, "A")), 3);
    }

    #[test]
    fn test_prune_carries_contractions() {
        let mut tree = working("(((A,B),C),D);");
        let ab = tree.contract(leaf(&tree, "A"), leaf(&tree, "B")).unwrap();
        let abc_parent = tree.node(ab).parent.unwrap();

        let mut pruned = tree.prune_subtree(abc_parent).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["D"]);
        assert_eq!(pruned.leaf_labels(), vec!["A|B", "C"]);

        pruned.expand_contractions();
        assert_eq!(pruned.leaf_labels(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_prune_and_graft() {
        let mut tree = working("((A,B),(C,D));");
        let cd = tree.node(leaf(&tree, "C")).parent.unwrap();
        let pruned = tree.prune_subtree(cd).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["A", "B"]);

        let root = tree.root().unwrap();
        let top = tree.subdivide_above(root).unwrap();
        assert!(tree.node(top).added);
        tree.graft_subtree(top, &pruned).unwrap();
        assert_eq!(tree.leaf_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.node(top).children.len(), 2);
    }

    #[test]
    fn test_strip_scaffolding() {
        let mut tree = working("(A,B);");
        let a = leaf(&tree, "A");
        let added = tree.subdivide_above(a).unwrap();
        assert_eq!(tree.postorder().len(), 4);

        tree.strip_scaffolding();
        assert_eq!(tree.postorder().len(), 3);
        assert!(!tree.node(added).is_attached());
        assert_eq!(tree.node(a).parent, tree.root());
    }

    #[test]
    fn test_lca_and_siblings() {
        let tree = working("(((A,B),C),D);");
        let (a, b, c, d) = (
            leaf(&tree, "A"),
            leaf(&tree, "B"),
            leaf(&tree, "C"),
            leaf(&tree, "D"),
        );
        assert!(tree.are_siblings(a, b));
        assert!(!tree.are_siblings(a, c));
        assert_eq!(tree.lca(a, d).unwrap(), tree.root().unwrap());
        assert_eq!(tree.lca(a, c).unwrap(), tree.node(c).parent.unwrap());
    }

    #[test]
    fn test_to_sparse_skips_hidden_nodes() {
        let mut tree = working("((A,B),C);");
        tree.contract(leaf(&tree, "A"), leaf(&tree, "B")).unwrap();
        let sparse = tree.to_sparse().unwrap();
        assert_eq!(sparse.leaf_labels(), vec!["A|B", "C"]);
        assert_eq!(sparse.len(), 3);
    }
}
