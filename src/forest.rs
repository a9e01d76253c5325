//! Forests: ordered sequences of working-tree components.
//!
//! The order is meaningful. The first component is whatever is left of the
//! second input tree; every cut appends the detached subtree at the end, so
//! later components were cut more recently.

use std::fmt;

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::taxa::TaxonSet;
use crate::working::{NodeIdx, WorkingTree};

/// Which part of the input produced a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Built from taxa present in both trees
    Common,
    /// A taxon present only in the first tree
    FirstOnly,
    /// A taxon present only in the second tree
    SecondOnly,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Common => write!(f, ""),
            Provenance::FirstOnly => write!(f, "{{1}}"),
            Provenance::SecondOnly => write!(f, "{{2}}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub tree: WorkingTree,
    pub provenance: Provenance,
}

impl Component {
    pub fn common(tree: WorkingTree) -> Self {
        Component { tree, provenance: Provenance::Common }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Forest {
    components: Vec<Component>,
}

impl Forest {
    /// A forest holding a single component.
    pub fn new(tree: WorkingTree) -> Self {
        Forest { components: vec![Component::common(tree)] }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of edges cut so far: one less than the number of components.
    pub fn cuts(&self) -> usize {
        self.components.len().saturating_sub(1)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, idx: usize) -> &Component {
        &self.components[idx]
    }

    pub fn into_components(self) -> Vec<Component> {
        self.components
    }

    /// Component index and node of the leaf labeled `label`.
    pub fn locate(&self, label: &str) -> Option<(usize, NodeIdx)> {
        self.components
            .iter()
            .enumerate()
            .find_map(|(c, comp)| comp.tree.find_leaf(label).map(|n| (c, n)))
    }

    /// Labels of components that consist of a single leaf.
    pub fn singleton_labels(&self) -> Vec<String> {
        self.components
            .iter()
            .filter_map(|comp| {
                let leaves = comp.tree.leaves();
                match leaves.as_slice() {
                    [only] => comp.tree.label(*only).map(str::to_string),
                    _ => None,
                }
            })
            .collect()
    }

    /// Detach the subtree at `node` of component `comp` into a new component
    /// appended at the end; returns its index.
    pub fn cut(&mut self, comp: usize, node: NodeIdx) -> Result<usize> {
        let tree = &mut self
            .components
            .get_mut(comp)
            .ok_or(MaafError::MissingNode(node))?
            .tree;
        if tree.node(node).parent.is_none() {
            // cutting above a component root would not separate anything
            return Err(MaafError::DetachedNode(node));
        }
        let pruned = tree.prune_subtree(node)?;
        self.components.push(Component::common(pruned));
        Ok(self.components.len() - 1)
    }

    /// Contract the sibling leaves `a`, `b` of component `comp`.
    pub fn contract(&mut self, comp: usize, a: NodeIdx, b: NodeIdx) -> Result<NodeIdx> {
        self.components
            .get_mut(comp)
            .ok_or(MaafError::MissingNode(a))?
            .tree
            .contract(a, b)
    }

    pub fn expand_contractions(&mut self) {
        for comp in &mut self.components {
            comp.tree.expand_contractions();
        }
    }

    /// Taxa of every component, in forest order.
    pub fn component_bits(&self, taxa: &TaxonSet) -> Result<Vec<Bitset>> {
        self.components.iter().map(|c| c.tree.taxa_bits(taxa)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseTree;
    use phylotree::tree::Tree as PhyloTree;

    fn forest(newick: &str) -> Forest {
        let phylo = PhyloTree::from_newick(newick).unwrap();
        Forest::new(WorkingTree::from_sparse(&SparseTree::from_phylo(&phylo).unwrap()))
    }

    #[test]
    fn test_cut_appends_component() {
        let mut f = forest("((A,B),(C,D));");
        assert_eq!(f.cuts(), 0);

        let (comp, c) = f.locate("C").unwrap();
        let new_idx = f.cut(comp, c).unwrap();
        assert_eq!(new_idx, 1);
        assert_eq!(f.len(), 2);
        assert_eq!(f.cuts(), 1);
        assert_eq!(f.component(0).tree.leaf_labels(), vec!["A", "B", "D"]);
        assert_eq!(f.singleton_labels(), vec!["C"]);
        assert_eq!(f.locate("C"), Some((1, 0)));
    }

    #[test]
    fn test_cut_at_root_is_rejected() {
        let mut f = forest("(A,B);");
        let root = f.component(0).tree.root().unwrap();
        assert!(matches!(f.cut(0, root), Err(MaafError::DetachedNode(_))));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_component_bits_follow_contractions() {
        let taxa = TaxonSet::new(&["A", "B", "C"]).unwrap();
        let mut f = forest("((A,B),C);");
        let (_, a) = f.locate("A").unwrap();
        let (_, b) = f.locate("B").unwrap();
        f.contract(0, a, b).unwrap();
        let (_, c) = f.locate("C").unwrap();
        f.cut(0, c).unwrap();

        let bits = f.component_bits(&taxa).unwrap();
        assert_eq!(taxa.names_of(&bits[0]), vec!["A", "B"]);
        assert_eq!(taxa.names_of(&bits[1]), vec!["C"]);
        assert_eq!(f.singleton_labels(), vec!["A|B", "C"]);

        f.expand_contractions();
        assert_eq!(f.component(0).tree.leaf_labels(), vec!["A", "B"]);
        assert_eq!(Provenance::FirstOnly.to_string(), "{1}");
    }
}
