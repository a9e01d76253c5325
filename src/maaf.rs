//! Results of the forest search.

use std::fmt;

use crate::forest::Provenance;
use crate::isomorphism::isomorphic_sparse;
use crate::sparse::SparseTree;
use crate::taxa::ROOT_MARKER;

/// One component of a result forest.
#[derive(Debug, Clone)]
pub struct MaafComponent {
    pub tree: SparseTree,
    pub provenance: Provenance,
}

/// A maximum acyclic agreement forest.
///
/// Common components come first; taxa found in only one input tree follow
/// as singleton components tagged with their [`Provenance`].
#[derive(Debug, Clone)]
pub struct Maaf {
    pub components: Vec<MaafComponent>,
    /// Index of the component that held the root marker
    pub root_component: usize,
    /// Both input trees reassembled from the components, when requested
    pub reconstructed: Option<(SparseTree, SparseTree)>,
}

impl Maaf {
    /// Number of components built from common taxa, root component included.
    pub fn size(&self) -> usize {
        self.components
            .iter()
            .filter(|c| c.provenance == Provenance::Common)
            .count()
    }

    pub fn hybridization_number(&self) -> usize {
        self.size().saturating_sub(1)
    }

    /// True if the root marker ended up alone in its own component.
    pub fn root_is_isolated(&self) -> bool {
        self.components
            .get(self.root_component)
            .is_some_and(|c| c.tree.leaf_labels() == [ROOT_MARKER])
    }

    /// Same number of components, pairwise isomorphic.
    pub fn is_duplicate_of(&self, other: &Maaf) -> bool {
        if self.components.len() != other.components.len() || self.size() != other.size() {
            return false;
        }
        let mut used = vec![false; other.components.len()];
        self.components.iter().all(|mine| {
            let matched = other.components.iter().enumerate().find(|(i, theirs)| {
                !used[*i]
                    && mine.provenance == theirs.provenance
                    && isomorphic_sparse(&mine.tree, &theirs.tree)
            });
            match matched {
                Some((i, _)) => {
                    used[i] = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Newick string of every component, in order.
    pub fn component_newicks(&self) -> Vec<String> {
        self.components.iter().map(|c| c.tree.to_newick()).collect()
    }
}

impl fmt::Display for Maaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, comp) in self.components.iter().enumerate() {
            let marker = if i == self.root_component { " (root)" } else { "" };
            writeln!(f, "{}{}{}", comp.tree.to_newick(), comp.provenance, marker)?;
        }
        Ok(())
    }
}
