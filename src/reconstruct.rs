//! Rebuild an input tree from the components of an agreement forest.
//!
//! Components are grafted one at a time, highest embedding first, so that
//! every component is attached below material that is already in place.
//! For a component whose embedding root is `v` the attachment point is
//! found from the first ancestor `a` of `v` that covers some already built
//! taxa: the component either becomes one more child of the built copy of
//! `a`, or `a` did not exist yet in the partial tree and a new node is
//! inserted on the edge above the built taxa under `a`.
//!
//! Because every component agrees with the target tree, the result is
//! isomorphic to the target once the root marker is removed.

use log::trace;

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::sparse::{ClusterIndex, SparseTree};
use crate::taxa::{ROOT_MARKER, TaxonSet};
use crate::working::{NodeIdx, WorkingTree};

/// Reassemble `target` (which carries the root marker) from `components`.
///
/// # Errors
/// [`MaafError::UnknownTaxon`] if a component holds taxa outside `target`,
/// [`MaafError::EmptyTree`] for an empty forest.
pub fn reconstruct(components: &[WorkingTree], target: &SparseTree, taxa: &TaxonSet) -> Result<WorkingTree> {
    let index = target.clusters(taxa)?;
    let depths = node_depths(target);

    let mut placed = Vec::with_capacity(components.len());
    for (pos, tree) in components.iter().enumerate() {
        let bits = tree.taxa_bits(taxa)?;
        let root = index
            .lca(&bits)
            .ok_or_else(|| MaafError::UnknownTaxon(taxa.names_of(&bits).join(",")))?;
        placed.push((depths[root], pos, root, bits));
    }
    // highest first, later components first among equals
    placed.sort_by(|x, y| x.0.cmp(&y.0).then(y.1.cmp(&x.1)));

    let mut placed = placed.into_iter();
    let Some((_, pos, _, bits)) = placed.next() else {
        return Err(MaafError::EmptyTree);
    };
    let mut built = components[pos].clone();
    let mut covered = bits;

    for (_, pos, root, bits) in placed {
        attach(&mut built, &covered, &components[pos], root, target, &index, taxa)?;
        covered.or_assign(&bits);
    }

    if let Some(marker) = built.find_leaf(ROOT_MARKER) {
        built.delete(marker)?;
    }
    built.strip_scaffolding();
    Ok(built)
}

fn attach(
    built: &mut WorkingTree,
    covered: &Bitset,
    component: &WorkingTree,
    root: usize,
    target: &SparseTree,
    index: &ClusterIndex,
    taxa: &TaxonSet,
) -> Result<()> {
    let mut anchor = target.node(root).parent;
    while let Some(a) = anchor {
        if index.cluster(a).intersects(covered) {
            break;
        }
        anchor = target.node(a).parent;
    }

    let built_root = built.root().ok_or(MaafError::EmptyTree)?;
    let Some(a) = anchor else {
        // nothing built above this component: hang everything under a new root
        let top = built.subdivide_above(built_root)?;
        built.graft_subtree(top, component)?;
        return Ok(());
    };

    let below = index.cluster(a).and(covered);
    let clusters = built.clusters(taxa)?;
    let d = lowest_covering(built, &clusters, &below).ok_or(MaafError::MissingNode(a))?;

    let occupied = target
        .node(a)
        .children
        .iter()
        .filter(|&&c| index.cluster(c).intersects(covered))
        .count();
    let exact = clusters[d].as_ref() == Some(&below);

    let parent = if occupied >= 2 && exact {
        d
    } else {
        built.subdivide_above(d)?
    };
    trace!("Grafting component at built node {parent}");
    built.graft_subtree(parent, component)?;
    Ok(())
}

/// Visible node of `tree` with the smallest cluster containing `set`.
fn lowest_covering(tree: &WorkingTree, clusters: &[Option<Bitset>], set: &Bitset) -> Option<NodeIdx> {
    tree.postorder()
        .into_iter()
        .filter_map(|idx| clusters[idx].as_ref().map(|c| (idx, c)))
        .filter(|(_, c)| set.is_subset_of(c))
        .min_by_key(|(_, c)| c.count_ones())
        .map(|(idx, _)| idx)
}

fn node_depths(tree: &SparseTree) -> Vec<usize> {
    let mut depths = vec![0; tree.len()];
    let mut stack = vec![tree.root()];
    while let Some(idx) = stack.pop() {
        for &c in &tree.node(idx).children {
            depths[c] = depths[idx] + 1;
            stack.push(c);
        }
    }
    depths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isomorphism::isomorphic;
    use phylotree::tree::Tree as PhyloTree;

    fn parse(newick: &str) -> SparseTree {
        SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap()).unwrap()
    }

    fn working(newick: &str) -> WorkingTree {
        WorkingTree::from_sparse(&parse(newick))
    }

    /// Rebuilding the first tree from a forest that isolates C.
    ///
    /// ```text
    ///          *                components:  ((A,B),D,ρ) and C
    ///         / \
    ///        *   ρ
    ///       / \
    ///      *   D
    ///     / \
    ///    *   C
    ///   / \
    ///  A   B
    /// ```
    #[test]
    fn test_reinserts_cut_leaf() {
        let taxa = TaxonSet::new(&["A", "B", "C", "D"]).unwrap();
        let target = parse("(((A,B),C),D);").with_root_marker();
        let components = vec![working("(((A,B),D),ρ);"), WorkingTree::leaf("C")];

        let rebuilt = reconstruct(&components, &target, &taxa).unwrap();
        assert!(isomorphic(&rebuilt, &working("(((A,B),C),D);")));
        assert!(rebuilt.find_leaf(ROOT_MARKER).is_none());
    }

    #[test]
    fn test_root_marker_alone() {
        let taxa = TaxonSet::new(&["A", "B", "C", "D"]).unwrap();
        let target = parse("((A,B),(C,D));").with_root_marker();
        let components = vec![
            WorkingTree::leaf("ρ"),
            working("(A,B);"),
            working("(C,D);"),
        ];

        let rebuilt = reconstruct(&components, &target, &taxa).unwrap();
        assert!(isomorphic(&rebuilt, &working("((A,B),(C,D));")));
    }

    #[test]
    fn test_every_component_a_leaf() {
        let taxa = TaxonSet::new(&["A", "B", "C", "D", "E"]).unwrap();
        let target = parse("((A,(B,C)),(D,E));").with_root_marker();
        let components: Vec<WorkingTree> = ["ρ", "E", "A", "D", "C", "B"]
            .iter()
            .map(|l| WorkingTree::leaf(l))
            .collect();

        let rebuilt = reconstruct(&components, &target, &taxa).unwrap();
        assert!(isomorphic(&rebuilt, &working("((A,(B,C)),(D,E));")));
    }

    #[test]
    fn test_nested_components() {
        let taxa = TaxonSet::new(&["A", "B", "C", "D", "E", "F"]).unwrap();
        let target = parse("(((A,B),(C,D)),(E,F));").with_root_marker();
        let components = vec![
            working("((A,E),ρ);"),
            working("(C,D);"),
            WorkingTree::leaf("B"),
            WorkingTree::leaf("F"),
        ];

        let rebuilt = reconstruct(&components, &target, &taxa).unwrap();
        assert!(isomorphic(&rebuilt, &working("(((A,B),(C,D)),(E,F));")));
    }
}
