//! Acyclicity check for agreement forests and cycle-breaking refinement.
//!
//! # Cycle graph
//! One vertex per forest component. There is an edge `i → j` when the root
//! of component `i`'s embedding in either input tree lies strictly above the
//! root of component `j`'s embedding in that same tree. An agreement forest
//! is acyclic exactly when this graph has no directed cycle.
//!
//! Embedding roots are read off a [`ClusterIndex`]: the root of a taxon
//! set's embedding is the smallest cluster containing it, and "strictly
//! above" is strict cluster containment.
//!
//! # Refinement
//! A cyclic forest can often be fixed by cutting more edges. Refinement
//! searches breadth-first over single extra cuts inside the components that
//! lie on a cycle, so the first acyclic forests it finds use as few extra
//! cuts as possible.

use std::collections::HashSet;

use log::trace;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};
use crate::sparse::ClusterIndex;
use crate::taxa::TaxonSet;
use crate::working::WorkingTree;

/// Directed graph over forest components; node `i` is component `i`.
#[derive(Debug, Clone)]
pub struct CycleGraph {
    graph: DiGraph<usize, ()>,
}

impl CycleGraph {
    /// Build the graph for components with the given taxa.
    ///
    /// # Errors
    /// [`MaafError::UnknownTaxon`] if a component is not covered by one of
    /// the input trees.
    pub fn build(components: &[Bitset], first: &ClusterIndex, second: &ClusterIndex) -> Result<Self> {
        let roots = |index: &ClusterIndex| -> Result<Vec<usize>> {
            components
                .iter()
                .map(|bits| {
                    index
                        .lca(bits)
                        .ok_or_else(|| MaafError::UnknownTaxon(format!("{:?}", bits.ones().collect::<Vec<_>>())))
                })
                .collect()
        };
        let roots_first = roots(first)?;
        let roots_second = roots(second)?;

        let n = components.len();
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(n, n);
        let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
        for i in 0..n {
            for j in (0..n).filter(|&j| j != i) {
                if first.is_strict_ancestor(roots_first[i], roots_first[j])
                    || second.is_strict_ancestor(roots_second[i], roots_second[j])
                {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }
        Ok(CycleGraph { graph })
    }

    pub fn has_cycle(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    /// Components inside a strongly connected component of two or more,
    /// in ascending order. The graph has no self loops.
    pub fn cycle_members(&self) -> Vec<usize> {
        let mut members: Vec<usize> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .flatten()
            .map(|node| self.graph[node])
            .collect();
        members.sort_unstable();
        members
    }
}

/// Breadth-first cycle breaking under a component budget.
pub struct CycleRefiner<'a> {
    taxa: &'a TaxonSet,
    first: &'a ClusterIndex,
    second: &'a ClusterIndex,
    protected: &'a [String],
    max_components: usize,
    stop_at_first: bool,
}

impl<'a> CycleRefiner<'a> {
    pub fn new(
        taxa: &'a TaxonSet,
        first: &'a ClusterIndex,
        second: &'a ClusterIndex,
        protected: &'a [String],
        max_components: usize,
        stop_at_first: bool,
    ) -> Self {
        CycleRefiner { taxa, first, second, protected, max_components, stop_at_first }
    }

    fn graph(&self, forest: &[WorkingTree]) -> Result<CycleGraph> {
        let bits = forest
            .iter()
            .map(|tree| tree.taxa_bits(self.taxa))
            .collect::<Result<Vec<_>>>()?;
        CycleGraph::build(&bits, self.first, self.second)
    }

    /// True if `tree` is a lone leaf carrying a protected taxon.
    fn isolates_protected(&self, tree: &WorkingTree) -> bool {
        match tree.leaf_labels().as_slice() {
            [label] => self.protected.iter().any(|p| p == label),
            _ => false,
        }
    }

    /// Acyclic forests reachable from `forest` with the fewest extra cuts.
    ///
    /// An acyclic input is returned unchanged. Each level cuts one more edge
    /// inside a component on a cycle; the search stops at the first level
    /// that yields an acyclic forest (only the first one when stopping early)
    /// or when the component budget is exhausted, in which case the result
    /// is empty. Cuts that leave a protected taxon alone are never made.
    pub fn refine(&self, forest: Vec<WorkingTree>) -> Result<Vec<Vec<WorkingTree>>> {
        let mut frontier = vec![forest];
        let mut seen: HashSet<Vec<Bitset>> = HashSet::new();

        while !frontier.is_empty() {
            let mut accepted = Vec::new();
            let mut cyclic = Vec::new();
            for candidate in frontier {
                let graph = self.graph(&candidate)?;
                if graph.has_cycle() {
                    cyclic.push((candidate, graph));
                    continue;
                }
                accepted.push(candidate);
                if self.stop_at_first {
                    return Ok(accepted);
                }
            }
            if !accepted.is_empty() {
                return Ok(accepted);
            }

            let mut next = Vec::new();
            for (candidate, graph) in cyclic {
                if candidate.len() >= self.max_components {
                    continue;
                }
                for comp in graph.cycle_members() {
                    for node in candidate[comp].postorder() {
                        if candidate[comp].node(node).parent.is_none() {
                            continue;
                        }
                        let mut refined = candidate.clone();
                        let part = refined[comp].prune_subtree(node)?;
                        if self.isolates_protected(&part) || self.isolates_protected(&refined[comp]) {
                            continue;
                        }
                        refined.push(part);

                        let mut key = refined
                            .iter()
                            .map(|tree| tree.taxa_bits(self.taxa))
                            .collect::<Result<Vec<_>>>()?;
                        key.sort();
                        if seen.insert(key) {
                            next.push(refined);
                        }
                    }
                }
            }
            trace!("Cycle refinement: {} candidates at the next level", next.len());
            frontier = next;
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseTree;
    use phylotree::tree::Tree as PhyloTree;

    fn rooted(newick: &str) -> SparseTree {
        SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap())
            .unwrap()
            .with_root_marker()
    }

    fn bits(taxa: &TaxonSet, labels: &[&str]) -> Bitset {
        let mut set = taxa.empty_set();
        for l in labels {
            set.set(taxa.index_of(l).unwrap());
        }
        set
    }

    #[test]
    fn test_nested_components_are_acyclic() {
        let taxa = TaxonSet::new(&["A", "B", "C", "D"]).unwrap();
        let tree = rooted("(((A,B),C),D);");
        let index = tree.clusters(&taxa).unwrap();

        let comps = vec![
            bits(&taxa, &["D", "ρ"]),
            bits(&taxa, &["C"]),
            bits(&taxa, &["A", "B"]),
        ];
        let graph = CycleGraph::build(&comps, &index, &index).unwrap();
        assert!(!graph.has_cycle());
        assert!(graph.cycle_members().is_empty());
    }

    /// Two components that lie above each other in different trees.
    ///
    /// ```text
    ///   first:  (((A,(B,D)),C),ρ)      second: (((B,(A,C)),D),ρ)
    ///
    ///   X = {A,C}: spans the first root,  sits in a cherry of the second
    ///   Y = {B,D}: sits in a cherry of the first,  spans the second root
    /// ```
    #[test]
    fn test_crossing_components_form_a_cycle() {
        let (taxa, first, second) = crossing();
        let comps = vec![
            bits(&taxa, &["ρ"]),
            bits(&taxa, &["A", "C"]),
            bits(&taxa, &["B", "D"]),
        ];
        let graph = CycleGraph::build(&comps, &first, &second).unwrap();
        assert!(graph.has_cycle());
        assert_eq!(graph.cycle_members(), vec![1, 2]);
    }

    fn acyclic(refiner: &CycleRefiner<'_>, forest: &[WorkingTree]) -> bool {
        !refiner.graph(forest).unwrap().has_cycle()
    }

    fn crossing() -> (TaxonSet, ClusterIndex, ClusterIndex) {
        let taxa = TaxonSet::new(&["A", "B", "C", "D"]).unwrap();
        let first = rooted("((A,(B,D)),C);").clusters(&taxa).unwrap();
        let second = rooted("((B,(A,C)),D);").clusters(&taxa).unwrap();
        (taxa, first, second)
    }

    fn crossing_forest() -> Vec<WorkingTree> {
        let pair = |newick: &str| {
            WorkingTree::from_sparse(&SparseTree::from_phylo(&PhyloTree::from_newick(newick).unwrap()).unwrap())
        };
        vec![WorkingTree::leaf("ρ"), pair("(A,C);"), pair("(B,D);")]
    }

    #[test]
    fn test_refine_breaks_cycle() {
        let (taxa, first, second) = crossing();
        let forest = crossing_forest();

        let refiner = CycleRefiner::new(&taxa, &first, &second, &[], 4, true);
        assert!(!acyclic(&refiner, &forest));
        let refined = refiner.refine(forest.clone()).unwrap();
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].len(), 4);
        assert!(acyclic(&refiner, &refined[0]));

        // no room for another cut
        let refiner = CycleRefiner::new(&taxa, &first, &second, &[], 3, true);
        assert!(refiner.refine(forest).unwrap().is_empty());
    }

    #[test]
    fn test_refine_enumerates_first_level() {
        let (taxa, first, second) = crossing();
        let refiner = CycleRefiner::new(&taxa, &first, &second, &[], 4, false);
        let refined = refiner.refine(crossing_forest()).unwrap();
        // splitting {A,C} or {B,D}; cutting either leaf of a pair gives the same forest
        assert_eq!(refined.len(), 2);
        assert!(refined.iter().all(|f| acyclic(&refiner, f)));
    }

    #[test]
    fn test_refine_keeps_protected_taxa_attached() {
        let (taxa, first, second) = crossing();
        let protected = vec!["A".to_string()];
        let refiner = CycleRefiner::new(&taxa, &first, &second, &protected, 4, false);
        let refined = refiner.refine(crossing_forest()).unwrap();

        // {A,C} may not be split, so only {B,D} is
        assert_eq!(refined.len(), 1);
        let mut parts: Vec<Vec<String>> = refined[0].iter().map(WorkingTree::leaf_labels).collect();
        parts.sort();
        assert_eq!(parts, vec![vec!["A", "C"], vec!["B"], vec!["D"], vec!["ρ"]]);

        // both pairs hold a protected taxon
        let protected = vec!["A".to_string(), "D".to_string()];
        let refiner = CycleRefiner::new(&taxa, &first, &second, &protected, 4, false);
        assert!(refiner.refine(crossing_forest()).unwrap().is_empty());
    }
}
