//! Branch-and-bound search for maximum acyclic agreement forests.
//!
//! # Overview
//! Both input trees are restricted to their common taxa and rooted with the
//! marker `ρ`. The first becomes the *reference* tree, the second the single
//! component of the initial forest. The search then repeatedly looks at the
//! first cherry `(x, y)` of the reference tree:
//! - if `x` and `y` are siblings in the forest too, the cherry is contracted
//!   in both, which never costs a cut;
//! - otherwise the forest is cut: once below `x`, once below `y`, and, when
//!   both sit in the same component, once below every pendant subtree on the
//!   path between them. Each cut is a separate branch.
//!
//! Forest leaves that end up alone in their component are removed from the
//! reference tree. Once the reference tree is down to two leaves the forest
//! agrees with both trees; it is then checked for cycles (see
//! [`cycles`](crate::cycles)) and, if it passes, reported.
//!
//! # Control flow
//! The search runs on an explicit stack of [`Frame`]s. A branch pushes a seal
//! frame for its own state below the frames of its children, so the state is
//! recorded in the [`StateMemo`] only after everything below it has been
//! explored.
//!
//! # Tie-breaks
//! Cherries are taken in postorder of the reference tree. At a cut the leaf
//! that is deeper in its forest component is cut first (`x` on ties), then the
//! other leaf, then the pendant subtrees.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, trace, warn};
use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;

use crate::config::SearchConfig;
use crate::cycles::CycleRefiner;
use crate::error::{MaafError, Result};
use crate::forest::{Forest, Provenance};
use crate::isomorphism::isomorphic_sparse;
use crate::maaf::{Maaf, MaafComponent};
use crate::memo::{Fingerprint, StateMemo};
use crate::reconstruct::reconstruct;
use crate::sibling::SiblingIndex;
use crate::sparse::{ClusterIndex, SparseTree};
use crate::taxa::{ROOT_MARKER, TaxonSet, is_composite};
use crate::working::{NodeIdx, WorkingTree};

/// Acyclic agreement forests of `tree1` and `tree2` with at most `k` cuts.
///
/// `taxa` fixes the bit position of every label and must cover both trees.
/// An empty result means no such forest exists for this bound.
///
/// # Errors
/// Invalid input trees (see [`MaafError`]), or a broken invariant inside
/// the search, which aborts the whole invocation.
pub fn compute_maafs<S: AsRef<str>>(
    tree1: &PhyloTree,
    tree2: &PhyloTree,
    taxa: &[S],
    k: usize,
    stop_at_first: bool,
) -> Result<Vec<Maaf>> {
    let config = SearchConfig::default().with_stop_at_first(stop_at_first);
    compute_maafs_with_config(tree1, tree2, taxa, k, &config)
}

/// [`compute_maafs`] with every option taken from `config`.
pub fn compute_maafs_with_config<S: AsRef<str>>(
    tree1: &PhyloTree,
    tree2: &PhyloTree,
    taxa: &[S],
    k: usize,
    config: &SearchConfig,
) -> Result<Vec<Maaf>> {
    SearchProblem::prepare(tree1, tree2, taxa)?.search(k, config)
}

/// Smallest `k ≤ config.max_k` with at least one acyclic agreement forest,
/// together with the forests found at that level.
pub fn hybridization_number<S: AsRef<str>>(
    tree1: &PhyloTree,
    tree2: &PhyloTree,
    taxa: &[S],
    config: &SearchConfig,
) -> Result<Option<(usize, Vec<Maaf>)>> {
    let problem = SearchProblem::prepare(tree1, tree2, taxa)?;

    for k in 0..=config.max_k {
        let start = Instant::now();
        let maafs = problem.search(k, config)?;
        if !maafs.is_empty() {
            info!(
                "Hybridization number {} ({} forest{} in {:.2?})",
                k,
                maafs.len(),
                if maafs.len() == 1 { "" } else { "s" },
                start.elapsed()
            );
            return Ok(Some((k, maafs)));
        }
        debug!("No acyclic agreement forest with {} cuts ({:.2?})", k, start.elapsed());
    }
    warn!("No acyclic agreement forest within {} cuts", config.max_k);
    Ok(None)
}

/// Validated, restricted and rooted input of one search.
///
/// Preparing once lets the iterative-deepening driver reuse the trees and
/// cluster indices for every bound.
#[derive(Debug, Clone)]
pub struct SearchProblem {
    taxa: TaxonSet,
    first: SparseTree,
    second: SparseTree,
    first_clusters: ClusterIndex,
    second_clusters: ClusterIndex,
    side: Vec<MaafComponent>,
    trivial: bool,
}

impl SearchProblem {
    pub fn prepare<S: AsRef<str>>(tree1: &PhyloTree, tree2: &PhyloTree, taxa: &[S]) -> Result<Self> {
        let taxa = TaxonSet::new(taxa)?;
        let full1 = validated(tree1, &taxa)?;
        let full2 = validated(tree2, &taxa)?;

        let (restricted1, restricted2, side) = if isomorphic_sparse(&full1, &full2) {
            (full1, full2, Vec::new())
        } else {
            let labels1: HashSet<&str> = full1.leaf_labels().into_iter().collect();
            let labels2: HashSet<&str> = full2.leaf_labels().into_iter().collect();

            let mut side = Vec::new();
            for label in full1.leaf_labels().into_iter().filter(|l| !labels2.contains(l)) {
                side.push(side_component(label, Provenance::FirstOnly));
            }
            for label in full2.leaf_labels().into_iter().filter(|l| !labels1.contains(l)) {
                side.push(side_component(label, Provenance::SecondOnly));
            }
            if !side.is_empty() {
                debug!("{} taxa occur in only one tree", side.len());
            }

            let restricted1 = full1
                .restrict(|l| labels2.contains(l))
                .ok_or(MaafError::EmptyTree)?;
            let restricted2 = full2
                .restrict(|l| labels1.contains(l))
                .ok_or(MaafError::EmptyTree)?;
            (restricted1, restricted2, side)
        };

        let trivial = isomorphic_sparse(&restricted1, &restricted2);
        let first = restricted1.with_root_marker();
        let second = restricted2.with_root_marker();
        let first_clusters = first.clusters(&taxa)?;
        let second_clusters = second.clusters(&taxa)?;

        Ok(SearchProblem {
            taxa,
            first,
            second,
            first_clusters,
            second_clusters,
            side,
            trivial,
        })
    }

    /// True if the restricted trees already agree, so no cut is needed.
    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    /// Run the search with at most `k` cuts.
    pub fn search(&self, k: usize, config: &SearchConfig) -> Result<Vec<Maaf>> {
        if self.trivial {
            let whole = WorkingTree::from_sparse(&self.first);
            return Ok(vec![self.build_maaf(vec![whole], config.reconstruct)?]);
        }
        SearchEngine::new(self, k, config).run()
    }

    /// Turn an acyclic forest (root marker still inside) into a result.
    fn build_maaf(&self, trees: Vec<WorkingTree>, with_reconstruction: bool) -> Result<Maaf> {
        let reconstructed = if with_reconstruction {
            let first = reconstruct(&trees, &self.first, &self.taxa)?;
            let second = reconstruct(&trees, &self.second, &self.taxa)?;
            Some((
                first.to_sparse().ok_or(MaafError::EmptyTree)?,
                second.to_sparse().ok_or(MaafError::EmptyTree)?,
            ))
        } else {
            None
        };

        let mut components = Vec::with_capacity(trees.len() + self.side.len());
        let mut root_component = 0;
        for (i, mut tree) in trees.into_iter().enumerate() {
            if let Some(marker) = tree.find_leaf(ROOT_MARKER) {
                root_component = i;
                if tree.leaf_count() > 1 {
                    tree.delete(marker)?;
                }
            }
            let tree = tree.to_sparse().ok_or(MaafError::EmptyTree)?;
            components.push(MaafComponent { tree, provenance: Provenance::Common });
        }
        components.extend(self.side.iter().cloned());

        Ok(Maaf { components, root_component, reconstructed })
    }
}

/// Read a persistent tree and check it against the taxon universe.
fn validated(tree: &PhyloTree, taxa: &TaxonSet) -> Result<SparseTree> {
    let sparse = SparseTree::from_phylo(tree)?;
    if !sparse.is_binary() {
        return Err(MaafError::NotBinary);
    }
    let mut seen = HashSet::new();
    for label in sparse.leaf_labels() {
        if label == ROOT_MARKER || is_composite(label) {
            return Err(MaafError::ReservedLabel(label.to_string()));
        }
        if taxa.index_of(label).is_none() {
            return Err(MaafError::UnknownTaxon(label.to_string()));
        }
        if !seen.insert(label) {
            return Err(MaafError::DuplicateTaxon(label.to_string()));
        }
    }
    Ok(sparse)
}

fn side_component(label: &str, provenance: Provenance) -> MaafComponent {
    MaafComponent { tree: SparseTree::leaf(label), provenance }
}

/// One unit of work on the search stack.
enum Frame {
    Explore { reference: WorkingTree, forest: Forest },
    /// Everything below this state has been explored
    Seal(Fingerprint),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct SearchEngine<'a> {
    problem: &'a SearchProblem,
    config: &'a SearchConfig,
    k: usize,
    memo: StateMemo,
    refiner: CycleRefiner<'a>,
    results: Vec<Maaf>,
    explored: usize,
}

impl<'a> SearchEngine<'a> {
    fn new(problem: &'a SearchProblem, k: usize, config: &'a SearchConfig) -> Self {
        let refiner = CycleRefiner::new(
            &problem.taxa,
            &problem.first_clusters,
            &problem.second_clusters,
            &config.protected_taxa,
            k + 1,
            config.stop_at_first,
        );
        SearchEngine {
            problem,
            config,
            k,
            memo: StateMemo::new(config.memo_capacity_bytes),
            refiner,
            results: Vec::new(),
            explored: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Maaf>> {
        let mut reference = WorkingTree::from_sparse(&self.problem.first);
        for taxon in &self.config.protected_taxa {
            if !reference.mark_solid(taxon) {
                warn!("Protected taxon '{}' is not shared by both trees, ignoring it", taxon);
            }
        }
        let forest = Forest::new(WorkingTree::from_sparse(&self.problem.second));

        let mut stack = vec![Frame::Explore { reference, forest }];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Seal(fingerprint) => {
                    self.memo.record_fingerprint(fingerprint);
                }
                Frame::Explore { reference, forest } => {
                    self.explored += 1;
                    if self.explore(reference, forest, &mut stack)? == Flow::Stop {
                        break;
                    }
                }
            }
        }

        debug!(
            "k = {}: explored {} states, {} forest{} found",
            self.k,
            self.explored,
            self.results.len(),
            if self.results.len() == 1 { "" } else { "s" }
        );
        self.memo.log_summary();
        Ok(self.results)
    }

    fn explore(&mut self, mut reference: WorkingTree, mut forest: Forest, stack: &mut Vec<Frame>) -> Result<Flow> {
        if forest.cuts() > self.k {
            return Ok(Flow::Continue);
        }

        let mut index = SiblingIndex::build(&reference, &forest);
        if !remove_singletons(&mut reference, &forest, &mut index)? {
            trace!("Protected taxon isolated, abandoning branch");
            return Ok(Flow::Continue);
        }

        let fingerprint = Fingerprint::of(&reference, &forest, &self.problem.taxa)?;
        if self.memo.contains_fingerprint(&fingerprint) {
            return Ok(Flow::Continue);
        }
        if reference.leaf_count() <= 2 {
            return self.accept(forest);
        }

        let Some((x, y)) = SiblingIndex::cherries(&reference).into_iter().next() else {
            return Ok(Flow::Continue);
        };
        let (cx, nx) = index
            .leaf_in_forest(&x)
            .ok_or_else(|| MaafError::UnknownTaxon(x.clone()))?;
        let (cy, ny) = index
            .leaf_in_forest(&y)
            .ok_or_else(|| MaafError::UnknownTaxon(y.clone()))?;

        stack.push(Frame::Seal(fingerprint));

        if cx == cy && forest.component(cx).tree.are_siblings(nx, ny) {
            let rx = index
                .leaf_in_reference(&x)
                .ok_or_else(|| MaafError::UnknownTaxon(x.clone()))?;
            let ry = index
                .leaf_in_reference(&y)
                .ok_or_else(|| MaafError::UnknownTaxon(y.clone()))?;
            trace!("Contracting common cherry ({}, {})", x, y);
            reference.contract(rx, ry)?;
            forest.contract(cx, nx, ny)?;
            stack.push(Frame::Explore { reference, forest });
            return Ok(Flow::Continue);
        }

        if forest.cuts() >= self.k {
            return Ok(Flow::Continue);
        }

        let branches = self.cut_branches(&forest, (cx, nx), (cy, ny))?;
        trace!("Cherry ({}, {}): {} cut branches", x, y, branches.len());
        // reversed so the first branch is explored first
        for branch in branches.into_iter().rev() {
            stack.push(Frame::Explore { reference: reference.clone(), forest: branch });
        }
        Ok(Flow::Continue)
    }

    /// Forests resulting from each way of separating `x` from `y`.
    fn cut_branches(
        &self,
        forest: &Forest,
        x: (usize, NodeIdx),
        y: (usize, NodeIdx),
    ) -> Result<Vec<Forest>> {
        let depth = |(c, n): (usize, NodeIdx)| forest.component(c).tree.depth(n);
        let (deep, shallow) = if depth(y) > depth(x) { (y, x) } else { (x, y) };

        let mut branches = Vec::with_capacity(3);
        for (comp, node) in [deep, shallow] {
            if forest.component(comp).tree.node(node).parent.is_none() {
                continue;
            }
            let mut branch = forest.clone();
            branch.cut(comp, node)?;
            branches.push(branch);
        }

        if x.0 == y.0 {
            let pendants = pendant_subtrees(&forest.component(x.0).tree, x.1, y.1)?;
            if !pendants.is_empty() && forest.cuts() + pendants.len() <= self.k {
                let mut branch = forest.clone();
                for node in pendants {
                    branch.cut(x.0, node)?;
                }
                branches.push(branch);
            }
        }
        Ok(branches)
    }

    /// Expand, break cycles, deduplicate and record a terminal forest.
    fn accept(&mut self, forest: Forest) -> Result<Flow> {
        let mut trees: Vec<WorkingTree> = forest.into_components().into_iter().map(|c| c.tree).collect();
        trees.iter_mut().for_each(WorkingTree::expand_contractions);

        for candidate in self.refiner.refine(trees)? {
            let maaf = self.problem.build_maaf(candidate, self.config.reconstruct)?;
            if self.results.par_iter().any(|seen| maaf.is_duplicate_of(seen)) {
                trace!("Discarding duplicate forest");
                continue;
            }
            debug!(
                "Found acyclic agreement forest with {} components{}",
                maaf.size(),
                if maaf.root_is_isolated() { ", root isolated" } else { "" }
            );
            self.results.push(maaf);
            if self.config.stop_at_first {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }
}

/// Delete from the reference tree every leaf that is alone in its forest
/// component. The forest is not touched, so one pass reaches the fixed point.
///
/// Returns false if one of those leaves is solid.
fn remove_singletons(reference: &mut WorkingTree, forest: &Forest, index: &mut SiblingIndex) -> Result<bool> {
    let mut removed = Vec::new();
    for label in forest.singleton_labels() {
        let Some(leaf) = index.leaf_in_reference(&label) else {
            continue;
        };
        if reference.node(leaf).solid {
            return Ok(false);
        }
        reference.delete(leaf)?;
        removed.push(label);
    }
    index.remove_stale_entries(&removed);
    Ok(true)
}

/// Subtrees hanging off the path between `x` and `y`, below their LCA.
fn pendant_subtrees(tree: &WorkingTree, x: NodeIdx, y: NodeIdx) -> Result<Vec<NodeIdx>> {
    let lca = tree.lca(x, y)?;
    let mut pendants = Vec::new();
    for leaf in [x, y] {
        let mut current = leaf;
        while let Some(parent) = tree.node(current).parent {
            if parent == lca {
                break;
            }
            pendants.extend(tree.node(parent).children.iter().copied().filter(|&c| c != current));
            current = parent;
        }
    }
    Ok(pendants)
}
