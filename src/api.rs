//! Python binding layer for the forest search.
//!
//! Provides Python functions taking two newick strings and returning the
//! hybridization number or the agreement forests themselves.

use phylotree::tree::Tree as PhyloTree;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::SearchConfig;
use crate::error::MaafError;
use crate::io::{parse_newick, taxon_ordering};
use crate::search::{compute_maafs, hybridization_number as search_hybridization_number};

fn to_py_err(e: MaafError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_pair(newick1: &str, newick2: &str) -> PyResult<(PhyloTree, PhyloTree, Vec<String>)> {
    let tree1 = parse_newick(newick1).map_err(to_py_err)?;
    let tree2 = parse_newick(newick2).map_err(to_py_err)?;
    let taxa = taxon_ordering(&tree1, &tree2);
    Ok((tree1, tree2, taxa))
}

/// Hybridization number of two rooted binary trees.
///
/// Args:
///     newick1: First tree in newick format
///     newick2: Second tree in newick format
///     max_k: Largest number of cuts to try (default: 10)
///
/// Returns:
///     The hybridization number, or None if it exceeds max_k
///
/// Raises:
///     ValueError: If a tree cannot be parsed, is not binary, or has invalid labels
#[pyfunction]
#[pyo3(signature = (newick1, newick2, max_k=10))]
fn hybridization_number(newick1: &str, newick2: &str, max_k: usize) -> PyResult<Option<usize>> {
    let (tree1, tree2, taxa) = parse_pair(newick1, newick2)?;
    let config = SearchConfig::default().with_max_k(max_k).with_reconstruct(false);
    let found = search_hybridization_number(&tree1, &tree2, &taxa, &config).map_err(to_py_err)?;
    Ok(found.map(|(h, _)| h))
}

/// Maximum acyclic agreement forests with at most `k` cuts.
///
/// Args:
///     newick1: First tree in newick format
///     newick2: Second tree in newick format
///     k: Largest number of cuts allowed
///     stop_at_first: Return after the first forest found (default: True)
///
/// Returns:
///     A list of forests, each a list of component newick strings. Taxa found
///     in only one tree are tagged with {1} or {2}. Empty if no forest exists.
///
/// Raises:
///     ValueError: If a tree cannot be parsed, is not binary, or has invalid labels
#[pyfunction]
#[pyo3(signature = (newick1, newick2, k, stop_at_first=true))]
fn maafs(newick1: &str, newick2: &str, k: usize, stop_at_first: bool) -> PyResult<Vec<Vec<String>>> {
    let (tree1, tree2, taxa) = parse_pair(newick1, newick2)?;
    let found = compute_maafs(&tree1, &tree2, &taxa, k, stop_at_first).map_err(to_py_err)?;
    Ok(found
        .iter()
        .map(|maaf| {
            maaf.components
                .iter()
                .map(|c| format!("{}{}", c.tree.to_newick(), c.provenance))
                .collect()
        })
        .collect())
}

/// Python module definition
#[pymodule]
fn maaf_search(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(hybridization_number, m)?)?;
    m.add_function(wrap_pyfunction!(maafs, m)?)?;
    Ok(())
}
