//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `bitset`: compact bitsets over the taxon universe.
//! - `taxa`: taxon universe, composite labels, root marker.
//! - `sparse`: read-only trees, `phylotree` adapter, cluster index (LCA service).
//! - `working`: mutable arena trees edited by the search.
//! - `forest`: forests of working-tree components.
//! - `sibling`: leaf lookup and cherry enumeration.
//! - `memo`: memoization of explored search states.
//! - `isomorphism`: cherry-reduction isomorphism test.
//! - `cycles`: acyclicity check and cycle-breaking refinement.
//! - `reconstruct`: reassembling input trees from a forest.
//! - `search`: the forest search and its entry points.
//! - `maaf`: search results.
//! - `config`, `error`, `io`: configuration, error type, tree files and reports.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod config;
pub mod cycles;
pub mod error;
pub mod forest;
pub mod io;
pub mod isomorphism;
pub mod maaf;
pub mod memo;
pub mod reconstruct;
pub mod search;
pub mod sibling;
pub mod sparse;
pub mod taxa;
pub mod working;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use config::SearchConfig;
pub use error::{MaafError, Result};
pub use forest::Provenance;
pub use io::{read_tree_pair, write_maafs};
pub use maaf::{Maaf, MaafComponent};
pub use search::{compute_maafs, compute_maafs_with_config, hybridization_number};
pub use sparse::SparseTree;
