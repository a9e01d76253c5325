//! Error taxonomy for the forest search.
//!
//! Input validation failures and broken structural preconditions are both
//! reported through [`MaafError`]. The latter indicate a bug in the search
//! bookkeeping: they are propagated straight to the entry point, which aborts
//! the invocation rather than continuing with a corrupted state.
//!
//! Running out of budget is *not* an error: the search simply returns no
//! forests for that bound.

use phylotree::tree::TreeError;
use thiserror::Error;

use crate::working::NodeIdx;

pub type Result<T> = std::result::Result<T, MaafError>;

#[derive(Error, Debug)]
pub enum MaafError {
    /// Failure reported by the persistent tree collaborator
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// A newick string could not be parsed
    #[error("Could not parse newick: {0}")]
    Newick(String),

    /// A leaf label that is not part of the supplied taxon ordering
    #[error("Taxon '{0}' is missing from the taxon ordering")]
    UnknownTaxon(String),

    #[error("Taxon '{0}' occurs more than once")]
    DuplicateTaxon(String),

    #[error("All leaves must be labeled")]
    UnlabeledLeaf,

    /// Label collides with the composite separator or the root marker
    #[error("Taxon label '{0}' is reserved")]
    ReservedLabel(String),

    #[error("Input trees must be binary")]
    NotBinary,

    #[error("Tree is empty")]
    EmptyTree,

    /// Contraction requested on two nodes that do not share a parent
    #[error("Cannot contract '{0}' and '{1}': they are not siblings")]
    NotSiblings(String, String),

    #[error("Node {0} does not exist in this tree")]
    MissingNode(NodeIdx),

    /// Edit requested on a node that was already cut away
    #[error("Node {0} is detached from the tree")]
    DetachedNode(NodeIdx),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
