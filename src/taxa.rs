//! Taxon universe shared by both input trees and every bit vector.
//!
//! The caller supplies an ordered list of taxon labels; position `i` in that
//! list is bit `i` in every [`Bitset`] the search builds. The synthetic root
//! marker [`ROOT_MARKER`] always takes the last position.
//!
//! Contracting a cherry produces a *composite* label: the two labels in
//! lexicographic order joined by [`COMPOSITE_SEPARATOR`]. Because real taxa may
//! not contain the separator, splitting a composite on it recovers the
//! original taxa no matter how deeply contractions were nested.

use std::collections::HashMap;

use crate::bitset::Bitset;
use crate::error::{MaafError, Result};

/// Leaf label of the synthetic root marker `ρ` added above both roots.
pub const ROOT_MARKER: &str = "ρ";

pub const COMPOSITE_SEPARATOR: char = '|';

/// Label of the node formed by contracting the cherry `{a, b}`.
///
/// # Example
/// ```
/// # use maaf_search::taxa::composite_label;
/// assert_eq!(composite_label("B", "A"), "A|B");
/// assert_eq!(composite_label("A|B", "C"), "A|B|C");
/// ```
pub fn composite_label(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}{COMPOSITE_SEPARATOR}{hi}")
}

/// True if `label` was produced by [`composite_label`].
pub fn is_composite(label: &str) -> bool {
    label.contains(COMPOSITE_SEPARATOR)
}

/// Ordered taxon universe with label → bit position lookup.
#[derive(Debug, Clone)]
pub struct TaxonSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
    words: usize,
}

impl TaxonSet {
    /// Build the universe from the caller's ordering and append the root marker.
    ///
    /// # Errors
    /// - [`MaafError::ReservedLabel`] if a label is empty, equals the root
    ///   marker or contains the composite separator
    /// - [`MaafError::DuplicateTaxon`] if a label occurs twice
    pub fn new<S: AsRef<str>>(ordering: &[S]) -> Result<Self> {
        let mut names = Vec::with_capacity(ordering.len() + 1);
        let mut index = HashMap::with_capacity(ordering.len() + 1);

        for name in ordering {
            let name = name.as_ref();
            if name.is_empty() || name == ROOT_MARKER || name.contains(COMPOSITE_SEPARATOR) {
                return Err(MaafError::ReservedLabel(name.to_string()));
            }
            if index.insert(name.to_string(), names.len()).is_some() {
                return Err(MaafError::DuplicateTaxon(name.to_string()));
            }
            names.push(name.to_string());
        }

        index.insert(ROOT_MARKER.to_string(), names.len());
        names.push(ROOT_MARKER.to_string());

        let words = names.len().div_ceil(64);
        Ok(TaxonSet { names, index, words })
    }

    /// Number of positions, root marker included.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.len() <= 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn empty_set(&self) -> Bitset {
        Bitset::zeros(self.words)
    }

    /// Bitset of the taxa a (possibly composite) leaf label stands for.
    ///
    /// # Errors
    /// [`MaafError::UnknownTaxon`] if one of the parts is not in the universe.
    pub fn label_bits(&self, label: &str) -> Result<Bitset> {
        let mut bits = self.empty_set();
        for part in label.split(COMPOSITE_SEPARATOR) {
            let idx = self
                .index_of(part)
                .ok_or_else(|| MaafError::UnknownTaxon(part.to_string()))?;
            bits.set(idx);
        }
        Ok(bits)
    }

    /// Labels of the taxa in `bits`, in universe order.
    pub fn names_of(&self, bits: &Bitset) -> Vec<&str> {
        bits.ones().map(|i| self.name(i)).collect()
    }
}
