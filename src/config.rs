//! Search configuration.

/// Largest number of cuts tried by the iterative-deepening driver.
pub const DEFAULT_MAX_K: usize = 10;

/// Default memory budget of the state memo (256 MiB).
pub const DEFAULT_MEMO_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// Options shared by every search entry point.
///
/// # Example
/// ```
/// # use maaf_search::config::SearchConfig;
/// let config = SearchConfig::default()
///     .with_stop_at_first(false)
///     .with_max_k(4)
///     .with_protected_taxa(vec!["A".to_string()]);
/// assert!(!config.stop_at_first);
/// assert_eq!(config.max_k, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// End the search at the first acyclic forest found
    pub stop_at_first: bool,
    /// Upper bound for [`hybridization_number`](crate::search::hybridization_number)
    pub max_k: usize,
    /// Memory budget of the state memo, in bytes
    pub memo_capacity_bytes: usize,
    /// Rebuild both input trees from every forest found
    pub reconstruct: bool,
    /// Taxa that may never be isolated in a forest
    pub protected_taxa: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            stop_at_first: true,
            max_k: DEFAULT_MAX_K,
            memo_capacity_bytes: DEFAULT_MEMO_CAPACITY_BYTES,
            reconstruct: true,
            protected_taxa: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn with_stop_at_first(mut self, stop_at_first: bool) -> Self {
        self.stop_at_first = stop_at_first;
        self
    }

    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k;
        self
    }

    pub fn with_memo_capacity_bytes(mut self, bytes: usize) -> Self {
        self.memo_capacity_bytes = bytes;
        self
    }

    pub fn with_reconstruct(mut self, reconstruct: bool) -> Self {
        self.reconstruct = reconstruct;
        self
    }

    pub fn with_protected_taxa(mut self, taxa: Vec<String>) -> Self {
        self.protected_taxa = taxa;
        self
    }
}
