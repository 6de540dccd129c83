/// Filter criteria for listing canonical tags
#[derive(Debug, Clone, Default)]
pub struct CanonicalFilter {
    pub approved_only: bool,
    /// Substring of the normalized display name or of any alias key.
    pub contains: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl CanonicalFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Only approved tags
    pub fn approved_only(mut self, approved_only: bool) -> Self {
        self.approved_only = approved_only;
        self
    }

    /// Match a normalized substring against display names and aliases
    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.contains = Some(needle.into());
        self
    }

    /// Limit number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip first N results
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub canonical_count: u64,
    pub approved_count: u64,
    pub alias_count: u64,
    pub pending_backfill_count: u64,
    pub video_link_count: u64,
    pub db_size_bytes: u64,
}
