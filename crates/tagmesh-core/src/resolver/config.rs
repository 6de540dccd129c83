use crate::error::{Result, TagError};
use std::time::Duration;

/// Tunables injected into the resolver at construction.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum cosine distance (range [0, 2]) at which a new input is
    /// attached to an existing canonical tag instead of creating one.
    /// Default: 0.40
    pub auto_merge_distance: f32,

    /// Upper bound on every embedding or translation call.
    /// Default: 10s
    pub provider_timeout: Duration,

    /// Result count when a search passes limit 0.
    /// Default: 20
    pub search_limit: usize,

    /// Run the translation layer when a translator is configured.
    /// Default: true
    pub translation_enabled: bool,

    /// Rebuild the HNSW graph after this many new vectors.
    /// Default: 256
    pub index_rebuild_after: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_merge_distance: 0.40,
            provider_timeout: Duration::from_secs(10),
            search_limit: 20,
            translation_enabled: true,
            index_rebuild_after: 256,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_merge_distance(mut self, distance: f32) -> Self {
        self.auto_merge_distance = distance.clamp(0.0, 2.0);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_translation(mut self, enabled: bool) -> Self {
        self.translation_enabled = enabled;
        self
    }

    pub fn with_index_rebuild_after(mut self, count: usize) -> Self {
        self.index_rebuild_after = count;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.auto_merge_distance <= 0.0 || self.auto_merge_distance > 2.0 {
            return Err(TagError::Validation(
                "auto_merge_distance must be in (0, 2]".to_string(),
            ));
        }

        if self.provider_timeout.is_zero() {
            return Err(TagError::Validation(
                "provider_timeout must be greater than 0".to_string(),
            ));
        }

        if self.search_limit == 0 {
            return Err(TagError::Validation(
                "search_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
