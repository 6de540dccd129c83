use crate::error::Result;
use crate::storage::filters::{CanonicalFilter, StoreStats};
use crate::types::{AliasId, CanonicalId, CanonicalTag, Embedding, TagAlias, VideoId};

/// Outcome of creating a canonical tag together with its seed alias.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedWrite {
    /// Both records were written. The slug may carry a collision suffix.
    Created(CanonicalTag),
    /// The seed's normalized text was already taken; nothing was written
    /// and the current owner is returned.
    Existing(CanonicalTag),
}

/// Outcome of inserting a standalone alias.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasWrite {
    Inserted(TagAlias),
    /// Normalized text already owned by this alias; nothing was written.
    Existing(TagAlias),
}

impl AliasWrite {
    pub fn alias(&self) -> &TagAlias {
        match self {
            AliasWrite::Inserted(a) | AliasWrite::Existing(a) => a,
        }
    }
}

/// Persistent store for canonical tags, aliases and video links.
///
/// Every multi-record write runs in one transaction: it commits
/// completely or not at all.
pub trait TagStore: Send + Sync {
    // === Canonical tags ===

    /// Retrieve a canonical tag by ID
    fn get_canonical(&self, id: CanonicalId) -> Result<Option<CanonicalTag>>;

    /// Create a canonical tag and its seed alias atomically.
    /// `normalized_text` of the seed is re-checked inside the transaction.
    fn create_canonical_with_seed(&self, canonical: &CanonicalTag, seed: &TagAlias) -> Result<SeedWrite>;

    /// Update display name, slug or approval state of an existing tag.
    /// The slug is made unique if it collides with another tag.
    fn update_canonical(&self, canonical: &CanonicalTag) -> Result<CanonicalTag>;

    /// List canonical tags ordered by display name
    fn list_canonicals(&self, filter: CanonicalFilter) -> Result<Vec<CanonicalTag>>;

    // === Aliases ===

    /// Layer 1 lookup: the alias owning a normalized key
    fn alias_by_normalized(&self, normalized_text: &str) -> Result<Option<TagAlias>>;

    /// Layer 1 lookup resolved to its canonical tag
    fn canonical_by_normalized(&self, normalized_text: &str) -> Result<Option<CanonicalTag>>;

    /// Retrieve an alias by ID
    fn get_alias(&self, id: AliasId) -> Result<Option<TagAlias>>;

    /// Insert an alias for an existing canonical tag (upsert-on-conflict by normalized key)
    fn insert_alias(&self, alias: &TagAlias) -> Result<AliasWrite>;

    /// All aliases of a canonical tag, in creation order
    fn aliases_for(&self, canonical_id: CanonicalId) -> Result<Vec<TagAlias>>;

    /// Every alias that has a stored embedding, in creation order
    fn embedded_aliases(&self) -> Result<Vec<TagAlias>>;

    /// Aliases still waiting for an embedding
    fn aliases_pending_backfill(&self, limit: usize) -> Result<Vec<TagAlias>>;

    /// Attach an embedding to an alias created without one
    fn set_alias_embedding(&self, id: AliasId, embedding: &Embedding) -> Result<()>;

    // === Merge ===

    /// Move aliases and video links from `source` to `target`, then delete
    /// `source`. Returns the number of aliases moved.
    fn merge_canonical(&self, source: CanonicalId, target: CanonicalId) -> Result<usize>;

    // === Video links ===

    /// Link a tag to a video. Returns false if the link already existed.
    fn link_video(&self, video: VideoId, canonical: CanonicalId) -> Result<bool>;

    /// Remove a video link. Errors if the link does not exist.
    fn unlink_video(&self, video: VideoId, canonical: CanonicalId) -> Result<()>;

    /// Tags linked to a video, ordered by display name
    fn canonicals_for_video(&self, video: VideoId) -> Result<Vec<CanonicalTag>>;

    /// Videos linked to a tag
    fn videos_for_canonical(&self, canonical: CanonicalId) -> Result<Vec<VideoId>>;

    // === Maintenance ===

    /// Get database statistics
    fn stats(&self) -> Result<StoreStats>;
}
