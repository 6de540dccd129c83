use crate::error::{Result, TagError};
use crate::normalize::{normalize, slugify, validate_tag_text};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type alias for canonical tag identifiers
pub type CanonicalId = Uuid;

/// Type alias for alias identifiers
pub type AliasId = Uuid;

/// Opaque video identifier owned by the video layer.
pub type VideoId = Uuid;

/// Type alias for embedding vectors
pub type Embedding = Vec<f32>;

/// The single authoritative record for one concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTag {
    /// UUIDv7, time-sortable.
    pub id: CanonicalId,

    /// URL-safe, unique. Derived from the display name.
    pub slug: String,

    /// Human-readable name. Changed only by rename.
    pub display_name: String,

    /// Moderation flag. Auto-created tags start unapproved.
    pub is_approved: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalTag {
    /// Build an unsaved canonical tag from user text.
    pub fn new(display_name: &str) -> Result<Self> {
        let display_name = validate_tag_text(display_name)?;
        let now = Utc::now();
        Ok(CanonicalTag {
            id: Uuid::now_v7(),
            slug: slugify(&display_name),
            display_name,
            is_approved: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Same as `new` but keeps an externally assigned ID (legacy import).
    pub fn with_id(id: CanonicalId, display_name: &str) -> Result<Self> {
        let mut tag = Self::new(display_name)?;
        tag.id = id;
        Ok(tag)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A raw text variant that resolves to a canonical tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagAlias {
    /// UUIDv7. Creation order doubles as the similarity tie-breaker.
    pub id: AliasId,

    pub canonical_tag_id: CanonicalId,

    /// User input, verbatim.
    pub raw_text: String,

    /// Layer 1 lookup key. Unique across all aliases.
    pub normalized_text: String,

    pub language: String,

    /// None = provider was unavailable; waits for backfill and is
    /// invisible to similarity search until then.
    pub embedding: Option<Embedding>,

    /// Score that justified the link. 1.0 for seed aliases.
    pub similarity_score: f32,

    /// True for migrated or moderator-confirmed aliases.
    pub is_reviewed: bool,

    pub created_at: DateTime<Utc>,
}

impl TagAlias {
    /// Alias linked to an existing canonical tag.
    pub fn new(
        raw_text: &str,
        canonical_tag_id: CanonicalId,
        embedding: Option<Embedding>,
        similarity_score: f32,
    ) -> Result<Self> {
        if canonical_tag_id.is_nil() {
            return Err(TagError::Validation(
                "alias must reference a canonical tag".to_string(),
            ));
        }
        validate_tag_text(raw_text)?;
        Ok(TagAlias {
            id: Uuid::now_v7(),
            canonical_tag_id,
            normalized_text: normalize(raw_text),
            raw_text: raw_text.to_string(),
            language: "unk".to_string(),
            embedding,
            similarity_score: similarity_score.clamp(0.0, 1.0),
            is_reviewed: false,
            created_at: Utc::now(),
        })
    }

    /// Seed alias created together with its canonical tag.
    pub fn seed(canonical: &CanonicalTag, raw_text: &str, embedding: Option<Embedding>) -> Result<Self> {
        Self::new(raw_text, canonical.id, embedding, 1.0)
    }

    pub fn needs_backfill(&self) -> bool {
        self.embedding.is_none()
    }

    pub fn reviewed(mut self) -> Self {
        self.is_reviewed = true;
        self
    }
}

/// Canonical tag with every alias it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalWithAliases {
    pub tag: CanonicalTag,
    pub aliases: Vec<TagAlias>,
}

impl CanonicalWithAliases {
    /// Alias texts other than the display name itself.
    pub fn alias_texts(&self) -> Vec<String> {
        self.aliases
            .iter()
            .filter(|a| a.raw_text != self.tag.display_name)
            .map(|a| a.raw_text.clone())
            .collect()
    }
}

/// Reference to a tag by ID or by free text to be resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TagRef {
    Id(CanonicalId),
    Name(String),
}
