//! One-shot migration of flat legacy tags into canonical tags + seed aliases.

use crate::error::{Result, TagError};
use super::TagResolver;
use crate::storage::{SeedWrite, TagStore};
use crate::types::{CanonicalTag, Embedding, TagAlias, VideoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tag from the flat, pre-canonical schema.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LegacyTagRecord {
    /// Kept as the canonical ID so existing references stay valid.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub embedding: Option<Embedding>,
    #[serde(default)]
    pub video_ids: Vec<VideoId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LegacyTagRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            embedding: None,
            video_ids: Vec::new(),
            created_at: None,
        }
    }
}

/// Parse a JSON array of legacy records.
pub fn parse_legacy_json(text: &str) -> Result<Vec<LegacyTagRecord>> {
    serde_json::from_str(text)
        .map_err(|e| TagError::InvalidInput(format!("invalid legacy tag JSON: {}", e)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Records whose normalized name already existed; their videos were
    /// linked to the existing tag.
    pub merged_duplicates: usize,
    pub failed: usize,
    pub video_links: usize,
    pub pending_backfill: usize,
}

impl<S: TagStore> TagResolver<S> {
    /// Import legacy tags. Each record is its own transaction; a bad record is
    /// counted and skipped.
    pub async fn import_legacy(&self, records: Vec<LegacyTagRecord>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let total = records.len();

        for (i, record) in records.into_iter().enumerate() {
            let name = record.name.clone();
            match self.import_one(record, &mut report).await {
                Ok(()) => {}
                Err(e) if e.is_invalid_input() => {
                    log::warn!("Import {}/{}: skipping {:?}: {}", i + 1, total, name, e);
                    report.failed += 1;
                }
                Err(e) => {
                    log::error!("Import {}/{}: {:?} failed: {}", i + 1, total, name, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Import done: {} imported, {} duplicates, {} failed, {} video links",
            report.imported,
            report.merged_duplicates,
            report.failed,
            report.video_links
        );
        Ok(report)
    }

    async fn import_one(&self, record: LegacyTagRecord, report: &mut ImportReport) -> Result<()> {
        let mut canonical = match record.id {
            Some(id) => CanonicalTag::with_id(id, &record.name)?,
            None => CanonicalTag::new(&record.name)?,
        };
        if let Some(created_at) = record.created_at {
            canonical.created_at = created_at;
            canonical.updated_at = created_at;
        }

        let embedding = match record.embedding.filter(|e| !e.is_empty()) {
            Some(embedding) => Some(embedding),
            None => self.providers.embed(&canonical.display_name).await.into_embedding(),
        };

        let mut seed = TagAlias::seed(&canonical, &record.name, embedding.clone())?.reviewed();
        seed.created_at = canonical.created_at;

        let owner = match self.store.create_canonical_with_seed(&canonical, &seed)? {
            SeedWrite::Created(tag) => {
                match embedding {
                    Some(embedding) => self.index_alias(seed.id, &embedding),
                    None => report.pending_backfill += 1,
                }
                report.imported += 1;
                tag
            }
            SeedWrite::Existing(owner) => {
                log::info!(
                    "Legacy tag {:?} duplicates {} ({}); linking its videos there",
                    record.name,
                    owner.display_name,
                    owner.id
                );
                report.merged_duplicates += 1;
                owner
            }
        };

        for video in record.video_ids {
            if self.store.link_video(video, owner.id)? {
                report.video_links += 1;
            }
        }
        Ok(())
    }
}
