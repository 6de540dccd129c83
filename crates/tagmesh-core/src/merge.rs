use crate::error::{Result, ResultExt, TagError};
use crate::storage::TagStore;
use crate::types::{CanonicalId, CanonicalTag};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    /// Target after the merge; it now owns every alias of the source.
    pub target: CanonicalTag,
    pub merged_alias_count: usize,
    pub source_deleted: bool,
}

/// Folds one canonical tag into another.
pub struct MergeEngine<S: TagStore> {
    store: Arc<S>,
}

impl<S: TagStore> MergeEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Move every alias and video link of `source` onto `target` and delete
    /// `source`, in one transaction.
    pub fn merge(&self, source: CanonicalId, target: CanonicalId) -> Result<MergeOutcome> {
        if source == target {
            return Err(TagError::InvalidInput(
                "source and target tags must be different".to_string(),
            ));
        }

        let source_tag = self
            .store
            .get_canonical(source)
            .context("merge: load source")?
            .ok_or(TagError::CanonicalNotFound(source))?;
        let target_tag = self
            .store
            .get_canonical(target)
            .context("merge: load target")?
            .ok_or(TagError::CanonicalNotFound(target))?;

        log::info!(
            "Merging {} ({}) into {} ({})",
            source_tag.display_name,
            source,
            target_tag.display_name,
            target
        );

        let merged_alias_count = match self.store.merge_canonical(source, target) {
            Ok(count) => count,
            Err(e) => {
                log::error!("Merge of {} into {} failed and was rolled back: {}", source, target, e);
                return Err(e).context("merge: transaction");
            }
        };

        log::info!(
            "Merged {} into {}: {} aliases moved",
            source_tag.display_name,
            target_tag.display_name,
            merged_alias_count
        );

        Ok(MergeOutcome {
            target: target_tag,
            merged_alias_count,
            source_deleted: true,
        })
    }
}
