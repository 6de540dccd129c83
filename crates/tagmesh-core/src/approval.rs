use crate::error::{Result, ResultExt, TagError};
use crate::normalize::{slugify, validate_tag_text};
use crate::storage::TagStore;
use crate::types::{CanonicalId, CanonicalTag};
use std::sync::Arc;

/// Moderation edits on canonical tags: approval and renames.
pub struct ApprovalWorkflow<S: TagStore> {
    store: Arc<S>,
}

impl<S: TagStore> ApprovalWorkflow<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn load(&self, id: CanonicalId) -> Result<CanonicalTag> {
        self.store
            .get_canonical(id)
            .context("approval: load tag")?
            .ok_or(TagError::CanonicalNotFound(id))
    }

    /// Approved tags are the ones offered by `approved_only` searches.
    pub fn set_approval(&self, id: CanonicalId, approved: bool) -> Result<CanonicalTag> {
        let mut tag = self.load(id)?;
        if tag.is_approved == approved {
            return Ok(tag);
        }

        tag.is_approved = approved;
        tag.touch();
        let tag = self
            .store
            .update_canonical(&tag)
            .context("approval: update tag")?;

        log::info!(
            "Tag {} ({}) {}",
            tag.display_name,
            tag.id,
            if approved { "approved" } else { "unapproved" }
        );
        Ok(tag)
    }

    /// Change the display name. The slug follows; existing aliases are kept.
    pub fn rename(&self, id: CanonicalId, display_name: &str) -> Result<CanonicalTag> {
        let display_name = validate_tag_text(display_name)?;
        let mut tag = self.load(id)?;
        if tag.display_name == display_name {
            return Ok(tag);
        }

        let previous = std::mem::replace(&mut tag.display_name, display_name);
        tag.slug = slugify(&tag.display_name);
        tag.touch();
        let tag = self
            .store
            .update_canonical(&tag)
            .context("approval: rename tag")?;

        log::info!("Renamed tag {} from {:?} to {:?}", tag.id, previous, tag.display_name);
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RedbTagStore, SeedWrite};
    use crate::types::TagAlias;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn setup() -> (ApprovalWorkflow<RedbTagStore>, Arc<RedbTagStore>, CanonicalTag, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbTagStore::open(temp_dir.path().join("approval.redb")).unwrap());
        let canonical = CanonicalTag::new("money").unwrap();
        let seed = TagAlias::seed(&canonical, "money", None).unwrap();
        let tag = match store.create_canonical_with_seed(&canonical, &seed).unwrap() {
            SeedWrite::Created(tag) => tag,
            SeedWrite::Existing(tag) => tag,
        };
        (ApprovalWorkflow::new(store.clone()), store, tag, temp_dir)
    }

    #[test]
    fn test_set_approval_toggles() {
        let (workflow, store, tag, _temp) = setup();
        assert!(!tag.is_approved);

        let approved = workflow.set_approval(tag.id, true).unwrap();
        assert!(approved.is_approved);
        assert!(store.get_canonical(tag.id).unwrap().unwrap().is_approved);

        let revoked = workflow.set_approval(tag.id, false).unwrap();
        assert!(!revoked.is_approved);
    }

    #[test]
    fn test_set_approval_missing_tag() {
        let (workflow, _store, _tag, _temp) = setup();
        let err = workflow.set_approval(Uuid::now_v7(), true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_keeps_aliases() {
        let (workflow, store, tag, _temp) = setup();
        let renamed = workflow.rename(tag.id, "  Money & Finance ").unwrap();

        assert_eq!(renamed.display_name, "Money & Finance");
        assert_eq!(renamed.slug, "money-finance");
        assert_eq!(store.canonical_by_normalized("money").unwrap().unwrap().id, tag.id);
        assert!(workflow.rename(tag.id, "   ").unwrap_err().is_invalid_input());
    }
}
