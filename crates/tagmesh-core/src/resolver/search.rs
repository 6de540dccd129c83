use super::{EmbeddingOutcome, TagResolver};
use crate::error::{Result, ResultExt};
use crate::normalize::normalize;
use crate::storage::{CanonicalFilter, TagStore};
use crate::types::CanonicalTag;

/// Neighbour aliases scanned per requested result.
const SEMANTIC_FANOUT: usize = 4;

impl<S: TagStore> TagResolver<S> {
    /// Substring match on names and aliases first, semantic neighbours if that
    /// finds nothing. Read-only: never creates tags or aliases.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        approved_only: bool,
    ) -> Result<Vec<CanonicalTag>> {
        let limit = if limit == 0 { self.config.search_limit } else { limit };
        let needle = normalize(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let filter = CanonicalFilter::new()
            .approved_only(approved_only)
            .containing(needle.clone())
            .with_limit(limit);
        let substring_hits = self
            .store
            .list_canonicals(filter)
            .context("search: substring phase")?;
        if !substring_hits.is_empty() {
            log::debug!("Search {:?}: {} substring hits", needle, substring_hits.len());
            return Ok(substring_hits);
        }

        let embedding = match self.providers.embed(query.trim()).await {
            EmbeddingOutcome::Generated(embedding) => embedding,
            EmbeddingOutcome::Unavailable(reason) => {
                log::warn!("Search {:?}: semantic phase skipped: {}", needle, reason);
                return Ok(Vec::new());
            }
        };

        if let Some(reason) = self.incomparable(&embedding) {
            log::warn!("Search {:?}: semantic phase skipped: {}", needle, reason);
            return Ok(Vec::new());
        }

        // Fetch the whole fan-out so the approval filter still leaves `limit`
        let fanout = limit.saturating_mul(SEMANTIC_FANOUT);
        let ranked = self
            .matcher
            .nearest_canonicals(&embedding, fanout, fanout)
            .context("search: semantic phase")?;

        let results: Vec<CanonicalTag> = ranked
            .into_iter()
            .map(|(tag, _)| tag)
            .filter(|tag| !approved_only || tag.is_approved)
            .take(limit)
            .collect();
        log::debug!("Search {:?}: {} semantic hits", needle, results.len());
        Ok(results)
    }
}
