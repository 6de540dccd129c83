use super::{EmbeddingOutcome, TagResolver};
use crate::error::Result;
use crate::storage::TagStore;
use crate::types::TagAlias;
use futures::stream::{self, StreamExt};
use serde::Serialize;

/// Concurrent embedding calls per backfill run.
const BACKFILL_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl<S: TagStore> TagResolver<S> {
    /// Embed up to `limit` aliases that were stored without a vector.
    ///
    /// Per-alias failures are counted and logged; only listing the queue can
    /// fail the whole run.
    pub async fn backfill_embeddings(&self, limit: usize) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        if !self.providers.has_embedding() {
            log::debug!("Backfill skipped: no embedding provider");
            return Ok(report);
        }

        let pending = self.store.aliases_pending_backfill(limit)?;
        if pending.is_empty() {
            return Ok(report);
        }
        log::info!("Backfilling embeddings for {} aliases", pending.len());

        let outcomes: Vec<(TagAlias, EmbeddingOutcome)> = stream::iter(pending)
            .map(|alias| async move {
                let outcome = self.providers.embed(alias.raw_text.trim()).await;
                (alias, outcome)
            })
            .buffer_unordered(BACKFILL_CONCURRENCY)
            .collect()
            .await;

        for (alias, outcome) in outcomes {
            report.processed += 1;
            let embedding = match outcome {
                EmbeddingOutcome::Generated(embedding) => embedding,
                EmbeddingOutcome::Unavailable(reason) => {
                    log::warn!("Backfill failed for alias {} ({:?}): {}", alias.id, alias.raw_text, reason);
                    report.failed += 1;
                    continue;
                }
            };

            match self.store.set_alias_embedding(alias.id, &embedding) {
                Ok(()) => {
                    self.index_alias(alias.id, &embedding);
                    report.succeeded += 1;
                }
                Err(e) => {
                    log::warn!("Backfill could not store embedding for alias {}: {}", alias.id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Backfill done: {} processed, {} succeeded, {} failed",
            report.processed,
            report.succeeded,
            report.failed
        );
        Ok(report)
    }
}
