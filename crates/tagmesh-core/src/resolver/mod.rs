//! Layered tag resolution.
//!
//! Cheapest first: exact alias lookup, translation cache, embedding, then
//! nearest-neighbour search. The first confident layer wins.

mod backfill;
mod config;
mod import;
mod providers;
mod search;

pub use backfill::BackfillReport;
pub use config::ResolverConfig;
pub use import::{parse_legacy_json, ImportReport, LegacyTagRecord};
pub use providers::{EmbeddingOutcome, Providers, TranslationOutcome};

use crate::error::{Result, ResultExt};
use crate::normalize::{normalize, validate_tag_text};
use crate::storage::{AliasWrite, SeedWrite, TagStore};
use crate::types::{AliasId, CanonicalTag, Embedding, TagAlias};
use crate::vector::{SimilarMatch, SimilarityMatcher};
use serde::Serialize;
use std::sync::Arc;

/// Which layer produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionLayer {
    /// Normalized input already known.
    ExactAlias,
    /// English translation already known; input cached as a new alias.
    TranslatedAlias,
    /// Embedding unavailable; new canonical created pending backfill.
    NoEmbedding,
    /// Attached to the closest existing canonical within the threshold.
    SemanticMatch,
    /// Nothing close enough; new canonical created.
    NewCanonical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub canonical: CanonicalTag,
    /// Normalized input for exact hits, the trimmed input otherwise.
    pub matched_text: String,
    pub is_new: bool,
    pub layer: ResolutionLayer,
    /// Similarity that justified the link; 1.0 unless semantically matched.
    pub similarity: f32,
}

impl Resolution {
    fn existing(canonical: CanonicalTag, matched_text: String, layer: ResolutionLayer) -> Self {
        Self {
            canonical,
            matched_text,
            is_new: false,
            layer,
            similarity: 1.0,
        }
    }
}

/// Maps free-text tags onto canonical tags, creating them when needed.
pub struct TagResolver<S: TagStore> {
    store: Arc<S>,
    matcher: Arc<SimilarityMatcher<S>>,
    providers: Providers,
    config: ResolverConfig,
}

impl<S: TagStore> TagResolver<S> {
    pub fn new(
        store: Arc<S>,
        matcher: Arc<SimilarityMatcher<S>>,
        providers: Providers,
        config: ResolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        if let (Some(index_dim), Some(provider_dim)) =
            (matcher.dimension(), providers.embedding_dimension())
        {
            if index_dim != provider_dim {
                log::warn!(
                    "Stored embeddings have {} dimensions but the provider produces {}; \
                     new tags skip semantic matching and wait for backfill",
                    index_dim,
                    provider_dim
                );
            }
        }
        Ok(Self {
            store,
            matcher,
            providers,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn matcher(&self) -> &Arc<SimilarityMatcher<S>> {
        &self.matcher
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve user input to a canonical tag.
    ///
    /// Provider failures never surface here: they move resolution onto a
    /// cheaper path. Errors are invalid input or storage failures.
    pub async fn resolve(&self, input: &str) -> Result<Resolution> {
        let display = validate_tag_text(input)?;
        let normalized = normalize(input);
        log::debug!("Resolving tag {:?} (key {:?})", input, normalized);

        // Layer 1: exact alias
        if let Some(canonical) = self
            .store
            .canonical_by_normalized(&normalized)
            .context("layer 1: alias lookup")?
        {
            log::info!(
                "Layer 1 hit: {:?} -> {} ({})",
                input,
                canonical.display_name,
                canonical.id
            );
            return Ok(Resolution::existing(canonical, normalized, ResolutionLayer::ExactAlias));
        }
        log::debug!("Layer 1 miss: {:?}", normalized);

        // Layer 1.5: translation cache
        if let Some(resolution) = self.resolve_via_translation(input, &display).await? {
            return Ok(resolution);
        }

        // Layer 2: embedding
        let embedding = match self.providers.embed(&display).await {
            EmbeddingOutcome::Generated(embedding) => embedding,
            EmbeddingOutcome::Unavailable(reason) => {
                log::warn!(
                    "Layer 2 unavailable for {:?}, creating canonical without embedding: {}",
                    input,
                    reason
                );
                return self
                    .create_canonical(input, &display, None, ResolutionLayer::NoEmbedding)
                    .context("layer 2 fallback: create canonical");
            }
        };

        // Stored vectors from another model cannot be compared with this one
        if let Some(reason) = self.incomparable(&embedding) {
            log::warn!(
                "Layer 3 skipped for {:?}, creating canonical pending backfill: {}",
                input,
                reason
            );
            return self
                .create_canonical(input, &display, None, ResolutionLayer::NoEmbedding)
                .context("layer 3 fallback: create canonical");
        }

        // Layers 3 and 4. The matched canonical can be merged away between
        // search and insert; one retry sees the post-merge owner.
        let mut retried = false;
        loop {
            let closest = self
                .matcher
                .find_closest(&embedding, self.config.auto_merge_distance)
                .context("layer 3: similarity search")?;

            let Some(found) = closest else {
                return self
                    .create_canonical(input, &display, Some(embedding), ResolutionLayer::NewCanonical)
                    .context("layer 4: create canonical");
            };

            match self.attach_alias(input, &display, found, &embedding) {
                Err(e) if e.is_not_found() && !retried => {
                    log::debug!("Matched canonical vanished before alias insert, retrying: {}", e);
                    retried = true;
                }
                result => return result.context("layer 4: attach alias"),
            }
        }
    }

    async fn resolve_via_translation(
        &self,
        input: &str,
        display: &str,
    ) -> Result<Option<Resolution>> {
        if !self.config.translation_enabled || !self.providers.has_translation() {
            return Ok(None);
        }

        let english = match self.providers.translate(display).await {
            TranslationOutcome::Translated(english) => english,
            TranslationOutcome::Unchanged => {
                log::debug!("Layer 1.5 skipped: {:?} is already English", input);
                return Ok(None);
            }
            TranslationOutcome::Unavailable(reason) => {
                log::warn!("Layer 1.5 translation failed for {:?}: {}", input, reason);
                return Ok(None);
            }
        };

        let Some(canonical) = self
            .store
            .canonical_by_normalized(&normalize(&english))
            .context("layer 1.5: translated alias lookup")?
        else {
            log::debug!("Layer 1.5 miss: {:?} -> {:?}", input, english);
            return Ok(None);
        };

        log::info!(
            "Layer 1.5 hit: {:?} -> {:?} -> {} ({})",
            input,
            english,
            canonical.display_name,
            canonical.id
        );

        // Cache the raw input so the next lookup stops at layer 1
        let embedding = self.providers.embed(display).await.into_embedding();
        let canonical = match self.cache_alias(input, &canonical, embedding) {
            Ok(owner) => owner,
            Err(e) => {
                log::warn!("Failed to cache translation alias for {:?}: {}", input, e);
                canonical
            }
        };

        Ok(Some(Resolution::existing(
            canonical,
            display.to_string(),
            ResolutionLayer::TranslatedAlias,
        )))
    }

    /// Store `input` as an alias of `canonical`. Returns whichever tag owns
    /// the key afterwards, which differs only if another writer got there first.
    fn cache_alias(
        &self,
        input: &str,
        canonical: &CanonicalTag,
        embedding: Option<Embedding>,
    ) -> Result<CanonicalTag> {
        let alias = TagAlias::new(input, canonical.id, embedding.clone(), 1.0)?;
        match self.store.insert_alias(&alias)? {
            AliasWrite::Inserted(alias) => {
                if let Some(embedding) = embedding {
                    self.index_alias(alias.id, &embedding);
                } else {
                    log::debug!("Translation alias {:?} stored pending backfill", input);
                }
                Ok(canonical.clone())
            }
            AliasWrite::Existing(existing) => self.owner_or(existing, canonical),
        }
    }

    fn attach_alias(
        &self,
        input: &str,
        display: &str,
        found: SimilarMatch,
        embedding: &Embedding,
    ) -> Result<Resolution> {
        let alias = TagAlias::new(input, found.canonical.id, Some(embedding.clone()), found.similarity)?;

        match self.store.insert_alias(&alias)? {
            AliasWrite::Inserted(alias) => {
                self.index_alias(alias.id, embedding);
                log::info!(
                    "Layer 3 hit: {:?} -> {} ({}) via {:?}, similarity {:.3}",
                    input,
                    found.canonical.display_name,
                    found.canonical.id,
                    found.alias.raw_text,
                    found.similarity
                );
                Ok(Resolution {
                    canonical: found.canonical,
                    matched_text: display.to_string(),
                    is_new: false,
                    layer: ResolutionLayer::SemanticMatch,
                    similarity: found.similarity,
                })
            }
            AliasWrite::Existing(existing) => {
                let owner = self.owner_or(existing, &found.canonical)?;
                Ok(Resolution::existing(owner, display.to_string(), ResolutionLayer::ExactAlias))
            }
        }
    }

    fn create_canonical(
        &self,
        input: &str,
        display: &str,
        embedding: Option<Embedding>,
        layer: ResolutionLayer,
    ) -> Result<Resolution> {
        let canonical = CanonicalTag::new(display)?;
        let seed = TagAlias::seed(&canonical, input, embedding.clone())?;

        match self.store.create_canonical_with_seed(&canonical, &seed)? {
            SeedWrite::Created(canonical) => {
                if let Some(embedding) = embedding {
                    self.index_alias(seed.id, &embedding);
                }
                log::info!(
                    "Created canonical {} ({}) for {:?}{}",
                    canonical.display_name,
                    canonical.id,
                    input,
                    if layer == ResolutionLayer::NoEmbedding { ", pending backfill" } else { "" }
                );
                Ok(Resolution {
                    canonical,
                    matched_text: display.to_string(),
                    is_new: true,
                    layer,
                    similarity: 1.0,
                })
            }
            SeedWrite::Existing(owner) => {
                log::info!(
                    "Concurrent resolve created {:?} first, using {} ({})",
                    input,
                    owner.display_name,
                    owner.id
                );
                Ok(Resolution::existing(owner, display.to_string(), ResolutionLayer::ExactAlias))
            }
        }
    }

    /// Why `embedding` cannot be searched against the index, if it cannot.
    fn incomparable(&self, embedding: &Embedding) -> Option<String> {
        match self.matcher.dimension() {
            Some(indexed) if indexed != embedding.len() => Some(format!(
                "index holds {}-dimension vectors, provider returned {}",
                indexed,
                embedding.len()
            )),
            _ => None,
        }
    }

    fn owner_or(&self, alias: TagAlias, fallback: &CanonicalTag) -> Result<CanonicalTag> {
        Ok(self
            .store
            .get_canonical(alias.canonical_tag_id)?
            .unwrap_or_else(|| fallback.clone()))
    }

    /// The row is already committed; an index failure only delays searchability.
    fn index_alias(&self, alias_id: AliasId, embedding: &Embedding) {
        if let Err(e) = self.matcher.add(alias_id, embedding) {
            log::warn!("Alias {} stored but not indexed: {}", alias_id, e);
            return;
        }
        if let Err(e) = self.matcher.maybe_rebuild(self.config.index_rebuild_after) {
            log::warn!("Similarity graph rebuild failed: {}", e);
        }
    }
}
