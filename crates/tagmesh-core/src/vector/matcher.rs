use crate::error::{Result, TagError};
use crate::storage::TagStore;
use crate::types::{AliasId, CanonicalId, CanonicalTag, Embedding, TagAlias};
use crate::vector::index::{AliasIndex, IndexHit};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Closest alias under the threshold, resolved to its current owner.
#[derive(Debug, Clone)]
pub struct SimilarMatch {
    pub canonical: CanonicalTag,
    pub alias: TagAlias,
    pub distance: f32,
    /// `1 - distance / 2`
    pub similarity: f32,
}

/// Nearest-neighbour search over alias embeddings.
///
/// The index maps alias -> vector only. Owners are read from the store at
/// query time, so a merge never has to touch the index.
pub struct SimilarityMatcher<S: TagStore> {
    store: Arc<S>,
    index: RwLock<AliasIndex>,
}

impl<S: TagStore> SimilarityMatcher<S> {
    /// Load every embedded alias from the store.
    pub fn load(store: Arc<S>) -> Result<Self> {
        let aliases = store.embedded_aliases()?;
        let index = AliasIndex::from_aliases(&aliases);
        log::info!("Similarity index loaded with {} alias vectors", index.len());
        Ok(Self {
            store,
            index: RwLock::new(index),
        })
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, AliasIndex>> {
        self.index
            .read()
            .map_err(|_| TagError::Validation("Vector index lock poisoned".into()))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, AliasIndex>> {
        self.index
            .write()
            .map_err(|_| TagError::Validation("Vector index lock poisoned".into()))
    }

    /// The single globally closest alias with distance below `max_distance`.
    pub fn find_closest(
        &self,
        embedding: &Embedding,
        max_distance: f32,
    ) -> Result<Option<SimilarMatch>> {
        let hit = self.read_index()?.closest(embedding, max_distance)?;
        let Some(hit) = hit else {
            return Ok(None);
        };

        match self.owner_of(hit.alias_id)? {
            Some((alias, canonical)) => Ok(Some(SimilarMatch {
                canonical,
                alias,
                distance: hit.distance,
                similarity: hit.similarity(),
            })),
            None => {
                log::warn!("Indexed alias {} has no owner in the store", hit.alias_id);
                Ok(None)
            }
        }
    }

    /// Up to `limit` canonical tags ranked by their closest alias.
    /// Scans `k` alias neighbours.
    pub fn nearest_canonicals(
        &self,
        embedding: &Embedding,
        k: usize,
        limit: usize,
    ) -> Result<Vec<(CanonicalTag, f32)>> {
        let hits: Vec<IndexHit> = self.read_index()?.nearest(embedding, k)?;

        // Min distance per canonical; hits arrive closest first
        let mut best: HashMap<CanonicalId, (CanonicalTag, f32)> = HashMap::new();
        for hit in hits {
            let Some((_, canonical)) = self.owner_of(hit.alias_id)? else {
                continue;
            };
            best.entry(canonical.id).or_insert((canonical, hit.distance));
        }

        let mut ranked: Vec<(CanonicalTag, f32)> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn owner_of(&self, alias_id: AliasId) -> Result<Option<(TagAlias, CanonicalTag)>> {
        let Some(alias) = self.store.get_alias(alias_id)? else {
            return Ok(None);
        };
        Ok(self
            .store
            .get_canonical(alias.canonical_tag_id)?
            .map(|canonical| (alias, canonical)))
    }

    /// Make a freshly stored alias vector searchable.
    pub fn add(&self, alias_id: AliasId, embedding: &Embedding) -> Result<()> {
        self.write_index()?.insert(alias_id, embedding)
    }

    /// Rebuild the HNSW graph once enough vectors have arrived since the last build.
    pub fn maybe_rebuild(&self, threshold: usize) -> Result<bool> {
        let mut index = self.write_index()?;
        if index.unindexed_len() < threshold.max(1) {
            return Ok(false);
        }
        index.rebuild();
        log::debug!("Rebuilt similarity graph over {} vectors", index.len());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.read_index().map(|index| index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.read_index().ok().and_then(|index| index.dimension())
    }
}
