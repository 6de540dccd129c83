use crate::error::{Result, TagError};
use crate::types::{AliasId, Embedding, TagAlias};
use instant_distance::{Builder, HnswMap, Point, Search};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Cosine distance, `1 - cos`, in [0, 2]. Zero vectors sit at distance 1.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// Map a cosine distance in [0, 2] onto a [0, 1] similarity score.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// One alias vector and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub alias_id: AliasId,
    pub distance: f32,
}

impl IndexHit {
    pub fn similarity(&self) -> f32 {
        similarity_from_distance(self.distance)
    }

    /// Closer first; equal distances fall back to alias creation order.
    fn rank(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.alias_id.cmp(&other.alias_id))
    }
}

#[derive(Clone, Debug)]
struct EmbeddingPoint(Vec<f32>);

impl Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        cosine_distance(&self.0, &other.0)
    }
}

/// In-memory vectors of every alias that has an embedding.
///
/// `closest` is an exact scan so the auto-merge decision never misses the
/// true nearest alias. `nearest` (search ranking) uses the HNSW graph when
/// one has been built, plus an exact scan over vectors added since.
pub struct AliasIndex {
    hnsw: Option<HnswMap<EmbeddingPoint, AliasId>>,
    vectors: HashMap<AliasId, Vec<f32>>,
    /// Inserted after the last rebuild, not yet in `hnsw`
    unindexed: Vec<AliasId>,
    dimension: Option<usize>,
}

impl AliasIndex {
    /// Empty index; the dimension is fixed by the first insert.
    pub fn new() -> Self {
        Self {
            hnsw: None,
            vectors: HashMap::new(),
            unindexed: Vec::new(),
            dimension: None,
        }
    }

    /// Empty index that only accepts `dimension`-sized vectors.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::new()
        }
    }

    /// Build from stored aliases. Aliases pending backfill are skipped, as
    /// are vectors whose dimension disagrees with the first one loaded.
    pub fn from_aliases(aliases: &[TagAlias]) -> Self {
        let mut index = Self::new();
        for alias in aliases {
            if let Some(embedding) = &alias.embedding {
                if let Err(e) = index.insert(alias.id, embedding) {
                    log::warn!("Skipping alias {} in similarity index: {}", alias.id, e);
                }
            }
        }
        index.rebuild();
        index
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of vectors not yet in the HNSW graph.
    pub fn unindexed_len(&self) -> usize {
        self.unindexed.len()
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != embedding.len() => {
                Err(TagError::Validation(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    expected,
                    embedding.len()
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn insert(&mut self, id: AliasId, embedding: &Embedding) -> Result<()> {
        if embedding.is_empty() {
            return Err(TagError::Validation("Embedding is empty".to_string()));
        }
        self.check_dimension(embedding)?;
        self.dimension = Some(embedding.len());

        if self.vectors.insert(id, embedding.clone()).is_none() {
            self.unindexed.push(id);
        } else {
            // Replaced vector: the graph entry is stale until the next rebuild
            self.unindexed.retain(|u| *u != id);
            self.unindexed.push(id);
        }
        Ok(())
    }

    /// Globally closest alias with `distance < max_distance`.
    pub fn closest(&self, query: &Embedding, max_distance: f32) -> Result<Option<IndexHit>> {
        if self.vectors.is_empty() {
            return Ok(None);
        }
        self.check_dimension(query)?;

        Ok(self
            .vectors
            .par_iter()
            .map(|(id, vector)| IndexHit {
                alias_id: *id,
                distance: cosine_distance(query, vector),
            })
            .filter(|hit| hit.distance.is_finite() && hit.distance < max_distance)
            .min_by(|a, b| a.rank(b)))
    }

    /// Up to `k` aliases ordered by distance.
    pub fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<IndexHit>> {
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let Some(hnsw) = self.hnsw.as_ref() else {
            return Ok(self.brute_force(query, k, self.vectors.keys()));
        };

        let point = EmbeddingPoint(query.clone());
        let mut search = Search::default();
        let mut hits: Vec<IndexHit> = hnsw
            .search(&point, &mut search)
            .filter(|item| !self.unindexed.contains(item.value))
            .take(k)
            .map(|item| IndexHit {
                alias_id: *item.value,
                distance: item.distance,
            })
            .collect();

        hits.extend(self.brute_force(query, k, self.unindexed.iter()));
        hits.sort_by(|a, b| a.rank(b));
        hits.truncate(k);
        Ok(hits)
    }

    fn brute_force<'a>(
        &self,
        query: &Embedding,
        k: usize,
        ids: impl Iterator<Item = &'a AliasId>,
    ) -> Vec<IndexHit> {
        let mut hits: Vec<IndexHit> = ids
            .filter_map(|id| {
                self.vectors.get(id).map(|vector| IndexHit {
                    alias_id: *id,
                    distance: cosine_distance(query, vector),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.rank(b));
        hits.truncate(k);
        hits
    }

    /// Rebuild the HNSW graph over every stored vector.
    pub fn rebuild(&mut self) {
        self.unindexed.clear();
        if self.vectors.is_empty() {
            self.hnsw = None;
            return;
        }

        let mut points = Vec::with_capacity(self.vectors.len());
        let mut values = Vec::with_capacity(self.vectors.len());
        for (id, vector) in &self.vectors {
            points.push(EmbeddingPoint(vector.clone()));
            values.push(*id);
        }

        self.hnsw = Some(Builder::default().build(points, values));
    }
}

impl Default for AliasIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Unit vector at `degrees` in the plane.
    fn at_angle(degrees: f32) -> Embedding {
        let r = degrees.to_radians();
        vec![r.cos(), r.sin()]
    }

    #[test]
    fn test_cosine_distance_range() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_similarity_from_distance() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(0.25), 0.875);
        assert_eq!(similarity_from_distance(2.0), 0.0);
    }

    #[test]
    fn test_closest_respects_threshold() {
        let mut index = AliasIndex::new();
        let near = Uuid::now_v7();
        let far = Uuid::now_v7();
        index.insert(near, &at_angle(30.0)).unwrap();
        index.insert(far, &at_angle(120.0)).unwrap();

        let hit = index.closest(&at_angle(0.0), 0.40).unwrap().unwrap();
        assert_eq!(hit.alias_id, near);

        // cos(30°) gives distance ~0.134; a tighter threshold rejects it
        assert!(index.closest(&at_angle(0.0), 0.10).unwrap().is_none());
    }

    #[test]
    fn test_closest_is_global_minimum() {
        let mut index = AliasIndex::new();
        let ids: Vec<AliasId> = (0..50).map(|_| Uuid::now_v7()).collect();
        for (i, id) in ids.iter().enumerate() {
            index.insert(*id, &at_angle(5.0 + i as f32)).unwrap();
        }
        let hit = index.closest(&at_angle(0.0), 0.40).unwrap().unwrap();
        assert_eq!(hit.alias_id, ids[0]);
    }

    #[test]
    fn test_closest_tie_breaks_on_creation_order() {
        let mut index = AliasIndex::new();
        let older = Uuid::now_v7();
        let newer = Uuid::now_v7();
        index.insert(newer, &at_angle(10.0)).unwrap();
        index.insert(older, &at_angle(-10.0)).unwrap();

        for _ in 0..10 {
            let hit = index.closest(&at_angle(0.0), 0.40).unwrap().unwrap();
            assert_eq!(hit.alias_id, older);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = AliasIndex::with_dimension(3);
        assert!(index.insert(Uuid::now_v7(), &vec![1.0, 0.0]).is_err());
        index.insert(Uuid::now_v7(), &vec![1.0, 0.0, 0.0]).unwrap();
        assert!(index.closest(&vec![1.0, 0.0], 0.4).is_err());
    }

    #[test]
    fn test_nearest_merges_graph_and_unindexed() {
        let mut index = AliasIndex::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        index.insert(a, &at_angle(40.0)).unwrap();
        index.insert(b, &at_angle(90.0)).unwrap();
        index.rebuild();
        assert_eq!(index.unindexed_len(), 0);

        let late = Uuid::now_v7();
        index.insert(late, &at_angle(5.0)).unwrap();
        assert_eq!(index.unindexed_len(), 1);

        let hits = index.nearest(&at_angle(0.0), 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.alias_id).collect::<Vec<_>>(), vec![late, a]);
    }

    #[test]
    fn test_from_aliases_skips_pending() {
        let owner = Uuid::now_v7();
        let aliases = vec![
            TagAlias::new("money", owner, Some(at_angle(0.0)), 1.0).unwrap(),
            TagAlias::new("cash", owner, None, 1.0).unwrap(),
        ];
        let index = AliasIndex::from_aliases(&aliases);
        assert_eq!(index.len(), 1);
        assert_eq!(index.dimension(), Some(2));
    }
}
