#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagmesh_core::*;
use tempfile::TempDir;

/// Deterministic embeddings from a lookup table. Unknown texts fail.
pub struct TableEmbedder {
    vectors: Mutex<HashMap<String, Embedding>>,
    offline: AtomicBool,
    dimension: usize,
    pub calls: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, Embedding)]) -> Arc<Self> {
        Self::with_dimension(entries, 2)
    }

    pub fn with_dimension(entries: &[(&str, Embedding)], dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            vectors: Mutex::new(
                entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
            ),
            offline: AtomicBool::new(false),
            dimension,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn insert(&self, text: &str, vector: Embedding) {
        self.vectors.lock().unwrap().insert(text.to_string(), vector);
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(TagError::Provider("embedding service unavailable".into()));
        }
        self.vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| TagError::Provider(format!("no vector for {:?}", text)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

/// Dictionary translator that counts calls.
pub struct DictionaryTranslator {
    entries: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl DictionaryTranslator {
    pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TranslationProvider for DictionaryTranslator {
    async fn translate_to_english(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }

    fn name(&self) -> &str {
        "dictionary"
    }
}

/// Unit vector at `degrees` in the plane. Two vectors `a` degrees apart sit
/// at cosine distance `1 - cos(a)`.
pub fn at_angle(degrees: f32) -> Embedding {
    let r = degrees.to_radians();
    vec![r.cos(), r.sin()]
}

/// Vector at exactly `distance` from `[1, 0]`.
pub fn at_distance(distance: f32) -> Embedding {
    let cos = 1.0 - distance;
    vec![cos, (1.0 - cos * cos).sqrt()]
}

pub fn test_config() -> ResolverConfig {
    ResolverConfig::new()
        .with_auto_merge_distance(0.40)
        .with_provider_timeout(Duration::from_secs(2))
}

pub fn open_service(
    embedder: Option<Arc<TableEmbedder>>,
    translator: Option<Arc<DictionaryTranslator>>,
) -> (TagService, TempDir) {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new().unwrap();
    let config = test_config();
    let mut providers = Providers::none(config.provider_timeout);
    if let Some(embedder) = embedder {
        providers = providers.with_embedding(embedder);
    }
    if let Some(translator) = translator {
        providers = providers.with_translation(translator);
    }
    let service = TagService::open(temp_dir.path().join("tags.redb"), providers, config).unwrap();
    (service, temp_dir)
}
