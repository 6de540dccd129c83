use crate::error::{Result, TagError};
use crate::types::Embedding;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding as FastEmbedModel};
use std::sync::Arc;

/// Text to fixed-dimension vector.
///
/// Errors mean "unavailable": the resolver degrades the embedding layers for
/// that call instead of failing.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embedding dimension for the current model.
    fn dimension(&self) -> usize;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}

/// Local ONNX embedding via FastEmbed. Inference runs on the blocking pool.
pub struct FastEmbedProvider {
    model: Arc<FastEmbedModel>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Multilingual default, so "money" and "tiền" land close together.
    pub fn new() -> Result<Self> {
        Self::with_model(EmbeddingModel::MultilingualE5Small)
    }

    /// Resolve a model by its Hugging Face code, e.g. "intfloat/multilingual-e5-base".
    pub fn from_name(name: &str) -> Result<Self> {
        Self::with_model(model_for_name(name)?)
    }

    pub fn with_model(model: EmbeddingModel) -> Result<Self> {
        let init_options = InitOptions::new(model.clone());

        let fastembed_model = FastEmbedModel::try_new(init_options)
            .map_err(|e| TagError::Provider(format!("Failed to initialize FastEmbed: {}", e)))?;

        let model_name = format!("{:?}", model);
        let dimension = match model {
            EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::MultilingualE5Large => 1024,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
            _ => 384,
        };

        Ok(Self {
            model: Arc::new(fastembed_model),
            model_name,
            dimension,
        })
    }
}

/// Model codes accepted by [`FastEmbedProvider::from_name`].
pub const FASTEMBED_MODELS: &[&str] = &[
    "intfloat/multilingual-e5-small",
    "intfloat/multilingual-e5-base",
    "intfloat/multilingual-e5-large",
    "BAAI/bge-small-en-v1.5",
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
];

fn model_for_name(name: &str) -> Result<EmbeddingModel> {
    match name {
        "intfloat/multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        "intfloat/multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
        "intfloat/multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2" => {
            Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        _ => Err(TagError::Validation(format!(
            "Unsupported FastEmbed model {:?}; expected one of: {}",
            name,
            FASTEMBED_MODELS.join(", ")
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = Arc::clone(&self.model);
        let input = text.to_string();

        let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![input], None))
            .await
            .map_err(|e| TagError::Provider(format!("Embedding task failed: {}", e)))?
            .map_err(|e| TagError::Provider(format!("Embedding failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| TagError::Provider("No embedding generated".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
