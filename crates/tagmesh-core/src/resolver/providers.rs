use crate::normalize::normalize;
use crate::translate::TranslationProvider;
use crate::types::Embedding;
use crate::vector::EmbeddingProvider;
use std::sync::Arc;
use std::time::Duration;

/// Result of asking the embedding provider for a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Generated(Embedding),
    /// No provider, error, timeout or wrong dimension.
    Unavailable(String),
}

impl EmbeddingOutcome {
    pub fn into_embedding(self) -> Option<Embedding> {
        match self {
            EmbeddingOutcome::Generated(embedding) => Some(embedding),
            EmbeddingOutcome::Unavailable(_) => None,
        }
    }
}

/// Result of asking the translator for an English form.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    /// Normalizes to something other than the input.
    Translated(String),
    /// Empty, or identical to the input after normalization.
    Unchanged,
    Unavailable(String),
}

/// Optional external capabilities, each call bounded by `timeout`.
#[derive(Clone)]
pub struct Providers {
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    translation: Option<Arc<dyn TranslationProvider>>,
    timeout: Duration,
}

impl Providers {
    /// No external capabilities: every resolution takes the fallback path.
    pub fn none(timeout: Duration) -> Self {
        Self {
            embedding: None,
            translation: None,
            timeout,
        }
    }

    pub fn with_embedding(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(provider);
        self
    }

    pub fn with_translation(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.translation = Some(provider);
        self
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn has_translation(&self) -> bool {
        self.translation.is_some()
    }

    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(|p| p.dimension())
    }

    pub async fn embed(&self, text: &str) -> EmbeddingOutcome {
        let Some(provider) = self.embedding.as_ref() else {
            return EmbeddingOutcome::Unavailable("no embedding provider configured".into());
        };

        match tokio::time::timeout(self.timeout, provider.embed(text)).await {
            Err(_) => EmbeddingOutcome::Unavailable(format!(
                "{} timed out after {:?}",
                provider.model_name(),
                self.timeout
            )),
            Ok(Err(e)) => EmbeddingOutcome::Unavailable(e.to_string()),
            Ok(Ok(embedding)) if embedding.len() != provider.dimension() => {
                EmbeddingOutcome::Unavailable(format!(
                    "{} returned {} dimensions, expected {}",
                    provider.model_name(),
                    embedding.len(),
                    provider.dimension()
                ))
            }
            Ok(Ok(embedding)) => EmbeddingOutcome::Generated(embedding),
        }
    }

    pub async fn translate(&self, text: &str) -> TranslationOutcome {
        let Some(provider) = self.translation.as_ref() else {
            return TranslationOutcome::Unavailable("no translation provider configured".into());
        };

        match tokio::time::timeout(self.timeout, provider.translate_to_english(text)).await {
            Err(_) => TranslationOutcome::Unavailable(format!(
                "{} timed out after {:?}",
                provider.name(),
                self.timeout
            )),
            Ok(Err(e)) => TranslationOutcome::Unavailable(e.to_string()),
            Ok(Ok(translated)) => {
                let translated = translated.trim();
                if translated.is_empty() || normalize(translated) == normalize(text) {
                    TranslationOutcome::Unchanged
                } else {
                    TranslationOutcome::Translated(translated.to_string())
                }
            }
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("embedding", &self.embedding.as_ref().map(|p| p.model_name().to_string()))
            .field("translation", &self.translation.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}
