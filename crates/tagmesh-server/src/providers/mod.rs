mod openai;

pub use openai::{OpenAiClient, OpenAiEmbeddingProvider, OpenAiTranslator};

use crate::config::{EmbeddingBackend, TagmeshConfig};
use std::sync::Arc;
use std::time::Duration;
use tagmesh_core::{EmbeddingProvider, FastEmbedProvider, Providers};
use tracing::{info, warn};

/// Wire the configured providers. A missing API key disables the remote
/// providers instead of failing: resolution degrades to exact matching and
/// new tags wait for backfill.
pub fn build(config: &TagmeshConfig) -> anyhow::Result<Providers> {
    let timeout = Duration::from_secs(config.resolver.provider_timeout_secs);
    let mut providers = Providers::none(timeout);

    let api_key = config.embedding.resolved_api_key();
    let client = match &api_key {
        Some(key) => {
            let http = reqwest::Client::builder().timeout(timeout).build()?;
            Some(OpenAiClient::new(
                http,
                &config.embedding.resolved_base_url(),
                key.clone(),
            ))
        }
        None => None,
    };

    match config.embedding.provider {
        EmbeddingBackend::OpenAi => match &client {
            Some(client) => {
                let provider = OpenAiEmbeddingProvider::new(
                    client.clone(),
                    config.embedding.model.clone(),
                    config.embedding.dimension,
                );
                info!(
                    "Embedding provider: {} ({} dims)",
                    provider.model_name(),
                    provider.dimension()
                );
                providers = providers.with_embedding(Arc::new(provider));
            }
            None => warn!("No OpenAI API key; embedding disabled, new tags will wait for backfill"),
        },
        EmbeddingBackend::FastEmbed => {
            info!("Loading embedding model {}...", config.embedding.model);
            let provider = FastEmbedProvider::from_name(&config.embedding.model)?;
            if provider.dimension() != config.embedding.dimension {
                warn!(
                    "Configured dimension {} differs from {} ({} dims); using the model's",
                    config.embedding.dimension,
                    provider.model_name(),
                    provider.dimension()
                );
            }
            info!("Embedding model loaded: {}", provider.model_name());
            providers = providers.with_embedding(Arc::new(provider));
        }
        EmbeddingBackend::None => info!("Embedding disabled by config"),
    }

    if config.translation.enabled {
        match client {
            Some(client) => {
                info!("Translation provider: {}", config.translation.model);
                providers = providers
                    .with_translation(Arc::new(OpenAiTranslator::new(client, config.translation.model.clone())));
            }
            None => warn!("No OpenAI API key; translation layer disabled"),
        }
    }

    Ok(providers)
}
