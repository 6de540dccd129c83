use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagmesh_core::{ResolverConfig, FASTEMBED_MODELS};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Contents of `tagmesh.toml`. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagmeshConfig {
    pub server: ServerConfig,
    pub resolver: ResolverSection,
    pub embedding: EmbeddingConfig,
    pub translation: TranslationConfig,
    pub backfill: BackfillConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 9092)),
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub auto_merge_distance: f32,
    pub provider_timeout_secs: u64,
    pub search_limit: usize,
    pub index_rebuild_after: usize,
}

impl Default for ResolverSection {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            auto_merge_distance: defaults.auto_merge_distance,
            provider_timeout_secs: defaults.provider_timeout.as_secs(),
            search_limit: defaults.search_limit,
            index_rebuild_after: defaults.index_rebuild_after,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAi,
    FastEmbed,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub model: String,
    pub dimension: usize,
    pub base_url: Option<String>,
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
    }
}

/// Translation shares the embedding section's endpoint and key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    pub model: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// 0 disables the background task.
    pub interval_secs: u64,
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            batch_size: 100,
        }
    }
}

impl TagmeshConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Missing file means defaults. A file that fails to parse is reported
    /// and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("tags.redb")
    }

    pub fn to_resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new()
            .with_auto_merge_distance(self.resolver.auto_merge_distance)
            .with_provider_timeout(Duration::from_secs(self.resolver.provider_timeout_secs))
            .with_search_limit(self.resolver.search_limit)
            .with_translation(self.translation.enabled)
            .with_index_rebuild_after(self.resolver.index_rebuild_after)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.to_resolver_config().validate() {
            errors.push(format!("[resolver] {}", e));
        }
        if self.embedding.provider != EmbeddingBackend::None {
            if self.embedding.model.trim().is_empty() {
                errors.push("[embedding] model must not be empty".to_string());
            }
            if self.embedding.dimension == 0 {
                errors.push("[embedding] dimension must be greater than 0".to_string());
            }
        }
        if self.embedding.provider == EmbeddingBackend::FastEmbed
            && !FASTEMBED_MODELS.contains(&self.embedding.model.as_str())
        {
            errors.push(format!(
                "[embedding] fastembed model {:?} is not supported; use one of: {}",
                self.embedding.model,
                FASTEMBED_MODELS.join(", ")
            ));
        }
        let base_url = self.embedding.resolved_base_url();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            errors.push(format!("[embedding] base_url must be an http(s) URL, got {:?}", base_url));
        }
        if self.translation.enabled && self.translation.model.trim().is_empty() {
            errors.push("[translation] model must not be empty when enabled".to_string());
        }
        if self.backfill.interval_secs > 0 && self.backfill.batch_size == 0 {
            errors.push("[backfill] batch_size must be greater than 0".to_string());
        }

        errors
    }
}
