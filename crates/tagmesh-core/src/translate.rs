use crate::error::Result;
use async_trait::async_trait;

/// Best-effort translation of a tag to English.
///
/// An error or an empty string means "skip the translation layer".
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate_to_english(&self, text: &str) -> Result<String>;

    /// Model or service identifier, for logs.
    fn name(&self) -> &str;
}
