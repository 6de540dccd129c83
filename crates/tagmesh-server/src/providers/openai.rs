//! OpenAI-compatible embedding and chat-completion clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tagmesh_core::{Embedding, EmbeddingProvider, TagError, TranslationProvider};

const TRANSLATION_SYSTEM_PROMPT: &str = "You are an expert terminologist. Translate the input \
into its most standard, professional and academic English equivalent.\n\
Rules:\n\
1. Return ONLY the English term.\n\
2. Prioritize established terminology (e.g. 'Pragmatism' instead of 'Practicalism').\n\
3. Preserve proper nouns.\n\
4. Do not add punctuation or explanations.";

const TRANSLATION_MAX_TOKENS: u32 = 20;

/// Shared HTTP plumbing for one OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> tagmesh_core::Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| TagError::Provider(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TagError::Provider(format!(
                "POST {} returned {}: {}",
                url,
                status,
                detail.trim()
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| TagError::Provider(format!("Malformed response from {}: {}", url, e)))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Embedding,
}

pub struct OpenAiEmbeddingProvider {
    client: OpenAiClient,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(client: OpenAiClient, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> tagmesh_core::Result<Embedding> {
        if text.trim().is_empty() {
            return Err(TagError::InvalidInput("cannot embed empty text".to_string()));
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };
        let response: EmbeddingResponse = self.client.post("embeddings", &request).await?;
        first_embedding(response)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn first_embedding(response: EmbeddingResponse) -> tagmesh_core::Result<Embedding> {
    response
        .data
        .into_iter()
        .next()
        .map(|datum| datum.embedding)
        .filter(|embedding| !embedding.is_empty())
        .ok_or_else(|| TagError::Provider("no embedding data returned".to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiTranslator {
    client: OpenAiClient,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for OpenAiTranslator {
    async fn translate_to_english(&self, text: &str) -> tagmesh_core::Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: TRANSLATION_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            max_tokens: TRANSLATION_MAX_TOKENS,
        };
        let response: ChatResponse = self.client.post("chat/completions", &request).await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TagError::Provider("no translation returned".to_string()))?;
        Ok(clean_term(&reply))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Models occasionally wrap the term in quotes or end it with a period.
fn clean_term(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”'))
        .trim_end_matches('.')
        .trim()
        .to_string()
}
