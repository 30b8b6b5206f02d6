//! Ollama API client
//!
//! Provides chat completion and embeddings against a local Ollama server:
//! - Chat: POST /api/chat (non-streaming)
//! - Embeddings: POST /api/embed
//!
//! HTTP status codes are mapped onto the transient error classes so the
//! retry wrappers can tell rate limits and outages from permanent failures.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Embedder, GenerationBackend};
use crate::errors::{QaError, Result};
use crate::types::{ChatMessage, Generation, TokenUsage};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default chat model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Request timeout (60 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Which backend call failed, for error mapping
#[derive(Debug, Clone, Copy)]
enum CallKind {
    Chat,
    Embed,
}

/// Ollama chat + embedding client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    embed_model: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create new Ollama client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, DEFAULT_EMBED_MODEL)
    }

    /// Create Ollama client with custom configuration
    pub fn with_config(base_url: &str, model: &str, embed_model: &str) -> Result<Self> {
        Self::with_timeout(base_url, model, embed_model, REQUEST_TIMEOUT)
    }

    /// Create Ollama client with an explicit request timeout
    pub fn with_timeout(
        base_url: &str,
        model: &str,
        embed_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(QaError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            embed_model: embed_model.to_string(),
            timeout,
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Get current chat model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get embedding model name
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, err: reqwest::Error, kind: CallKind) -> QaError {
        if err.is_timeout() {
            return QaError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            };
        }
        if err.is_connect() {
            return QaError::Unavailable(format!("cannot reach Ollama at {}: {}", self.base_url, err));
        }
        match kind {
            CallKind::Chat => QaError::Generation(format!("Failed to send request: {}", err)),
            CallKind::Embed => QaError::RetrievalBackend(format!("Failed to send request: {}", err)),
        }
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req, kind: CallKind) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, kind))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &error_text, kind, self.timeout));
        }

        response.json::<Resp>().await.map_err(|e| match kind {
            CallKind::Chat => QaError::Generation(format!("Failed to parse response: {}", e)),
            CallKind::Embed => QaError::RetrievalBackend(format!("Failed to parse response: {}", e)),
        })
    }
}

/// Map a non-success status onto the error taxonomy
fn status_error(status: StatusCode, body: &str, kind: CallKind, timeout: Duration) -> QaError {
    let detail = format!("HTTP {}: {}", status, body);
    match status.as_u16() {
        429 => QaError::RateLimited(detail),
        408 | 504 => QaError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        },
        502 | 503 => QaError::Unavailable(detail),
        _ => match kind {
            CallKind::Chat => QaError::Generation(detail),
            CallKind::Embed => QaError::RetrievalBackend(detail),
        },
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Generation> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let response: OllamaChatResponse = self.post_json("/api/chat", &request, CallKind::Chat).await?;

        // Ollama reports counts only when it evaluated the prompt
        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        };

        Ok(Generation {
            content: response.message.content,
            usage,
        })
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OllamaEmbedRequest {
            model: &self.embed_model,
            input: texts,
        };

        let response: OllamaEmbedResponse = self.post_json("/api/embed", &request, CallKind::Embed).await?;

        if response.embeddings.len() != texts.len() {
            return Err(QaError::RetrievalBackend(format!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat response
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama embed request
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Ollama embed response
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
