//! Ollama embedding provider.
//!
//! Embeds text through a local Ollama server (`/api/embed`) with models like
//! `nomic-embed-text`.
//!
//! # Features
//! - Batched requests (one HTTP call per engine batch)
//! - Dimension discovered by a probe request on first use
//! - Automatic retry with exponential backoff
//!
//! # Example
//! ```no_run
//! use ragbasics_knowledge::embeddings::{EmbeddingConfig, EmbeddingProvider};
//! use ragbasics_knowledge::embeddings::providers::ollama::OllamaProvider;
//!
//! # async fn example() -> ragbasics_core::AppResult<()> {
//! let config = EmbeddingConfig {
//!     provider: "ollama".to_string(),
//!     model: "nomic-embed-text".to_string(),
//!     dimensions: Some(768),
//!     ..Default::default()
//! };
//!
//! let provider = OllamaProvider::new(&config).await?;
//! let embedding = provider.embed("Hello world").await?;
//! assert_eq!(embedding.len(), 768);
//! # Ok(())
//! # }
//! ```

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use ragbasics_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Ollama API endpoint for embeddings
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embed";

/// Maximum attempts per request
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Ollama embedding provider using the local HTTP API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider and probe the server to learn the model's dimension.
    ///
    /// # Errors
    /// * `AppError::Embedding` if Ollama is unreachable, the model is missing,
    ///   or the probed dimension disagrees with a configured one
    pub async fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut provider = Self {
            client,
            base_url,
            model: config.model.clone(),
            dimensions: 0,
        };

        provider.dimensions = provider.probe_dimensions(config.dimensions).await?;
        Ok(provider)
    }

    /// Embed a probe string and bind the dimension the model actually returns.
    #[instrument(skip(self), fields(model = %self.model))]
    async fn probe_dimensions(&self, expected: Option<usize>) -> AppResult<usize> {
        debug!("Probing Ollama at {}", self.base_url);

        let probe = vec!["dimension probe".to_string()];
        let mut embeddings = self.embed_with_retries(&probe).await.map_err(|e| {
            AppError::Embedding(format!(
                "Ollama not available at {} ({}). Ensure Ollama is running and model '{}' is installed. Run: ollama pull {}",
                self.base_url, e, self.model, self.model
            ))
        })?;

        let actual = embeddings.pop().map(|v| v.len()).unwrap_or(0);
        if actual == 0 {
            return Err(AppError::Embedding(format!(
                "Ollama model '{}' returned an empty embedding",
                self.model
            )));
        }

        if let Some(expected) = expected {
            if expected != actual {
                return Err(AppError::Embedding(format!(
                    "Ollama model '{}' returned {} dimensions, configuration expects {}",
                    self.model, actual, expected
                )));
            }
        }

        debug!("Ollama model '{}' ready ({} dimensions)", self.model, actual);
        Ok(actual)
    }

    /// Embed a batch with retry logic
    #[instrument(skip(self, texts), fields(batch = texts.len(), model = %self.model))]
    async fn embed_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;

        loop {
            match self.embed_once(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(e);
                    }

                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_RETRIES, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    /// Embed a batch (no retries)
    async fn embed_once(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);

            return Err(AppError::Embedding(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if body.embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::Embedding(format!(
                "Cannot embed empty text at batch index {}",
                i
            )));
        }

        self.embed_with_retries(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let input = vec!["one".to_string(), "two".to_string()];
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: &input,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"][1], "two");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1], vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_failure() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: None,
            timeout_secs: 1,
            // Reserved port; nothing listens here
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };

        let result = OllamaProvider::new(&config).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }
}
