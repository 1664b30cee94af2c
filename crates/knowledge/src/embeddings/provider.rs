//! Embedding provider trait and factory.

use crate::embeddings::config::{EmbeddingConfig, DEFAULT_TRIGRAM_DIMENSIONS};
use crate::embeddings::providers::{ollama::OllamaProvider, trigram::TrigramProvider};
use ragbasics_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// `embed_batch` returns one vector per input, in input order, each of
/// length `dimensions()`. The engine checks both before anything is
/// persisted.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// HTTP providers contact their service here, so this is only called when
/// the first embedding is actually needed.
pub async fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.provider.as_str() {
        "trigram" => {
            let dimensions = config.dimensions.unwrap_or(DEFAULT_TRIGRAM_DIMENSIONS);
            Ok(Arc::new(TrigramProvider::new(
                config.model.clone(),
                dimensions,
                config.normalize,
            )))
        }

        "ollama" => {
            let provider = OllamaProvider::new(config).await?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_trigram_provider() {
        let config = EmbeddingConfig {
            dimensions: Some(128),
            ..Default::default()
        };

        let provider = create_provider(&config).await.unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 128);
    }

    #[tokio::test]
    async fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::default()).await.unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
