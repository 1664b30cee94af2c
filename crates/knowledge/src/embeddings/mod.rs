//! Embedding engine for knowledge bases.
//!
//! One `EmbeddingEngine` exists per process. It is built from configuration
//! without touching the model; the provider is created on the first call to
//! [`EmbeddingEngine::embed`] and reused afterwards.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use ragbasics_core::{AppError, AppResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

static GLOBAL_ENGINE: Mutex<Option<Arc<EmbeddingEngine>>> = Mutex::new(None);

/// Lazily-initialised, shareable embedding engine.
#[derive(Debug)]
pub struct EmbeddingEngine {
    config: EmbeddingConfig,
    provider: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingEngine {
    /// Create an engine. No provider is built until the first embedding.
    pub fn new(config: EmbeddingConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider: OnceCell::new(),
        })
    }

    /// Create an engine around an already-built provider.
    pub fn with_provider(
        config: EmbeddingConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider: OnceCell::new_with(Some(provider)),
        })
    }

    /// Install `engine` as the process-wide instance, replacing any previous one.
    pub fn install(engine: Arc<EmbeddingEngine>) {
        let mut slot = GLOBAL_ENGINE.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(engine);
    }

    /// The process-wide instance, if one was installed.
    pub fn global() -> AppResult<Arc<EmbeddingEngine>> {
        let slot = GLOBAL_ENGINE.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone().ok_or_else(|| {
            AppError::Embedding("Embedding engine has not been installed".to_string())
        })
    }

    /// Drop the process-wide instance. The provider is released once the
    /// last outstanding handle goes away.
    pub fn shutdown() {
        let mut slot = GLOBAL_ENGINE.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            debug!("Embedding engine released");
        }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Whether the provider has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.provider.initialized()
    }

    /// Vector dimension, building the provider if needed.
    pub async fn dimensions(&self) -> AppResult<usize> {
        Ok(self.provider().await?.dimensions())
    }

    /// Get the provider, creating it on first use.
    async fn provider(&self) -> AppResult<Arc<dyn EmbeddingProvider>> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                info!(
                    "Initializing embedding provider '{}' (model: {})",
                    self.config.provider, self.config.model
                );
                let timeout = Duration::from_secs(self.config.timeout_secs);
                match tokio::time::timeout(timeout, create_provider(&self.config)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Embedding(format!(
                        "Embedding provider '{}' did not initialize within {}s",
                        self.config.provider, self.config.timeout_secs
                    ))),
                }
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    /// Embed `texts`, returning one vector per text in input order.
    ///
    /// Calls the provider in batches of `batch_size`, each under the
    /// configured timeout. Every vector is checked for count, dimension and
    /// finiteness; any problem is an `AppError::Embedding`.
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::Embedding(format!(
                "Cannot embed empty text at position {}",
                i
            )));
        }

        let provider = self.provider().await?;
        let dimensions = provider.dimensions();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        debug!(
            "Embedding {} texts with '{}' (model: {}, batch size: {})",
            texts.len(),
            provider.provider_name(),
            provider.model_name(),
            self.config.batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let vectors = match tokio::time::timeout(timeout, provider.embed_batch(batch)).await {
                Ok(Ok(vectors)) => vectors,
                Ok(Err(AppError::Embedding(msg))) => return Err(AppError::Embedding(msg)),
                Ok(Err(e)) => return Err(AppError::Embedding(e.to_string())),
                Err(_) => {
                    return Err(AppError::Embedding(format!(
                        "Embedding call timed out after {}s",
                        self.config.timeout_secs
                    )))
                }
            };

            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in &vectors {
                if vector.len() != dimensions {
                    return Err(AppError::Embedding(format!(
                        "Provider returned a vector of dimension {}, expected {}",
                        vector.len(),
                        dimensions
                    )));
                }
                if vector.iter().any(|x| !x.is_finite()) {
                    return Err(AppError::Embedding(
                        "Provider returned a non-finite vector component".to_string(),
                    ));
                }
            }

            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned for query".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn provider_name(&self) -> &str {
            "short"
        }
        fn model_name(&self) -> &str {
            "short"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 2.0]).collect())
        }
    }

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn provider_name(&self) -> &str {
            "counting"
        }
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[derive(Debug)]
    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn provider_name(&self) -> &str {
            "slow"
        }
        fn model_name(&self) -> &str {
            "slow"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    #[test]
    fn test_construction_is_lazy() {
        let engine = EmbeddingEngine::new(EmbeddingConfig::default()).unwrap();
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_trigram_engine_embeds() {
        let engine = EmbeddingEngine::new(EmbeddingConfig::default()).unwrap();
        let texts = vec!["hello world".to_string(), "test embedding".to_string()];

        let embeddings = engine.embed(&texts).await.unwrap();

        assert!(engine.is_initialized());
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);
        assert_eq!(engine.dimensions().await.unwrap(), 384);
    }

    #[tokio::test]
    async fn test_batches_follow_batch_size() {
        let provider = Arc::new(CountingProvider::default());
        let config = EmbeddingConfig {
            batch_size: 2,
            ..Default::default()
        };
        let engine = EmbeddingEngine::with_provider(config, provider.clone()).unwrap();

        let texts: Vec<String> = (0..5).map(|i| format!("text {}", i)).collect();
        let embeddings = engine.embed(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_embedding_failure() {
        let engine =
            EmbeddingEngine::with_provider(EmbeddingConfig::default(), Arc::new(ShortProvider))
                .unwrap();

        let result = engine.embed(&["hello".to_string()]).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let engine = EmbeddingEngine::new(EmbeddingConfig::default()).unwrap();
        let result = engine.embed(&["ok".to_string(), "   ".to_string()]).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_embedding_failure() {
        let config = EmbeddingConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let engine = EmbeddingEngine::with_provider(config, Arc::new(SlowProvider)).unwrap();

        let result = engine.embed(&["hello".to_string()]).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = Arc::new(CountingProvider::default());
        let engine =
            EmbeddingEngine::with_provider(EmbeddingConfig::default(), provider.clone()).unwrap();

        assert!(engine.embed(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_global_install_and_shutdown() {
        let engine = Arc::new(EmbeddingEngine::new(EmbeddingConfig::default()).unwrap());
        EmbeddingEngine::install(Arc::clone(&engine));

        let global = EmbeddingEngine::global().unwrap();
        assert!(Arc::ptr_eq(&engine, &global));

        EmbeddingEngine::shutdown();
        assert!(EmbeddingEngine::global().is_err());
    }
}
