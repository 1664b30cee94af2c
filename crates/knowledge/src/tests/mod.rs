//! Crate-level scenarios spanning several modules.


use crate::embeddings::{EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
use crate::extract::ExtractedDocument;
use async_trait::async_trait;
use ragbasics_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Trigram engine with a small dimension.
pub(crate) fn trigram_engine(dimensions: usize) -> EmbeddingEngine {
    EmbeddingEngine::new(EmbeddingConfig {
        dimensions: Some(dimensions),
        ..Default::default()
    })
    .unwrap()
}

pub(crate) fn document(source: &str, text: &str) -> ExtractedDocument {
    ExtractedDocument {
        source: source.to_string(),
        text: text.to_string(),
    }
}

/// Succeeds for the first `fail_on_call - 1` batches, then errors.
#[derive(Debug)]
pub(crate) struct FlakyProvider {
    calls: AtomicUsize,
    fail_on_call: usize,
}

impl FlakyProvider {
    pub(crate) fn new(fail_on_call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        4
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_on_call {
            return Err(AppError::Embedding("quota exceeded".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 1.0, 0.0, 0.0])
            .collect())
    }
}

pub(crate) fn flaky_engine(provider: Arc<FlakyProvider>, batch_size: usize) -> EmbeddingEngine {
    let config = EmbeddingConfig {
        dimensions: Some(4),
        batch_size,
        ..Default::default()
    };
    EmbeddingEngine::with_provider(config, provider).unwrap()
}
