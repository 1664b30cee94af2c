//! Query-time retrieval: embed, search, resolve chunk text.

use crate::chunk_store::ChunkStore;
use crate::config::{get_chunks_path, get_index_path};
use crate::embeddings::EmbeddingEngine;
use crate::types::{RetrievalResult, ScoredChunk};
use crate::vector_index::{FlatL2Index, VectorIndex};
use ragbasics_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Read-only view over one knowledge base.
pub struct RetrievalEngine<I: VectorIndex = FlatL2Index> {
    index: I,
    store: ChunkStore,
    embedder: Arc<EmbeddingEngine>,
}

impl RetrievalEngine<FlatL2Index> {
    /// Open a base for querying. Both the index and chunk store must exist.
    pub fn open(
        workspace: &Path,
        base_name: &str,
        embedder: Arc<EmbeddingEngine>,
    ) -> AppResult<Self> {
        let index = FlatL2Index::open_existing(&get_index_path(workspace, base_name))?;
        let store = ChunkStore::open_existing(&get_chunks_path(workspace, base_name))?;
        Ok(Self::new(index, store, embedder))
    }
}

impl<I: VectorIndex> RetrievalEngine<I> {
    pub fn new(index: I, store: ChunkStore, embedder: Arc<EmbeddingEngine>) -> Self {
        if index.len() != store.len() {
            tracing::warn!(
                "Index has {} entries but chunk store has {} records; results past the store are dropped",
                index.len(),
                store.len()
            );
        }
        Self {
            index,
            store,
            embedder,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// The `top_k` chunks closest to `query`, closest first.
    ///
    /// Index hits with no chunk store record are dropped, so the result may be
    /// shorter than `top_k`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<RetrievalResult> {
        if top_k == 0 {
            return Err(AppError::Config("top_k must be greater than zero".to_string()));
        }
        if self.index.is_empty() {
            return Err(AppError::EmptyIndex);
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&query_vector, top_k)?;

        let positions: Vec<usize> = hits.iter().map(|(position, _)| *position).collect();
        let mut resolved: HashMap<usize, _> = self
            .store
            .get(&positions)
            .into_iter()
            .map(|chunk| (chunk.position, chunk))
            .collect();

        let results: RetrievalResult = hits
            .into_iter()
            .filter_map(|(position, distance)| {
                resolved
                    .remove(&position)
                    .map(|chunk| ScoredChunk { distance, chunk })
            })
            .collect();

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            results.len(),
            top_k
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Maps "a", "b", "c" to fixed 2-d points.
    #[derive(Debug)]
    struct LetterProvider;

    #[async_trait]
    impl EmbeddingProvider for LetterProvider {
        fn provider_name(&self) -> &str {
            "letters"
        }
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "a" => vec![0.0, 0.0],
                    "b" => vec![1.0, 0.0],
                    _ => vec![0.0, 2.0],
                })
                .collect())
        }
    }

    fn embedder() -> Arc<EmbeddingEngine> {
        let engine =
            EmbeddingEngine::with_provider(EmbeddingConfig::default(), Arc::new(LetterProvider));
        Arc::new(engine.unwrap())
    }

    fn build(temp: &TempDir, records: &[&str]) -> RetrievalEngine {
        let mut index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        index
            .add(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]])
            .unwrap();
        let mut store = ChunkStore::open(&temp.path().join("chunks.txt")).unwrap();
        let records: Vec<String> = records.iter().map(|s| s.to_string()).collect();
        store.append(&records).unwrap();
        RetrievalEngine::new(index, store, embedder())
    }

    #[tokio::test]
    async fn test_results_ordered_by_distance() {
        let temp = TempDir::new().unwrap();
        let engine = build(&temp, &["zero", "one", "two"]);

        let results = engine.retrieve("b", 5).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "zero", "two"]);
        assert_eq!(results[0].distance, 0.0);
        assert_eq!(results[0].chunk.position, 1);
    }

    #[tokio::test]
    async fn test_shorter_store_drops_unresolved_hits() {
        let temp = TempDir::new().unwrap();
        let engine = build(&temp, &["zero", "one"]);

        let results = engine.retrieve("c", 3).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.chunk.position < 2));
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_zero_top_k_is_config_error() {
        let temp = TempDir::new().unwrap();
        let engine = build(&temp, &["zero", "one", "two"]);
        assert!(matches!(
            engine.retrieve("a", 0).await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_index() {
        let temp = TempDir::new().unwrap();
        let index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        let store = ChunkStore::open(&temp.path().join("chunks.txt")).unwrap();
        let engine = RetrievalEngine::new(index, store, embedder());

        assert!(matches!(
            engine.retrieve("a", 1).await,
            Err(AppError::EmptyIndex)
        ));
    }

    #[test]
    fn test_open_missing_base() {
        let temp = TempDir::new().unwrap();
        let result = RetrievalEngine::open(temp.path(), "nothing", embedder());
        assert!(matches!(result, Err(AppError::IndexUnavailable(_))));
    }
}
