//! Knowledge base management for ragbasics.
//!
//! Turns PDFs and web pages into a searchable local knowledge base: text is
//! normalized, chunked, embedded and appended to a flat vector index with a
//! position-aligned chunk store. Queries embed the question, search the index
//! and return the closest chunks as context for generation.

pub mod chunk_store;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod normalize;
pub mod progress;
pub mod rag;
pub mod retrieval;
pub mod sources;
pub mod types;
pub mod vector_index;
pub mod vectorize;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunk_store::ChunkStore;
pub use chunker::{ChunkStrategy, Chunker, TokenCounter, WhitespaceTokenCounter};
pub use embeddings::{EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
pub use normalize::{normalize, NormalizeOptions};
pub use progress::{ProgressEvent, ProgressReporter};
pub use retrieval::RetrievalEngine;
pub use types::{
    BaseStats, Chunk, KnowledgeBaseConfig, KnowledgeSource, RetrievalResult, ScoredChunk,
    SourceKind, VectorizeOptions, VectorizeStats,
};
pub use vector_index::{FlatL2Index, VectorIndex};
pub use vectorize::vectorize;

use ragbasics_core::{AppError, AppResult};
use sources::SourceLog;
use std::path::Path;

/// Remove a base's index, chunk store and sources log.
///
/// The base's config.yaml is kept. Cleaning a base that holds nothing is a
/// no-op.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    config::validate_base_name(base_name)?;
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    // Index first: without it the chunk store is just an uncommitted tail.
    for path in [
        config::get_index_path(workspace, base_name),
        config::get_chunks_path(workspace, base_name),
    ] {
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed {:?}", path);
        }
    }

    SourceLog::new(workspace, base_name).clear()?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    config::validate_base_name(base_name)?;

    let base_dir = config::get_base_dir(workspace, base_name);
    if !base_dir.exists() {
        return Err(AppError::IndexUnavailable(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let index_path = config::get_index_path(workspace, base_name);
    let index = FlatL2Index::create_or_open(&index_path)?;
    let store = ChunkStore::open(&config::get_chunks_path(workspace, base_name))?;
    let sources = SourceLog::new(workspace, base_name).list()?;

    let index_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        index_entries: index.len(),
        dimension: index.dimension(),
        store_records: store.len(),
        consistent: index.len() == store.len(),
        sources_count: sources.len(),
        index_size_bytes,
        last_indexed_at: sources.iter().map(|s| s.indexed_at).max(),
    })
}
