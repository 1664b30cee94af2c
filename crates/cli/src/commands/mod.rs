//! Command handlers for the ragbasics CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod clean;
pub mod query;
pub mod stats;
pub mod vectorize;

// Re-export command types for convenience
pub use clean::CleanCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;
pub use vectorize::VectorizeCommand;

use ragbasics_core::AppResult;
use ragbasics_knowledge::config::load_config;
use ragbasics_knowledge::{EmbeddingEngine, KnowledgeBaseConfig};
use std::path::Path;
use std::sync::Arc;

/// Load a base's config and install the process-wide embedding engine for it.
///
/// Handlers fetch the engine back with [`EmbeddingEngine::global`]; `main`
/// releases it with [`EmbeddingEngine::shutdown`]. The engine does not touch
/// the embedding model until the first embedding.
pub fn install_engine(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let kb_config = load_config(workspace, base_name)?;
    let engine = EmbeddingEngine::new(kb_config.embedding.clone())?;
    EmbeddingEngine::install(Arc::new(engine));

    tracing::debug!(
        "Embedding engine installed (provider: {}, model: {})",
        kb_config.embedding.provider,
        kb_config.embedding.model
    );

    Ok(kb_config)
}

/// Render a serializable value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
