//! Knowledge system type definitions.

use crate::chunker::ChunkStrategy;
use crate::embeddings::EmbeddingConfig;
use crate::normalize::NormalizeOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    /// How extracted text is split into chunks
    #[serde(default)]
    pub chunking: ChunkStrategy,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Normalization applied to PDF text
    #[serde(default = "NormalizeOptions::pdf")]
    pub pdf: NormalizeOptions,

    /// Normalization applied to website text
    #[serde(default = "NormalizeOptions::website")]
    pub website: NormalizeOptions,

    /// Number of chunks retrieved per query when not overridden
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            chunking: ChunkStrategy::default(),
            embedding: EmbeddingConfig::default(),
            pdf: NormalizeOptions::pdf(),
            website: NormalizeOptions::website(),
            top_k: default_top_k(),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Normalization profile for a source kind.
    pub fn normalize_options(&self, kind: SourceKind) -> &NormalizeOptions {
        match kind {
            SourceKind::Pdf => &self.pdf,
            SourceKind::Website => &self.website,
        }
    }
}

/// Kind of document a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Website,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Pdf => write!(f, "pdf"),
            SourceKind::Website => write!(f, "website"),
        }
    }
}

/// A stored chunk. `position` is its line in the chunk store and its entry
/// in the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub position: usize,
    pub text: String,
}

/// A retrieved chunk with its squared L2 distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub distance: f32,
    pub chunk: Chunk,
}

/// Retrieved chunks, closest first.
pub type RetrievalResult = Vec<ScoredChunk>;

/// One vectorized source (a line in sources.jsonl).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSource {
    /// File path or URL
    pub source: String,

    pub kind: SourceKind,

    /// When this source was indexed
    pub indexed_at: DateTime<Utc>,

    /// Position of the first chunk this source contributed
    pub first_position: usize,

    /// Number of chunks created from this source
    pub chunk_count: usize,

    /// Extracted text size in bytes
    pub byte_count: u64,
}

/// Options for the vectorize operation.
#[derive(Debug, Clone)]
pub struct VectorizeOptions {
    /// Knowledge base name
    pub base_name: String,

    pub kind: SourceKind,

    /// PDF file or directory path, or website URL
    pub source: String,
}

/// Statistics from a vectorize operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeStats {
    /// Number of documents extracted
    pub documents_count: usize,

    /// Number of chunks appended
    pub chunks_count: usize,

    /// Position of the first appended chunk
    pub first_position: usize,

    /// Index entries after the commit
    pub index_len: usize,

    /// Total extracted bytes
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    /// Base name
    pub base_name: String,

    /// Number of index entries
    pub index_entries: usize,

    /// Bound vector dimension
    pub dimension: Option<usize>,

    /// Number of chunk store records
    pub store_records: usize,

    /// Whether index and chunk store have the same length
    pub consistent: bool,

    /// Number of vectorized sources
    pub sources_count: usize,

    /// Index file size in bytes
    pub index_size_bytes: u64,

    /// Last vectorize timestamp
    pub last_indexed_at: Option<DateTime<Utc>>,
}
