//! RAG response types.

use crate::types::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Maximum snippet length for source references.
const MAX_SNIPPET_CHARS: usize = 150;

/// A chunk that was handed to the model as context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagSourceRef {
    /// Chunk position in the knowledge base
    pub position: usize,

    /// Squared L2 distance to the query
    pub distance: f32,

    /// Start of the chunk text, truncated with "..."
    pub snippet: String,
}

impl From<&ScoredChunk> for RagSourceRef {
    fn from(scored: &ScoredChunk) -> Self {
        Self {
            position: scored.chunk.position,
            distance: scored.distance,
            snippet: snippet(&scored.chunk.text),
        }
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= MAX_SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Answer to a query, with the context it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Generated answer
    pub answer: String,

    /// Context chunks, closest first
    pub sources: Vec<RagSourceRef>,

    /// Model that produced the answer; `None` when no model was called
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RagResponse {
    /// Fixed answer used when retrieval found nothing.
    pub fn no_information(query: &str) -> Self {
        Self {
            answer: format!(
                "I could not find information about \"{}\" in the available documents.",
                query
            ),
            sources: Vec::new(),
            model: None,
        }
    }
}
