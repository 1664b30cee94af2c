//! Splitting normalized text into retrievable chunks.

use ragbasics_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// How text is split into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Consecutive windows of `max_words` whitespace-delimited words.
    FixedWords { max_words: usize },

    /// Groups of up to `max_sentences` sentences, optionally capped at
    /// `max_chars` characters.
    SentenceBased {
        max_sentences: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_chars: Option<usize>,
    },

    /// Greedy sentence accumulation under a token budget.
    Hybrid { max_tokens: usize },
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::FixedWords { max_words: 512 }
    }
}

impl ChunkStrategy {
    pub fn validate(&self) -> AppResult<()> {
        let zero = match self {
            ChunkStrategy::FixedWords { max_words } => *max_words == 0,
            ChunkStrategy::SentenceBased {
                max_sentences,
                max_chars,
            } => *max_sentences == 0 || *max_chars == Some(0),
            ChunkStrategy::Hybrid { max_tokens } => *max_tokens == 0,
        };

        if zero {
            return Err(AppError::Config(format!(
                "Chunk strategy limits must be greater than zero: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Counts tokens for the hybrid strategy.
pub trait TokenCounter: Send + Sync + std::fmt::Debug {
    fn count(&self, text: &str) -> usize;
}

/// Whitespace-delimited words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    strategy: ChunkStrategy,
    counter: Arc<dyn TokenCounter>,
}

impl Chunker {
    /// Build a chunker, rejecting zero-valued limits.
    pub fn new(strategy: ChunkStrategy) -> AppResult<Self> {
        strategy.validate()?;
        Ok(Self {
            strategy,
            counter: Arc::new(WhitespaceTokenCounter),
        })
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn strategy(&self) -> &ChunkStrategy {
        &self.strategy
    }

    /// Split `text` into chunks in input order. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chunks = match &self.strategy {
            ChunkStrategy::FixedWords { max_words } => chunk_fixed_words(text, *max_words),
            ChunkStrategy::SentenceBased {
                max_sentences,
                max_chars,
            } => chunk_sentences(text, *max_sentences, *max_chars),
            ChunkStrategy::Hybrid { max_tokens } => {
                chunk_hybrid(text, *max_tokens, self.counter.as_ref())
            }
        };

        tracing::debug!(
            "Chunked {} bytes into {} chunks ({:?})",
            text.len(),
            chunks.len(),
            self.strategy
        );

        chunks
    }
}

fn chunk_fixed_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(max_words).map(|w| w.join(" ")).collect()
}

/// Sentences with internal whitespace collapsed; blank ones dropped.
///
/// Line breaks are flattened first. UAX #29 breaks after every newline, and
/// extracted text wraps lines mid-sentence.
fn sentences(text: &str) -> Vec<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.unicode_sentences()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

fn chunk_sentences(text: &str, max_sentences: usize, max_chars: Option<usize>) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_chars = 0;

    for sentence in sentences(text) {
        let len = sentence.chars().count();

        if let Some(limit) = max_chars {
            // +1 for the joining space
            if !current.is_empty() && current_chars + 1 + len > limit {
                chunks.push(current.join(" "));
                current.clear();
                current_chars = 0;
            }
        }

        current_chars += if current.is_empty() { len } else { len + 1 };
        current.push(sentence);

        if current.len() >= max_sentences {
            chunks.push(current.join(" "));
            current.clear();
            current_chars = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

fn chunk_hybrid(text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0;

    for sentence in sentences(text) {
        let tokens = counter.count(&sentence);

        if !current.is_empty() && current_tokens + tokens > max_tokens {
            chunks.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }

        current_tokens += tokens;
        current.push(sentence);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
