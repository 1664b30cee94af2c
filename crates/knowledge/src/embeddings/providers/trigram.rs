//! Trigram embedding provider using character trigram hashing.

use crate::embeddings::provider::EmbeddingProvider;
use ragbasics_core::{AppError, AppResult};
use std::collections::BTreeMap;

/// Words skipped when building content vectors.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings from character trigrams and word
/// frequencies. Not semantically accurate like a neural model, but
/// consistent and content-dependent, which is what indexing and tests need.
#[derive(Debug)]
pub struct TrigramProvider {
    model: String,
    dimensions: usize,
    normalize: bool,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(model: impl Into<String>, dimensions: usize, normalize: bool) -> Self {
        Self {
            model: model.into(),
            dimensions,
            normalize,
        }
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes.iter().fold(0u64, |acc, b| {
            acc.wrapping_mul(multiplier).wrapping_add(*b as u64)
        });
        (hash % self.dimensions as u64) as usize
    }

    fn generate_embedding(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w) && w.chars().count() > 2)
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        // Text made only of short or stop words still gets a non-zero vector
        if word_freq.is_empty() {
            for word in lower.split_whitespace() {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = self.bucket(trigram.as_bytes(), 37);
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = self.bucket(word.as_bytes(), 31);
            embedding[idx] += *freq as f32;
        }

        if self.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| self.generate_embedding(text))
            .collect()
    }
}
