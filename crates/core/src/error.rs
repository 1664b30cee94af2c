//! Error types for ragbasics.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! generation, and the failure taxonomy of the retrieval pipeline
//! (extraction, embedding, dimension, index availability).

use thiserror::Error;

/// Unified error type for ragbasics.
///
/// All fallible functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never papered over.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// The document adapter could not produce text
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The embedding provider failed, timed out, or returned malformed output
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A vector's length disagrees with the dimension bound to the index
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted index or chunk store is missing, corrupt, or inconsistent
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// A search was attempted against an index with no entries
    #[error("Index is empty: vectorize a source before querying")]
    EmptyIndex,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: index expects 384, got 768"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(err.to_string().contains("gone"));
    }
}
