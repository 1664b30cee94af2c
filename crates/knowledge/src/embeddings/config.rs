//! Embedding configuration types.

use ragbasics_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Expected vector dimension. `None` lets the provider decide on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum number of texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Provider endpoint override (HTTP providers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    60
}

/// Dimension used by the trigram provider when none is configured.
pub const DEFAULT_TRIGRAM_DIMENSIONS: usize = 384;

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: Some(DEFAULT_TRIGRAM_DIMENSIONS),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Check that the settings are usable before any provider is built.
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "embedding batch_size must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::Config(
                "embedding timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.dimensions == Some(0) {
            return Err(AppError::Config(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that vectors produced under `other` may share an index with
    /// vectors produced under `self`.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Config(format!(
                "Provider mismatch: index was built with '{}', active config uses '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Config(format!(
                "Model mismatch: index was built with '{}', active config uses '{}'",
                self.model, other.model
            )));
        }

        if let (Some(expected), Some(actual)) = (self.dimensions, other.dimensions) {
            if expected != actual {
                return Err(AppError::DimensionMismatch { expected, actual });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, Some(384));
        assert!(config.normalize);
        assert_eq!(config.batch_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = EmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_yaml_defaults_fill_in() {
        let config: EmbeddingConfig =
            serde_yaml::from_str("provider: ollama\nmodel: nomic-embed-text\n").unwrap();
        assert_eq!(config.dimensions, None);
        assert_eq!(config.timeout_secs, 60);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_validate_consistency_success() {
        let config = EmbeddingConfig::default();
        assert!(config.validate_consistency(&config.clone()).is_ok());
    }

    #[test]
    fn test_validate_consistency_provider_mismatch() {
        let config1 = EmbeddingConfig::default();
        let config2 = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..config1.clone()
        };

        let result = config1.validate_consistency(&config2);
        assert!(result.unwrap_err().to_string().contains("Provider mismatch"));
    }

    #[test]
    fn test_validate_consistency_dimension_mismatch() {
        let config1 = EmbeddingConfig::default();
        let config2 = EmbeddingConfig {
            dimensions: Some(1536),
            ..config1.clone()
        };

        assert!(matches!(
            config1.validate_consistency(&config2),
            Err(AppError::DimensionMismatch {
                expected: 384,
                actual: 1536
            })
        ));
    }
}
