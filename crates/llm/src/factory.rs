//! Generation client factory.
//!
//! Resolves a provider name from configuration into a ready client.

use crate::client::LlmClient;
use crate::providers::ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
use ragbasics_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Request timeout applied to generation clients built by the factory.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create a generation client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, and
/// `AppError::Llm` if the HTTP client cannot be built.
pub fn create_client(provider: &str, endpoint: Option<&str>) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client =
                OllamaClient::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
            tracing::debug!("Created Ollama generation client at {}", client.base_url());
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!(
            "Unknown generation provider: {}",
            provider
        ))),
    }
}
