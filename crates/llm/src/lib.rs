//! Generation-service boundary for ragbasics.
//!
//! The retrieval core hands a query plus its ranked context to a text
//! completion service and gets one answer back. This crate provides that
//! boundary as a provider-agnostic trait with an Ollama implementation.
//!
//! # Example
//! ```no_run
//! use ragbasics_llm::{LlmClient, LlmRequest, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let context = vec!["Paris is the capital of France.".to_string()];
//! let request = LlmRequest::grounded("What is the capital of France?", &context, "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
