//! Grounded answer generation.

use crate::rag::types::{RagResponse, RagSourceRef};
use crate::types::ScoredChunk;
use ragbasics_core::{AppError, AppResult};
use ragbasics_llm::{LlmClient, LlmRequest};

const SYSTEM_PROMPT: &str = "You are a knowledge assistant. The user's question is followed by \
passages retrieved from their documents, one per line, most relevant first. Answer using only \
those passages. If they do not contain the answer, say that you could not find it in the \
available documents.";

/// Answer `query` from the retrieved `results`.
///
/// No model call is made when `results` is empty.
pub async fn answer(
    query: &str,
    results: &[ScoredChunk],
    llm: &dyn LlmClient,
    model: &str,
) -> AppResult<RagResponse> {
    if results.is_empty() {
        tracing::info!("No chunks retrieved; skipping generation");
        return Ok(RagResponse::no_information(query));
    }

    let request = build_request(query, results, model);

    tracing::debug!(
        "Generating answer with {} (model: {}, {} context chunks)",
        llm.provider_name(),
        model,
        results.len()
    );

    let response = llm.complete(&request).await.map_err(|e| match e {
        AppError::Llm(msg) => AppError::Llm(msg),
        other => AppError::Llm(other.to_string()),
    })?;

    Ok(RagResponse {
        answer: response.content.trim().to_string(),
        sources: results.iter().map(RagSourceRef::from).collect(),
        model: Some(response.model),
    })
}

/// The query followed by each chunk on its own line.
pub fn build_request(query: &str, results: &[ScoredChunk], model: &str) -> LlmRequest {
    let context: Vec<String> = results.iter().map(|r| r.chunk.text.clone()).collect();
    LlmRequest::grounded(query, &context, model)
        .with_system(SYSTEM_PROMPT)
        .with_temperature(0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use async_trait::async_trait;
    use ragbasics_llm::{LlmResponse, LlmStream, LlmUsage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(LlmResponse {
                content: " Paris. ".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
            Err(AppError::Llm("streaming not supported".to_string()))
        }
    }

    fn scored(position: usize, text: &str) -> ScoredChunk {
        ScoredChunk {
            distance: position as f32,
            chunk: Chunk {
                position,
                text: text.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_answer_builds_grounded_prompt() {
        let client = RecordingClient::default();
        let results = vec![
            scored(3, "Paris is the capital of France."),
            scored(9, "France is in Europe."),
        ];

        let response = answer("Capital of France?", &results, &client, "llama3.2")
            .await
            .unwrap();

        assert_eq!(response.answer, "Paris.");
        assert_eq!(response.model.as_deref(), Some("llama3.2"));
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].position, 3);

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "Capital of France?\nParis is the capital of France.\nFrance is in Europe."
        );
    }

    #[tokio::test]
    async fn test_empty_results_skip_the_model() {
        let client = RecordingClient::default();
        let response = answer("anything", &[], &client, "llama3.2").await.unwrap();

        assert!(response.answer.contains("could not find"));
        assert!(client.prompts.lock().unwrap().is_empty());
    }
}
