//! Ollama generation client.
//!
//! Talks to the chat endpoint so the system prompt and the grounded user
//! turn travel as separate messages.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use futures::StreamExt;
use ragbasics_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Default, Serialize, PartialEq)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl ChatOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "ChatOptions::is_empty")]
    options: ChatOptions,
}

/// One object of a chat reply. Streaming replies are a sequence of these,
/// one per line, and only the last carries token counts.
#[derive(Debug, Deserialize)]
struct ChatReply {
    model: String,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl ChatReply {
    fn content(&mut self) -> String {
        self.message.take().map(|m| m.content).unwrap_or_default()
    }

    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }

    fn into_chunk(mut self) -> LlmStreamChunk {
        let usage = self.done.then(|| self.usage());
        LlmStreamChunk {
            content: self.content(),
            model: self.model,
            done: self.done,
            usage,
        }
    }
}

/// Ollama generation client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client for the default local endpoint, without a request timeout.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_request(&self, request: &LlmRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            stream,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn post_chat(&self, body: &ChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Ollama unreachable at {}: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "Ollama returned {} for model '{}': {}",
                status,
                body.model,
                detail.trim()
            )));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Split complete lines off the front of `buffer`, leaving any partial line.
fn drain_lines(buffer: &mut String) -> Vec<String> {
    let Some(last_newline) = buffer.rfind('\n') else {
        return Vec::new();
    };
    let rest = buffer.split_off(last_newline + 1);
    let complete = std::mem::replace(buffer, rest);
    complete
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_chunk(line: &str) -> AppResult<LlmStreamChunk> {
    serde_json::from_str::<ChatReply>(line)
        .map(ChatReply::into_chunk)
        .map_err(|e| AppError::Llm(format!("Malformed stream line from Ollama: {}", e)))
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending chat request to Ollama"
        );

        let body = self.chat_request(request, false);
        let mut reply: ChatReply = self
            .post_chat(&body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama reply: {}", e)))?;

        let usage = reply.usage();
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Received reply from Ollama"
        );

        Ok(LlmResponse {
            content: reply.content(),
            model: reply.model,
            usage,
            done: reply.done,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming chat with Ollama");

        let body = self.chat_request(request, true);
        let bytes = self.post_chat(&body).await?.bytes_stream();

        // A JSON line may be split across network reads.
        let stream = bytes
            .scan(String::new(), |buffer, read| {
                let items: Vec<AppResult<LlmStreamChunk>> = match read {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        drain_lines(buffer).iter().map(|l| parse_chunk(l)).collect()
                    }
                    Err(e) => vec![Err(AppError::Llm(format!("Stream error: {}", e)))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}
