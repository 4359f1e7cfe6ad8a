//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::completion::{CompletionClient, CompletionRequest, GenerationError};

#[derive(Debug, Clone)]
pub struct HttpCompletionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`. `/chat/completions` is appended.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Transport-level timeout for a single HTTP request.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: HttpCompletionConfig,
}

impl HttpCompletionClient {
    pub fn new(config: HttpCompletionConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GenerationError::invalid_request(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    #[instrument(
        skip(self, request),
        fields(model = %self.config.model, max_tokens = request.max_tokens),
        err
    )]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.config.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), message));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| {
                GenerationError::validation(format!("unreadable completion response: {e}"))
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::validation("completion response had no content"))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Transient(err.to_string())
    }
}

/// Rate limits and server errors are transient; other statuses are final.
fn classify_status(status: u16, message: String) -> GenerationError {
    match status {
        408 | 429 | 500..=599 => {
            GenerationError::Transient(format!("upstream returned {status}: {message}"))
        }
        _ => GenerationError::Rejected { status, message },
    }
}
