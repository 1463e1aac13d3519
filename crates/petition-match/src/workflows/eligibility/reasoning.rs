//! Client seam for the external reasoning service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::request::EvaluationRequest;
use crate::config::ReasoningConfig;

/// Black-box reasoning call: a rendered request in, free-form text out.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, request: &EvaluationRequest) -> Result<String, ReasoningError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("reasoning service API key is not configured")]
    MissingApiKey,
    #[error("reasoning request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reasoning service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("reasoning service returned an empty completion")]
    EmptyCompletion,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiReasoningClient {
    http: reqwest::Client,
    config: ReasoningConfig,
}

impl OpenAiReasoningClient {
    pub fn new(config: ReasoningConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_http_client(http: reqwest::Client, config: ReasoningConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ReasoningClient for OpenAiReasoningClient {
    async fn complete(&self, request: &EvaluationRequest) -> Result<String, ReasoningError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ReasoningError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        debug!(
            model = %self.config.model,
            prompt_bytes = request.prompt.len(),
            "sending evaluation request"
        );
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "reasoning service responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status { status, body });
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ReasoningError::EmptyCompletion)
    }
}
