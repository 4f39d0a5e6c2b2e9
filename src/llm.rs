//! Completion client for an OpenAI-compatible chat API.
//!
//! The call is an opaque request/response boundary: assembled turns in, reply
//! text or a typed failure out. No retries, no streaming.

#[path = "llm_tests.rs"]
mod llm_tests;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default API endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion API configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Overridable so tests can point at a local mock server.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 2000,
            top_p: 0.6,
            frequency_penalty: 0.5,
        }
    }
}

/// Typed completion failure.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("completion response contained no content")]
    Empty,
}

impl CompletionError {
    /// True when the account is out of quota (or hard rate-limited).
    pub fn is_quota(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                code.as_deref() == Some("insufficient_quota") || *status == 429
            }
            _ => false,
        }
    }
}

/// One prompt turn on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Completion API client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Model name, for `/status`.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send the assembled context and return the reply text.
    pub async fn generate_reply(&self, turns: &[ChatTurn]) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: turns,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            frequency_penalty: self.config.frequency_penalty,
        };

        debug!("Sending {} turn(s) to completion API", turns.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error);
            let (code, message) = match parsed {
                Some(e) => (e.code, e.message.unwrap_or(body)),
                None => (None, body),
            };
            return Err(CompletionError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(content)
    }
}
