//! Chat completion client for OpenAI-compatible endpoints
//!
//! Low-level HTTP client used by the analyzer and generator agents. One call
//! per invocation; retry policy lives in the agent layer, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::errors::LlmError;

/// Message role for chat completion requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Structured-output text generation capability.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a conversation and return the raw completion text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// HTTP client for OpenAI-compatible chat completion APIs
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (default: https://api.openai.com/v1)
    /// * `api_key` - Bearer token
    /// * `model` - Model name (e.g., "gpt-4o-mini")
    pub fn new(base_url: Option<String>, api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0,
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
