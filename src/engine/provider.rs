use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::context::ContextMessage;
use crate::error::AppError;

use super::ModelProvider;

/// Convert any displayable transport error into `AppError::Upstream`.
fn upstream_err(e: impl std::fmt::Display) -> AppError {
    AppError::Upstream(e.to_string())
}

// ============================================================================
// Request / response types (OpenAI-compatible chat completions)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ContextMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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

// ============================================================================
// OpenAiProvider
// ============================================================================

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: ModelConfig,
}

impl OpenAiProvider {
    /// Create a provider from the given configuration.
    ///
    /// The underlying `reqwest::Client` carries a 30-second timeout so a hung
    /// upstream call cannot block a session indefinitely.
    pub fn new(config: ModelConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn generate_reply(&self, context: &[ContextMessage]) -> Result<String, AppError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: context,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response: ChatCompletionResponse = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream_err)?
            .error_for_status()
            .map_err(upstream_err)?
            .json()
            .await
            .map_err(upstream_err)?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Upstream("Model returned an empty completion".into()))?;

        Ok(reply)
    }
}
