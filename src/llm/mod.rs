//! Language-model integration.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint over `reqwest`.
//! One request per call: no retries, no streaming.

pub mod provider;

pub use provider::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role};

use secrecy::ExposeSecret;

use crate::config::LlmConfig;
use crate::error::{ConfigError, LlmError};

/// Chat-completion client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    /// Send one completion request and return the first candidate's
    /// content, trimmed.
    ///
    /// The configured timeout covers the whole exchange, body included.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".into()))?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Language model returned an error");
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
                reason: e.to_string(),
            })?;

        parsed
            .first_content()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    fn request_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            tracing::warn!(timeout_secs = self.config.timeout.as_secs(), "Language model timed out");
            LlmError::Timeout {
                timeout: self.config.timeout,
            }
        } else {
            LlmError::RequestFailed {
                reason: error.to_string(),
            }
        }
    }
}
