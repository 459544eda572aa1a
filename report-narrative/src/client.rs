//! Text-generation backend boundary and the OpenAI-compatible HTTP client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use report_core::{BackendError, LlmConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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
}

/// Per-request generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Parameters for single-shot and final synthesis requests.
    pub fn synthesis(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Parameters for per-chunk findings requests.
    pub fn findings(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.chunk.temperature,
            max_tokens: config.chunk.max_tokens,
        }
    }
}

/// A backend that turns a list of messages into a single text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, BackendError>;
}

/// Client for `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    headers: BTreeMap<String, String>,
}

impl OpenAiClient {
    /// Builds a client from config. Fails with [`BackendError::MissingApiKey`]
    /// when neither the config nor the environment carries a key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, BackendError> {
        let api_key = config.resolve_api_key().ok_or(BackendError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            headers: config.headers.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            messages,
        };

        let mut request = self.client.post(&url).bearer_auth(&self.api_key).json(&body);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(model = %params.model, messages = messages.len(), "sending chat completion");
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            tracing::warn!(status = status.as_u16(), "chat completion rejected");
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                BackendError::InvalidResponse("missing choices[0].message.content".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::system("hi");
        let json = serde_json::to_value(&message).expect("Không serialize được message");
        assert_eq!(json, serde_json::json!({"role": "system", "content": "hi"}));
    }

    #[test]
    fn params_follow_config() {
        let config = LlmConfig::default();
        let synthesis = GenerationParams::synthesis(&config);
        let findings = GenerationParams::findings(&config);
        assert_eq!(synthesis.max_tokens, 4000);
        assert_eq!(findings.max_tokens, 2000);
        assert!((findings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(synthesis.model, findings.model);
    }

    #[test]
    fn missing_key_is_reported() {
        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        // Only meaningful when the environment does not provide a key.
        if std::env::var(report_core::API_KEY_ENV).is_err() {
            assert!(matches!(
                OpenAiClient::from_config(&config),
                Err(BackendError::MissingApiKey)
            ));
        }
    }
}
