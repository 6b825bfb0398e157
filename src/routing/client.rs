//! Model invocation.
//!
//! `ModelInvoker` is the seam through which the core asks a backend for text.
//! The core never talks to a model directly; it is handed an invoker at
//! construction time. `HttpModelBackend` is the stock implementation for
//! OpenAI-compatible endpoints (Ollama, llama.cpp server, vLLM).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::errors::RoutingError;
use super::types::{GenerationConfig, ModelDescriptor};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for a single completion.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Contract ────────────────────────────────────────────────────────────────

/// Produces text from a backend model.
///
/// Implementations report transport problems as `BackendUnavailable` and
/// missed deadlines as `Timeout`; both are fed back into the model's
/// performance statistics by the router.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, RoutingError>;
}

// ─── Wire Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── HttpModelBackend ────────────────────────────────────────────────────────

/// `ModelInvoker` for OpenAI Chat Completions compatible endpoints.
///
/// Uses the descriptor's `base_url` and `model_id` (falling back to the
/// descriptor name).
pub struct HttpModelBackend {
    http: HttpClient,
    request_timeout: Duration,
}

impl HttpModelBackend {
    pub fn new() -> Result<Self, RoutingError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(request_timeout: Duration) -> Result<Self, RoutingError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| RoutingError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            request_timeout,
        })
    }
}

#[async_trait]
impl ModelInvoker for HttpModelBackend {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, RoutingError> {
        let base_url = model
            .base_url
            .as_deref()
            .ok_or_else(|| RoutingError::ConfigError {
                reason: format!("model '{}' has no base_url", model.name),
            })?;
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let body = ChatCompletionRequest {
            model: model.model_id.as_deref().unwrap_or(&model.name),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: false,
        };

        tracing::info!(
            url = %url,
            model = %body.model,
            prompt_len = prompt.len(),
            max_tokens = body.max_tokens,
            "model request"
        );

        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                RoutingError::Timeout {
                    model: model.name.clone(),
                    duration_ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                RoutingError::BackendUnavailable {
                    model: model.name.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| RoutingError::BackendUnavailable {
                model: model.name.clone(),
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(RoutingError::BackendUnavailable {
                model: model.name.clone(),
                reason: format!("HTTP {}: {body_text}", status.as_u16()),
            });
        }

        parse_completion_body(&model.name, &body_text)
    }
}

/// Extract the first choice's text from a non-streaming completion body.
fn parse_completion_body(model: &str, body: &str) -> Result<String, RoutingError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::BackendUnavailable {
            model: model.to_string(),
            reason: format!("malformed completion response: {e}"),
        })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RoutingError::BackendUnavailable {
            model: model.to_string(),
            reason: "completion response contained no text".to_string(),
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::Specialization;

    #[test]
    fn parses_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Gears mesh."}}]}"#;
        assert_eq!(parse_completion_body("m", body).unwrap(), "Gears mesh.");
    }

    #[test]
    fn empty_choices_is_backend_error() {
        let err = parse_completion_body("m", r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, RoutingError::BackendUnavailable { .. }));
    }

    #[test]
    fn malformed_body_is_backend_error() {
        let err = parse_completion_body("m", "<html>").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn request_serializes_openai_shape() {
        let body = ChatCompletionRequest {
            model: "llama3",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
            max_tokens: 64,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn missing_base_url_is_config_error() {
        let backend = HttpModelBackend::new().unwrap();
        let model = ModelDescriptor::new("local", "ollama", Specialization::Chat, 100);
        let err = backend
            .invoke(&model, "hi", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::ConfigError { .. }));
    }
}
