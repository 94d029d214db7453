//! Reasoning service client
//!
//! The service is an opaque collaborator: it receives a prompt and returns
//! text. [`AnthropicClient`] talks to the Anthropic messages API; tests
//! substitute scripted clients through the [`ReasoningClient`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PredictError;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Default messages API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// API version header value
pub const API_VERSION: &str = "2023-06-01";

/// Client failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Request could not be sent or the connection failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("undecodable response: {0}")]
    Decode(String),

    /// Response carried no text
    #[error("response contained no text")]
    EmptyResponse,
}

impl From<ClientError> for PredictError {
    fn from(err: ClientError) -> Self {
        PredictError::unavailable(err.to_string())
    }
}

/// Secret API key; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read key from an environment variable; empty values count as absent
    #[must_use]
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self)
    }

    /// Key material, for the request header only
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    /// User prompt
    pub prompt: String,
    /// Response token budget
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Prompt-in, text-out reasoning service
#[async_trait]
pub trait ReasoningClient: Send + Sync + Debug {
    /// Send a prompt and return the response text
    ///
    /// # Errors
    /// Returns error on transport failure, non-success status, or an
    /// empty response
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ClientError>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

/// Complete with a deadline
///
/// # Errors
/// Returns `Unavailable` on timeout or client failure
pub async fn complete_within(
    client: &dyn ReasoningClient,
    request: &ReasoningRequest,
    timeout: Duration,
) -> Result<String, PredictError> {
    match tokio::time::timeout(timeout, client.complete(request)).await {
        Ok(result) => result.map_err(PredictError::from),
        Err(_) => Err(PredictError::unavailable(format!(
            "reasoning service timed out after {}s",
            timeout.as_secs_f64()
        ))),
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API client
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: ApiKey,
}

impl AnthropicClient {
    /// Create client for the default endpoint and model
    #[must_use]
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        }
    }

    /// Use a different endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Share as a trait object
    #[inline]
    #[must_use]
    pub fn shared(self) -> Arc<dyn ReasoningClient> {
        Arc::new(self)
    }
}

#[async_trait]
impl ReasoningClient for AnthropicClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ClientError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            prompt_len = request.prompt.len(),
            "Sending reasoning request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        first_text(decoded)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn first_text(response: MessagesResponse) -> Result<String, ClientError> {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .find_map(|block| block.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ClientError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_redacted() {
        let key = ApiKey::new("sk-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
        assert_eq!(key.expose(), "sk-secret");
    }

    #[test]
    fn request_body_shape() {
        let body = MessagesRequest {
            model: "m",
            max_tokens: 4096,
            temperature: 0.5,
            messages: [Message {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["max_tokens"], 4096);
    }

    #[test]
    fn extracts_first_text_block() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"id":"x","content":[{"type":"tool_use","id":"t"},{"type":"text","text":"{}"}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(response).unwrap(), "{}");

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(first_text(empty), Err(ClientError::EmptyResponse)));
    }

    #[derive(Debug)]
    struct Slow;

    #[async_trait]
    impl ReasoningClient for Slow {
        async fn complete(&self, _: &ReasoningRequest) -> Result<String, ClientError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_unavailable() {
        let request = ReasoningRequest {
            prompt: "p".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };
        let err = complete_within(&Slow, &request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictError::Unavailable { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
