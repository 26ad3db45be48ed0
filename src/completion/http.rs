//! HTTP implementation of the completion client
//!
//! Speaks the OpenAI-compatible chat-completions wire format: a single user
//! message in, `choices[0].message.content` out.

use super::CompletionClient;
use crate::config::CompletionConfig;
use crate::error::{ChatResult, ChatlineError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Request body sent to the completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Model name
    pub model: String,
    /// Conversation turns; the client always sends one user message
    pub messages: Vec<WireMessage>,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
    /// Always false; streaming is not supported
    pub stream: bool,
}

/// A single role/content pair on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Response body from the completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Reply text at `choices[0].message.content`
    pub fn reply_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }
}

/// Completion client that POSTs to a chat-completions endpoint
pub struct HttpCompletionClient {
    client: Client,
    config: CompletionConfig,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, model, token limit and timeout
    /// * `api_key` - Bearer key, omitted from requests when `None`
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Config` if the HTTP client fails to build
    pub fn new(config: CompletionConfig, api_key: Option<String>) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("chatline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatlineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized completion client: endpoint={}, model={}, authenticated={}",
            config.endpoint,
            config.model,
            api_key.is_some()
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Build the request body for a prompt
    pub fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            stream: false,
        }
    }

    async fn send_request(&self, prompt: &str) -> ChatResult<String> {
        let body = self.build_request(prompt);
        tracing::debug!(
            "Sending completion request: model={}, prompt_chars={}",
            body.model,
            prompt.chars().count()
        );

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Completion request failed: {}", e);
            ChatlineError::Network(format!("Completion request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Completion endpoint returned {}: {}", status, error_text);
            return Err(ChatlineError::Network(format!(
                "Completion endpoint returned {}: {}",
                status, error_text
            )));
        }

        let payload: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse completion response: {}", e);
            ChatlineError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;

        payload.reply_text().ok_or_else(|| {
            ChatlineError::MalformedResponse("missing choices[0].message.content".to_string())
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str, cancel: CancellationToken) -> ChatResult<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Completion request cancelled");
                Err(ChatlineError::Cancelled)
            }
            result = self.send_request(prompt) => result,
        }
    }
}

impl std::fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            model: "test-model".to_string(),
            max_tokens: 500,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_build_request_shape() {
        let client = HttpCompletionClient::new(CompletionConfig::default(), None).unwrap();
        let body = serde_json::to_value(client.build_request("hello")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "microsoft/Phi-3-mini-4k-instruct",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 500,
                "stream": false
            })
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            HttpCompletionClient::new(CompletionConfig::default(), Some("sk-secret".into()))
                .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_reply_text_missing_parts() {
        let empty: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.reply_text().is_none());

        let no_content: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {}}]})).unwrap();
        assert!(no_content.reply_text().is_none());
    }

    #[tokio::test]
    async fn test_complete_success_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 500,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpCompletionClient::new(config_for(&server), Some("test-key".into())).unwrap();
        let reply = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn test_complete_without_key_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let reply = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_complete_non_success_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let err = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ChatlineError::Network(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("model loading"));
            }
            other => panic!("expected Network, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let err = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatlineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_complete_non_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let err = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatlineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_complete_transport_failure_is_network_error() {
        let config = CompletionConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            timeout_seconds: 2,
            ..CompletionConfig::default()
        };
        let client = HttpCompletionClient::new(config, None).unwrap();
        let err = client
            .complete("hello", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatlineError::Network(_)));
    }

    #[tokio::test]
    async fn test_complete_already_cancelled_token_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "too late"}}]
            })))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = client.complete("hello", token).await.unwrap_err();
        assert!(matches!(err, ChatlineError::Cancelled));
    }

    #[tokio::test]
    async fn test_complete_cancel_mid_flight() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": "slow"}}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(config_for(&server), None).unwrap();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = client.complete("hello", token).await.unwrap_err();
        assert!(matches!(err, ChatlineError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
