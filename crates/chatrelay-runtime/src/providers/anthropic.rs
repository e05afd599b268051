//! Anthropic Claude API Provider
//!
//! Implements the CompletionProvider trait for Anthropic's Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{
    ChatMessage, CompletionProvider, CompletionRequest, CompletionResponse, ProviderError,
};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Anthropic API Provider
#[derive(Debug)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl AnthropicProvider {
    /// Create new Anthropic provider with explicit configuration
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn build_request(&self, req: CompletionRequest) -> MessagesRequest {
        MessagesRequest {
            model: req.model.unwrap_or_else(|| self.default_model.clone()),
            messages: req.messages,
            max_tokens: req.max_tokens,
            system: req.system.filter(|s| !s.is_empty()),
        }
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

/// Anthropic Messages Request
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

/// Anthropic Messages Response
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
}

/// Anthropic Content Block
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let anthropic_req = self.build_request(req);
        debug!(
            model = %anthropic_req.model,
            messages = anthropic_req.messages.len(),
            max_tokens = anthropic_req.max_tokens,
            "sending messages request"
        );

        let response = self
            .client
            .post(self.endpoint("/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_req)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let anthropic_resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let content = anthropic_resp
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(CompletionResponse {
            content,
            model: anthropic_resp.model,
            finish_reason: anthropic_resp.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::user("hi (limit answer to 200 characters)"),
                ChatMessage::assistant("Hello."),
                ChatMessage::user("and now? (limit answer to 200 characters)"),
            ],
            system: Some("You are a helpful IRC bot.".to_string()),
            model: None,
            max_tokens: 100,
        }
    }

    fn provider(base_url: impl Into<String>) -> AnthropicProvider {
        AnthropicProvider::new("test-key", base_url, DEFAULT_MODEL).unwrap()
    }

    #[test]
    fn provider_creation_explicit() {
        let provider =
            AnthropicProvider::new("test-key", "https://api.anthropic.com/v1", "claude-3-opus")
                .unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.default_model(), "claude-3-opus");
    }

    #[test]
    fn configured_base_url_tolerates_trailing_slash() {
        let provider = provider("http://localhost:9000/v1/");
        assert_eq!(
            provider.endpoint("/messages"),
            "http://localhost:9000/v1/messages"
        );
    }

    #[test]
    fn request_body_keeps_message_order_and_system() {
        let body = serde_json::to_value(provider(ANTHROPIC_API_BASE).build_request(request()))
            .unwrap();

        assert_eq!(
            body,
            json!({
                "model": DEFAULT_MODEL,
                "messages": [
                    {"role": "user", "content": "hi (limit answer to 200 characters)"},
                    {"role": "assistant", "content": "Hello."},
                    {"role": "user", "content": "and now? (limit answer to 200 characters)"}
                ],
                "max_tokens": 100,
                "system": "You are a helpful IRC bot."
            })
        );
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let mut req = request();
        req.system = Some(String::new());
        req.model = Some("claude-override".to_string());

        let body = serde_json::to_value(provider(ANTHROPIC_API_BASE).build_request(req)).unwrap();

        assert!(body.get("system").is_none());
        assert_eq!(body["model"], "claude-override");
    }

    #[tokio::test]
    async fn complete_calls_anthropic_api() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", API_VERSION);
            then.status(200).json_body(json!({
                "id": "msg_test",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Hello! "},
                    {"type": "text", "text": "I'm Claude."}
                ],
                "model": DEFAULT_MODEL,
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 20}
            }));
        });

        let resp = provider(server.base_url()).complete(request()).await.unwrap();

        mock.assert();
        assert_eq!(resp.content, "Hello! I'm Claude.");
        assert_eq!(resp.model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(resp.finish_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn complete_handles_api_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/messages");
            then.status(401).json_body(json!({
                "error": {
                    "type": "authentication_error",
                    "message": "Invalid API Key"
                }
            }));
        });

        let err = provider(server.base_url())
            .complete(request())
            .await
            .unwrap_err();

        match err {
            ProviderError::HttpStatus { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API Key"));
            }
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_rejects_response_without_text() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/messages");
            then.status(200).json_body(json!({
                "id": "msg_empty",
                "type": "message",
                "role": "assistant",
                "content": [],
                "model": DEFAULT_MODEL,
                "stop_reason": "max_tokens"
            }));
        });

        let err = provider(server.base_url())
            .complete(request())
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::EmptyResponse);
    }

    #[tokio::test]
    async fn complete_reports_undecodable_body() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/messages");
            then.status(200).body("not json");
        });

        let err = provider(server.base_url())
            .complete(request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
