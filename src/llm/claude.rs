//! Anthropic messages API adapter

use super::{AdapterError, ChatRequest, HttpRequest, NormalizedResponse, ProviderAdapter, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeAdapter {
    url: String,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self::with_url(ANTHROPIC_API_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// Claude API request/response types

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContentBlock>,
}

impl ProviderAdapter for ClaudeAdapter {
    fn id(&self) -> &str {
        "claude"
    }

    fn shape_request(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<HttpRequest, AdapterError> {
        // The messages API takes system text as a top-level field
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let body = ClaudeRequest {
            model: request.model().unwrap_or(DEFAULT_MODEL).to_string(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| ClaudeMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        };

        let body = serde_json::to_value(&body).map_err(|e| AdapterError::Malformed {
            provider: "claude".to_string(),
            message: e.to_string(),
        })?;

        Ok(HttpRequest::post(&self.url, body)
            .with_header("x-api-key", credential)
            .with_header("anthropic-version", ANTHROPIC_VERSION))
    }

    fn normalize_response(&self, body: &Value) -> Result<NormalizedResponse, AdapterError> {
        let parsed: ClaudeResponse =
            serde_json::from_value(body.clone()).map_err(|e| AdapterError::Malformed {
                provider: "claude".to_string(),
                message: e.to_string(),
            })?;

        let text = match parsed.content.into_iter().next() {
            Some(ClaudeContentBlock::Text { text }) => text,
            _ => String::new(),
        };
        Ok(NormalizedResponse::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_shape_uses_vendor_headers_and_defaults() {
        let mut request = ChatRequest {
            model: None,
            messages: vec![ChatMessage::user("hello")],
            max_tokens: None,
            extra: Default::default(),
        };
        request.extra.insert("temperature".into(), json!(1.0));

        let upstream = ClaudeAdapter::new().shape_request(&request, "sk-ant").unwrap();

        assert_eq!(upstream.url, ANTHROPIC_API_URL);
        assert_eq!(upstream.header("x-api-key"), Some("sk-ant"));
        assert_eq!(upstream.header("anthropic-version"), Some("2023-06-01"));
        assert_eq!(upstream.header("Authorization"), None);

        let body = upstream.body.unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("temperature").is_none());
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_shape_lifts_system_messages() {
        let request = ChatRequest::new(
            "claude-3-opus-20240229",
            vec![
                ChatMessage {
                    role: Role::System,
                    content: "be brief".into(),
                },
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
            ],
            100,
        );

        let body = ClaudeAdapter::new()
            .shape_request(&request, "k")
            .unwrap()
            .body
            .unwrap();

        assert_eq!(body["system"], "be brief");
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
    }

    #[test]
    fn test_normalize_first_block() {
        let response = ClaudeAdapter::new()
            .normalize_response(&json!({
                "type": "message",
                "content": [{"type": "text", "text": "Bonjour"}, {"type": "text", "text": "ignored"}],
                "stop_reason": "end_turn"
            }))
            .unwrap();
        assert_eq!(response.text(), "Bonjour");
    }

    #[test]
    fn test_normalize_without_text_is_empty() {
        let response = ClaudeAdapter::new()
            .normalize_response(&json!({"content": []}))
            .unwrap();
        assert!(response.is_empty());

        let response = ClaudeAdapter::new()
            .normalize_response(&json!({"content": [{"type": "thinking", "thinking": "..."}]}))
            .unwrap();
        assert!(response.is_empty());
    }
}
