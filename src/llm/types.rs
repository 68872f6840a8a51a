//! Shared wire types for provider adapters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One plain-text turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
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

/// The uniform `{model, messages, max_tokens}` envelope every adapter accepts
///
/// Unknown fields are kept in `extra` so OpenAI-compatible vendors receive the
/// envelope unchanged; adapters with a stricter schema drop them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: Some(model.into()),
            messages,
            max_tokens: Some(max_tokens),
            extra: Map::new(),
        }
    }

    /// Model id, treating an empty string as absent
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.is_empty())
    }
}

/// The normalized `{choices: [{message: {role, content}}]}` response shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub message: ChatMessage,
}

impl NormalizedResponse {
    /// Wrap extracted vendor text without altering it
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ChatMessage::assistant(text),
            }],
        }
    }

    /// Text of the first choice; empty when the vendor returned nothing
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("")
    }

    /// True for a 2xx response that carried no extractable content
    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_keeps_unknown_fields() {
        let request: ChatRequest = serde_json::from_value(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 100,
            "temperature": 0.2
        }))
        .unwrap();

        assert_eq!(request.model(), Some("gpt-4o"));
        assert_eq!(request.extra.get("temperature"), Some(&json!(0.2)));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["temperature"], json!(0.2));
        assert_eq!(back["messages"][0]["role"], "user");
    }

    #[test]
    fn test_empty_model_is_absent() {
        let request: ChatRequest =
            serde_json::from_value(json!({"model": "", "messages": []})).unwrap();
        assert_eq!(request.model(), None);
        assert_eq!(request.max_tokens, None);
    }

    #[test]
    fn test_normalized_shape() {
        let response = NormalizedResponse::from_text("  spaced\n");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"choices": [{"message": {"role": "assistant", "content": "  spaced\n"}}]})
        );
        assert_eq!(response.text(), "  spaced\n");
        assert!(NormalizedResponse::from_text("").is_empty());
        assert!(NormalizedResponse { choices: vec![] }.is_empty());
    }
}
