//! Generic OpenAI-compatible adapter
//!
//! Covers every vendor that speaks the chat completions format: OpenAI itself,
//! DeepSeek, Doubao, Qwen, Kimi, GLM, Grok, OpenRouter and user-supplied
//! custom endpoints. The envelope is forwarded as-is.
//!
//! SECURITY: Credentials are only sent to the configured endpoint.

use super::{AdapterError, ChatRequest, HttpRequest, NormalizedResponse, ProviderAdapter};
use serde::Deserialize;
use serde_json::Value;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEEPSEEK_CHAT_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DOUBAO_CHAT_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";
pub const QWEN_CHAT_URL: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const KIMI_CHAT_URL: &str = "https://api.moonshot.cn/v1/chat/completions";
pub const GLM_CHAT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
pub const GROK_CHAT_URL: &str = "https://api.x.ai/v1/chat/completions";
pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Configuration for an OpenAI-compatible vendor
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Provider id (e.g. "deepseek", "openrouter")
    pub name: String,
    /// Full chat completions URL
    pub base_url: String,
    /// Extra headers sent with every request
    pub custom_headers: Vec<(String, String)>,
}

impl OpenAiCompatConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            custom_headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }
}

pub struct OpenAiCompatAdapter {
    config: OpenAiCompatConfig,
}

impl OpenAiCompatAdapter {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        Self { config }
    }

    /// Adapter for a user-registered endpoint
    pub fn custom(endpoint: impl Into<String>) -> Self {
        Self::new(OpenAiCompatConfig::new("custom", endpoint))
    }

    pub fn endpoint(&self) -> &str {
        &self.config.base_url
    }
}

impl OpenAiCompatAdapter {
    fn upstream(&self, body: Value, credential: &str) -> Result<HttpRequest, AdapterError> {
        if !self.config.base_url.starts_with("http://")
            && !self.config.base_url.starts_with("https://")
        {
            return Err(AdapterError::InvalidEndpoint {
                provider: self.config.name.clone(),
                message: format!("'{}' is not an http(s) URL", self.config.base_url),
            });
        }

        let mut upstream = HttpRequest::post(&self.config.base_url, body);
        // Custom endpoints may run without a key
        if !credential.is_empty() {
            upstream = upstream.with_header("Authorization", format!("Bearer {}", credential));
        }
        for (name, value) in &self.config.custom_headers {
            upstream = upstream.with_header(name, value);
        }
        Ok(upstream)
    }
}

#[derive(Debug, Deserialize)]
struct CompatResponse {
    #[serde(default)]
    choices: Vec<CompatChoice>,
}

#[derive(Debug, Deserialize)]
struct CompatChoice {
    #[serde(default)]
    message: Option<CompatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ProviderAdapter for OpenAiCompatAdapter {
    fn id(&self) -> &str {
        &self.config.name
    }

    fn shape_request(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<HttpRequest, AdapterError> {
        let body = serde_json::to_value(request).map_err(|e| AdapterError::Malformed {
            provider: self.config.name.clone(),
            message: e.to_string(),
        })?;
        self.upstream(body, credential)
    }

    fn shape_raw(&self, body: &Value, credential: &str) -> Result<HttpRequest, AdapterError> {
        if !body.get("messages").is_some_and(Value::is_array) {
            return Err(AdapterError::InvalidRequest {
                provider: self.config.name.clone(),
                message: "`messages` must be an array".to_string(),
            });
        }
        self.upstream(body.clone(), credential)
    }

    fn normalize_response(&self, body: &Value) -> Result<NormalizedResponse, AdapterError> {
        let parsed: CompatResponse =
            serde_json::from_value(body.clone()).map_err(|e| AdapterError::Malformed {
                provider: self.config.name.clone(),
                message: e.to_string(),
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(NormalizedResponse::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;

    fn adapter() -> OpenAiCompatAdapter {
        OpenAiCompatAdapter::new(
            OpenAiCompatConfig::new("deepseek", DEEPSEEK_CHAT_URL).with_header("X-Test", "1"),
        )
    }

    #[test]
    fn test_shape_passes_envelope_through() {
        let mut request = ChatRequest::new("deepseek-chat", vec![ChatMessage::user("hi")], 4096);
        request.extra.insert("temperature".into(), json!(0.5));

        let upstream = adapter().shape_request(&request, "sk-test").unwrap();

        assert_eq!(upstream.url, DEEPSEEK_CHAT_URL);
        assert_eq!(upstream.header("Authorization"), Some("Bearer sk-test"));
        assert_eq!(upstream.header("X-Test"), Some("1"));
        let body = upstream.body.unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn test_raw_body_is_forwarded_unchanged() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "developer", "content": "be brief"},
                {"role": "user", "name": "ana", "content": [{"type": "text", "text": "hi"}]},
                {"role": "tool", "tool_call_id": "call_1", "content": "42"}
            ],
            "tools": []
        });

        let upstream = adapter().shape_raw(&body, "sk-test").unwrap();

        assert_eq!(upstream.body, Some(body));
        assert_eq!(upstream.header("Authorization"), Some("Bearer sk-test"));
    }

    #[test]
    fn test_raw_body_without_messages_is_rejected() {
        let err = adapter().shape_raw(&json!({"model": "x"}), "k").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest { .. }));
    }

    #[test]
    fn test_custom_endpoint_without_key() {
        let upstream = OpenAiCompatAdapter::custom("http://localhost:8000/v1/chat/completions")
            .shape_request(&ChatRequest::new("m", vec![], 10), "")
            .unwrap();
        assert_eq!(upstream.header("Authorization"), None);
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let err = OpenAiCompatAdapter::custom("ftp://example")
            .shape_request(&ChatRequest::new("m", vec![], 10), "k")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_normalize_first_choice() {
        let response = adapter()
            .normalize_response(&json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "first"}},
                    {"message": {"role": "assistant", "content": "second"}}
                ]
            }))
            .unwrap();
        assert_eq!(response.text(), "first");
    }

    #[test]
    fn test_normalize_null_content_is_empty() {
        let response = adapter()
            .normalize_response(&json!({"choices": [{"message": {"content": null}}]}))
            .unwrap();
        assert!(response.is_empty());

        let response = adapter().normalize_response(&json!({})).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn test_normalize_wrong_shape_is_malformed() {
        let err = adapter()
            .normalize_response(&json!({"choices": "nope"}))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Malformed { .. }));
    }
}
