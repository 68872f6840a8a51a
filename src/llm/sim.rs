//! Scripted upstream transport for tests
//!
//! Routes match on a URL fragment and optionally on the `model` field of the
//! JSON body, so several targets on the same vendor can get different replies.
//! Every request is recorded for later assertions.

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// What a matched route answers with
#[derive(Debug, Clone)]
pub enum SimReply {
    /// Status code plus JSON body
    Json(u16, Value),
    /// Status code plus raw text body
    Text(u16, String),
    /// Transport-level failure
    Fail(String),
}

#[derive(Debug, Clone)]
struct SimRoute {
    url_contains: String,
    model: Option<String>,
    reply: SimReply,
    delay: Duration,
}

impl SimRoute {
    fn matches(&self, request: &HttpRequest) -> bool {
        if !request.url.contains(&self.url_contains) {
            return false;
        }
        match &self.model {
            None => true,
            Some(model) => {
                let body_model = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("model"))
                    .and_then(Value::as_str);
                body_model == Some(model.as_str()) || request.url.contains(model.as_str())
            }
        }
    }
}

/// Transport that never touches the network
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Vec<SimRoute>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL contains `url_contains`
    pub fn on(mut self, url_contains: impl Into<String>, reply: SimReply) -> Self {
        self.routes.push(SimRoute {
            url_contains: url_contains.into(),
            model: None,
            reply,
            delay: Duration::ZERO,
        });
        self
    }

    /// Answer requests for one model on a URL
    pub fn on_model(
        self,
        url_contains: impl Into<String>,
        model: impl Into<String>,
        reply: SimReply,
    ) -> Self {
        self.on_model_delayed(url_contains, model, reply, Duration::ZERO)
    }

    /// Like [`Self::on_model`], but the reply is held back for `delay`
    pub fn on_model_delayed(
        mut self,
        url_contains: impl Into<String>,
        model: impl Into<String>,
        reply: SimReply,
        delay: Duration,
    ) -> Self {
        self.routes.push(SimRoute {
            url_contains: url_contains.into(),
            model: Some(model.into()),
            reply,
            delay,
        });
        self
    }

    /// Requests seen so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

/// OpenAI-style success body carrying `text`
pub fn openai_reply(text: &str) -> SimReply {
    SimReply::Json(
        200,
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }),
    )
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route = self.routes.iter().find(|r| r.matches(&request)).cloned();
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        let Some(route) = route else {
            return Err(TransportError(format!(
                "no scripted reply for {}",
                request.url
            )));
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        match route.reply {
            SimReply::Json(status, body) => Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            SimReply::Text(status, body) => Ok(HttpResponse { status, body }),
            SimReply::Fail(message) => Err(TransportError(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_by_model() {
        let transport = ScriptedTransport::new()
            .on_model("api.openai.com", "gpt-4o", openai_reply("four"))
            .on_model("api.openai.com", "gpt-4o-mini", openai_reply("mini"));

        let response = transport
            .send(HttpRequest::post(
                "https://api.openai.com/v1/chat/completions",
                json!({"model": "gpt-4o-mini"}),
            ))
            .await
            .unwrap();

        assert!(response.body.contains("mini"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_request_fails() {
        let transport = ScriptedTransport::new();
        let result = transport.send(HttpRequest::get("https://nowhere.test")).await;
        assert!(result.is_err());
        assert_eq!(transport.requests().len(), 1);
    }
}
