//! LLM provider adapters
//!
//! Each vendor gets a [`ProviderAdapter`] that shapes the uniform
//! [`ChatRequest`] envelope into its own wire format and normalizes the reply
//! back to [`NormalizedResponse`]. [`AdapterRegistry`] owns the adapters and
//! performs the round trip through an [`HttpTransport`].

mod claude;
mod error;
mod gemini;
mod openai_compat;
mod openrouter;
mod transport;
mod types;

// Scripted upstream (feature-gated)
#[cfg(feature = "test-sim")]
pub mod sim;

pub use claude::{ClaudeAdapter, ANTHROPIC_API_URL};
pub use error::{vendor_error_message, AdapterError, TransportError};
pub use gemini::{GeminiAdapter, GEMINI_API_BASE};
pub use openai_compat::{OpenAiCompatAdapter, OpenAiCompatConfig, OPENAI_CHAT_URL};
pub use openrouter::openrouter_adapter;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::*;

use crate::config::Config;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const OPENAI_ASSISTANTS_URL: &str = "https://api.openai.com/v1/assistants?limit=100";

/// Per-vendor request shaping and response normalization
///
/// Both operations are pure; network I/O lives in [`AdapterRegistry`].
pub trait ProviderAdapter: Send + Sync {
    /// Provider id this adapter serves
    fn id(&self) -> &str;

    /// Build the upstream request for `request`
    fn shape_request(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<HttpRequest, AdapterError>;

    /// Build the upstream request for a client body as received
    ///
    /// The default parses it into a [`ChatRequest`] first, so vendors with
    /// their own schema only see the uniform envelope.
    fn shape_raw(&self, body: &Value, credential: &str) -> Result<HttpRequest, AdapterError> {
        let request: ChatRequest =
            serde_json::from_value(body.clone()).map_err(|e| AdapterError::InvalidRequest {
                provider: self.id().to_string(),
                message: e.to_string(),
            })?;
        self.shape_request(&request, credential)
    }

    /// Extract the reply text from a 2xx vendor body
    fn normalize_response(&self, body: &Value) -> Result<NormalizedResponse, AdapterError>;
}

/// Adapters keyed by provider id, plus the transport they share
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    transport: Arc<dyn HttpTransport>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            adapters: HashMap::new(),
            transport,
        }
    }

    /// Registry with every built-in vendor, honoring endpoint overrides
    pub fn with_defaults(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let mut registry = Self::new(transport);

        let compat = [
            ("openai", openai_compat::OPENAI_CHAT_URL),
            ("deepseek", openai_compat::DEEPSEEK_CHAT_URL),
            ("doubao", openai_compat::DOUBAO_CHAT_URL),
            ("qwen", openai_compat::QWEN_CHAT_URL),
            ("kimi", openai_compat::KIMI_CHAT_URL),
            ("glm", openai_compat::GLM_CHAT_URL),
            ("grok", openai_compat::GROK_CHAT_URL),
        ];
        for (id, url) in compat {
            let url = config.base_url_for(id).unwrap_or(url);
            registry.register(OpenAiCompatAdapter::new(OpenAiCompatConfig::new(id, url)));
        }

        registry.register(openrouter_adapter(config));
        registry.register(match config.base_url_for("claude") {
            Some(url) => ClaudeAdapter::with_url(url),
            None => ClaudeAdapter::new(),
        });
        registry.register(match config.base_url_for("gemini") {
            Some(base) => GeminiAdapter::with_base(base),
            None => GeminiAdapter::new(),
        });

        registry
    }

    pub fn register(&mut self, adapter: impl ProviderAdapter + 'static) {
        self.adapters
            .insert(adapter.id().to_string(), Arc::new(adapter));
    }

    pub fn get(&self, provider_id: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id)
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// Registered provider ids, sorted
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    fn checked(
        &self,
        provider_id: &str,
        credential: &str,
    ) -> Result<&Arc<dyn ProviderAdapter>, AdapterError> {
        let adapter = self
            .get(provider_id)
            .ok_or_else(|| AdapterError::UnknownProvider(provider_id.to_string()))?;

        if credential.trim().is_empty() {
            return Err(AdapterError::MissingCredential {
                provider: provider_id.to_string(),
            });
        }
        Ok(adapter)
    }

    /// Send `request` to a registered provider
    ///
    /// Unknown providers and missing credentials fail before any I/O.
    pub async fn send(
        &self,
        provider_id: &str,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<NormalizedResponse, AdapterError> {
        let adapter = self.checked(provider_id, credential)?;
        self.send_with(adapter.as_ref(), credential, request).await
    }

    /// Send a client body as received, for the HTTP proxy
    ///
    /// Same pre-flight checks as [`Self::send`]; the adapter decides how much
    /// of the body reaches the vendor.
    pub async fn forward(
        &self,
        provider_id: &str,
        credential: &str,
        body: &Value,
    ) -> Result<NormalizedResponse, AdapterError> {
        let adapter = self.checked(provider_id, credential)?;
        let upstream = adapter.shape_raw(body, credential)?;

        tracing::debug!(
            "Forwarding request to {} (model: {})",
            provider_id,
            body.get("model").and_then(serde_json::Value::as_str).unwrap_or("default")
        );

        let response = self.round_trip(provider_id, upstream).await?;
        adapter.normalize_response(&response)
    }

    /// Round trip through an adapter that is not in the registry
    pub async fn send_with(
        &self,
        adapter: &dyn ProviderAdapter,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<NormalizedResponse, AdapterError> {
        let provider = adapter.id();
        let upstream = adapter.shape_request(request, credential)?;

        tracing::debug!(
            "Sending request to {} (model: {})",
            provider,
            request.model().unwrap_or("default")
        );

        let body = self.round_trip(provider, upstream).await?;
        adapter.normalize_response(&body)
    }

    /// List the assistants on an OpenAI account
    ///
    /// Returns the vendor's listing body unmodified.
    pub async fn list_assistants(&self, credential: &str) -> Result<Value, AdapterError> {
        if credential.trim().is_empty() {
            return Err(AdapterError::MissingCredential {
                provider: "openai".to_string(),
            });
        }

        let upstream = HttpRequest::get(OPENAI_ASSISTANTS_URL)
            .with_header("Authorization", format!("Bearer {}", credential))
            .with_header("OpenAI-Beta", "assistants=v2");

        self.round_trip("openai", upstream).await
    }

    async fn round_trip(&self, provider: &str, upstream: HttpRequest) -> Result<Value, AdapterError> {
        let response =
            self.transport
                .send(upstream)
                .await
                .map_err(|e| AdapterError::Transport {
                    provider: provider.to_string(),
                    message: e.to_string(),
                })?;

        if !response.is_success() {
            tracing::warn!("{} returned HTTP {}", provider, response.status);
            return Err(AdapterError::from_http_status(
                provider,
                response.status,
                &response.body,
            ));
        }

        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| AdapterError::Malformed {
                provider: provider.to_string(),
                message: format!("invalid JSON: {}", e),
            })?;

        if let Some(message) = vendor_error_message(&body) {
            return Err(AdapterError::Vendor {
                provider: provider.to_string(),
                status: None,
                message,
            });
        }

        Ok(body)
    }
}
