//! Typed errors for provider adapter calls
//!
//! Separates failures that are detected before any network I/O (unknown
//! provider, missing credential, bad endpoint) from failures of the round trip
//! itself (transport, vendor status or error payload).

use serde_json::Value;
use thiserror::Error;

/// Errors raised by [`super::AdapterRegistry`]
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter is registered under this provider id
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The provider's credential is absent or empty
    #[error("API key for {provider} is not configured")]
    MissingCredential { provider: String },

    /// The client's request body does not fit this vendor's schema
    #[error("{provider}: invalid request: {message}")]
    InvalidRequest { provider: String, message: String },

    /// The configured endpoint cannot be turned into a request URL
    #[error("{provider}: invalid endpoint: {message}")]
    InvalidEndpoint { provider: String, message: String },

    /// Network failure (DNS, connect, timeout, broken body)
    #[error("{provider}: network error: {message}")]
    Transport { provider: String, message: String },

    /// Non-2xx status or an `error` payload in the body
    #[error("{provider} API error: {message}")]
    Vendor {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// A 2xx response whose body is not the JSON we expect
    #[error("{provider}: malformed response: {message}")]
    Malformed { provider: String, message: String },
}

impl AdapterError {
    /// Provider id the failure belongs to
    pub fn provider_id(&self) -> &str {
        match self {
            AdapterError::UnknownProvider(provider) => provider,
            AdapterError::MissingCredential { provider }
            | AdapterError::InvalidRequest { provider, .. }
            | AdapterError::InvalidEndpoint { provider, .. }
            | AdapterError::Transport { provider, .. }
            | AdapterError::Vendor { provider, .. }
            | AdapterError::Malformed { provider, .. } => provider,
        }
    }

    /// True for errors raised before any request left the process
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AdapterError::UnknownProvider(_)
                | AdapterError::MissingCredential { .. }
                | AdapterError::InvalidRequest { .. }
                | AdapterError::InvalidEndpoint { .. }
        )
    }

    /// Convert a non-2xx status and its body into a vendor error
    pub fn from_http_status(provider: &str, status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| vendor_error_message(&json))
            .unwrap_or_else(|| body.trim().to_string());

        AdapterError::Vendor {
            provider: provider.to_string(),
            status: Some(status),
            message: format!("HTTP {}: {}", status, detail),
        }
    }
}

/// Failure of the HTTP transport itself
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Describe a reqwest failure the way users can act on it
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            TransportError(format!("Connection failed: {}", e))
        } else {
            TransportError(e.to_string())
        }
    }
}

/// Extract the vendor's error text from a response body
///
/// Vendors report either `{"error": "text"}` or `{"error": {"message": "text"}}`.
pub fn vendor_error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}
