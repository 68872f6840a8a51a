//! Google Gemini generateContent adapter

use super::{AdapterError, ChatRequest, HttpRequest, NormalizedResponse, ProviderAdapter, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct GeminiAdapter {
    base: String,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::with_base(GEMINI_API_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> &str {
        "gemini"
    }

    fn shape_request(
        &self,
        request: &ChatRequest,
        credential: &str,
    ) -> Result<HttpRequest, AdapterError> {
        let model = request.model().unwrap_or(DEFAULT_MODEL);
        let endpoint = format!("{}/{}:generateContent", self.base, model);
        let url = reqwest::Url::parse_with_params(&endpoint, &[("key", credential)]).map_err(
            |e| AdapterError::InvalidEndpoint {
                provider: "gemini".to_string(),
                message: e.to_string(),
            },
        )?;

        let body = GeminiRequest {
            contents: request
                .messages
                .iter()
                .map(|m| GeminiContent {
                    role: match m.role {
                        Role::Assistant => "model".to_string(),
                        Role::User | Role::System => "user".to_string(),
                    },
                    parts: vec![GeminiPart {
                        text: Some(m.content.clone()),
                    }],
                })
                .collect(),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
        };

        let body = serde_json::to_value(&body).map_err(|e| AdapterError::Malformed {
            provider: "gemini".to_string(),
            message: e.to_string(),
        })?;

        Ok(HttpRequest::post(url.as_str(), body))
    }

    fn normalize_response(&self, body: &Value) -> Result<NormalizedResponse, AdapterError> {
        let parsed: GeminiResponse =
            serde_json::from_value(body.clone()).map_err(|e| AdapterError::Malformed {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        Ok(NormalizedResponse::from_text(text))
    }
}
