//! `@mention` scanning and resolution
//!
//! Every addressable thing in a workspace is a [`Mentionable`]. Resolution of a
//! message runs in a fixed order per token: catalog model (only with a usable
//! credential), then assistant, then custom endpoint. Imported references are
//! looked up independently and the first one mentioned becomes the context.

use crate::catalog::{ModelRef, ProviderRegistry, Resolution};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_\-./]+)").expect("valid mention regex"));

/// Maximum slug length for assistants and references
pub const SHORT_SLUG_LEN: usize = 20;

/// Model id sent for custom endpoints that don't name one
pub const DEFAULT_CUSTOM_MODEL: &str = "default";

/// An assistant imported from the vendor's listing API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backing model id, when the listing reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub mention: String,
}

impl Assistant {
    /// Build the assistant list from an OpenAI `/v1/assistants` response
    pub fn from_listing(listing: &Value) -> Vec<Assistant> {
        let Some(data) = listing.get("data").and_then(Value::as_array) else {
            return Vec::new();
        };

        data.iter()
            .filter_map(|entry| {
                let id = entry.get("id")?.as_str()?.to_string();
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(&id)
                    .to_string();
                let mut mention = slugify(&name, Some(SHORT_SLUG_LEN));
                if mention.is_empty() {
                    mention = slugify(&id, Some(SHORT_SLUG_LEN));
                }
                Some(Assistant {
                    description: entry
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    model: entry
                        .get("model")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    id,
                    name,
                    mention,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    #[serde(rename = "getnote")]
    GetNote,
    #[serde(rename = "notebooklm")]
    NotebookLm,
    #[default]
    #[serde(other)]
    Other,
}

impl std::str::FromStr for ReferenceSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "getnote" => ReferenceSource::GetNote,
            "notebooklm" => ReferenceSource::NotebookLm,
            _ => ReferenceSource::Other,
        })
    }
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSource::GetNote => write!(f, "getnote"),
            ReferenceSource::NotebookLm => write!(f, "notebooklm"),
            ReferenceSource::Other => write!(f, "other"),
        }
    }
}

/// User-pasted text that can be mentioned as context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedReference {
    pub name: String,
    #[serde(default)]
    pub source: ReferenceSource,
    pub content: String,
    pub mention: String,
    pub created_at: DateTime<Utc>,
}

/// A user-supplied OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomEndpoint {
    pub name: String,
    pub mention: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CustomEndpoint {
    pub fn model_id(&self) -> &str {
        self.model_id
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_CUSTOM_MODEL)
    }
}

/// Anything addressable with `@token`
#[derive(Debug, Clone, Copy)]
pub enum Mentionable<'a> {
    CatalogModel(ModelRef),
    Assistant(&'a Assistant),
    Reference(&'a ImportedReference),
    CustomEndpoint(&'a CustomEndpoint),
}

impl Mentionable<'_> {
    pub fn mention(&self) -> &str {
        match self {
            Mentionable::CatalogModel(r) => r.mention(),
            Mentionable::Assistant(a) => &a.mention,
            Mentionable::Reference(r) => &r.mention,
            Mentionable::CustomEndpoint(c) => &c.mention,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Mentionable::CatalogModel(r) => r.model.name,
            Mentionable::Assistant(a) => &a.name,
            Mentionable::Reference(r) => &r.name,
            Mentionable::CustomEndpoint(c) => &c.name,
        }
    }

    /// Short label for listings
    pub fn kind(&self) -> &'static str {
        match self {
            Mentionable::CatalogModel(_) => "model",
            Mentionable::Assistant(_) => "assistant",
            Mentionable::Reference(_) => "reference",
            Mentionable::CustomEndpoint(_) => "custom",
        }
    }
}

/// Who a dispatch target talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetKind {
    Catalog {
        provider_id: &'static str,
        model_id: &'static str,
    },
    Assistant {
        assistant_id: String,
        model_id: String,
    },
    Custom {
        endpoint: String,
        model_id: String,
        #[serde(skip)]
        api_key: Option<String>,
    },
}

/// A resolved AI target for one send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchTarget {
    /// Token as typed; deduplication key
    pub token: String,
    /// Label stored as the reply's `model`
    pub mention: String,
    #[serde(flatten)]
    pub kind: TargetKind,
}

impl DispatchTarget {
    pub fn model_id(&self) -> &str {
        match &self.kind {
            TargetKind::Catalog { model_id, .. } => model_id,
            TargetKind::Assistant { model_id, .. } | TargetKind::Custom { model_id, .. } => {
                model_id
            }
        }
    }

    /// Provider id, or `custom` for user endpoints
    pub fn provider_id(&self) -> &str {
        match &self.kind {
            TargetKind::Catalog { provider_id, .. } => provider_id,
            TargetKind::Assistant { .. } => "openai",
            TargetKind::Custom { .. } => "custom",
        }
    }
}

/// A catalog token that matched models whose providers have no key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnconfiguredMention {
    pub token: String,
    /// Display names of providers that would serve it
    pub providers: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionResolution {
    pub targets: Vec<DispatchTarget>,
    pub context: Option<ImportedReference>,
    pub unconfigured: Vec<UnconfiguredMention>,
}

/// Turn a display name into a mention token
///
/// Lowercases, turns whitespace runs into `-`, drops anything outside
/// `[a-z0-9-]`, then truncates to `max_len` characters if given.
pub fn slugify(name: &str, max_len: Option<usize>) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }
    match max_len {
        Some(max) => slug.chars().take(max).collect(),
        None => slug,
    }
}

/// Every `@token` in the text, left to right, repeats included
pub fn scan_tokens(text: &str) -> Vec<&str> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

pub struct MentionResolver<'a> {
    registry: &'a ProviderRegistry,
    workspace: &'a Workspace,
}

impl<'a> MentionResolver<'a> {
    pub fn new(registry: &'a ProviderRegistry, workspace: &'a Workspace) -> Self {
        Self {
            registry,
            workspace,
        }
    }

    pub fn resolve(&self, text: &str) -> MentionResolution {
        let mut resolution = MentionResolution::default();

        for token in scan_tokens(text) {
            if resolution.context.is_none() {
                resolution.context = self.resolve_reference(token).cloned();
            }

            if resolution.targets.iter().any(|t| t.token == token)
                || resolution.unconfigured.iter().any(|u| u.token == token)
            {
                continue;
            }

            let mut unusable = None;
            let target = match self.registry.resolve(token, &self.workspace.credentials) {
                Resolution::Usable(model) => Some(Self::catalog_target(token, model)),
                Resolution::Unusable(candidates) => {
                    unusable = Some(candidates);
                    None
                }
                Resolution::NotFound => None,
            }
            .or_else(|| self.resolve_assistant(token))
            .or_else(|| self.resolve_custom(token));

            match (target, unusable) {
                (Some(target), _) => resolution.targets.push(target),
                (None, Some(candidates)) => {
                    tracing::debug!("@{} matches catalog models without a credential", token);
                    let mut providers: Vec<&'static str> =
                        candidates.iter().map(|c| c.provider.name).collect();
                    providers.dedup();
                    resolution.unconfigured.push(UnconfiguredMention {
                        token: token.to_string(),
                        providers,
                    });
                }
                (None, None) => {}
            }
        }

        resolution
    }

    fn catalog_target(token: &str, model: ModelRef) -> DispatchTarget {
        DispatchTarget {
            token: token.to_string(),
            mention: model.mention().to_string(),
            kind: TargetKind::Catalog {
                provider_id: model.provider.id,
                model_id: model.model.id,
            },
        }
    }

    fn resolve_assistant(&self, token: &str) -> Option<DispatchTarget> {
        let assistant = self
            .workspace
            .assistants
            .iter()
            .find(|a| a.mention == token)?;
        Some(DispatchTarget {
            token: token.to_string(),
            mention: assistant.mention.clone(),
            kind: TargetKind::Assistant {
                assistant_id: assistant.id.clone(),
                model_id: assistant
                    .model
                    .clone()
                    .unwrap_or_else(|| assistant.mention.clone()),
            },
        })
    }

    fn resolve_custom(&self, token: &str) -> Option<DispatchTarget> {
        let custom = self
            .workspace
            .custom_endpoints
            .iter()
            .find(|c| c.mention == token)?;
        Some(DispatchTarget {
            token: token.to_string(),
            mention: custom.mention.clone(),
            kind: TargetKind::Custom {
                endpoint: custom.endpoint.clone(),
                model_id: custom.model_id().to_string(),
                api_key: custom.api_key.clone(),
            },
        })
    }

    fn resolve_reference(&self, token: &str) -> Option<&'a ImportedReference> {
        self.workspace.references.iter().find(|r| r.mention == token)
    }

    /// Everything currently mentionable; catalog models only when usable
    pub fn mentionables(&self) -> Vec<Mentionable<'a>> {
        let mut all: Vec<Mentionable<'a>> = self
            .registry
            .list_usable(&self.workspace.credentials)
            .into_iter()
            .map(Mentionable::CatalogModel)
            .collect();
        all.extend(self.workspace.assistants.iter().map(Mentionable::Assistant));
        all.extend(self.workspace.references.iter().map(Mentionable::Reference));
        all.extend(
            self.workspace
                .custom_endpoints
                .iter()
                .map(Mentionable::CustomEndpoint),
        );
        all
    }

    /// Mentionables whose token or name contains `filter`, case-insensitively
    pub fn suggest(&self, filter: &str) -> Vec<Mentionable<'a>> {
        let filter = filter.trim_start_matches('@').to_lowercase();
        self.mentionables()
            .into_iter()
            .filter(|m| {
                filter.is_empty()
                    || m.mention().to_lowercase().contains(&filter)
                    || m.name().to_lowercase().contains(&filter)
            })
            .collect()
    }
}
