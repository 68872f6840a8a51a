//! Explicit application state
//!
//! A [`Workspace`] holds everything a user has configured: credentials,
//! channels with their transcripts, and the user-defined mentionables. It is
//! owned by one [`crate::dispatch::Dispatcher`] and saved after every mutation
//! through [`crate::storage::WorkspaceStore`].

mod error;

pub use error::WorkspaceError;

use crate::catalog::{short_id, ProviderRegistry};
use crate::conversation::{Channel, Message};
use crate::mention::{
    slugify, Assistant, CustomEndpoint, ImportedReference, ReferenceSource, SHORT_SLUG_LEN,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Channel seeded into every new workspace
pub const GENERAL_CHANNEL: &str = "general";

/// Secrets keyed by credential key name (e.g. `openaiKey`)
pub trait CredentialStore {
    fn get(&self, key_name: &str) -> Option<String>;
    fn set(&mut self, key_name: &str, secret: &str);
    /// Returns false if nothing was stored under the key
    fn delete(&mut self, key_name: &str) -> bool;
}

/// Append-only channel transcripts
pub trait TranscriptStore {
    fn append(&mut self, channel_id: &str, message: Message) -> Result<(), WorkspaceError>;
    /// Messages in insertion order; empty for unknown channels
    fn read(&self, channel_id: &str) -> &[Message];
    fn clear(&mut self, channel_id: &str) -> Result<(), WorkspaceError>;
}

/// Credential map with base64 obfuscation at rest
///
/// This is obfuscation only. A stored value that does not decode is returned
/// verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Credentials {
    entries: BTreeMap<String, String>,
}

impl CredentialStore for Credentials {
    fn get(&self, key_name: &str) -> Option<String> {
        let stored = self.entries.get(key_name)?;
        let decoded = STANDARD
            .decode(stored)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| stored.clone());
        Some(decoded)
    }

    fn set(&mut self, key_name: &str, secret: &str) {
        self.entries
            .insert(key_name.to_string(), STANDARD.encode(secret));
    }

    fn delete(&mut self, key_name: &str) -> bool {
        self.entries.remove(key_name).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Workspace {
    pub credentials: Credentials,
    channels: Vec<Channel>,
    pub assistants: Vec<Assistant>,
    pub references: Vec<ImportedReference>,
    pub custom_endpoints: Vec<CustomEndpoint>,
    current_channel: String,
    next_message_id: u64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            channels: vec![general_channel()],
            assistants: Vec::new(),
            references: Vec::new(),
            custom_endpoints: Vec::new(),
            current_channel: GENERAL_CHANNEL.to_string(),
            next_message_id: 1,
        }
    }
}

fn general_channel() -> Channel {
    Channel::new(GENERAL_CHANNEL, GENERAL_CHANNEL, "AI team collaboration channel")
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore invariants after loading or importing
    ///
    /// Seeds `general` when no channel exists, points the current channel at
    /// an existing one, and moves the id counter past every stored message.
    pub fn repair(&mut self) {
        if self.channels.is_empty() {
            self.channels.push(general_channel());
        }
        if self.channel(&self.current_channel).is_none() {
            self.current_channel = self.channels[0].id.clone();
        }
        let highest = self
            .channels
            .iter()
            .flat_map(|c| c.messages.iter())
            .map(|m| m.id)
            .max()
            .unwrap_or(0);
        self.next_message_id = self.next_message_id.max(highest + 1);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn current_channel(&self) -> &str {
        &self.current_channel
    }

    pub fn switch_channel(&mut self, id: &str) -> Result<(), WorkspaceError> {
        if self.channel(id).is_none() {
            return Err(WorkspaceError::ChannelNotFound(id.to_string()));
        }
        self.current_channel = id.to_string();
        Ok(())
    }

    /// Create a channel whose id is the slug of `name`
    pub fn create_channel(&mut self, name: &str) -> Result<&Channel, WorkspaceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkspaceError::MissingField("name"));
        }
        let id = slugify(name, None);
        if id.is_empty() {
            return Err(WorkspaceError::EmptySlug(name.to_string()));
        }
        if self.channel(&id).is_some() {
            return Err(WorkspaceError::ChannelExists(id));
        }

        tracing::info!("Created channel #{}", id);
        self.channels.push(Channel::new(id, name, ""));
        Ok(&self.channels[self.channels.len() - 1])
    }

    /// Replace every channel and transcript (backup import)
    pub fn replace_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
        self.repair();
    }

    pub fn allocate_message_id(&mut self) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    /// True if any catalog model or user mentionable answers to `token`
    pub fn is_mention_taken(&self, registry: &ProviderRegistry, token: &str) -> bool {
        !registry.matches(token).is_empty()
            || self.assistants.iter().any(|a| a.mention == token)
            || self.references.iter().any(|r| r.mention == token)
            || self.custom_endpoints.iter().any(|c| c.mention == token)
    }

    fn warn_if_taken(&self, registry: &ProviderRegistry, token: &str) {
        if self.is_mention_taken(registry, token) {
            tracing::warn!(
                "@{} is already taken; catalog models, then assistants, then custom endpoints answer first",
                token
            );
        }
    }

    pub fn add_reference(
        &mut self,
        registry: &ProviderRegistry,
        name: &str,
        source: ReferenceSource,
        content: &str,
    ) -> Result<&ImportedReference, WorkspaceError> {
        let name = name.trim();
        let content = content.trim();
        if name.is_empty() {
            return Err(WorkspaceError::MissingField("name"));
        }
        if content.is_empty() {
            return Err(WorkspaceError::MissingField("content"));
        }
        let mention = slugify(name, Some(SHORT_SLUG_LEN));
        if mention.is_empty() {
            return Err(WorkspaceError::EmptySlug(name.to_string()));
        }
        self.warn_if_taken(registry, &mention);

        self.references.push(ImportedReference {
            name: name.to_string(),
            source,
            content: content.to_string(),
            mention,
            created_at: Utc::now(),
        });
        Ok(&self.references[self.references.len() - 1])
    }

    /// Remove the earliest reference with this mention
    pub fn remove_reference(&mut self, mention: &str) -> Result<ImportedReference, WorkspaceError> {
        let mention = mention.trim_start_matches('@');
        let index = self
            .references
            .iter()
            .position(|r| r.mention == mention)
            .ok_or_else(|| WorkspaceError::UnknownMentionable {
                kind: "reference",
                mention: mention.to_string(),
            })?;
        Ok(self.references.remove(index))
    }

    pub fn add_custom_endpoint(
        &mut self,
        registry: &ProviderRegistry,
        name: &str,
        endpoint: &str,
        model_id: Option<String>,
        api_key: Option<String>,
    ) -> Result<&CustomEndpoint, WorkspaceError> {
        let name = name.trim();
        let endpoint = endpoint.trim();
        if name.is_empty() {
            return Err(WorkspaceError::MissingField("name"));
        }
        if endpoint.is_empty() {
            return Err(WorkspaceError::MissingField("endpoint"));
        }
        let mention = slugify(name, None);
        if mention.is_empty() {
            return Err(WorkspaceError::EmptySlug(name.to_string()));
        }
        self.warn_if_taken(registry, &mention);

        self.custom_endpoints.push(CustomEndpoint {
            name: name.to_string(),
            mention,
            endpoint: endpoint.to_string(),
            model_id: model_id.filter(|m| !m.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            created_at: Utc::now(),
        });
        Ok(&self.custom_endpoints[self.custom_endpoints.len() - 1])
    }

    /// Remove the earliest custom endpoint with this mention
    pub fn remove_custom_endpoint(
        &mut self,
        mention: &str,
    ) -> Result<CustomEndpoint, WorkspaceError> {
        let mention = mention.trim_start_matches('@');
        let index = self
            .custom_endpoints
            .iter()
            .position(|c| c.mention == mention)
            .ok_or_else(|| WorkspaceError::UnknownMentionable {
                kind: "custom endpoint",
                mention: mention.to_string(),
            })?;
        Ok(self.custom_endpoints.remove(index))
    }

    /// Replace the stored assistants with a fresh listing
    pub fn replace_assistants(&mut self, registry: &ProviderRegistry, assistants: Vec<Assistant>) {
        for assistant in &assistants {
            if !registry.matches(&assistant.mention).is_empty()
                || self
                    .custom_endpoints
                    .iter()
                    .any(|c| c.mention == assistant.mention)
                || self.references.iter().any(|r| r.mention == assistant.mention)
            {
                tracing::warn!("Assistant @{} shares its mention token", assistant.mention);
            }
        }
        self.assistants = assistants;
    }

    /// Human name for a reply's `model` token
    pub fn display_name(&self, registry: &ProviderRegistry, mention: Option<&str>) -> String {
        let Some(mention) = mention.filter(|m| !m.is_empty()) else {
            return "AI".to_string();
        };
        if let Some(model) = registry.find_model(mention) {
            return model.model.name.to_string();
        }
        if let Some(assistant) = self.assistants.iter().find(|a| a.mention == mention) {
            return assistant.name.clone();
        }
        if let Some(custom) = self.custom_endpoints.iter().find(|c| c.mention == mention) {
            return custom.name.clone();
        }
        short_id(mention).to_string()
    }

    /// Drop every channel, credential and mentionable
    pub fn clear_all(&mut self) {
        *self = Workspace::default();
    }
}

impl TranscriptStore for Workspace {
    fn append(&mut self, channel_id: &str, message: Message) -> Result<(), WorkspaceError> {
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| WorkspaceError::ChannelNotFound(channel_id.to_string()))?;
        channel.messages.push(message);
        Ok(())
    }

    fn read(&self, channel_id: &str) -> &[Message] {
        self.channel(channel_id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    fn clear(&mut self, channel_id: &str) -> Result<(), WorkspaceError> {
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| WorkspaceError::ChannelNotFound(channel_id.to_string()))?;
        channel.messages.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_obfuscated_at_rest() {
        let mut creds = Credentials::default();
        creds.set("openaiKey", "sk-abc");

        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["openaiKey"], "c2stYWJj");
        assert_eq!(creds.get("openaiKey").as_deref(), Some("sk-abc"));

        assert!(creds.delete("openaiKey"));
        assert!(!creds.delete("openaiKey"));
        assert_eq!(creds.get("openaiKey"), None);
    }

    #[test]
    fn test_undecodable_credential_used_verbatim() {
        let creds: Credentials =
            serde_json::from_value(serde_json::json!({"glmKey": "not base64!"})).unwrap();
        assert_eq!(creds.get("glmKey").as_deref(), Some("not base64!"));
    }

    #[test]
    fn test_general_seeded() {
        let ws = Workspace::new();
        assert_eq!(ws.channels().len(), 1);
        assert_eq!(ws.current_channel(), GENERAL_CHANNEL);
    }

    #[test]
    fn test_create_channel_slug_and_duplicates() {
        let mut ws = Workspace::new();
        let id = ws.create_channel("Product Launch!").unwrap().id.clone();
        assert_eq!(id, "product-launch");

        assert_eq!(
            ws.create_channel("product launch").unwrap_err(),
            WorkspaceError::ChannelExists("product-launch".into())
        );
        assert!(matches!(
            ws.create_channel("???"),
            Err(WorkspaceError::EmptySlug(_))
        ));

        ws.switch_channel("product-launch").unwrap();
        assert_eq!(ws.current_channel(), "product-launch");
        assert!(ws.switch_channel("nope").is_err());
    }

    #[test]
    fn test_transcript_append_read_clear() {
        let mut ws = Workspace::new();
        let id = ws.allocate_message_id();
        ws.append("general", Message::user(id, "hi", None, None))
            .unwrap();
        assert_eq!(ws.read("general").len(), 1);
        assert!(ws.read("missing").is_empty());
        assert!(ws
            .append("missing", Message::user(2, "x", None, None))
            .is_err());

        ws.clear("general").unwrap();
        assert!(ws.read("general").is_empty());
    }

    #[test]
    fn test_repair_moves_counter_past_existing_ids() {
        let mut channel = Channel::new("imported", "imported", "");
        channel
            .messages
            .push(Message::user(1_700_000_000_000, "old", None, None));

        let mut ws = Workspace::new();
        ws.replace_channels(vec![channel]);

        assert_eq!(ws.current_channel(), "imported");
        assert_eq!(ws.allocate_message_id(), 1_700_000_000_001);
    }

    #[test]
    fn test_reference_snapshot_survives_removal() {
        let registry = ProviderRegistry::builtin();
        let mut ws = Workspace::new();
        let reference = ws
            .add_reference(
                &registry,
                "Meeting Notes from Tuesday Sync",
                ReferenceSource::NotebookLm,
                " agenda ",
            )
            .unwrap()
            .clone();
        assert_eq!(reference.mention, "meeting-notes-from-t");
        assert_eq!(reference.content, "agenda");

        let id = ws.allocate_message_id();
        ws.append(
            "general",
            Message::user(id, "@meeting-notes-from-t", None, Some(reference)),
        )
        .unwrap();

        ws.remove_reference("@meeting-notes-from-t").unwrap();
        assert!(ws.references.is_empty());
        assert_eq!(
            ws.read("general")[0].context.as_ref().unwrap().content,
            "agenda"
        );
    }

    #[test]
    fn test_duplicate_mentions_accepted_earliest_kept_first() {
        let registry = ProviderRegistry::builtin();
        let mut ws = Workspace::new();
        ws.add_custom_endpoint(&registry, "Local", "http://a/v1/chat/completions", None, None)
            .unwrap();
        ws.add_custom_endpoint(&registry, "local", "http://b/v1/chat/completions", None, None)
            .unwrap();
        assert_eq!(ws.custom_endpoints.len(), 2);

        let removed = ws.remove_custom_endpoint("local").unwrap();
        assert_eq!(removed.endpoint, "http://a/v1/chat/completions");
        assert!(matches!(
            ws.remove_custom_endpoint("ghost"),
            Err(WorkspaceError::UnknownMentionable { .. })
        ));
    }

    #[test]
    fn test_custom_endpoint_requires_fields() {
        let registry = ProviderRegistry::builtin();
        let mut ws = Workspace::new();
        assert_eq!(
            ws.add_custom_endpoint(&registry, "x", " ", None, None)
                .unwrap_err(),
            WorkspaceError::MissingField("endpoint")
        );
    }

    #[test]
    fn test_display_name() {
        let registry = ProviderRegistry::builtin();
        let mut ws = Workspace::new();
        ws.add_custom_endpoint(&registry, "My Llama", "http://x", None, None)
            .unwrap();

        assert_eq!(ws.display_name(&registry, Some("gpt-4o")), "GPT-4o");
        assert_eq!(
            ws.display_name(&registry, Some("claude-3.5-haiku")),
            "Claude 3.5 Haiku"
        );
        assert_eq!(ws.display_name(&registry, Some("my-llama")), "My Llama");
        assert_eq!(ws.display_name(&registry, Some("unknown")), "unknown");
        assert_eq!(ws.display_name(&registry, None), "AI");
    }
}
