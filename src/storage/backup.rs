//! Backup import/export and markdown transcripts

use crate::catalog::ProviderRegistry;
use crate::conversation::{Channel, Message};
use crate::llm::Role;
use crate::mention::{Assistant, CustomEndpoint, ImportedReference};
use crate::workspace::Workspace;
use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BACKUP_VERSION: &str = "3.0";

/// Channel header as stored in backups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

impl From<&Channel> for ChannelMeta {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id.clone(),
            name: channel.name.clone(),
            desc: channel.desc.clone(),
        }
    }
}

/// Full data backup
///
/// Every section is optional on import; a present section replaces the
/// workspace's, an absent one leaves it alone. Credentials are never exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<BTreeMap<String, Vec<Message>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpts: Option<Vec<Assistant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_content: Option<Vec<ImportedReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_models: Option<Vec<CustomEndpoint>>,
}

impl Backup {
    pub fn from_workspace(workspace: &Workspace) -> Self {
        Self {
            version: BACKUP_VERSION.to_string(),
            exported_at: Some(Utc::now()),
            channels: Some(workspace.channels().iter().map(ChannelMeta::from).collect()),
            messages: Some(
                workspace
                    .channels()
                    .iter()
                    .map(|c| (c.id.clone(), c.messages.clone()))
                    .collect(),
            ),
            gpts: Some(workspace.assistants.clone()),
            imported_content: Some(workspace.references.clone()),
            custom_models: Some(workspace.custom_endpoints.clone()),
        }
    }

    /// Replace the sections of `workspace` this backup carries
    pub fn apply_to(self, workspace: &mut Workspace) {
        if self.channels.is_some() || self.messages.is_some() {
            let metas = self.channels.unwrap_or_else(|| {
                workspace.channels().iter().map(ChannelMeta::from).collect()
            });
            let mut transcripts = self.messages.unwrap_or_else(|| {
                workspace
                    .channels()
                    .iter()
                    .map(|c| (c.id.clone(), c.messages.clone()))
                    .collect()
            });

            let mut channels: Vec<Channel> = metas
                .into_iter()
                .map(|meta| Channel {
                    messages: transcripts.remove(&meta.id).unwrap_or_default(),
                    id: meta.id,
                    name: meta.name,
                    desc: meta.desc,
                })
                .collect();
            // Transcripts without a channel header still get a channel
            for (id, messages) in transcripts {
                channels.push(Channel {
                    name: id.clone(),
                    id,
                    desc: String::new(),
                    messages,
                });
            }
            workspace.replace_channels(channels);
        }
        if let Some(gpts) = self.gpts {
            workspace.assistants = gpts;
        }
        if let Some(references) = self.imported_content {
            workspace.references = references;
        }
        if let Some(custom) = self.custom_models {
            workspace.custom_endpoints = custom;
        }
    }
}

/// Render a channel transcript as markdown
pub fn channel_markdown(
    workspace: &Workspace,
    registry: &ProviderRegistry,
    channel_id: &str,
) -> Result<String> {
    let Some(channel) = workspace.channel(channel_id) else {
        bail!("Channel not found: {}", channel_id);
    };
    if channel.messages.is_empty() {
        bail!("Channel #{} has no messages to export", channel.id);
    }

    let mut markdown = format!("# Team Hub - {}\n\n", channel.name);
    markdown.push_str(&format!(
        "Exported: {}\n\n---\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    for msg in &channel.messages {
        let author = match msg.role {
            Role::User => "You".to_string(),
            _ => workspace.display_name(registry, msg.model.as_deref()),
        };
        let time = msg.timestamp.with_timezone(&Local).format("%H:%M");

        markdown.push_str(&format!("### {} ({})\n\n", author, time));
        markdown.push_str(&msg.content);
        markdown.push_str("\n\n");
        if let Some(attachment) = &msg.attachment {
            markdown.push_str(&format!("> Attachment: {}\n\n", attachment.label()));
        }
        markdown.push_str("---\n\n");
    }

    Ok(markdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Attachment;
    use crate::workspace::{CredentialStore, TranscriptStore};
    use serde_json::json;

    fn populated() -> Workspace {
        let mut ws = Workspace::default();
        ws.credentials.set("openaiKey", "sk-secret");
        let id = ws.allocate_message_id();
        ws.append(
            "general",
            Message::user(
                id,
                "@gpt-4o look",
                Some(Attachment::Url {
                    url: "https://example.com".into(),
                    content: "page".into(),
                }),
                None,
            ),
        )
        .unwrap();
        let id = ws.allocate_message_id();
        ws.append("general", Message::assistant(id, "gpt-4o", "Looks good"))
            .unwrap();
        ws
    }

    #[test]
    fn test_export_shape_without_credentials() {
        let backup = Backup::from_workspace(&populated());
        let value = serde_json::to_value(&backup).unwrap();

        assert_eq!(value["version"], "3.0");
        assert!(value["exportedAt"].is_string());
        assert_eq!(value["channels"][0]["id"], "general");
        assert_eq!(value["messages"]["general"].as_array().unwrap().len(), 2);
        assert!(value["gpts"].as_array().unwrap().is_empty());
        assert!(value.get("importedContent").is_some());
        assert!(value.get("customModels").is_some());
        assert!(!value.to_string().contains("sk-secret"));
        assert!(!value.to_string().contains("c2stc2VjcmV0"));
    }

    #[test]
    fn test_import_replaces_present_sections_only() {
        let mut ws = populated();
        let backup: Backup = serde_json::from_value(json!({
            "version": "3.0",
            "customModels": [{
                "name": "Local",
                "mention": "local",
                "endpoint": "http://localhost:1234/v1/chat/completions",
                "modelId": "",
                "apiKey": "",
                "createdAt": "2025-01-01T00:00:00.000Z"
            }]
        }))
        .unwrap();

        backup.apply_to(&mut ws);

        assert_eq!(ws.custom_endpoints.len(), 1);
        assert_eq!(ws.custom_endpoints[0].model_id(), "default");
        assert_eq!(ws.read("general").len(), 2);
        assert_eq!(ws.credentials.get("openaiKey").as_deref(), Some("sk-secret"));
    }

    #[test]
    fn test_import_channels_and_messages() {
        let mut ws = Workspace::default();
        let backup: Backup = serde_json::from_value(json!({
            "channels": [{"id": "general", "name": "general", "desc": ""}, {"id": "dev", "name": "Dev"}],
            "messages": {
                "dev": [{"id": 1735689600000u64, "role": "user", "content": "hi", "timestamp": "2025-01-01T00:00:00Z"}],
                "orphan": []
            }
        }))
        .unwrap();

        backup.apply_to(&mut ws);

        let ids: Vec<&str> = ws.channels().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["general", "dev", "orphan"]);
        assert_eq!(ws.read("dev")[0].content, "hi");
        assert_eq!(ws.allocate_message_id(), 1735689600001);
    }

    #[test]
    fn test_import_browser_file_attachment() {
        let mut ws = Workspace::default();
        let backup: Backup = serde_json::from_value(json!({
            "version": "3.0",
            "messages": {
                "general": [{
                    "id": 1735689600000u64,
                    "role": "user",
                    "content": "@gpt-4o read this",
                    "timestamp": "2025-01-01T00:00:00Z",
                    "attachment": {"type": "text/plain", "name": "notes.txt", "content": "hello"}
                }, {
                    "id": 1735689600001u64,
                    "role": "user",
                    "content": "and this",
                    "timestamp": "2025-01-01T00:00:01Z",
                    "attachment": {"type": "application/pdf", "name": "deck.pdf"}
                }]
            }
        }))
        .unwrap();

        backup.apply_to(&mut ws);

        let messages = ws.read("general");
        assert_eq!(
            messages[0].attachment,
            Some(Attachment::File {
                name: "notes.txt".into(),
                mime: Some("text/plain".into()),
                content: Some("hello".into()),
            })
        );
        assert!(messages[0]
            .rendered_content()
            .starts_with("[User uploaded a file: notes.txt]\nhello\n\n"));
        assert!(matches!(
            &messages[1].attachment,
            Some(Attachment::File { mime: Some(m), content: None, .. }) if m == "application/pdf"
        ));

        let exported = serde_json::to_value(Backup::from_workspace(&ws)).unwrap();
        let attachment = &exported["messages"]["general"][0]["attachment"];
        assert_eq!(attachment["type"], "file");
        assert_eq!(attachment["mime"], "text/plain");
    }

    #[test]
    fn test_markdown_export() {
        let ws = populated();
        let registry = ProviderRegistry::builtin();
        let markdown = channel_markdown(&ws, &registry, "general").unwrap();

        assert!(markdown.starts_with("# Team Hub - general\n\n"));
        assert!(markdown.contains("### You ("));
        assert!(markdown.contains("### GPT-4o ("));
        assert!(markdown.contains("> Attachment: https://example.com"));
        assert!(markdown.contains("Looks good\n\n---\n\n"));
    }

    #[test]
    fn test_markdown_export_empty_channel() {
        let ws = Workspace::default();
        let registry = ProviderRegistry::builtin();
        assert!(channel_markdown(&ws, &registry, "general").is_err());
        assert!(channel_markdown(&ws, &registry, "nope").is_err());
    }
}
