//! Channels, messages and history assembly
//!
//! A channel transcript is append-only. [`build_history`] turns the tail of a
//! transcript into the plain `{role, content}` turns an adapter sends, inlining
//! any context reference and attachment carried by user messages.

use crate::llm::{ChatMessage, Role};
use crate::mention::ImportedReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of trailing messages sent as history
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Something the user attached to a message
///
/// Serialized with a `type` tag. On input, any tag other than `image` or
/// `url` is a file, and a tag that is not `file` is kept as its MIME type.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    /// Image noted by name; the data URL is kept for export only
    Image {
        name: String,
        #[serde(default)]
        data: String,
    },
    /// Text fetched from a web page
    Url { url: String, content: String },
    /// A file; `content` is present for text files
    File {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawAttachment {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    mime: Option<String>,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        match raw.kind.as_str() {
            "image" => Attachment::Image {
                name: raw.name,
                data: raw.data.unwrap_or_default(),
            },
            "url" => Attachment::Url {
                url: raw.url.unwrap_or_default(),
                content: raw.content.unwrap_or_default(),
            },
            kind => {
                let mime = match kind {
                    "" | "file" => raw.mime,
                    other => Some(other.to_string()),
                };
                Attachment::File {
                    name: raw.name,
                    mime,
                    content: raw.content,
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for Attachment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawAttachment::deserialize(deserializer).map(Attachment::from)
    }
}

impl Attachment {
    /// File name, or the URL for fetched pages
    pub fn label(&self) -> &str {
        match self {
            Attachment::Image { name, .. } | Attachment::File { name, .. } => name,
            Attachment::Url { url, .. } => url,
        }
    }

    fn marker(&self) -> String {
        match self {
            Attachment::Url { url, content } => {
                format!("[Web page content from: {}]\n{}\n\n", url, content)
            }
            Attachment::Image { name, .. } => format!("[User uploaded an image: {}]\n\n", name),
            Attachment::File { name, content, .. } => format!(
                "[User uploaded a file: {}]\n{}\n\n",
                name,
                content.as_deref().unwrap_or("")
            ),
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    /// Mention token of the responding model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Snapshot of the referenced content at send time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ImportedReference>,
}

impl Message {
    pub fn user(
        id: u64,
        content: impl Into<String>,
        attachment: Option<Attachment>,
        context: Option<ImportedReference>,
    ) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            model: None,
            timestamp: Utc::now(),
            attachment,
            context,
        }
    }

    pub fn assistant(id: u64, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            model: Some(model.into()),
            timestamp: Utc::now(),
            attachment: None,
            context: None,
        }
    }

    /// Content as sent to a model, with context and attachment markers
    pub fn rendered_content(&self) -> String {
        if self.role != Role::User {
            return self.content.clone();
        }

        let mut rendered = String::new();
        if let Some(context) = &self.context {
            rendered.push_str(&format!(
                "[Referenced content: {}]\n{}\n\n",
                context.name, context.content
            ));
        }
        if let Some(attachment) = &self.attachment {
            rendered.push_str(&attachment.marker());
        }

        let question = self.context.is_some()
            || matches!(self.attachment, Some(Attachment::Url { .. }));
        if question {
            rendered.push_str("User question: ");
        }
        rendered.push_str(&self.content);
        rendered
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            desc: desc.into(),
            messages: Vec::new(),
        }
    }
}

/// The last `window` messages of a channel as chat turns, oldest first
pub fn build_history(channel: &Channel, window: usize) -> Vec<ChatMessage> {
    let start = channel.messages.len().saturating_sub(window);
    channel.messages[start..]
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role,
            content: msg.rendered_content(),
        })
        .collect()
}
