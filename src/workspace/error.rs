//! Workspace domain errors
//!
//! Business rule failures for channel and mentionable management, distinct
//! from storage and network errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    /// A channel with this slug already exists
    #[error("Channel already exists: {0}")]
    ChannelExists(String),

    /// No channel with this id
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The name yields no usable mention token
    #[error("'{0}' produces an empty id; use letters, digits or '-'")]
    EmptySlug(String),

    /// Neither text nor attachment was given
    #[error("Message is empty")]
    EmptyMessage,

    /// Nothing with this mention token exists
    #[error("No {kind} is mentionable as @{mention}")]
    UnknownMentionable { kind: &'static str, mention: String },

    /// A required field was blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
