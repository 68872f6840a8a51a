//! teamhub: one chat, many models
//!
//! This library provides:
//! - A built-in provider catalog and `@mention` resolution over it
//! - Channels with append-only transcripts and bounded history assembly
//! - Sequential dispatch of a message to every mentioned model
//! - Adapters that shape requests for each vendor and normalize the replies
//! - An HTTP proxy and channel API, plus a CLI over the same workspace

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod fetch;
pub mod llm;
pub mod mention;
pub mod storage;
pub mod transport;
pub mod workspace;

pub use config::Config;
pub use dispatch::{Dispatcher, SendReport};
pub use storage::WorkspaceStore;
pub use workspace::Workspace;
