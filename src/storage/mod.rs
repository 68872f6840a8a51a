//! Persistent storage for teamhub
//!
//! Layout (data dir from `directories`, or `--data-dir`):
//!
//! <data dir>/
//! └── workspace.json      # credentials, channels, transcripts, mentionables
//!
//! The workspace is loaded once at start and written back after every
//! mutation. Writes go to a temp file first and are renamed into place.

mod backup;

pub use backup::{channel_markdown, Backup, ChannelMeta, BACKUP_VERSION};

use crate::workspace::Workspace;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const WORKSPACE_FILE: &str = "workspace.json";

/// JSON file holding one [`Workspace`]
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    path: PathBuf,
}

impl WorkspaceStore {
    /// Store rooted at `dir`, created if missing
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;
        Ok(Self {
            path: dir.join(WORKSPACE_FILE),
        })
    }

    /// Platform data directory for teamhub
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "teamhub")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".teamhub"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the workspace, or a fresh one if nothing is stored yet
    pub fn load(&self) -> Result<Workspace> {
        if !self.path.exists() {
            tracing::debug!("No workspace at {}, starting fresh", self.path.display());
            return Ok(Workspace::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let mut workspace: Workspace =
            serde_json::from_str(&content).context("Failed to parse workspace file")?;
        workspace.repair();
        Ok(workspace)
    }

    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        let content = serde_json::to_string_pretty(workspace)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Delete the stored workspace
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderRegistry;
    use crate::conversation::Message;
    use crate::mention::ReferenceSource;
    use crate::workspace::{CredentialStore, TranscriptStore};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_fresh() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp.path().join("nested")).unwrap();

        let ws = store.load().unwrap();
        assert_eq!(ws.channels().len(), 1);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp.path()).unwrap();
        let registry = ProviderRegistry::builtin();

        let mut ws = Workspace::default();
        ws.credentials.set("claudeKey", "sk-ant-1");
        ws.create_channel("research").unwrap();
        ws.add_reference(&registry, "Paper", ReferenceSource::Other, "abstract")
            .unwrap();
        let id = ws.allocate_message_id();
        ws.append("research", Message::user(id, "hello", None, None))
            .unwrap();
        store.save(&ws).unwrap();

        let mut loaded = store.load().unwrap();
        assert_eq!(loaded.credentials.get("claudeKey").as_deref(), Some("sk-ant-1"));
        assert_eq!(loaded.read("research").len(), 1);
        assert_eq!(loaded.references[0].mention, "paper");
        assert!(loaded.allocate_message_id() > id);
    }

    #[test]
    fn test_clear_removes_file() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp.path()).unwrap();
        store.save(&Workspace::default()).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp.path()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_err());
    }
}
