//! Persisted navigation state.
//!
//! The checkpoint is advisory: it lets a returning user resume at the
//! same logical position, but it is never a source of truth for the
//! in-memory window. The three fields are written as one atomic group
//! after every committed navigator transition.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::records::RecordId;

/// Snapshot of the navigator's committed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavCheckpoint {
    /// Full ordered identifier list currently known.
    pub nav_ids: Vec<RecordId>,
    /// Current logical index into the collection.
    pub nav_index: usize,
    /// 1-based page owning `nav_index`; kept in sync for display/debugging.
    pub nav_page: u32,
}

/// Session-scoped key/value storage for the navigation checkpoint.
///
/// Implementations must guarantee read-after-write within a session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<NavCheckpoint>>;
    async fn save(&self, checkpoint: &NavCheckpoint) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    slot: Mutex<Option<NavCheckpoint>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<NavCheckpoint>> {
        Ok(self.slot.lock().expect("session slot poisoned").clone())
    }

    async fn save(&self, checkpoint: &NavCheckpoint) -> Result<()> {
        *self.slot.lock().expect("session slot poisoned") = Some(checkpoint.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock().expect("session slot poisoned") = None;
        Ok(())
    }
}

/// JSON file store used by the CLI; one file per session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<NavCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))
            .map_err(NavError::Store)?;
        let checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))
            .map_err(NavError::Store)?;
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &NavCheckpoint) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create session directory: {}", dir.display()))
                .map_err(NavError::Store)?;
        }
        let content = serde_json::to_string(checkpoint)
            .context("Failed to serialize session checkpoint")
            .map_err(NavError::Store)?;
        // Write-then-rename keeps the three fields atomic as a group.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write session file: {}", tmp.display()))
            .map_err(NavError::Store)?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to commit session file: {}", self.path.display()))
            .map_err(NavError::Store)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display()))
                .map_err(NavError::Store)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> NavCheckpoint {
        NavCheckpoint {
            nav_ids: vec![RecordId::from("a"), RecordId::from("b")],
            nav_index: 1,
            nav_page: 1,
        }
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemorySessionStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&checkpoint()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(checkpoint()));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("merchmail-session-{}", std::process::id()));
        let store = FileSessionStore::new(dir.join("session.json"));

        assert!(store.load().await.unwrap().is_none());
        store.save(&checkpoint()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(checkpoint()));

        // Overwrite keeps the latest group of fields
        let mut next = checkpoint();
        next.nav_index = 0;
        store.save(&next).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().nav_index, 0);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
