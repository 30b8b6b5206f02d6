//! Short-term memory stores
//!
//! [`FileShortTermStore`] keeps one JSON file per session under a storage
//! directory; [`InMemoryShortTermStore`] is the in-process equivalent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{MemoryMessage, ShortTermMemory};
use crate::errors::{QaError, Result};
use crate::types::Role;

/// Most recent `limit` messages, oldest first
fn tail(messages: &[MemoryMessage], limit: usize) -> Vec<MemoryMessage> {
    let start = messages.len().saturating_sub(limit);
    messages[start..].to_vec()
}

/// Session log held in memory
#[derive(Debug, Default)]
pub struct InMemoryShortTermStore {
    sessions: Mutex<HashMap<String, Vec<MemoryMessage>>>,
}

impl InMemoryShortTermStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShortTermMemory for InMemoryShortTermStore {
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| QaError::Memory(format!("session lock poisoned: {}", e)))?;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(MemoryMessage::new(role, content));
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryMessage>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| QaError::Memory(format!("session lock poisoned: {}", e)))?;
        Ok(sessions.get(session_id).map(|m| tail(m, limit)).unwrap_or_default())
    }
}

/// Session log persisted as JSON files
pub struct FileShortTermStore {
    storage_dir: PathBuf,
    // Serialises read-modify-write of session files within this process
    write_lock: tokio::sync::Mutex<()>,
}

impl FileShortTermStore {
    /// Create store, creating the storage directory if needed
    pub fn new(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            QaError::Memory(format!(
                "Failed to create memory directory {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            storage_dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Storage directory
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// One file per exact session id, named by its hash
    fn session_path(&self, session_id: &str) -> PathBuf {
        let digest = blake3::hash(session_id.as_bytes());
        self.storage_dir.join(format!("session_{}.json", digest.to_hex()))
    }

    async fn load(&self, path: &Path) -> Result<Vec<MemoryMessage>> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| QaError::Memory(format!("Corrupt session file {}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(QaError::Memory(format!(
                "Failed to read session file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl ShortTermMemory for FileShortTermStore {
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(session_id);

        let mut messages = self.load(&path).await?;
        messages.push(MemoryMessage::new(role, content));

        let json = serde_json::to_string_pretty(&messages)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| QaError::Memory(format!("Failed to write session file {}: {}", path.display(), e)))?;

        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryMessage>> {
        let messages = self.load(&self.session_path(session_id)).await?;
        Ok(tail(&messages, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_recent_is_chronological() {
        let store = InMemoryShortTermStore::new();
        for i in 0..5 {
            store.append("s1", Role::User, &format!("m{}", i)).await.unwrap();
        }
        store.append("s2", Role::User, "other").await.unwrap();

        let recent = store.recent("s1", 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        assert!(store.recent("missing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileShortTermStore::new(dir.path()).unwrap();
            store.append("sess-1", Role::User, "What is a planner?").await.unwrap();
            store.append("sess-1", Role::Assistant, "It splits work.").await.unwrap();
        }

        let store = FileShortTermStore::new(dir.path()).unwrap();
        let recent = store.recent("sess-1", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].role, Role::User);
        assert_eq!(recent[1].content, "It splits work.");
    }

    #[tokio::test]
    async fn test_file_store_limit_and_missing_session() {
        let dir = TempDir::new().unwrap();
        let store = FileShortTermStore::new(dir.path().join("nested")).unwrap();
        for i in 0..4 {
            store.append("s", Role::User, &format!("m{}", i)).await.unwrap();
        }

        let recent = store.recent("s", 2).await.unwrap();
        assert_eq!(recent[0].content, "m2");
        assert_eq!(recent[1].content, "m3");
        assert!(store.recent("nobody", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_sanitises_session_id() {
        let dir = TempDir::new().unwrap();
        let store = FileShortTermStore::new(dir.path()).unwrap();
        store.append("../escape", Role::User, "hi").await.unwrap();

        assert!(store.session_path("../escape").starts_with(dir.path()));
        assert_eq!(store.recent("../escape", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_keeps_punctuation_variants_apart() {
        let dir = TempDir::new().unwrap();
        let store = FileShortTermStore::new(dir.path()).unwrap();
        store.append("alice.work", Role::User, "from alice.work").await.unwrap();

        assert!(store.recent("alice_work", 10).await.unwrap().is_empty());
        assert!(store.recent("alice-work", 10).await.unwrap().is_empty());
        assert_ne!(store.session_path("alice.work"), store.session_path("alice_work"));

        store.append("alice_work", Role::User, "from alice_work").await.unwrap();
        let work = store.recent("alice.work", 10).await.unwrap();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].content, "from alice.work");
    }
}
