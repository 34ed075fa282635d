//! JSON file conversation store
//!
//! One JSON file per user under a storage directory, default
//! `~/.guardhouse/conversations`.

use crate::errors::{AgentError, Result};
use crate::session::{tail, ConversationStore, ConversationTurn};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct JsonFileConversationStore {
    storage_dir: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileConversationStore {
    /// Create the store, creating the directory if needed
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        if !storage_dir.exists() {
            std::fs::create_dir_all(&storage_dir).map_err(|e| {
                AgentError::ConfigError(format!(
                    "Failed to create conversation directory {}: {}",
                    storage_dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            storage_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".guardhouse")
            .join("conversations")
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// One file per distinct user id
    ///
    /// Lowercase letters, digits, `-` and `_` are kept; every other byte is
    /// written as `%XX`. Distinct ids never share a file, even on
    /// case-insensitive filesystems.
    fn user_file(&self, user_id: &str) -> PathBuf {
        let mut stem = String::with_capacity(user_id.len() + 1);
        stem.push('u');
        for byte in user_id.bytes() {
            match byte {
                b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => stem.push(byte as char),
                other => stem.push_str(&format!("%{:02X}", other)),
            }
        }
        self.storage_dir.join(format!("{}.json", stem))
    }

    async fn load(&self, user_id: &str) -> Result<Vec<ConversationTurn>> {
        match tokio::fs::read_to_string(self.user_file(user_id)).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConversationStore for JsonFileConversationStore {
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(tail(&self.load(user_id).await?, limit))
    }

    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut turns = self.load(user_id).await?;
        turns.push(turn);

        let json = serde_json::to_string_pretty(&turns)?;
        tokio::fs::write(self.user_file(user_id), json).await?;
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.user_file(user_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_reload() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileConversationStore::new(temp.path().join("conv")).unwrap();

        store.append("ana", ConversationTurn::new("q1", "a1")).await.unwrap();
        store.append("ana", ConversationTurn::new("q2", "a2")).await.unwrap();

        let reopened = JsonFileConversationStore::new(temp.path().join("conv")).unwrap();
        let history = reopened.history("ana", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].assistant, "a2");
        assert_eq!(reopened.history("ana", 1).await.unwrap()[0].user, "q2");
    }

    #[tokio::test]
    async fn test_user_id_cannot_escape_directory() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileConversationStore::new(temp.path()).unwrap();

        let file = store.user_file("../../etc/passwd");
        assert_eq!(file.parent().unwrap(), temp.path());
        assert_eq!(store.user_file("").parent().unwrap(), temp.path());
    }

    #[tokio::test]
    async fn test_similar_user_ids_do_not_share_history() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileConversationStore::new(temp.path()).unwrap();
        let ids = ["a.b", "a b", "a_b", "A_b", "a%2Eb", ""];

        for id in ids {
            store
                .append(id, ConversationTurn::new(format!("from {id:?}"), "ok"))
                .await
                .unwrap();
        }

        for id in ids {
            let history = store.history(id, 10).await.unwrap();
            assert_eq!(history.len(), 1, "{id:?} shares a file");
            assert_eq!(history[0].user, format!("from {id:?}"));
        }
    }

    #[tokio::test]
    async fn test_clear_missing_user_ok() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileConversationStore::new(temp.path()).unwrap();
        store.clear("ghost").await.unwrap();

        store.append("ghost", ConversationTurn::new("q", "a")).await.unwrap();
        store.clear("ghost").await.unwrap();
        assert!(store.history("ghost", 5).await.unwrap().is_empty());
    }
}
