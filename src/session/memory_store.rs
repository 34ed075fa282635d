//! In-memory conversation store

use crate::errors::Result;
use crate::session::{tail, ConversationStore, ConversationTurn};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local history, lost on exit
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    turns: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with stored history
    pub async fn user_count(&self) -> usize {
        self.turns.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let turns = self.turns.read().await;
        Ok(turns
            .get(user_id)
            .map(|history| tail(history, limit))
            .unwrap_or_default())
    }

    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()> {
        self.turns
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<()> {
        self.turns.write().await.remove(user_id);
        Ok(())
    }
}
