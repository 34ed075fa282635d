//! Conversation sessions
//!
//! Components:
//! - `ConversationStore`: injected history storage, keyed by user id
//! - `InMemoryConversationStore` / `JsonFileConversationStore`: implementations
//! - `FallbackResponder`: degraded answer when the loop aborts
//! - `Assistant`: history in, agent loop, fallback, history out

pub mod assistant;
pub mod fallback;
pub mod memory_store;
pub mod persistence;

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use assistant::{Assistant, AssistantReply};
pub use fallback::{FallbackResponder, OfflineFallback};
pub use memory_store::InMemoryConversationStore;
pub use persistence::JsonFileConversationStore;

/// One completed user/assistant exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub user: String,
    pub assistant: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            assistant: assistant.into(),
            created_at: Utc::now(),
        }
    }
}

/// History storage
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The most recent `limit` turns for `user_id`, oldest first
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()>;

    async fn clear(&self, user_id: &str) -> Result<()>;
}

/// Keep the last `limit` entries of `turns`
pub(crate) fn tail(turns: &[ConversationTurn], limit: usize) -> Vec<ConversationTurn> {
    let start = turns.len().saturating_sub(limit);
    turns[start..].to_vec()
}
