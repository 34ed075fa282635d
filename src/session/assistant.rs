//! Assistant facade
//!
//! Loads bounded history, runs the agent loop, substitutes the fallback
//! answer when the loop aborts, and persists the finished turn.

use crate::agent::{AgentLoop, LoopOutcome};
use crate::errors::Result;
use crate::session::{ConversationStore, ConversationTurn, FallbackResponder, OfflineFallback};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Reply handed back to the caller
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    /// True when the fallback responder produced `text`
    pub degraded: bool,
    /// Present when the loop completed
    pub outcome: Option<LoopOutcome>,
}

pub struct Assistant {
    agent: Arc<AgentLoop>,
    store: Arc<dyn ConversationStore>,
    fallback: Arc<dyn FallbackResponder>,
    history_limit: usize,
}

impl Assistant {
    pub fn new(agent: Arc<AgentLoop>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            agent,
            store,
            fallback: Arc::new(OfflineFallback),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackResponder>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Handle one message from `user_id`
    ///
    /// Loop aborts become a degraded reply; other errors (storage, invalid
    /// state) propagate.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<AssistantReply> {
        let prior = self.store.history(user_id, self.history_limit).await?;

        let reply = match self.agent.run(&prior, message).await {
            Ok(outcome) if outcome.answer.trim().is_empty() => {
                warn!(user = user_id, "engine finished without text, using fallback");
                AssistantReply {
                    text: self.fallback.respond(message),
                    degraded: true,
                    outcome: Some(outcome),
                }
            }
            Ok(outcome) => AssistantReply {
                text: outcome.answer.clone(),
                degraded: false,
                outcome: Some(outcome),
            },
            Err(e) if e.is_abort() => {
                info!(user = user_id, reason = %e, "agent loop aborted, using fallback");
                AssistantReply {
                    text: self.fallback.respond(message),
                    degraded: true,
                    outcome: None,
                }
            }
            Err(e) => return Err(e),
        };

        self.store
            .append(user_id, ConversationTurn::new(message, reply.text.clone()))
            .await?;

        Ok(reply)
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }
}
