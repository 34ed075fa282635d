//! Reasoning-engine channel
//!
//! The agent loop talks to the engine only through `ReasoningEngine`.
//! `AnthropicEngine` is the production implementation; tests script their own.

pub mod anthropic;
pub mod retry;
pub mod types;

use async_trait::async_trait;

pub use anthropic::AnthropicEngine;
pub use retry::RetryPolicy;
pub use types::{
    ContentBlock, EngineError, EngineRequest, EngineResponse, StopReason, ToolResultBlock, Turn,
};

/// External reasoning engine
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// One exchange: full transcript in, next assistant output back
    async fn respond(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError>;

    /// Engine name for logs
    fn name(&self) -> &str {
        "engine"
    }
}
