//! Transcript and exchange types for the reasoning channel

use crate::tools::types::{ToolCall, ToolResult, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One block of engine output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

/// Tool output fed back to the engine, tagged with the originating call id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    /// JSON-serialized `ToolResult`
    pub content: String,
    pub is_error: bool,
}

impl ToolResultBlock {
    pub fn from_result(call_id: impl Into<String>, result: &ToolResult) -> Self {
        Self {
            tool_use_id: call_id.into(),
            content: result.to_engine_text(),
            is_error: !result.success,
        }
    }
}

/// One entry of the running transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant { content: Vec<ContentBlock> },
    ToolResults { results: Vec<ToolResultBlock> },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Turn::Assistant {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// Why the engine stopped producing output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Everything the engine sees for one exchange
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub system: String,
    pub transcript: Vec<Turn>,
    pub tools: Vec<ToolSchema>,
    pub max_tokens: u32,
}

/// Engine reply for one exchange
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
}

impl EngineResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    /// Tool-use blocks as executor calls, in the order the engine emitted them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(id.clone(), name.clone(), input.clone()))
                }
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Text blocks joined with newlines
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.trim()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reasoning channel failure
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16, retry_after_ms: Option<u64> },

    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Transient faults worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Network(_) | EngineError::RateLimited { .. } | EngineError::Server { .. }
        )
    }

    /// Server-suggested wait, when one was given
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            EngineError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::InvalidResponse(err.to_string())
        } else {
            EngineError::Network(err.to_string())
        }
    }
}
