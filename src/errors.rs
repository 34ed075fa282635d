//! Error types for guardhouse
//!
//! Three layers, each with its own enum:
//! - `GuardError`: path and command authorization denials
//! - `ToolError`: anything that can go wrong while running one tool call
//! - `AgentError`: faults that end an agent loop invocation or break startup
//!
//! Guard and tool errors never leave the executor; they are folded into a
//! `ToolResult` and handed back to the reasoning engine as data.

use std::path::PathBuf;
use thiserror::Error;

/// Authorization denial from `PathGuard` or `CommandGuard`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Resolved path is not a descendant of the confinement root
    #[error("path is outside the confinement root: {}", path.display())]
    OutsideRoot { path: PathBuf },

    /// Write or delete outside every writable zone
    #[error("write access denied outside writable zones: {}", path.display())]
    ZoneDenied { path: PathBuf },

    /// Write or delete of a forbidden file type
    #[error("forbidden file extension '{extension}': {}", path.display())]
    ExtensionDenied { path: PathBuf, extension: String },

    /// Command contains a denied fragment
    #[error("forbidden command fragment '{fragment}'")]
    ForbiddenFragment { fragment: String },

    /// Command does not start with an allowed prefix
    #[error("command not in whitelist; allowed prefixes: {allowed:?}")]
    NotWhitelisted { allowed: Vec<String> },
}

/// Failure of a single tool call
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("unknown tool: {name} (available: {available:?})")]
    UnknownTool { name: String, available: Vec<String> },

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Subprocess exceeded its deadline and was killed
    #[error("command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Subprocess ran to completion with a non-zero status
    #[error("command exited with code {exit_code}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    CommandFailed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Catch-all for OS and backend faults during execution
    #[error("execution fault: {0}")]
    ExecutionFault(String),
}

impl ToolError {
    pub fn invalid_args(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::ExecutionFault(err.to_string())
    }
}

/// Main error type for the agent loop and process setup
#[derive(Error, Debug)]
pub enum AgentError {
    /// The reasoning channel is unreachable or rejected the request
    #[error("reasoning engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Turn or time ceiling hit before the engine produced a final answer
    #[error("agent loop bound exceeded after {turns} turns: {reason}")]
    LoopBoundExceeded { turns: usize, reason: String },

    /// State machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

impl AgentError {
    /// Errors that end an invocation in the `Aborted` state; the caller is
    /// expected to substitute a degraded answer for these.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            AgentError::EngineUnavailable(_) | AgentError::LoopBoundExceeded { .. }
        )
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
