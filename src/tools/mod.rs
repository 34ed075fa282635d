//! Tool execution system
//!
//! Provides guarded tool execution with:
//! - Five filesystem/process tools plus optional image generation
//! - Path confinement with writable zones and forbidden extensions
//! - Command allow/deny filtering
//! - A single executor that turns every outcome into a `ToolResult`

pub mod executor;
pub mod implementations;
pub mod registry;
pub mod security;
pub mod types;

pub use executor::ToolExecutor;
pub use registry::{ToolKind, ToolRegistry, ToolSpec};
pub use security::{CommandGuard, PathGuard, PathIntent};
pub use types::{ToolCall, ToolContext, ToolResult, ToolSchema};
