//! guardhouse - sandboxed tool execution for a remote reasoning engine
//!
//! # Architecture
//!
//! - **tools**: path/command guards, tool registry, guarded executor
//! - **engine**: reasoning-engine trait, Anthropic Messages client, retry
//! - **agent**: bounded multi-turn tool-use loop and its state machine
//! - **session**: conversation history, fallback answers, assistant facade
//! - **config**, **logging**, **telemetry**, **cli**: ambient support

pub mod agent;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod session;
pub mod telemetry;
pub mod tools;

pub use errors::{AgentError, GuardError, Result, ToolError};
