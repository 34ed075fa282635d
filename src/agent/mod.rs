//! Agent loop module
//!
//! State machine, per-invocation bounds, and the loop runner.

pub mod loop_state;
pub mod runner;
pub mod state;

pub use loop_state::{LoopState, DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT};
pub use runner::{AgentLoop, LoopOutcome, LoopSettings};
pub use state::{AgentState, StateEvent};
