//! Agent loop state machine
//!
//! Four states, two of them terminal:
//! - AwaitingEngine: transcript sent (or about to be), waiting for output
//! - ExecutingTools: running the tool batch the engine requested
//! - Done: engine produced a final answer (terminal)
//! - Aborted: bound exceeded or engine unreachable (terminal)

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    AwaitingEngine,
    ExecutingTools,
    Done,
    Aborted,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Engine response contains tool-use blocks
    ToolUseRequested,

    /// Engine response contains no tool-use blocks
    FinalAnswer,

    /// Every call in the batch produced a result
    ToolsCompleted,

    /// Turn or time ceiling hit
    BoundExceeded,

    /// Channel failure after retries
    EngineFailed,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Done | AgentState::Aborted)
    }

    /// Transition table:
    /// 1. AwaitingEngine -> ExecutingTools  (ToolUseRequested)
    /// 2. AwaitingEngine -> Done            (FinalAnswer)
    /// 3. AwaitingEngine -> Aborted         (BoundExceeded | EngineFailed)
    /// 4. ExecutingTools -> AwaitingEngine  (ToolsCompleted)
    ///
    /// Terminal states accept no events.
    pub fn transition(&self, event: StateEvent) -> Result<AgentState> {
        use AgentState::*;
        use StateEvent::*;

        let next_state = match (self, event) {
            (AwaitingEngine, ToolUseRequested) => ExecutingTools,
            (AwaitingEngine, FinalAnswer) => Done,
            (AwaitingEngine, BoundExceeded) | (AwaitingEngine, EngineFailed) => Aborted,

            (ExecutingTools, ToolsCompleted) => AwaitingEngine,

            (from, event) => {
                let reason = if from.is_terminal() {
                    format!("{:?} is terminal", from)
                } else {
                    format!(
                        "No valid transition from {:?} on {:?}; expected one of {:?}",
                        from,
                        event,
                        from.valid_events()
                    )
                };
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason,
                });
            }
        };

        Ok(next_state)
    }

    pub fn valid_events(&self) -> Vec<StateEvent> {
        use AgentState::*;
        use StateEvent::*;

        match self {
            AwaitingEngine => vec![ToolUseRequested, FinalAnswer, BoundExceeded, EngineFailed],
            ExecutingTools => vec![ToolsCompleted],
            Done | Aborted => Vec::new(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentState::AwaitingEngine => "Awaiting Engine",
            AgentState::ExecutingTools => "Executing Tools",
            AgentState::Done => "Done",
            AgentState::Aborted => "Aborted",
        }
    }
}
