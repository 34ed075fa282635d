//! Per-invocation loop bounds

use crate::errors::{AgentError, Result};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_TURNS: usize = 15;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Turn counter and wall-clock deadline for one `AgentLoop::run`
#[derive(Debug, Clone)]
pub struct LoopState {
    turns_taken: usize,
    max_turns: usize,
    deadline: Instant,
    timeout: Duration,
}

impl LoopState {
    /// Start the clock now
    pub fn new(max_turns: usize, timeout: Duration) -> Self {
        Self {
            turns_taken: 0,
            max_turns,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Fails when no further engine exchange is permitted
    pub fn check(&self) -> Result<()> {
        if self.turns_taken >= self.max_turns {
            return Err(self.exceeded(format!("turn limit of {} reached", self.max_turns)));
        }
        if Instant::now() >= self.deadline {
            return Err(self.exceeded(format!(
                "time limit of {}s reached",
                self.timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Count one engine exchange
    pub fn begin_turn(&mut self) {
        self.turns_taken += 1;
    }

    /// True once the current exchange is the last one permitted
    pub fn is_last_turn(&self) -> bool {
        self.turns_taken >= self.max_turns
    }

    pub fn exceeded(&self, reason: impl Into<String>) -> AgentError {
        AgentError::LoopBoundExceeded {
            turns: self.turns_taken,
            reason: reason.into(),
        }
    }

    pub fn turns_taken(&self) -> usize {
        self.turns_taken
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT)
    }
}
