//! Telemetry for guardhouse
//!
//! In-process event collection for engine exchanges, tool executions and
//! loop outcomes, with aggregate stats for the CLI summary.
//!
//! The event log is a ring buffer: once full, the oldest events are dropped.
//! Aggregate stats still count every event ever recorded.

use colored::Colorize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Events kept by `TelemetryCollector::new`
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
    EngineExchange {
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
    ToolCompleted {
        tool: String,
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
    LoopFinished {
        turns: usize,
        aborted: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub state_transitions: usize,
    pub engine_exchanges: usize,
    pub engine_failures: usize,
    pub tools_executed: usize,
    pub tools_succeeded: usize,
    pub tools_failed: usize,
    pub loops_completed: usize,
    pub loops_aborted: usize,
    pub total_turns: usize,
}

/// Shared event collector; clones record into the same buffers
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    capacity: usize,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Keep at most `capacity` events (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            capacity,
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::StateTransition { .. } => stats.state_transitions += 1,
                TelemetryEvent::EngineExchange { success, .. } => {
                    stats.engine_exchanges += 1;
                    if !success {
                        stats.engine_failures += 1;
                    }
                }
                TelemetryEvent::ToolCompleted { success, .. } => {
                    stats.tools_executed += 1;
                    if *success {
                        stats.tools_succeeded += 1;
                    } else {
                        stats.tools_failed += 1;
                    }
                }
                TelemetryEvent::LoopFinished { turns, aborted, .. } => {
                    stats.total_turns += turns;
                    if *aborted {
                        stats.loops_aborted += 1;
                    } else {
                        stats.loops_completed += 1;
                    }
                }
            }
        }

        let mut events = lock(&self.events);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn state_transition(&self, from: impl Into<String>, to: impl Into<String>) {
        self.record(TelemetryEvent::StateTransition {
            from: from.into(),
            to: to.into(),
            timestamp: Instant::now(),
        });
    }

    pub fn engine_exchange(&self, duration: Duration, success: bool) {
        self.record(TelemetryEvent::EngineExchange {
            duration_ms: duration.as_millis() as u64,
            success,
            timestamp: Instant::now(),
        });
    }

    pub fn tool_completed(&self, tool: impl Into<String>, duration_ms: u64, success: bool) {
        self.record(TelemetryEvent::ToolCompleted {
            tool: tool.into(),
            duration_ms,
            success,
            timestamp: Instant::now(),
        });
    }

    pub fn loop_finished(&self, turns: usize, aborted: bool) {
        self.record(TelemetryEvent::LoopFinished {
            turns,
            aborted,
            timestamp: Instant::now(),
        });
    }

    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Events currently retained, not the lifetime total
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    pub fn tool_success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        let total = stats.tools_succeeded + stats.tools_failed;
        if total == 0 {
            1.0
        } else {
            stats.tools_succeeded as f64 / total as f64
        }
    }

    /// Render a short multi-line summary for the terminal
    pub fn summary(&self) -> String {
        let stats = self.get_stats();
        format!(
            "{}\n  duration:        {:?}\n  engine calls:    {} ({} failed)\n  tools executed:  {} ({:.1}% ok)\n  loops:           {} done, {} aborted",
            "Session summary".bold(),
            self.elapsed(),
            stats.engine_exchanges,
            stats.engine_failures,
            stats.tools_executed,
            self.tool_success_rate() * 100.0,
            stats.loops_completed,
            stats.loops_aborted,
        )
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
