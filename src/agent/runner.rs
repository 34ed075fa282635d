//! Agent loop
//!
//! Drives one user message through repeated engine exchanges:
//! - Engine returns tool-use blocks: run them in order, feed results back
//! - Engine returns only text: that text is the answer
//! - Turn or time ceiling hit, or channel failure: abort with an error
//!
//! All per-invocation state (transcript, bounds, FSM state) lives inside
//! `run`, so one `AgentLoop` serves concurrent invocations.

use crate::agent::loop_state::{LoopState, DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT};
use crate::agent::state::{AgentState, StateEvent};
use crate::config::Config;
use crate::engine::{EngineRequest, ReasoningEngine, ToolResultBlock, Turn};
use crate::errors::{AgentError, Result};
use crate::session::ConversationTurn;
use crate::telemetry::TelemetryCollector;
use crate::tools::executor::ToolExecutor;
use crate::tools::types::ToolResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Loop tuning
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_turns: usize,
    pub timeout: Duration,
    pub max_tokens: u32,
    /// Replaces the generated system prompt when set
    pub system_prompt: Option<String>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: 1024,
            system_prompt: None,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_turns: config.agent.max_turns,
            timeout: Duration::from_secs(config.agent.timeout_sec),
            max_tokens: config.engine.max_tokens,
            system_prompt: config.agent.system_prompt.clone(),
        }
    }
}

/// Successful loop result
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    pub turns_taken: usize,
    /// Every tool result produced, in execution order
    pub tool_results: Vec<ToolResult>,
    pub transcript: Vec<Turn>,
}

pub struct AgentLoop {
    engine: Arc<dyn ReasoningEngine>,
    executor: Arc<ToolExecutor>,
    settings: LoopSettings,
    telemetry: Option<TelemetryCollector>,
}

impl AgentLoop {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        executor: Arc<ToolExecutor>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            engine,
            executor,
            settings,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run one message to completion
    ///
    /// Errors are limited to `LoopBoundExceeded` and `EngineUnavailable`;
    /// tool failures are fed back to the engine, never returned.
    pub async fn run(&self, prior: &[ConversationTurn], message: &str) -> Result<LoopOutcome> {
        let mut state = AgentState::AwaitingEngine;
        let mut bounds = LoopState::new(self.settings.max_turns, self.settings.timeout);
        let mut request = EngineRequest {
            system: self.system_prompt(),
            transcript: seed_transcript(prior, message),
            tools: self.executor.registry().manifest(),
            max_tokens: self.settings.max_tokens,
        };
        let mut tool_results = Vec::new();

        loop {
            if let Err(e) = bounds.check() {
                return Err(self.abort(&mut state, &bounds, StateEvent::BoundExceeded, e));
            }
            bounds.begin_turn();
            debug!(
                turn = bounds.turns_taken(),
                remaining_ms = bounds.remaining().as_millis() as u64,
                "engine exchange"
            );

            let started = Instant::now();
            let exchange =
                tokio::time::timeout_at(bounds.deadline(), self.engine.respond(&request)).await;
            let response = match exchange {
                Ok(Ok(response)) => {
                    self.record_exchange(started, true);
                    response
                }
                Ok(Err(e)) => {
                    self.record_exchange(started, false);
                    warn!(engine = self.engine.name(), error = %e, "engine exchange failed");
                    let err = AgentError::EngineUnavailable(e.to_string());
                    return Err(self.abort(&mut state, &bounds, StateEvent::EngineFailed, err));
                }
                Err(_) => {
                    self.record_exchange(started, false);
                    let err = bounds.exceeded(format!(
                        "time limit of {}s reached while waiting for the engine",
                        bounds.timeout().as_secs()
                    ));
                    return Err(self.abort(&mut state, &bounds, StateEvent::BoundExceeded, err));
                }
            };

            if !response.has_tool_use() {
                self.advance(&mut state, StateEvent::FinalAnswer)?;
                let answer = response.text_content();
                request.transcript.push(Turn::Assistant {
                    content: response.content,
                });
                info!(turns = bounds.turns_taken(), tools = tool_results.len(), "agent loop done");
                self.record_finish(&bounds, false);
                return Ok(LoopOutcome {
                    answer,
                    turns_taken: bounds.turns_taken(),
                    tool_results,
                    transcript: request.transcript,
                });
            }

            if bounds.is_last_turn() {
                let err = bounds.exceeded(format!(
                    "turn limit of {} reached with tool calls pending",
                    bounds.max_turns()
                ));
                return Err(self.abort(&mut state, &bounds, StateEvent::BoundExceeded, err));
            }

            self.advance(&mut state, StateEvent::ToolUseRequested)?;
            let calls = response.tool_calls();
            request.transcript.push(Turn::Assistant {
                content: response.content,
            });

            let mut blocks = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self.executor.execute(call).await;
                debug!(
                    turn = bounds.turns_taken(),
                    tool = %call.name,
                    success = result.success,
                    "tool result"
                );
                if let Some(telemetry) = &self.telemetry {
                    telemetry.tool_completed(&result.tool, result.duration_ms, result.success);
                }
                blocks.push(ToolResultBlock::from_result(&call.id, &result));
                tool_results.push(result);
            }
            request.transcript.push(Turn::ToolResults { results: blocks });

            self.advance(&mut state, StateEvent::ToolsCompleted)?;
        }
    }

    fn advance(&self, state: &mut AgentState, event: StateEvent) -> Result<()> {
        let next = state.transition(event)?;
        if let Some(telemetry) = &self.telemetry {
            telemetry.state_transition(state.display_name(), next.display_name());
        }
        *state = next;
        Ok(())
    }

    fn abort(
        &self,
        state: &mut AgentState,
        bounds: &LoopState,
        event: StateEvent,
        err: AgentError,
    ) -> AgentError {
        if let Err(transition_err) = self.advance(state, event) {
            return transition_err;
        }
        warn!(turns = bounds.turns_taken(), error = %err, "agent loop aborted");
        self.record_finish(bounds, true);
        err
    }

    fn record_exchange(&self, started: Instant, success: bool) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.engine_exchange(started.elapsed(), success);
        }
    }

    fn record_finish(&self, bounds: &LoopState, aborted: bool) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.loop_finished(bounds.turns_taken(), aborted);
        }
    }

    fn system_prompt(&self) -> String {
        match &self.settings.system_prompt {
            Some(prompt) => prompt.clone(),
            None => default_system_prompt(&self.executor),
        }
    }
}

/// Prior turns as user/assistant pairs, then the new message
fn seed_transcript(prior: &[ConversationTurn], message: &str) -> Vec<Turn> {
    let mut transcript = Vec::with_capacity(prior.len() * 2 + 1);
    for turn in prior {
        transcript.push(Turn::user(turn.user.clone()));
        transcript.push(Turn::assistant_text(turn.assistant.clone()));
    }
    transcript.push(Turn::user(message));
    transcript
}

fn default_system_prompt(executor: &ToolExecutor) -> String {
    let guard = executor.path_guard();
    let zones: Vec<String> = guard
        .writable_zones()
        .iter()
        .map(|zone| guard.relative_to_root(zone).display().to_string())
        .collect();
    let zones = if zones.is_empty() {
        "none".to_string()
    } else {
        zones.join(", ")
    };

    format!(
        "You are a careful assistant with sandboxed tool access.\n\n\
         TOOL RULES:\n\
         1. Paths are relative to the project root; you cannot leave it.\n\
         2. You may only write or delete inside: {}.\n\
         3. Read a file before modifying it, and explain changes before writing.\n\
         4. Commands must start with one of: {}.\n\
         5. A failed tool call returns an error message; adjust instead of repeating it.\n\n\
         Answer in plain text once you have what you need.",
        zones,
        executor.command_guard().allow_prefixes().join(", ").trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContentBlock, EngineError, EngineResponse};
    use crate::tools::security::{CommandGuard, PathGuard};
    use crate::tools::types::ToolContext;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses and records every request
    struct ScriptedEngine {
        responses: Mutex<VecDeque<std::result::Result<EngineResponse, EngineError>>>,
        requests: Mutex<Vec<EngineRequest>>,
    }

    impl ScriptedEngine {
        fn new(responses: Vec<std::result::Result<EngineResponse, EngineError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn respond(
            &self,
            request: &EngineRequest,
        ) -> std::result::Result<EngineResponse, EngineError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EngineResponse::text("out of script")))
        }
    }

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> EngineResponse {
        EngineResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: None,
        }
    }

    fn executor(temp: &TempDir) -> Arc<ToolExecutor> {
        let guard = PathGuard::new(temp.path())
            .unwrap()
            .with_writable_zones(["data"])
            .unwrap();
        Arc::new(ToolExecutor::new(
            guard,
            CommandGuard::default(),
            ToolContext::default(),
        ))
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(EngineResponse::text("hi there"))]));
        let agent = AgentLoop::new(engine.clone(), executor(&temp), LoopSettings::default());

        let outcome = agent.run(&[], "hello").await.unwrap();
        assert_eq!(outcome.answer, "hi there");
        assert_eq!(outcome.turns_taken, 1);
        assert!(outcome.tool_results.is_empty());

        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 5);
        assert!(requests[0].system.contains("data"));
    }

    #[tokio::test]
    async fn test_tool_results_fed_back_with_call_id() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes.txt"), "remember milk").unwrap();

        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(tool_use("toolu_a", "read_file", json!({"path": "notes.txt"}))),
            Ok(EngineResponse::text("You need milk.")),
        ]));
        let agent = AgentLoop::new(engine.clone(), executor(&temp), LoopSettings::default());

        let outcome = agent.run(&[], "what do I need?").await.unwrap();
        assert_eq!(outcome.answer, "You need milk.");
        assert_eq!(outcome.turns_taken, 2);
        assert!(outcome.tool_results[0].success);

        let requests = engine.requests.lock().unwrap();
        match requests[1].transcript.last().unwrap() {
            Turn::ToolResults { results } => {
                assert_eq!(results[0].tool_use_id, "toolu_a");
                assert!(results[0].content.contains("remember milk"));
                assert!(!results[0].is_error);
            }
            other => panic!("unexpected turn: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prior_history_seeds_transcript() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(EngineResponse::text("ok"))]));
        let agent = AgentLoop::new(engine.clone(), executor(&temp), LoopSettings::default());
        let prior = vec![ConversationTurn::new("first", "reply")];

        agent.run(&prior, "second").await.unwrap();

        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests[0].transcript.len(), 3);
        assert_eq!(requests[0].transcript[2], Turn::user("second"));
    }

    #[tokio::test]
    async fn test_engine_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![Err(EngineError::Auth(
            "bad key".to_string(),
        ))]));
        let agent = AgentLoop::new(engine, executor(&temp), LoopSettings::default());

        let err = agent.run(&[], "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::EngineUnavailable(_)));
        assert!(err.is_abort());
    }

    #[tokio::test]
    async fn test_tool_use_on_last_turn_not_executed() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(tool_use(
            "toolu_w",
            "write_file",
            json!({"path": "data/x.txt", "content": "x"}),
        ))]));
        let settings = LoopSettings {
            max_turns: 1,
            ..LoopSettings::default()
        };
        let agent = AgentLoop::new(engine, executor(&temp), settings);

        let err = agent.run(&[], "write").await.unwrap_err();
        assert!(matches!(err, AgentError::LoopBoundExceeded { turns: 1, .. }));
        assert!(!temp.path().join("data/x.txt").exists());
    }

    #[tokio::test]
    async fn test_custom_system_prompt() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(EngineResponse::text("ok"))]));
        let settings = LoopSettings {
            system_prompt: Some("Be brief.".to_string()),
            ..LoopSettings::default()
        };
        let agent = AgentLoop::new(engine.clone(), executor(&temp), settings);
        agent.run(&[], "hi").await.unwrap();

        assert_eq!(engine.requests.lock().unwrap()[0].system, "Be brief.");
    }

    #[tokio::test]
    async fn test_telemetry_records_loop() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(tool_use("t1", "list_files", json!({}))),
            Ok(EngineResponse::text("done")),
        ]));
        let telemetry = TelemetryCollector::new();
        let agent = AgentLoop::new(engine, executor(&temp), LoopSettings::default())
            .with_telemetry(telemetry.clone());

        agent.run(&[], "list").await.unwrap();

        let stats = telemetry.get_stats();
        assert_eq!(stats.engine_exchanges, 2);
        assert_eq!(stats.tools_executed, 1);
        assert_eq!(stats.loops_completed, 1);
        assert_eq!(stats.state_transitions, 3);
    }
}
