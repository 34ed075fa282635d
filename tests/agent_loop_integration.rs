//! End-to-end tests of the agent loop against scripted engines

use async_trait::async_trait;
use guardhouse::agent::{AgentLoop, LoopSettings};
use guardhouse::engine::{
    ContentBlock, EngineError, EngineRequest, EngineResponse, ReasoningEngine, Turn,
};
use guardhouse::session::{Assistant, ConversationStore, InMemoryConversationStore};
use guardhouse::tools::{CommandGuard, PathGuard, ToolCall, ToolContext, ToolExecutor};
use guardhouse::AgentError;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn sandbox(temp: &TempDir) -> Arc<ToolExecutor> {
    let guard = PathGuard::new(temp.path())
        .unwrap()
        .with_writable_zones(["data", "workspace"])
        .unwrap()
        .with_forbidden_extensions([".exe", ".dll", ".sh"]);
    Arc::new(ToolExecutor::new(
        guard,
        CommandGuard::default(),
        ToolContext::default(),
    ))
}

fn settings(max_turns: usize, timeout: Duration) -> LoopSettings {
    LoopSettings {
        max_turns,
        timeout,
        ..LoopSettings::default()
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

/// Requests `list_files` forever
struct RelentlessEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl ReasoningEngine for RelentlessEngine {
    async fn respond(&self, _request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tool_use(&format!("call_{}", n), "list_files", json!({})))
    }
}

/// Replays a fixed script, then answers "done"
struct Script {
    responses: Mutex<VecDeque<EngineResponse>>,
    requests: Mutex<Vec<EngineRequest>>,
}

impl Script {
    fn new(responses: Vec<EngineResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReasoningEngine for Script {
    async fn respond(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| EngineResponse::text("done")))
    }
}

struct SlowEngine;

#[async_trait]
impl ReasoningEngine for SlowEngine {
    async fn respond(&self, _request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(EngineResponse::text("too late"))
    }
}

struct UnreachableEngine;

#[async_trait]
impl ReasoningEngine for UnreachableEngine {
    async fn respond(&self, _request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        Err(EngineError::Network("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_relentless_tool_use_stops_at_turn_limit() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(RelentlessEngine {
        calls: AtomicUsize::new(0),
    });
    let agent = AgentLoop::new(
        engine.clone(),
        sandbox(&temp),
        settings(4, Duration::from_secs(30)),
    );

    let err = agent.run(&[], "list everything").await.unwrap_err();

    match err {
        AgentError::LoopBoundExceeded { turns, .. } => assert_eq!(turns, 4),
        other => panic!("expected LoopBoundExceeded, got {other:?}"),
    }
    assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_slow_engine_hits_time_limit() {
    let temp = TempDir::new().unwrap();
    let agent = AgentLoop::new(
        Arc::new(SlowEngine),
        sandbox(&temp),
        settings(10, Duration::from_millis(200)),
    );

    let started = std::time::Instant::now();
    let err = agent.run(&[], "hello").await.unwrap_err();

    assert!(matches!(err, AgentError::LoopBoundExceeded { turns: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_write_then_append_then_read() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Script::new(vec![
        tool_use(
            "w1",
            "write_file",
            json!({ "path": "data/notes.txt", "content": "first\n" }),
        ),
        tool_use(
            "w2",
            "write_file",
            json!({ "path": "data/notes.txt", "content": "second\n", "mode": "a" }),
        ),
        tool_use("r1", "read_file", json!({ "path": "data/notes.txt" })),
        EngineResponse::text("Saved two lines."),
    ]));
    let agent = AgentLoop::new(
        engine.clone(),
        sandbox(&temp),
        settings(10, Duration::from_secs(30)),
    );

    let outcome = agent.run(&[], "keep notes").await.unwrap();

    assert_eq!(outcome.answer, "Saved two lines.");
    assert_eq!(outcome.turns_taken, 4);
    assert!(outcome.tool_results.iter().all(|r| r.success));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("data/notes.txt")).unwrap(),
        "first\nsecond\n"
    );

    let read = &outcome.tool_results[2];
    assert_eq!(read.payload.as_ref().unwrap()["content"], "first\nsecond\n");

    // Every tool result went back to the engine under its call id
    let requests = engine.requests.lock().unwrap();
    let last = requests.last().unwrap();
    let ids: Vec<&str> = last
        .transcript
        .iter()
        .filter_map(|turn| match turn {
            Turn::ToolResults { results } => Some(results.iter().map(|r| r.tool_use_id.as_str())),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(ids, vec!["w1", "w2", "r1"]);
}

#[tokio::test]
async fn test_denied_calls_are_reported_not_raised() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Script::new(vec![
        tool_use("a", "read_file", json!({ "path": "/etc/passwd" })),
        tool_use(
            "b",
            "write_file",
            json!({ "path": "data/x.exe", "content": "MZ" }),
        ),
        tool_use("c", "run_command", json!({ "command": "rm -rf /" })),
        tool_use("d", "format_disk", json!({})),
        EngineResponse::text("I could not do any of that."),
    ]));
    let agent = AgentLoop::new(
        engine.clone(),
        sandbox(&temp),
        settings(10, Duration::from_secs(30)),
    );

    let outcome = agent.run(&[], "be naughty").await.unwrap();

    assert_eq!(outcome.tool_results.len(), 4);
    assert!(outcome.tool_results.iter().all(|r| !r.success));
    assert!(!temp.path().join("data/x.exe").exists());

    let errors: Vec<&str> = outcome
        .tool_results
        .iter()
        .map(|r| r.error.as_deref().unwrap())
        .collect();
    assert!(errors[0].contains("outside"));
    assert!(errors[1].contains(".exe"));
    assert!(errors[2].contains("rm "));
    assert!(errors[3].contains("format_disk"));

    // Failures reach the engine flagged as errors
    let requests = engine.requests.lock().unwrap();
    let flagged = requests
        .last()
        .unwrap()
        .transcript
        .iter()
        .filter_map(|turn| match turn {
            Turn::ToolResults { results } => Some(results.iter().filter(|r| r.is_error).count()),
            _ => None,
        })
        .sum::<usize>();
    assert_eq!(flagged, 4);
}

#[cfg(unix)]
#[tokio::test]
async fn test_hanging_command_times_out() {
    let temp = TempDir::new().unwrap();
    let guard = PathGuard::new(temp.path()).unwrap();
    let executor = ToolExecutor::new(
        guard,
        CommandGuard::new(["sleep "], ["rm "]),
        ToolContext::default().with_timeout(Duration::from_secs(1)),
    );

    let started = std::time::Instant::now();
    let result = executor
        .execute(&ToolCall::new("t", "run_command", json!({ "command": "sleep 10" })))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn test_timed_out_command_leaves_no_side_effects() {
    let temp = TempDir::new().unwrap();
    let guard = PathGuard::new(temp.path())
        .unwrap()
        .with_writable_zones(["data"])
        .unwrap();
    let executor = ToolExecutor::new(
        guard,
        CommandGuard::new(["sleep "], ["rm "]),
        ToolContext::default(),
    );

    let result = executor
        .execute(&ToolCall::new(
            "t",
            "run_command",
            json!({ "command": "sleep 2 && touch late.txt", "timeout": 1 }),
        ))
        .await;
    assert!(!result.success);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!temp.path().join("late.txt").exists());
}

#[tokio::test]
async fn test_unreachable_engine_answers_offline_and_records_turn() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(AgentLoop::new(
        Arc::new(UnreachableEngine),
        sandbox(&temp),
        LoopSettings::default(),
    ));
    let store = Arc::new(InMemoryConversationStore::new());
    let assistant = Assistant::new(agent, store.clone());

    let reply = assistant.chat("alice", "what's in data?").await.unwrap();

    assert!(reply.degraded);
    assert!(reply.text.starts_with("[Offline mode]"));

    let history = store.history("alice", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user, "what's in data?");
    assert_eq!(history[0].assistant, reply.text);
}

#[tokio::test]
async fn test_history_reaches_the_engine_on_next_message() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Script::new(vec![
        EngineResponse::text("Hi Sam."),
        EngineResponse::text("You said your name is Sam."),
    ]));
    let agent = Arc::new(AgentLoop::new(
        engine.clone(),
        sandbox(&temp),
        LoopSettings::default(),
    ));
    let assistant = Assistant::new(agent, Arc::new(InMemoryConversationStore::new()));

    assistant.chat("sam", "I am Sam").await.unwrap();
    let reply = assistant.chat("sam", "who am I?").await.unwrap();
    assert_eq!(reply.text, "You said your name is Sam.");

    let requests = engine.requests.lock().unwrap();
    let second = &requests[1].transcript;
    assert_eq!(second.len(), 3);
    assert!(matches!(&second[0], Turn::User { text } if text == "I am Sam"));
    assert!(matches!(
        &second[1],
        Turn::Assistant { content }
            if matches!(content.as_slice(), [ContentBlock::Text { text }] if text == "Hi Sam.")
    ));
    assert!(matches!(&second[2], Turn::User { text } if text == "who am I?"));
}
