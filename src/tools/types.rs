//! Tool execution types and structures
//!
//! Core types for tool calls, results, and execution limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A tool invocation requested by the reasoning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque call identifier assigned by the engine
    pub id: String,

    /// Tool name
    pub name: String,

    /// Argument mapping (expected to be a JSON object)
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Uniform envelope returned for every tool call
///
/// A failed result carries an error message and no payload. A successful
/// result may have no payload for side-effect-only tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name that was executed
    pub tool: String,

    /// Whether execution was successful
    pub success: bool,

    /// Structured output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create successful result
    pub fn success(
        tool: impl Into<String>,
        payload: serde_json::Value,
        duration: Duration,
    ) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            payload: Some(payload),
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create failed result
    pub fn failure(tool: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "tool failed without a message".to_string();
        }
        Self {
            tool: tool.into(),
            success: false,
            payload: None,
            error: Some(error),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Render as the text block fed back to the engine
    pub fn to_engine_text(&self) -> String {
        let body = if self.success {
            serde_json::json!({
                "success": true,
                "result": self.payload.clone().unwrap_or(serde_json::Value::Null),
            })
        } else {
            serde_json::json!({
                "success": false,
                "error": self.error,
            })
        };
        body.to_string()
    }
}

/// Resource bounds applied to every tool call
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Timeout used when a command call does not specify one
    pub default_timeout: Duration,

    /// Upper clamp for caller-provided timeouts
    pub max_timeout: Duration,

    /// Maximum captured subprocess output per stream (bytes)
    pub max_output_size: usize,

    /// Maximum file size read_file will return (bytes)
    pub max_read_size: usize,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(300),
            max_output_size: 1_048_576, // 1MB
            max_read_size: 2_097_152,   // 2MB
        }
    }
}

impl ToolContext {
    /// Set default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set timeout ceiling
    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }

    /// Set max output size
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// Set max readable file size
    pub fn with_max_read_size(mut self, size: usize) -> Self {
        self.max_read_size = size;
        self
    }

    /// Resolve a requested timeout (seconds) against the default and ceiling
    pub fn effective_timeout(&self, requested_secs: Option<u64>) -> Duration {
        match requested_secs {
            Some(0) | None => self.default_timeout,
            Some(secs) => Duration::from_secs(secs).min(self.max_timeout),
        }
    }
}

/// Tool schema definition advertised to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Parameter schema (JSON Schema)
    pub parameters: serde_json::Value,

    /// Whether tool leaves the filesystem untouched
    pub read_only: bool,
}

impl ToolSchema {
    /// Create new tool schema
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        read_only: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            read_only,
        }
    }

    /// Parameter names paired with their descriptions
    pub fn parameter_list(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self.parameters["properties"]
            .as_object()
            .map(|props| {
                props
                    .iter()
                    .map(|(name, spec)| {
                        let description = spec["description"].as_str().unwrap_or("").to_string();
                        (name.clone(), description)
                    })
                    .collect()
            })
            .unwrap_or_default();
        params.sort();
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success(
            "read_file",
            serde_json::json!({"content": "hi"}),
            Duration::from_millis(100),
        );

        assert!(result.success);
        assert_eq!(result.tool, "read_file");
        assert_eq!(result.duration_ms, 100);
        assert!(result.error.is_none());
        assert_eq!(result.payload.unwrap()["content"], "hi");
    }

    #[test]
    fn test_tool_result_failure_has_no_payload() {
        let result = ToolResult::failure("test", "boom", Duration::from_millis(50));

        assert!(!result.success);
        assert!(result.payload.is_none());
        assert_eq!(result.error.unwrap(), "boom");
    }

    #[test]
    fn test_tool_result_failure_never_empty() {
        let result = ToolResult::failure("test", "  ", Duration::ZERO);
        assert!(!result.error.unwrap().trim().is_empty());
    }

    #[test]
    fn test_engine_text_shape() {
        let ok = ToolResult::success("t", serde_json::json!({"n": 1}), Duration::ZERO);
        let parsed: serde_json::Value = serde_json::from_str(&ok.to_engine_text()).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["result"]["n"], 1);

        let err = ToolResult::failure("t", "denied", Duration::ZERO);
        let parsed: serde_json::Value = serde_json::from_str(&err.to_engine_text()).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "denied");
    }

    #[test]
    fn test_tool_context_builder() {
        let ctx = ToolContext::default()
            .with_timeout(Duration::from_secs(10))
            .with_max_timeout(Duration::from_secs(20))
            .with_max_output_size(1024);

        assert_eq!(ctx.default_timeout, Duration::from_secs(10));
        assert_eq!(ctx.max_output_size, 1024);
        assert_eq!(ctx.effective_timeout(None), Duration::from_secs(10));
        assert_eq!(ctx.effective_timeout(Some(0)), Duration::from_secs(10));
        assert_eq!(ctx.effective_timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(ctx.effective_timeout(Some(999)), Duration::from_secs(20));
    }

    #[test]
    fn test_parameter_list() {
        let schema = ToolSchema::new(
            "t",
            "d",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Where"},
                    "content": {"type": "string", "description": "What"}
                }
            }),
            false,
        );
        assert_eq!(
            schema.parameter_list(),
            vec![
                ("content".to_string(), "What".to_string()),
                ("path".to_string(), "Where".to_string())
            ]
        );
    }
}
