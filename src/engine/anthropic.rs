//! Anthropic Messages API client
//!
//! Non-streaming `POST {base_url}/v1/messages` with tool use:
//! - Transcript turns map to `user` / `assistant` messages
//! - Tool results travel as `tool_result` blocks keyed by `tool_use_id`
//! - Transient failures are retried through `RetryPolicy`

use crate::config::EngineConfig;
use crate::engine::retry::RetryPolicy;
use crate::engine::types::{
    ContentBlock, EngineError, EngineRequest, EngineResponse, StopReason, Turn,
};
use crate::engine::ReasoningEngine;
use crate::errors::{AgentError, Result};
use crate::tools::types::ToolSchema;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicEngine {
    client: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
}

impl AnthropicEngine {
    pub fn new(config: &EngineConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::ConfigError("API key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|e| AgentError::ConfigError(format!("invalid API key header: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_sec.max(1)))
            .build()
            .map_err(AgentError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    /// Build from configuration, reading the key from the configured variable
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AgentError::ConfigError(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, &api_key)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<EngineResponse, EngineError> {
        let response = self.client.post(self.messages_url()).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            let raw = response.text().await?;
            return parse_messages_response(&raw);
        }

        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(classify_status(status, body, retry_after_ms))
    }
}

#[async_trait]
impl ReasoningEngine for AnthropicEngine {
    async fn respond(
        &self,
        request: &EngineRequest,
    ) -> std::result::Result<EngineResponse, EngineError> {
        let body = build_request_body(&self.model, request);
        debug!(
            model = %self.model,
            turns = request.transcript.len(),
            tools = request.tools.len(),
            "sending messages request"
        );
        self.retry.execute(None, || self.send_once(&body)).await
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

fn classify_status(status: StatusCode, body: String, retry_after_ms: Option<u64>) -> EngineError {
    match status.as_u16() {
        401 | 403 => EngineError::Auth(body),
        429 => EngineError::RateLimited {
            status: status.as_u16(),
            retry_after_ms,
        },
        code if code >= 500 => EngineError::Server { status: code, body },
        code => EngineError::InvalidResponse(format!("HTTP {}: {}", code, body)),
    }
}

fn build_request_body(model: &str, request: &EngineRequest) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "messages": to_anthropic_messages(&request.transcript),
    });

    if !request.system.trim().is_empty() {
        body["system"] = json!(request.system);
    }
    if !request.tools.is_empty() {
        body["tools"] = to_anthropic_tools(&request.tools);
    }

    body
}

fn to_anthropic_tools(tools: &[ToolSchema]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect(),
    )
}

fn to_anthropic_messages(transcript: &[Turn]) -> Value {
    Value::Array(
        transcript
            .iter()
            .filter_map(|turn| match turn {
                Turn::User { text } => Some(json!({
                    "role": "user",
                    "content": [{ "type": "text", "text": text }],
                })),
                Turn::Assistant { content } => {
                    let parts: Vec<Value> = content
                        .iter()
                        .filter_map(|block| match block {
                            ContentBlock::Text { text } if text.trim().is_empty() => None,
                            ContentBlock::Text { text } => {
                                Some(json!({ "type": "text", "text": text }))
                            }
                            ContentBlock::ToolUse { id, name, input } => Some(json!({
                                "type": "tool_use",
                                "id": id,
                                "name": name,
                                "input": input,
                            })),
                        })
                        .collect();
                    if parts.is_empty() {
                        None
                    } else {
                        Some(json!({ "role": "assistant", "content": parts }))
                    }
                }
                Turn::ToolResults { results } => Some(json!({
                    "role": "user",
                    "content": results
                        .iter()
                        .map(|r| json!({
                            "type": "tool_result",
                            "tool_use_id": r.tool_use_id,
                            "content": r.content,
                            "is_error": r.is_error,
                        }))
                        .collect::<Vec<_>>(),
                })),
            })
            .collect(),
    )
}

fn parse_messages_response(raw: &str) -> std::result::Result<EngineResponse, EngineError> {
    let parsed: MessagesResponse = serde_json::from_str(raw)
        .map_err(|e| EngineError::InvalidResponse(format!("failed to parse response: {}", e)))?;

    let mut content = Vec::with_capacity(parsed.content.len());
    for block in parsed.content {
        match block["type"].as_str() {
            Some("text") => content.push(ContentBlock::Text {
                text: block["text"].as_str().unwrap_or_default().to_string(),
            }),
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default();
                let name = block["name"].as_str().unwrap_or_default();
                if id.is_empty() || name.is_empty() {
                    return Err(EngineError::InvalidResponse(
                        "tool_use block missing id or name".to_string(),
                    ));
                }
                content.push(ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            // thinking and other block types are not fed back
            _ => {}
        }
    }

    Ok(EngineResponse {
        content,
        stop_reason: parsed.stop_reason,
    })
}
