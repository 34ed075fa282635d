//! Tool executor
//!
//! Single entry point for running a tool call. Every outcome, including
//! unknown tools, malformed arguments, guard denials and panics inside a
//! handler, comes back as a `ToolResult`; nothing propagates to the caller.

use crate::config::Config;
use crate::errors::{Result, ToolError};
use crate::tools::implementations::{self, filesystem, image, process};
use crate::tools::implementations::{ImageGenerator, ReplicateImageGenerator};
use crate::tools::registry::{ToolKind, ToolRegistry};
use crate::tools::security::{CommandGuard, PathGuard};
use crate::tools::types::{ToolCall, ToolContext, ToolResult};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Guarded tool executor
pub struct ToolExecutor {
    registry: ToolRegistry,
    path_guard: PathGuard,
    command_guard: CommandGuard,
    context: ToolContext,
    image: Option<Arc<dyn ImageGenerator>>,
}

impl ToolExecutor {
    /// Create executor without the image capability
    pub fn new(path_guard: PathGuard, command_guard: CommandGuard, context: ToolContext) -> Self {
        Self {
            registry: ToolRegistry::new(false),
            path_guard,
            command_guard,
            context,
            image: None,
        }
    }

    /// Attach an image backend and register generate_image
    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.registry = ToolRegistry::new(true);
        self.image = Some(generator);
        self
    }

    /// Build guards, limits and the optional image backend from configuration
    pub fn from_config(config: &Config, root_override: Option<&Path>) -> Result<Self> {
        let root = config.sandbox_root(root_override);
        let path_guard = PathGuard::new(&root)?
            .with_writable_zones(config.sandbox.writable_zones.iter())?
            .with_forbidden_extensions(config.sandbox.forbidden_extensions.iter());
        let command_guard = CommandGuard::from_config(&config.commands);

        let context = ToolContext::default()
            .with_timeout(Duration::from_secs(config.commands.default_timeout_sec))
            .with_max_timeout(Duration::from_secs(config.commands.max_timeout_sec))
            .with_max_output_size(config.commands.max_output_bytes)
            .with_max_read_size(config.sandbox.max_read_bytes);

        let executor = Self::new(path_guard, command_guard, context);

        info!(
            root = %executor.path_guard.root().display(),
            zones = executor.path_guard.writable_zones().len(),
            "tool sandbox ready"
        );

        Ok(match ReplicateImageGenerator::probe(&config.image) {
            Some(generator) => executor.with_image_generator(Arc::new(generator)),
            None => executor,
        })
    }

    /// Execute one tool call
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        debug!(tool = %call.name, call_id = %call.id, "executing tool");

        let outcome = AssertUnwindSafe(self.dispatch(call)).catch_unwind().await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(payload)) => {
                debug!(
                    tool = %call.name,
                    duration_ms = elapsed.as_millis() as u64,
                    "tool succeeded"
                );
                ToolResult::success(&call.name, payload, elapsed)
            }
            Ok(Err(e)) => {
                match &e {
                    ToolError::Guard(denial) => {
                        warn!(tool = %call.name, reason = %denial, "tool call denied")
                    }
                    other => info!(tool = %call.name, error = %other, "tool failed"),
                }
                ToolResult::failure(&call.name, e.to_string(), elapsed)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %call.name, panic = %message, "tool handler panicked");
                ToolResult::failure(
                    &call.name,
                    format!("internal fault in {}: {}", call.name, message),
                    elapsed,
                )
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
        let spec = self.registry.lookup(&call.name)?;
        let args = &call.arguments;

        match spec.kind {
            ToolKind::ReadFile => {
                let args = parse_args::<filesystem::ReadFileArgs>(&call.name, args)?;
                implementations::read_file(args, &self.context, &self.path_guard).await
            }
            ToolKind::WriteFile => {
                let args = parse_args::<filesystem::WriteFileArgs>(&call.name, args)?;
                implementations::write_file(args, &self.context, &self.path_guard).await
            }
            ToolKind::ListFiles => {
                let args = parse_args::<filesystem::ListFilesArgs>(&call.name, args)?;
                implementations::list_files(args, &self.path_guard).await
            }
            ToolKind::DeleteFile => {
                let args = parse_args::<filesystem::DeleteFileArgs>(&call.name, args)?;
                implementations::delete_file(args, &self.path_guard).await
            }
            ToolKind::RunCommand => {
                let args = parse_args::<process::RunCommandArgs>(&call.name, args)?;
                implementations::run_command(
                    args,
                    &self.context,
                    &self.command_guard,
                    self.path_guard.root(),
                )
                .await
            }
            ToolKind::GenerateImage => {
                let args = parse_args::<image::GenerateImageArgs>(&call.name, args)?;
                let generator = self.image.as_deref().ok_or_else(|| {
                    ToolError::ExecutionFault("image generation is not available".to_string())
                })?;
                implementations::generate_image(args, generator).await
            }
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn path_guard(&self) -> &PathGuard {
        &self.path_guard
    }

    pub fn command_guard(&self) -> &CommandGuard {
        &self.command_guard
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn has_image_generation(&self) -> bool {
        self.image.is_some()
    }
}

/// Arguments must be a JSON object; `null` counts as empty
fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> std::result::Result<T, ToolError> {
    let object = match args {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => args.clone(),
        other => {
            return Err(ToolError::invalid_args(
                tool,
                format!("expected an argument object, got {}", json_kind(other)),
            ))
        }
    };

    serde_json::from_value(object).map_err(|e| ToolError::invalid_args(tool, e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
