//! Process tool implementation
//!
//! run_command: execute a whitelisted command through the platform shell,
//! with the confinement root as working directory and a hard timeout.

use crate::errors::ToolError;
use crate::tools::security::CommandGuard;
use crate::tools::types::ToolContext;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct RunCommandArgs {
    pub command: String,
    /// Seconds; clamped to the context ceiling
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
    #[cfg(windows)]
    {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    }
}

/// Lossy UTF-8 decode, cut at `max_bytes` on a char boundary
fn truncate_output(bytes: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max_bytes {
        return text.into_owned();
    }

    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n... [output truncated, {} bytes total]",
        &text[..cut],
        bytes.len()
    )
}

/// Run a shell command
///
/// Payload on exit status 0: `{command, exit_code, stdout, stderr}`.
/// A non-zero status becomes `ToolError::CommandFailed`; a deadline hit
/// kills the child and becomes `ToolError::Timeout`.
pub async fn run_command(
    args: RunCommandArgs,
    context: &ToolContext,
    guard: &CommandGuard,
    working_dir: &Path,
) -> Result<Value, ToolError> {
    guard.authorize(&args.command)?;

    let limit = context.effective_timeout(args.timeout);
    debug!(command = %args.command, timeout_secs = limit.as_secs(), "spawning command");

    let child = shell_command(&args.command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::ExecutionFault(format!("failed to spawn command: {}", e)))?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ToolError::ExecutionFault(format!(
                "failed to collect command output: {}",
                e
            )))
        }
        Err(_) => {
            warn!(
                command = %args.command,
                timeout_secs = limit.as_secs(),
                "command timed out, killed"
            );
            return Err(ToolError::Timeout {
                seconds: limit.as_secs(),
            });
        }
    };

    let stdout = truncate_output(&output.stdout, context.max_output_size);
    let stderr = truncate_output(&output.stderr, context.max_output_size);
    // Signal-terminated processes have no code
    let exit_code = output.status.code().unwrap_or(-1);

    if !output.status.success() {
        return Err(ToolError::CommandFailed {
            exit_code,
            stdout,
            stderr,
        });
    }

    Ok(json!({
        "command": args.command,
        "exit_code": exit_code,
        "stdout": stdout,
        "stderr": stderr,
    }))
}
