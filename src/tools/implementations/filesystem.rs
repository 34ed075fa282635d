//! Filesystem tool implementations
//!
//! Implements guarded filesystem operations:
//! - read_file: Read text content with a size limit
//! - write_file: Overwrite or append, creating parent directories
//! - list_files: Glob listing restricted to regular files
//! - delete_file: Remove a single file
//!
//! Every operation authorizes its target through `PathGuard` before any
//! filesystem call, and works on the resolved path the guard returns.

use crate::errors::ToolError;
use crate::tools::security::{PathGuard, PathIntent};
use crate::tools::types::ToolContext;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesArgs {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileArgs {
    pub path: String,
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

/// Write mode for write_file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

impl WriteMode {
    /// Accepts the short (`w`/`a`) and long (`overwrite`/`append`) spellings
    pub fn parse(mode: Option<&str>) -> Result<Self, ToolError> {
        match mode.map(|m| m.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("w") | Some("overwrite") => Ok(WriteMode::Overwrite),
            Some("a") | Some("append") => Ok(WriteMode::Append),
            Some(other) => Err(ToolError::invalid_args(
                "write_file",
                format!("unsupported mode '{}', expected 'w' or 'a'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        }
    }
}

/// One entry in a list_files payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    /// Relative to the confinement root
    pub path: String,
    pub size: u64,
    /// Leading-dot extension, or empty
    pub extension: String,
}

fn display_path(guard: &PathGuard, resolved: &Path) -> String {
    guard.relative_to_root(resolved).display().to_string()
}

fn not_found(what: &str, requested: &str) -> ToolError {
    ToolError::NotFound(format!("{}: {}", what, requested))
}

/// Read file contents
///
/// Payload: `{path, content, size}` where size is the byte length.
pub async fn read_file(
    args: ReadFileArgs,
    context: &ToolContext,
    guard: &PathGuard,
) -> Result<Value, ToolError> {
    let resolved = guard.authorize(&args.path, PathIntent::Read)?;

    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(not_found("file not found", &args.path))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(ToolError::ExecutionFault(format!(
            "not a file: {}",
            args.path
        )));
    }

    if metadata.len() > context.max_read_size as u64 {
        return Err(ToolError::ExecutionFault(format!(
            "file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            context.max_read_size
        )));
    }

    let bytes = tokio::fs::read(&resolved).await?;
    let size = bytes.len();
    let content = String::from_utf8(bytes).map_err(|_| {
        ToolError::ExecutionFault(format!("file is not valid UTF-8 text: {}", args.path))
    })?;

    Ok(json!({
        "path": display_path(guard, &resolved),
        "content": content,
        "size": size,
    }))
}

/// Write or append file contents
///
/// Payload: `{path, bytes_written, mode}`.
pub async fn write_file(
    args: WriteFileArgs,
    context: &ToolContext,
    guard: &PathGuard,
) -> Result<Value, ToolError> {
    let mode = WriteMode::parse(args.mode.as_deref())?;

    if args.content.len() > context.max_read_size {
        return Err(ToolError::invalid_args(
            "write_file",
            format!(
                "content too large: {} bytes (max: {} bytes)",
                args.content.len(),
                context.max_read_size
            ),
        ));
    }

    let resolved = guard.authorize(&args.path, PathIntent::Write)?;

    if tokio::fs::metadata(&resolved)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(ToolError::ExecutionFault(format!(
            "path is a directory: {}",
            args.path
        )));
    }

    if let Some(parent) = resolved.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match mode {
        WriteMode::Overwrite => tokio::fs::write(&resolved, args.content.as_bytes()).await?,
        WriteMode::Append => {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await?;
            file.write_all(args.content.as_bytes()).await?;
            file.flush().await?;
        }
    }

    Ok(json!({
        "path": display_path(guard, &resolved),
        "bytes_written": args.content.len(),
        "mode": mode.as_str(),
    }))
}

/// List regular files matching a glob pattern
///
/// Payload: `{directory, pattern, files, count}`. Matches that resolve
/// outside the confinement root (via `..` in the pattern or symlinks) are
/// dropped rather than reported.
pub async fn list_files(args: ListFilesArgs, guard: &PathGuard) -> Result<Value, ToolError> {
    let directory = guard.authorize(&args.directory, PathIntent::Read)?;

    let metadata = match tokio::fs::metadata(&directory).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(not_found("directory not found", &args.directory))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Err(ToolError::ExecutionFault(format!(
            "not a directory: {}",
            args.directory
        )));
    }

    if Path::new(&args.pattern).is_absolute() {
        return Err(ToolError::invalid_args(
            "list_files",
            "pattern must be relative to the directory",
        ));
    }

    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&directory.to_string_lossy()),
        args.pattern
    );

    let walker_guard = guard.clone();
    let files = tokio::task::spawn_blocking(move || collect_matches(&full_pattern, &walker_guard))
        .await
        .map_err(|e| ToolError::ExecutionFault(format!("listing task failed: {}", e)))??;

    Ok(json!({
        "directory": display_path(guard, &directory),
        "pattern": args.pattern,
        "count": files.len(),
        "files": files,
    }))
}

fn collect_matches(pattern: &str, guard: &PathGuard) -> Result<Vec<FileEntry>, ToolError> {
    let paths = glob::glob(pattern).map_err(|e| {
        ToolError::invalid_args("list_files", format!("invalid glob pattern: {}", e))
    })?;

    let mut files = Vec::new();
    // Unreadable entries are skipped
    for path in paths.flatten() {
        let resolved = match guard.authorize(&path, PathIntent::Read) {
            Ok(resolved) => resolved,
            Err(_) => continue,
        };

        let metadata = match std::fs::metadata(&resolved) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        files.push(FileEntry {
            name,
            path: display_path(guard, &resolved),
            size: metadata.len(),
            extension,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    Ok(files)
}

/// Delete a single file
///
/// Uses the same write authorization as write_file.
pub async fn delete_file(args: DeleteFileArgs, guard: &PathGuard) -> Result<Value, ToolError> {
    let resolved = guard.authorize(&args.path, PathIntent::Write)?;

    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(not_found("file not found", &args.path))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(ToolError::ExecutionFault(format!(
            "not a file: {}",
            args.path
        )));
    }

    tokio::fs::remove_file(&resolved).await?;

    Ok(json!({
        "path": display_path(guard, &resolved),
        "deleted": true,
    }))
}
