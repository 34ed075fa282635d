//! Tool registry with JSON schemas
//!
//! Fixed catalog mapping tool names to a handler kind and the parameter
//! schema advertised to the reasoning engine.
//!
//! Tools:
//! - read_file: Read a file under the confinement root
//! - write_file: Write or append inside a writable zone
//! - list_files: List files matching a glob pattern
//! - run_command: Execute a whitelisted command
//! - delete_file: Delete a file inside a writable zone
//! - generate_image: Only when the image backend probe succeeded at startup

use crate::errors::ToolError;
use crate::tools::types::ToolSchema;
use serde_json::json;
use std::collections::HashMap;

/// Handler selected for a registered tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    ListFiles,
    RunCommand,
    DeleteFile,
    GenerateImage,
}

/// Registry entry
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub schema: ToolSchema,
}

/// Tool registry
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    /// Map of tool name to spec
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Create registry with the built-in tools
    ///
    /// `image_generation` is the result of the startup capability probe and
    /// is consulted only here.
    pub fn new(image_generation: bool) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register_read_file();
        registry.register_write_file();
        registry.register_list_files();
        registry.register_run_command();
        registry.register_delete_file();
        if image_generation {
            registry.register_generate_image();
        }

        registry
    }

    fn insert(&mut self, kind: ToolKind, schema: ToolSchema) {
        self.tools
            .insert(schema.name.clone(), ToolSpec { kind, schema });
    }

    fn register_read_file(&mut self) {
        let schema = ToolSchema::new(
            "read_file",
            "Read the contents of a text file under the project root",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file (relative to the project root, e.g. 'core/main.py')"
                    }
                },
                "required": ["path"]
            }),
            true,
        );
        self.insert(ToolKind::ReadFile, schema);
    }

    fn register_write_file(&mut self) {
        let schema = ToolSchema::new(
            "write_file",
            "Write or append content to a file inside a writable directory. Parent directories are created as needed.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write to the file"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["w", "a", "overwrite", "append"],
                        "description": "Write mode: 'w' to overwrite, 'a' to append (default: 'w')",
                        "default": "w"
                    }
                },
                "required": ["path", "content"]
            }),
            false,
        );
        self.insert(ToolKind::WriteFile, schema);
    }

    fn register_list_files(&mut self) {
        let schema = ToolSchema::new(
            "list_files",
            "List files (not directories) in a directory under the project root",
            json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory to list (default: '.')",
                        "default": "."
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern to match (default: '*', e.g. '*.py', '**/*.json')",
                        "default": "*"
                    }
                },
                "required": []
            }),
            true,
        );
        self.insert(ToolKind::ListFiles, schema);
    }

    fn register_run_command(&mut self) {
        let schema = ToolSchema::new(
            "run_command",
            "Execute a whitelisted shell command in the project root (python, pip, pytest, ls, cat, ...)",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Command to execute; must start with an allowed prefix"
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Timeout in seconds (default: 30)",
                        "minimum": 1
                    }
                },
                "required": ["command"]
            }),
            false,
        );
        self.insert(ToolKind::RunCommand, schema);
    }

    fn register_delete_file(&mut self) {
        let schema = ToolSchema::new(
            "delete_file",
            "Delete a single file inside a writable directory (use with caution)",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file to delete"
                    }
                },
                "required": ["path"]
            }),
            false,
        );
        self.insert(ToolKind::DeleteFile, schema);
    }

    fn register_generate_image(&mut self) {
        let schema = ToolSchema::new(
            "generate_image",
            "Generate an image from a text description",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Detailed description of the image to generate"
                    },
                    "negative_prompt": {
                        "type": "string",
                        "description": "What to avoid in the image (optional)"
                    },
                    "width": {
                        "type": "integer",
                        "description": "Image width in pixels (default: 1024)",
                        "default": 1024
                    },
                    "height": {
                        "type": "integer",
                        "description": "Image height in pixels (default: 1024)",
                        "default": 1024
                    },
                    "style": {
                        "type": "string",
                        "enum": ["artistic", "photorealistic", "minimalist", "fantasy", "literary"],
                        "description": "Style preset (default: artistic)",
                        "default": "artistic"
                    }
                },
                "required": ["prompt"]
            }),
            true,
        );
        self.insert(ToolKind::GenerateImage, schema);
    }

    /// Look up a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolSpec, ToolError> {
        self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
            available: self.tool_names(),
        })
    }

    /// Get tool schema by name
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|spec| &spec.schema)
    }

    /// Check if tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Capability manifest for the reasoning engine, sorted by name
    pub fn manifest(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.tools.values().map(|spec| spec.schema.clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get total number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new(false);
        assert_eq!(registry.len(), 5);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_all_tools_registered() {
        let registry = ToolRegistry::default();

        for name in ["read_file", "write_file", "list_files", "run_command", "delete_file"] {
            assert!(registry.contains(name), "{} missing", name);
        }
        assert!(!registry.contains("generate_image"));
    }

    #[test]
    fn test_image_tool_follows_probe() {
        let registry = ToolRegistry::new(true);
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.lookup("generate_image").unwrap().kind,
            ToolKind::GenerateImage
        );
    }

    #[test]
    fn test_lookup_unknown_tool() {
        let registry = ToolRegistry::default();
        let err = registry.lookup("format_disk").unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn test_lookup_kind() {
        let registry = ToolRegistry::default();
        assert_eq!(registry.lookup("read_file").unwrap().kind, ToolKind::ReadFile);
        assert_eq!(registry.lookup("run_command").unwrap().kind, ToolKind::RunCommand);
    }

    #[test]
    fn test_manifest_matches_registry() {
        let registry = ToolRegistry::new(true);
        let manifest = registry.manifest();

        let names: Vec<String> = manifest.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, registry.tool_names());

        for schema in manifest {
            assert!(!schema.description.is_empty());
            assert_eq!(schema.parameters["type"], "object");
        }
    }

    #[test]
    fn test_read_only_flags() {
        let registry = ToolRegistry::default();
        let read_only: Vec<String> = registry
            .manifest()
            .into_iter()
            .filter(|schema| schema.read_only)
            .map(|schema| schema.name)
            .collect();
        assert_eq!(read_only, vec!["list_files", "read_file"]);
    }

    #[test]
    fn test_required_parameters() {
        let registry = ToolRegistry::default();
        let write = registry.get("write_file").unwrap();
        assert_eq!(write.parameters["required"], json!(["path", "content"]));
        assert!(!write.read_only);
    }
}
