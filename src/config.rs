//! Configuration management for guardhouse
//!
//! TOML-based configuration with defaults and validation.
//! Location: ~/.guardhouse/config.toml (or `--config <path>`).
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! overrides. Secrets are never stored here; the file names the environment
//! variables that hold them.

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub agent: AgentConfig,
    pub sandbox: SandboxConfig,
    pub commands: CommandConfig,
    pub image: ImageConfig,
    pub logging: LoggingConfig,
}

/// Reasoning engine connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub request_timeout_sec: u64,
    /// Retries for transient channel faults (network, 429, 5xx)
    pub max_retries: u32,
}

/// Agent loop bounds and prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: usize,
    pub timeout_sec: u64,
    /// Prior conversation turns replayed into each invocation
    pub history_limit: usize,
    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,
}

/// Filesystem confinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Confinement root; current directory when unset
    pub root: Option<String>,
    /// Relative entries are resolved against the root
    pub writable_zones: Vec<String>,
    pub forbidden_extensions: Vec<String>,
    /// Maximum bytes returned by read_file
    pub max_read_bytes: usize,
}

/// Command allow/deny lists and subprocess limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub allow_prefixes: Vec<String>,
    pub deny_fragments: Vec<String>,
    pub default_timeout_sec: u64,
    pub max_timeout_sec: u64,
    pub max_output_bytes: usize,
}

/// Optional image generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_token_env: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when RUST_LOG is unset
    pub filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            request_timeout_sec: 60,
            max_retries: 3,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 15,
            timeout_sec: 120,
            history_limit: 10,
            system_prompt: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: None,
            writable_zones: vec!["data".to_string(), "workspace".to_string()],
            forbidden_extensions: [".exe", ".dll", ".so", ".dylib", ".bat", ".sh", ".ps1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_read_bytes: 2_097_152, // 2MB
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            allow_prefixes: ["python ", "py ", "pip ", "pytest ", "ls", "dir", "cat", "type"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            deny_fragments: [
                "rm ", "del ", "format", "shutdown", "reboot", "dd ", "mkfs", ">", ">>",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_timeout_sec: 30,
            max_timeout_sec: 300,
            max_output_bytes: 1_048_576,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.replicate.com".to_string(),
            model: "stability-ai/sdxl".to_string(),
            api_token_env: "REPLICATE_API_TOKEN".to_string(),
            timeout_sec: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from ~/.guardhouse/config.toml when present, else built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".guardhouse").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_turns == 0 {
            return Err(AgentError::ConfigError(
                "agent.max_turns must be greater than 0".to_string(),
            ));
        }

        if self.agent.timeout_sec == 0 {
            return Err(AgentError::ConfigError(
                "agent.timeout_sec must be greater than 0".to_string(),
            ));
        }

        if self.commands.default_timeout_sec == 0 {
            return Err(AgentError::ConfigError(
                "commands.default_timeout_sec must be greater than 0".to_string(),
            ));
        }

        if self.commands.default_timeout_sec > self.commands.max_timeout_sec {
            return Err(AgentError::ConfigError(
                "commands.default_timeout_sec must not exceed commands.max_timeout_sec".to_string(),
            ));
        }

        if self.commands.allow_prefixes.iter().any(|p| p.is_empty()) {
            return Err(AgentError::ConfigError(
                "commands.allow_prefixes must not contain empty entries".to_string(),
            ));
        }

        if self.commands.deny_fragments.iter().any(|f| f.is_empty()) {
            return Err(AgentError::ConfigError(
                "commands.deny_fragments must not contain empty entries".to_string(),
            ));
        }

        if self.engine.max_tokens == 0 {
            return Err(AgentError::ConfigError(
                "engine.max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Confinement root: explicit override, then config, then current directory
    pub fn sandbox_root(&self, root_override: Option<&Path>) -> PathBuf {
        if let Some(root) = root_override {
            return root.to_path_buf();
        }
        match &self.sandbox.root {
            Some(root) => Self::expand_path(root),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.max_turns, 15);
        assert_eq!(config.commands.default_timeout_sec, 30);
        assert!(config.sandbox.writable_zones.contains(&"data".to_string()));
        assert!(config.commands.deny_fragments.contains(&"rm ".to_string()));
        assert!(!config.image.enabled);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_turns() {
        let mut config = Config::default();
        config.agent.max_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_timeout_order() {
        let mut config = Config::default();
        config.commands.default_timeout_sec = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_prefix() {
        let mut config = Config::default();
        config.commands.allow_prefixes.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [agent]
            max_turns = 5

            [sandbox]
            root = "/srv/app"
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.agent.timeout_sec, 120);
        assert_eq!(config.sandbox.root.as_deref(), Some("/srv/app"));
        assert_eq!(config.commands.default_timeout_sec, 30);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.agent.max_turns = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path)).unwrap();
        assert_eq!(loaded.agent.max_turns, 7);
    }

    #[test]
    fn test_sandbox_root_override_wins() {
        let mut config = Config::default();
        config.sandbox.root = Some("/srv/app".to_string());
        assert_eq!(
            config.sandbox_root(Some(Path::new("/tmp/other"))),
            PathBuf::from("/tmp/other")
        );
        assert_eq!(config.sandbox_root(None), PathBuf::from("/srv/app"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let expanded = Config::expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }
}
