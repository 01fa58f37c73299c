//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::agent::{Agent, LlmBinding, Prompt};
use parley_core::session::DEFAULT_HISTORY_LIMIT;
use parley_core::tool::{Tool, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Turn engine settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Session storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Agent definitions
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Messages of recent history included in each prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Characters kept from each history entry
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Maximum model calls per turn
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Capacity of the chunk channel handed to callers
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_preview_chars() -> usize {
    200
}
fn default_max_depth() -> u32 {
    8
}
fn default_stream_buffer() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            preview_chars: default_preview_chars(),
            max_depth: default_max_depth(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// Which session store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "in_memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database path; defaults to `~/.parley/sessions.sqlite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("sessions.sqlite"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub prompts: Vec<PromptConfig>,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub content: String,

    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_tool_kind")]
    pub kind: ToolKind,

    #[serde(default = "default_true")]
    pub active: bool,

    /// JSON Schema of the tool parameters, written as a TOML table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

fn default_tool_kind() -> ToolKind {
    ToolKind::Native
}
fn default_true() -> bool {
    true
}

impl AgentConfig {
    /// Convert into the domain agent handed to the turn engine.
    pub fn to_agent(&self) -> Agent {
        let prompts = self
            .prompts
            .iter()
            .enumerate()
            .map(|(n, p)| Prompt {
                id: format!("{}:prompt:{n}", self.id),
                content: p.content.clone(),
                active: p.active,
            })
            .collect();

        let tools = self
            .tools
            .iter()
            .map(|t| Tool {
                id: format!("{}:tool:{}", self.id, t.name),
                name: t.name.clone(),
                description: t.description.clone(),
                kind: t.kind,
                active: t.active,
                parameters_schema: t
                    .parameters
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| r#"{"type":"object","properties":{}}"#.into()),
            })
            .collect();

        Agent {
            id: self.id.clone(),
            name: if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            prompts,
            tools,
            llm: LlmBinding {
                model: self.llm.model.clone(),
                temperature: self.llm.temperature,
                max_tokens: self.llm.max_tokens,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load a specific file, then apply `PARLEY_*` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        // Environment variable overrides (highest priority)
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `PARLEY_*` overrides through the given variable lookup.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("PARLEY_DB_PATH") {
            self.storage.path = Some(path);
        }

        if let Some(backend) = lookup("PARLEY_STORAGE") {
            self.storage.backend = backend.parse().map_err(ConfigError::ValidationError)?;
        }

        if let Some(depth) = lookup("PARLEY_MAX_DEPTH") {
            self.orchestrator.max_depth = depth.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PARLEY_MAX_DEPTH is not a number: {depth}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// The default config file, `~/.parley/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.orchestrator;
        if o.history_limit == 0 || o.preview_chars == 0 || o.max_depth == 0 || o.stream_buffer == 0
        {
            return Err(ConfigError::ValidationError(
                "orchestrator settings must all be at least 1".into(),
            ));
        }

        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(ConfigError::ValidationError("agent id must not be empty".into()));
            }
            if !agent_ids.insert(agent.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }
            if !(0.0..=2.0).contains(&agent.llm.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "agent {}: temperature must be between 0.0 and 2.0",
                    agent.id
                )));
            }

            let mut tool_names = HashSet::new();
            for tool in &agent.tools {
                if !tool_names.insert(tool.name.to_lowercase()) {
                    return Err(ConfigError::ValidationError(format!(
                        "agent {}: duplicate tool name: {}",
                        agent.id, tool.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Domain agents for every configured agent.
    pub fn agents(&self) -> Vec<Agent> {
        self.agents.iter().map(AgentConfig::to_agent).collect()
    }

    /// Generate a starter config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self {
            agents: vec![sample_agent()],
            ..Self::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn sample_agent() -> AgentConfig {
    AgentConfig {
        id: "weather-bot".into(),
        name: "Weather Bot".into(),
        llm: LlmConfig::default(),
        prompts: vec![PromptConfig {
            content: "You are Weather Bot. Use get_weather to answer weather questions.".into(),
            active: true,
        }],
        tools: vec![ToolConfig {
            name: "get_weather".into(),
            description: "Look up current weather conditions for a city.".into(),
            kind: ToolKind::Native,
            active: true,
            parameters: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name" }
                },
                "required": ["city"]
            })),
        }],
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
