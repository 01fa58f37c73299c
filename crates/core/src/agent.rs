//! Agent definitions and the directory they are resolved from.
//!
//! An agent is read-only input to a turn: nothing in the turn engine mutates it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::tool::{Tool, ToolSchema};

/// A configured agent: model binding, system prompts and bound tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,

    /// System prompts; the first active one is used for a turn
    #[serde(default)]
    pub prompts: Vec<Prompt>,

    #[serde(default)]
    pub tools: Vec<Tool>,

    pub llm: LlmBinding,
}

/// A system prompt owned by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub content: String,

    #[serde(default)]
    pub active: bool,
}

/// Which model an agent talks to and with what sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBinding {
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Agent {
    /// The first prompt flagged active.
    pub fn active_prompt(&self) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.active)
    }

    pub fn active_tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter().filter(|t| t.active)
    }

    /// Schemas of the active tools, in binding order.
    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.active_tools().map(Tool::schema).collect()
    }

    /// Look up an active tool by name, ignoring case.
    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.active_tools().find(|t| t.matches(name))
    }
}

/// Read access to configured agents.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn get_agent(&self, id: &str) -> std::result::Result<Option<Agent>, StoreError>;

    async fn list_agents(&self) -> std::result::Result<Vec<Agent>, StoreError>;
}
