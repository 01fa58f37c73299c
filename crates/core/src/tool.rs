//! Tool domain types and the tool backend / execution log traits.
//!
//! A `Tool` is the agent-bound definition the model may call. The model issues
//! `ToolCall`s; every attempted call produces exactly one `ToolExecutionRecord`.
//! Backends are selected by `ToolKind`, a closed set of backend families.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, ToolError};
use crate::message::SessionId;

/// The backend family a tool is executed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// A remote HTTP API endpoint
    HttpApi,
    /// A tool exposed by an MCP server
    Mcp,
    /// An in-process function
    Native,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpApi => "http_api",
            Self::Mcp => "mcp",
            Self::Native => "native",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http_api" | "http" => Ok(Self::HttpApi),
            "mcp" => Ok(Self::Mcp),
            "native" | "function" => Ok(Self::Native),
            other => Err(format!("unknown tool kind: {other}")),
        }
    }
}

/// A tool bound to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,

    /// Unique (case-insensitively) within the owning agent
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub kind: ToolKind,

    #[serde(default = "default_active")]
    pub active: bool,

    /// JSON Schema of the parameters, JSON-encoded
    #[serde(default = "empty_schema_json")]
    pub parameters_schema: String,
}

fn default_active() -> bool {
    true
}

fn empty_schema_json() -> String {
    r#"{"type":"object","properties":{}}"#.into()
}

impl Tool {
    /// The schema offered to the model. An unparseable schema degrades to an
    /// empty object schema so one bad definition cannot break the turn.
    pub fn schema(&self) -> ToolSchema {
        let parameters = serde_json::from_str::<Value>(&self.parameters_schema)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters,
        }
    }

    /// Case-insensitive name comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// A complete tool call assembled from the model stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID as issued by the model
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw JSON argument string, unparsed
    pub arguments: String,
}

/// Where a record came from: the call, the resolved tool and the turn scope.
#[derive(Debug, Clone)]
pub struct RecordOrigin {
    pub call_id: String,
    pub tool_id: Option<String>,
    pub tool_name: String,
    pub session_id: SessionId,
    pub agent_id: String,
}

/// The durable outcome of attempting one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub call_id: String,

    /// Absent when the call never resolved to a bound tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,

    pub tool_name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
    pub session_id: SessionId,
    pub agent_id: String,
    pub executed_at: DateTime<Utc>,
}

impl ToolExecutionRecord {
    pub fn succeeded(
        origin: RecordOrigin,
        parameters: Map<String, Value>,
        result: Value,
        duration_ms: u64,
    ) -> Self {
        Self::build(origin, parameters, Ok(result), duration_ms)
    }

    pub fn failed(
        origin: RecordOrigin,
        parameters: Map<String, Value>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self::build(origin, parameters, Err(error.into()), duration_ms)
    }

    fn build(
        origin: RecordOrigin,
        parameters: Map<String, Value>,
        outcome: Result<Value, String>,
        duration_ms: u64,
    ) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(message) => (None, Some(message)),
        };
        Self {
            call_id: origin.call_id,
            tool_id: origin.tool_id,
            tool_name: origin.tool_name,
            parameters,
            success: error.is_none(),
            result,
            error,
            duration_ms,
            session_id: origin.session_id,
            agent_id: origin.agent_id,
            executed_at: Utc::now(),
        }
    }

    /// The line this record contributes to the follow-up message.
    pub fn summary_line(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(error)) => format!("Tool {}: Error - {}", self.tool_name, error),
            (Some(Value::String(text)), None) => format!("Tool {}: {}", self.tool_name, text),
            (Some(value), None) => format!("Tool {}: {}", self.tool_name, value),
            (None, None) => format!("Tool {}: ", self.tool_name),
        }
    }
}

/// A backend that executes every tool of one `ToolKind`.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// The tool kind this backend serves.
    fn kind(&self) -> ToolKind;

    /// Execute a tool with already-parsed parameters, returning an opaque result.
    async fn execute(
        &self,
        tool: &Tool,
        parameters: &Map<String, Value>,
    ) -> std::result::Result<Value, ToolError>;
}

/// Persistent audit sink for invoked tool calls.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn record(&self, record: &ToolExecutionRecord) -> std::result::Result<(), StoreError>;
}
