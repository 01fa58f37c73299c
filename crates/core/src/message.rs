//! Session and message domain types.
//!
//! These are the value objects the Session/History gateway stores:
//! a session groups an ordered, append-only list of messages bound to one agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolExecutionRecord;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the store to an appended message.
pub type MessageId = String;

/// The role of a message sender in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution output
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// The agent this session is bound to
    pub agent_id: String,

    /// Optional title (derived from the first user message)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub created_at: DateTime<Utc>,

    /// When the last message was appended
    pub updated_at: DateTime<Utc>,
}

/// A stored message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,

    /// Tool executions attached to this message (assistant messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_records: Vec<ToolExecutionRecord>,

    pub created_at: DateTime<Utc>,
}

/// The payload appended to a session; the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_records: Vec<ToolExecutionRecord>,
}

impl NewMessage {
    /// A user message with a character-count token estimate.
    pub fn user(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            role: Role::User,
            token_count: Some(estimate_tokens(&content)),
            content,
            tool_records: Vec::new(),
        }
    }

    /// An assistant message carrying the tool executions of its turn.
    pub fn assistant(content: impl Into<String>, tool_records: Vec<ToolExecutionRecord>) -> Self {
        let content = content.into();
        Self {
            role: Role::Assistant,
            token_count: Some(estimate_tokens(&content)),
            content,
            tool_records,
        }
    }

    /// Materialize into a stored message.
    pub fn into_message(self, id: MessageId, session_id: SessionId) -> Message {
        Message {
            id,
            session_id,
            role: self.role,
            content: self.content,
            token_count: self.token_count,
            tool_records: self.tool_records,
            created_at: Utc::now(),
        }
    }
}

/// Token estimate used for persisted messages: the character count.
pub fn estimate_tokens(content: &str) -> u32 {
    u32::try_from(content.chars().count()).unwrap_or(u32::MAX)
}
