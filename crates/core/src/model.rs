//! Model gateway trait — the abstraction over LLM backends.
//!
//! A gateway takes a fully composed prompt plus the tool schema and returns a
//! stream of deltas. Each delta may carry a content fragment and/or tool-call
//! fragments keyed by index. The gateway knows nothing about tools or sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ModelError;
use crate::tool::ToolSchema;

/// A request for one streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (from the agent's LLM binding)
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// System prompt, history and new content, already composed
    pub prompt: String,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A fragment of a tool call. `id` and `name` usually arrive once; `arguments`
/// arrives in pieces split at arbitrary boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A single delta in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Partial content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// Whether this is the final delta. A closed stream also means done.
    #[serde(default)]
    pub done: bool,
}

impl Delta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// The receiving half of a model stream.
pub type ModelStream = mpsc::Receiver<std::result::Result<Delta, ModelError>>;

/// The core ModelGateway trait.
///
/// Concrete provider adapters live outside this workspace; the turn engine only
/// consumes the delta stream.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway.
    fn name(&self) -> &str;

    /// Start a streamed completion.
    async fn stream_completion(
        &self,
        request: ModelRequest,
    ) -> std::result::Result<ModelStream, ModelError>;
}
