//! # Parley Core
//!
//! Domain types, collaborator traits, and error definitions for the Parley
//! agent turn runtime. Every other crate depends inward on this one.
//!
//! The turn engine talks to three collaborators, each defined as a trait here:
//! - [`ModelGateway`] streams completion deltas for a composed prompt
//! - [`ToolBackend`] executes tools of one [`ToolKind`]
//! - [`SessionStore`] persists and replays session messages
//!
//! Agents are resolved through [`AgentDirectory`] and invoked tool calls are
//! audited through [`ExecutionLog`].

pub mod agent;
pub mod error;
pub mod message;
pub mod model;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentDirectory, LlmBinding, Prompt};
pub use error::{Error, ModelError, Result, StoreError, ToolError};
pub use message::{Message, MessageId, NewMessage, Role, Session, SessionId};
pub use model::{Delta, ModelGateway, ModelRequest, ModelStream, ToolCallFragment};
pub use session::SessionStore;
pub use tool::{
    ExecutionLog, RecordOrigin, Tool, ToolBackend, ToolCall, ToolExecutionRecord, ToolKind,
    ToolSchema,
};
