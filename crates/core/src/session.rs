//! Session store trait — the append-only message history gateway.
//!
//! A turn only ever appends to a session and reads its recent tail; stores
//! never update or delete messages.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Message, MessageId, NewMessage, Session, SessionId};

/// Default number of history entries fetched per model call.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// The core SessionStore trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The store name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a new session bound to an agent and return its id.
    async fn ensure_session(
        &self,
        agent_id: &str,
        title: Option<&str>,
    ) -> std::result::Result<SessionId, StoreError>;

    /// Append a message at the end of a session.
    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> std::result::Result<MessageId, StoreError>;

    /// The newest `limit` messages, oldest first.
    async fn recent_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// Session metadata, if the session exists.
    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> std::result::Result<Option<Session>, StoreError>;

    /// Sessions, most recently updated first, optionally filtered by agent.
    async fn list_sessions(
        &self,
        agent_id: Option<&str>,
    ) -> std::result::Result<Vec<Session>, StoreError>;
}
