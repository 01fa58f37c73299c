//! In-memory session store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::error::StoreError;
use parley_core::message::{Message, MessageId, NewMessage, Session, SessionId};
use parley_core::session::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct SessionLog {
    session: Session,
    messages: Vec<Message>,
}

impl SessionLog {
    fn new(id: SessionId, agent_id: &str, title: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            session: Session {
                id,
                agent_id: agent_id.to_string(),
                title: title.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
            messages: Vec::new(),
        }
    }
}

/// A session store that keeps every session in a map.
/// Useful for testing and runs where persistence isn't needed.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionLog>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total number of messages across all sessions.
    pub async fn message_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .map(|log| log.messages.len())
            .sum()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn ensure_session(
        &self,
        agent_id: &str,
        title: Option<&str>,
    ) -> Result<SessionId, StoreError> {
        let id = SessionId::new();
        self.sessions
            .write()
            .await
            .insert(id.clone(), SessionLog::new(id.clone(), agent_id, title));
        Ok(id)
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> Result<MessageId, StoreError> {
        let mut sessions = self.sessions.write().await;
        let log = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionLog::new(session_id.clone(), "", None));

        let id = Uuid::new_v4().to_string();
        let stored = message.into_message(id.clone(), session_id.clone());
        log.session.updated_at = stored.created_at;
        log.messages.push(stored);
        Ok(id)
    }

    async fn recent_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let sessions = self.sessions.read().await;
        let Some(log) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let skip = log.messages.len().saturating_sub(limit);
        Ok(log.messages[skip..].to_vec())
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|log| log.session.clone()))
    }

    async fn list_sessions(&self, agent_id: Option<&str>) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut listed: Vec<Session> = sessions
            .values()
            .filter(|log| agent_id.is_none_or(|a| log.session.agent_id == a))
            .map(|log| log.session.clone())
            .collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Role;

    #[tokio::test]
    async fn ensure_session_binds_agent() {
        let store = InMemorySessionStore::new();
        let id = store.ensure_session("weather-bot", Some("Paris?")).await.unwrap();

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.agent_id, "weather-bot");
        assert_eq!(session.title.as_deref(), Some("Paris?"));
    }

    #[tokio::test]
    async fn history_is_chronological_and_bounded() {
        let store = InMemorySessionStore::new();
        let id = store.ensure_session("bot", None).await.unwrap();
        for n in 0..5 {
            store
                .append_message(&id, NewMessage::user(format!("message {n}")))
                .await
                .unwrap();
        }

        let history = store.recent_history(&id, 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
        assert!(history.iter().all(|m| m.role == Role::User));
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let store = InMemorySessionStore::new();
        let history = store.recent_history(&SessionId::from("nope"), 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn append_to_unknown_session_registers_it() {
        let store = InMemorySessionStore::new();
        let id = SessionId::from("caller-chosen");
        store.append_message(&id, NewMessage::user("hi")).await.unwrap();

        assert!(store.get_session(&id).await.unwrap().is_some());
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn list_sessions_filters_by_agent() {
        let store = InMemorySessionStore::new();
        store.ensure_session("a", None).await.unwrap();
        store.ensure_session("a", None).await.unwrap();
        store.ensure_session("b", None).await.unwrap();

        assert_eq!(store.list_sessions(None).await.unwrap().len(), 3);
        assert_eq!(store.list_sessions(Some("a")).await.unwrap().len(), 2);
        assert!(store.list_sessions(Some("c")).await.unwrap().is_empty());
    }
}
