//! SQLite session store and execution log.
//!
//! Uses a single SQLite database file with three tables:
//! - `sessions` — one row per conversation, bound to an agent
//! - `messages` — append-only message log; `seq` gives the total order
//! - `tool_executions` — audit log of every invoked tool call
//!
//! Timestamps are stored as RFC 3339 text, tool records as JSON.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StoreError;
use parley_core::message::{Message, MessageId, NewMessage, Role, Session, SessionId};
use parley_core::session::SessionStore;
use parley_core::tool::{ExecutionLog, ToolExecutionRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed session store. Also serves as the tool execution log.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) a store from a SQLite URL such as `sqlite://sessions.db`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` sees its own database, so keep exactly one alive.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {url}");
        Ok(store)
    }

    /// Open a database file, creating parent directories as needed.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY NOT NULL,
                agent_id    TEXT NOT NULL,
                title       TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                session_id   TEXT NOT NULL REFERENCES sessions(id),
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                token_count  INTEGER,
                tool_records TEXT NOT NULL DEFAULT '[]',
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, seq DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tool_executions (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                call_id      TEXT NOT NULL,
                tool_id      TEXT,
                tool_name    TEXT NOT NULL,
                parameters   TEXT NOT NULL,
                result       TEXT,
                success      INTEGER NOT NULL,
                error        TEXT,
                duration_ms  INTEGER NOT NULL,
                session_id   TEXT NOT NULL,
                agent_id     TEXT NOT NULL,
                executed_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tool_executions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tool_executions_session
            ON tool_executions(session_id, seq)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tool_executions index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Every logged tool execution for a session, in the order they were recorded.
    pub async fn executions(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ToolExecutionRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tool_executions WHERE session_id = ?1 ORDER BY seq")
            .bind(session_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("executions: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let id: String = Self::column(row, "id")?;
        let created_at: String = Self::column(row, "created_at")?;
        let updated_at: String = Self::column(row, "updated_at")?;

        Ok(Session {
            id: SessionId(id),
            agent_id: Self::column(row, "agent_id")?,
            title: Self::column(row, "title")?,
            created_at: Self::parse_time(&created_at),
            updated_at: Self::parse_time(&updated_at),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let session_id: String = Self::column(row, "session_id")?;
        let role: String = Self::column(row, "role")?;
        let token_count: Option<i64> = Self::column(row, "token_count")?;
        let records_json: String = Self::column(row, "tool_records")?;
        let created_at: String = Self::column(row, "created_at")?;

        let role = Role::from_str(&role).map_err(StoreError::Serialization)?;
        let tool_records = serde_json::from_str(&records_json)
            .map_err(|e| StoreError::Serialization(format!("tool_records: {e}")))?;

        Ok(Message {
            id: Self::column(row, "id")?,
            session_id: SessionId(session_id),
            role,
            content: Self::column(row, "content")?,
            token_count: token_count.and_then(|n| u32::try_from(n).ok()),
            tool_records,
            created_at: Self::parse_time(&created_at),
        })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ToolExecutionRecord, StoreError> {
        let parameters: String = Self::column(row, "parameters")?;
        let result: Option<String> = Self::column(row, "result")?;
        let duration_ms: i64 = Self::column(row, "duration_ms")?;
        let session_id: String = Self::column(row, "session_id")?;
        let executed_at: String = Self::column(row, "executed_at")?;

        let parameters = serde_json::from_str(&parameters)
            .map_err(|e| StoreError::Serialization(format!("parameters: {e}")))?;
        let result = result
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StoreError::Serialization(format!("result: {e}")))?;

        Ok(ToolExecutionRecord {
            call_id: Self::column(row, "call_id")?,
            tool_id: Self::column(row, "tool_id")?,
            tool_name: Self::column(row, "tool_name")?,
            parameters,
            result,
            success: Self::column(row, "success")?,
            error: Self::column(row, "error")?,
            duration_ms: u64::try_from(duration_ms).unwrap_or_default(),
            session_id: SessionId(session_id),
            agent_id: Self::column(row, "agent_id")?,
            executed_at: Self::parse_time(&executed_at),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_session(
        &self,
        agent_id: &str,
        title: Option<&str>,
    ) -> Result<SessionId, StoreError> {
        let id = SessionId::new();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, agent_id, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(id.as_str())
        .bind(agent_id)
        .bind(title)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session failed: {e}")))?;

        debug!(session_id = %id, agent_id, "Created session");
        Ok(id)
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> Result<MessageId, StoreError> {
        let id = Uuid::new_v4().to_string();
        let stored = message.into_message(id.clone(), session_id.clone());
        let records_json = serde_json::to_string(&stored.tool_records)
            .map_err(|e| StoreError::Serialization(format!("tool_records: {e}")))?;
        let created_at = stored.created_at.to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        // A caller-supplied id that was never created is registered on first write.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sessions (id, agent_id, title, created_at, updated_at)
            VALUES (?1, '', NULL, ?2, ?2)
            "#,
        )
        .bind(session_id.as_str())
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO messages
                (id, session_id, role, content, token_count, tool_records, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&stored.id)
        .bind(session_id.as_str())
        .bind(stored.role.as_str())
        .bind(&stored.content)
        .bind(stored.token_count.map(i64::from))
        .bind(&records_json)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        sqlx::query("UPDATE sessions SET updated_at = ?2 WHERE id = ?1")
            .bind(session_id.as_str())
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE session failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(session_id = %session_id, message_id = %id, role = %stored.role, "Appended message");
        Ok(id)
    }

    async fn recent_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM messages WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2
            ) ORDER BY seq ASC
            "#,
        )
        .bind(session_id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent history: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET session: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list_sessions(&self, agent_id: Option<&str>) -> Result<Vec<Session>, StoreError> {
        let rows = match agent_id {
            Some(agent_id) => {
                sqlx::query("SELECT * FROM sessions WHERE agent_id = ?1 ORDER BY updated_at DESC")
                    .bind(agent_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("list sessions: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }
}

#[async_trait]
impl ExecutionLog for SqliteSessionStore {
    async fn record(&self, record: &ToolExecutionRecord) -> Result<(), StoreError> {
        let parameters = serde_json::to_string(&record.parameters)
            .map_err(|e| StoreError::Serialization(format!("parameters: {e}")))?;
        let result = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Serialization(format!("result: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tool_executions
                (call_id, tool_id, tool_name, parameters, result, success, error,
                 duration_ms, session_id, agent_id, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.call_id)
        .bind(&record.tool_id)
        .bind(&record.tool_name)
        .bind(&parameters)
        .bind(&result)
        .bind(record.success)
        .bind(&record.error)
        .bind(i64::try_from(record.duration_ms).unwrap_or(i64::MAX))
        .bind(record.session_id.as_str())
        .bind(&record.agent_id)
        .bind(record.executed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT tool execution failed: {e}")))?;

        debug!(call_id = %record.call_id, tool = %record.tool_name, "Logged tool execution");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::tool::RecordOrigin;
    use serde_json::{Map, Value, json};

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::new("sqlite::memory:").await.unwrap()
    }

    fn record(session_id: &SessionId, call_id: &str) -> ToolExecutionRecord {
        let mut params = Map::new();
        params.insert("city".into(), Value::from("Paris"));
        ToolExecutionRecord::succeeded(
            RecordOrigin {
                call_id: call_id.into(),
                tool_id: Some("weather-bot:tool:get_weather".into()),
                tool_name: "get_weather".into(),
                session_id: session_id.clone(),
                agent_id: "weather-bot".into(),
            },
            params,
            json!("18C, sunny"),
            4,
        )
    }

    #[tokio::test]
    async fn store_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }

    #[tokio::test]
    async fn ensure_and_get_session() {
        let store = test_store().await;
        let id = store.ensure_session("weather-bot", Some("Weather in Paris?")).await.unwrap();

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.agent_id, "weather-bot");
        assert_eq!(session.title.as_deref(), Some("Weather in Paris?"));
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = test_store().await;
        assert!(store.get_session(&SessionId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_returns_newest_window_oldest_first() {
        let store = test_store().await;
        let id = store.ensure_session("bot", None).await.unwrap();
        for n in 0..12 {
            store
                .append_message(&id, NewMessage::user(format!("m{n}")))
                .await
                .unwrap();
        }

        let history = store.recent_history(&id, 10).await.unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().unwrap().content, "m2");
        assert_eq!(history.last().unwrap().content, "m11");
    }

    #[tokio::test]
    async fn message_round_trip_keeps_tool_records() {
        let store = test_store().await;
        let id = store.ensure_session("weather-bot", None).await.unwrap();
        store.append_message(&id, NewMessage::user("Weather in Paris?")).await.unwrap();
        store
            .append_message(
                &id,
                NewMessage::assistant("It is 18C.", vec![record(&id, "call_0")]),
            )
            .await
            .unwrap();

        let history = store.recent_history(&id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].tool_records.len(), 1);
        assert_eq!(history[1].tool_records[0].tool_name, "get_weather");
        assert_eq!(history[1].token_count, Some(10));
    }

    #[tokio::test]
    async fn append_registers_unknown_session() {
        let store = test_store().await;
        let id = SessionId::from("caller-chosen");
        store.append_message(&id, NewMessage::user("hi")).await.unwrap();

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.agent_id, "");
        assert_eq!(store.recent_history(&id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_sessions_by_agent() {
        let store = test_store().await;
        store.ensure_session("a", None).await.unwrap();
        store.ensure_session("b", None).await.unwrap();

        assert_eq!(store.list_sessions(None).await.unwrap().len(), 2);
        let only_a = store.list_sessions(Some("a")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].agent_id, "a");
    }

    #[tokio::test]
    async fn execution_log_round_trip() {
        let store = test_store().await;
        let id = store.ensure_session("weather-bot", None).await.unwrap();

        store.record(&record(&id, "call_0")).await.unwrap();
        store.record(&record(&id, "call_1")).await.unwrap();

        let logged = store.executions(&id).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].call_id, "call_0");
        assert!(logged[0].success);
        assert_eq!(logged[0].result, Some(json!("18C, sunny")));
        assert_eq!(logged[0].parameters["city"], "Paris");
    }

    #[tokio::test]
    async fn open_creates_file_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.sqlite");

        let id = {
            let store = SqliteSessionStore::open(&path).await.unwrap();
            let id = store.ensure_session("bot", None).await.unwrap();
            store.append_message(&id, NewMessage::user("persisted")).await.unwrap();
            id
        };

        let reopened = SqliteSessionStore::open(&path).await.unwrap();
        let history = reopened.recent_history(&id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "persisted");
    }
}
