//! Subcommand implementations and the wiring they share.

pub mod agents;
pub mod chat;
pub mod history;
pub mod init;
pub mod sessions;

use parley_config::{AppConfig, StorageBackend};
use parley_core::session::SessionStore;
use parley_core::tool::ExecutionLog;
use parley_store::{InMemoryExecutionLog, InMemorySessionStore, SqliteSessionStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config =
        AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// The session store and execution log selected by `[storage]`.
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub log: Arc<dyn ExecutionLog>,
}

pub async fn open_storage(config: &AppConfig) -> Result<Storage, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = config.storage.database_path();
            debug!(path = %path.display(), "Opening SQLite session store");
            let store = Arc::new(SqliteSessionStore::open(&path).await?);
            Ok(Storage {
                sessions: store.clone(),
                log: store,
            })
        }
        StorageBackend::Memory => Ok(Storage {
            sessions: Arc::new(InMemorySessionStore::new()),
            log: Arc::new(InMemoryExecutionLog::new()),
        }),
    }
}
