//! Session stores, execution logs and agent directories for Parley.

pub mod directory;
pub mod execution_log;
pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use directory::StaticAgentDirectory;
pub use execution_log::InMemoryExecutionLog;
pub use in_memory::InMemorySessionStore;
pub use noop::NoopExecutionLog;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
