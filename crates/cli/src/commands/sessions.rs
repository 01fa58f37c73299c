//! `parley sessions` — list stored sessions.

use std::path::Path;

use super::{CommandResult, load_config, open_storage};

pub async fn run(config_path: &Path, agent: Option<String>) -> CommandResult {
    let config = load_config(config_path)?;
    let storage = open_storage(&config).await?;
    let sessions = storage.sessions.list_sessions(agent.as_deref()).await?;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for session in sessions {
        println!(
            "{}  {:<16} {}  {}",
            session.id,
            session.agent_id,
            session.updated_at.format("%Y-%m-%d %H:%M:%S"),
            session.title.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
