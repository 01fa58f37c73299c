//! `parley history` — print a session's messages with their tool records.

use parley_core::message::SessionId;
use std::path::Path;

use super::{CommandResult, load_config, open_storage};

pub async fn run(config_path: &Path, session: String, limit: usize) -> CommandResult {
    let config = load_config(config_path)?;
    let storage = open_storage(&config).await?;
    let session_id = SessionId::from(session);

    if storage.sessions.get_session(&session_id).await?.is_none() {
        return Err(format!("Session not found: {session_id}").into());
    }

    for message in storage.sessions.recent_history(&session_id, limit).await? {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M:%S"),
            message.role,
            message.content
        );
        for record in &message.tool_records {
            let outcome = match (&record.result, &record.error) {
                (_, Some(error)) => format!("error: {error}"),
                (Some(result), None) => serde_json::to_string(result)?,
                (None, None) => String::new(),
            };
            println!(
                "    tool {} ({} ms) {}",
                record.tool_name, record.duration_ms, outcome
            );
        }
    }
    Ok(())
}
