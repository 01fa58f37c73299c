//! `parley chat` — run one turn and stream the reply to stdout.
//!
//! The model is a replay gateway fed from a JSON script, so turns can be run
//! and inspected without a provider.

use clap::Args;
use parley_agent::prompt::preview;
use parley_agent::{ReplayGateway, SESSION_TITLE_CHARS, TurnOrchestrator, TurnRequest, TurnSettings};
use parley_core::agent::AgentDirectory;
use parley_core::error::StoreError;
use parley_core::message::SessionId;
use parley_core::session::SessionStore;
use parley_store::StaticAgentDirectory;
use parley_tools::{ToolExecutor, default_backends};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{CommandResult, load_config, open_storage};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Agent to talk to
    #[arg(short, long)]
    pub agent: String,

    /// Continue an existing session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Replay script with the model's responses
    #[arg(long, env = "PARLEY_REPLAY_SCRIPT")]
    pub script: PathBuf,

    /// Caller identity recorded in logs
    #[arg(long)]
    pub user: Option<String>,

    /// The message to send
    pub message: String,
}

pub async fn run(config_path: &Path, args: ChatArgs) -> CommandResult {
    let config = load_config(config_path)?;
    let storage = open_storage(&config).await?;
    let directory = Arc::new(StaticAgentDirectory::new(config.agents()));
    let model = Arc::new(ReplayGateway::from_file(&args.script)?);
    let tools = Arc::new(ToolExecutor::new(default_backends(), storage.log.clone()));

    let session_id = session_for(
        directory.as_ref(),
        storage.sessions.as_ref(),
        &args.agent,
        args.session,
        &args.message,
    )
    .await?;
    if let Some(id) = &session_id {
        eprintln!("session: {id}");
    }

    let orchestrator = TurnOrchestrator::new(directory, storage.sessions.clone(), model, tools)
        .with_settings(TurnSettings::from(&config.orchestrator));
    let mut rx = orchestrator.send_turn(TurnRequest {
        agent_id: Some(args.agent),
        content: args.message,
        session_id,
        user_id: args.user,
    });

    let mut stdout = std::io::stdout();
    while let Some(item) = rx.recv().await {
        let chunk = item?;
        write!(stdout, "{chunk}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

/// The session a chat turn runs in, created up front so its id can be
/// reported. Nothing is created for a turn that would be rejected before
/// reaching the model.
async fn session_for(
    directory: &dyn AgentDirectory,
    sessions: &dyn SessionStore,
    agent_id: &str,
    supplied: Option<String>,
    message: &str,
) -> Result<Option<SessionId>, StoreError> {
    if let Some(id) = supplied {
        return Ok(Some(SessionId::from(id)));
    }

    let agent_id = agent_id.trim();
    if agent_id.is_empty() || message.trim().is_empty() {
        return Ok(None);
    }
    match directory.get_agent(agent_id).await? {
        Some(agent) if agent.active_prompt().is_some() => {
            let title = preview(message, SESSION_TITLE_CHARS);
            Ok(Some(sessions.ensure_session(agent_id, Some(title)).await?))
        }
        _ => Ok(None),
    }
}
