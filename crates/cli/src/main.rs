//! Parley CLI — the main entry point.
//!
//! Commands:
//! - `init`      — Write a starter config
//! - `agents`    — List configured agents
//! - `chat`      — Run one turn against a scripted model
//! - `sessions`  — List stored sessions
//! - `history`   — Print a session's messages

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "parley", about = "Parley — agent turn runtime", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.parley/config.toml)
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a starter config
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List configured agents
    Agents,

    /// Send one message to an agent
    Chat(commands::chat::ChatArgs),

    /// List sessions
    Sessions {
        /// Only sessions of this agent
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Print the messages of a session
    History {
        session: String,

        /// Most recent messages to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed output on stdout stays clean
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(parley_config::AppConfig::config_path);

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force)?,
        Commands::Agents => commands::agents::run(&config_path)?,
        Commands::Chat(args) => commands::chat::run(&config_path, args).await?,
        Commands::Sessions { agent } => commands::sessions::run(&config_path, agent).await?,
        Commands::History { session, limit } => {
            commands::history::run(&config_path, session, limit).await?
        }
    }

    Ok(())
}
