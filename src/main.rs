mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use tern_core::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::load()?;

    match cli.command {
        Command::Chat {
            session,
            new_session,
            tools,
        } => commands::chat::run(config, session, new_session, tools).await,
        Command::Session { action } => commands::sessions::run(config, action),
    }
}
