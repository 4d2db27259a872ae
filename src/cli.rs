//! Command-line argument definitions.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tern", version, about = "A terminal coding agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start or resume an interactive chat
    Chat {
        /// Resume the session with this id
        #[arg(long)]
        session: Option<String>,
        /// Force a fresh session even when one could be resumed
        #[arg(long)]
        new_session: bool,
        /// Let the model call tools during the chat
        #[arg(long, default_value_t = true)]
        tools: bool,
    },
    /// Inspect and manage stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// List all stored sessions
    List,
    /// Delete one session by id
    Delete { session_id: String },
    /// Delete every stored session
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print the messages of a session
    Messages {
        session_id: String,
        /// Only the most recent N messages
        #[arg(long)]
        limit: Option<usize>,
    },
}
