//! Session management subcommands.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;

use tern_core::config::AgentConfig;
use tern_core::session::SessionStore;

use crate::cli::SessionAction;

const UNNAMED: &str = "Unnamed session";
const UNKNOWN_DATE: &str = "Unknown date";

pub fn run(config: AgentConfig, action: SessionAction) -> Result<()> {
    let store = SessionStore::open(&config.db_path, &config.table_base)?;
    match action {
        SessionAction::List => {
            let sessions = store.list_sessions()?;
            if sessions.is_empty() {
                println!("no stored sessions");
                return Ok(());
            }
            for info in sessions {
                println!(
                    "{}  {}  {}",
                    style(&info.session_id).cyan(),
                    info.name.as_deref().unwrap_or(UNNAMED),
                    style(info.created_at.as_deref().unwrap_or(UNKNOWN_DATE)).dim(),
                );
            }
        }
        SessionAction::Delete { session_id } => {
            store.delete_session(&session_id)?;
            println!("deleted {session_id}");
        }
        SessionAction::DeleteAll { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Delete every stored session?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
            if confirmed {
                store.delete_all_sessions()?;
                println!("all sessions deleted");
            }
        }
        SessionAction::Messages { session_id, limit } => {
            let messages = store.get_messages(&session_id, limit);
            if messages.is_empty() {
                println!("no messages for {session_id}");
                return Ok(());
            }
            for message in messages {
                let role = match message.role {
                    tern_core::session::Role::User => style("user").green(),
                    tern_core::session::Role::Assistant => style("assistant").blue(),
                    tern_core::session::Role::System => style("system").yellow(),
                };
                println!(
                    "{} {}\n{}\n",
                    role.bold(),
                    style(message.created_at.as_deref().unwrap_or("")).dim(),
                    message.content
                );
            }
        }
    }
    Ok(())
}
