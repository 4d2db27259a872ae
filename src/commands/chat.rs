//! Interactive chat loop.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, bail};
use console::style;
use dialoguer::Confirm;

use tern_core::agent::Agent;
use tern_core::config::AgentConfig;
use tern_core::llm::AnthropicProvider;
use tern_core::session::SessionStore;
use tern_core::tools::ToolRegistry;

pub async fn run(
    config: AgentConfig,
    session: Option<String>,
    new_session: bool,
    tools: bool,
) -> Result<()> {
    let Some(api_key) = config.api_key.clone() else {
        bail!("no API key configured; set ANTHROPIC_API_KEY");
    };

    let registry = if tools {
        Arc::new(ToolRegistry::with_default_tools(&config))
    } else {
        Arc::new(ToolRegistry::new())
    };
    let store = SessionStore::open(&config.db_path, &config.table_base)?;
    let provider = Box::new(AnthropicProvider::new(api_key));

    let mut agent = match session {
        Some(session_id) if !new_session => {
            if !store.session_exists(&session_id)? {
                bail!("no session with id {session_id}");
            }
            let resumed = Agent::resume(config, registry, store, provider, session_id)?;
            println!(
                "{} {}",
                style("resumed session").dim(),
                style(resumed.session_id()).cyan()
            );
            resumed
        }
        _ => {
            let fresh = Agent::new(config, registry, store, provider);
            println!(
                "{} {}",
                style("new session").dim(),
                style(fresh.session_id()).cyan()
            );
            fresh
        }
    };
    agent = agent.with_approver(Box::new(|tool_name, args| {
        let detail = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        Confirm::new()
            .with_prompt(format!("Allow {tool_name} {detail}?"))
            .default(false)
            .interact()
            .unwrap_or(false)
    }));

    println!("{}", style("type your message, or 'exit' to quit").dim());
    loop {
        print!("{} ", style(">").green().bold());
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        match agent.run_turn(message).await {
            Ok(reply) => println!("{reply}"),
            Err(err) => eprintln!("{} {err:#}", style("error:").red().bold()),
        }
    }
    Ok(())
}
