//! Shell command execution: validate, classify, run with a timeout.
//!
//! The metacharacter denylist and the safe/dangerous tables reduce the blast
//! radius of accidental destructive invocations. They are a heuristic, not a
//! sandbox, and must not be treated as a security boundary against an
//! adversarial caller.

use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::config::constants::{defaults, tools as tool_names};

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_bool, optional_str, optional_usize, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

const STDERR_MARKER: &str = "\n[stderr]: ";
const NO_CAPTURE_PLACEHOLDER: &str = "command executed (output not captured)";
const TIMEOUT_EXIT_CODE: i64 = -1;

/// Leading tokens considered routine developer activity.
const SAFE_COMMANDS: &[&str] = &[
    "ls", "pwd", "cat", "echo", "grep", "find", "head", "tail", "wc", "sort", "uniq", "which",
    "env", "date", "whoami", "uname", "df", "du", "ps", "file", "stat", "tree", "git", "cargo",
    "rustc", "rustup", "python", "python3", "pip", "pip3", "npm", "npx", "node", "yarn", "make",
    "mkdir", "touch", "diff",
];

/// Leading tokens that delete, escalate, or reconfigure. Refused unless the
/// caller explicitly approved the invocation.
const DANGEROUS_COMMANDS: &[&str] = &[
    "rm", "rmdir", "mv", "cp", "dd", "chmod", "chown", "chgrp", "ln", "sudo", "su", "kill",
    "killall", "pkill", "shutdown", "reboot", "halt", "poweroff", "init", "systemctl", "service",
    "mkfs", "fdisk", "parted", "mount", "umount", "passwd", "useradd", "userdel", "usermod",
    "crontab",
];

/// Multi-word prefixes safe regardless of the leading-token tables.
const SAFE_PREFIXES: &[&str] = &[
    "git status",
    "git log",
    "git diff",
    "git show",
    "git branch",
    "pip list",
    "pip show",
    "npm run",
    "npm start",
    "npm test",
    "yarn run",
    "yarn start",
    "yarn test",
    "python -m",
    "python3 -m",
];

const DENIED_METACHARACTERS: &[&str] = &["|", "&", ";", "$(", "`", "<"];
const REDIRECTION_ALLOWANCE: &[&str] = &["echo", "cat", "print"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    Safe,
    Unknown,
    Dangerous,
}

impl CommandClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandClass::Safe => "safe",
            CommandClass::Unknown => "unknown",
            CommandClass::Dangerous => "dangerous",
        }
    }
}

/// Reject empty, oversized, or metacharacter-laden commands. Redirection is
/// tolerated when the command involves plain output producers.
pub fn validate_command(command: &str) -> Result<(), String> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err("command is empty".to_string());
    }
    if command.len() > defaults::MAX_COMMAND_LENGTH {
        return Err(format!(
            "command exceeds the maximum length of {} characters",
            defaults::MAX_COMMAND_LENGTH
        ));
    }
    let allows_redirection = REDIRECTION_ALLOWANCE
        .iter()
        .any(|benign| trimmed.contains(benign));
    for meta in DENIED_METACHARACTERS {
        if trimmed.contains(meta) {
            return Err(format!(
                "command contains the disallowed shell metacharacter '{meta}'"
            ));
        }
    }
    if trimmed.contains('>') && !allows_redirection {
        return Err("output redirection is only allowed with echo/cat/print".to_string());
    }
    Ok(())
}

/// Classify by path-stripped leading token and the safe multi-word prefixes.
pub fn classify_command(command: &str) -> CommandClass {
    let tokens = shell_words::split(command)
        .unwrap_or_else(|_| command.split_whitespace().map(str::to_string).collect());
    let Some(first) = tokens.first() else {
        return CommandClass::Unknown;
    };
    let leading = first.rsplit('/').next().unwrap_or(first);

    if DANGEROUS_COMMANDS.contains(&leading) {
        return CommandClass::Dangerous;
    }
    let normalized = {
        let mut head = vec![leading.to_string()];
        head.extend(tokens.iter().skip(1).take(1).cloned());
        head.join(" ")
    };
    if SAFE_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return CommandClass::Safe;
    }
    if SAFE_COMMANDS.contains(&leading) {
        return CommandClass::Safe;
    }
    CommandClass::Unknown
}

pub struct ExecuteCommandTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl ExecuteCommandTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::EXECUTE_COMMAND,
            "Run a shell command in the workspace and report its output and \
             exit code",
            ToolCategory::Command,
            vec![
                ToolParameter::required("command", ParamType::String, "Command line to run"),
                ToolParameter::optional(
                    "timeout_secs",
                    ParamType::Integer,
                    "Seconds to wait before the process is killed",
                    Some(json!(defaults::COMMAND_TIMEOUT_SECS)),
                ),
                ToolParameter::optional(
                    "capture_output",
                    ParamType::Boolean,
                    "Capture stdout/stderr (disable for noisy long runs)",
                    Some(json!(true)),
                ),
                ToolParameter::optional(
                    "approved",
                    ParamType::Boolean,
                    "Set when the user approved a dangerous-classified command",
                    Some(json!(false)),
                ),
                ToolParameter::optional(
                    "working_dir",
                    ParamType::String,
                    "Directory to run in, defaulting to the workspace root",
                    None,
                ),
            ],
        )
        .with_approval();
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let command = required_str(&args, "command")?;
        let timeout_secs =
            optional_usize(&args, "timeout_secs", defaults::COMMAND_TIMEOUT_SECS as usize).max(1);
        let capture_output = optional_bool(&args, "capture_output", true);
        let approved = optional_bool(&args, "approved", false);

        if let Err(reason) = validate_command(command) {
            return Ok(ToolResult::failure(reason));
        }
        let class = classify_command(command);
        if class == CommandClass::Dangerous && !approved {
            warn!(command, "refusing dangerous-classified command");
            return Ok(ToolResult::failure(format!(
                "command '{command}' is classified as dangerous and was not approved"
            ))
            .with_metadata("classification", class.as_str()));
        }

        let working_dir = match optional_str(&args, "working_dir") {
            Some(raw) => match self.guard.resolve(raw) {
                Ok(dir) => dir,
                Err(denied) => return Ok(ToolResult::failure(denied)),
            },
            None => self.guard.workspace_root().to_path_buf(),
        };

        let mut process = tokio::process::Command::new("sh");
        process
            .arg("-c")
            .arg(command)
            .current_dir(&working_dir)
            .stdin(Stdio::null());
        if capture_output {
            process.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            process.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let started = Instant::now();
        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(err) => {
                return Ok(ToolResult::failure(format!(
                    "failed to start command '{command}': {err}"
                )));
            }
        };

        // Drain the pipes concurrently so a chatty child never fills its
        // buffers while we wait on it.
        let stdout_task = spawn_reader(child.stdout.take());
        let stderr_task = spawn_reader(child.stderr.take());

        let status = match tokio::time::timeout(
            Duration::from_secs(timeout_secs as u64),
            child.wait(),
        )
        .await
        {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                return Ok(ToolResult::failure(format!(
                    "failed waiting for command '{command}': {err}"
                )));
            }
            Err(_) => {
                // Kill, do not abandon: a leaked child outliving the call
                // would keep the session wedged.
                let _ = child.kill().await;
                return Ok(ToolResult::failure(format!(
                    "command timed out after {timeout_secs}s"
                ))
                .with_metadata("exit_code", TIMEOUT_EXIT_CODE)
                .with_metadata("timed_out", true)
                .with_metadata("classification", class.as_str()));
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        let content = if capture_output {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            let mut text = String::from_utf8_lossy(&stdout).into_owned();
            if !stderr.is_empty() {
                text.push_str(STDERR_MARKER);
                text.push_str(&String::from_utf8_lossy(&stderr));
            }
            text
        } else {
            NO_CAPTURE_PLACEHOLDER.to_string()
        };

        Ok(ToolResult::ok(content)
            .with_metadata("exit_code", status.code().map(i64::from).unwrap_or(-1))
            .with_metadata("elapsed_secs", elapsed)
            .with_metadata("classification", class.as_str())
            .with_metadata("timed_out", false))
    }
}

fn spawn_reader(
    pipe: Option<impl AsyncReadExt + Unpin + Send + 'static>,
) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer).await;
        }
        buffer
    })
}
