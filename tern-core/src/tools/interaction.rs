//! Tools that talk to the human instead of the filesystem.

use anyhow::Result;
use async_trait::async_trait;
use dialoguer::{Confirm, Input};
use serde_json::{Map, Value, json};

use crate::config::constants::tools as tool_names;

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_str, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

const CANCELLED_ERROR: &str = "cancelled by user";

pub struct AskFollowupQuestionTool {
    descriptor: ToolDescriptor,
}

impl Default for AskFollowupQuestionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AskFollowupQuestionTool {
    pub fn new() -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::ASK_FOLLOWUP_QUESTION,
            "Ask the user a clarifying question and wait for their answer",
            ToolCategory::System,
            vec![
                ToolParameter::required("question", ParamType::String, "Question to present"),
                ToolParameter::optional(
                    "mode",
                    ParamType::String,
                    "One of: text, confirm, choice",
                    Some(json!("text")),
                ),
                ToolParameter::optional(
                    "options",
                    ParamType::String,
                    "Comma-separated options, required for choice mode",
                    None,
                ),
            ],
        );
        Self { descriptor }
    }
}

#[async_trait]
impl Tool for AskFollowupQuestionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let question = required_str(&args, "question")?.to_string();
        let mode = optional_str(&args, "mode").unwrap_or("text").to_string();
        let options = optional_str(&args, "options").map(str::to_string);

        let answer = tokio::task::spawn_blocking(move || prompt_user(&question, &mode, options))
            .await?;
        Ok(match answer {
            Ok(value) => ToolResult::ok(value),
            Err(PromptError::Cancelled) => ToolResult::failure(CANCELLED_ERROR),
            Err(PromptError::BadRequest(reason)) => ToolResult::failure(reason),
        })
    }
}

enum PromptError {
    Cancelled,
    BadRequest(String),
}

fn prompt_user(question: &str, mode: &str, options: Option<String>) -> Result<Value, PromptError> {
    match mode {
        "confirm" => {
            let confirmed = Confirm::new()
                .with_prompt(question)
                .interact()
                .map_err(|_| PromptError::Cancelled)?;
            Ok(json!(confirmed))
        }
        "choice" => {
            let options = options.ok_or_else(|| {
                PromptError::BadRequest("choice mode requires the 'options' parameter".to_string())
            })?;
            let items: Vec<String> = options
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if items.is_empty() {
                return Err(PromptError::BadRequest(
                    "choice mode requires at least one option".to_string(),
                ));
            }
            let menu: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}. {item}", i + 1))
                .collect();
            // Out-of-range and non-numeric selections re-prompt instead of
            // failing the call.
            loop {
                let raw: String = Input::new()
                    .with_prompt(format!("{question}\n{}\nSelect", menu.join("\n")))
                    .interact_text()
                    .map_err(|_| PromptError::Cancelled)?;
                if let Some(index) = parse_choice(&raw, items.len()) {
                    return Ok(json!(items[index]));
                }
            }
        }
        _ => {
            let answer: String = Input::new()
                .with_prompt(question)
                .allow_empty(true)
                .interact_text()
                .map_err(|_| PromptError::Cancelled)?;
            Ok(json!(answer))
        }
    }
}

/// Map raw menu input to a zero-based index. The menu is numbered from 1;
/// anything non-numeric or outside `1..=len` is no selection at all.
fn parse_choice(raw: &str, len: usize) -> Option<usize> {
    let index = raw.trim().parse::<usize>().ok()?;
    if index >= 1 && index <= len {
        Some(index - 1)
    } else {
        None
    }
}

pub struct AttemptCompletionTool {
    descriptor: ToolDescriptor,
}

impl Default for AttemptCompletionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptCompletionTool {
    pub fn new() -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::ATTEMPT_COMPLETION,
            "Signal that the requested task is finished, with a result summary",
            ToolCategory::System,
            vec![
                ToolParameter::required("summary", ParamType::String, "What was accomplished"),
                ToolParameter::optional(
                    "created_files",
                    ParamType::String,
                    "Comma-separated paths of files created",
                    None,
                ),
                ToolParameter::optional(
                    "modified_files",
                    ParamType::String,
                    "Comma-separated paths of files modified",
                    None,
                ),
            ],
        );
        Self { descriptor }
    }
}

#[async_trait]
impl Tool for AttemptCompletionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let summary = required_str(&args, "summary")?;
        // Reporting action: downstream consumers rely on the summary being
        // echoed verbatim.
        let mut result = ToolResult::ok(summary);
        for key in ["created_files", "modified_files"] {
            if let Some(list) = optional_str(&args, key) {
                let paths: Vec<Value> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| json!(p))
                    .collect();
                result = result.with_metadata(key, Value::Array(paths));
            }
        }
        Ok(result)
    }
}

pub struct SystemStatusTool {
    descriptor: ToolDescriptor,
    guard: PathGuard,
    tool_inventory: Vec<String>,
}

impl SystemStatusTool {
    pub fn new(guard: PathGuard, tool_inventory: Vec<String>) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::SYSTEM_STATUS,
            "Report the host platform, workspace, and available tools",
            ToolCategory::System,
            vec![],
        );
        Self {
            descriptor,
            guard,
            tool_inventory,
        }
    }
}

#[async_trait]
impl Tool for SystemStatusTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<ToolResult> {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Ok(ToolResult::ok(json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "workspace_root": self.guard.workspace_root().display().to_string(),
            "cpu_count": cpus,
            "tools": self.tool_inventory,
        })))
    }
}
