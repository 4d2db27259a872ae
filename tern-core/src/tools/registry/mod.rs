//! Central tool registry: name-to-tool dispatch with pre-flight validation.
//!
//! The registry is an explicit object built once at startup and passed by
//! reference wherever tools are invoked. `execute_tool` is a total function
//! over its inputs: unknown names, bad arguments, and tool faults all come
//! back as failed [`ToolResult`]s, never as errors the orchestrator has to
//! catch.

pub mod declarations;
pub mod error;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::tools::command::ExecuteCommandTool;
use crate::tools::code_definitions::ListCodeDefinitionsTool;
use crate::tools::file_ops::{ListFilesTool, ReadFileTool, ReplaceInFileTool, WriteFileTool};
use crate::tools::file_search::FileSearchTool;
use crate::tools::interaction::{AskFollowupQuestionTool, AttemptCompletionTool, SystemStatusTool};
use crate::tools::path_guard::PathGuard;
use crate::tools::search::SearchFilesTool;
use crate::tools::traits::Tool;
use crate::tools::types::{ToolCategory, ToolResult};
use crate::tools::workspace_search::WorkspaceSearchTool;

use declarations::FunctionDeclaration;
use error::{ToolErrorType, ToolExecutionError, classify_error};

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    categories: HashMap<ToolCategory, Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard tool set confined to `config.workspace_root`.
    pub fn with_default_tools(config: &AgentConfig) -> Self {
        let guard = PathGuard::new(&config.workspace_root);
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool::new(guard.clone())));
        registry.register(Arc::new(WriteFileTool::new(guard.clone())));
        registry.register(Arc::new(ReplaceInFileTool::new(guard.clone())));
        registry.register(Arc::new(ListFilesTool::new(guard.clone())));
        registry.register(Arc::new(ListCodeDefinitionsTool::new(guard.clone())));
        registry.register(Arc::new(SearchFilesTool::new(guard.clone())));
        registry.register(Arc::new(FileSearchTool::new(guard.clone())));
        registry.register(Arc::new(WorkspaceSearchTool::new(guard.clone())));
        registry.register(Arc::new(ExecuteCommandTool::new(guard.clone())));
        registry.register(Arc::new(AskFollowupQuestionTool::new()));
        registry.register(Arc::new(AttemptCompletionTool::new()));
        let mut inventory = registry.tool_names();
        inventory.push(crate::config::constants::tools::SYSTEM_STATUS.to_string());
        registry.register(Arc::new(SystemStatusTool::new(guard, inventory)));
        registry
    }

    /// Last registration for a name wins; category membership accumulates
    /// without duplicates.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let descriptor = tool.descriptor();
        let name = descriptor.name.clone();
        let category = descriptor.category;
        let names = self.categories.entry(category).or_default();
        if !names.contains(&name) {
            names.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tools_in_category(&self, category: ToolCategory) -> Vec<String> {
        self.categories.get(&category).cloned().unwrap_or_default()
    }

    pub fn requires_approval(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|tool| tool.descriptor().requires_approval)
            .unwrap_or(false)
    }

    /// Schemas for every registered tool, in name order.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| FunctionDeclaration::from_descriptor(tool.descriptor()))
            .collect()
    }

    /// Validate and dispatch. Every failure mode is folded into the result
    /// envelope.
    pub async fn execute_tool(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolExecutionError::new(
                name,
                ToolErrorType::ToolNotFound,
                format!("no tool registered under the name '{name}'"),
            )
            .to_result();
        };

        let normalized = match tool.descriptor().validate_args(&args) {
            Ok(normalized) => normalized,
            Err(message) => {
                return ToolExecutionError::new(name, ToolErrorType::InvalidParameters, message)
                    .to_result();
            }
        };

        debug!(tool = name, "executing tool");
        match tool.execute(normalized).await {
            Ok(result) => result,
            Err(fault) => {
                warn!(tool = name, error = %fault, "tool execution fault");
                let message = fault.to_string();
                ToolExecutionError::new(name, classify_error(&message), message).to_result()
            }
        }
    }
}
