//! The turn loop: wire session history, tool declarations, and the model
//! together, dispatching requested tool calls and folding their results
//! back into the conversation.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::llm::{LlmProvider, LlmRequest};
use crate::session::{Message, SessionStore};
use crate::tools::ToolRegistry;

/// Decides whether a flagged tool call may proceed. Wired to a terminal
/// prompt in the CLI; tests substitute a closure.
pub type ApprovalCallback = Box<dyn Fn(&str, &Value) -> bool + Send + Sync>;

pub struct Agent {
    config: AgentConfig,
    registry: Arc<ToolRegistry>,
    store: SessionStore,
    provider: Box<dyn LlmProvider>,
    session_id: String,
    session_named: bool,
    seen_tool_calls: HashSet<String>,
    // One in-flight tool call per session: a second call never starts
    // before the prior one resolves.
    tool_gate: Mutex<()>,
    approver: Option<ApprovalCallback>,
}

impl Agent {
    /// Start a fresh session.
    pub fn new(
        config: AgentConfig,
        registry: Arc<ToolRegistry>,
        store: SessionStore,
        provider: Box<dyn LlmProvider>,
    ) -> Self {
        let session_id = SessionStore::new_session_id();
        Self {
            config,
            registry,
            store,
            provider,
            session_id,
            session_named: false,
            seen_tool_calls: HashSet::new(),
            tool_gate: Mutex::new(()),
            approver: None,
        }
    }

    /// Resume an existing session by id.
    pub fn resume(
        config: AgentConfig,
        registry: Arc<ToolRegistry>,
        store: SessionStore,
        provider: Box<dyn LlmProvider>,
        session_id: String,
    ) -> Result<Self> {
        let session_named = store.get_session_name(&session_id)?.is_some();
        Ok(Self {
            config,
            registry,
            store,
            provider,
            session_id,
            session_named,
            seen_tool_calls: HashSet::new(),
            tool_gate: Mutex::new(()),
            approver: None,
        })
    }

    pub fn with_approver(mut self, approver: ApprovalCallback) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one chat turn: persist the user message, loop with the model
    /// until it stops requesting tools, and return the assistant text.
    pub async fn run_turn(&mut self, user_message: &str) -> Result<String> {
        if !self.session_named {
            let name = self
                .store
                .set_session_name_from_message(&self.session_id, user_message)?;
            self.session_named = true;
            info!(session_id = %self.session_id, name, "session named");
        }
        self.store
            .append_message(&self.session_id, &Message::user(user_message))?;

        let mut transcript = String::new();
        for _ in 0..self.config.max_tool_iterations {
            let request = LlmRequest {
                messages: self.store.get_messages(&self.session_id, None),
                system_prompt: self.config.system_prompt.clone(),
                tools: self.registry.declarations(),
                model: self.config.model.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };
            let response = self
                .provider
                .generate(request)
                .await
                .context("model request failed")?;

            if let Some(text) = &response.content {
                self.store
                    .append_message(&self.session_id, &Message::assistant(text))?;
                if !transcript.is_empty() {
                    transcript.push('\n');
                }
                transcript.push_str(text);
            }
            if response.tool_calls.is_empty() {
                break;
            }

            for call in response.tool_calls {
                // Repeated notifications of the same call id run once.
                if !call.id.is_empty() && !self.seen_tool_calls.insert(call.id.clone()) {
                    debug!(call_id = %call.id, "skipping duplicate tool call");
                    continue;
                }
                let result = self.dispatch(&call.name, call.arguments).await;
                // Failures surface inline so the model can react to them.
                let rendered = serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|_| result.to_string());
                self.store.append_message(
                    &self.session_id,
                    &Message::user(format!("[tool {} result]\n{rendered}", call.name)),
                )?;
            }
        }
        Ok(transcript)
    }

    async fn dispatch(&self, name: &str, mut args: Value) -> Value {
        if self.registry.requires_approval(name) && !self.config.auto_approve {
            let approved = self
                .approver
                .as_ref()
                .map(|approve| approve(name, &args))
                .unwrap_or(false);
            if !approved {
                return json!({
                    "success": false,
                    "error": format!("tool '{name}' requires approval and the user declined"),
                });
            }
            if let Value::Object(map) = &mut args {
                map.insert("approved".to_string(), json!(true));
            }
        }

        let _slot = self.tool_gate.lock().await;
        self.registry.execute_tool(name, args).await.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::tools as tool_names;
    use crate::llm::{LlmError, LlmResponse, StopReason, ToolCallRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Provider that replays a fixed script of responses.
    struct ScriptedProvider {
        script: Vec<LlmResponse>,
        cursor: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: Vec<LlmResponse>) -> Self {
            Self {
                script,
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl crate::llm::LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.script
                .get(index)
                .cloned()
                .ok_or_else(|| LlmError::Provider("script exhausted".to_string()))
        }
    }

    fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            stop_reason: Some(StopReason::EndTurn),
            usage: None,
        }
    }

    fn tool_response(id: &str, name: &str, arguments: Value) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        }
    }

    fn build_agent(dir: &TempDir, script: Vec<LlmResponse>) -> Agent {
        let config = AgentConfig {
            workspace_root: dir.path().to_path_buf(),
            db_path: dir.path().join("sessions.db"),
            ..AgentConfig::default()
        };
        let registry = Arc::new(ToolRegistry::with_default_tools(&config));
        let store = SessionStore::open(&config.db_path, &config.table_base).unwrap();
        Agent::new(
            config,
            registry,
            store,
            Box::new(ScriptedProvider::new(script)),
        )
    }

    #[tokio::test]
    async fn turn_with_tool_call_writes_and_answers() {
        let dir = TempDir::new().unwrap();
        let mut agent = build_agent(
            &dir,
            vec![
                tool_response(
                    "call_1",
                    tool_names::WRITE_TO_FILE,
                    json!({"path": "hello.txt", "content": "hi there"}),
                ),
                text_response("I wrote the file."),
            ],
        );

        let reply = agent.run_turn("please write hello.txt").await.unwrap();
        assert_eq!(reply, "I wrote the file.");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
            "hi there"
        );

        let messages = agent.store().get_messages(agent.session_id(), None);
        // user message, tool result, assistant reply
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("write_to_file"));
    }

    #[tokio::test]
    async fn first_user_message_names_the_session() {
        let dir = TempDir::new().unwrap();
        let mut agent = build_agent(&dir, vec![text_response("ok")]);
        agent
            .run_turn("Hello build me a small CLI tool for parsing web server logs")
            .await
            .unwrap();
        let name = agent
            .store()
            .get_session_name(agent.session_id())
            .unwrap()
            .unwrap();
        assert_eq!(name, "Hello build me a small CLI tool for parsing web...");

        // the second turn must not rename
        let mut agent2 = build_agent(&dir, vec![text_response("ok")]);
        agent2.session_id = agent.session_id.clone();
        agent2.session_named = true;
        agent2.run_turn("something entirely different").await.unwrap();
        let unchanged = agent2
            .store()
            .get_session_name(agent2.session_id())
            .unwrap()
            .unwrap();
        assert_eq!(unchanged, name);
    }

    #[tokio::test]
    async fn duplicate_call_ids_execute_once() {
        let dir = TempDir::new().unwrap();
        let duplicated = LlmResponse {
            content: None,
            tool_calls: vec![
                ToolCallRequest {
                    id: "call_x".to_string(),
                    name: tool_names::WRITE_TO_FILE.to_string(),
                    arguments: json!({"path": "once.txt", "content": "a"}),
                },
                ToolCallRequest {
                    id: "call_x".to_string(),
                    name: tool_names::WRITE_TO_FILE.to_string(),
                    arguments: json!({"path": "twice.txt", "content": "b"}),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        };
        let mut agent = build_agent(&dir, vec![duplicated, text_response("done")]);
        agent.run_turn("write the files").await.unwrap();
        assert!(dir.path().join("once.txt").exists());
        assert!(!dir.path().join("twice.txt").exists());
    }

    #[tokio::test]
    async fn unapproved_command_is_declined_inline() {
        let dir = TempDir::new().unwrap();
        let mut agent = build_agent(
            &dir,
            vec![
                tool_response(
                    "call_1",
                    tool_names::EXECUTE_COMMAND,
                    json!({"command": "echo hi"}),
                ),
                text_response("could not run it"),
            ],
        );
        // no approver configured, auto_approve off: the call is declined
        agent.run_turn("run echo").await.unwrap();
        let messages = agent.store().get_messages(agent.session_id(), None);
        assert!(messages[1].content.contains("declined"));
    }

    #[tokio::test]
    async fn approver_callback_gates_commands() {
        let dir = TempDir::new().unwrap();
        let mut agent = build_agent(
            &dir,
            vec![
                tool_response(
                    "call_1",
                    tool_names::EXECUTE_COMMAND,
                    json!({"command": "echo approved-run"}),
                ),
                text_response("ran it"),
            ],
        )
        .with_approver(Box::new(|_, _| true));
        agent.run_turn("run echo").await.unwrap();
        let messages = agent.store().get_messages(agent.session_id(), None);
        assert!(messages[1].content.contains("approved-run"));
    }
}
