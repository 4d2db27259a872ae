//! Anthropic Messages API implementation of [`LlmProvider`]. Kept thin: the
//! wire protocol is the provider's business, not ours.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::session::Role;

use super::provider::{
    LlmError, LlmProvider, LlmRequest, LlmResponse, StopReason, TokenUsage, ToolCallRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(&self, request: &LlmRequest) -> Value {
        // System-role history folds into the system prompt; the wire format
        // only accepts user/assistant turns in the message list.
        let mut system = request.system_prompt.clone().unwrap_or_default();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&message.content);
                }
                role => {
                    messages.push(json!({
                        "role": role.as_str(),
                        "content": message.content,
                    }));
                }
            }
        }

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "input_schema": tool.parameters,
                        })
                    })
                    .collect(),
            );
        }
        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(&request);
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(detail),
                429 => LlmError::RateLimit(detail),
                400 => LlmError::InvalidRequest(detail),
                _ => LlmError::Provider(format!("{status}: {detail}")),
            });
        }

        let payload: Value = response.json().await?;
        Ok(parse_response(&payload))
    }
}

fn parse_response(payload: &Value) -> LlmResponse {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(blocks) = payload["content"].as_array() {
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCallRequest {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        arguments: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }
    }

    let stop_reason = payload["stop_reason"].as_str().map(|reason| match reason {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        _ => StopReason::Other,
    });
    let usage = payload.get("usage").map(|usage| TokenUsage {
        input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
    });

    LlmResponse {
        content: (!content.is_empty()).then_some(content),
        tool_calls,
        stop_reason,
        usage,
    }
}
