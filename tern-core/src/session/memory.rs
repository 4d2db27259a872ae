//! Legacy JSON memory blobs.
//!
//! Older releases stored conversation history as a JSON column whose shape
//! drifted over time: messages directly under the root, under a nested
//! history object, or spread across per-turn run records. Each shape is a
//! variant with its own normalizer, tried in that fixed order.

use serde::Deserialize;
use serde_json::Value;

use super::{Message, Role};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MemoryBlob {
    Flat {
        messages: Vec<RawMessage>,
    },
    Nested {
        history: History,
    },
    PerTurn {
        runs: Vec<Run>,
    },
}

#[derive(Debug, Deserialize)]
pub struct History {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// A message as found in the blob: role may be absent, content may be plain
/// text or a list of content blocks.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub role: Option<String>,
    pub content: Option<Value>,
    #[serde(alias = "timestamp")]
    pub created_at: Option<String>,
    pub id: Option<String>,
}

impl MemoryBlob {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn into_messages(self) -> Vec<Message> {
        let raw_messages = match self {
            MemoryBlob::Flat { messages } => messages,
            MemoryBlob::Nested { history } => history.messages,
            MemoryBlob::PerTurn { runs } => {
                runs.into_iter().flat_map(|run| run.messages).collect()
            }
        };
        raw_messages.into_iter().map(RawMessage::normalize).collect()
    }
}

impl RawMessage {
    fn normalize(self) -> Message {
        Message {
            role: self.role.as_deref().map(Role::parse).unwrap_or(Role::Assistant),
            content: self.content.as_ref().map(flatten_content).unwrap_or_default(),
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Flatten a message body to plain text. Lists of content blocks concatenate
/// their text fields; anything unrecognized falls back to its JSON rendering.
fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(text) => Some(text.clone()),
                Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| content.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_shape_parses() {
        let blob = MemoryBlob::parse(
            r#"{"messages": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]}"#,
        )
        .unwrap();
        let messages = blob.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn nested_history_shape_parses() {
        let blob = MemoryBlob::parse(
            r#"{"history": {"messages": [{"role": "user", "content": "question"}]}}"#,
        )
        .unwrap();
        let messages = blob.into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "question");
    }

    #[test]
    fn per_turn_runs_concatenate_in_order() {
        let blob = MemoryBlob::parse(
            r#"{"runs": [
                {"messages": [{"role": "user", "content": "first"}]},
                {"messages": [{"role": "assistant", "content": "second"}]}
            ]}"#,
        )
        .unwrap();
        let messages = blob.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
    }

    #[test]
    fn content_blocks_flatten_to_concatenated_text() {
        let raw = json!({
            "messages": [{
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "part one, "},
                    {"type": "tool_use", "id": "x"},
                    {"type": "text", "text": "part two"}
                ]
            }]
        });
        let blob = MemoryBlob::parse(&raw.to_string()).unwrap();
        let messages = blob.into_messages();
        assert_eq!(messages[0].content, "part one, part two");
    }

    #[test]
    fn unknown_role_defaults_to_assistant() {
        let blob = MemoryBlob::parse(
            r#"{"messages": [{"role": "narrator", "content": "scene"}, {"content": "no role"}]}"#,
        )
        .unwrap();
        let messages = blob.into_messages();
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn garbage_is_not_a_blob() {
        assert!(MemoryBlob::parse("not json").is_none());
        assert!(MemoryBlob::parse(r#"{"unrelated": 1}"#).is_none());
    }
}
