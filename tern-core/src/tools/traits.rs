//! The contract every tool implements.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::types::{ToolDescriptor, ToolResult};

/// A named capability the model may invoke. Arguments arrive already
/// validated and normalized against the tool's descriptor; implementations
/// return `Err` only for internal faults, which the registry converts into a
/// failed [`ToolResult`] at its boundary.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// Read a string argument that validation has already guaranteed present.
pub(crate) fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("argument '{key}' is missing after validation"))
}

pub(crate) fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn optional_bool(args: &Map<String, Value>, key: &str, fallback: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(fallback)
}

pub(crate) fn optional_usize(args: &Map<String, Value>, key: &str, fallback: usize) -> usize {
    args.get(key)
        .and_then(Value::as_i64)
        .map(|i| i.max(0) as usize)
        .unwrap_or(fallback)
}
