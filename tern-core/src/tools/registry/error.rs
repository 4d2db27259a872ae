//! Structured classification of tool failures.

use thiserror::Error;

use crate::tools::types::ToolResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorType {
    InvalidParameters,
    ToolNotFound,
    PermissionDenied,
    ResourceNotFound,
    Timeout,
    ExecutionError,
}

impl ToolErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorType::InvalidParameters => "invalid_parameters",
            ToolErrorType::ToolNotFound => "tool_not_found",
            ToolErrorType::PermissionDenied => "permission_denied",
            ToolErrorType::ResourceNotFound => "resource_not_found",
            ToolErrorType::Timeout => "timeout",
            ToolErrorType::ExecutionError => "execution_error",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("tool '{tool_name}' failed: {message}")]
pub struct ToolExecutionError {
    pub tool_name: String,
    pub error_type: ToolErrorType,
    pub message: String,
}

impl ToolExecutionError {
    pub fn new(tool_name: &str, error_type: ToolErrorType, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            error_type,
            message: message.into(),
        }
    }

    /// Render as the failed envelope the registry hands back; nothing
    /// propagates past that boundary as a raw error.
    pub fn to_result(&self) -> ToolResult {
        ToolResult::failure(self.to_string())
            .with_metadata("error_type", self.error_type.as_str())
    }
}

/// Best-effort bucketing of an arbitrary failure message.
pub fn classify_error(message: &str) -> ToolErrorType {
    let lower = message.to_lowercase();
    if lower.contains("access denied") || lower.contains("permission") {
        ToolErrorType::PermissionDenied
    } else if lower.contains("not found") || lower.contains("no such") {
        ToolErrorType::ResourceNotFound
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ToolErrorType::Timeout
    } else if lower.contains("parameter") || lower.contains("invalid") {
        ToolErrorType::InvalidParameters
    } else {
        ToolErrorType::ExecutionError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_buckets_common_messages() {
        assert_eq!(
            classify_error("access denied: path escapes the workspace"),
            ToolErrorType::PermissionDenied
        );
        assert_eq!(
            classify_error("file not found: a.txt"),
            ToolErrorType::ResourceNotFound
        );
        assert_eq!(
            classify_error("command timed out after 5s"),
            ToolErrorType::Timeout
        );
        assert_eq!(
            classify_error("something exploded"),
            ToolErrorType::ExecutionError
        );
    }

    #[test]
    fn error_renders_tool_and_message() {
        let error = ToolExecutionError::new(
            "read_file",
            ToolErrorType::ResourceNotFound,
            "file not found: a.txt",
        );
        let result = error.to_result();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("read_file"));
        assert_eq!(result.metadata["error_type"], "resource_not_found");
    }
}
