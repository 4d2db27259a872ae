//! Model provider abstraction and the bundled Anthropic implementation.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::{
    LlmError, LlmProvider, LlmRequest, LlmResponse, StopReason, TokenUsage, ToolCallRequest,
};
