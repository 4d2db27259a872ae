//! The capability surface the model can call into.

pub mod code_definitions;
pub mod command;
pub mod file_ops;
pub mod file_search;
pub mod interaction;
pub mod path_guard;
pub mod registry;
pub mod search;
pub mod traits;
pub mod types;
pub mod workspace_search;

pub use path_guard::PathGuard;
pub use registry::ToolRegistry;
pub use traits::Tool;
pub use types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};
