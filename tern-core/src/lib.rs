//! Core library for tern, a terminal coding agent.
//!
//! The interesting parts live in three places: [`tools`] (the capability
//! registry the model can call into, including the command sandbox),
//! [`session`] (schema-tolerant SQLite persistence of conversations), and
//! [`agent`] (the turn loop wiring them to an [`llm::LlmProvider`]).

pub mod agent;
pub mod config;
pub mod llm;
pub mod session;
pub mod tools;

pub use agent::Agent;
pub use config::AgentConfig;
pub use session::SessionStore;
pub use tools::registry::ToolRegistry;
