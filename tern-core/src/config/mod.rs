//! Agent configuration: defaults, optional `tern.toml`, then environment.

pub mod constants;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use constants::{defaults, env_vars};

/// Runtime configuration for the agent and its tools.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub db_path: PathBuf,
    pub table_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub auto_approve: bool,
    pub workspace_root: PathBuf,
    pub max_tool_iterations: usize,
}

/// Shape of an optional `tern.toml` in the workspace root. Every field is
/// optional; absent fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    model: Option<String>,
    db_path: Option<PathBuf>,
    table_base: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    auto_approve: Option<bool>,
    max_tool_iterations: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let workspace_root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            api_key: None,
            model: defaults::MODEL.to_string(),
            db_path: default_db_path(&workspace_root),
            table_base: defaults::TABLE_BASE.to_string(),
            temperature: defaults::TEMPERATURE,
            max_tokens: defaults::MAX_TOKENS,
            system_prompt: None,
            auto_approve: false,
            workspace_root,
            max_tool_iterations: defaults::MAX_TOOL_ITERATIONS,
        }
    }
}

impl AgentConfig {
    /// Load configuration for the current workspace. Precedence, lowest
    /// first: built-in defaults, `tern.toml`, environment variables.
    /// A `.env` file in the workspace is honored before the environment is
    /// read.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        let file_path = config.workspace_root.join("tern.toml");
        if file_path.is_file() {
            let raw = std::fs::read_to_string(&file_path)
                .with_context(|| format!("failed to read {}", file_path.display()))?;
            let file: ConfigFile = toml::from_str(&raw)
                .with_context(|| format!("invalid config in {}", file_path.display()))?;
            config.apply_file(file);
        }
        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(db_path) = file.db_path {
            self.db_path = if db_path.is_absolute() {
                db_path
            } else {
                self.workspace_root.join(db_path)
            };
        }
        if let Some(table_base) = file.table_base {
            self.table_base = table_base;
        }
        if let Some(temperature) = file.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if file.system_prompt.is_some() {
            self.system_prompt = file.system_prompt;
        }
        if let Some(auto_approve) = file.auto_approve {
            self.auto_approve = auto_approve;
        }
        if let Some(iterations) = file.max_tool_iterations {
            self.max_tool_iterations = iterations;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var(env_vars::API_KEY) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(model) = env::var(env_vars::MODEL) {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        if let Ok(path) = env::var(env_vars::DB_PATH) {
            if !path.trim().is_empty() {
                self.db_path = PathBuf::from(path);
            }
        }
        if let Ok(base) = env::var(env_vars::TABLE_BASE) {
            if !base.trim().is_empty() {
                self.table_base = base;
            }
        }
        if let Ok(flag) = env::var(env_vars::AUTO_APPROVE) {
            self.auto_approve = matches!(flag.trim(), "1" | "true" | "yes");
        }
    }
}

fn default_db_path(workspace_root: &Path) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(defaults::CONFIG_DIR).join(defaults::DB_FILE),
        None => workspace_root.join(defaults::DB_FILE),
    }
}
