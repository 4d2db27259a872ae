//! Shared defaults and tool name constants.

pub mod tools {
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_TO_FILE: &str = "write_to_file";
    pub const REPLACE_IN_FILE: &str = "replace_in_file";
    pub const LIST_FILES: &str = "list_files";
    pub const LIST_CODE_DEFINITION_NAMES: &str = "list_code_definition_names";
    pub const SEARCH_FILES: &str = "search_files";
    pub const FILE_SEARCH: &str = "file_search";
    pub const SEARCH_WORKSPACE_FILES: &str = "search_workspace_files";
    pub const EXECUTE_COMMAND: &str = "execute_command";
    pub const ASK_FOLLOWUP_QUESTION: &str = "ask_followup_question";
    pub const ATTEMPT_COMPLETION: &str = "attempt_completion";
    pub const SYSTEM_STATUS: &str = "system_status";
}

pub mod defaults {
    pub const MODEL: &str = "claude-sonnet-4-20250514";
    pub const TABLE_BASE: &str = "tern_agent";
    pub const DB_FILE: &str = "sessions.db";
    pub const CONFIG_DIR: &str = ".tern";
    pub const MAX_TOKENS: u32 = 4096;
    pub const TEMPERATURE: f32 = 0.7;
    pub const MAX_TOOL_ITERATIONS: usize = 12;
    pub const COMMAND_TIMEOUT_SECS: u64 = 30;
    pub const MAX_COMMAND_LENGTH: usize = 1000;
    pub const MAX_SEARCH_RESULTS: usize = 100;
    pub const MAX_LIST_ENTRIES: usize = 500;
    pub const MAX_FUZZY_RESULTS: usize = 25;
    pub const MAX_RELEVANCE_RESULTS: usize = 20;
}

pub mod env_vars {
    pub const API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const MODEL: &str = "TERN_MODEL";
    pub const DB_PATH: &str = "TERN_DB_PATH";
    pub const TABLE_BASE: &str = "TERN_TABLE_BASE";
    pub const AUTO_APPROVE: &str = "TERN_AUTO_APPROVE";
}
