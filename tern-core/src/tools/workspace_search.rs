//! Heuristic workspace relevance search.
//!
//! Ranks files by query-term overlap against their name and path, with a
//! small per-extension multiplier and a penalty for very large files. This
//! is term matching, not embedding search; zero overlap is an empty success.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools as tool_names};

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_str, optional_usize, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

const DEFAULT_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "rb", "sh", "md",
    "toml", "yaml", "yml", "json", "txt", "sql", "html", "css",
];

const LARGE_FILE_BYTES: u64 = 1024 * 1024;

pub struct WorkspaceSearchTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl WorkspaceSearchTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::SEARCH_WORKSPACE_FILES,
            "Rank workspace files by relevance to a query (term overlap on \
             name and path; heuristic, not semantic embeddings)",
            ToolCategory::Search,
            vec![
                ToolParameter::required("query", ParamType::String, "What to look for"),
                ToolParameter::optional(
                    "path",
                    ParamType::String,
                    "Directory to search",
                    Some(json!(".")),
                ),
                ToolParameter::optional(
                    "extensions",
                    ParamType::String,
                    "Comma-separated extension filter overriding the default set",
                    None,
                ),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    "Cap on returned files",
                    Some(json!(defaults::MAX_RELEVANCE_RESULTS)),
                ),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for WorkspaceSearchTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let query = required_str(&args, "query")?;
        let raw_path = optional_str(&args, "path").unwrap_or(".");
        let max_results =
            optional_usize(&args, "max_results", defaults::MAX_RELEVANCE_RESULTS).max(1);
        let extensions: Vec<String> = match optional_str(&args, "extensions") {
            Some(list) => list
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };

        let root = match self.guard.resolve(raw_path) {
            Ok(root) => root,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        if !root.is_dir() {
            return Ok(ToolResult::failure(format!("not a directory: {raw_path}")));
        }

        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(String, f64)> = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|entry| {
                let extension = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_lowercase)?;
                if !extensions.contains(&extension) {
                    return None;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .to_string();
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let score = relevance(&terms, &relative, &extension, size);
                (score > 0.0).then_some((relative, score))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(max_results);

        let total = scored.len();
        let results: Vec<Value> = scored
            .into_iter()
            .map(|(path, score)| json!({ "path": path, "score": score }))
            .collect();
        Ok(ToolResult::ok(Value::Array(results))
            .with_metadata("matches", total)
            .with_metadata("heuristic", "term-overlap"))
    }
}

fn relevance(terms: &[String], relative: &str, extension: &str, size: u64) -> f64 {
    let lower_path = relative.to_lowercase();
    let name = Path::new(&lower_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut score = 0.0;
    for term in terms {
        if stem == *term {
            score += 25.0;
        } else if name.contains(term) {
            score += 10.0;
        } else if lower_path.contains(term) {
            score += 3.0;
        }
    }
    if score == 0.0 {
        return 0.0;
    }

    let multiplier = match extension {
        "rs" | "py" | "js" | "jsx" | "ts" | "tsx" | "go" | "java" => 1.5,
        "md" | "toml" | "yaml" | "yml" | "json" => 1.0,
        _ => 0.8,
    };
    score *= multiplier;
    if size > LARGE_FILE_BYTES {
        score *= 0.5;
    }
    score
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target" || name == "node_modules")
}
