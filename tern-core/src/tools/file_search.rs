//! Fuzzy filename search over the workspace tree.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use serde_json::{Map, Value, json};
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools as tool_names};

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_str, optional_usize, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

pub struct FileSearchTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl FileSearchTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::FILE_SEARCH,
            "Find files whose path fuzzily matches a query",
            ToolCategory::Search,
            vec![
                ToolParameter::required("query", ParamType::String, "Filename fragment to match"),
                ToolParameter::optional(
                    "path",
                    ParamType::String,
                    "Directory to search",
                    Some(json!(".")),
                ),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    "Cap on returned paths",
                    Some(json!(defaults::MAX_FUZZY_RESULTS)),
                ),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for FileSearchTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let query = required_str(&args, "query")?;
        let raw_path = optional_str(&args, "path").unwrap_or(".");
        let max_results = optional_usize(&args, "max_results", defaults::MAX_FUZZY_RESULTS).max(1);

        let root = match self.guard.resolve(raw_path) {
            Ok(root) => root,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        if !root.is_dir() {
            return Ok(ToolResult::failure(format!("not a directory: {raw_path}")));
        }

        let candidates = collect_paths(&root);
        let mut scored = fuzzy_scores(query, &candidates);
        if scored.is_empty() {
            scored = simple_scores(query, &candidates);
        }
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(max_results);

        let total = scored.len();
        let results: Vec<Value> = scored
            .into_iter()
            .map(|(path, score)| json!({ "path": path, "score": score }))
            .collect();
        Ok(ToolResult::ok(Value::Array(results)).with_metadata("matches", total))
    }
}

fn collect_paths(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap_or(e.path())
                .to_string_lossy()
                .to_string()
        })
        .collect()
}

fn fuzzy_scores(query: &str, candidates: &[String]) -> Vec<(String, u32)> {
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
    let mut buffer = Vec::new();
    candidates
        .iter()
        .filter_map(|candidate| {
            let haystack = Utf32Str::new(candidate, &mut buffer);
            pattern
                .score(haystack, &mut matcher)
                .map(|score| (candidate.clone(), score))
        })
        .collect()
}

/// Exact/prefix/substring fallback for queries the fuzzy pattern rejects.
fn simple_scores(query: &str, candidates: &[String]) -> Vec<(String, u32)> {
    let needle = query.to_lowercase();
    candidates
        .iter()
        .filter_map(|candidate| {
            let name = Path::new(candidate)
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let score = if name == needle {
                100
            } else if name.starts_with(&needle) {
                80
            } else if name.contains(&needle) {
                60
            } else if candidate.to_lowercase().contains(&needle) {
                40
            } else {
                return None;
            };
            Some((candidate.clone(), score))
        })
        .collect()
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target" || name == "node_modules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn ranks_closer_names_first() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.rs"), "").unwrap();
        std::fs::write(dir.path().join("confusing_raster.txt"), "").unwrap();
        std::fs::write(dir.path().join("unrelated.md"), "").unwrap();

        let tool = FileSearchTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[("query", json!("config"))]))
            .await
            .unwrap();
        let records = result.content.as_array().unwrap();
        assert!(!records.is_empty());
        assert_eq!(records[0]["path"], "config.rs");
    }

    #[tokio::test]
    async fn no_match_is_success_with_empty_list() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let tool = FileSearchTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[("query", json!("zzzzqqqq"))]))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.content.as_array().unwrap().is_empty());
    }
}
