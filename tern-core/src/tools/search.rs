//! Regex content search over a directory tree.
//!
//! Delegates to ripgrep's JSON output when the binary is on the host and no
//! context lines were requested; otherwise walks and matches in-process.
//! Both strategies produce the same record shape.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools as tool_names};

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_str, optional_usize, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

pub struct SearchFilesTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl SearchFilesTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::SEARCH_FILES,
            "Search file contents under a directory with a regular expression",
            ToolCategory::Search,
            vec![
                ToolParameter::required("regex", ParamType::String, "Pattern to search for"),
                ToolParameter::optional(
                    "path",
                    ParamType::String,
                    "Directory to search",
                    Some(json!(".")),
                ),
                ToolParameter::optional(
                    "file_pattern",
                    ParamType::String,
                    "Filename glob filter, e.g. *.rs",
                    None,
                ),
                ToolParameter::optional(
                    "context_lines",
                    ParamType::Integer,
                    "Lines of context before and after each match",
                    Some(json!(0)),
                ),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    "Cap on returned match records",
                    Some(json!(defaults::MAX_SEARCH_RESULTS)),
                ),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw_pattern = required_str(&args, "regex")?;
        let raw_path = optional_str(&args, "path").unwrap_or(".");
        let file_pattern = optional_str(&args, "file_pattern").map(str::to_string);
        let context_lines = optional_usize(&args, "context_lines", 0);
        let max_results = optional_usize(&args, "max_results", defaults::MAX_SEARCH_RESULTS).max(1);

        let root = match self.guard.resolve(raw_path) {
            Ok(root) => root,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        if !root.is_dir() {
            return Ok(ToolResult::failure(format!("not a directory: {raw_path}")));
        }
        // Validate the pattern up front so both strategies report the same
        // descriptive failure.
        let regex = match Regex::new(raw_pattern) {
            Ok(regex) => regex,
            Err(err) => {
                return Ok(ToolResult::failure(format!(
                    "invalid regex '{raw_pattern}': {err}"
                )));
            }
        };
        let glob_filter = match file_pattern.as_deref().map(glob::Pattern::new) {
            Some(Ok(pattern)) => Some(pattern),
            Some(Err(err)) => {
                return Ok(ToolResult::failure(format!("invalid file pattern: {err}")));
            }
            None => None,
        };

        let (matches, strategy) = if context_lines == 0 {
            match ripgrep_search(&root, raw_pattern, file_pattern.as_deref(), max_results).await {
                Some(matches) => (matches, "ripgrep"),
                None => (
                    walk_search(&root, &regex, glob_filter.as_ref(), context_lines, max_results),
                    "internal",
                ),
            }
        } else {
            (
                walk_search(&root, &regex, glob_filter.as_ref(), context_lines, max_results),
                "internal",
            )
        };

        let truncated = matches.len() >= max_results;
        let count = matches.len();
        Ok(ToolResult::ok(Value::Array(matches))
            .with_metadata("matches", count)
            .with_metadata("truncated", truncated)
            .with_metadata("strategy", strategy))
    }
}

fn match_record(
    file: &str,
    line_number: usize,
    line: &str,
    matched: &str,
    before: Vec<String>,
    after: Vec<String>,
) -> Value {
    json!({
        "file": file,
        "line_number": line_number,
        "line": line,
        "matched": matched,
        "before": before,
        "after": after,
    })
}

/// Run `rg --json` and map its match events into our record shape. Returns
/// `None` when the binary is unavailable or exits abnormally, so the caller
/// can fall back to the in-process walk.
async fn ripgrep_search(
    root: &Path,
    pattern: &str,
    file_pattern: Option<&str>,
    max_results: usize,
) -> Option<Vec<Value>> {
    let mut command = tokio::process::Command::new("rg");
    command
        .arg("--json")
        .arg("--max-count")
        .arg(max_results.to_string())
        .arg("-e")
        .arg(pattern);
    if let Some(glob) = file_pattern {
        command.arg("--glob").arg(glob);
    }
    // An explicit path keeps rg off stdin when it is not a terminal.
    command
        .arg(".")
        .current_dir(root)
        .stdin(std::process::Stdio::null());

    let output = match command.output().await {
        Ok(output) => output,
        Err(err) => {
            debug!("ripgrep unavailable, using internal search: {err}");
            return None;
        }
    };
    // rg exits 1 on "no matches", which is still a valid run.
    if !output.status.success() && output.status.code() != Some(1) {
        return None;
    }

    let mut matches = Vec::new();
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) => continue,
        };
        if event["type"] != "match" {
            continue;
        }
        let data = &event["data"];
        let file = data["path"]["text"]
            .as_str()
            .unwrap_or("")
            .trim_start_matches("./");
        let line_number = data["line_number"].as_u64().unwrap_or(0) as usize;
        let text = data["lines"]["text"].as_str().unwrap_or("").trim_end_matches('\n');
        let matched = data["submatches"][0]["match"]["text"].as_str().unwrap_or("");
        matches.push(match_record(
            file,
            line_number,
            text,
            matched,
            Vec::new(),
            Vec::new(),
        ));
        if matches.len() >= max_results {
            break;
        }
    }
    Some(matches)
}

fn walk_search(
    root: &Path,
    regex: &Regex,
    glob_filter: Option<&glob::Pattern>,
    context_lines: usize,
    max_results: usize,
) -> Vec<Value> {
    let mut matches = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if matches.len() >= max_results {
            break;
        }
        let file_name = entry.file_name().to_string_lossy();
        if let Some(filter) = glob_filter {
            if !filter.matches(&file_name) {
                continue;
            }
        }
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(_) => continue,
        };
        let lines: Vec<&str> = content.lines().collect();
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        for (index, line) in lines.iter().enumerate() {
            if matches.len() >= max_results {
                break;
            }
            let Some(found) = regex.find(line) else {
                continue;
            };
            let before = lines[index.saturating_sub(context_lines)..index]
                .iter()
                .map(|l| l.to_string())
                .collect();
            let after = lines[(index + 1).min(lines.len())
                ..(index + 1 + context_lines).min(lines.len())]
                .iter()
                .map(|l| l.to_string())
                .collect();
            matches.push(match_record(
                &relative,
                index + 1,
                line,
                found.as_str(),
                before,
                after,
            ));
        }
    }
    matches
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
    async fn finds_matches_in_one_file_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.txt"), "nothing\nFINDME here\n").unwrap();
        std::fs::write(dir.path().join("y.txt"), "nothing here\n").unwrap();

        let tool = SearchFilesTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[("regex", json!("FINDME")), ("path", json!("."))]))
            .await
            .unwrap();
        assert!(result.success);
        let records = result.content.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["file"], "x.txt");
        assert_eq!(records[0]["line_number"], 2);
        assert_eq!(records[0]["matched"], "FINDME");
    }

    #[tokio::test]
    async fn invalid_regex_is_a_descriptive_failure() {
        let dir = TempDir::new().unwrap();
        let tool = SearchFilesTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[("regex", json!("[unclosed"))]))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid regex"));
    }

    #[tokio::test]
    async fn context_lines_are_returned_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ctx.txt"), "one\ntwo\nTARGET\nfour\nfive\n").unwrap();
        let tool = SearchFilesTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[
                ("regex", json!("TARGET")),
                ("context_lines", json!(2)),
            ]))
            .await
            .unwrap();
        let records = result.content.as_array().unwrap();
        assert_eq!(records[0]["before"], json!(["one", "two"]));
        assert_eq!(records[0]["after"], json!(["four", "five"]));
    }

    #[tokio::test]
    async fn glob_filter_limits_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "needle\n").unwrap();
        let tool = SearchFilesTool::new(PathGuard::new(dir.path()));
        let result = tool
            .execute(args(&[
                ("regex", json!("needle")),
                ("file_pattern", json!("*.rs")),
                ("context_lines", json!(1)),
            ]))
            .await
            .unwrap();
        let records = result.content.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["file"], "a.rs");
    }
}
