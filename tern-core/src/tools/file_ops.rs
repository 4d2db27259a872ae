//! File tools: read, write, patch, list.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools as tool_names};

use super::path_guard::PathGuard;
use super::traits::{Tool, optional_bool, optional_usize, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

/// Document formats that would need a dedicated extractor. Reported as
/// unsupported rather than decoded as text.
const BINARY_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx"];

/// Decode file bytes, trying UTF-8, then BOM-tagged UTF-16, then
/// Windows-1252 (a superset of Latin-1 in practice). The last rung cannot
/// fail, so reading never errors solely due to encoding.
fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8");
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let (text, _, had_errors) = encoding_rs::UTF_16LE.decode(&bytes[2..]);
        if !had_errors {
            return (text.into_owned(), "utf-16le");
        }
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (text, _, had_errors) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
        if !had_errors {
            return (text.into_owned(), "utf-16be");
        }
    }
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    (text.into_owned(), "windows-1252")
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub struct ReadFileTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl ReadFileTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::READ_FILE,
            "Read the contents of a file as text",
            ToolCategory::File,
            vec![ToolParameter::required(
                "path",
                ParamType::String,
                "Path to the file, relative to the workspace root",
            )],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw = required_str(&args, "path")?;
        let path = match self.guard.resolve(raw) {
            Ok(path) => path,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(_) => return Ok(ToolResult::failure(format!("file not found: {raw}"))),
        };
        if !metadata.is_file() {
            return Ok(ToolResult::failure(format!("not a file: {raw}")));
        }

        let extension = extension_of(&path);
        if BINARY_DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(ToolResult::ok(format!(
                "[{extension} format is not supported; convert the document to plain text first]"
            ))
            .with_metadata("extension", extension.clone())
            .with_metadata("size_bytes", metadata.len()));
        }

        let bytes = tokio::fs::read(&path).await?;
        let (text, encoding) = decode_text(&bytes);
        Ok(ToolResult::ok(text)
            .with_metadata("size_bytes", metadata.len())
            .with_metadata("extension", extension)
            .with_metadata("encoding", encoding))
    }
}

pub struct WriteFileTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl WriteFileTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::WRITE_TO_FILE,
            "Write text content to a file, creating it and any missing parent directories",
            ToolCategory::File,
            vec![
                ToolParameter::required("path", ParamType::String, "Destination file path"),
                ToolParameter::required("content", ParamType::String, "Text content to write"),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let path = match self.guard.resolve(raw) {
            Ok(path) => path,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };

        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(ToolResult::ok(format!(
            "{} {}",
            if existed { "overwrote" } else { "created" },
            raw
        ))
        .with_metadata("created", !existed)
        .with_metadata("size_bytes", content.len())
        .with_metadata("lines", content.lines().count()))
    }
}

pub struct ReplaceInFileTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl ReplaceInFileTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::REPLACE_IN_FILE,
            "Replace one exact occurrence of a text block in a file. Fails if the \
             block is absent or matches more than once.",
            ToolCategory::File,
            vec![
                ToolParameter::required("path", ParamType::String, "File to modify"),
                ToolParameter::required("search", ParamType::String, "Exact text to find"),
                ToolParameter::required("replace", ParamType::String, "Replacement text"),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw = required_str(&args, "path")?;
        let search = required_str(&args, "search")?;
        let replace = required_str(&args, "replace")?;
        let path = match self.guard.resolve(raw) {
            Ok(path) => path,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(ToolResult::failure(format!("file not found: {raw}"))),
        };
        let (original, _) = decode_text(&bytes);

        // Ambiguity is a hard refusal: replacing "the first match" silently
        // would corrupt files the model only partially understands.
        let occurrences = original.matches(search).count();
        if occurrences == 0 {
            return Ok(ToolResult::failure(format!(
                "search text not found in {raw}"
            )));
        }
        if occurrences > 1 {
            return Ok(ToolResult::failure(format!(
                "search text occurs {occurrences} times in {raw}; provide a longer unique block"
            )));
        }

        let updated = original.replacen(search, replace, 1);
        tokio::fs::write(&path, &updated).await?;
        Ok(ToolResult::ok(format!("replaced one occurrence in {raw}"))
            .with_metadata("size_bytes", updated.len()))
    }
}

pub struct ListFilesTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl ListFilesTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::LIST_FILES,
            "List the directories and files under a path",
            ToolCategory::File,
            vec![
                ToolParameter::required("path", ParamType::String, "Directory to list"),
                ToolParameter::optional(
                    "recursive",
                    ParamType::Boolean,
                    "Walk subdirectories",
                    Some(json!(false)),
                ),
                ToolParameter::optional(
                    "max_entries",
                    ParamType::Integer,
                    "Cap on total entries returned",
                    Some(json!(defaults::MAX_LIST_ENTRIES)),
                ),
            ],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw = required_str(&args, "path")?;
        let recursive = optional_bool(&args, "recursive", false);
        let max_entries = optional_usize(&args, "max_entries", defaults::MAX_LIST_ENTRIES).max(1);
        let path = match self.guard.resolve(raw) {
            Ok(path) => path,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        if !path.exists() {
            return Ok(ToolResult::failure(format!("path not found: {raw}")));
        }
        if !path.is_dir() {
            return Ok(ToolResult::failure(format!("not a directory: {raw}")));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut directories = Vec::new();
        let mut files = Vec::new();
        let mut truncated = false;

        for entry in WalkDir::new(&path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if directories.len() + files.len() >= max_entries {
                truncated = true;
                break;
            }
            let relative = entry
                .path()
                .strip_prefix(&path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if entry.file_type().is_dir() {
                directories.push(json!(relative));
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(json!({ "path": relative, "size_bytes": size }));
            }
        }

        let total = directories.len() + files.len();
        Ok(ToolResult::ok(json!({
            "directories": directories,
            "files": files,
        }))
        .with_metadata("entries", total)
        .with_metadata("truncated", truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard(dir: &TempDir) -> PathGuard {
        PathGuard::new(dir.path())
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let write = WriteFileTool::new(guard(&dir));
        let read = ReadFileTool::new(guard(&dir));

        let result = write
            .execute(args(&[
                ("path", json!("a.py")),
                ("content", json!("print(1)")),
            ]))
            .await
            .unwrap();
        assert!(result.success);

        let result = read
            .execute(args(&[("path", json!("a.py"))]))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.content.as_str().unwrap().contains("print(1)"));
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let read = ReadFileTool::new(guard(&dir));
        let result = read
            .execute(args(&[("path", json!("nope.txt"))]))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nope.txt"));
    }

    #[tokio::test]
    async fn read_pdf_reports_unsupported_without_failing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("doc.pdf"), b"%PDF-1.4 ...").unwrap();
        let read = ReadFileTool::new(guard(&dir));
        let result = read
            .execute(args(&[("path", json!("doc.pdf"))]))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.content.as_str().unwrap().contains("not supported"));
    }

    #[tokio::test]
    async fn read_latin1_bytes_decodes() {
        let dir = TempDir::new().unwrap();
        // "café" in Latin-1: 0xE9 is not valid UTF-8 on its own.
        std::fs::write(dir.path().join("l1.txt"), [0x63, 0x61, 0x66, 0xE9]).unwrap();
        let read = ReadFileTool::new(guard(&dir));
        let result = read
            .execute(args(&[("path", json!("l1.txt"))]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.content.as_str().unwrap(), "café");
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let write = WriteFileTool::new(guard(&dir));
        let result = write
            .execute(args(&[
                ("path", json!("deep/nested/file.txt")),
                ("content", json!("x")),
            ]))
            .await
            .unwrap();
        assert!(result.success);
        assert!(dir.path().join("deep/nested/file.txt").is_file());
    }

    #[tokio::test]
    async fn unsafe_path_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let write = WriteFileTool::new(guard(&dir));
        let result = write
            .execute(args(&[
                ("path", json!("../outside.txt")),
                ("content", json!("x")),
            ]))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("access denied"));
        assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn replace_requires_exactly_one_occurrence() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("code.rs");
        std::fs::write(&file, "let a = 1;\nlet b = 1;\n").unwrap();
        let patch = ReplaceInFileTool::new(guard(&dir));

        // two occurrences: refuse, file untouched
        let result = patch
            .execute(args(&[
                ("path", json!("code.rs")),
                ("search", json!("= 1;")),
                ("replace", json!("= 2;")),
            ]))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "let a = 1;\nlet b = 1;\n"
        );

        // absent: refuse
        let result = patch
            .execute(args(&[
                ("path", json!("code.rs")),
                ("search", json!("= 9;")),
                ("replace", json!("= 2;")),
            ]))
            .await
            .unwrap();
        assert!(!result.success);

        // unique: substitute once
        let result = patch
            .execute(args(&[
                ("path", json!("code.rs")),
                ("search", json!("let a = 1;")),
                ("replace", json!("let a = 2;")),
            ]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "let a = 2;\nlet b = 1;\n"
        );
    }

    #[tokio::test]
    async fn list_files_splits_dirs_and_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "hi").unwrap();

        let list = ListFilesTool::new(guard(&dir));
        let flat = list
            .execute(args(&[("path", json!("."))]))
            .await
            .unwrap();
        assert!(flat.success);
        assert_eq!(flat.content["directories"].as_array().unwrap().len(), 1);
        assert_eq!(flat.content["files"].as_array().unwrap().len(), 1);

        let deep = list
            .execute(args(&[("path", json!(".")), ("recursive", json!(true))]))
            .await
            .unwrap();
        assert_eq!(deep.content["files"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_files_distinguishes_missing_path_from_non_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plain.txt"), "hi").unwrap();
        let list = ListFilesTool::new(guard(&dir));

        let missing = list
            .execute(args(&[("path", json!("no_such_dir"))]))
            .await
            .unwrap();
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("path not found: no_such_dir"));

        let file = list
            .execute(args(&[("path", json!("plain.txt"))]))
            .await
            .unwrap();
        assert!(!file.success);
        assert_eq!(file.error.as_deref(), Some("not a directory: plain.txt"));
    }
}
