//! Structural definition listing backed by tree-sitter grammars, with a
//! line-pattern fallback for the dynamic languages when a parse fails.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use tree_sitter::{Language, Node, Parser};
use walkdir::WalkDir;

use crate::config::constants::tools as tool_names;

use super::path_guard::PathGuard;
use super::traits::{Tool, required_str};
use super::types::{ParamType, ToolCategory, ToolDescriptor, ToolParameter, ToolResult};

const MAX_FILES_PER_SCAN: usize = 100;

fn language_for_extension(extension: &str) -> Option<Language> {
    match extension {
        "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
        "py" => Some(tree_sitter_python::LANGUAGE.into()),
        "js" | "jsx" | "mjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "ts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

/// Node kinds that carry a `name` field worth reporting, across all the
/// bundled grammars. Kinds a grammar does not define simply never match.
const DEFINITION_KINDS: &[&str] = &[
    "function_item",
    "struct_item",
    "enum_item",
    "trait_item",
    "mod_item",
    "function_definition",
    "class_definition",
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "method_definition",
    "method_declaration",
    "interface_declaration",
    "enum_declaration",
    "type_alias_declaration",
    "type_spec",
];

#[derive(Debug)]
struct Definition {
    name: String,
    kind: String,
    line: usize,
}

fn collect_definitions(node: Node<'_>, source: &[u8], out: &mut Vec<Definition>) {
    if DEFINITION_KINDS.contains(&node.kind()) {
        if let Some(name_node) = node.child_by_field_name("name") {
            if let Ok(name) = name_node.utf8_text(source) {
                out.push(Definition {
                    name: name.to_string(),
                    kind: node.kind().to_string(),
                    line: node.start_position().row + 1,
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_definitions(child, source, out);
    }
}

fn parse_with_grammar(source: &str, language: Language) -> Option<Vec<Definition>> {
    let mut parser = Parser::new();
    parser.set_language(&language).ok()?;
    let tree = parser.parse(source, None)?;
    let mut definitions = Vec::new();
    collect_definitions(tree.root_node(), source.as_bytes(), &mut definitions);
    Some(definitions)
}

/// Line-oriented fallback for Python and JS/TS sources when no grammar
/// applies or the parse fails.
fn parse_with_patterns(source: &str, extension: &str) -> Vec<Definition> {
    let patterns: Vec<(&str, Regex)> = match extension {
        "py" => vec![
            ("function", pattern(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)")),
            ("class", pattern(r"^\s*class\s+([A-Za-z_]\w*)")),
        ],
        "js" | "jsx" | "mjs" | "ts" | "tsx" => vec![
            (
                "function",
                pattern(
                    r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
                ),
            ),
            (
                "class",
                pattern(r"^\s*(?:export\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)"),
            ),
        ],
        _ => return Vec::new(),
    };

    let mut definitions = Vec::new();
    for (index, line) in source.lines().enumerate() {
        for (kind, regex) in &patterns {
            if let Some(captures) = regex.captures(line) {
                if let Some(name) = captures.get(1) {
                    definitions.push(Definition {
                        name: name.as_str().to_string(),
                        kind: (*kind).to_string(),
                        line: index + 1,
                    });
                }
            }
        }
    }
    definitions
}

// Patterns are fixed literals; a failure to compile is a programming error
// surfaced at first use in tests.
fn pattern(raw: &str) -> Regex {
    Regex::new(raw).unwrap_or_else(|_| Regex::new(r"$^").unwrap_or_else(|_| unreachable!()))
}

fn definitions_for_file(path: &Path) -> Vec<Definition> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(_) => return Vec::new(),
    };
    if let Some(language) = language_for_extension(&extension) {
        if let Some(definitions) = parse_with_grammar(&source, language) {
            return definitions;
        }
    }
    parse_with_patterns(&source, &extension)
}

pub struct ListCodeDefinitionsTool {
    guard: PathGuard,
    descriptor: ToolDescriptor,
}

impl ListCodeDefinitionsTool {
    pub fn new(guard: PathGuard) -> Self {
        let descriptor = ToolDescriptor::new(
            tool_names::LIST_CODE_DEFINITION_NAMES,
            "List top-level function, class, and type definitions in a source \
             file or directory, with line numbers",
            ToolCategory::File,
            vec![ToolParameter::required(
                "path",
                ParamType::String,
                "Source file or directory to inspect",
            )],
        );
        Self { guard, descriptor }
    }
}

#[async_trait]
impl Tool for ListCodeDefinitionsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult> {
        let raw = required_str(&args, "path")?;
        let path = match self.guard.resolve(raw) {
            Ok(path) => path,
            Err(denied) => return Ok(ToolResult::failure(denied)),
        };
        if !path.exists() {
            return Ok(ToolResult::failure(format!("path not found: {raw}")));
        }

        let files: Vec<_> = if path.is_file() {
            vec![path.clone()]
        } else {
            WalkDir::new(&path)
                .into_iter()
                .filter_entry(|e| !is_skipped_dir(e))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|ext| {
                            matches!(
                                ext,
                                "rs" | "py" | "js" | "jsx" | "mjs" | "ts" | "tsx" | "go" | "java"
                            )
                        })
                })
                .take(MAX_FILES_PER_SCAN)
                .collect()
        };

        let mut by_file = Map::new();
        for file in &files {
            let definitions = definitions_for_file(file);
            let relative = file
                .strip_prefix(&path)
                .unwrap_or(file)
                .to_string_lossy()
                .to_string();
            let key = if relative.is_empty() {
                raw.to_string()
            } else {
                relative
            };
            by_file.insert(
                key,
                Value::Array(
                    definitions
                        .iter()
                        .map(|d| json!({ "name": d.name, "kind": d.kind, "line": d.line }))
                        .collect(),
                ),
            );
        }

        let total: usize = by_file
            .values()
            .filter_map(|v| v.as_array())
            .map(|a| a.len())
            .sum();
        Ok(ToolResult::ok(Value::Object(by_file))
            .with_metadata("files_scanned", files.len())
            .with_metadata("definitions", total))
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target" || name == "node_modules")
}
