//! Descriptor and result model shared by every tool.
//!
//! A tool declares its parameters once in a [`ToolDescriptor`]; the registry
//! validates and normalizes arguments against that declaration before the
//! tool body ever runs. Results travel in the uniform [`ToolResult`]
//! envelope, which is rendered to the user and folded back into the
//! conversation but never persisted as-is.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Closed set of parameter types a tool may declare. Each variant owns a
/// total coercion from a loosely typed JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Float,
}

impl ParamType {
    /// JSON-schema type name, as exported to the model.
    pub fn schema_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Float => "number",
        }
    }

    /// Coerce `value` into this type. Returns the normalized value or a
    /// message describing why the value does not fit.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match self {
            ParamType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err("expected a string".to_string()),
            },
            ParamType::Integer => match value {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(json!(i))
                    } else if let Some(f) = n.as_f64() {
                        if f.fract() == 0.0 {
                            Ok(json!(f as i64))
                        } else {
                            Err("expected an integer".to_string())
                        }
                    } else {
                        Err("expected an integer".to_string())
                    }
                }
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| json!(i))
                    .map_err(|_| "expected an integer".to_string()),
                _ => Err("expected an integer".to_string()),
            },
            ParamType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Ok(json!(true)),
                    "false" | "no" | "0" => Ok(json!(false)),
                    _ => Err("expected a boolean".to_string()),
                },
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(json!(false)),
                    Some(1) => Ok(json!(true)),
                    _ => Err("expected a boolean".to_string()),
                },
                _ => Err("expected a boolean".to_string()),
            },
            ParamType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(|f| json!(f))
                    .ok_or_else(|| "expected a number".to_string()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|f| json!(f))
                    .map_err(|_| "expected a number".to_string()),
                _ => Err("expected a number".to_string()),
            },
        }
    }
}

/// One declared parameter of a tool. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: &str,
        param_type: ParamType,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
            default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    File,
    Search,
    Command,
    System,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::File => "file",
            ToolCategory::Search => "search",
            ToolCategory::Command => "command",
            ToolCategory::System => "system",
        }
    }
}

/// Static declaration of a tool: registry key, category, parameter list,
/// and whether invocations need user approval before running.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Vec<ToolParameter>,
    pub requires_approval: bool,
}

impl ToolDescriptor {
    pub fn new(
        name: &str,
        description: &str,
        category: ToolCategory,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            parameters,
            requires_approval: false,
        }
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Pre-flight validation. Checks required parameters, coerces present
    /// values to their declared types, and fills defaults for absent
    /// optional parameters. Returns the normalized argument map; never
    /// executes the tool.
    pub fn validate_args(&self, args: &Value) -> Result<Map<String, Value>, String> {
        let supplied = match args {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(format!("arguments for '{}' must be an object", self.name)),
        };

        let mut normalized = supplied.clone();
        for param in &self.parameters {
            match supplied.get(&param.name) {
                Some(Value::Null) | None => {
                    if param.required {
                        return Err(format!(
                            "missing required parameter '{}' for tool '{}'",
                            param.name, self.name
                        ));
                    }
                    if let Some(default) = &param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    }
                }
                Some(value) => {
                    let coerced = param.param_type.coerce(value).map_err(|reason| {
                        format!(
                            "invalid value for parameter '{}' of tool '{}': {} (type {})",
                            param.name,
                            self.name,
                            reason,
                            param.param_type.schema_name()
                        )
                    })?;
                    normalized.insert(param.name.clone(), coerced);
                }
            }
        }
        Ok(normalized)
    }
}

/// Uniform result envelope returned by every tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    pub fn ok(content: impl Into<Value>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            content: Value::String(String::new()),
            error: Some(error),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({ "success": self.success, "error": "result serialization failed" })
        })
    }
}
