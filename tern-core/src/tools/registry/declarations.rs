//! Machine-readable tool schemas, exported to the model so it knows what it
//! may call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::tools::types::ToolDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionDeclaration {
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &descriptor.parameters {
            let mut schema = Map::new();
            schema.insert(
                "type".to_string(),
                json!(param.param_type.schema_name()),
            );
            schema.insert("description".to_string(), json!(param.description));
            if let Some(default) = &param.default {
                schema.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(schema));
            if param.required {
                required.push(json!(param.name));
            }
        }
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::{ParamType, ToolCategory, ToolParameter};

    #[test]
    fn declaration_carries_required_and_defaults() {
        let descriptor = ToolDescriptor::new(
            "demo",
            "demo tool",
            ToolCategory::Search,
            vec![
                ToolParameter::required("query", ParamType::String, "the query"),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    "cap",
                    Some(json!(10)),
                ),
            ],
        );
        let declaration = FunctionDeclaration::from_descriptor(&descriptor);
        assert_eq!(declaration.name, "demo");
        assert_eq!(declaration.parameters["required"], json!(["query"]));
        assert_eq!(
            declaration.parameters["properties"]["max_results"]["default"],
            json!(10)
        );
        assert_eq!(
            declaration.parameters["properties"]["query"]["type"],
            json!("string")
        );
    }
}
