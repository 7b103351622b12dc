//! Explicit tool parameter schemas.
//!
//! Schemas are plain data supplied at the registration call site; they
//! serialize to the JSON-schema-like object the protocol expects. All
//! declared parameters are required.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Coarse JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.to_string(),
            kind,
            description: if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            },
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// JSON-schema-like object; zero-parameter tools produce `{}`.
    pub fn to_json(&self) -> Value {
        if self.parameters.is_empty() {
            return json!({});
        }
        let mut properties = serde_json::Map::new();
        for spec in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".to_string(), json!(spec.kind.as_str()));
            if let Some(desc) = &spec.description {
                prop.insert("description".to_string(), json!(desc));
            }
            properties.insert(spec.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Registered identity of a tool, as offered to the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, parameters: ParameterSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Protocol-level function-tool declaration.
    pub fn schema_json(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_parameter_schema_is_empty_object() {
        assert_eq!(ParameterSchema::new().to_json(), json!({}));
    }

    #[test]
    fn all_declared_parameters_are_required() {
        let schema = ParameterSchema::new()
            .param("location", ParamKind::String, "City name")
            .param("celsius", ParamKind::Boolean, "");
        let value = schema.to_json();

        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["location"]["type"], "string");
        assert_eq!(value["properties"]["location"]["description"], "City name");
        assert_eq!(value["properties"]["celsius"]["type"], "boolean");
        assert!(value["properties"]["celsius"].get("description").is_none());
        assert_eq!(value["required"], json!(["location", "celsius"]));
    }

    #[test]
    fn descriptor_declares_a_function_tool() {
        let descriptor = ToolDescriptor::new(
            "get_weather",
            "Gets the weather for a location.",
            ParameterSchema::new().param("location", ParamKind::String, ""),
        );
        let value = descriptor.schema_json();
        assert_eq!(value["type"], "function");
        assert_eq!(value["name"], "get_weather");
        assert_eq!(value["parameters"]["required"], json!(["location"]));
    }
}
