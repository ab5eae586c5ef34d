//! Tool registry: named callable operations with typed parameter schemas.
//!
//! Registration happens once at startup and the registry is read-only
//! afterwards, so lookups and listing take the read lock only.

use crate::error::{ToolError, ToolResult};
use crate::protocol::types::Tool;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Parameter value types a tool can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON-Schema type name.
    pub fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value is coercible to this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            // Whole-valued floats count as integers.
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A tool's registration-time metadata: name, description, and the ordered
/// parameter list the advertised JSON schema is derived from.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Derive the JSON-Schema object advertised in `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type.json_name()));
            if let Some(description) = &param.description {
                prop.insert("description".into(), json!(description));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(json!(param.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The wire representation of this tool.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema(),
        }
    }

    /// Validate arguments against the parameter list.
    ///
    /// Every offending field is collected so the error names all of them at
    /// once. Extra fields the spec does not declare are allowed.
    pub fn validate(&self, arguments: &Value) -> ToolResult<()> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(ToolError::InvalidArguments(vec![
                    "arguments must be an object".into(),
                ]));
            }
        };

        let mut offending = Vec::new();
        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        offending.push(format!("{} (missing)", param.name));
                    }
                }
                Some(value) if !param.param_type.accepts(value) => {
                    offending.push(format!(
                        "{} (expected {})",
                        param.name,
                        param.param_type.json_name()
                    ));
                }
                Some(_) => {}
            }
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(offending))
        }
    }
}

/// Handler for one registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Run the tool with validated arguments, producing a structured value.
    async fn execute(&self, arguments: Value) -> ToolResult<Value>;
}

#[derive(Default)]
struct ToolTable {
    entries: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

/// Registry of tools keyed by unique name, listed in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    table: RwLock<ToolTable>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken; duplicate names
    /// at startup are a fatal configuration mistake, not a runtime condition.
    pub fn register<T: ToolHandler + 'static>(&self, tool: T) -> ToolResult<()> {
        let name = tool.spec().name;
        let mut table = self.table.write();
        if table.index.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        debug!("Registering tool: {}", name);
        let slot = table.entries.len();
        table.entries.push(Arc::new(tool));
        table.index.insert(name, slot);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> ToolResult<Arc<dyn ToolHandler>> {
        let table = self.table.read();
        table
            .index
            .get(name)
            .map(|&slot| Arc::clone(&table.entries[slot]))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Advertised tool definitions, in registration order.
    pub fn list(&self) -> Vec<Tool> {
        self.table
            .read()
            .entries
            .iter()
            .map(|tool| tool.spec().to_tool())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool(&'static str);

    #[async_trait]
    impl ToolHandler for StubTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(self.0, "A stub tool")
                .param(ParamSpec::required("text", ParamType::String))
        }

        async fn execute(&self, _arguments: Value) -> ToolResult<Value> {
            Ok(json!("ok"))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry.register(StubTool("alpha")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("alpha").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(ToolError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ToolRegistry::new();
        registry.register(StubTool("alpha")).unwrap();

        let err = registry.register(StubTool("alpha")).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "alpha"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let registry = ToolRegistry::new();
        registry.register(StubTool("zeta")).unwrap();
        registry.register(StubTool("alpha")).unwrap();
        registry.register(StubTool("mid")).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_input_schema_shape() {
        let spec = ToolSpec::new("demo", "Demo tool")
            .param(ParamSpec::required("text", ParamType::String).describe("Input text"))
            .param(ParamSpec::optional("count", ParamType::Integer));

        let schema = spec.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["properties"]["text"]["description"], "Input text");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_validation_collects_all_offending_fields() {
        let spec = ToolSpec::new("demo", "Demo tool")
            .param(ParamSpec::required("text", ParamType::String))
            .param(ParamSpec::required("count", ParamType::Integer));

        let err = spec.validate(&json!({"count": "three"})).unwrap_err();
        let ToolError::InvalidArguments(fields) = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(fields.len(), 2);
        assert!(fields[0].contains("text"));
        assert!(fields[1].contains("count"));
    }

    #[test]
    fn test_validation_accepts_coercible_types() {
        let spec = ToolSpec::new("demo", "Demo tool")
            .param(ParamSpec::required("count", ParamType::Integer))
            .param(ParamSpec::optional("ratio", ParamType::Number));

        // A whole-valued float coerces to integer; missing optional is fine.
        assert!(spec.validate(&json!({"count": 3.0})).is_ok());
        assert!(spec.validate(&json!({"count": 3, "ratio": 0.5})).is_ok());
        assert!(spec.validate(&json!({"count": 3, "extra": true})).is_ok());
    }

    #[test]
    fn test_validation_rejects_non_object_arguments() {
        let spec = ToolSpec::new("demo", "Demo tool");
        assert!(spec.validate(&json!("nope")).is_err());
        assert!(spec.validate(&Value::Null).is_ok());
    }
}
