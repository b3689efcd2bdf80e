//! Tool trait and definition types.

use async_trait::async_trait;
use serde_json::Value;

use crate::ToolError;

/// Definition of a tool advertised to callers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }
}

/// Trait for implementing tools.
///
/// Each tool has a name, a definition (including a JSON schema for its
/// parameters), and an async execute method taking the opaque argument
/// payload from the request envelope.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get the tool definition including parameter schema.
    fn definition(&self) -> ToolDefinition;

    /// Validate the arguments before execution.
    ///
    /// Default implementation does no validation.
    fn validate(&self, _arguments: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError>;
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ToolError::wrong_type(name, "string")),
        None => Err(ToolError::missing_param(name)),
    }
}

/// Fetch an optional string argument.
pub(crate) fn optional_str<'a>(
    arguments: &'a Value,
    name: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(ToolError::wrong_type(name, "string")),
    }
}
