//! Tool/function calling types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool discovered from a provider connection
///
/// `provider_tag` names the connection the tool came from, so callers can ask
/// whether a given capability group survived selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name (function name)
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "parameterSchema", default = "empty_object_schema")]
    pub parameter_schema: Value,
    /// Originating provider
    #[serde(rename = "providerTag")]
    pub provider_tag: String,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    /// Create a new tool descriptor with an empty object schema
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider_tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: empty_object_schema(),
            provider_tag: provider_tag.into(),
        }
    }

    /// Set the parameter schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = schema;
        self
    }
}

/// Tool call from the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Input arguments for the tool
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Arguments as a JSON object, if they are one
    pub fn arguments(&self) -> Option<serde_json::Map<String, Value>> {
        self.input.as_object().cloned()
    }
}

/// Tool result to send back to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is responding to
    #[serde(rename = "callId")]
    pub call_id: String,
    /// The result content
    pub content: String,
    /// Whether this result represents an error
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

/// Tool choice option for requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Let the model decide whether to use tools
    #[default]
    Auto,
    /// Don't use tools
    None,
    /// Force tool use
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_creation() {
        let tool = ToolDescriptor::new("get_flow", "Fetch a flow by id", "openops")
            .with_schema(json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }));

        assert_eq!(tool.name, "get_flow");
        assert_eq!(tool.provider_tag, "openops");
        assert_eq!(tool.parameter_schema["required"][0], "id");
    }

    #[test]
    fn test_descriptor_default_schema() {
        let tool: ToolDescriptor = serde_json::from_value(json!({
            "name": "ping",
            "description": "",
            "providerTag": "tables"
        }))
        .unwrap();
        assert_eq!(tool.parameter_schema["type"], "object");
    }

    #[test]
    fn test_tool_call_arguments() {
        let call = ToolCall::new("call_1", "get_flow", json!({ "id": "f1" }));
        let args = call.arguments().unwrap();
        assert_eq!(args["id"], "f1");

        let scalar = ToolCall::new("call_2", "get_flow", json!("nope"));
        assert!(scalar.arguments().is_none());
    }

    #[test]
    fn test_tool_result() {
        let success = ToolResult::success("call_123", "3 flows");
        assert!(!success.is_error);

        let error = ToolResult::error("call_456", "flow not found");
        assert!(error.is_error);
    }

    #[test]
    fn test_tool_choice_serialization() {
        assert_eq!(serde_json::to_string(&ToolChoice::None).unwrap(), "\"none\"");
        assert_eq!(ToolChoice::default(), ToolChoice::Auto);
    }
}
