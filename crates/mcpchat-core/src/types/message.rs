//! Chat message types
//!
//! A message is either plain text or a list of typed parts. Tool calls and
//! tool results live in parts so the turn loop can replay them to the model,
//! while the display transcript keeps only the text.

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolResult};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender
    pub role: MessageRole,
    /// The content of the message (string or structured parts)
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a message with structured content parts
    pub fn with_parts(role: MessageRole, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    /// Assistant message carrying optional text followed by tool calls
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: &[ToolCall]) -> Self {
        let text = text.into();
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
        parts.extend(calls.iter().cloned().map(ContentPart::from));
        Self::with_parts(MessageRole::Assistant, parts)
    }

    /// Tool message carrying the results of one step's tool calls
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::with_parts(
            MessageRole::Tool,
            results.into_iter().map(ContentPart::from).collect(),
        )
    }

    /// Get the text content if this is a simple text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    /// Concatenated text of every text part
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Tool calls requested in this message
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match &self.content {
            MessageContent::Text(_) => vec![],
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall { id, name, input } => {
                        Some(ToolCall::new(id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => {
                parts.iter().any(|p| matches!(p, ContentPart::ToolCall { .. }))
            }
        }
    }

    /// Copy of this message with tool-call parts removed
    ///
    /// Returns `None` for tool messages and for messages left with no text.
    pub fn without_tool_calls(&self) -> Option<ChatMessage> {
        if self.role == MessageRole::Tool {
            return None;
        }
        match &self.content {
            MessageContent::Text(_) => Some(self.clone()),
            MessageContent::Parts(parts) => {
                let kept: Vec<ContentPart> = parts
                    .iter()
                    .filter(|p| matches!(p, ContentPart::Text { .. }))
                    .cloned()
                    .collect();
                let has_text = kept
                    .iter()
                    .any(|p| matches!(p, ContentPart::Text { text } if !text.is_empty()));
                has_text.then(|| ChatMessage::with_parts(self.role, kept))
            }
        }
    }
}

/// Derive the display transcript from a tool-bearing one
///
/// Tool messages are dropped and tool-call parts stripped, so the result never
/// contains a `tool` role message.
pub fn display_view(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages.iter().filter_map(ChatMessage::without_tool_calls).collect()
}

/// Message content - either simple text or structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Structured content with multiple parts
    Parts(Vec<ContentPart>),
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// Content part of a structured message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Text content
    Text {
        text: String,
    },
    /// Tool call (assistant invoking a tool)
    ToolCall {
        #[serde(rename = "toolCallId")]
        id: String,
        #[serde(rename = "toolName")]
        name: String,
        #[serde(rename = "args")]
        input: serde_json::Value,
    },
    /// Tool result (output returned to the model)
    ToolResult {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "result")]
        content: String,
        #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentPart {
    /// Create a text content part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

impl From<ToolCall> for ContentPart {
    fn from(call: ToolCall) -> Self {
        ContentPart::ToolCall {
            id: call.id,
            name: call.name,
            input: call.input,
        }
    }
}

impl From<ToolResult> for ContentPart {
    fn from(result: ToolResult) -> Self {
        ContentPart::ToolResult {
            call_id: result.call_id,
            content: result.content,
            is_error: result.is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_creation() {
        let sys = ChatMessage::system("You are helpful");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.text(), Some("You are helpful"));

        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, MessageRole::User);

        let asst = ChatMessage::assistant("Hi there!");
        assert_eq!(asst.role, MessageRole::Assistant);
    }

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
    }

    #[test]
    fn test_tool_call_part_serialization() {
        let part = ContentPart::from(ToolCall::new("c1", "list_flows", json!({"limit": 3})));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool-call");
        assert_eq!(json["toolCallId"], "c1");
        assert_eq!(json["toolName"], "list_flows");

        let back: ContentPart = serde_json::from_value(json).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn test_tool_calls_extracted() {
        let calls = vec![
            ToolCall::new("a", "one", json!({})),
            ToolCall::new("b", "two", json!({"x": 1})),
        ];
        let msg = ChatMessage::assistant_with_tool_calls("checking", &calls);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.text_content(), "checking");

        let names: Vec<_> = msg.tool_calls().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn test_without_tool_calls_keeps_text() {
        let msg = ChatMessage::assistant_with_tool_calls(
            "let me look",
            &[ToolCall::new("a", "lookup", json!({}))],
        );
        let cleaned = msg.without_tool_calls().unwrap();
        assert!(!cleaned.has_tool_calls());
        assert_eq!(cleaned.text_content(), "let me look");
    }

    #[test]
    fn test_without_tool_calls_drops_empty_and_tool_messages() {
        let only_calls =
            ChatMessage::assistant_with_tool_calls("", &[ToolCall::new("a", "lookup", json!({}))]);
        assert!(only_calls.without_tool_calls().is_none());

        let results = ChatMessage::tool_results(vec![ToolResult::success("a", "ok")]);
        assert!(results.without_tool_calls().is_none());
    }

    #[test]
    fn test_display_view_never_ends_with_tool_message() {
        let transcript = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_tool_calls("", &[ToolCall::new("a", "t", json!({}))]),
            ChatMessage::tool_results(vec![ToolResult::success("a", "ok")]),
            ChatMessage::assistant("done"),
        ];
        let view = display_view(&transcript);
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|m| m.role != MessageRole::Tool && !m.has_tool_calls()));
        assert_eq!(view[1].text_content(), "done");
    }
}
