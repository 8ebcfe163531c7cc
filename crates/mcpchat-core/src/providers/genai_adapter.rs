//! Adapter between mcpchat types and genai types
//!
//! Conversion in both directions, plus client construction. API keys come
//! from the model configuration first and then from the provider's well-known
//! environment variable.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, ChatRole as GenaiRole,
    ChatStreamEvent, ContentPart as GenaiPart, JsonSpec, MessageContent as GenaiContent,
    StreamEnd, Tool as GenaiTool, ToolCall as GenaiToolCall, ToolResponse as GenaiToolResponse,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::types::{
    ChatMessage, ContentPart, FinishReason, MessageContent, MessageRole, StreamChunk, ToolCall,
    ToolChoice, ToolDescriptor, Usage,
};

use super::error::ProviderError;
use super::traits::{ObjectSchema, ProviderModelConfig, StreamChatOptions};

// ============================================================================
// Message Conversion: mcpchat -> genai
// ============================================================================

/// Convert a MessageRole to a genai ChatRole
pub fn to_genai_role(role: MessageRole) -> GenaiRole {
    match role {
        MessageRole::System => GenaiRole::System,
        MessageRole::User => GenaiRole::User,
        MessageRole::Assistant => GenaiRole::Assistant,
        MessageRole::Tool => GenaiRole::Tool,
    }
}

fn to_genai_tool_call(id: &str, name: &str, input: &Value) -> GenaiToolCall {
    GenaiToolCall {
        call_id: id.to_string(),
        fn_name: name.to_string(),
        fn_arguments: input.clone(),
        thought_signatures: None,
    }
}

/// Convert one ChatMessage into genai messages
///
/// A tool message fans out to one genai message per result, since genai
/// carries a single tool response per message.
pub fn to_genai_message(msg: ChatMessage) -> Vec<GenaiMessage> {
    let parts = match msg.content {
        MessageContent::Text(text) => {
            return vec![match msg.role {
                MessageRole::System => GenaiMessage::system(text),
                MessageRole::User => GenaiMessage::user(text),
                MessageRole::Assistant => GenaiMessage::assistant(text),
                MessageRole::Tool => GenaiMessage::user(text),
            }];
        }
        MessageContent::Parts(parts) => parts,
    };

    match msg.role {
        MessageRole::Tool => parts
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult { call_id, content, .. } => {
                    Some(GenaiMessage::from(GenaiToolResponse { call_id, content }))
                }
                _ => None,
            })
            .collect(),
        MessageRole::Assistant => {
            let text: String = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            let mut content = GenaiContent::from(text.as_str());
            for part in &parts {
                if let ContentPart::ToolCall { id, name, input } = part {
                    content.push(GenaiPart::ToolCall(to_genai_tool_call(id, name, input)));
                }
            }
            vec![GenaiMessage::assistant(content)]
        }
        role => {
            let text: String = parts
                .into_iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            vec![match role {
                MessageRole::System => GenaiMessage::system(text),
                _ => GenaiMessage::user(text),
            }]
        }
    }
}

/// Convert a vector of messages to genai messages
pub fn to_genai_messages(messages: Vec<ChatMessage>) -> Vec<GenaiMessage> {
    messages.into_iter().flat_map(to_genai_message).collect()
}

// ============================================================================
// Tool Conversion: mcpchat -> genai
// ============================================================================

/// Convert a ToolDescriptor to a genai Tool
pub fn to_genai_tool(tool: &ToolDescriptor) -> GenaiTool {
    GenaiTool::new(&tool.name)
        .with_description(&tool.description)
        .with_schema(tool.parameter_schema.clone())
}

/// Tools to attach to a request
///
/// `ToolChoice::None` attaches nothing, so the model cannot call anything.
pub fn to_genai_tools(options: &StreamChatOptions) -> Vec<GenaiTool> {
    if options.tool_choice == Some(ToolChoice::None) {
        return vec![];
    }
    options
        .tools
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(to_genai_tool)
        .collect()
}

// ============================================================================
// Options Conversion: mcpchat -> genai
// ============================================================================

/// Convert StreamChatOptions to genai ChatOptions
pub fn to_genai_options(options: &StreamChatOptions) -> GenaiOptions {
    let mut genai_opts = GenaiOptions::default();

    if let Some(temp) = options.temperature {
        genai_opts = genai_opts.with_temperature(temp as f64);
    }

    if let Some(max_tokens) = options.max_tokens {
        genai_opts = genai_opts.with_max_tokens(max_tokens);
    }

    // Tool calls and usage arrive on the End event
    genai_opts
        .with_capture_tool_calls(true)
        .with_capture_usage(true)
}

/// Options for a schema-constrained object request
pub fn to_genai_object_options(schema: &ObjectSchema) -> GenaiOptions {
    GenaiOptions::default()
        .with_response_format(JsonSpec::new(schema.name.clone(), schema.schema.clone()))
}

// ============================================================================
// Response Conversion: genai -> mcpchat
// ============================================================================

/// Convert a genai ToolCall to a ToolCall
///
/// Some adapters deliver arguments as a JSON string; those are parsed.
pub fn from_genai_tool_call(tc: &GenaiToolCall) -> ToolCall {
    let input = match &tc.fn_arguments {
        Value::String(s) if s.is_empty() => Value::Object(Default::default()),
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };

    ToolCall {
        id: tc.call_id.clone(),
        name: tc.fn_name.clone(),
        input,
    }
}

fn from_genai_end(end: StreamEnd) -> Vec<Result<StreamChunk, ProviderError>> {
    let mut chunks = Vec::new();

    let tool_calls: Vec<ToolCall> = end
        .captured_tool_calls()
        .map(|calls| calls.into_iter().map(|tc| from_genai_tool_call(tc)).collect())
        .unwrap_or_default();

    let reason = if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    };
    chunks.extend(tool_calls.into_iter().map(|tc| Ok(StreamChunk::tool_call(tc))));

    let usage = end
        .captured_usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens.map(|v| v.max(0) as u32),
            completion_tokens: u.completion_tokens.map(|v| v.max(0) as u32),
        })
        .unwrap_or_default();

    chunks.push(Ok(StreamChunk::finish(reason, usage)));
    chunks
}

/// Convert a genai stream event to zero or more StreamChunks
///
/// The End event expands into every captured tool call followed by a single
/// `Finish` chunk.
pub fn from_genai_event(event: ChatStreamEvent) -> Vec<Result<StreamChunk, ProviderError>> {
    match event {
        ChatStreamEvent::Chunk(chunk) => vec![Ok(StreamChunk::Text {
            text: chunk.content,
        })],
        ChatStreamEvent::ToolCallChunk(chunk) => vec![Ok(StreamChunk::ToolCallDelta {
            id: chunk.tool_call.call_id,
            name: Some(chunk.tool_call.fn_name),
            input_delta: Some(chunk.tool_call.fn_arguments.to_string()),
        })],
        ChatStreamEvent::End(end) => from_genai_end(end),
        _ => vec![],
    }
}

// ============================================================================
// Provider Resolution
// ============================================================================

/// Provider configuration for routing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier (e.g., "openai", "azure", "openrouter")
    pub provider: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, model: &ProviderModelConfig) -> Self {
        Self {
            provider: provider.into(),
            api_key: model.api_key.clone(),
            api_base: model.api_base.clone(),
        }
    }
}

/// Mapping from provider names to environment variable names
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("openai", vec!["OPENAI_API_KEY"]);
    m.insert("anthropic", vec!["ANTHROPIC_API_KEY"]);
    m.insert("gemini", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("google", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("groq", vec!["GROQ_API_KEY"]);
    m.insert("xai", vec!["XAI_API_KEY"]);
    m.insert("deepseek", vec!["DEEPSEEK_API_KEY"]);
    m.insert("cohere", vec!["COHERE_API_KEY"]);
    m.insert("mistral", vec!["MISTRAL_API_KEY"]);
    m.insert("azure", vec!["AZURE_API_KEY", "AZURE_OPENAI_API_KEY"]);
    m.insert("openrouter", vec!["OPENROUTER_API_KEY"]);
    m.insert("ollama", vec![]); // Ollama doesn't need an API key
    m
});

/// Environment variables consulted for a provider's API key
pub fn provider_env_vars(provider: &str) -> &'static [&'static str] {
    ENV_VAR_MAP
        .get(provider.to_lowercase().as_str())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn env_api_key(provider: &str) -> Option<String> {
    provider_env_vars(provider)
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
}

fn adapter_kind_provider(adapter: AdapterKind) -> &'static str {
    match adapter {
        AdapterKind::OpenAI => "openai",
        AdapterKind::Anthropic => "anthropic",
        AdapterKind::Gemini => "gemini",
        AdapterKind::Ollama => "ollama",
        AdapterKind::Groq => "groq",
        AdapterKind::Xai => "xai",
        AdapterKind::DeepSeek => "deepseek",
        AdapterKind::Cohere => "cohere",
        _ => "",
    }
}

// ============================================================================
// Client Creation with Custom Auth
// ============================================================================

type AuthFuture = Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>>;

/// Create a genai Client with custom auth and endpoint resolution
pub fn create_client(config: &ProviderConfig) -> Client {
    let auth_provider = config.provider.clone();
    let auth_explicit_key = config.api_key.clone();

    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |model_iden: ModelIden| -> AuthFuture {
            let provider = auth_provider.clone();
            let explicit_key = auth_explicit_key.clone();
            let adapter_kind = model_iden.adapter_kind;

            Box::pin(async move {
                if let Some(key) = explicit_key {
                    return Ok(Some(AuthData::from_single(key)));
                }

                let lookup = if provider.is_empty() {
                    adapter_kind_provider(adapter_kind).to_string()
                } else {
                    provider
                };

                // None lets genai handle keyless providers like Ollama
                Ok(env_api_key(&lookup).map(AuthData::from_single))
            })
        },
    );

    let target_provider = config.provider.clone();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { ref model, .. } = target;

            let endpoint = match (target_provider.as_str(), target_api_base.as_ref()) {
                (_, Some(base)) => Endpoint::from_owned(base.clone()),
                ("openrouter", None) => Endpoint::from_static("https://openrouter.ai/api/v1/"),
                ("mistral", None) => Endpoint::from_static("https://api.mistral.ai/v1/"),
                // Native genai providers resolve normally
                _ => return Ok(target),
            };

            let adapter_kind = if is_genai_native(&target_provider) {
                model.adapter_kind
            } else {
                AdapterKind::OpenAI
            };

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: ModelIden::new(adapter_kind, model.model_name.clone()),
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}

/// Check if a provider is natively supported by genai
pub fn is_genai_native(provider: &str) -> bool {
    matches!(
        provider.to_lowercase().as_str(),
        "openai"
            | "anthropic"
            | "gemini"
            | "ollama"
            | "groq"
            | "xai"
            | "deepseek"
            | "cohere"
            | "fireworks"
            | "together"
    )
}

/// Check if a provider can be handled by genai (native or via OpenAI-compat)
pub fn is_genai_supported(provider: &str) -> bool {
    is_genai_native(provider)
        || matches!(
            provider.to_lowercase().as_str(),
            "azure" | "openrouter" | "mistral"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolResult;
    use serde_json::json;

    #[test]
    fn test_role_conversion() {
        assert!(matches!(to_genai_role(MessageRole::System), GenaiRole::System));
        assert!(matches!(to_genai_role(MessageRole::User), GenaiRole::User));
        assert!(matches!(to_genai_role(MessageRole::Tool), GenaiRole::Tool));
    }

    #[test]
    fn test_message_conversion() {
        let genai_msgs = to_genai_message(ChatMessage::user("Hello, world!"));
        assert_eq!(genai_msgs.len(), 1);
        assert!(matches!(genai_msgs[0].role, GenaiRole::User));
    }

    #[test]
    fn test_tool_results_fan_out() {
        let msg = ChatMessage::tool_results(vec![
            ToolResult::success("a", "one"),
            ToolResult::error("b", "two"),
        ]);
        let genai_msgs = to_genai_message(msg);
        assert_eq!(genai_msgs.len(), 2);
        assert!(genai_msgs.iter().all(|m| matches!(m.role, GenaiRole::Tool)));
    }

    #[test]
    fn test_assistant_tool_calls_kept() {
        let msg = ChatMessage::assistant_with_tool_calls(
            "looking",
            &[ToolCall::new("a", "list_flows", json!({}))],
        );
        let genai_msgs = to_genai_message(msg);
        assert_eq!(genai_msgs.len(), 1);
        assert!(matches!(genai_msgs[0].role, GenaiRole::Assistant));
    }

    #[test]
    fn test_tool_choice_none_drops_tools() {
        let tools = vec![ToolDescriptor::new("list_flows", "List flows", "openops")];
        let auto = StreamChatOptions::new().with_tools(tools.clone());
        assert_eq!(to_genai_tools(&auto).len(), 1);
        assert_eq!(to_genai_tools(&auto)[0].name, "list_flows");

        let none = StreamChatOptions::new()
            .with_tools(tools)
            .with_tool_choice(ToolChoice::None);
        assert!(to_genai_tools(&none).is_empty());
    }

    #[test]
    fn test_tool_call_string_arguments_parsed() {
        let tc = GenaiToolCall {
            call_id: "c1".to_string(),
            fn_name: "get_flow".to_string(),
            fn_arguments: Value::String(r#"{"id":"f1"}"#.to_string()),
            thought_signatures: None,
        };
        let call = from_genai_tool_call(&tc);
        assert_eq!(call.input, json!({"id": "f1"}));
    }

    #[test]
    fn test_end_event_without_tool_calls_is_stop() {
        let chunks = from_genai_event(ChatStreamEvent::End(StreamEnd::default()));
        assert_eq!(chunks.len(), 1);
        assert!(matches!(
            chunks[0],
            Ok(StreamChunk::Finish { reason: FinishReason::Stop, .. })
        ));
    }

    #[test]
    fn test_provider_detection() {
        assert!(is_genai_native("openai"));
        assert!(is_genai_native("anthropic"));
        assert!(!is_genai_native("azure"));

        assert!(is_genai_supported("azure"));
        assert!(is_genai_supported("openrouter"));
        assert!(!is_genai_supported("mock"));
    }

    #[test]
    fn test_provider_env_vars() {
        assert_eq!(provider_env_vars("OpenAI"), &["OPENAI_API_KEY"]);
        assert!(provider_env_vars("ollama").is_empty());
        assert!(provider_env_vars("unknown").is_empty());
    }
}
