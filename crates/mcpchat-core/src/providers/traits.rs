//! Provider trait definition

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

use crate::types::{
    ChatMessage, ModelConfig, ModelSettings, ProviderMetadata, StreamChunk, ToolChoice,
    ToolDescriptor,
};

use super::error::ProviderResult;

/// Model configuration for provider requests
#[derive(Debug, Clone)]
pub struct ProviderModelConfig {
    /// Model identifier as used by the provider's API
    pub model: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderModelConfig {
    /// Create a new model config
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            api_base: None,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }
}

impl From<&ModelConfig> for ProviderModelConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
        }
    }
}

/// Options for streaming chat requests
#[derive(Debug, Clone, Default)]
pub struct StreamChatOptions {
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Tools available for the model to use
    pub tools: Option<Vec<ToolDescriptor>>,
    /// Tool choice behavior
    pub tool_choice: Option<ToolChoice>,
}

impl StreamChatOptions {
    /// Create new options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Options seeded from model settings
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            ..Default::default()
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set tool choice
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }
}

/// JSON Schema the model's answer must conform to
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    /// Schema name, sent to providers that require one
    pub name: String,
    pub schema: Value,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Type alias for the streaming response
pub type StreamResponse = Pin<Box<dyn Stream<Item = ProviderResult<StreamChunk>> + Send>>;

/// Provider trait for LLM implementations
///
/// A stream from `stream_chat` yields text and tool-call chunks for one step
/// and ends with a single `StreamChunk::Finish`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Get the default API base URL
    fn default_api_base(&self) -> &str;

    /// Get provider metadata
    fn metadata(&self) -> ProviderMetadata;

    /// Stream one generation step
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        model: ProviderModelConfig,
        options: StreamChatOptions,
    ) -> ProviderResult<StreamResponse>;

    /// Generate a JSON object conforming to `schema`
    async fn generate_object(
        &self,
        messages: Vec<ChatMessage>,
        model: ProviderModelConfig,
        schema: ObjectSchema,
    ) -> ProviderResult<Value>;

    /// Run one step and collect its text
    ///
    /// Tool calls in the step are ignored; a stream error fails the call.
    async fn generate_text(
        &self,
        messages: Vec<ChatMessage>,
        model: ProviderModelConfig,
        options: StreamChatOptions,
    ) -> ProviderResult<String> {
        let mut stream = self.stream_chat(messages, model, options).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            if let StreamChunk::Text { text: delta } = chunk? {
                text.push_str(&delta);
            }
        }
        Ok(text)
    }

    /// Get the API base URL, using custom if provided
    fn get_api_base(&self, model: &ProviderModelConfig) -> String {
        model.api_base.clone().unwrap_or_else(|| self.default_api_base().to_string())
    }
}
