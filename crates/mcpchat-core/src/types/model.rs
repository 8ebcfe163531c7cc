//! Model configuration types

use serde::{Deserialize, Serialize};

/// Which model a turn talks to, and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name (openai, anthropic, gemini, ollama, mock, ...)
    pub provider: String,
    /// Model identifier as used by the provider's API
    pub model: String,
    /// API key (falls back to the provider's environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Sampling settings passed through on every generation call
    #[serde(default)]
    pub settings: ModelSettings,
}

impl ModelConfig {
    /// Create a new model configuration
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            api_base: None,
            settings: ModelSettings::default(),
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

    /// Set the sampling settings
    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new("openai", "gpt-4o")
    }
}

/// Sampling settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Model capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Whether the model supports tool/function calling
    #[serde(default)]
    pub tool_calling: bool,
    /// Whether the model supports streaming
    #[serde(default)]
    pub streaming: bool,
    /// Whether the model can return schema-constrained objects
    #[serde(default)]
    pub structured_output: bool,
}

impl ModelCapabilities {
    /// Create capabilities with all features enabled
    pub fn full() -> Self {
        Self {
            tool_calling: true,
            streaming: true,
            structured_output: true,
        }
    }
}

/// Provider metadata (static information about a provider)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider identifier
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Default API base URL
    pub default_api_base: String,
    /// Whether API key is required
    pub requires_api_key: bool,
    /// Supported models with their context lengths
    pub default_models: Vec<DefaultModel>,
}

/// Default model information for a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultModel {
    /// Model identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Context length in tokens
    pub context_length: u32,
    /// Model capabilities
    pub capabilities: ModelCapabilities,
}
