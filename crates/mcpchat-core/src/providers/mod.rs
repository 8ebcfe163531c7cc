//! LLM Provider implementations
//!
//! ## Architecture
//!
//! All real vendors go through the `genai` crate, which handles streaming SSE
//! parsing, vendor protocols, tool calling and structured output. Vendors not
//! native to genai (Azure, OpenRouter, Mistral) are routed via genai's
//! `ServiceTargetResolver` using OpenAI-compatible protocols.
//!
//! The `MockProvider` stands in for a vendor in tests.

mod error;
mod genai_adapter;
mod genai_provider;
mod mock;
mod traits;

// Core traits and types
pub use error::{ProviderError, ProviderResult};
pub use traits::{ObjectSchema, Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};

// The main provider - handles all LLM providers via genai
pub use genai_adapter::{is_genai_native, is_genai_supported, provider_env_vars, ProviderConfig};
pub use genai_provider::GenaiProvider;

// Mock provider for testing
pub use mock::{MockConfig, MockMode, MockProvider, MockStep, RecordedRequest};

use crate::logging::Logger;
use std::sync::Arc;

/// Create a provider for the given provider ID
///
/// `mock` yields an echoing `MockProvider`; everything else goes through
/// `GenaiProvider`, which treats unknown IDs as OpenAI-compatible endpoints.
pub fn create_provider(provider_id: &str, logger: Arc<dyn Logger>) -> Arc<dyn Provider> {
    match provider_id.to_lowercase().as_str() {
        "mock" => Arc::new(MockProvider::echo(logger)),
        _ => Arc::new(GenaiProvider::new(provider_id, logger)),
    }
}

/// List all supported provider IDs
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        "openai",
        "anthropic",
        "gemini",
        "ollama",
        "groq",
        "xai",
        "deepseek",
        "cohere",
        "fireworks",
        "together",
        "azure",
        "openrouter",
        "mistral",
        "mock",
    ]
}
