//! GenaiProvider - Unified provider using the genai crate
//!
//! Handles every genai-supported vendor plus OpenAI-compatible endpoints
//! routed through the ServiceTargetResolver.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use genai::chat::{ChatRequest, ChatStreamEvent};

use crate::logging::Logger;
use crate::types::{ChatMessage, DefaultModel, ModelCapabilities, ProviderMetadata};
use crate::{log_debug, log_error, log_info};

use super::error::{ProviderError, ProviderResult};
use super::genai_adapter::{
    create_client, from_genai_event, is_genai_supported, to_genai_messages,
    to_genai_object_options, to_genai_options, to_genai_tools, ProviderConfig,
};
use super::traits::{ObjectSchema, Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};

/// Unified provider using genai for all supported LLM APIs
pub struct GenaiProvider {
    /// Provider identifier
    provider_id: String,
    /// Logger for debug output
    logger: Arc<dyn Logger>,
}

impl GenaiProvider {
    /// Create a new GenaiProvider
    pub fn new(provider_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            provider_id: provider_id.into(),
            logger,
        }
    }

    /// Check if this provider can handle the given provider ID
    pub fn supports(provider_id: &str) -> bool {
        is_genai_supported(provider_id)
    }

    /// Extract model name from a model string (e.g., "openai/gpt-4" -> "gpt-4")
    pub fn extract_model_name(model: &str) -> &str {
        model.split('/').nth(1).unwrap_or(model)
    }

    fn api_error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::api_error(self.provider_id.clone(), 500, message)
    }
}

#[async_trait]
impl Provider for GenaiProvider {
    fn name(&self) -> &str {
        &self.provider_id
    }

    fn default_api_base(&self) -> &str {
        match self.provider_id.as_str() {
            "openai" => "https://api.openai.com/v1/",
            "anthropic" => "https://api.anthropic.com/",
            "gemini" => "https://generativelanguage.googleapis.com/",
            "ollama" => "http://localhost:11434/",
            "groq" => "https://api.groq.com/openai/v1/",
            "xai" => "https://api.x.ai/v1/",
            "deepseek" => "https://api.deepseek.com/",
            "cohere" => "https://api.cohere.ai/",
            "fireworks" => "https://api.fireworks.ai/inference/v1/",
            "together" => "https://api.together.xyz/v1/",
            "openrouter" => "https://openrouter.ai/api/v1/",
            "mistral" => "https://api.mistral.ai/v1/",
            _ => "https://api.openai.com/v1/",
        }
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.provider_id.clone(),
            display_name: self.provider_id.clone(),
            default_api_base: self.default_api_base().to_string(),
            requires_api_key: !matches!(self.provider_id.as_str(), "ollama"),
            default_models: vec![DefaultModel {
                id: "default".to_string(),
                name: "Default Model".to_string(),
                context_length: 128000,
                capabilities: ModelCapabilities::full(),
            }],
        }
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        model_config: ProviderModelConfig,
        options: StreamChatOptions,
    ) -> ProviderResult<StreamResponse> {
        log_info!(
            self.logger,
            "[GenaiProvider] stream_chat called: provider={}, model={}, messages={}",
            self.provider_id,
            model_config.model,
            messages.len()
        );

        let client = create_client(&ProviderConfig::new(&self.provider_id, &model_config));

        let mut chat_req = ChatRequest::new(to_genai_messages(messages));
        let genai_tools = to_genai_tools(&options);
        if !genai_tools.is_empty() {
            chat_req = chat_req.with_tools(genai_tools);
        }

        let genai_options = to_genai_options(&options);
        let model_name = Self::extract_model_name(&model_config.model);

        let chat_stream = client
            .exec_chat_stream(model_name, chat_req, Some(&genai_options))
            .await
            .map_err(|e| self.api_error(e.to_string()))?;

        log_debug!(self.logger, "[GenaiProvider] Stream started successfully");

        let logger = Arc::clone(&self.logger);
        let provider_id = self.provider_id.clone();

        let stream = chat_stream
            .stream
            .map(move |result| match result {
                Ok(event) => {
                    if let ChatStreamEvent::End(_) = &event {
                        log_debug!(logger, "[GenaiProvider] Stream event: End");
                    }
                    from_genai_event(event)
                }
                Err(e) => {
                    log_error!(logger, "[GenaiProvider] Stream error: {}", e);
                    vec![Err(ProviderError::api_error(
                        provider_id.clone(),
                        500,
                        e.to_string(),
                    ))]
                }
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    async fn generate_object(
        &self,
        messages: Vec<ChatMessage>,
        model_config: ProviderModelConfig,
        schema: ObjectSchema,
    ) -> ProviderResult<Value> {
        log_debug!(
            self.logger,
            "[GenaiProvider] generate_object: provider={}, schema={}",
            self.provider_id,
            schema.name
        );

        let client = create_client(&ProviderConfig::new(&self.provider_id, &model_config));
        let chat_req = ChatRequest::new(to_genai_messages(messages));
        let options = to_genai_object_options(&schema);
        let model_name = Self::extract_model_name(&model_config.model);

        let response = client
            .exec_chat(model_name, chat_req, Some(&options))
            .await
            .map_err(|e| self.api_error(e.to_string()))?;

        let text = response.first_text().ok_or_else(|| {
            ProviderError::invalid_response(&self.provider_id, "structured response had no text")
        })?;

        Ok(serde_json::from_str(text)?)
    }
}
