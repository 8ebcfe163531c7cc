//! Mock provider for testing
//!
//! Deterministic, configurable responses without network dependencies. Every
//! request is recorded so tests can assert on prompts, tools and tool choice.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::traits::{ObjectSchema, Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};
use crate::log_debug;
use crate::logging::Logger;
use crate::types::{
    ChatMessage, DefaultModel, FinishReason, MessageRole, ModelCapabilities, ProviderMetadata,
    StreamChunk, ToolCall, Usage,
};

/// One scripted generation step
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Text chunks, then finish with `stop`
    Text(Vec<String>),
    /// Optional text, then tool calls, then finish with `tool-calls`
    ToolCalls { text: Vec<String>, calls: Vec<ToolCall> },
    /// Text chunks, then finish with `length`
    Length(Vec<String>),
    /// Stream fails mid-way with this message
    Error(String),
    /// Request rejected because the prompt overflowed the context window
    ContextOverflow,
}

impl MockStep {
    pub fn text(text: impl Into<String>) -> Self {
        MockStep::Text(vec![text.into()])
    }

    pub fn tool_call(call: ToolCall) -> Self {
        MockStep::ToolCalls {
            text: vec![],
            calls: vec![call],
        }
    }
}

/// Mock response mode
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user message
    #[default]
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Return response as specific chunks with delays
    Chunks(Vec<String>),
    /// Simulate an error after some chunks
    Error { message: String, delay_chunks: usize },
    /// Return nothing (empty response)
    Empty,
    /// Play steps in order; the last step repeats once the script runs out
    Script(Vec<MockStep>),
}

/// Configuration for the mock provider
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Response mode
    pub mode: MockMode,
    /// Delay between chunks in milliseconds (0 = no delay)
    pub chunk_delay_ms: u64,
    /// Size of each chunk when splitting fixed/echo responses
    pub chunk_size: usize,
    /// Answer for `generate_object`; `Err` simulates a failed call
    pub object_response: Result<Value, String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Echo,
            chunk_delay_ms: 0,
            chunk_size: 10,
            object_response: Err("no structured response configured".to_string()),
        }
    }
}

/// A request the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub options: StreamChatOptions,
}

impl RecordedRequest {
    /// Text of the leading system message, if any
    pub fn system_prompt(&self) -> Option<String> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(ChatMessage::text_content)
    }
}

/// Mock LLM provider for testing
pub struct MockProvider {
    config: MockConfig,
    logger: Arc<dyn Logger>,
    stream_calls: AtomicUsize,
    object_calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
    object_requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    /// Create a new mock provider with default config
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(MockConfig::default(), logger)
    }

    /// Create with specific config
    pub fn with_config(config: MockConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            logger,
            stream_calls: AtomicUsize::new(0),
            object_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            object_requests: Mutex::new(Vec::new()),
        }
    }

    /// Create an echo provider (echoes back user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::new(logger)
    }

    /// Create a fixed response provider
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Fixed(response.into()), logger)
    }

    /// Create a chunked response provider
    pub fn chunked(chunks: Vec<String>, delay_ms: u64, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Chunks(chunks), logger).with_delay(delay_ms)
    }

    /// Create an error-producing provider
    pub fn error(message: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(
            MockMode::Error {
                message: message.into(),
                delay_chunks: 0,
            },
            logger,
        )
    }

    /// Create a provider that plays scripted steps
    pub fn scripted(steps: Vec<MockStep>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Script(steps), logger)
    }

    fn with_mode(mode: MockMode, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode,
                ..Default::default()
            },
            logger,
        )
    }

    /// Set chunk delay
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.config.chunk_delay_ms = delay_ms;
        self
    }

    /// Set chunk size for splitting responses
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the structured-generation answer
    pub fn with_object(mut self, value: Value) -> Self {
        self.config.object_response = Ok(value);
        self
    }

    /// Make structured generation fail
    pub fn with_object_error(mut self, message: impl Into<String>) -> Self {
        self.config.object_response = Err(message.into());
        self
    }

    /// Number of `stream_chat` calls so far
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Number of `generate_object` calls so far
    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }

    /// Every `stream_chat` request received
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Messages of every `generate_object` request received
    pub fn object_requests(&self) -> Vec<Vec<ChatMessage>> {
        self.object_requests.lock().clone()
    }

    /// Extract last user message content
    fn get_last_user_message(&self, messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::User)
            .map(ChatMessage::text_content)
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| "Hello from MockProvider!".to_string())
    }

    /// Split text into chunks
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        if self.config.chunk_size == 0 || text.is_empty() {
            return vec![text.to_string()];
        }

        text.chars()
            .collect::<Vec<_>>()
            .chunks(self.config.chunk_size)
            .map(|c| c.iter().collect())
            .collect()
    }

    fn text_items(chunks: Vec<String>) -> Vec<ProviderResult<StreamChunk>> {
        chunks.into_iter().map(|t| Ok(StreamChunk::text(t))).collect()
    }

    fn finished(
        mut items: Vec<ProviderResult<StreamChunk>>,
        reason: FinishReason,
    ) -> Vec<ProviderResult<StreamChunk>> {
        items.push(Ok(StreamChunk::finish(
            reason,
            Usage {
                prompt_tokens: Some(10),
                completion_tokens: Some(5),
            },
        )));
        items
    }

    /// Items for one scripted step; `Err` means the request itself fails
    fn step_items(&self, step: MockStep) -> ProviderResult<Vec<ProviderResult<StreamChunk>>> {
        Ok(match step {
            MockStep::Text(chunks) => Self::finished(Self::text_items(chunks), FinishReason::Stop),
            MockStep::ToolCalls { text, calls } => {
                let mut items = Self::text_items(text);
                items.extend(calls.into_iter().map(|c| Ok(StreamChunk::tool_call(c))));
                Self::finished(items, FinishReason::ToolCalls)
            }
            MockStep::Length(chunks) => {
                Self::finished(Self::text_items(chunks), FinishReason::Length)
            }
            MockStep::Error(message) => {
                vec![Err(ProviderError::Other(format!("Mock error: {}", message)))]
            }
            MockStep::ContextOverflow => {
                return Err(ProviderError::ContextLengthExceeded {
                    provider: "mock".to_string(),
                    message: "maximum context length exceeded".to_string(),
                })
            }
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_api_base(&self) -> &str {
        "http://localhost:0/mock"
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: "mock".to_string(),
            display_name: "Mock Provider".to_string(),
            default_api_base: self.default_api_base().to_string(),
            requires_api_key: false,
            default_models: vec![DefaultModel {
                id: "mock-echo".to_string(),
                name: "Mock Echo".to_string(),
                context_length: 128000,
                capabilities: ModelCapabilities::full(),
            }],
        }
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        _model: ProviderModelConfig,
        options: StreamChatOptions,
    ) -> ProviderResult<StreamResponse> {
        let call_index = self.stream_calls.fetch_add(1, Ordering::SeqCst);
        log_debug!(self.logger, "MockProvider: stream_chat call {}", call_index + 1);

        let last_user = self.get_last_user_message(&messages);
        self.requests.lock().push(RecordedRequest { messages, options });

        let items: Vec<ProviderResult<StreamChunk>> = match &self.config.mode {
            MockMode::Echo => Self::finished(
                Self::text_items(self.split_into_chunks(&format!("Echo: {}", last_user))),
                FinishReason::Stop,
            ),
            MockMode::Fixed(response) => Self::finished(
                Self::text_items(self.split_into_chunks(response)),
                FinishReason::Stop,
            ),
            MockMode::Chunks(chunks) => {
                Self::finished(Self::text_items(chunks.clone()), FinishReason::Stop)
            }
            MockMode::Empty => Self::finished(vec![], FinishReason::Stop),
            MockMode::Error { message, delay_chunks } => {
                let mut items = Self::text_items(
                    (0..*delay_chunks)
                        .map(|i| format!("Chunk {} before error. ", i))
                        .collect(),
                );
                items.push(Err(ProviderError::Other(format!("Mock error: {}", message))));
                items
            }
            MockMode::Script(steps) => {
                let step = steps
                    .get(call_index)
                    .or_else(|| steps.last())
                    .cloned()
                    .unwrap_or(MockStep::Text(vec![]));
                self.step_items(step)?
            }
        };

        let delay_ms = self.config.chunk_delay_ms;
        let stream = stream::iter(items.into_iter().enumerate()).then(move |(i, item)| async move {
            if i > 0 && delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            item
        });

        Ok(Box::pin(stream))
    }

    async fn generate_object(
        &self,
        messages: Vec<ChatMessage>,
        _model: ProviderModelConfig,
        schema: ObjectSchema,
    ) -> ProviderResult<Value> {
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        self.object_requests.lock().push(messages);
        log_debug!(self.logger, "MockProvider: generate_object for {}", schema.name);

        self.config
            .object_response
            .clone()
            .map_err(|e| ProviderError::Other(format!("Mock error: {}", e)))
    }
}
