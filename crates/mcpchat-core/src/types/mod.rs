//! Core types for chat turns
//!
//! Shared by providers, the tool registry, the session store and the
//! orchestrator.

mod message;
mod model;
mod session;
mod stream;
mod tool;

pub use message::{display_view, ChatMessage, ContentPart, MessageContent, MessageRole};
pub use model::{DefaultModel, ModelCapabilities, ModelConfig, ModelSettings, ProviderMetadata};
pub use session::{ChatSession, SessionScope};
pub use stream::{FinishReason, StreamChunk, Usage};
pub use tool::{ToolCall, ToolChoice, ToolDescriptor, ToolResult};
