//! MCPChat Core
//!
//! Runtime-agnostic conversational turn engine.
//! This crate drives one AI chat turn end to end and can be hosted by any
//! outer surface (the `mcpchat-server` HTTP binary, a CLI, tests).
//!
//! ## Turn flow
//!
//! - `SessionStore` keeps both transcript views under one TTL-backed record
//!   with per-session mutual exclusion
//! - `ToolRegistry` connects to every configured MCP tool provider for the turn
//! - `ToolSelector` asks the model for the relevant subset of the catalog
//! - `StreamOrchestrator` runs the bounded generate/tool-call loop and writes
//!   line frames through `MessageFramer`
//!
//! ```rust,ignore
//! use mcpchat_core::{ChatService, EngineConfig, OpenMode, ChannelSink};
//!
//! let service = ChatService::from_config(&config, logger);
//! let opened = service.open("user-1", None, None, OpenMode::ResumeOrCreate).await?;
//!
//! let (sink, mut rx) = ChannelSink::channel(64);
//! let turn = service.prepare_turn("user-1", &opened.session.session_id, "hi", None).await?;
//! tokio::spawn(async move { service.run_turn(turn, Box::new(sink)).await });
//! while let Some(line) = rx.recv().await {
//!     print!("{}", line);
//! }
//! ```

pub mod config;
pub mod logging;
pub mod mcp;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use types::{
    ChatMessage, ChatSession, ContentPart, FinishReason, MessageContent, MessageRole, ModelConfig,
    ModelSettings, SessionScope, StreamChunk, ToolCall, ToolChoice, ToolDescriptor, ToolResult,
    Usage,
};

pub use logging::{Logger, MemoryLogger, NoOpLogger, TracingLogger};

pub use config::{ConfigProvider, EngineConfig, FileConfigProvider, MemoryConfigProvider};

pub use providers::{create_provider, MockProvider, Provider, ProviderError};

pub use mcp::{McpClient, McpConnector, McpError, McpResult, ToolConnection, ToolConnector};

pub use tools::{CatalogCache, ToolCatalog, ToolRegistry, ToolSelector};

pub use session::{OpenMode, OpenedSession, SessionError, SessionStore};

pub use stream::{BufferSink, ChannelSink, Frame, FrameError, FrameSink, MessageFramer};

pub use telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetrySink};

pub use orchestrator::{
    ChatError, ChatResult, ChatService, ErrorClass, PreparedTurn, StreamOrchestrator, TurnEnd,
    TurnOutcome,
};
