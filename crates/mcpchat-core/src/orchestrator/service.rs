//! Chat service
//!
//! The entry points an outer surface calls. Everything here runs before the
//! stream preamble, so failures come back as ordinary `ChatError`s.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::logging::Logger;
use crate::mcp::{McpConnector, ToolConnector};
use crate::providers::create_provider;
use crate::session::{OpenMode, OpenedSession, SessionStore};
use crate::stream::FrameSink;
use crate::telemetry::TracingTelemetrySink;
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, SessionScope};
use crate::{log_debug, log_info};

use super::error::{ChatError, ChatResult};
use super::prompts::PromptLibrary;
use super::turn::{PreparedTurn, StreamOrchestrator, TurnOutcome};

/// Session lifecycle plus turn admission
pub struct ChatService {
    store: Arc<SessionStore>,
    orchestrator: Arc<StreamOrchestrator>,
    logger: Arc<dyn Logger>,
}

impl ChatService {
    pub fn new(orchestrator: Arc<StreamOrchestrator>, logger: Arc<dyn Logger>) -> Self {
        Self {
            store: Arc::clone(orchestrator.store()),
            orchestrator,
            logger,
        }
    }

    /// Wire the production stack from configuration
    pub fn from_config(config: &EngineConfig, logger: Arc<dyn Logger>) -> Self {
        let provider = create_provider(&config.model.provider, Arc::clone(&logger));
        let connector: Arc<dyn ToolConnector> = Arc::new(McpConnector::new(Arc::clone(&logger)));
        let registry = Arc::new(ToolRegistry::new(
            config.tool_providers.clone(),
            connector,
            Arc::clone(&logger),
        ));
        let store = Arc::new(
            SessionStore::in_memory(Arc::clone(&logger))
                .with_ttl(Duration::from_secs(config.chat.session_ttl_secs))
                .with_lock_timeout(Duration::from_millis(config.chat.lock_timeout_ms)),
        );

        let orchestrator = StreamOrchestrator::new(
            provider,
            config.model.clone(),
            registry,
            store,
            Arc::clone(&logger),
        )
        .with_chat_settings(&config.chat)
        .with_prompts(PromptLibrary::new(config.prompts.clone(), Arc::clone(&logger)))
        .with_telemetry(Arc::new(TracingTelemetrySink));

        log_info!(
            logger,
            "[ChatService] Ready: model {}/{}, {} tool providers, max {} steps",
            config.model.provider,
            config.model.model,
            config.enabled_tool_providers().len(),
            config.chat.max_steps
        );

        Self::new(Arc::new(orchestrator), logger)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<StreamOrchestrator> {
        &self.orchestrator
    }

    /// Resolve or create a session and return its display history
    pub async fn open(
        &self,
        owner_id: &str,
        session_id: Option<&str>,
        scope: Option<SessionScope>,
        mode: OpenMode,
    ) -> ChatResult<OpenedSession> {
        let opened = self.store.open(session_id, owner_id, scope, mode).await?;
        log_debug!(
            self.logger,
            "[ChatService] Opened {} ({} messages, created: {})",
            opened.session.session_id,
            opened.history.len(),
            opened.created
        );
        Ok(opened)
    }

    /// Admit a user message: check the session, append it to the context view
    ///
    /// The display view only gets the message once the turn commits.
    pub async fn prepare_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        message: &str,
        auth_token: Option<String>,
    ) -> ChatResult<PreparedTurn> {
        let session = self
            .store
            .session(session_id)
            .await?
            .filter(|s| s.owner_id == owner_id)
            .ok_or_else(|| ChatError::NotFound(session_id.to_string()))?;

        let user_message = ChatMessage::user(message);
        let context = self
            .store
            .append_context(&session.session_id, vec![user_message.clone()])
            .await?;

        Ok(PreparedTurn {
            session,
            user_message,
            context,
            auth_token,
        })
    }

    /// Stream a prepared turn into `sink`
    pub async fn run_turn(&self, turn: PreparedTurn, sink: Box<dyn FrameSink>) -> TurnOutcome {
        self.orchestrator.run(turn, sink).await
    }

    /// `prepare_turn` then `run_turn`
    pub async fn send(
        &self,
        owner_id: &str,
        session_id: &str,
        message: &str,
        auth_token: Option<String>,
        sink: Box<dyn FrameSink>,
    ) -> ChatResult<TurnOutcome> {
        let turn = self.prepare_turn(owner_id, session_id, message, auth_token).await?;
        Ok(self.run_turn(turn, sink).await)
    }

    /// Drop a session; unknown ids succeed
    pub async fn delete(&self, session_id: &str) -> ChatResult<()> {
        self.store.delete(session_id).await?;
        log_debug!(self.logger, "[ChatService] Deleted {}", session_id);
        Ok(())
    }
}
