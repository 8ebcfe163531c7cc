//! The turn loop
//!
//! One `run` drives one client response: start frame, tool catalog, tool
//! selection, then generation steps until the model stops, the step bound is
//! hit or something fails. The catalog is closed exactly once on every path,
//! and the stream always ends with exactly one end frame (unless the client is
//! gone).

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};

use crate::config::ChatSettings;
use crate::logging::Logger;
use crate::providers::{Provider, ProviderModelConfig, StreamChatOptions};
use crate::session::{HistorySummarizer, SessionStore};
use crate::stream::{FrameSink, MessageFramer};
use crate::telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetrySink};
use crate::tools::{ToolCatalog, ToolRegistry, ToolSelector};
use crate::types::{
    ChatMessage, ChatSession, FinishReason, ModelConfig, StreamChunk, ToolCall, ToolChoice,
    ToolDescriptor, Usage,
};
use crate::{log_debug, log_info, log_warn};

use super::error::TurnError;
use super::failure::{ErrorClass, FailureReporter, TurnIdentity};
use super::prompts::{with_disclaimer, PromptLibrary};
use super::state::{TurnPhase, TurnState};

/// Step bound when none is configured
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Written when a step stops on the length limit
pub const TRUNCATION_MESSAGE: &str = "The message was truncated because the maximum tokens for the context window was reached. Please try again.";

/// Written when the step bound cuts a turn short
pub fn recursion_warning(max_steps: u32) -> String {
    format!(
        "Maximum recursion depth ({}) reached. Terminating recursion.",
        max_steps
    )
}

/// A turn accepted by the service, ready to stream
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    /// Context view, ending with `user_message`
    pub context: Vec<ChatMessage>,
    /// Forwarded to tool providers
    pub auth_token: Option<String>,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    Completed(FinishReason),
    RecursionBound,
    Truncated,
    Failed(ErrorClass),
}

/// Summary of a finished turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub message_id: Option<String>,
    pub end: TurnEnd,
    pub steps: u32,
    pub usage: Usage,
    /// Tools offered to the model after selection
    pub tools_offered: usize,
    /// Connection closes that failed during cleanup
    pub close_failures: usize,
}

enum LoopEnd {
    Completed(FinishReason),
    RecursionBound,
    Truncated,
}

struct StepOutput {
    text: String,
    tool_calls: Vec<ToolCall>,
    finish_reason: FinishReason,
    usage: Usage,
}

/// Runs turns against one model, tool registry and session store
pub struct StreamOrchestrator {
    provider: Arc<dyn Provider>,
    model: ModelConfig,
    registry: Arc<ToolRegistry>,
    store: Arc<SessionStore>,
    selector: ToolSelector,
    summarizer: HistorySummarizer,
    prompts: PromptLibrary,
    telemetry: Arc<dyn TelemetrySink>,
    reporter: FailureReporter,
    max_steps: u32,
    logger: Arc<dyn Logger>,
}

impl StreamOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: ModelConfig,
        registry: Arc<ToolRegistry>,
        store: Arc<SessionStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);
        Self {
            selector: ToolSelector::new(Arc::clone(&provider), Arc::clone(&logger))
                .with_always_on(registry.always_on_tags()),
            summarizer: HistorySummarizer::new(Arc::clone(&provider), Arc::clone(&logger)),
            prompts: PromptLibrary::builtin(Arc::clone(&logger)),
            reporter: FailureReporter::new(Arc::clone(&telemetry), Arc::clone(&logger)),
            telemetry,
            provider,
            model,
            registry,
            store,
            max_steps: DEFAULT_MAX_STEPS,
            logger,
        }
    }

    /// Apply step bound, selection cap and summary limits
    pub fn with_chat_settings(self, chat: &ChatSettings) -> Self {
        Self {
            max_steps: chat.max_steps.max(1),
            selector: self.selector.with_max_selected(chat.max_selected_tools),
            summarizer: self
                .summarizer
                .with_max_tokens(chat.summary_max_tokens)
                .with_max_interactions(chat.max_interactions_for_summary),
            ..self
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.reporter = FailureReporter::new(Arc::clone(&telemetry), Arc::clone(&self.logger));
        self.telemetry = telemetry;
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Drive one turn into `sink`
    ///
    /// Never fails: problems after the start frame are reported in-band.
    pub async fn run(&self, turn: PreparedTurn, sink: Box<dyn FrameSink>) -> TurnOutcome {
        let identity = TurnIdentity {
            session_id: turn.session.session_id.clone(),
            owner_id: turn.session.owner_id.clone(),
            provider: self.model.provider.clone(),
            model: self.model.model.clone(),
        };
        let mut framer = MessageFramer::new(sink);
        let mut state = TurnState::new(self.max_steps);

        self.telemetry.emit(TelemetryEvent::message_send(
            &identity.session_id,
            &identity.owner_id,
            &identity.provider,
        ));

        if let Err(e) = framer.start().await {
            state.advance(TurnPhase::Errored);
            let class = self.reporter.report(&mut framer, &identity, &e.into()).await;
            state.advance(TurnPhase::Closed);
            return self.outcome(&identity, &framer, &state, TurnEnd::Failed(class), 0, 0);
        }

        state.advance(TurnPhase::Selecting);
        let catalog = self.registry.catalog(turn.auth_token.as_deref()).await;

        let mut tools_offered = 0;
        let driving = self.drive(&turn, &catalog, &mut state, &mut framer, &mut tools_offered);
        let result = AssertUnwindSafe(driving)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(TurnError::Internal("turn aborted unexpectedly".to_string())));

        let end = match result {
            Ok(end) => self.finish(&turn, &identity, &mut state, &mut framer, end).await,
            Err(error) => self.fail(&turn, &identity, &mut state, &mut framer, error).await,
        };

        let close_failures = catalog.close(self.logger.as_ref()).await;
        state.advance(TurnPhase::Closed);

        log_info!(
            self.logger,
            "[StreamOrchestrator] Turn for {} ended after {} steps: {:?}",
            identity.session_id,
            state.step_count,
            end
        );
        self.outcome(&identity, &framer, &state, end, tools_offered, close_failures)
    }

    fn outcome(
        &self,
        identity: &TurnIdentity,
        framer: &MessageFramer,
        state: &TurnState,
        end: TurnEnd,
        tools_offered: usize,
        close_failures: usize,
    ) -> TurnOutcome {
        TurnOutcome {
            session_id: identity.session_id.clone(),
            message_id: framer.message_id().map(String::from),
            end,
            steps: state.step_count,
            usage: state.usage,
            tools_offered,
            close_failures,
        }
    }

    async fn drive(
        &self,
        turn: &PreparedTurn,
        catalog: &ToolCatalog,
        state: &mut TurnState,
        framer: &mut MessageFramer,
        tools_offered: &mut usize,
    ) -> Result<LoopEnd, TurnError> {
        let model = ProviderModelConfig::from(&self.model);

        let selected = match self.selector.select(&turn.context, catalog.tools(), &model).await {
            Ok(tools) => tools,
            Err(e) => {
                log_warn!(
                    self.logger,
                    "[StreamOrchestrator] Tool selection failed, continuing without tools: {}",
                    e
                );
                Vec::new()
            }
        };
        *tools_offered = selected.len();

        let groups: BTreeSet<String> = selected.iter().map(|t| t.provider_tag.clone()).collect();
        let mut system_prompt = self.prompts.system_prompt(&groups).await;
        if selected.is_empty() {
            system_prompt = with_disclaimer(&system_prompt);
            state.tool_choice = ToolChoice::None;
        } else {
            state.tool_choice = ToolChoice::Auto;
        }

        let mut history = turn.context.clone();
        state.advance(TurnPhase::Generating);

        loop {
            let mut request = Vec::with_capacity(history.len() + state.accumulated.len() + 1);
            request.push(ChatMessage::system(system_prompt.as_str()));
            request.extend(history.iter().cloned());
            request.extend(state.accumulated.iter().cloned());

            let step = match self
                .generate_step(request, &selected, state.tool_choice, framer)
                .await
            {
                Ok(step) => step,
                Err(TurnError::Generation(e))
                    if e.is_context_length_exceeded()
                        && state.step_count == 0
                        && !state.summarized =>
                {
                    log_warn!(
                        self.logger,
                        "[StreamOrchestrator] Context window exceeded, summarizing history: {}",
                        e
                    );
                    state.summarized = true;
                    history = self
                        .summarizer
                        .summarize_session(
                            &self.store,
                            &turn.session.session_id,
                            &model,
                            &self.model.settings,
                        )
                        .await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            state.complete_step(step.usage);
            let has_calls = !step.tool_calls.is_empty();
            if has_calls {
                state
                    .accumulated
                    .push(ChatMessage::assistant_with_tool_calls(step.text, &step.tool_calls));
                state.advance(TurnPhase::ToolCall);
                let results = catalog.invoke_all(&step.tool_calls, self.logger.as_ref()).await;
                state.accumulated.push(ChatMessage::tool_results(results));
            } else if !step.text.is_empty() {
                state.accumulated.push(ChatMessage::assistant(step.text));
            }

            if step.finish_reason == FinishReason::Stop {
                return Ok(LoopEnd::Completed(FinishReason::Stop));
            }
            if state.bound_reached() {
                return Ok(LoopEnd::RecursionBound);
            }
            match step.finish_reason {
                FinishReason::Length => return Ok(LoopEnd::Truncated),
                FinishReason::ToolCalls if has_calls => {
                    state.advance(TurnPhase::Generating);
                }
                other => return Ok(LoopEnd::Completed(other)),
            }
        }
    }

    async fn generate_step(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDescriptor],
        tool_choice: ToolChoice,
        framer: &mut MessageFramer,
    ) -> Result<StepOutput, TurnError> {
        let mut options =
            StreamChatOptions::from_settings(&self.model.settings).with_tool_choice(tool_choice);
        if !tools.is_empty() {
            options = options.with_tools(tools.to_vec());
        }

        let mut stream = self
            .provider
            .stream_chat(messages, ProviderModelConfig::from(&self.model), options)
            .await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut finish_reason = None;
        let mut usage = Usage::default();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Text { text: delta } => {
                    framer.delta(&delta).await?;
                    text.push_str(&delta);
                }
                StreamChunk::ToolCall { tool_call } => tool_calls.push(tool_call),
                StreamChunk::ToolCallDelta { .. } => {}
                StreamChunk::Finish { reason, usage: step_usage } => {
                    finish_reason = Some(reason);
                    usage = step_usage;
                }
            }
        }

        let finish_reason = finish_reason.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });
        Ok(StepOutput {
            text,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    async fn finish(
        &self,
        turn: &PreparedTurn,
        identity: &TurnIdentity,
        state: &mut TurnState,
        framer: &mut MessageFramer,
        end: LoopEnd,
    ) -> TurnEnd {
        state.advance(TurnPhase::Finishing);
        let session_id = &turn.session.session_id;
        let produced = std::mem::take(&mut state.accumulated);

        if let Err(e) = self
            .store
            .commit_turn(session_id, turn.user_message.clone(), produced)
            .await
        {
            state.advance(TurnPhase::Errored);
            let class = self.reporter.report(framer, identity, &e.into()).await;
            self.end_stream(framer, FinishReason::Error, state.usage).await;
            return TurnEnd::Failed(class);
        }

        let (end, reason) = match end {
            LoopEnd::Completed(reason) => (TurnEnd::Completed(reason), reason),
            LoopEnd::RecursionBound => {
                let warning = recursion_warning(state.max_steps);
                log_warn!(self.logger, "[StreamOrchestrator] {}", warning);
                self.write_notice(framer, &warning).await;
                (TurnEnd::RecursionBound, FinishReason::Stop)
            }
            LoopEnd::Truncated => {
                self.summarize_quietly(session_id).await;
                self.write_notice(framer, TRUNCATION_MESSAGE).await;
                (TurnEnd::Truncated, FinishReason::Length)
            }
        };

        self.end_stream(framer, reason, state.usage).await;
        end
    }

    async fn fail(
        &self,
        turn: &PreparedTurn,
        identity: &TurnIdentity,
        state: &mut TurnState,
        framer: &mut MessageFramer,
        error: TurnError,
    ) -> TurnEnd {
        state.advance(TurnPhase::Errored);
        let class = self.reporter.report(framer, identity, &error).await;

        if !matches!(error, TurnError::Session(_)) {
            let produced = std::mem::take(&mut state.accumulated);
            if let Err(e) = self
                .store
                .commit_turn(&turn.session.session_id, turn.user_message.clone(), produced)
                .await
            {
                log_warn!(
                    self.logger,
                    "[StreamOrchestrator] Failed to persist failed turn for {}: {}",
                    turn.session.session_id,
                    e
                );
            }
        }
        if class == ErrorClass::ContextLengthExceeded {
            self.summarize_quietly(&turn.session.session_id).await;
        }

        self.end_stream(framer, FinishReason::Error, state.usage).await;
        TurnEnd::Failed(class)
    }

    async fn summarize_quietly(&self, session_id: &str) {
        let model = ProviderModelConfig::from(&self.model);
        if let Err(e) = self
            .summarizer
            .summarize_session(&self.store, session_id, &model, &self.model.settings)
            .await
        {
            log_warn!(
                self.logger,
                "[StreamOrchestrator] Failed to summarize history for {}: {}",
                session_id,
                e
            );
        }
    }

    async fn write_notice(&self, framer: &mut MessageFramer, text: &str) {
        if framer.is_ended() {
            return;
        }
        if let Err(e) = framer.delta(text).await {
            log_debug!(self.logger, "[StreamOrchestrator] Could not write notice: {}", e);
        }
    }

    async fn end_stream(&self, framer: &mut MessageFramer, reason: FinishReason, usage: Usage) {
        if framer.is_ended() {
            return;
        }
        if let Err(e) = framer.end(reason, usage).await {
            log_debug!(self.logger, "[StreamOrchestrator] Could not write end frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolProviderConfig;
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::orchestrator::prompts::NO_TOOLS_DISCLAIMER;
    use crate::providers::{MockProvider, MockStep};
    use crate::session::OpenMode;
    use crate::stream::{BufferSink, Frame};
    use crate::telemetry::{RecordingTelemetrySink, FAILURE_EVENT, MESSAGE_SEND_EVENT};
    use crate::tools::{FakeConnection, FakeConnector};
    use crate::types::MessageRole;
    use serde_json::json;

    fn quiet() -> Arc<dyn Logger> {
        NoOpLogger::shared()
    }

    struct Harness {
        provider: Arc<MockProvider>,
        connector: Arc<FakeConnector>,
        store: Arc<SessionStore>,
        telemetry: Arc<RecordingTelemetrySink>,
        logger: Arc<MemoryLogger>,
        orchestrator: StreamOrchestrator,
    }

    fn three_providers() -> (Vec<ToolProviderConfig>, FakeConnector) {
        (
            vec![
                ToolProviderConfig::stdio("alpha", "alpha-server", vec![]),
                ToolProviderConfig::stdio("beta", "beta-server", vec![]),
                ToolProviderConfig::http("gamma", "http://localhost:9000/mcp"),
            ],
            FakeConnector::new()
                .with_connection(FakeConnection::new("alpha", &["list_flows"]))
                .with_unreachable("beta")
                .with_connection(FakeConnection::new("gamma", &["search_docs"])),
        )
    }

    fn harness(
        provider: MockProvider,
        providers: Vec<ToolProviderConfig>,
        connector: FakeConnector,
        max_steps: u32,
    ) -> Harness {
        let logger = Arc::new(MemoryLogger::new());
        let provider = Arc::new(provider);
        let connector = Arc::new(connector);
        let registry = Arc::new(ToolRegistry::new(providers, connector.clone(), logger.clone()));
        let store = Arc::new(SessionStore::in_memory(logger.clone()));
        let telemetry = Arc::new(RecordingTelemetrySink::new());
        let orchestrator = StreamOrchestrator::new(
            provider.clone(),
            ModelConfig::new("mock", "mock-echo"),
            registry,
            store.clone(),
            logger.clone(),
        )
        .with_max_steps(max_steps)
        .with_telemetry(telemetry.clone());

        Harness {
            provider,
            connector,
            store,
            telemetry,
            logger,
            orchestrator,
        }
    }

    impl Harness {
        async fn prepare(&self, text: &str) -> PreparedTurn {
            let opened = self
                .store
                .open(None, "owner", None, OpenMode::ResumeOrCreate)
                .await
                .unwrap();
            self.prepare_in(opened.session, text).await
        }

        async fn prepare_in(&self, session: ChatSession, text: &str) -> PreparedTurn {
            let user_message = ChatMessage::user(text);
            let context = self
                .store
                .append_context(&session.session_id, vec![user_message.clone()])
                .await
                .unwrap();
            PreparedTurn {
                session,
                user_message,
                context,
                auth_token: Some("token".to_string()),
            }
        }

        async fn run(&self, turn: PreparedTurn) -> (TurnOutcome, BufferSink) {
            let sink = BufferSink::new();
            let outcome = self.orchestrator.run(turn, Box::new(sink.clone())).await;
            (outcome, sink)
        }
    }

    fn deltas(frames: &[Frame]) -> Vec<String> {
        frames.iter().filter_map(|f| f.as_delta().map(String::from)).collect()
    }

    fn end_frames(frames: &[Frame]) -> Vec<&Frame> {
        frames.iter().filter(|f| matches!(f, Frame::End { .. })).collect()
    }

    #[tokio::test]
    async fn test_plain_turn_without_tools() {
        let h = harness(
            MockProvider::scripted(vec![MockStep::Text(vec!["Hel".into(), "lo".into()])], quiet()),
            vec![],
            FakeConnector::new(),
            10,
        );
        let turn = h.prepare("hi").await;
        let session_id = turn.session.session_id.clone();

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(outcome.steps, 1);
        let frames = sink.frames().unwrap();
        let started = outcome.message_id.as_deref();
        assert!(matches!(
            &frames[0],
            Frame::Start { message_id } if Some(message_id.as_str()) == started
        ));
        assert_eq!(deltas(&frames), vec!["Hel", "lo"]);
        assert_eq!(end_frames(&frames).len(), 1);
        assert!(matches!(
            frames.last(),
            Some(Frame::End { finish_reason: FinishReason::Stop, .. })
        ));

        // empty catalog: no selection call, no tools, disclaimer
        assert_eq!(h.provider.object_calls(), 0);
        let requests = h.provider.requests();
        let request = &requests[0];
        assert_eq!(request.options.tool_choice, Some(ToolChoice::None));
        assert!(request.system_prompt().unwrap().ends_with(NO_TOOLS_DISCLAIMER));

        let history = h.store.get_history(&session_id).await;
        let texts: Vec<String> = history.iter().map(ChatMessage::text_content).collect();
        assert_eq!(texts, vec!["hi", "Hello"]);
        assert_eq!(h.telemetry.named(MESSAGE_SEND_EVENT).len(), 1);
        assert!(h.telemetry.named(FAILURE_EVENT).is_empty());
    }

    #[tokio::test]
    async fn test_failed_provider_is_only_logged() {
        let (providers, connector) = three_providers();
        let h = harness(
            MockProvider::scripted(vec![MockStep::text("ok")], quiet())
                .with_object(json!({"tool_names": ["list_flows", "search_docs"]})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("what flows do I have?").await;

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(outcome.tools_offered, 2);
        let offered: Vec<String> = h.provider.requests()[0]
            .options
            .tools
            .clone()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(offered, vec!["list_flows", "search_docs"]);
        assert!(h.logger.contains(LogLevel::Error, "beta"));
        assert!(h.telemetry.named(FAILURE_EVENT).is_empty());
        assert_eq!(deltas(&sink.frames().unwrap()), vec!["ok"]);

        assert_eq!(h.connector.connection("alpha").unwrap().close_count(), 1);
        assert_eq!(h.connector.connection("gamma").unwrap().close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_provider_still_ends_the_stream() {
        let h = harness(
            MockProvider::scripted(vec![MockStep::text("ok")], quiet())
                .with_object(json!({"tool_names": ["list_flows"]})),
            vec![
                ToolProviderConfig::stdio("alpha", "alpha-server", vec![]),
                ToolProviderConfig::stdio("beta", "beta-server", vec![])
                    .with_connect_timeout(std::time::Duration::from_millis(50)),
            ],
            FakeConnector::new()
                .with_connection(FakeConnection::new("alpha", &["list_flows"]))
                .with_hanging("beta"),
            10,
        );
        let turn = h.prepare("what flows do I have?").await;

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(outcome.tools_offered, 1);
        let frames = sink.frames().unwrap();
        assert_eq!(deltas(&frames), vec!["ok"]);
        assert_eq!(end_frames(&frames).len(), 1);
        assert!(h.logger.contains(LogLevel::Error, "beta"));
        assert_eq!(h.connector.connection("alpha").unwrap().close_count(), 1);
    }

    #[tokio::test]
    async fn test_recursion_bound_stops_the_loop() {
        let (providers, connector) = three_providers();
        let call = ToolCall::new("c1", "list_flows", json!({}));
        let h = harness(
            MockProvider::scripted(vec![MockStep::tool_call(call)], quiet())
                .with_object(json!({"tool_names": ["list_flows"]})),
            providers,
            connector,
            5,
        );
        let turn = h.prepare("loop forever").await;
        let session_id = turn.session.session_id.clone();

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::RecursionBound);
        assert_eq!(outcome.steps, 5);
        assert_eq!(h.provider.stream_calls(), 5);

        let frames = sink.frames().unwrap();
        assert!(deltas(&frames)
            .iter()
            .any(|d| d.contains("Maximum recursion depth (5) reached")));
        assert_eq!(end_frames(&frames).len(), 1);

        let alpha = h.connector.connection("alpha").unwrap();
        assert_eq!(alpha.calls().len(), 5);
        assert_eq!(alpha.close_count(), 1);

        // display keeps only the user message, context keeps the tool traffic
        assert_eq!(h.store.get_history(&session_id).await.len(), 1);
        assert_eq!(h.store.get_context(&session_id).await.len(), 11);
    }

    #[tokio::test]
    async fn test_nothing_selected_forces_no_tools() {
        let (providers, connector) = three_providers();
        let h = harness(
            MockProvider::scripted(vec![MockStep::text("plain answer")], quiet())
                .with_object(json!({"tool_names": []})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("tell me a joke").await;

        let (outcome, _) = h.run(turn).await;

        assert_eq!(outcome.tools_offered, 0);
        assert_eq!(h.provider.object_calls(), 1);
        let requests = h.provider.requests();
        let request = &requests[0];
        assert_eq!(request.options.tool_choice, Some(ToolChoice::None));
        assert!(request.options.tools.is_none());
        assert!(request.system_prompt().unwrap().contains(NO_TOOLS_DISCLAIMER));
    }

    #[tokio::test]
    async fn test_selection_failure_runs_without_tools() {
        let (providers, connector) = three_providers();
        let h = harness(
            MockProvider::scripted(vec![MockStep::text("fine")], quiet())
                .with_object_error("selector down"),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("q").await;

        let (outcome, _) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(h.provider.requests()[0].options.tool_choice, Some(ToolChoice::None));
        assert!(h.logger.contains(LogLevel::Warn, "Tool selection failed"));
    }

    #[tokio::test]
    async fn test_tool_results_feed_the_next_step() {
        let (providers, connector) = three_providers();
        let call = ToolCall::new("c1", "list_flows", json!({"limit": 1}));
        let h = harness(
            MockProvider::scripted(
                vec![
                    MockStep::ToolCalls {
                        text: vec!["Let me check. ".into()],
                        calls: vec![call],
                    },
                    MockStep::text("You have one flow."),
                ],
                quiet(),
            )
            .with_object(json!({"tool_names": ["list_flows"]})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("list flows").await;
        let session_id = turn.session.session_id.clone();

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(outcome.steps, 2);

        let requests = h.provider.requests();
        assert_eq!(requests[0].options.tool_choice, Some(ToolChoice::Auto));
        let second = &requests[1].messages;
        let tool_message = &second[second.len() - 1];
        assert_eq!(tool_message.role, MessageRole::Tool);
        assert!(second[second.len() - 2].has_tool_calls());

        assert_eq!(
            deltas(&sink.frames().unwrap()),
            vec!["Let me check. ", "You have one flow."]
        );

        let history: Vec<String> = h
            .store
            .get_history(&session_id)
            .await
            .iter()
            .map(ChatMessage::text_content)
            .collect();
        assert_eq!(history, vec!["list flows", "Let me check. ", "You have one flow."]);
        assert_eq!(h.store.get_context(&session_id).await.len(), 4);
    }

    #[tokio::test]
    async fn test_generation_error_is_reported_in_band() {
        let (providers, connector) = three_providers();
        let h = harness(
            MockProvider::scripted(vec![MockStep::Error("boom".into())], quiet())
                .with_object(json!({"tool_names": ["list_flows"]})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("q").await;
        let session_id = turn.session.session_id.clone();

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Failed(ErrorClass::GenerationFailed));
        let frames = sink.frames().unwrap();
        assert!(matches!(frames[0], Frame::Start { .. }));
        assert!(deltas(&frames).iter().any(|d| d.contains("boom")));
        assert!(matches!(
            frames.last(),
            Some(Frame::End { finish_reason: FinishReason::Error, .. })
        ));
        assert_eq!(end_frames(&frames).len(), 1);

        let failures = h.telemetry.named(FAILURE_EVENT);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attribute("provider"), Some("mock"));
        assert_eq!(failures[0].attribute("model"), Some("mock-echo"));

        assert_eq!(h.connector.total_closes(), 2);
        assert_eq!(h.store.get_history(&session_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_context_overflow_summarizes_and_retries() {
        let h = harness(
            MockProvider::scripted(
                vec![
                    MockStep::ContextOverflow,
                    MockStep::text("earlier we discussed flows"),
                    MockStep::text("answer"),
                ],
                quiet(),
            ),
            vec![],
            FakeConnector::new(),
            10,
        );
        let opened = h.store.open(None, "owner", None, OpenMode::ResumeOrCreate).await.unwrap();
        h.store
            .append_and_persist(
                &opened.session.session_id,
                vec![ChatMessage::user("old question"), ChatMessage::assistant("old answer")],
            )
            .await
            .unwrap();
        let turn = h.prepare_in(opened.session.clone(), "new question").await;

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Completed(FinishReason::Stop));
        assert_eq!(h.provider.stream_calls(), 3);
        assert_eq!(deltas(&sink.frames().unwrap()), vec!["answer"]);

        let context = h.store.get_context(&opened.session.session_id).await;
        assert_eq!(context.len(), 3);
        assert_eq!(context[0].role, MessageRole::System);
        assert_eq!(context[1].text_content(), "new question");
    }

    #[tokio::test]
    async fn test_length_finish_truncates() {
        let h = harness(
            MockProvider::scripted(
                vec![MockStep::Length(vec!["partial".into()]), MockStep::text("summary")],
                quiet(),
            ),
            vec![],
            FakeConnector::new(),
            10,
        );
        let turn = h.prepare("write a novel").await;

        let (outcome, sink) = h.run(turn).await;

        assert_eq!(outcome.end, TurnEnd::Truncated);
        let frames = sink.frames().unwrap();
        assert_eq!(deltas(&frames), vec!["partial".to_string(), TRUNCATION_MESSAGE.to_string()]);
        assert!(matches!(
            frames.last(),
            Some(Frame::End { finish_reason: FinishReason::Length, .. })
        ));
    }

    #[tokio::test]
    async fn test_client_disconnect_still_cleans_up() {
        let (providers, connector) = three_providers();
        let h = harness(
            MockProvider::scripted(
                vec![MockStep::Text(vec!["a".into(), "b".into(), "c".into()])],
                quiet(),
            )
            .with_object(json!({"tool_names": ["list_flows"]})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("q").await;
        let sink = BufferSink::closing_after(2);

        let outcome = h.orchestrator.run(turn, Box::new(sink.clone())).await;

        assert_eq!(outcome.end, TurnEnd::Failed(ErrorClass::TransportClosed));
        assert_eq!(sink.lines().len(), 2);
        assert_eq!(h.connector.total_closes(), 2);
    }

    #[tokio::test]
    async fn test_every_close_attempted_when_one_fails() {
        let providers = vec![
            ToolProviderConfig::stdio("alpha", "a", vec![]),
            ToolProviderConfig::stdio("gamma", "g", vec![]),
        ];
        let connector = FakeConnector::new()
            .with_connection(FakeConnection::new("alpha", &["list_flows"]).failing_close())
            .with_connection(FakeConnection::new("gamma", &["search_docs"]));
        let h = harness(
            MockProvider::scripted(vec![MockStep::text("ok")], quiet())
                .with_object(json!({"tool_names": []})),
            providers,
            connector,
            10,
        );
        let turn = h.prepare("q").await;

        let (outcome, _) = h.run(turn).await;

        assert_eq!(outcome.close_failures, 1);
        assert_eq!(h.connector.connection("alpha").unwrap().close_count(), 1);
        assert_eq!(h.connector.connection("gamma").unwrap().close_count(), 1);
    }

    #[test]
    fn test_recursion_warning_text() {
        assert_eq!(
            recursion_warning(5),
            "Maximum recursion depth (5) reached. Terminating recursion."
        );
    }
}
