//! Context-history summarization
//!
//! When a conversation outgrows the model's context window, the tool-bearing
//! context view is collapsed into a single system message. A trailing user
//! message is kept verbatim so the pending question survives.

use std::sync::Arc;

use crate::logging::Logger;
use crate::providers::{Provider, ProviderModelConfig, ProviderResult, StreamChatOptions};
use crate::types::{ChatMessage, MessageRole, ModelSettings};
use crate::{log_debug, log_error, log_warn};

use super::error::SessionResult;
use super::store::SessionStore;

/// Leading text of every summary message
pub const SUMMARY_PREFIX: &str = "The following is a summary of the previous conversation: ";

const SUMMARY_INSTRUCTIONS: &str = "You are an expert at creating extremely concise conversation summaries. \
Focus only on the most important information, decisions, and context. \
Omit pleasantries, redundant information, and unnecessary details. \
Keep the summary as brief as possible while preserving all critical information.";

/// Collapses long histories into a summary message
pub struct HistorySummarizer {
    provider: Arc<dyn Provider>,
    max_tokens: u32,
    max_interactions: usize,
    logger: Arc<dyn Logger>,
}

impl HistorySummarizer {
    pub fn new(provider: Arc<dyn Provider>, logger: Arc<dyn Logger>) -> Self {
        Self {
            provider,
            max_tokens: 2000,
            max_interactions: 10,
            logger,
        }
    }

    /// Token budget for the summary when the model settings set none
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// User interactions kept when retrying on a shortened history
    pub fn with_max_interactions(mut self, max_interactions: usize) -> Self {
        self.max_interactions = max_interactions.max(1);
        self
    }

    /// Summarize `messages`, or return them unchanged if that fails
    pub async fn summarize(
        &self,
        messages: &[ChatMessage],
        model: &ProviderModelConfig,
        settings: &ModelSettings,
    ) -> Vec<ChatMessage> {
        let trailing_user = messages.last().filter(|m| m.role == MessageRole::User);
        let to_summarize = match trailing_user {
            Some(_) => &messages[..messages.len() - 1],
            None => messages,
        };
        if to_summarize.is_empty() {
            return messages.to_vec();
        }

        let summary = match self.request(to_summarize, model, settings).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log_warn!(
                    self.logger,
                    "[HistorySummarizer] Summary failed ({}), retrying on the last {} interactions",
                    e,
                    self.max_interactions
                );
                let shortened = last_interactions(to_summarize, self.max_interactions);
                self.request(shortened, model, settings).await
            }
        };

        match summary {
            Ok(summary) => {
                log_debug!(self.logger, "[HistorySummarizer] Chat history summarized");
                let mut result = vec![summary];
                result.extend(trailing_user.cloned());
                result
            }
            Err(e) => {
                log_error!(
                    self.logger,
                    "[HistorySummarizer] Failed to summarize chat history: {}",
                    e
                );
                messages.to_vec()
            }
        }
    }

    /// Summarize a session's context view and store the result
    ///
    /// The model runs without the session lock held. Only the snapshot it
    /// summarized is replaced, so messages appended meanwhile survive. Returns
    /// the stored context afterwards.
    pub async fn summarize_session(
        &self,
        store: &SessionStore,
        session_id: &str,
        model: &ProviderModelConfig,
        settings: &ModelSettings,
    ) -> SessionResult<Vec<ChatMessage>> {
        let context = store.get_context(session_id).await;
        let summarized = self.summarize(&context, model, settings).await;
        if summarized == context {
            return Ok(context);
        }

        match store
            .replace_context_prefix(session_id, &context, summarized)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                log_warn!(
                    self.logger,
                    "[HistorySummarizer] Context of {} was rewritten meanwhile, summary dropped",
                    session_id
                );
                Ok(store.get_context(session_id).await)
            }
        }
    }

    async fn request(
        &self,
        messages: &[ChatMessage],
        model: &ProviderModelConfig,
        settings: &ModelSettings,
    ) -> ProviderResult<ChatMessage> {
        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(ChatMessage::system(SUMMARY_INSTRUCTIONS));
        prompt.extend(messages.iter().cloned());

        let options = StreamChatOptions::from_settings(settings)
            .with_max_tokens(settings.max_tokens.unwrap_or(self.max_tokens));
        let text = self.provider.generate_text(prompt, model.clone(), options).await?;
        Ok(ChatMessage::system(format!("{}{}", SUMMARY_PREFIX, text)))
    }
}

/// Suffix of `messages` holding at most `max` user messages
fn last_interactions(messages: &[ChatMessage], max: usize) -> &[ChatMessage] {
    let mut users = 0;
    for (i, message) in messages.iter().enumerate().rev() {
        if message.role == MessageRole::User {
            users += 1;
            if users == max {
                return &messages[i..];
            }
        }
    }
    messages
}
