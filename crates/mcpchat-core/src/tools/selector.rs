//! Model-driven tool selection
//!
//! Large catalogs are narrowed to the tools relevant to the conversation by
//! one structured-generation call. Names the model invents are dropped and the
//! result is capped in catalog order. Providers marked always-on are added
//! back afterwards regardless of what the model picked.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::logging::Logger;
use crate::providers::{ObjectSchema, Provider, ProviderError, ProviderModelConfig};
use crate::types::{ChatMessage, ToolDescriptor};
use crate::{log_info, log_warn};

const SELECTION_INSTRUCTIONS: &str = "Given the following conversation history and the list of available tools, select the tools that are most relevant to answer the user's request. Return an array of tool names.";

/// Default cap on selected tools
pub const DEFAULT_MAX_SELECTED_TOOLS: usize = 128;

/// Tool selection errors
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Tool selection request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool selection returned an unexpected shape: {0}")]
    InvalidResponse(String),
}

pub type SelectionResult<T> = Result<T, SelectionError>;

#[derive(Debug, Deserialize)]
struct Selection {
    #[serde(default)]
    tool_names: Vec<String>,
}

/// Picks a bounded, relevant subset of a tool catalog
pub struct ToolSelector {
    provider: Arc<dyn Provider>,
    max_selected: usize,
    always_on: HashSet<String>,
    logger: Arc<dyn Logger>,
}

impl ToolSelector {
    pub fn new(provider: Arc<dyn Provider>, logger: Arc<dyn Logger>) -> Self {
        Self {
            provider,
            max_selected: DEFAULT_MAX_SELECTED_TOOLS,
            always_on: HashSet::new(),
            logger,
        }
    }

    pub fn with_max_selected(mut self, max_selected: usize) -> Self {
        self.max_selected = max_selected;
        self
    }

    /// Provider tags whose tools are kept whatever the model chooses
    pub fn with_always_on(mut self, tags: HashSet<String>) -> Self {
        self.always_on = tags;
        self
    }

    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "tool_selection",
            json!({
                "type": "object",
                "properties": {
                    "tool_names": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["tool_names"],
                "additionalProperties": false
            }),
        )
    }

    fn prompt(catalog: &[ToolDescriptor]) -> String {
        let listing = catalog
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nTools:\n{}", SELECTION_INSTRUCTIONS, listing)
    }

    /// Select the tools relevant to `history`
    ///
    /// An empty catalog returns immediately without calling the model.
    pub async fn select(
        &self,
        history: &[ChatMessage],
        catalog: &[ToolDescriptor],
        model: &ProviderModelConfig,
    ) -> SelectionResult<Vec<ToolDescriptor>> {
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(Self::prompt(catalog)));
        messages.extend(history.iter().cloned());

        let value = self
            .provider
            .generate_object(messages, model.clone(), Self::schema())
            .await?;
        let selection: Selection = serde_json::from_value(value)
            .map_err(|e| SelectionError::InvalidResponse(e.to_string()))?;

        let chosen: HashSet<&str> = selection.tool_names.iter().map(String::as_str).collect();
        let known: HashSet<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        let invented: Vec<&str> = chosen.difference(&known).copied().collect();
        if !invented.is_empty() {
            log_warn!(
                self.logger,
                "[ToolSelector] Ignoring unknown tools: {}",
                invented.join(", ")
            );
        }

        let mut selected: Vec<ToolDescriptor> = catalog
            .iter()
            .filter(|t| chosen.contains(t.name.as_str()))
            .take(self.max_selected)
            .cloned()
            .collect();

        let picked: HashSet<String> = selected.iter().map(|t| t.name.clone()).collect();
        selected.extend(
            catalog
                .iter()
                .filter(|t| self.always_on.contains(&t.provider_tag) && !picked.contains(&t.name))
                .cloned(),
        );

        log_info!(
            self.logger,
            "[ToolSelector] Selected {} of {} tools",
            selected.len(),
            catalog.len()
        );
        Ok(selected)
    }
}
