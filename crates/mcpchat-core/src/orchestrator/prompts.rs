//! System prompt assembly
//!
//! The prompt is a base text followed by one fragment per provider group that
//! survived tool selection. Each file is fetched from the remote base URL when
//! one is configured, then read from the prompt directory, and otherwise the
//! built-in base prompt is used.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PromptSettings;
use crate::logging::Logger;
use crate::{log_debug, log_error, log_warn};

/// Appended when a turn runs without tools
pub const NO_TOOLS_DISCLAIMER: &str = "MCP tools are not available in this chat. Do not claim access or simulate responses from them under any circumstance.";

/// Base prompt used when no prompt file can be loaded
pub const BUILTIN_BASE_PROMPT: &str = "You are a helpful assistant for cloud operations. \
Answer concisely. When tools are available, use them to look up facts instead of guessing, \
and summarize tool results for the user rather than repeating them verbatim.";

/// Append the no-tools disclaimer to a prompt
pub fn with_disclaimer(prompt: &str) -> String {
    if prompt.is_empty() {
        NO_TOOLS_DISCLAIMER.to_string()
    } else {
        format!("{}\n\n{}", prompt, NO_TOOLS_DISCLAIMER)
    }
}

/// Loads prompt text from the configured sources
pub struct PromptLibrary {
    settings: PromptSettings,
    http: reqwest::Client,
    logger: Arc<dyn Logger>,
}

impl PromptLibrary {
    pub fn new(settings: PromptSettings, logger: Arc<dyn Logger>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            settings,
            http,
            logger,
        }
    }

    /// Library with no files; always yields the built-in base prompt
    pub fn builtin(logger: Arc<dyn Logger>) -> Self {
        Self::new(PromptSettings::default(), logger)
    }

    /// Base prompt plus fragments for the given provider tags, in tag order
    pub async fn system_prompt(&self, provider_tags: &BTreeSet<String>) -> String {
        let mut parts = vec![self
            .load(&self.settings.base_file)
            .await
            .unwrap_or_else(|| BUILTIN_BASE_PROMPT.to_string())];

        for tag in provider_tags {
            let Some(file) = self.settings.fragments.get(tag) else {
                continue;
            };
            match self.load(file).await {
                Some(fragment) => parts.push(fragment),
                None => log_warn!(
                    self.logger,
                    "[PromptLibrary] Prompt fragment {} for {} not found",
                    file,
                    tag
                ),
            }
        }

        parts.join("\n\n")
    }

    async fn load(&self, file: &str) -> Option<String> {
        if let Some(base) = &self.settings.remote_base_url {
            if let Some(text) = self.load_remote(base, file).await {
                return Some(text);
            }
        }
        self.load_local(file).await
    }

    async fn load_remote(&self, base: &str, file: &str) -> Option<String> {
        let slash = if base.ends_with('/') { "" } else { "/" };
        let url = format!("{}{}{}", base, slash, file);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.logger
                    .error(&format!("[PromptLibrary] Failed to fetch prompt {}: {}", url, e));
                return None;
            }
        };
        if !response.status().is_success() {
            log_error!(
                self.logger,
                "[PromptLibrary] Failed to fetch prompt {}: {}",
                url,
                response.status()
            );
            return None;
        }
        match response.text().await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                self.logger
                    .error(&format!("[PromptLibrary] Failed to read prompt {}: {}", url, e));
                None
            }
        }
    }

    async fn load_local(&self, file: &str) -> Option<String> {
        let dir = self.settings.dir.as_ref()?;
        match tokio::fs::read_to_string(dir.join(file)).await {
            Ok(text) => Some(text),
            Err(e) => {
                log_debug!(self.logger, "[PromptLibrary] No local prompt {}: {}", file, e);
                None
            }
        }
    }
}
