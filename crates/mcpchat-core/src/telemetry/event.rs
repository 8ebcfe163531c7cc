//! Telemetry events

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A turn was accepted and streaming began
pub const MESSAGE_SEND_EVENT: &str = "ai_chat_message_send";

/// A turn failed after streaming began
pub const FAILURE_EVENT: &str = "ai_chat_failure";

/// Named event with string attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn message_send(session_id: &str, owner_id: &str, provider: &str) -> Self {
        Self::new(MESSAGE_SEND_EVENT)
            .with("chatId", session_id)
            .with("userId", owner_id)
            .with("provider", provider)
    }

    pub fn failure(
        session_id: &str,
        owner_id: &str,
        provider: &str,
        model: &str,
        error_class: &str,
        error_message: &str,
    ) -> Self {
        Self::new(FAILURE_EVENT)
            .with("chatId", session_id)
            .with("userId", owner_id)
            .with("provider", provider)
            .with("model", model)
            .with("errorClass", error_class)
            .with("errorMessage", error_message)
    }
}
