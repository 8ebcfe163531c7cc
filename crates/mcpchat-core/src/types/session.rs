//! Chat session identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields that pin a session to a place in a workflow
///
/// Two `open` calls with the same owner and the same scope resolve to the same
/// session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScope {
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

impl SessionScope {
    pub fn workflow(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Default::default()
        }
    }

    pub fn with_block(mut self, block_name: impl Into<String>) -> Self {
        self.block_name = Some(block_name.into());
        self
    }

    pub fn with_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    pub fn with_action(mut self, action_name: impl Into<String>) -> Self {
        self.action_name = Some(action_name.into());
        self
    }

    /// Deterministic session id for this owner and scope
    pub fn derive_session_id(&self, owner_id: &str) -> String {
        let key = [
            owner_id,
            self.workflow_id.as_str(),
            self.block_name.as_deref().unwrap_or(""),
            self.step_name.as_deref().unwrap_or(""),
            self.action_name.as_deref().unwrap_or(""),
        ]
        .join(":");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }
}

/// A resolved chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    pub owner_id: String,
    /// Scope the session was opened with, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_metadata: Option<SessionScope>,
    pub expires_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_id_is_stable() {
        let scope = SessionScope::workflow("w1").with_block("b1").with_step("s1");
        assert_eq!(scope.derive_session_id("owner"), scope.derive_session_id("owner"));
        assert!(Uuid::parse_str(&scope.derive_session_id("owner")).is_ok());
    }

    #[test]
    fn test_derived_id_depends_on_owner_and_scope() {
        let scope = SessionScope::workflow("w1");
        assert_ne!(scope.derive_session_id("a"), scope.derive_session_id("b"));
        assert_ne!(
            scope.derive_session_id("a"),
            SessionScope::workflow("w2").derive_session_id("a")
        );
        assert_ne!(
            scope.derive_session_id("a"),
            scope.clone().with_action("act").derive_session_id("a")
        );
    }

    #[test]
    fn test_scope_deserializes_camel_case() {
        let scope: SessionScope =
            serde_json::from_str(r#"{"workflowId":"w1","blockName":"b"}"#).unwrap();
        assert_eq!(scope, SessionScope::workflow("w1").with_block("b"));
    }
}
