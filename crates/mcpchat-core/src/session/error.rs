//! Session storage errors

use thiserror::Error;

/// Errors from the session store and its substrates
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Chat session not found: {0}")]
    NotFound(String),

    #[error("Timed out after {timeout_ms}ms waiting for lock {key}")]
    LockTimeout { key: String, timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
