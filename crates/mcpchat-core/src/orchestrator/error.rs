//! Turn and service errors

use thiserror::Error;

use crate::providers::ProviderError;
use crate::session::SessionError;
use crate::stream::FrameError;

/// Failures inside a running turn, after the start frame
///
/// These never reach the caller as errors; they end the stream in-band.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{0}")]
    Generation(#[from] ProviderError),

    #[error("{0}")]
    Frame(#[from] FrameError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced before streaming begins
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No chat session found for the provided id: {0}")]
    NotFound(String),

    #[error("Chat session is busy: {0}")]
    LockTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::NotFound(_) => 400,
            ChatError::LockTimeout(_) | ChatError::Internal(_) => 500,
        }
    }
}

impl From<SessionError> for ChatError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ChatError::NotFound(id),
            e @ SessionError::LockTimeout { .. } => ChatError::LockTimeout(e.to_string()),
            e => ChatError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_status() {
        let not_found: ChatError = SessionError::NotFound("c1".into()).into();
        assert_eq!(not_found.status_code(), 400);
        assert!(not_found.to_string().contains("c1"));

        let busy: ChatError = SessionError::LockTimeout {
            key: "lock:chat:c1".into(),
            timeout_ms: 10,
        }
        .into();
        assert!(matches!(busy, ChatError::LockTimeout(_)));
        assert_eq!(busy.status_code(), 500);

        let store: ChatError = SessionError::Store("down".into()).into();
        assert_eq!(store.status_code(), 500);
    }
}
