//! Provider error types

use thiserror::Error;

/// Errors that can occur during provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Missing API key
    #[error("API key is required for {provider}")]
    MissingApiKey { provider: String },

    /// API request failed
    #[error("{provider} API error ({status}): {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Prompt no longer fits the model's context window
    #[error("{provider} context length exceeded: {message}")]
    ContextLengthExceeded { provider: String, message: String },

    /// Network/HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stream ended unexpectedly
    #[error("Stream ended unexpectedly")]
    StreamEnded,

    /// Invalid response from provider
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Rate limited
    #[error("{provider} rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Phrases vendors use when a request overflows the context window
const CONTEXT_LENGTH_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "context window",
    "prompt is too long",
    "too many tokens",
];

impl ProviderError {
    /// Create an API error
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        if is_context_length_message(&message) {
            return Self::ContextLengthExceeded { provider, message };
        }
        Self::ApiError {
            provider,
            status,
            message,
        }
    }

    /// Create a missing API key error
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rate limited error
    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the request failed because the prompt overflowed the context window
    pub fn is_context_length_exceeded(&self) -> bool {
        match self {
            Self::ContextLengthExceeded { .. } => true,
            Self::ApiError { message, .. } | Self::Other(message) => {
                is_context_length_message(message)
            }
            _ => false,
        }
    }
}

fn is_context_length_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_LENGTH_MARKERS.iter().any(|m| lower.contains(m))
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_detects_context_overflow() {
        let err = ProviderError::api_error(
            "openai",
            400,
            "This model's maximum context length is 8192 tokens",
        );
        assert!(matches!(err, ProviderError::ContextLengthExceeded { .. }));
        assert!(err.is_context_length_exceeded());
    }

    #[test]
    fn test_plain_api_error() {
        let err = ProviderError::api_error("openai", 500, "upstream exploded");
        assert!(matches!(err, ProviderError::ApiError { status: 500, .. }));
        assert!(!err.is_context_length_exceeded());
        assert_eq!(err.to_string(), "openai API error (500): upstream exploded");
    }

    #[test]
    fn test_other_error_classified_by_text() {
        let error = ProviderError::Other("Context_Length_Exceeded".into());
        assert!(error.is_context_length_exceeded());
        assert!(!ProviderError::StreamEnded.is_context_length_exceeded());
    }
}
