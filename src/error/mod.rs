//! Error types for avatar-voice.

pub mod unified;

pub use unified::{ErrorCategory, ErrorDetails, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all avatar-voice operations.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Playback buffer full")]
    QuotaExceeded,

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl VoiceError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            source: None,
            details: None,
        }
    }

    /// Create an API error with structured details.
    pub fn api_with_details(
        status: u16,
        message: impl Into<String>,
        details: ErrorDetails,
    ) -> Self {
        Self::Api {
            status,
            message: message.into(),
            source: None,
            details: Some(details),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Stream(_) => ErrorCategory::Network,
            Self::MalformedPayload(_) => ErrorCategory::MalformedPayload,
            Self::QuotaExceeded => ErrorCategory::ResourceExhausted,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } | Self::UnknownTool(_) => ErrorCategory::ToolExecution,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::ResourceExhausted
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server
            | ErrorCategory::ResourceExhausted => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Transport => RecoverySuggestion::Reconnect,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::MalformedPayload => RecoverySuggestion::Ignore,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_maps_to_category() {
        assert_eq!(
            VoiceError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(VoiceError::api(429, "slow").category(), ErrorCategory::RateLimit);
        assert_eq!(VoiceError::api(503, "down").category(), ErrorCategory::Server);
        assert_eq!(VoiceError::api(400, "bad").category(), ErrorCategory::Api);
    }

    #[test]
    fn quota_exceeded_is_retryable_resource_exhaustion() {
        let error = VoiceError::QuotaExceeded;
        assert_eq!(error.category(), ErrorCategory::ResourceExhausted);
        assert!(error.is_retryable());
        assert_eq!(error.recovery_suggestion(), RecoverySuggestion::RetryWithBackoff);
    }

    #[test]
    fn tool_errors_are_not_retryable() {
        let error = VoiceError::UnknownTool("get_weather".into());
        assert_eq!(error.category(), ErrorCategory::ToolExecution);
        assert!(!error.is_retryable());
    }

    #[test]
    fn transport_errors_suggest_reconnect() {
        let error = VoiceError::Transport("reset by peer".into());
        assert_eq!(error.recovery_suggestion(), RecoverySuggestion::Reconnect);
    }
}
