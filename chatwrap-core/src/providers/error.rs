//! Backend error types and handling

use crate::protocol::MessageError;
use crate::providers::format::PromptFormatError;
use crate::providers::health::EndpointState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Raw failure of a single network exchange, before any classification
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Upstream answered 502/503
    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Any other server-side failure
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Connection could not be established or was dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request was rejected as malformed (4xx, or 0 when refused before sending)
    #[error("Invalid request ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    /// Response arrived but could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Coarse category of a [`TransportError`], used by allow-lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    RateLimit,
    ServiceUnavailable,
    Api,
    Connection,
    Unauthorized,
    InvalidRequest,
    MalformedResponse,
}

impl TransportErrorKind {
    /// Kinds retried by default on the commercial backend
    pub const RETRYABLE: [TransportErrorKind; 5] = [
        TransportErrorKind::Timeout,
        TransportErrorKind::RateLimit,
        TransportErrorKind::ServiceUnavailable,
        TransportErrorKind::Api,
        TransportErrorKind::Connection,
    ];
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Timeout(_) => TransportErrorKind::Timeout,
            Self::RateLimit { .. } => TransportErrorKind::RateLimit,
            Self::ServiceUnavailable { .. } => TransportErrorKind::ServiceUnavailable,
            Self::Api { .. } => TransportErrorKind::Api,
            Self::Connection(_) => TransportErrorKind::Connection,
            Self::Unauthorized(_) => TransportErrorKind::Unauthorized,
            Self::InvalidRequest { .. } => TransportErrorKind::InvalidRequest,
            Self::MalformedResponse(_) => TransportErrorKind::MalformedResponse,
        }
    }

    /// Whether the failure belongs to the default retryable class
    pub fn is_retryable(&self) -> bool {
        TransportErrorKind::RETRYABLE.contains(&self.kind())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::MalformedResponse(err.to_string())
    }
}

/// Typed outcome of a failed backend call
#[derive(Debug, Error)]
pub enum BackendError {
    /// Endpoint is cold or scaling up; try again later
    #[error("Model is loading (endpoint state: {state}), try again later")]
    Loading {
        state: EndpointState,
        #[source]
        source: TransportError,
    },

    /// Endpoint has been paused by its owner
    #[error("Endpoint is paused")]
    Disabled {
        #[source]
        source: TransportError,
    },

    /// Credentials rejected while setting up the backend
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Retry budget spent on retryable failures
    #[error("Maximum number of retries ({max_retries}) exceeded")]
    RetriesExhausted {
        max_retries: u32,
        #[source]
        last_error: TransportError,
    },

    /// Failure nobody could explain, passed through untouched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session shape not accepted by the prompt format
    #[error("Invalid session: {0}")]
    Validation(#[from] PromptFormatError),

    /// Message could not be built
    #[error("Invalid message: {0}")]
    Message(#[from] MessageError),

    /// Generation option has an unusable value
    #[error("Invalid generation parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// Prompt leaves no room for generated tokens
    #[error(
        "Prompt of ~{prompt_tokens} tokens does not fit the {context_length}-token context window"
    )]
    PromptTooLong {
        prompt_tokens: usize,
        context_length: usize,
    },

    /// Caller-supplied post-processing hook failed
    #[error("Post-processing failed: {0}")]
    PostProcess(#[source] anyhow::Error),

    /// Backend could not be built from its configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// What a user interface should do with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// Show a "please wait and retry" notice
    Wait,
    /// Show a blocking error
    Blocking,
    /// Show a generic failure; details belong in the log
    Failure,
}

impl BackendError {
    pub fn advisory(&self) -> Advisory {
        match self {
            Self::Loading { .. } => Advisory::Wait,
            Self::Disabled { .. } => Advisory::Blocking,
            _ => Advisory::Failure,
        }
    }

    /// The unclassified transport failure, if that is what this error is
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(TransportError::Timeout("slow".into()).is_retryable());
        assert!(TransportError::RateLimit {
            message: "slow down".into(),
            retry_after: None
        }
        .is_retryable());
        assert!(TransportError::Connection("reset".into()).is_retryable());
        assert!(!TransportError::Unauthorized("bad key".into()).is_retryable());
        assert!(!TransportError::InvalidRequest {
            status: 400,
            message: "nope".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_advisory_mapping() {
        let source = TransportError::Connection("refused".into());
        let loading = BackendError::Loading {
            state: EndpointState::ScaledToZero,
            source: source.clone(),
        };
        assert_eq!(loading.advisory(), Advisory::Wait);
        assert_eq!(
            BackendError::Disabled { source: source.clone() }.advisory(),
            Advisory::Blocking
        );
        assert_eq!(BackendError::Transport(source).advisory(), Advisory::Failure);
    }

    #[test]
    fn test_unclassified_error_displays_original_text() {
        let source = TransportError::Connection("refused".into());
        let err = BackendError::from(source.clone());
        assert_eq!(err.to_string(), source.to_string());
        assert_eq!(err.as_transport(), Some(&source));
    }

    #[test]
    fn test_exhausted_message_names_budget() {
        let err = BackendError::RetriesExhausted {
            max_retries: 10,
            last_error: TransportError::Timeout("slow".into()),
        };
        assert_eq!(err.to_string(), "Maximum number of retries (10) exceeded");
    }
}
