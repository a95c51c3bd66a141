//! HTTP layer shared by every backend transport
//!
//! This module handles:
//! - Connection pooling and client management
//! - Authorization headers for the different backends
//! - Error mapping from status codes and transport failures
//! - Request ID generation and correlation

pub mod client;
pub mod error;

pub use client::{HttpClient, RawReply};

use crate::config::SecretString;
use std::time::Duration;
use uuid::Uuid;

/// Header carrying the correlation id of each request
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// How a request authenticates itself
#[derive(Debug, Clone)]
pub enum Authorization {
    /// `Authorization: Bearer <token>`
    Bearer(SecretString),
    /// `Authorization: Key <key>`
    Key(SecretString),
    /// No credentials
    None,
}

impl Authorization {
    /// Value of the `Authorization` header, if any
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            Authorization::Bearer(token) => Some(format!("Bearer {}", token.expose_secret())),
            Authorization::Key(key) => Some(format!("Key {}", key.expose_secret())),
            Authorization::None => None,
        }
    }
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout; `None` leaves the client default in place
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header_values() {
        let bearer = Authorization::Bearer(SecretString::new("tok"));
        assert_eq!(bearer.header_value().as_deref(), Some("Bearer tok"));

        let key = Authorization::Key(SecretString::new("k"));
        assert_eq!(key.header_value().as_deref(), Some("Key k"));

        assert!(Authorization::None.header_value().is_none());
    }

    #[test]
    fn test_request_options() {
        let options = RequestOptions::new();
        assert!(options.timeout.is_none());
        assert_ne!(options.request_id, RequestOptions::new().request_id);

        let options = options.with_timeout(Duration::from_secs(60));
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
    }
}
