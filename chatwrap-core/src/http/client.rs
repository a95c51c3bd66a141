//! HTTP client implementation using reqwest

use crate::http::error::{map_http_error, map_reqwest_error, parse_retry_after};
use crate::http::{Authorization, RequestOptions, REQUEST_ID_HEADER};
use crate::providers::error::TransportError;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("chatwrap/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed exchange, whatever the status
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: String,
    pub request_id: Uuid,
}

impl RawReply {
    /// Decode a successful JSON body, or map the failure status
    pub fn json<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        if !self.status.is_success() {
            warn!(
                "Request failed with status {} [request_id: {}]",
                self.status, self.request_id
            );
            return Err(map_http_error(
                self.status,
                self.retry_after,
                Some(self.body),
                self.request_id,
            ));
        }

        serde_json::from_str(&self.body).map_err(|e| {
            error!(
                "Failed to parse response [request_id: {}]: {}",
                self.request_id, e
            );
            TransportError::MalformedResponse(format!(
                "Invalid response format: {} [request_id: {}]",
                e, self.request_id
            ))
        })
    }
}

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client without a default request timeout
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(Duration::from_secs(10), None)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Issue a GET and return the reply regardless of status
    pub async fn get_raw(
        &self,
        url: &str,
        auth: &Authorization,
        options: RequestOptions,
    ) -> Result<RawReply, TransportError> {
        debug!("GET {} [request_id: {}]", url, options.request_id);
        let builder = self.client.get(url);
        self.execute(builder, auth, &options).await
    }

    /// Issue a GET and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: &Authorization,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        self.get_raw(url, auth, options).await?.json()
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        auth: &Authorization,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {} [request_id: {}]", url, options.request_id);
        let builder = self.client.post(url).json(body);
        self.execute(builder, auth, &options).await?.json()
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        auth: &Authorization,
        options: &RequestOptions,
    ) -> Result<RawReply, TransportError> {
        let request_id = options.request_id;

        let mut builder = builder.header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(value) = auth.header_value() {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Request timeout [request_id: {}]", request_id);
            } else {
                error!("Request error [request_id: {}]: {}", request_id, e);
            }
            map_reqwest_error(&e, request_id)
        })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        self.check_content_length(&response, request_id)?;

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e, request_id))?;

        // Check response size after reading
        if body.len() > self.max_response_size {
            return Err(self.too_large(body.len(), request_id));
        }

        Ok(RawReply {
            status,
            retry_after,
            body,
            request_id,
        })
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response, request_id: Uuid) -> Result<(), TransportError> {
        match response.content_length() {
            Some(length) if length as usize > self.max_response_size => {
                Err(self.too_large(length as usize, request_id))
            }
            _ => Ok(()),
        }
    }

    fn too_large(&self, size: usize, request_id: Uuid) -> TransportError {
        TransportError::MalformedResponse(format!(
            "Response size {} exceeds maximum {} [request_id: {}]",
            size, self.max_response_size, request_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, body: &str) -> RawReply {
        RawReply {
            status: StatusCode::from_u16(status).unwrap(),
            retry_after: None,
            body: body.to_string(),
            request_id: Uuid::nil(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(HttpClient::new().is_ok());
        assert!(HttpClient::with_config(Duration::from_secs(1), Some(Duration::from_secs(60))).is_ok());
    }

    #[test]
    fn test_reply_decodes_success_body() {
        let value: serde_json::Value = reply(200, r#"{"ok": true}"#).json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_reply_maps_failure_status() {
        let err = reply(503, "").json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, TransportError::ServiceUnavailable { status: 503, .. }));
    }

    #[test]
    fn test_reply_rejects_invalid_json() {
        let err = reply(200, "{ invalid json }").json::<serde_json::Value>().unwrap_err();
        match err {
            TransportError::MalformedResponse(message) => {
                assert!(message.contains("Invalid response format"))
            }
            other => panic!("Expected MalformedResponse, got {other:?}"),
        }
    }
}
