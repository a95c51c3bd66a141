//! HTTP error mapping utilities

use crate::providers::error::TransportError;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Map an HTTP status code and response body to a TransportError
pub fn map_http_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: Option<String>,
    request_id: Uuid,
) -> TransportError {
    // Try to parse error details from response body
    let error_details = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v));

    let error_message = error_details
        .as_ref()
        .map(|d| d.message.clone())
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let message = format!("{} [request_id: {}]", error_message, request_id);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized(message),

        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimit {
            message,
            retry_after: retry_after.or_else(|| {
                error_details
                    .and_then(|d| d.retry_after_seconds)
                    .map(Duration::from_secs)
            }),
        },

        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TransportError::Timeout(message),

        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            TransportError::ServiceUnavailable {
                status: status.as_u16(),
                message,
            }
        }

        status if status.is_server_error() => TransportError::Api {
            status: status.as_u16(),
            message,
        },

        status => TransportError::InvalidRequest {
            status: status.as_u16(),
            message,
        },
    }
}

/// Map a reqwest failure that produced no usable status
pub fn map_reqwest_error(err: &reqwest::Error, request_id: Uuid) -> TransportError {
    let message = format!("{} [request_id: {}]", err, request_id);
    if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_decode() {
        TransportError::MalformedResponse(message)
    } else {
        TransportError::Connection(message)
    }
}

/// Error details extracted from response body
struct ErrorDetails {
    message: String,
    retry_after_seconds: Option<u64>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI format: { "error": { "message": "...", "type": "...", "code": "..." } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after_seconds: error.get("retry_after").and_then(|v| v.as_u64()),
            });
        }
    }

    // Generic format: { "message": "...", "error": "..." }
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: message.to_string(),
            retry_after_seconds: json.get("retry_after").and_then(|v| v.as_u64()),
        });
    }

    // Text-generation inference format: { "error": "...", "error_type": "..." }
    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: error.to_string(),
            retry_after_seconds: None,
        });
    }

    None
}

/// Parse Retry-After header value
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    // Only the delay-seconds form; HTTP dates are ignored
    header_value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::nil()
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_http_error(StatusCode::UNAUTHORIZED, None, None, id()),
            TransportError::Unauthorized(_)
        ));
        assert!(matches!(
            map_http_error(StatusCode::TOO_MANY_REQUESTS, None, None, id()),
            TransportError::RateLimit { .. }
        ));
        assert!(matches!(
            map_http_error(StatusCode::GATEWAY_TIMEOUT, None, None, id()),
            TransportError::Timeout(_)
        ));
        assert!(matches!(
            map_http_error(StatusCode::SERVICE_UNAVAILABLE, None, None, id()),
            TransportError::ServiceUnavailable { status: 503, .. }
        ));
        assert!(matches!(
            map_http_error(StatusCode::INTERNAL_SERVER_ERROR, None, None, id()),
            TransportError::Api { status: 500, .. }
        ));
        assert!(matches!(
            map_http_error(StatusCode::NOT_FOUND, None, None, id()),
            TransportError::InvalidRequest { status: 404, .. }
        ));
    }

    #[test]
    fn test_message_extracted_from_openai_body() {
        let body = r#"{"error": {"message": "Rate limit reached", "retry_after": 7}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, None, Some(body.into()), id());
        match err {
            TransportError::RateLimit {
                message,
                retry_after,
            } => {
                assert!(message.starts_with("Rate limit reached [request_id: "));
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("Expected RateLimit, got {other:?}"),
        }
    }

    #[test]
    fn test_header_retry_after_wins() {
        let body = r#"{"error": {"message": "slow down", "retry_after": 7}}"#;
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            Some(body.into()),
            id(),
        );
        assert!(matches!(
            err,
            TransportError::RateLimit { retry_after: Some(d), .. } if d == Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_plain_error_string_body() {
        let body = r#"{"error": "Model is overloaded", "error_type": "overloaded"}"#;
        let err = map_http_error(StatusCode::SERVICE_UNAVAILABLE, None, Some(body.into()), id());
        assert!(err.to_string().contains("Model is overloaded"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
