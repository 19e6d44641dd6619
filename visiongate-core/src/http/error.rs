//! HTTP error mapping utilities

use crate::providers::error::AdapterError;
use reqwest::StatusCode;
use serde_json::Value;

/// Map HTTP status code and response body to an AdapterError
pub fn map_http_error(status: StatusCode, body: Option<String>) -> AdapterError {
    // Try to parse error details from response body
    let error_message = body
        .as_ref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::unauthorized(error_message)
        }

        StatusCode::NOT_FOUND => AdapterError::model_unavailable(error_message),

        StatusCode::PAYLOAD_TOO_LARGE => AdapterError::payload_too_large(error_message),

        StatusCode::BAD_REQUEST if mentions_size_limit(&error_message) => {
            AdapterError::payload_too_large(error_message)
        }

        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AdapterError::malformed(error_message)
        }

        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AdapterError::network(error_message)
        }

        status if status.is_server_error() => AdapterError::network(error_message),

        _ => AdapterError::malformed(error_message),
    };

    error.with_status(status.as_u16())
}

/// Whether a rejection message is about request or image size
fn mentions_size_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("too large")
        || lower.contains("exceeds")
        || lower.contains("maximum allowed size")
}

/// Extract an error message from the JSON shapes the backends use
fn extract_error_message(json: &Value) -> Option<String> {
    // Completions / messages / generative: { "error": { "message": "..." } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
        // Local model server: { "error": "..." }
        if let Some(message) = error.as_str() {
            return Some(message.to_string());
        }
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(|message| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::error::ErrorKind;
    use test_case::test_case;

    #[test_case(401, ErrorKind::Unauthorized; "unauthorized")]
    #[test_case(403, ErrorKind::Unauthorized; "forbidden")]
    #[test_case(404, ErrorKind::ModelUnavailable; "not found")]
    #[test_case(413, ErrorKind::PayloadTooLarge; "payload too large")]
    #[test_case(400, ErrorKind::Malformed; "bad request")]
    #[test_case(429, ErrorKind::Network; "rate limited")]
    #[test_case(503, ErrorKind::Network; "unavailable")]
    fn test_status_mapping(status: u16, expected: ErrorKind) {
        let status = StatusCode::from_u16(status).unwrap();
        let error = map_http_error(status, None);
        assert_eq!(error.kind, expected);
        assert_eq!(error.status, Some(status.as_u16()));
    }

    #[test]
    fn test_nested_error_message() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"model 'gpt-x' does not exist"}}"#;
        let error = map_http_error(StatusCode::NOT_FOUND, Some(body.to_string()));
        assert_eq!(error.detail, "model 'gpt-x' does not exist");
    }

    #[test]
    fn test_flat_error_message() {
        let body = r#"{"error":"model \"llava\" not found, try pulling it first"}"#;
        let error = map_http_error(StatusCode::NOT_FOUND, Some(body.to_string()));
        assert_eq!(error.detail, "model \"llava\" not found, try pulling it first");
    }

    #[test]
    fn test_oversized_bad_request() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"image exceeds 5 MB maximum"}}"#;
        let error = map_http_error(StatusCode::BAD_REQUEST, Some(body.to_string()));
        assert_eq!(error.kind, ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn test_plain_text_body() {
        let error = map_http_error(StatusCode::BAD_GATEWAY, Some("upstream down".to_string()));
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.detail, "upstream down");
    }
}
