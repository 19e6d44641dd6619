//! Adapter error types and handling

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Classification of adapter failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or rejected credential
    Unauthorized,
    /// Model not found, not pulled, or endpoint not served
    ModelUnavailable,
    /// Request body or image exceeds the backend's hard limit
    PayloadTooLarge,
    /// Connection refused, reset, timed out, or transient upstream failure
    Network,
    /// Unexpected response shape or a request the backend refused to parse
    Malformed,
}

impl ErrorKind {
    /// Whether a fallback chain may try an alternate request shape
    pub fn allows_fallback(&self) -> bool {
        match self {
            Self::Malformed => true,
            Self::Network => true,
            Self::ModelUnavailable => true,
            Self::Unauthorized => false,
            Self::PayloadTooLarge => false,
        }
    }

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::ModelUnavailable => "model_unavailable",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Network => "network",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unauthorized => "Authentication failed",
            Self::ModelUnavailable => "Model unavailable",
            Self::PayloadTooLarge => "Payload too large",
            Self::Network => "Network error",
            Self::Malformed => "Malformed response",
        };
        f.write_str(text)
    }
}

/// Error raised by a provider adapter
///
/// Carries enough context (backend, model, cause) for the caller to render a
/// user-facing message.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub struct AdapterError {
    /// Failure classification
    pub kind: ErrorKind,

    /// Human-readable cause
    pub detail: String,

    /// Backend name (e.g. "completions")
    pub provider: String,

    /// Model the call targeted
    pub model: String,

    /// HTTP status when the failure came from a response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Models the backend reported as available, when known
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub available_models: Vec<String>,
}

impl AdapterError {
    /// Create a new error without backend context
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            provider: String::new(),
            model: String::new(),
            status: None,
            available_models: Vec::new(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, detail)
    }

    pub fn model_unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelUnavailable, detail)
    }

    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, detail)
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, detail)
    }

    /// Attach backend and model context
    pub fn with_context(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }

    /// Attach the HTTP status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the list of models the backend offers instead
    pub fn with_available_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Whether a fallback chain may try an alternate request shape
    pub fn allows_fallback(&self) -> bool {
        self.kind.allows_fallback()
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.provider.is_empty() {
            write!(f, "[{}", self.provider)?;
            if !self.model.is_empty() {
                write!(f, "/{}", self.model)?;
            }
            write!(f, "] ")?;
        }
        write!(f, "{}: {}", self.kind, self.detail)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        if !self.available_models.is_empty() {
            write!(f, "; available models: {}", self.available_models.join(", "))?;
        }
        Ok(())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::malformed(format!("Failed to parse response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        assert!(!ErrorKind::Unauthorized.allows_fallback());
        assert!(!ErrorKind::PayloadTooLarge.allows_fallback());
        assert!(ErrorKind::Malformed.allows_fallback());
        assert!(ErrorKind::Network.allows_fallback());
        assert!(ErrorKind::ModelUnavailable.allows_fallback());
    }

    #[test]
    fn test_display_includes_context() {
        let error = AdapterError::model_unavailable("model 'llava' not found")
            .with_context("local_model", "llava")
            .with_status(404)
            .with_available_models(vec!["llama3".into(), "qwen2.5vl".into()]);

        let rendered = error.to_string();
        assert_eq!(
            rendered,
            "[local_model/llava] Model unavailable: model 'llava' not found (HTTP 404); \
             available models: llama3, qwen2.5vl"
        );
    }

    #[test]
    fn test_display_without_context() {
        let error = AdapterError::unauthorized("no API key configured");
        assert_eq!(error.to_string(), "Authentication failed: no API key configured");
    }
}
