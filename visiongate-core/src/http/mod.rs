//! HTTP client module for making requests to AI backends
//!
//! This module implements the HTTP layer shared by every adapter, handling:
//! - Connection pooling and client management
//! - Fixed per-call-kind timeouts
//! - Error mapping from status codes and error bodies
//! - Request ID generation and correlation

pub mod client;
pub mod error;

pub use client::HttpClient;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Type of API call being made
///
/// Timeouts are fixed per kind and are not caller-tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Model listing or credential verification
    ListModels,
    /// Generation against a hosted backend
    HostedGeneration,
    /// Generation against a locally served model
    LocalGeneration,
}

impl CallKind {
    /// Timeout applied to a call of this kind
    pub fn timeout(&self) -> Duration {
        match self {
            CallKind::ListModels => Duration::from_secs(5),
            CallKind::HostedGeneration => Duration::from_secs(120),
            CallKind::LocalGeneration => Duration::from_secs(180),
        }
    }
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Type of API call
    pub call_kind: CallKind,

    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(call_kind: CallKind) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
            timeout: call_kind.timeout(),
        }
    }

    /// Reuse an existing request ID (fallback attempts share the caller's ID)
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}
