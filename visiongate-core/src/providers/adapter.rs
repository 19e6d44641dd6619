//! Provider adapter trait and capabilities
//!
//! Defines the core abstraction for AI backends. Backends form a closed set
//! (`ProviderKind`) mapped to adapter instances through `AdapterRegistry`, so
//! dispatch never goes through free-form provider strings.

use crate::config::ProviderConfig;
use crate::http::HttpClient;
use crate::imaging::MESSAGES_API_IMAGE_LIMIT;
use crate::protocol::Message;
use crate::providers::error::{AdapterError, AdapterResult};
use crate::providers::{CompletionsAdapter, GenerativeAdapter, LocalAdapter, MessagesAdapter};
use crate::streaming::FragmentStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Supported backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted completions-style API (`/chat/completions`)
    Completions,
    /// Hosted generative-content API (`:generateContent`)
    Generative,
    /// Locally served models (`/api/chat`, `/api/generate`)
    LocalModel,
    /// Hosted messages-style API (`/v1/messages`)
    MessagesApi,
}

impl ProviderKind {
    /// Every kind, in registry order
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Completions,
        ProviderKind::Generative,
        ProviderKind::LocalModel,
        ProviderKind::MessagesApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Completions => "completions",
            ProviderKind::Generative => "generative",
            ProviderKind::LocalModel => "local_model",
            ProviderKind::MessagesApi => "messages_api",
        }
    }

    /// Base URL used when the config does not override it
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Completions => "https://api.openai.com/v1",
            ProviderKind::Generative => "https://generativelanguage.googleapis.com",
            ProviderKind::LocalModel => "http://localhost:11434",
            ProviderKind::MessagesApi => "https://api.anthropic.com",
        }
    }

    /// Hard per-image limit imposed by the backend, if it has one
    pub fn default_max_image_bytes(&self) -> Option<usize> {
        match self {
            ProviderKind::MessagesApi => Some(MESSAGES_API_IMAGE_LIMIT),
            ProviderKind::Completions | ProviderKind::Generative | ProviderKind::LocalModel => {
                None
            }
        }
    }

    /// Whether calls need a credential
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::LocalModel)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider name that matches no `ProviderKind`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// What an adapter can do (hardcoded per backend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    /// Whether `stream` is implemented
    pub supports_streaming: bool,

    /// Hard per-image byte limit
    pub max_image_bytes: Option<usize>,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            supports_streaming: true,
            max_image_bytes: None,
        }
    }
}

/// Translation and transport for one backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which backend this adapter speaks to
    fn kind(&self) -> ProviderKind;

    /// Name used in logs and error context
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn capabilities(&self) -> &AdapterCapabilities;

    /// Send `messages` and wait for the whole answer
    async fn complete(&self, messages: &[Message], config: &ProviderConfig)
        -> AdapterResult<String>;

    /// Send `messages` and return the text deltas as they arrive
    async fn stream(
        &self,
        _messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<FragmentStream> {
        Err(AdapterError::malformed("streaming is not supported by this backend")
            .with_context(self.name(), &config.model))
    }

    /// Models the backend offers
    async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>>;

    /// Check credentials and connectivity
    async fn verify(&self, config: &ProviderConfig) -> AdapterResult<()> {
        self.list_models(config).await.map(|_| ())
    }
}

/// Lookup table from backend kind to adapter instance
///
/// Owned by the caller and passed to the gateway; adapters hold no
/// per-request state.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four HTTP adapters over one shared client
    pub fn with_defaults() -> AdapterResult<Self> {
        let http = HttpClient::new()?;
        let mut registry = Self::new();
        registry.register(Arc::new(CompletionsAdapter::new(http.clone())));
        registry.register(Arc::new(GenerativeAdapter::new(http.clone())));
        registry.register(Arc::new(LocalAdapter::new(http.clone())));
        registry.register(Arc::new(MessagesAdapter::new(http)));
        Ok(registry)
    }

    /// Add or replace the adapter for its kind
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Adapter for `kind`
    pub fn get(&self, kind: ProviderKind) -> AdapterResult<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned().ok_or_else(|| {
            AdapterError::model_unavailable(format!("no adapter registered for '{}'", kind))
                .with_context(kind.as_str(), "")
        })
    }

    /// Registered kinds
    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.adapters.keys().copied()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
