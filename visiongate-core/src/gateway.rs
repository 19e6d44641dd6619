//! Gateway entry point
//!
//! Resolves the adapter for a config, fits oversized images to the
//! backend's limit, and returns either finished text or a stream handle.
//! Callers always see the same event protocol, whether or not the backend
//! can stream.

use crate::config::ProviderConfig;
use crate::imaging::{CompressionTarget, ImageCompressor};
use crate::protocol::{Message, Part};
use crate::providers::{AdapterError, AdapterRegistry, AdapterResult, ProviderAdapter};
use crate::streaming::{spawn_coordinated, StreamHandle};
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Result of a gateway call
#[derive(Debug)]
pub enum GatewayResponse {
    /// Finished answer
    Text(String),
    /// Ordered `StreamEvent`s
    Stream(StreamHandle),
}

impl GatewayResponse {
    /// Final text, draining the stream if needed
    pub async fn into_text(self) -> AdapterResult<String> {
        match self {
            GatewayResponse::Text(text) => Ok(text),
            GatewayResponse::Stream(handle) => handle.collect_text().await,
        }
    }
}

/// Dispatches requests to the configured backend
///
/// Holds no per-request state; concurrent calls share only the registry.
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: AdapterRegistry,
    compressor: ImageCompressor,
}

impl Gateway {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            compressor: ImageCompressor::new(),
        }
    }

    /// Gateway over the four HTTP adapters
    pub fn with_defaults() -> AdapterResult<Self> {
        Ok(Self::new(AdapterRegistry::with_defaults()?))
    }

    /// Replace the engine used for pre-flight compression
    pub fn with_compressor(mut self, compressor: ImageCompressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Send a request
    ///
    /// With `streaming` set the result is always `GatewayResponse::Stream`;
    /// backends that cannot stream are replayed as `Start` then `Complete`.
    pub async fn send(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        streaming: bool,
    ) -> AdapterResult<GatewayResponse> {
        let adapter = self.registry.get(config.provider)?;
        if config.provider.requires_api_key() {
            config.require_api_key()?;
        }

        let messages = self.fit_images(messages, config, adapter.as_ref()).await?;
        let can_stream = adapter.capabilities().supports_streaming && config.supports_streaming;

        info!(
            "Dispatching {} turn(s) to {}/{} (streaming requested: {}, available: {})",
            messages.len(),
            adapter.name(),
            config.model,
            streaming,
            can_stream
        );

        if streaming && can_stream {
            let fragments = adapter.stream(&messages, config).await?;
            return Ok(GatewayResponse::Stream(spawn_coordinated(fragments)));
        }

        let text = adapter.complete(&messages, config).await?;
        if streaming {
            debug!("Synthesizing stream events for a non-streaming backend");
            Ok(GatewayResponse::Stream(StreamHandle::from_complete(text)))
        } else {
            Ok(GatewayResponse::Text(text))
        }
    }

    /// Send and wait for the finished answer
    pub async fn complete(&self, messages: &[Message], config: &ProviderConfig) -> AdapterResult<String> {
        self.send(messages, config, false).await?.into_text().await
    }

    /// Send and return the event stream
    pub async fn stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<StreamHandle> {
        match self.send(messages, config, true).await? {
            GatewayResponse::Stream(handle) => Ok(handle),
            GatewayResponse::Text(text) => Ok(StreamHandle::from_complete(text)),
        }
    }

    /// Models the configured backend offers
    pub async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        self.registry.get(config.provider)?.list_models(config).await
    }

    /// Check the configured backend's credentials and connectivity
    pub async fn verify(&self, config: &ProviderConfig) -> AdapterResult<()> {
        self.registry.get(config.provider)?.verify(config).await
    }

    /// Compress image parts over the limit; drop those that cannot fit
    async fn fit_images<'a>(
        &self,
        messages: &'a [Message],
        config: &ProviderConfig,
        adapter: &dyn ProviderAdapter,
    ) -> AdapterResult<Cow<'a, [Message]>> {
        let Some(limit) = config
            .max_image_bytes
            .or(adapter.capabilities().max_image_bytes)
        else {
            return Ok(Cow::Borrowed(messages));
        };

        let oversized = messages
            .iter()
            .flat_map(|message| message.parts.iter())
            .any(|part| part.image_len() > limit);
        if !oversized {
            return Ok(Cow::Borrowed(messages));
        }

        let compressor = self.compressor.with_consumer_target(CompressionTarget {
            max_bytes: limit,
            ..self.compressor.consumer_target()
        });
        let owned = messages.to_vec();
        let (fitted, dropped) =
            tokio::task::spawn_blocking(move || fit_all(owned, &compressor, limit))
                .await
                .map_err(|e| AdapterError::malformed(format!("image compression task failed: {}", e)))?;

        if dropped > 0 {
            warn!(
                "Dropped {} image(s) that could not fit the {} byte limit of {}",
                dropped,
                limit,
                adapter.name()
            );
        }

        if dropped > 0 && !fitted.iter().any(Message::has_content) {
            return Err(AdapterError::payload_too_large(format!(
                "{} image(s) could not be compressed below {} bytes and no other content remains",
                dropped, limit
            ))
            .with_context(adapter.name(), &config.model));
        }

        Ok(Cow::Owned(fitted))
    }
}

fn fit_all(messages: Vec<Message>, compressor: &ImageCompressor, limit: usize) -> (Vec<Message>, usize) {
    let mut dropped = 0;
    let fitted = messages
        .into_iter()
        .map(|message| {
            let parts = message
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Image { bytes, mime_type } if bytes.len() > limit => {
                        let fitted = compressor
                            .fit(bytes, mime_type)
                            .map(|(bytes, mime_type)| Part::image(bytes, mime_type));
                        if fitted.is_none() {
                            dropped += 1;
                        }
                        fitted
                    }
                    other => Some(other),
                })
                .collect();
            Message::new(message.role, parts)
        })
        .collect();

    (fitted, dropped)
}
