//! Messages adapter implementation

use super::converter::{
    decode_stream_event, ensure_content, extract_text, prepare_images, to_messages_request,
    PreparedMessages,
};
use super::types::{MessagesRequest, MessagesResponse, ModelList};
use crate::config::ProviderConfig;
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::imaging::{CompressionTarget, ImageCompressor};
use crate::protocol::Message;
use crate::providers::adapter::{AdapterCapabilities, ProviderAdapter, ProviderKind};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::streaming::sse::decode_sse;
use crate::streaming::{with_error_context, FragmentStream};
use async_trait::async_trait;
use tracing::{info, warn};

const API_VERSION: &str = "2023-06-01";

/// Adapter for the hosted messages API
///
/// Every image is fitted to the backend's per-image limit before encoding;
/// images that cannot be fitted are dropped so the rest of the request still goes out.
pub struct MessagesAdapter {
    http: HttpClient,
    compressor: ImageCompressor,
    capabilities: AdapterCapabilities,
}

impl MessagesAdapter {
    pub fn new(http: HttpClient) -> Self {
        let compressor = ImageCompressor::new();
        Self {
            http,
            capabilities: AdapterCapabilities {
                supports_streaming: true,
                max_image_bytes: Some(compressor.consumer_target().max_bytes),
            },
            compressor,
        }
    }

    /// Use a different compression engine (and therefore image limit)
    pub fn with_compressor(mut self, compressor: ImageCompressor) -> Self {
        self.capabilities.max_image_bytes = Some(compressor.consumer_target().max_bytes);
        self.compressor = compressor;
        self
    }

    fn headers(api_key: &str) -> [(&'static str, String); 2] {
        [
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", API_VERSION.to_string()),
        ]
    }

    /// Compression honoring a tighter per-config limit
    fn compressor_for(&self, config: &ProviderConfig) -> ImageCompressor {
        let current = self.compressor.consumer_target();
        match config.max_image_bytes {
            Some(limit) if limit < current.max_bytes => self
                .compressor
                .with_consumer_target(CompressionTarget { max_bytes: limit, ..current }),
            _ => self.compressor,
        }
    }

    /// Prepare images on a blocking worker and build the request body
    async fn build_request(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        stream: bool,
    ) -> AdapterResult<MessagesRequest> {
        let compressor = self.compressor_for(config);
        let owned = messages.to_vec();
        let PreparedMessages {
            messages,
            dropped_images,
        } = tokio::task::spawn_blocking(move || prepare_images(owned, &compressor))
            .await
            .map_err(|e| AdapterError::malformed(format!("image preparation failed: {}", e)))?;

        if dropped_images > 0 {
            warn!("Dropped {} image(s) that exceeded the size limit", dropped_images);
        }

        let request = to_messages_request(&messages, config, stream);
        ensure_content(&request, dropped_images)?;
        Ok(request)
    }

    async fn post(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        stream: bool,
        options: &RequestOptions,
    ) -> AdapterResult<reqwest::Response> {
        let api_key = config.require_api_key()?;
        let request = self.build_request(messages, config, stream).await?;
        let url = format!("{}/v1/messages", config.resolved_base_url());

        info!(
            "Messages request to {} ({} turns, stream: {}) [request_id: {}]",
            config.model,
            request.messages.len(),
            stream,
            options.request_id
        );

        self.http
            .post_json(&url, &Self::headers(api_key), &request, options)
            .await
    }

    async fn complete_inner(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<String> {
        let options = RequestOptions::new(CallKind::HostedGeneration);
        let response = self.post(messages, config, false, &options).await?;
        let body: MessagesResponse = self.http.read_json(response, &options).await?;
        extract_text(body)
    }

    async fn fetch_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        let api_key = config.require_api_key()?;
        let options = RequestOptions::new(CallKind::ListModels);
        let url = format!("{}/v1/models", config.resolved_base_url());
        let list: ModelList = self
            .http
            .get_json(&url, &Self::headers(api_key), &options)
            .await?;
        Ok(list.data.into_iter().map(|model| model.id).collect())
    }
}

#[async_trait]
impl ProviderAdapter for MessagesAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MessagesApi
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn complete(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<String> {
        self.complete_inner(messages, config)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))
    }

    async fn stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<FragmentStream> {
        let options = RequestOptions::new(CallKind::HostedGeneration);
        let response = self
            .post(messages, config, true, &options)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))?;

        let fragments = decode_sse(response.bytes_stream(), |_, data| decode_stream_event(data));
        Ok(with_error_context(fragments, self.name(), &config.model))
    }

    async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        self.fetch_models(config)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))
    }
}
