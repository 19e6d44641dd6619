//! Generative-content adapter implementation

use super::converter::{decode_stream_data, extract_text, model_ids, to_generate_request};
use super::types::{GenerateContentResponse, ModelList};
use crate::config::ProviderConfig;
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::protocol::Message;
use crate::providers::adapter::{AdapterCapabilities, ProviderAdapter, ProviderKind};
use crate::providers::error::AdapterResult;
use crate::providers::fallback::FallbackChain;
use crate::streaming::sse::decode_sse;
use crate::streaming::{with_error_context, FragmentStream};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// API version tried first
const PRIMARY_VERSION: &str = "v1beta";

/// API version tried when the primary endpoint misbehaves
const FALLBACK_VERSION: &str = "v1";

/// Adapter for the hosted generative-content API
pub struct GenerativeAdapter {
    http: HttpClient,
    capabilities: AdapterCapabilities,
}

impl GenerativeAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            capabilities: AdapterCapabilities {
                supports_streaming: true,
                max_image_bytes: None,
            },
        }
    }

    fn headers(api_key: &str) -> [(&'static str, String); 1] {
        [("x-goog-api-key", api_key.to_string())]
    }

    fn endpoint(config: &ProviderConfig, version: &str, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        format!(
            "{}/{}/models/{}:{}",
            config.resolved_base_url(),
            version,
            config.model,
            method
        )
    }

    async fn post(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        version: &'static str,
        stream: bool,
        request_id: Uuid,
    ) -> AdapterResult<reqwest::Response> {
        let api_key = config.require_api_key()?;
        let options = RequestOptions::new(CallKind::HostedGeneration).with_request_id(request_id);
        let request = to_generate_request(messages, config);
        let url = Self::endpoint(config, version, stream);

        info!(
            "Generative request to {} via {} ({} parts, stream: {}) [request_id: {}]",
            config.model,
            version,
            request.contents.first().map_or(0, |content| content.parts.len()),
            stream,
            request_id
        );

        self.http
            .post_json(&url, &Self::headers(api_key), &request, &options)
            .await
    }

    async fn generate(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        version: &'static str,
        request_id: Uuid,
    ) -> AdapterResult<String> {
        let options = RequestOptions::new(CallKind::HostedGeneration).with_request_id(request_id);
        let response = self.post(messages, config, version, false, request_id).await?;
        let body: GenerateContentResponse = self.http.read_json(response, &options).await?;
        extract_text(body)
    }

    async fn open_stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        version: &'static str,
        request_id: Uuid,
    ) -> AdapterResult<FragmentStream> {
        let response = self.post(messages, config, version, true, request_id).await?;
        Ok(decode_sse(response.bytes_stream(), |_, data| {
            decode_stream_data(data)
        }))
    }

    async fn fetch_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        let api_key = config.require_api_key()?;
        let options = RequestOptions::new(CallKind::ListModels);
        let url = format!("{}/{}/models", config.resolved_base_url(), PRIMARY_VERSION);
        let list: ModelList = self
            .http
            .get_json(&url, &Self::headers(api_key), &options)
            .await?;
        Ok(model_ids(list))
    }
}

#[async_trait]
impl ProviderAdapter for GenerativeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Generative
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn complete(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<String> {
        let request_id = Uuid::new_v4();
        FallbackChain::new(
            PRIMARY_VERSION,
            Box::pin(self.generate(messages, config, PRIMARY_VERSION, request_id)),
        )
        .or_else(
            FALLBACK_VERSION,
            Box::pin(self.generate(messages, config, FALLBACK_VERSION, request_id)),
        )
        .run()
        .await
        .map_err(|e| e.with_context(self.name(), &config.model))
    }

    async fn stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<FragmentStream> {
        let request_id = Uuid::new_v4();
        FallbackChain::new(
            PRIMARY_VERSION,
            Box::pin(self.open_stream(messages, config, PRIMARY_VERSION, request_id)),
        )
        .or_else(
            FALLBACK_VERSION,
            Box::pin(self.open_stream(messages, config, FALLBACK_VERSION, request_id)),
        )
        .run()
        .await
        .map(|fragments| with_error_context(fragments, self.name(), &config.model))
        .map_err(|e| e.with_context(self.name(), &config.model))
    }

    async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        self.fetch_models(config)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))
    }
}
