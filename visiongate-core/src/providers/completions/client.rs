//! Completions adapter implementation

use super::converter::{decode_stream_data, extract_text, to_completions_request};
use super::types::{CompletionsResponse, ModelList};
use crate::config::ProviderConfig;
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::protocol::Message;
use crate::providers::adapter::{AdapterCapabilities, ProviderAdapter, ProviderKind};
use crate::providers::error::AdapterResult;
use crate::streaming::sse::decode_sse;
use crate::streaming::{with_error_context, FragmentStream};
use async_trait::async_trait;
use tracing::{debug, info};

/// Adapter for the hosted completions API
pub struct CompletionsAdapter {
    http: HttpClient,
    capabilities: AdapterCapabilities,
}

impl CompletionsAdapter {
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
        [("Authorization", format!("Bearer {}", api_key))]
    }

    async fn post(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        stream: bool,
        options: &RequestOptions,
    ) -> AdapterResult<reqwest::Response> {
        let api_key = config.require_api_key()?;
        let request = to_completions_request(messages, config, stream);
        let url = format!("{}/chat/completions", config.resolved_base_url());

        info!(
            "Completions request to model {} ({} turns, stream: {}) [request_id: {}]",
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
        let body: CompletionsResponse = self.http.read_json(response, &options).await?;
        extract_text(body)
    }

    async fn fetch_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        let api_key = config.require_api_key()?;
        let options = RequestOptions::new(CallKind::ListModels);
        let url = format!("{}/models", config.resolved_base_url());
        let list: ModelList = self
            .http
            .get_json(&url, &Self::headers(api_key), &options)
            .await?;
        Ok(list.data.into_iter().map(|model| model.id).collect())
    }
}

#[async_trait]
impl ProviderAdapter for CompletionsAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Completions
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

        debug!("Completions stream opened [request_id: {}]", options.request_id);
        let fragments = decode_sse(response.bytes_stream(), |_, data| decode_stream_data(data));
        Ok(with_error_context(fragments, self.name(), &config.model))
    }

    async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        self.fetch_models(config)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))
    }
}
