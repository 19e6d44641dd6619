//! Local model adapter implementation

use super::converter::{
    decode_chat_line, decode_generate_line, extract_chat_text, extract_generate_text,
    select_protocol, to_chat_request, to_generate_request,
};
use super::types::{ChatResponse, GenerateResponse, LocalProtocol, TagList};
use crate::config::ProviderConfig;
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::protocol::Message;
use crate::providers::adapter::{AdapterCapabilities, ProviderAdapter, ProviderKind};
use crate::providers::error::{AdapterError, AdapterResult, ErrorKind};
use crate::providers::fallback::FallbackChain;
use crate::streaming::ndjson::decode_ndjson;
use crate::streaming::{with_error_context, FragmentStream};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Adapter for a locally served model backend
///
/// Requests go to `/api/chat` or `/api/generate`; a failed chat call is
/// retried once as a flattened generate call.
pub struct LocalAdapter {
    http: HttpClient,
    capabilities: AdapterCapabilities,
}

impl LocalAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            capabilities: AdapterCapabilities {
                supports_streaming: true,
                max_image_bytes: None,
            },
        }
    }

    async fn post<B: Serialize>(
        &self,
        config: &ProviderConfig,
        protocol: LocalProtocol,
        body: &B,
        options: &RequestOptions,
    ) -> AdapterResult<reqwest::Response> {
        let url = format!("{}{}", config.resolved_base_url(), protocol.path());
        info!(
            "Local {} request to {} [request_id: {}]",
            protocol.as_str(),
            config.model,
            options.request_id
        );
        self.http.post_json(&url, &[], body, options).await
    }

    async fn chat(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        request_id: Uuid,
    ) -> AdapterResult<String> {
        let options = RequestOptions::new(CallKind::LocalGeneration).with_request_id(request_id);
        let request = to_chat_request(messages, config, false);
        let response = self.post(config, LocalProtocol::Chat, &request, &options).await?;
        let body: ChatResponse = self.http.read_json(response, &options).await?;
        extract_chat_text(body)
    }

    async fn generate(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        request_id: Uuid,
    ) -> AdapterResult<String> {
        let options = RequestOptions::new(CallKind::LocalGeneration).with_request_id(request_id);
        let request = to_generate_request(messages, config, false);
        let response = self.post(config, LocalProtocol::Generate, &request, &options).await?;
        let body: GenerateResponse = self.http.read_json(response, &options).await?;
        extract_generate_text(body)
    }

    async fn open_chat_stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        request_id: Uuid,
    ) -> AdapterResult<FragmentStream> {
        let options = RequestOptions::new(CallKind::LocalGeneration).with_request_id(request_id);
        let request = to_chat_request(messages, config, true);
        let response = self.post(config, LocalProtocol::Chat, &request, &options).await?;
        Ok(decode_ndjson(response.bytes_stream(), decode_chat_line))
    }

    async fn open_generate_stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
        request_id: Uuid,
    ) -> AdapterResult<FragmentStream> {
        let options = RequestOptions::new(CallKind::LocalGeneration).with_request_id(request_id);
        let request = to_generate_request(messages, config, true);
        let response = self.post(config, LocalProtocol::Generate, &request, &options).await?;
        Ok(decode_ndjson(response.bytes_stream(), decode_generate_line))
    }

    async fn fetch_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        let options = RequestOptions::new(CallKind::ListModels);
        let url = format!("{}/api/tags", config.resolved_base_url());
        let tags: TagList = self.http.get_json(&url, &[], &options).await?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Attach backend context, plus the installed models when the model is missing
    async fn explain(&self, err: AdapterError, config: &ProviderConfig) -> AdapterError {
        let err = err.with_context(self.name(), &config.model);
        if err.kind != ErrorKind::ModelUnavailable || !err.available_models.is_empty() {
            return err;
        }

        match self.fetch_models(config).await {
            Ok(models) => err.with_available_models(models),
            Err(list_err) => {
                debug!("Could not list local models: {}", list_err);
                err
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for LocalAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalModel
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
        let result = match select_protocol(messages, config) {
            LocalProtocol::Chat => {
                FallbackChain::new("chat", Box::pin(self.chat(messages, config, request_id)))
                    .or_else(
                        "generate",
                        Box::pin(self.generate(messages, config, request_id)),
                    )
                    .run()
                    .await
            }
            LocalProtocol::Generate => self.generate(messages, config, request_id).await,
        };

        match result {
            Ok(text) => Ok(text),
            Err(err) => Err(self.explain(err, config).await),
        }
    }

    async fn stream(
        &self,
        messages: &[Message],
        config: &ProviderConfig,
    ) -> AdapterResult<FragmentStream> {
        let request_id = Uuid::new_v4();
        let result = match select_protocol(messages, config) {
            LocalProtocol::Chat => FallbackChain::new(
                "chat",
                Box::pin(self.open_chat_stream(messages, config, request_id)),
            )
            .or_else(
                "generate",
                Box::pin(self.open_generate_stream(messages, config, request_id)),
            )
            .run()
            .await,
            LocalProtocol::Generate => {
                self.open_generate_stream(messages, config, request_id).await
            }
        };

        match result {
            Ok(fragments) => Ok(with_error_context(fragments, self.name(), &config.model)),
            Err(err) => Err(self.explain(err, config).await),
        }
    }

    async fn list_models(&self, config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        self.fetch_models(config)
            .await
            .map_err(|e| e.with_context(self.name(), &config.model))
    }
}
