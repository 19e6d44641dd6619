//! HTTP client implementation using reqwest

use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::error::{AdapterError, AdapterResult};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Maximum non-streamed response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("visiongate/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> AdapterResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| AdapterError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// POST a JSON body and return the successful response
    ///
    /// Non-2xx statuses are mapped to an `AdapterError` using the error body.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
    ) -> AdapterResult<Response> {
        debug!("POST {} [request_id: {}]", url, options.request_id);
        let builder = self.client.post(url).json(body);
        self.send(builder, headers, options).await
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        options: &RequestOptions,
    ) -> AdapterResult<T> {
        debug!("GET {} [request_id: {}]", url, options.request_id);
        let response = self.send(self.client.get(url), headers, options).await?;
        self.read_json(response, options).await
    }

    /// Read and parse a successful JSON response body
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        options: &RequestOptions,
    ) -> AdapterResult<T> {
        self.check_content_length(&response)?;

        let text = response.text().await.map_err(|e| {
            AdapterError::network(format!(
                "Failed to read response body: {} [request_id: {}]",
                e, options.request_id
            ))
        })?;

        if text.len() > self.max_response_size {
            return Err(AdapterError::malformed(format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                text.len(),
                self.max_response_size,
                options.request_id
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(
                "Failed to parse response [request_id: {}]: {}",
                options.request_id, e
            );
            AdapterError::malformed(format!(
                "Invalid response format: {} [request_id: {}]",
                e, options.request_id
            ))
        })
    }

    async fn send(
        &self,
        mut builder: RequestBuilder,
        headers: &[(&str, String)],
        options: &RequestOptions,
    ) -> AdapterResult<Response> {
        for (key, value) in headers {
            builder = builder.header(*key, value);
        }

        let response = builder
            .timeout(options.timeout)
            .header("X-Request-ID", options.request_id.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Request timeout [request_id: {}]", options.request_id);
                    AdapterError::network(format!(
                        "Request timed out after {}s [request_id: {}]",
                        options.timeout.as_secs(),
                        options.request_id
                    ))
                } else if e.is_connect() {
                    error!("Connection error [request_id: {}]: {}", options.request_id, e);
                    AdapterError::network(format!(
                        "Connection failed: {} [request_id: {}]",
                        e, options.request_id
                    ))
                } else {
                    error!("Request error [request_id: {}]: {}", options.request_id, e);
                    AdapterError::network(format!("{} [request_id: {}]", e, options.request_id))
                }
            })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, options.request_id);

        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(
                "Request failed with status {} [request_id: {}]",
                status, options.request_id
            );
            return Err(map_http_error(status, body));
        }

        Ok(response)
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> AdapterResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(AdapterError::malformed(format!(
                    "Response size {} exceeds maximum {}",
                    content_length, self.max_response_size
                )));
            }
        }

        Ok(())
    }
}
