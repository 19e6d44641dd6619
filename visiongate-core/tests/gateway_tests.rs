//! Integration tests for the gateway entry point

mod common;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{bodies_for, init_logging, noise_png, sse_body};
use futures::StreamExt;
use std::sync::Arc;
use visiongate_core::providers::AdapterCapabilities;
use visiongate_core::{
    AdapterError, AdapterRegistry, AdapterResult, ErrorKind, Gateway, GatewayResponse, Message,
    ProviderAdapter, ProviderConfig, ProviderKind, StreamEvent,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIVE_MIB: usize = 5 * 1024 * 1024;

fn messages_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::MessagesApi, "claude-test")
        .with_api_key("test-key")
        .with_base_url(server.uri())
}

fn messages_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn"
    }))
}

/// Backend that answers in one piece and cannot stream
struct OneShotAdapter {
    capabilities: AdapterCapabilities,
}

impl OneShotAdapter {
    fn new() -> Self {
        Self {
            capabilities: AdapterCapabilities {
                supports_streaming: false,
                ..AdapterCapabilities::default()
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for OneShotAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Completions
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn complete(&self, messages: &[Message], _config: &ProviderConfig) -> AdapterResult<String> {
        Ok(format!("echo: {}", messages[0].text()))
    }

    async fn list_models(&self, _config: &ProviderConfig) -> AdapterResult<Vec<String>> {
        Ok(vec!["one-shot".to_string()])
    }
}

#[tokio::test]
async fn test_oversized_image_is_compressed_before_sending() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(messages_reply("A field of static"))
        .expect(1)
        .mount(&server)
        .await;

    let image = noise_png(1830, 1830, 7);
    assert!(image.len() > FIVE_MIB * 3 / 2);

    let gateway = Gateway::with_defaults().unwrap();
    let message = Message::user_with_images("Describe this", vec![(image, "image/png".to_string())]);
    let answer = gateway
        .complete(&[message], &messages_config(&server))
        .await
        .unwrap();
    assert_eq!(answer, "A field of static");

    let bodies = bodies_for(&server, "/v1/messages").await;
    let content = bodies[0]["messages"][0]["content"].as_array().unwrap();
    let image_block = content
        .iter()
        .find(|block| block["type"] == "image")
        .expect("image survived compression");

    assert_eq!(image_block["source"]["type"], "base64");
    let data = image_block["source"]["data"].as_str().unwrap();
    let decoded = STANDARD.decode(data).unwrap();
    assert!(decoded.len() <= FIVE_MIB, "sent {} bytes", decoded.len());
    assert!(content.iter().any(|block| block["text"] == "Describe this"));
}

#[tokio::test]
async fn test_image_that_cannot_fit_is_dropped_and_text_still_sent() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(messages_reply("Text only answer"))
        .expect(1)
        .mount(&server)
        .await;

    let config = messages_config(&server).with_max_image_bytes(Some(512));
    let message = Message::user_with_images(
        "What do you see?",
        vec![(noise_png(64, 64, 3), "image/png".to_string())],
    );

    let gateway = Gateway::with_defaults().unwrap();
    let answer = gateway.complete(&[message], &config).await.unwrap();
    assert_eq!(answer, "Text only answer");

    let bodies = bodies_for(&server, "/v1/messages").await;
    let content = bodies[0]["messages"][0]["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
}

#[tokio::test]
async fn test_nothing_left_after_dropping_images_is_payload_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(messages_reply("unreachable"))
        .expect(0)
        .mount(&server)
        .await;

    let config = messages_config(&server).with_max_image_bytes(Some(512));
    let message = Message::user_with_images("", vec![(noise_png(64, 64, 9), "image/png".to_string())]);

    let gateway = Gateway::with_defaults().unwrap();
    let err = gateway.complete(&[message], &config).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
    assert_eq!(err.provider, "messages_api");
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(messages_reply("unreachable"))
        .expect(0)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderKind::MessagesApi, "claude-test")
        .with_base_url(server.uri());
    let gateway = Gateway::with_defaults().unwrap();
    let err = gateway
        .complete(&[Message::user("hello")], &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(err.model, "claude-test");
}

#[tokio::test]
async fn test_streaming_request_to_non_streaming_backend_yields_start_and_complete() {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(OneShotAdapter::new()));
    let gateway = Gateway::new(registry);

    let config = ProviderConfig::new(ProviderKind::Completions, "one-shot").with_api_key("k");
    let response = gateway
        .send(&[Message::user("ping")], &config, true)
        .await
        .unwrap();

    let GatewayResponse::Stream(handle) = response else {
        panic!("expected a stream handle");
    };
    let events: Vec<StreamEvent> = handle.collect().await;
    assert_eq!(
        events,
        vec![StreamEvent::Start, StreamEvent::Complete("echo: ping".to_string())]
    );
}

#[tokio::test]
async fn test_streaming_disabled_in_config_uses_single_shot_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": { "role": "assistant", "content": "whole answer" },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderKind::LocalModel, "llama3")
        .with_base_url(server.uri())
        .with_streaming(false);
    let gateway = Gateway::with_defaults().unwrap();
    let handle = gateway.stream(&[Message::user("hi")], &config).await.unwrap();
    let events: Vec<StreamEvent> = handle.collect().await;

    assert_eq!(
        events,
        vec![StreamEvent::Start, StreamEvent::Complete("whole answer".to_string())]
    );
    let bodies = bodies_for(&server, "/api/chat").await;
    assert_eq!(bodies[0]["stream"], false);
}

#[tokio::test]
async fn test_messages_stream_events_arrive_in_order() {
    init_logging();
    let server = MockServer::start().await;
    let body = sse_body([
        r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#,
        r#"{"type":"content_block_stop","index":0}"#,
        r#"{"type":"message_stop"}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let mut handle = gateway
        .stream(&[Message::user("greet me")], &messages_config(&server))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.recv().await {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            StreamEvent::Start,
            StreamEvent::Chunk("Hel".to_string()),
            StreamEvent::Chunk("lo".to_string()),
            StreamEvent::Complete("Hello".to_string()),
        ]
    );
    assert_eq!(handle.accumulated(), "Hello");
    assert!(handle.is_finished());

    let bodies = bodies_for(&server, "/v1/messages").await;
    assert_eq!(bodies[0]["stream"], true);
}

#[tokio::test]
async fn test_messages_stream_error_event_ends_with_error() {
    let server = MockServer::start().await;
    let body = sse_body([
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"partial"}}"#,
        r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let handle = gateway
        .stream(&[Message::user("go")], &messages_config(&server))
        .await
        .unwrap();
    let events: Vec<StreamEvent> = handle.collect().await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Start);
    assert_eq!(events[1], StreamEvent::Chunk("partial".to_string()));
    match &events[2] {
        StreamEvent::Error(cause) => {
            assert!(cause.starts_with("[messages_api/claude-test] Network error"), "{}", cause);
            assert!(cause.contains("Overloaded"), "{}", cause);
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unregistered_backend_is_reported() {
    let gateway = Gateway::new(AdapterRegistry::new());
    let config = ProviderConfig::new(ProviderKind::Generative, "gemini").with_api_key("k");
    let err: AdapterError = gateway
        .complete(&[Message::user("hi")], &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ModelUnavailable);
}
