//! Integration tests for the hosted backends using mock servers

mod common;

use common::{bodies_for, solid_png, sse_body};
use futures::StreamExt;
use visiongate_core::providers::messages::DEFAULT_MAX_TOKENS;
use visiongate_core::{ErrorKind, Gateway, Message, ProviderConfig, ProviderKind, StreamEvent};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(kind: ProviderKind, model: &str, server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(kind, model)
        .with_api_key("test-key")
        .with_base_url(server.uri())
}

fn completions_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    }))
}

fn generative_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

#[tokio::test]
async fn test_completions_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(completions_reply("Paris"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let messages = vec![
        Message::system("Answer in one word"),
        Message::user_with_images(
            "Capital of France?",
            vec![(solid_png(2, 2), "image/png".to_string())],
        ),
    ];
    let answer = gateway
        .complete(&messages, &config(ProviderKind::Completions, "gpt-4o", &server).with_max_tokens(32))
        .await
        .unwrap();
    assert_eq!(answer, "Paris");

    let body = &bodies_for(&server, "/chat/completions").await[0];
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 32);
    assert!(body.get("stream").is_none());
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "Answer in one word");

    let items = body["messages"][1]["content"].as_array().unwrap();
    assert_eq!(items[0]["type"], "text");
    assert_eq!(items[1]["type"], "image_url");
    assert!(items[1]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_completions_stream_until_done_marker() {
    let server = MockServer::start().await;
    let body = sse_body([
        r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":"Blue"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":" skies"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let events: Vec<StreamEvent> = gateway
        .stream(&[Message::user("Sky?")], &config(ProviderKind::Completions, "gpt-4o", &server))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Start,
            StreamEvent::Chunk("Blue".to_string()),
            StreamEvent::Chunk(" skies".to_string()),
            StreamEvent::Complete("Blue skies".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_completions_size_rejection_is_payload_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "Image exceeds the maximum allowed size", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let err = gateway
        .complete(&[Message::user("hi")], &config(ProviderKind::Completions, "gpt-4o", &server))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
    assert_eq!(err.status, Some(400));
}

#[tokio::test]
async fn test_completions_rejected_key_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key provided" }
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let err = gateway
        .verify(&config(ProviderKind::Completions, "gpt-4o", &server))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(err.detail, "Incorrect API key provided");
}

#[tokio::test]
async fn test_generative_sends_placeholder_when_no_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": "please provide a valid question or input" }]
            }]
        })))
        .respond_with(generative_reply("What would you like to know?"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let answer = gateway
        .complete(
            &[Message::user("   ")],
            &config(ProviderKind::Generative, "gemini-2.0-flash", &server),
        )
        .await
        .unwrap();
    assert_eq!(answer, "What would you like to know?");

    let body = &bodies_for(&server, "/v1beta/models/gemini-2.0-flash:generateContent").await[0];
    let settings = body["safetySettings"].as_array().unwrap();
    assert!(!settings.is_empty());
    assert!(settings.iter().all(|setting| setting["threshold"] == "BLOCK_NONE"));
}

#[tokio::test]
async fn test_generative_flattens_turns_into_one_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(generative_reply("ok"))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let messages = vec![
        Message::system("Be terse"),
        Message::user_with_images("Look", vec![(solid_png(2, 2), "image/png".to_string())]),
    ];
    gateway
        .complete(&messages, &config(ProviderKind::Generative, "gemini-2.0-flash", &server))
        .await
        .unwrap();

    let body = &bodies_for(&server, "/v1beta/models/gemini-2.0-flash:generateContent").await[0];
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    let parts = contents[0]["parts"].as_array().unwrap();
    assert_eq!(parts[0]["text"], "Be terse");
    assert_eq!(parts[1]["text"], "Look");
    assert_eq!(parts[2]["inlineData"]["mimeType"], "image/png");
}

#[tokio::test]
async fn test_generative_falls_back_to_stable_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-pro:generateContent"))
        .respond_with(generative_reply("stable answer"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let answer = gateway
        .complete(&[Message::user("hi")], &config(ProviderKind::Generative, "gemini-pro", &server))
        .await
        .unwrap();
    assert_eq!(answer, "stable answer");
}

#[tokio::test]
async fn test_generative_returns_original_error_when_fallback_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let err = gateway
        .complete(&[Message::user("hi")], &config(ProviderKind::Generative, "gemini-pro", &server))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.provider, "generative");
}

#[tokio::test]
async fn test_generative_stream() {
    let server = MockServer::start().await;
    let body = sse_body([
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"A "}]}}]}"#,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"cat"}]},"finishReason":"STOP"}]}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let text = gateway
        .stream(
            &[Message::user("What animal?")],
            &config(ProviderKind::Generative, "gemini-2.0-flash", &server),
        )
        .await
        .unwrap()
        .collect_text()
        .await
        .unwrap();
    assert_eq!(text, "A cat");
}

#[tokio::test]
async fn test_generative_list_models_strips_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{ "name": "models/gemini-2.0-flash" }, { "name": "models/gemini-pro" }]
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let models = gateway
        .list_models(&config(ProviderKind::Generative, "gemini-pro", &server))
        .await
        .unwrap();
    assert_eq!(models, vec!["gemini-2.0-flash", "gemini-pro"]);
}

#[tokio::test]
async fn test_messages_system_field_and_default_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [
                { "type": "text", "text": "Part one. " },
                { "type": "text", "text": "Part two." }
            ],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::with_defaults().unwrap();
    let messages = vec![
        Message::system("Rule one"),
        Message::system("Rule two"),
        Message::user("Go"),
    ];
    let answer = gateway
        .complete(&messages, &config(ProviderKind::MessagesApi, "claude-test", &server))
        .await
        .unwrap();
    assert_eq!(answer, "Part one. Part two.");

    let body = &bodies_for(&server, "/v1/messages").await[0];
    assert_eq!(body["system"], "Rule one\n\nRule two");
    assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
    let turns = body["messages"].as_array().unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0]["role"], "user");
}
