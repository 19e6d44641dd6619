//! Conversion between the message model and the completions format

use super::types::*;
use crate::config::ProviderConfig;
use crate::imaging::resolve_mime_type;
use crate::protocol::{Message, Part, Role};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::streaming::StreamAction;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Build a request body
pub fn to_completions_request(
    messages: &[Message],
    config: &ProviderConfig,
    stream: bool,
) -> CompletionsRequest {
    CompletionsRequest {
        model: config.model.clone(),
        messages: to_openai_messages(messages),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        stream,
    }
}

/// Translate turns; turns without parts are skipped
pub fn to_openai_messages(messages: &[Message]) -> Vec<CompletionsMessage> {
    messages
        .iter()
        .filter(|message| !message.parts.is_empty())
        .map(to_openai_message)
        .collect()
}

fn to_openai_message(message: &Message) -> CompletionsMessage {
    let content = match message.role {
        Role::System => CompletionsContent::Text(message.text()),
        Role::User | Role::Assistant => {
            CompletionsContent::Items(message.parts.iter().map(to_content_item).collect())
        }
    };

    CompletionsMessage {
        role: message.role.as_str().to_string(),
        content,
    }
}

fn to_content_item(part: &Part) -> ContentItem {
    match part {
        Part::Text { text } => ContentItem::Text { text: text.clone() },
        Part::Image { bytes, mime_type } => ContentItem::ImageUrl {
            image_url: ImageUrl {
                url: data_uri(bytes, mime_type),
            },
        },
    }
}

/// Translate wire turns back into messages
///
/// Unknown roles are read as user turns; image items that are not base64
/// data URIs are skipped.
pub fn from_openai_messages(messages: &[CompletionsMessage]) -> Vec<Message> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role.as_str() {
                "system" => Role::System,
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            let parts = match &message.content {
                CompletionsContent::Text(text) => vec![Part::text(text.clone())],
                CompletionsContent::Items(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::Text { text } => Some(Part::text(text.clone())),
                        ContentItem::ImageUrl { image_url } => parse_data_uri(&image_url.url)
                            .map(|(bytes, mime_type)| Part::image(bytes, mime_type)),
                    })
                    .collect(),
            };
            Message::new(role, parts)
        })
        .collect()
}

/// `data:<mime>;base64,<payload>` with the MIME type taken from the bytes
pub fn data_uri(bytes: &[u8], declared_mime: &str) -> String {
    format!(
        "data:{};base64,{}",
        resolve_mime_type(bytes, declared_mime),
        STANDARD.encode(bytes)
    )
}

/// Split a base64 data URI into bytes and MIME type
pub fn parse_data_uri(uri: &str) -> Option<(Vec<u8>, String)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((bytes, mime_type.to_string()))
}

/// Text of the first choice
pub fn extract_text(response: CompletionsResponse) -> AdapterResult<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::malformed("response contained no choices"))?;

    match (choice.message.content, choice.message.refusal) {
        (Some(content), _) => Ok(content),
        (None, Some(refusal)) => Err(AdapterError::malformed(format!(
            "model refused the request: {}",
            refusal
        ))),
        (None, None) => Err(AdapterError::malformed(format!(
            "first choice had no content (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))),
    }
}

/// Handle one SSE `data:` payload
pub fn decode_stream_data(data: &str) -> StreamAction {
    if data.trim() == "[DONE]" {
        return StreamAction::Finish;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
        {
            Some(content) if !content.is_empty() => StreamAction::Emit(content),
            _ => StreamAction::Skip,
        },
        Err(e) => StreamAction::Fail(AdapterError::malformed(format!(
            "invalid stream chunk: {}",
            e
        ))),
    }
}
