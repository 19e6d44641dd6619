//! Conversion between the message model and the messages format

use super::types::*;
use crate::config::ProviderConfig;
use crate::imaging::{detect_format, resolve_mime_type, DetectedFormat, ImageCompressor};
use crate::protocol::{Message, Part, Role};
use crate::providers::error::{AdapterError, AdapterResult, ErrorKind};
use crate::streaming::StreamAction;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

/// Output budget when the config does not set one
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Messages after image preparation
#[derive(Debug, Clone)]
pub struct PreparedMessages {
    pub messages: Vec<Message>,
    /// Images removed because they could not be brought under the limit
    pub dropped_images: usize,
}

/// Fit every image to the backend's limit
///
/// CPU bound. Media types are re-derived from the bytes, formats the backend
/// cannot accept are transcoded to JPEG, and oversized images go through
/// `compress_for_target`. Images that still do not fit are dropped.
pub fn prepare_images(messages: Vec<Message>, compressor: &ImageCompressor) -> PreparedMessages {
    let mut dropped_images = 0;
    let messages = messages
        .into_iter()
        .map(|message| {
            let parts = message
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Image { bytes, mime_type } => {
                        let prepared = prepare_image(bytes, &mime_type, compressor);
                        if prepared.is_none() {
                            dropped_images += 1;
                        }
                        prepared
                    }
                    text => Some(text),
                })
                .collect();
            Message::new(message.role, parts)
        })
        .collect();

    PreparedMessages {
        messages,
        dropped_images,
    }
}

fn prepare_image(bytes: Vec<u8>, declared: &str, compressor: &ImageCompressor) -> Option<Part> {
    let (bytes, mime_type) = match detect_format(&bytes) {
        DetectedFormat::Jpeg | DetectedFormat::Png | DetectedFormat::Gif | DetectedFormat::WebP => {
            let mime_type = resolve_mime_type(&bytes, declared);
            (bytes, mime_type)
        }
        DetectedFormat::Unknown => {
            warn!(
                "Unrecognized image bytes (declared {}); sending as image/jpeg",
                declared
            );
            (bytes, "image/jpeg".to_string())
        }
        unsupported => match compressor.transcode_to_jpeg(&bytes) {
            Ok(transcoded) => {
                debug!("Transcoded {:?} image to JPEG", unsupported);
                (transcoded.bytes, transcoded.mime_type)
            }
            Err(e) => {
                warn!("Dropping {:?} image that could not be transcoded: {}", unsupported, e);
                return None;
            }
        },
    };

    compressor
        .fit(bytes, mime_type)
        .map(|(bytes, mime_type)| Part::image(bytes, mime_type))
}

/// Build a request body; system turns move into the `system` field
pub fn to_messages_request(
    messages: &[Message],
    config: &ProviderConfig,
    stream: bool,
) -> MessagesRequest {
    let system = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(Message::text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let turns = messages
        .iter()
        .filter(|message| message.role != Role::System)
        .filter_map(|message| {
            let content: Vec<ContentBlock> = message.parts.iter().filter_map(to_block).collect();
            (!content.is_empty()).then(|| ApiMessage {
                role: message.role.as_str().to_string(),
                content,
            })
        })
        .collect();

    MessagesRequest {
        model: config.model.clone(),
        messages: turns,
        max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: (!system.is_empty()).then_some(system),
        temperature: config.temperature,
        stream,
    }
}

fn to_block(part: &Part) -> Option<ContentBlock> {
    match part {
        Part::Text { text } if text.trim().is_empty() => None,
        Part::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
        Part::Image { bytes, mime_type } => Some(ContentBlock::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: resolve_mime_type(bytes, mime_type),
                data: STANDARD.encode(bytes),
            },
        }),
    }
}

/// Refuse to send a request that lost all of its content
pub fn ensure_content(request: &MessagesRequest, dropped_images: usize) -> AdapterResult<()> {
    if !request.messages.is_empty() {
        return Ok(());
    }

    if dropped_images > 0 {
        Err(AdapterError::payload_too_large(format!(
            "{} image(s) exceeded the size limit after compression and no other content remains",
            dropped_images
        )))
    } else {
        Err(AdapterError::malformed("request has no user or assistant content"))
    }
}

/// Concatenated text blocks
pub fn extract_text(response: MessagesResponse) -> AdapterResult<String> {
    let texts: Vec<String> = response
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect();

    if texts.is_empty() {
        return Err(AdapterError::malformed(format!(
            "response had no text content (stop_reason: {})",
            response.stop_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(texts.concat())
}

/// Handle one SSE event; only text deltas produce output
pub fn decode_stream_event(data: &str) -> StreamAction {
    let payload: StreamPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            return StreamAction::Fail(AdapterError::malformed(format!(
                "invalid stream event: {}",
                e
            )))
        }
    };

    match payload.event_type.as_str() {
        "content_block_delta" => match payload.delta {
            Some(StreamDelta {
                delta_type: Some(delta_type),
                text: Some(text),
            }) if delta_type == "text_delta" && !text.is_empty() => StreamAction::Emit(text),
            _ => StreamAction::Skip,
        },
        "message_stop" => StreamAction::Finish,
        "error" => {
            let (error_type, message) = payload
                .error
                .map(|error| (error.error_type.unwrap_or_default(), error.message))
                .unwrap_or_default();
            let kind = match error_type.as_str() {
                "overloaded_error" | "api_error" => ErrorKind::Network,
                _ => ErrorKind::Malformed,
            };
            StreamAction::Fail(AdapterError::new(kind, format!("{}: {}", error_type, message)))
        }
        _ => StreamAction::Skip,
    }
}
