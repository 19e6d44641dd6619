//! Conversion between the message model and the generative-content format

use super::types::*;
use crate::config::ProviderConfig;
use crate::imaging::resolve_mime_type;
use crate::protocol::{Message, Part};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::streaming::StreamAction;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Sent instead of an empty request
pub const PLACEHOLDER_TEXT: &str = "please provide a valid question or input";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Build a request body
///
/// Every turn is flattened into one user turn. Blank text parts are dropped
/// and the placeholder is substituted when nothing remains.
pub fn to_generate_request(messages: &[Message], config: &ProviderConfig) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: flatten_parts(messages),
        }],
        generation_config: GenerationConfig {
            max_output_tokens: config.max_tokens,
            temperature: config.temperature,
        },
        safety_settings: permissive_safety_settings(),
    }
}

/// All parts of all turns, in order, in wire form
pub fn flatten_parts(messages: &[Message]) -> Vec<ContentPart> {
    let mut parts: Vec<ContentPart> = messages
        .iter()
        .flat_map(|message| message.parts.iter())
        .filter_map(|part| match part {
            Part::Text { text } if text.trim().is_empty() => None,
            Part::Text { text } => Some(ContentPart::Text { text: text.clone() }),
            Part::Image { bytes, .. } if bytes.is_empty() => None,
            Part::Image { bytes, mime_type } => Some(ContentPart::InlineData {
                inline_data: InlineData {
                    mime_type: resolve_mime_type(bytes, mime_type),
                    data: STANDARD.encode(bytes),
                },
            }),
        })
        .collect();

    if parts.is_empty() {
        parts.push(ContentPart::Text {
            text: PLACEHOLDER_TEXT.to_string(),
        });
    }
    parts
}

/// Fixed policy: every category at `BLOCK_NONE`
pub fn permissive_safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
}

fn candidate_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    Some(
        content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect(),
    )
}

/// Text of the first candidate
pub fn extract_text(response: GenerateContentResponse) -> AdapterResult<String> {
    if let Some(text) = candidate_text(&response) {
        return Ok(text);
    }

    let reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
        .or_else(|| {
            response
                .candidates
                .first()
                .and_then(|candidate| candidate.finish_reason.clone())
        });

    Err(AdapterError::malformed(match reason {
        Some(reason) => format!("response has no content (reason: {})", reason),
        None => "response has no candidates".to_string(),
    }))
}

/// Handle one SSE `data:` payload
pub fn decode_stream_data(data: &str) -> StreamAction {
    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(response) => match candidate_text(&response) {
            Some(text) if !text.is_empty() => StreamAction::Emit(text),
            _ => StreamAction::Skip,
        },
        Err(e) => StreamAction::Fail(AdapterError::malformed(format!(
            "invalid stream chunk: {}",
            e
        ))),
    }
}

/// Model ids without the `models/` prefix
pub fn model_ids(list: ModelList) -> Vec<String> {
    list.models
        .into_iter()
        .map(|model| {
            model
                .name
                .strip_prefix("models/")
                .map(str::to_string)
                .unwrap_or(model.name)
        })
        .collect()
}
