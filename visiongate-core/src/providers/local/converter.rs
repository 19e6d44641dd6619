//! Conversion between the message model and the local backend's two formats

use super::types::*;
use crate::config::ProviderConfig;
use crate::protocol::{Message, Role};
use crate::providers::error::{AdapterError, AdapterResult};
use crate::streaming::StreamAction;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Model families that only handle images reliably through `/api/generate`
const GENERATE_ONLY_FAMILIES: [&str; 3] = ["llava", "bakllava", "moondream"];

/// Pick the endpoint for a request
///
/// An explicit `local_protocol` in the config wins. Otherwise image-bearing
/// requests to a generate-only family use `generate`; everything else uses `chat`.
pub fn select_protocol(messages: &[Message], config: &ProviderConfig) -> LocalProtocol {
    if let Some(protocol) = config.local_protocol {
        return protocol;
    }

    let has_images = messages.iter().any(|message| message.images().next().is_some());
    if has_images && is_generate_only(&config.model) {
        LocalProtocol::Generate
    } else {
        LocalProtocol::Chat
    }
}

fn is_generate_only(model: &str) -> bool {
    let family = model
        .split(':')
        .next()
        .unwrap_or(model)
        .rsplit('/')
        .next()
        .unwrap_or(model)
        .to_ascii_lowercase();
    GENERATE_ONLY_FAMILIES
        .iter()
        .any(|generate_only| family.contains(generate_only))
}

fn model_options(config: &ProviderConfig) -> Option<ModelOptions> {
    if config.max_tokens.is_none() && config.temperature.is_none() {
        return None;
    }
    Some(ModelOptions {
        num_predict: config.max_tokens,
        temperature: config.temperature,
    })
}

fn encoded_images(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .flat_map(Message::images)
        .map(|(bytes, _)| STANDARD.encode(bytes))
        .collect()
}

/// `/api/chat` body with every image attached to the latest user turn
pub fn to_chat_request(messages: &[Message], config: &ProviderConfig, stream: bool) -> ChatRequest {
    let mut turns: Vec<ChatMessage> = messages
        .iter()
        .filter(|message| !message.text().trim().is_empty())
        .map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.text(),
            images: Vec::new(),
        })
        .collect();

    let images = encoded_images(messages);
    if !images.is_empty() {
        match turns.iter_mut().rev().find(|turn| turn.role == Role::User.as_str()) {
            Some(turn) => turn.images = images,
            None => turns.push(ChatMessage {
                role: Role::User.as_str().to_string(),
                content: String::new(),
                images,
            }),
        }
    }

    ChatRequest {
        model: config.model.clone(),
        messages: turns,
        stream,
        options: model_options(config),
    }
}

/// Turns rendered as `Role: text` paragraphs
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|message| {
            let text = message.text();
            (!text.trim().is_empty()).then(|| format!("{}: {}", message.role.label(), text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `/api/generate` body: transcript prompt plus the flat image list
pub fn to_generate_request(
    messages: &[Message],
    config: &ProviderConfig,
    stream: bool,
) -> GenerateRequest {
    GenerateRequest {
        model: config.model.clone(),
        prompt: transcript(messages),
        images: encoded_images(messages),
        stream,
        options: model_options(config),
    }
}

pub fn extract_chat_text(response: ChatResponse) -> AdapterResult<String> {
    if let Some(error) = response.error {
        return Err(AdapterError::malformed(error));
    }
    response
        .message
        .map(|message| message.content)
        .ok_or_else(|| AdapterError::malformed("chat response had no message"))
}

pub fn extract_generate_text(response: GenerateResponse) -> AdapterResult<String> {
    if let Some(error) = response.error {
        return Err(AdapterError::malformed(error));
    }
    response
        .response
        .ok_or_else(|| AdapterError::malformed("generate response had no text"))
}

/// Handle one NDJSON line from `/api/chat`
pub fn decode_chat_line(line: &str) -> StreamAction {
    match serde_json::from_str::<ChatResponse>(line) {
        Ok(ChatResponse { error: Some(error), .. }) => StreamAction::Fail(AdapterError::malformed(error)),
        Ok(ChatResponse { message: Some(message), .. }) if !message.content.is_empty() => {
            StreamAction::Emit(message.content)
        }
        Ok(ChatResponse { done: true, .. }) => StreamAction::Finish,
        Ok(_) => StreamAction::Skip,
        Err(e) => StreamAction::Fail(AdapterError::malformed(format!("invalid stream line: {}", e))),
    }
}

/// Handle one NDJSON line from `/api/generate`
pub fn decode_generate_line(line: &str) -> StreamAction {
    match serde_json::from_str::<GenerateResponse>(line) {
        Ok(GenerateResponse { error: Some(error), .. }) => {
            StreamAction::Fail(AdapterError::malformed(error))
        }
        Ok(GenerateResponse { response: Some(text), .. }) if !text.is_empty() => {
            StreamAction::Emit(text)
        }
        Ok(GenerateResponse { done: true, .. }) => StreamAction::Finish,
        Ok(_) => StreamAction::Skip,
        Err(e) => StreamAction::Fail(AdapterError::malformed(format!("invalid stream line: {}", e))),
    }
}
