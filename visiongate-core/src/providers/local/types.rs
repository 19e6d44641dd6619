//! Local model-serving API types

use serde::{Deserialize, Serialize};

/// Which endpoint of the local backend a request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalProtocol {
    /// `/api/chat`: role/content turns, images on the latest user turn
    Chat,
    /// `/api/generate`: one prompt plus a flat image list
    Generate,
}

impl LocalProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalProtocol::Chat => "chat",
            LocalProtocol::Generate => "generate",
        }
    }

    /// Endpoint path below the base URL
    pub fn path(&self) -> &'static str {
        match self {
            LocalProtocol::Chat => "/api/chat",
            LocalProtocol::Generate => "/api/generate",
        }
    }
}

/// `/api/chat` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ModelOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,

    /// Raw base64 images (no data-URI prefix)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// `/api/generate` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ModelOptions>,
}

/// Sampling options shared by both endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// `/api/chat` response, or one line of its NDJSON stream
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// `/api/generate` response, or one line of its NDJSON stream
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub error: Option<String>,
}

/// `/api/tags` response
#[derive(Debug, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TagEntry {
    pub name: String,
}
