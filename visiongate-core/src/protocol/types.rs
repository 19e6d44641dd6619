//! Core protocol types for gateway requests
//!
//! This module contains the provider-neutral conversation model handed to the
//! gateway by the surrounding application, plus the event type used to deliver
//! streamed answers. The design prioritizes:
//! - Immutability once a request is built (adapters translate, never mutate)
//! - Decoded binary for images (encoding is an adapter concern)
//! - A closed set of stream events with a fixed ordering contract

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
}

impl Role {
    /// Wire name shared by every backend that models roles
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized label used when turns are flattened into a transcript
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One atomic piece of message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Text content part
    Text { text: String },
    /// Fully decoded image bytes with their declared MIME type
    Image {
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
        mime_type: String,
    },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create an image part from decoded bytes
    pub fn image(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Part::Image {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Text of a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text.as_str()),
            Part::Image { .. } => None,
        }
    }

    /// Whether this is an image part
    pub fn is_image(&self) -> bool {
        matches!(self, Part::Image { .. })
    }

    /// Byte size of an image part (zero for text)
    pub fn image_len(&self) -> usize {
        match self {
            Part::Image { bytes, .. } => bytes.len(),
            Part::Text { .. } => 0,
        }
    }
}

/// A turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Ordered content parts
    pub parts: Vec<Part>,
}

/// Event delivered to a streaming caller
///
/// A well-formed sequence is one `Start`, zero or more `Chunk`s in generation
/// order, then exactly one of `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The backend started producing output
    Start,
    /// Incremental text fragment
    Chunk(String),
    /// Stream ended cleanly, carrying the full accumulated text
    Complete(String),
    /// Stream failed, carrying a rendered cause
    Error(String),
}

impl StreamEvent {
    /// Whether this event ends the sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }
}

// ============================================================================
// Builder and convenience constructors
// ============================================================================

/// Builder for constructing multimodal messages
pub struct MessageBuilder {
    role: Role,
    parts: Vec<Part>,
}

impl MessageBuilder {
    /// Create a new message builder for a role
    pub fn new(role: Role) -> Self {
        Self {
            role,
            parts: Vec::new(),
        }
    }

    /// Append a text part
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::text(text));
        self
    }

    /// Append an image part
    pub fn image(mut self, bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        self.parts.push(Part::image(bytes, mime_type));
        self
    }

    /// Append an already-built part
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Build the message
    pub fn build(self) -> Message {
        Message {
            role: self.role,
            parts: self.parts,
        }
    }
}

impl Message {
    /// Create a message from a role and parts
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        MessageBuilder::new(Role::System).text(content).build()
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        MessageBuilder::new(Role::User).text(content).build()
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        MessageBuilder::new(Role::Assistant).text(content).build()
    }

    /// Create a user message with a prompt followed by images
    pub fn user_with_images(
        prompt: impl Into<String>,
        images: impl IntoIterator<Item = (Vec<u8>, String)>,
    ) -> Self {
        let mut builder = MessageBuilder::new(Role::User).text(prompt);
        for (bytes, mime_type) in images {
            builder = builder.image(bytes, mime_type);
        }
        builder.build()
    }

    /// Concatenated text of all text parts, separated by newlines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Image parts as `(bytes, mime_type)` pairs
    pub fn images(&self) -> impl Iterator<Item = (&[u8], &str)> {
        self.parts.iter().filter_map(|part| match part {
            Part::Image { bytes, mime_type } => Some((bytes.as_slice(), mime_type.as_str())),
            Part::Text { .. } => None,
        })
    }

    /// Whether the message carries any image or non-blank text
    pub fn has_content(&self) -> bool {
        self.parts.iter().any(|part| match part {
            Part::Text { text } => !text.trim().is_empty(),
            Part::Image { bytes, .. } => !bytes.is_empty(),
        })
    }
}

/// Serde adapter encoding image bytes as standard base64
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
