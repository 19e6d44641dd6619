//! Generative-content provider implementation
//!
//! The backend does not model role history for vision requests, so every
//! turn is flattened into a single user turn of text and inline-data parts.

mod client;
pub mod converter;
pub mod types;

pub use client::GenerativeAdapter;
pub use converter::PLACEHOLDER_TEXT;
