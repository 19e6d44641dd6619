//! Completions provider implementation
//!
//! This module provides an adapter for the hosted completions API, translating
//! between the gateway's message model and the `/chat/completions` format.
//! Images travel as base64 data URIs inside `image_url` content items.

mod client;
pub mod converter;
pub mod types;

pub use client::CompletionsAdapter;
pub use converter::{from_openai_messages, to_openai_messages};
