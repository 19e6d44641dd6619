//! Messages provider implementation
//!
//! Block-typed content, a separate `system` field, and a hard per-image
//! limit enforced by compressing (or dropping) images before encoding.

mod client;
pub mod converter;
pub mod types;

pub use client::MessagesAdapter;
pub use converter::DEFAULT_MAX_TOKENS;
