//! Provider abstraction and backend adapters
//!
//! This module implements the adapter layer that translates the gateway's
//! message model into each backend's wire format, plus the shared error
//! taxonomy and the bounded fallback chain used on recoverable failures.

pub mod adapter;
pub mod completions;
pub mod error;
pub mod fallback;
pub mod generative;
pub mod local;
pub mod messages;

pub use adapter::{AdapterCapabilities, AdapterRegistry, ProviderAdapter, ProviderKind};
pub use error::{AdapterError, AdapterResult, ErrorKind};
pub use fallback::FallbackChain;

// Re-export concrete adapters
pub use completions::CompletionsAdapter;
pub use generative::GenerativeAdapter;
pub use local::{LocalAdapter, LocalProtocol};
pub use messages::MessagesAdapter;
