//! Protocol module for gateway request/response structures
//!
//! This module defines the canonical data model exchanged with the surrounding
//! application. These structures are designed to be:
//! - Provider-agnostic
//! - Immutable once handed to the gateway
//! - Serializable for persistence and diagnostics

pub mod types;

pub use types::{Message, MessageBuilder, Part, Role, StreamEvent};
