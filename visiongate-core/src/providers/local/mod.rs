//! Locally served model provider
//!
//! Local inference is slow, so generation calls use the long timeout.

mod client;
pub mod converter;
pub mod types;

pub use client::LocalAdapter;
pub use types::LocalProtocol;
