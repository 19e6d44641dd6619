//! Visiongate Core Library
//!
//! A gateway that sends provider-neutral "analyze these inputs" requests
//! (text plus images) to one of several AI backends, handling wire-format
//! translation, streaming, fallbacks and image size limits.
//!
//! ```no_run
//! use visiongate_core::{Gateway, Message, ProviderConfig, ProviderKind};
//!
//! # async fn run() -> Result<(), visiongate_core::AdapterError> {
//! let gateway = Gateway::with_defaults()?;
//! let config = ProviderConfig::new(ProviderKind::LocalModel, "llava");
//! let answer = gateway
//!     .complete(&[Message::user("What is in this picture?")], &config)
//!     .await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gateway;
pub mod http;
pub mod imaging;
pub mod protocol;
pub mod providers;
pub mod streaming;

pub use config::{GatewayConfig, ProviderConfig};
pub use gateway::{Gateway, GatewayResponse};
pub use imaging::{CompressedImage, CompressionError, CompressionTarget, ImageCompressor};
pub use protocol::{Message, MessageBuilder, Part, Role, StreamEvent};
pub use providers::{
    AdapterError, AdapterRegistry, AdapterResult, ErrorKind, ProviderAdapter, ProviderKind,
};
pub use streaming::StreamHandle;

/// Returns the version of the Visiongate Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
