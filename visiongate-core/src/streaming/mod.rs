//! Uniform streaming delivery
//!
//! Adapters turn their backend's native framing (SSE or NDJSON) into a
//! [`FragmentStream`] of text deltas. The coordinator turns that into the
//! ordered `Start`, `Chunk`*, `Complete | Error` event sequence callers see.

pub mod coordinator;
pub mod ndjson;
pub mod sse;

pub use coordinator::{
    spawn_coordinated, StreamHandle, StreamState, StreamStateError, StreamingCoordinator,
    CHANNEL_CAPACITY,
};

use crate::providers::error::{AdapterError, AdapterResult};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Text deltas produced by an adapter, in generation order
pub type FragmentStream = Pin<Box<dyn Stream<Item = AdapterResult<String>> + Send>>;

/// What a framing decoder should do with one decoded record
#[derive(Debug)]
pub enum StreamAction {
    /// Yield a text delta
    Emit(String),
    /// Ignore the record
    Skip,
    /// The backend signalled a clean end of stream
    Finish,
    /// The backend reported an error inside the stream
    Fail(AdapterError),
}

/// Tag every in-stream error with the backend and model it came from
pub fn with_error_context(
    fragments: FragmentStream,
    provider: impl Into<String>,
    model: impl Into<String>,
) -> FragmentStream {
    let provider = provider.into();
    let model = model.into();
    Box::pin(fragments.map(move |item| {
        item.map_err(|err| err.with_context(provider.as_str(), model.as_str()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_in_stream_errors_gain_backend_context() {
        let fragments: FragmentStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(AdapterError::malformed("truncated frame")),
        ]));

        let items: Vec<_> = with_error_context(fragments, "local_model", "llava")
            .collect()
            .await;

        assert_eq!(items[0].as_ref().unwrap(), "partial");
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.provider, "local_model");
        assert_eq!(err.model, "llava");
        assert!(err.to_string().starts_with("[local_model/llava] Malformed response"));
    }
}
