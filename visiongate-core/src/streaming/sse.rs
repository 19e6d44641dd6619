//! Server-Sent Events framing for the hosted backends

use super::{FragmentStream, StreamAction};
use crate::providers::error::AdapterError;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{stream, Stream, StreamExt};

/// Decode an SSE body into text fragments
///
/// `decode` receives each event's type (`"message"` when unnamed) and data.
/// Transport errors end the stream with a `Network` error.
pub fn decode_sse<S, F>(body: S, decode: F) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: FnMut(&str, &str) -> StreamAction + Send + 'static,
{
    let events = Box::pin(body.eventsource());

    Box::pin(stream::unfold(
        (events, decode, false),
        |(mut events, mut decode, done)| async move {
            if done {
                return None;
            }

            loop {
                match events.next().await? {
                    Ok(event) => match decode(&event.event, &event.data) {
                        StreamAction::Emit(text) => {
                            return Some((Ok(text), (events, decode, false)))
                        }
                        StreamAction::Skip => continue,
                        StreamAction::Finish => return None,
                        StreamAction::Fail(err) => return Some((Err(err), (events, decode, true))),
                    },
                    Err(e) => {
                        let err = AdapterError::network(format!("SSE stream error: {}", e));
                        return Some((Err(err), (events, decode, true)));
                    }
                }
            }
        },
    ))
}
