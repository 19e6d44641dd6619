//! Newline-delimited JSON framing for the local backend

use super::{FragmentStream, StreamAction};
use crate::providers::error::AdapterError;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use std::io;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;

/// Decode an NDJSON body into text fragments
///
/// Blank lines are skipped; every other line is handed to `decode`. Read
/// failures end the stream with a `Network` error.
pub fn decode_ndjson<S, F>(body: S, decode: F) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: FnMut(&str) -> StreamAction + Send + 'static,
{
    let reader = StreamReader::new(body.map_err(io::Error::other));
    let lines = Box::pin(LinesStream::new(reader.lines()));

    Box::pin(stream::unfold(
        (lines, decode, false),
        |(mut lines, mut decode, done)| async move {
            if done {
                return None;
            }

            loop {
                match lines.next().await? {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => match decode(line.trim()) {
                        StreamAction::Emit(text) => {
                            return Some((Ok(text), (lines, decode, false)))
                        }
                        StreamAction::Skip => continue,
                        StreamAction::Finish => return None,
                        StreamAction::Fail(err) => return Some((Err(err), (lines, decode, true))),
                    },
                    Err(e) => {
                        let err = AdapterError::network(format!("NDJSON stream error: {}", e));
                        return Some((Err(err), (lines, decode, true)));
                    }
                }
            }
        },
    ))
}
