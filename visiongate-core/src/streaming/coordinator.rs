//! Stream state machine and the caller-facing handle

use super::FragmentStream;
use crate::protocol::StreamEvent;
use crate::providers::error::{AdapterError, AdapterResult};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events buffered between producer and consumer before the producer waits
pub const CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of one streamed response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl StreamState {
    /// Whether no further events may be produced
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamStateError {
    #[error("stream already {0}; no further events accepted")]
    AlreadyTerminal(StreamState),
}

/// Converts backend fragments into the ordered event sequence
///
/// `Start` is emitted lazily with the first input of any kind, so a stream
/// that ends or fails before producing text still opens with `Start`.
/// Transitions out of `Completed` and `Failed` are refused.
#[derive(Debug, Default)]
pub struct StreamingCoordinator {
    state: StreamState,
    accumulated: String,
}

impl StreamingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Text received so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Partial text kept for diagnostics once the stream has failed
    pub fn partial_text(&self) -> Option<&str> {
        (self.state == StreamState::Failed).then_some(self.accumulated.as_str())
    }

    /// A text delta arrived
    pub fn on_fragment(
        &mut self,
        fragment: String,
    ) -> Result<Vec<StreamEvent>, StreamStateError> {
        let mut events = self.open()?;
        if !fragment.is_empty() {
            self.accumulated.push_str(&fragment);
            events.push(StreamEvent::Chunk(fragment));
        }
        Ok(events)
    }

    /// The backend closed the stream cleanly
    pub fn on_end(&mut self) -> Result<Vec<StreamEvent>, StreamStateError> {
        let mut events = self.open()?;
        self.state = StreamState::Completed;
        events.push(StreamEvent::Complete(self.accumulated.clone()));
        Ok(events)
    }

    /// A read or decode error ended the stream
    pub fn on_error(&mut self, cause: impl Into<String>) -> Result<Vec<StreamEvent>, StreamStateError> {
        let mut events = self.open()?;
        self.state = StreamState::Failed;
        events.push(StreamEvent::Error(cause.into()));
        Ok(events)
    }

    fn open(&mut self) -> Result<Vec<StreamEvent>, StreamStateError> {
        match self.state {
            StreamState::Idle => {
                self.state = StreamState::Streaming;
                Ok(vec![StreamEvent::Start])
            }
            StreamState::Streaming => Ok(Vec::new()),
            terminal => Err(StreamStateError::AlreadyTerminal(terminal)),
        }
    }
}

/// Item passed from the producer task to the handle
#[derive(Debug)]
enum Delivery {
    Event(StreamEvent),
    /// Terminal failure; the handle renders it as `StreamEvent::Error`
    Failed(AdapterError),
}

/// Consumer side of a streamed response
///
/// Yields `StreamEvent`s in order and closes after the terminal event.
/// Dropping the handle closes the channel; the producer task then stops
/// and releases the HTTP body.
pub struct StreamHandle {
    pending: VecDeque<StreamEvent>,
    receiver: Option<mpsc::Receiver<Delivery>>,
    accumulated: String,
    failure: Option<AdapterError>,
    finished: bool,
}

impl StreamHandle {
    fn from_receiver(receiver: mpsc::Receiver<Delivery>) -> Self {
        Self {
            pending: VecDeque::new(),
            receiver: Some(receiver),
            accumulated: String::new(),
            failure: None,
            finished: false,
        }
    }

    /// Handle that replays `Start` then `Complete(text)`
    ///
    /// Used when a caller asked for streaming but the backend answered in one piece.
    pub fn from_complete(text: impl Into<String>) -> Self {
        Self {
            pending: VecDeque::from([StreamEvent::Start, StreamEvent::Complete(text.into())]),
            receiver: None,
            accumulated: String::new(),
            failure: None,
            finished: false,
        }
    }

    /// Next event, or `None` once the sequence has ended
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.next().await
    }

    /// Running total of the chunk text delivered so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Whether the terminal event has been delivered
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The error that ended the stream, once its `Error` event has been delivered
    pub fn failure(&self) -> Option<&AdapterError> {
        self.failure.as_ref()
    }

    /// Drain the stream into the final text
    ///
    /// A mid-stream failure is returned with the kind the adapter gave it.
    pub async fn collect_text(mut self) -> AdapterResult<String> {
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Complete(text) => return Ok(text),
                StreamEvent::Error(cause) => {
                    return Err(self.failure.take().unwrap_or_else(|| {
                        AdapterError::network(format!("stream failed: {}", cause))
                    }))
                }
                StreamEvent::Start | StreamEvent::Chunk(_) => {}
            }
        }

        Err(AdapterError::network("stream ended without a terminal event"))
    }

    fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Chunk(text) => self.accumulated.push_str(text),
            StreamEvent::Complete(_) | StreamEvent::Error(_) => self.finished = true,
            StreamEvent::Start => {}
        }
    }
}

impl Stream for StreamHandle {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let polled = match this.pending.pop_front() {
            Some(event) => Poll::Ready(Some(event)),
            None => match this.receiver.as_mut() {
                Some(receiver) => match receiver.poll_recv(cx) {
                    Poll::Ready(Some(Delivery::Event(event))) => Poll::Ready(Some(event)),
                    Poll::Ready(Some(Delivery::Failed(err))) => {
                        let event = StreamEvent::Error(err.to_string());
                        this.failure = Some(err);
                        Poll::Ready(Some(event))
                    }
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Pending => Poll::Pending,
                },
                None => Poll::Ready(None),
            },
        };

        if let Poll::Ready(Some(event)) = &polled {
            this.observe(event);
        }
        polled
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("accumulated_len", &self.accumulated.len())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Drive `fragments` on a background task and return the consumer handle
///
/// Must be called from within a tokio runtime.
pub fn spawn_coordinated(fragments: FragmentStream) -> StreamHandle {
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(drive(fragments, sender));
    StreamHandle::from_receiver(receiver)
}

async fn drive(mut fragments: FragmentStream, sender: mpsc::Sender<Delivery>) {
    let mut coordinator = StreamingCoordinator::new();
    let mut failure = None;

    loop {
        let transition = tokio::select! {
            _ = sender.closed() => {
                debug!("Stream consumer went away after {} bytes", coordinator.accumulated().len());
                return;
            }
            next = fragments.next() => match next {
                Some(Ok(fragment)) => coordinator.on_fragment(fragment),
                Some(Err(e)) => {
                    warn!("Stream failed: {}", e);
                    let transition = coordinator.on_error(e.to_string());
                    failure = Some(e);
                    transition
                }
                None => coordinator.on_end(),
            },
        };

        let events = match transition {
            Ok(events) => events,
            Err(e) => {
                warn!("Dropping stream input: {}", e);
                return;
            }
        };

        for event in events {
            let terminal = event.is_terminal();
            let delivery = match event {
                StreamEvent::Error(cause) => match failure.take() {
                    Some(err) => Delivery::Failed(err),
                    None => Delivery::Event(StreamEvent::Error(cause)),
                },
                event => Delivery::Event(event),
            };
            if sender.send(delivery).await.is_err() {
                return;
            }
            if terminal {
                return;
            }
        }
    }
}
