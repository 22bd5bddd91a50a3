//! Session lifecycle and the async read loop.

use std::fmt::Display;

use chatstream_types::{StartMetadata, StreamHandler};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::reassembler::Reassembler;

/// How a streaming session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The byte source was exhausted.
    Completed,
    /// The caller cancelled the session. Not an error.
    Cancelled,
    /// A transport failure ended the session. Holds the message that was
    /// passed to the error callback.
    Failed(String),
}

impl StreamOutcome {
    /// Whether the byte source was read to the end.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the caller cancelled the session.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The transport error message, if the session failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Forwards every callback, but lets `on_done` through only once.
struct DoneOnce<H> {
    inner: H,
    done: bool,
}

impl<H: StreamHandler> StreamHandler for DoneOnce<H> {
    fn on_start(&mut self, metadata: &StartMetadata) {
        self.inner.on_start(metadata);
    }

    fn on_delta(&mut self, text: &str) {
        self.inner.on_delta(text);
    }

    fn on_error(&mut self, message: &str) {
        self.inner.on_error(message);
    }

    fn on_done(&mut self) {
        if self.done {
            tracing::trace!("suppressing repeated done notification");
            return;
        }
        self.done = true;
        self.inner.on_done();
    }
}

/// One request/response exchange.
///
/// Owns the [`Reassembler`] buffer and the caller's handler. Ending the
/// session consumes it, so the lifecycle can only end once; the done
/// callback fires exactly once whether the stream carried a `done` marker,
/// failed, or was cancelled.
pub struct Session<H> {
    handler: DoneOnce<H>,
    reassembler: Reassembler,
    events: usize,
}

impl<H: StreamHandler> Session<H> {
    /// Start a session that reports to `handler`.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self {
            handler: DoneOnce {
                inner: handler,
                done: false,
            },
            reassembler: Reassembler::new(),
            events: 0,
        }
    }

    /// The caller's handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler.inner
    }

    /// Number of events dispatched so far.
    #[must_use]
    pub fn events_dispatched(&self) -> usize {
        self.events
    }

    /// Feed one network chunk and dispatch every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) {
        for event in self.reassembler.feed(chunk) {
            self.dispatch(&event);
        }
    }

    /// Deliver a text fragment that did not come from the event stream
    /// (the plain-JSON fallback path).
    pub fn delta(&mut self, text: &str) {
        self.handler.on_delta(text);
    }

    /// Report an error that did not come from the event stream.
    pub fn error(&mut self, message: &str) {
        self.handler.on_error(message);
    }

    fn dispatch(&mut self, event: &Event) {
        self.events += 1;
        tracing::trace!(
            start = event.is_start(),
            error = event.error_message().is_some(),
            delta = event.delta().is_some(),
            done = event.is_done(),
            "dispatching event"
        );
        event.dispatch(&mut self.handler);
    }

    /// The byte source is exhausted: recover a trailing unterminated event,
    /// then end the lifecycle.
    pub fn complete(mut self) -> StreamOutcome {
        if let Some(event) = self.reassembler.finish() {
            tracing::debug!("recovered unterminated final event");
            self.dispatch(&event);
        }
        self.handler.on_done();
        StreamOutcome::Completed
    }

    /// A transport failure: report it, discard the residual buffer, end the lifecycle.
    pub fn fail(mut self, message: impl Into<String>) -> StreamOutcome {
        let message = message.into();
        self.handler.on_error(&message);
        self.handler.on_done();
        StreamOutcome::Failed(message)
    }

    /// Caller-initiated cancellation: end the lifecycle without an error.
    pub fn cancel(mut self) -> StreamOutcome {
        self.handler.on_done();
        StreamOutcome::Cancelled
    }
}

/// Run the read loop for one response body.
///
/// Each chunk is fed to a [`Session`] as it arrives. The loop ends on end of
/// stream, on the first read error, or when `cancel` fires, whichever comes
/// first; cancellation wins if it is already signalled when a chunk is ready.
/// No timeout is applied here.
pub async fn drive<S, B, E, H>(byte_stream: S, handler: H, cancel: CancellationToken) -> StreamOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    H: StreamHandler,
{
    let mut session = Session::new(handler);
    let mut byte_stream = std::pin::pin!(byte_stream);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(events = session.events_dispatched(), "stream cancelled");
                return session.cancel();
            }
            next = byte_stream.next() => match next {
                Some(Ok(chunk)) => session.feed(chunk.as_ref()),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "stream read error");
                    return session.fail(format!("stream read error: {e}"));
                }
                None => {
                    tracing::debug!(events = session.events_dispatched(), "stream finished");
                    return session.complete();
                }
            }
        }
    }
}

/// An item of the pull-style event stream returned by [`events`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A decoded event.
    Event(Event),
    /// The byte source failed. Always the last item.
    TransportError(String),
}

/// Adapt a byte stream into a stream of decoded events.
///
/// The trailing unterminated event (if any) is recovered when the byte
/// stream ends. A read error yields [`StreamItem::TransportError`] and ends
/// the stream.
pub fn events<S, B, E>(byte_stream: S) -> impl Stream<Item = StreamItem> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut reassembler = Reassembler::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield StreamItem::TransportError(format!("stream read error: {e}"));
                    return;
                }
            };

            for event in reassembler.feed(chunk.as_ref()) {
                yield StreamItem::Event(event);
            }
        }

        if let Some(event) = reassembler.finish() {
            yield StreamItem::Event(event);
        }
    }
}
