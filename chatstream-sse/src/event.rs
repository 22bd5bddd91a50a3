//! Decoding of a single event segment and multi-field dispatch.

use std::borrow::Cow;

use chatstream_types::{StartMetadata, StreamHandler};
use serde_json::Value;

/// Prefix of the payload line within a segment.
pub const DATA_PREFIX: &str = "data:";

/// Payload that marks stream termination. Never parsed as JSON.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event payload.
///
/// A payload is not a single exclusive kind: `begin`, `error`, `delta` and
/// `done` are checked independently, and any combination may be present.
/// A field counts as present when its value is truthy (`null`, `false`,
/// `0` and `""` do not count).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    payload: StartMetadata,
}

impl Event {
    /// Wrap an already decoded JSON object.
    #[must_use]
    pub fn new(payload: StartMetadata) -> Self {
        Self { payload }
    }

    /// The decoded JSON object.
    #[must_use]
    pub fn payload(&self) -> &StartMetadata {
        &self.payload
    }

    /// Consume the event, returning the decoded JSON object.
    #[must_use]
    pub fn into_payload(self) -> StartMetadata {
        self.payload
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name).filter(|v| is_truthy(v))
    }

    /// Whether the payload carries the `begin` marker.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.field("begin").is_some()
    }

    /// The `error` field as a display string.
    ///
    /// Strings are used as-is; any other value is serialized to JSON.
    #[must_use]
    pub fn error_message(&self) -> Option<Cow<'_, str>> {
        self.field("error").map(value_text)
    }

    /// The `delta` field coerced to text.
    #[must_use]
    pub fn delta(&self) -> Option<Cow<'_, str>> {
        self.field("delta").map(value_text)
    }

    /// Whether the payload carries the `done` marker.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.field("done").is_some()
    }

    /// Fire every applicable callback, in order: start, error, delta, done.
    ///
    /// An error that arrives alongside the final delta is therefore seen
    /// before the stream is marked done.
    pub fn dispatch<H: StreamHandler + ?Sized>(&self, handler: &mut H) {
        if self.is_start() {
            handler.on_start(&self.payload);
        }
        if let Some(message) = self.error_message() {
            handler.on_error(&message);
        }
        if let Some(text) = self.delta() {
            handler.on_delta(&text);
        }
        if self.is_done() {
            handler.on_done();
        }
    }
}

/// Whether a JSON value counts as present: anything except `null`, `false`,
/// `0` and `""`.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a JSON value: strings verbatim, anything else as compact JSON.
#[must_use]
pub fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Decode one segment (the text between two delimiters).
///
/// Only the first line starting with [`DATA_PREFIX`] is considered. Returns
/// `None` (silently) when the segment has no such line, when the payload is
/// empty or [`DONE_SENTINEL`], or when the payload is not a JSON object.
/// Malformed payloads never abort the stream.
#[must_use]
pub fn decode_segment(segment: &str) -> Option<Event> {
    let payload = segment
        .lines()
        .find_map(|line| line.strip_prefix(DATA_PREFIX))?
        .trim();

    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Some(Event::new(map)),
        Ok(other) => {
            tracing::debug!(payload = %other, "dropping non-object event payload");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed event payload");
            None
        }
    }
}
