//! Callback surface for one streaming response.

use serde_json::{Map, Value};

use crate::error::ClientError;

/// Start metadata forwarded verbatim from the `begin` payload.
pub type StartMetadata = Map<String, Value>;

/// Receives the notifications produced while a response streams in.
///
/// Every method has a no-op default, so implementors only override the
/// callbacks they care about. Within one payload the callbacks fire in a
/// fixed order: start, error, delta, done.
pub trait StreamHandler {
    /// The stream has begun. `metadata` is the full decoded payload (it
    /// contains `begin` plus anything the server sent alongside it, such as
    /// the model identifier).
    fn on_start(&mut self, metadata: &StartMetadata) {
        let _ = metadata;
    }

    /// An incremental fragment of generated text.
    fn on_delta(&mut self, text: &str) {
        let _ = text;
    }

    /// A server-reported or transport error, as a display string.
    fn on_error(&mut self, message: &str) {
        let _ = message;
    }

    /// The stream is over. Fired once per session, whether it ended cleanly,
    /// with an error, or by cancellation.
    fn on_done(&mut self) {}
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_start(&mut self, metadata: &StartMetadata) {
        (**self).on_start(metadata);
    }

    fn on_delta(&mut self, text: &str) {
        (**self).on_delta(text);
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }

    fn on_done(&mut self) {
        (**self).on_done();
    }
}

impl<H: StreamHandler + ?Sized> StreamHandler for Box<H> {
    fn on_start(&mut self, metadata: &StartMetadata) {
        (**self).on_start(metadata);
    }

    fn on_delta(&mut self, text: &str) {
        (**self).on_delta(text);
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }

    fn on_done(&mut self) {
        (**self).on_done();
    }
}

type StartFn = Box<dyn FnMut(&StartMetadata) + Send>;
type TextFn = Box<dyn FnMut(&str) + Send>;
type DoneFn = Box<dyn FnMut() + Send>;

/// A [`StreamHandler`] assembled from optional closures.
///
/// Callbacks that are never set are silent no-ops.
///
/// ```
/// use chatstream_types::{Callbacks, StreamHandler};
///
/// let mut handler = Callbacks::new().with_delta(|text| print!("{text}"));
/// handler.on_delta("Hello");
/// handler.on_done();
/// ```
#[derive(Default)]
pub struct Callbacks {
    start: Option<StartFn>,
    delta: Option<TextFn>,
    error: Option<TextFn>,
    done: Option<DoneFn>,
}

impl Callbacks {
    /// Create a handler with no callbacks set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start callback.
    #[must_use]
    pub fn with_start(mut self, f: impl FnMut(&StartMetadata) + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    /// Set the delta callback.
    #[must_use]
    pub fn with_delta(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.delta = Some(Box::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn with_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Set the done callback.
    #[must_use]
    pub fn with_done(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.done = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("start", &self.start.is_some())
            .field("delta", &self.delta.is_some())
            .field("error", &self.error.is_some())
            .field("done", &self.done.is_some())
            .finish()
    }
}

impl StreamHandler for Callbacks {
    fn on_start(&mut self, metadata: &StartMetadata) {
        if let Some(f) = self.start.as_mut() {
            f(metadata);
        }
    }

    fn on_delta(&mut self, text: &str) {
        if let Some(f) = self.delta.as_mut() {
            f(text);
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(f) = self.error.as_mut() {
            f(message);
        }
    }

    fn on_done(&mut self) {
        if let Some(f) = self.done.as_mut() {
            f();
        }
    }
}

/// The assembled result of a fully consumed response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    /// All deltas concatenated in arrival order.
    pub text: String,
    /// Model identifier from the start metadata, if the server sent one.
    pub model: Option<String>,
}

/// A [`StreamHandler`] that concatenates deltas into a single string.
///
/// This is the accumulating calling mode: it sees exactly the same
/// notifications as a per-delta handler and builds the final text inside
/// its delta callback.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    text: String,
    metadata: Option<StartMetadata>,
    errors: Vec<String>,
    done: bool,
}

impl Accumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Metadata from the most recent start notification.
    #[must_use]
    pub fn metadata(&self) -> Option<&StartMetadata> {
        self.metadata.as_ref()
    }

    /// Error messages in the order they were reported.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether the done notification has been received.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Convert into a [`Completion`], or the first reported error.
    pub fn into_completion(self) -> Result<Completion, ClientError> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(ClientError::from_message(first));
        }
        let model = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("model"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Completion {
            text: self.text,
            model,
        })
    }
}

impl StreamHandler for Accumulator {
    fn on_start(&mut self, metadata: &StartMetadata) {
        self.metadata = Some(metadata.clone());
    }

    fn on_delta(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn on_done(&mut self) {
        self.done = true;
    }
}
