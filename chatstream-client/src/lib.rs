//! HTTP client for a streaming chat server.
//!
//! [`ChatClient`] posts a [`ChatRequest`] and routes the response by content
//! type: `text/event-stream` bodies go through the
//! [`chatstream_sse`] reassembler, anything else is read as one JSON
//! document. Either way the caller's [`StreamHandler`] sees the same
//! start/delta/error/done notifications.

pub mod client;
pub mod config;
pub(crate) mod error;

pub use client::ChatClient;
pub use config::ClientConfig;

pub use chatstream_sse::StreamOutcome;
pub use chatstream_types::{
    Accumulator, Callbacks, ChatRequest, ClientError, Completion, ErrorClass, Health,
    StartMetadata, StreamHandler,
};
pub use tokio_util::sync::CancellationToken;
