#![deny(missing_docs)]
//! Shared vocabulary for streaming chat completions.
//!
//! This crate holds everything the reassembler and the HTTP client agree on:
//!
//! - [`StreamHandler`]: the four optional callbacks (start, delta, error, done)
//!   a caller supplies to observe one streaming response.
//! - [`Callbacks`] and [`Accumulator`]: ready-made handlers for the per-delta
//!   and the single-concatenated-result calling modes.
//! - [`ChatRequest`] and friends: the JSON bodies exchanged with the chat server.
//! - [`ClientError`] and [`ErrorClass`]: the error taxonomy and user guidance.

pub mod error;
pub mod handler;
pub mod request;

pub use error::*;
pub use handler::*;
pub use request::*;
