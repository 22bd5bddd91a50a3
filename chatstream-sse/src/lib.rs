//! Stream reassembly for incrementally delivered chat completions.
//!
//! The server sends a subset of the event-stream format:
//!
//! ```text
//! data: {"begin":true,"model":"openai/gpt-oss-120b"}
//!
//! data: {"delta":"Hel"}
//!
//! data: {"delta":"lo"}
//!
//! data: {"done":true}
//!
//! ```
//!
//! Events are separated by `\n\n` or `\r\n\r\n` (proxies may rewrite line
//! endings, so both can appear in the same stream). [`Reassembler`] turns raw
//! network chunks into [`Event`]s, [`Session`] dispatches them to a
//! [`StreamHandler`](chatstream_types::StreamHandler) with a uniform
//! lifecycle, and [`drive`] runs the whole read loop with cooperative
//! cancellation.

pub mod event;
pub mod reassembler;
pub mod session;

pub use event::{DATA_PREFIX, DONE_SENTINEL, Event, decode_segment, is_truthy, value_text};
pub use reassembler::Reassembler;
pub use session::{Session, StreamItem, StreamOutcome, drive, events};
