//! Chunk buffering and event boundary detection.

use crate::event::{Event, decode_segment};

const LF_DELIMITER: &str = "\n\n";
const CRLF_DELIMITER: &str = "\r\n\r\n";

/// Converts an incremental byte feed into discrete [`Event`]s.
///
/// Owns the buffer for one response. Chunks may be split anywhere, including
/// inside a delimiter or inside a multi-byte UTF-8 sequence; the events
/// produced are the same as if the whole body had arrived at once.
///
/// ```
/// use chatstream_sse::Reassembler;
///
/// let mut reassembler = Reassembler::new();
/// assert!(reassembler.feed(b"data: {\"delta\":\"Hel").is_empty());
/// let events = reassembler.feed(b"lo\"}\n\ndata: {\"done\":true}");
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].delta().as_deref(), Some("Hello"));
///
/// // The server closed without a trailing delimiter.
/// let last = reassembler.finish().unwrap();
/// assert!(last.is_done());
/// ```
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Decoded text not yet consumed as a segment.
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl Reassembler {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in arrival order.
    ///
    /// Segments without a payload line, with an empty or `[DONE]` payload, or
    /// with an unparseable payload are consumed without producing an event.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        if self.pending.is_empty() {
            self.decode(chunk);
        } else {
            let mut bytes = std::mem::take(&mut self.pending);
            bytes.extend_from_slice(chunk);
            self.decode(&bytes);
        }

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some((start, len)) = find_boundary(&self.buffer[consumed..]) {
            let segment = &self.buffer[consumed..consumed + start];
            if let Some(event) = decode_segment(segment) {
                events.push(event);
            }
            consumed += start + len;
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Append already-decoded text. Equivalent to `feed(chunk.as_bytes())`.
    pub fn feed_str(&mut self, chunk: &str) -> Vec<Event> {
        self.feed(chunk.as_bytes())
    }

    /// Best-effort decode of whatever remains once the byte source is exhausted.
    ///
    /// Recovers a final event the server wrote without a trailing delimiter.
    /// The buffer is empty afterwards.
    pub fn finish(&mut self) -> Option<Event> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let residual = std::mem::take(&mut self.buffer);
        if residual.trim().is_empty() {
            return None;
        }
        decode_segment(&residual)
    }

    /// The unconsumed remainder of the buffer.
    #[must_use]
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Decode `bytes` into the text buffer, holding back an incomplete
    /// trailing sequence. Invalid sequences become U+FFFD.
    fn decode(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Locate the leftmost delimiter of either convention.
///
/// Returns the delimiter's byte offset and length. A `\r\n\r\n` that starts
/// before the first `\n\n` must also end by the end of that `\n\n`, so the
/// second search never looks past it.
fn find_boundary(buffer: &str) -> Option<(usize, usize)> {
    match buffer.find(LF_DELIMITER) {
        Some(lf) => {
            let window = &buffer[..lf + LF_DELIMITER.len()];
            Some(match window.find(CRLF_DELIMITER) {
                Some(crlf) if crlf < lf => (crlf, CRLF_DELIMITER.len()),
                _ => (lf, LF_DELIMITER.len()),
            })
        }
        None => buffer
            .find(CRLF_DELIMITER)
            .map(|crlf| (crlf, CRLF_DELIMITER.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| e.delta().map(|d| d.into_owned()))
            .collect()
    }

    #[test]
    fn boundary_prefers_leftmost() {
        assert_eq!(find_boundary("a\n\nb\r\n\r\n"), Some((1, 2)));
        assert_eq!(find_boundary("a\r\n\r\nb\n\n"), Some((1, 4)));
        assert_eq!(find_boundary("a\r\nb\n"), None);
        assert_eq!(find_boundary(""), None);
    }

    #[test]
    fn crlf_pair_does_not_contain_lf_pair() {
        assert_eq!(find_boundary("x\r\n\r\n"), Some((1, 4)));
    }

    #[test]
    fn crlf_ending_inside_lf_pair_window() {
        assert_eq!(find_boundary("x\r\n\r\n\n\n"), Some((1, 4)));
        assert_eq!(find_boundary("x\n\n\u{e9}\r\n\r\n"), Some((1, 2)));
    }

    #[test]
    fn large_single_chunk_is_linear() {
        const EVENTS: usize = 100_000;
        let body = "data: {\"delta\":\"x\"}\n\n".repeat(EVENTS);
        let mut r = Reassembler::new();

        let started = std::time::Instant::now();
        let events = r.feed(body.as_bytes());
        let elapsed = started.elapsed();

        assert_eq!(events.len(), EVENTS);
        assert_eq!(r.buffered(), "");
        assert!(
            elapsed < std::time::Duration::from_secs(10),
            "feeding {} bytes took {elapsed:?}",
            body.len()
        );
    }

    #[test]
    fn large_crlf_chunk_with_partial_tail() {
        let mut body = "data: {\"delta\":\"y\"}\r\n\r\n".repeat(20_000);
        body.push_str("data: {\"delta\":\"tail\"}");
        let mut r = Reassembler::new();
        let events = r.feed(body.as_bytes());
        assert_eq!(events.len(), 20_000);
        assert_eq!(r.buffered(), "data: {\"delta\":\"tail\"}");
    }

    #[test]
    fn two_events_in_one_chunk() {
        let mut r = Reassembler::new();
        let events = r.feed(b"data: {\"delta\":\"a\"}\n\ndata: {\"delta\":\"b\"}\n\n");
        assert_eq!(deltas(&events), vec!["a", "b"]);
        assert_eq!(r.buffered(), "");
    }

    #[test]
    fn partial_event_stays_buffered() {
        let mut r = Reassembler::new();
        assert!(r.feed(b"data: {\"delta\":\"a\"}\n").is_empty());
        assert_eq!(r.buffered(), "data: {\"delta\":\"a\"}\n");
        let events = r.feed(b"\n");
        assert_eq!(deltas(&events), vec!["a"]);
        assert_eq!(r.buffered(), "");
    }

    #[test]
    fn crlf_delimiter_split_across_chunks() {
        let mut r = Reassembler::new();
        assert!(r.feed(b"data: {\"delta\":\"a\"}\r\n\r").is_empty());
        let events = r.feed(b"\ndata: {\"delta\":\"b\"}\r\n\r\n");
        assert_eq!(deltas(&events), vec!["a", "b"]);
    }

    #[test]
    fn mixed_conventions_keep_arrival_order() {
        let mut r = Reassembler::new();
        let events = r.feed(
            b"data: {\"delta\":\"1\"}\r\n\r\ndata: {\"delta\":\"2\"}\n\ndata: {\"delta\":\"3\"}\r\n\r\n",
        );
        assert_eq!(deltas(&events), vec!["1", "2", "3"]);
    }

    #[test]
    fn remainder_after_extraction_is_exact() {
        let mut r = Reassembler::new();
        r.feed(b"data: {\"delta\":\"a\"}\r\n\r\ndata: {\"del");
        assert_eq!(r.buffered(), "data: {\"del");
    }

    #[test]
    fn keep_alive_and_sentinel_produce_nothing() {
        let mut r = Reassembler::new();
        let events = r.feed(b": keep-alive\n\ndata: [DONE]\n\n");
        assert!(events.is_empty());
        assert_eq!(r.buffered(), "");
    }

    #[test]
    fn malformed_event_does_not_disturb_neighbours() {
        let mut r = Reassembler::new();
        let events = r.feed(b"data: {\"delta\":\"a\"}\n\ndata: {oops\n\ndata: {\"delta\":\"b\"}\n\n");
        assert_eq!(deltas(&events), vec!["a", "b"]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let body = "data: {\"delta\":\"h\u{e9}llo \u{1f600}\"}\n\n".as_bytes();
        let split = body.iter().position(|&b| b == 0xF0).unwrap() + 2;
        let mut r = Reassembler::new();
        assert!(r.feed(&body[..split]).is_empty());
        let events = r.feed(&body[split..]);
        assert_eq!(deltas(&events), vec!["h\u{e9}llo \u{1f600}"]);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut r = Reassembler::new();
        let events = r.feed(b"data: {\"delta\":\"a\xFFb\"}\n\n");
        assert_eq!(deltas(&events), vec!["a\u{fffd}b"]);
    }

    #[test]
    fn invalid_bytes_between_valid_text() {
        let mut r = Reassembler::new();
        let events = r.feed(b"data: {\"delta\":\"\xC3\xA9\xFF\xFEok\xE2\x82\xAC\"}\n\n");
        assert_eq!(deltas(&events), vec!["\u{e9}\u{fffd}\u{fffd}ok\u{20ac}"]);
    }

    #[test]
    fn invalid_byte_before_incomplete_tail() {
        let mut r = Reassembler::new();
        assert!(r.feed(b"data: {\"delta\":\"a\xFFb\xE2\x82").is_empty());
        let events = r.feed(b"\xAC\"}\n\n");
        assert_eq!(deltas(&events), vec!["a\u{fffd}b\u{20ac}"]);
    }

    #[test]
    fn finish_recovers_unterminated_event() {
        let mut r = Reassembler::new();
        assert!(r.feed(b"data: {\"delta\":\"tail\"}").is_empty());
        let event = r.finish().unwrap();
        assert_eq!(event.delta().as_deref(), Some("tail"));
        assert_eq!(r.buffered(), "");
    }

    #[test]
    fn finish_recovers_event_with_single_newline() {
        let mut r = Reassembler::new();
        r.feed(b"data: {\"done\":true}\r\n");
        assert!(r.finish().unwrap().is_done());
    }

    #[test]
    fn finish_drops_unparseable_residual() {
        let mut r = Reassembler::new();
        r.feed(b"data: {\"delta\":\"cut");
        assert!(r.finish().is_none());
        assert_eq!(r.buffered(), "");
    }

    #[test]
    fn finish_drops_residual_without_data_line() {
        let mut r = Reassembler::new();
        r.feed(b"event: message");
        assert!(r.finish().is_none());
    }

    #[test]
    fn finish_on_empty_buffer() {
        let mut r = Reassembler::new();
        r.feed(b"data: {\"delta\":\"a\"}\n\n");
        assert!(r.finish().is_none());
    }

    #[test]
    fn finish_flushes_incomplete_utf8_lossily() {
        let mut r = Reassembler::new();
        r.feed(b"data: {\"delta\":\"x\"}\n\n\xE2\x82");
        assert!(r.finish().is_none());
    }

    #[test]
    fn feed_str_matches_feed() {
        let mut a = Reassembler::new();
        let mut b = Reassembler::new();
        let text = "data: {\"delta\":\"x\"}\n\n";
        assert_eq!(a.feed_str(text), b.feed(text.as_bytes()));
    }
}
