//! Property-based tests: chunk-boundary independence and delimiter conventions.

use chatstream_sse::{Event, Reassembler};
use proptest::prelude::*;

fn arb_payload() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(r#"{"begin":true,"model":"m"}"#.to_string()),
        "[a-zA-Z0-9 \u{e9}\u{4e2d}\u{1f600}]{0,12}".prop_map(|t| serde_json::json!({ "delta": t }).to_string()),
        "[a-z ]{1,12}".prop_map(|t| serde_json::json!({ "error": t }).to_string()),
        Just(r#"{"done":true}"#.to_string()),
        Just("[DONE]".to_string()),
        Just("{not json".to_string()),
    ]
}

fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => arb_payload().prop_map(|p| format!("data: {p}")),
        1 => Just(": keep-alive".to_string()),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Delim {
    Lf,
    Crlf,
}

impl Delim {
    fn as_str(self) -> &'static str {
        match self {
            Delim::Lf => "\n\n",
            Delim::Crlf => "\r\n\r\n",
        }
    }
}

fn arb_delim() -> impl Strategy<Value = Delim> {
    prop_oneof![Just(Delim::Lf), Just(Delim::Crlf)]
}

fn body(segments: &[(String, Delim)]) -> Vec<u8> {
    segments
        .iter()
        .flat_map(|(s, d)| format!("{s}{}", d.as_str()).into_bytes())
        .collect()
}

fn feed_all(chunks: &[&[u8]]) -> Vec<Event> {
    let mut r = Reassembler::new();
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(r.feed(chunk));
    }
    out.extend(r.finish());
    out
}

fn split_at_offsets<'a>(bytes: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = offsets.iter().map(|o| o % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();
    let mut chunks = Vec::new();
    let mut prev = 0;
    for cut in cuts {
        chunks.push(&bytes[prev..cut]);
        prev = cut;
    }
    chunks.push(&bytes[prev..]);
    chunks
}

proptest! {
    #[test]
    fn chunk_boundaries_do_not_change_events(
        segments in proptest::collection::vec((arb_segment(), arb_delim()), 0..8),
        offsets in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let bytes = body(&segments);
        let whole = feed_all(&[bytes.as_slice()]);
        let chunks = split_at_offsets(&bytes, &offsets);
        let pieces = feed_all(&chunks);
        prop_assert_eq!(whole, pieces);
    }

    #[test]
    fn byte_at_a_time_matches_whole(
        segments in proptest::collection::vec((arb_segment(), arb_delim()), 0..6),
    ) {
        let bytes = body(&segments);
        let whole = feed_all(&[bytes.as_slice()]);
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        prop_assert_eq!(whole, feed_all(&singles));
    }

    #[test]
    fn delimiter_convention_does_not_change_events(
        payloads in proptest::collection::vec(arb_segment(), 0..8),
        mixed in proptest::collection::vec(arb_delim(), 8),
    ) {
        let lf: Vec<_> = payloads.iter().map(|p| (p.clone(), Delim::Lf)).collect();
        let crlf: Vec<_> = payloads.iter().map(|p| (p.clone(), Delim::Crlf)).collect();
        let mix: Vec<_> = payloads.iter().cloned().zip(mixed.iter().copied()).collect();

        let a = feed_all(&[body(&lf).as_slice()]);
        let b = feed_all(&[body(&crlf).as_slice()]);
        let c = feed_all(&[body(&mix).as_slice()]);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }

    #[test]
    fn unterminated_final_event_is_recovered(text in "[a-z]{1,10}") {
        let bytes = format!("data: {}", serde_json::json!({ "delta": text }));
        let events = feed_all(&[bytes.as_bytes()]);
        prop_assert_eq!(events.len(), 1);
        let delta = events[0].delta();
        prop_assert_eq!(delta.as_deref(), Some(text.as_str()));
    }
}
