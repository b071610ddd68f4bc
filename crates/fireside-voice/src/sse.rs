//! **Stream Transcoder** — incremental framing for the SSE-style protocol both
//! backends speak.
//!
//! Both the chat-completions endpoint and the speech endpoint stream events as
//! `data: {json}` lines with a literal `data: [DONE]` sentinel. The decoder
//! here only frames; JSON extraction (text delta vs base64 audio) belongs to
//! the client driving it. Buffering is growable because synthesis payloads are
//! base64 and a single line can run to megabytes — a fixed-size line scanner
//! would truncate them. Bytes are buffered raw and only decoded once a line
//! completes: transport chunk boundaries can fall inside a multi-byte UTF-8
//! character, and decoding per feed would mangle the split character.

/// One framed event from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of one `data: ` line (JSON text, unparsed).
    Data(String),
    /// The `[DONE]` sentinel. No further events follow.
    Done,
}

/// Incremental SSE framer. Feed it raw body chunks as they arrive; it yields
/// complete events regardless of where chunk boundaries fall.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Append `bytes` and drain any events they complete.
    ///
    /// Non-`data:` lines (event names, comments, blank separators) are
    /// skipped. Everything after the sentinel is ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']).trim_start();
            if line.is_empty() {
                continue;
            }

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            if data == "[DONE]" {
                self.done = true;
                self.buffer.clear();
                events.push(SseEvent::Done);
                return events;
            }

            if !data.is_empty() {
                events.push(SseEvent::Data(data.to_string()));
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_complete_events_in_order() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_string()),
                SseEvent::Data("{\"a\":2}".to_string()),
            ]
        );
    }

    #[test]
    fn handles_event_split_across_feeds() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: {\"chunk\":\"he").is_empty());
        assert!(dec.feed(b"llo\"}").is_empty());
        let events = dec.feed(b"\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"chunk\":\"hello\"}".to_string())]
        );
    }

    #[test]
    fn multibyte_character_split_across_feeds_decodes_intact() {
        let full = "data: 你好\n".as_bytes();
        let mut dec = SseDecoder::new();
        // Boundary falls inside the first character (bytes 6..9).
        assert!(dec.feed(&full[..8]).is_empty());
        let events = dec.feed(&full[8..]);
        assert_eq!(events, vec![SseEvent::Data("你好".to_string())]);
    }

    #[test]
    fn done_sentinel_ends_stream_early() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {\"a\":1}\ndata: [DONE]\ndata: {\"a\":2}\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".to_string()), SseEvent::Done]
        );
        assert!(dec.is_done());
        assert!(dec.feed(b"data: {\"a\":3}\n").is_empty());
    }

    #[test]
    fn skips_non_data_lines() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: ping\n: comment\n\ndata: {\"x\":true}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":true}".to_string())]);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {\"a\":1}\r\ndata: [DONE]\r\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn long_single_line_is_not_truncated() {
        // Base64 audio payloads can exceed any fixed line budget.
        let payload = "A".repeat(512 * 1024);
        let mut dec = SseDecoder::new();
        let mut events = Vec::new();
        let full = format!("data: {}\n", payload);
        for chunk in full.as_bytes().chunks(4096) {
            events.extend(dec.feed(chunk));
        }
        assert_eq!(events.len(), 1);
        match &events[0] {
            SseEvent::Data(d) => assert_eq!(d.len(), payload.len()),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
