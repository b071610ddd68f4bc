//! **Text Chunker** — split long text into synthesis-safe segments.
//!
//! The speech backend caps input size (1024 bytes by default), so fragments
//! longer than that are cut into an ordered plan of sub-segments. Cuts prefer
//! sentence boundaries, then clause boundaries, and only force-cut as a last
//! resort. Concatenating the output in order always reproduces the input
//! byte-for-byte.

/// Sentence-terminating punctuation, wide and narrow.
const SENTENCE_ENDS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

/// Clause-separating punctuation, wide and narrow.
const CLAUSE_ENDS: [char; 5] = ['，', '、', '；', ',', ';'];

/// Split `text` into chunks of at most `max_len` bytes.
///
/// Within each window of up to `max_len` bytes the cut lands, in order of
/// preference: right after the last sentence terminator past the window
/// midpoint; right after the last clause separator past the midpoint; at 80%
/// of the window, nudged forward to the next character boundary so multi-byte
/// characters are never split. `max_len` must be at least 4 (the widest UTF-8
/// character) for the length bound to hold.
///
/// Empty input yields no chunks; input already within `max_len` yields one.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest.to_string());
            break;
        }

        let cut = cut_point(rest, max_len);
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    chunks
}

/// Find the byte offset to cut `text` at, given `text.len() > max_len`.
fn cut_point(text: &str, max_len: usize) -> usize {
    // Window must end on a character boundary so it can be scanned as text.
    let mut window_len = max_len.min(text.len());
    while window_len > 0 && !text.is_char_boundary(window_len) {
        window_len -= 1;
    }
    let window = &text[..window_len];
    let mid = window_len / 2;

    if let Some(cut) = last_punct_after(window, mid, &SENTENCE_ENDS) {
        return cut;
    }
    if let Some(cut) = last_punct_after(window, mid, &CLAUSE_ENDS) {
        return cut;
    }

    // Force-cut at 80% of the window, advancing past continuation bytes
    // (0b10xxxxxx) so a multi-byte character stays whole.
    let mut cut = (window_len * 4 / 5).max(1);
    let bytes = text.as_bytes();
    while cut < text.len() && bytes[cut] & 0xC0 == 0x80 {
        cut += 1;
    }
    cut
}

/// Byte offset just after the last occurrence in `window` of any char in
/// `puncts` whose end lies past `mid`, if any.
fn last_punct_after(window: &str, mid: usize, puncts: &[char]) -> Option<usize> {
    let mut best = None;
    for (i, c) in window.char_indices() {
        if puncts.contains(&c) {
            let end = i + c.len_utf8();
            if end > mid {
                best = Some(end);
            }
        }
    }
    best
}
