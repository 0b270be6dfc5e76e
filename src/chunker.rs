//! Transport-safe text chunking.
//!
//! Long process output has to be delivered as several messages, each under the
//! transport's size ceiling. Splitting prefers line boundaries and only cuts a
//! line in the middle when that single line is longer than the ceiling.

/// Reference ceiling per outbound message, in characters.
///
/// Telegram's hard limit is 4096; the gap leaves headroom for formatting.
pub const TELEGRAM_CHUNK_SIZE: usize = 3500;

/// Sent in place of an empty reply so the operator never sees silence.
pub const NO_TEXT_PLACEHOLDER: &str = "[no text returned]";

/// Split `text` into ordered chunks of at most `max_len` characters.
///
/// Lines (newline retained) are packed into a buffer while they fit; a full
/// buffer is flushed with trailing whitespace trimmed. A line longer than
/// `max_len` is hard-cut into `max_len`-sized pieces and its remainder starts
/// the next buffer.
///
/// The result is never empty: an empty `text` yields the placeholder, and an
/// input that trims away to nothing falls back to its first `max_len`
/// characters.
///
/// `max_len` of zero is treated as one.
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![NO_TEXT_PLACEHOLDER.to_string()];
    }

    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffered = 0usize;

    for line in text.split_inclusive('\n') {
        let mut line = line;
        let mut line_len = line.chars().count();

        if buffered + line_len <= max_len {
            buffer.push_str(line);
            buffered += line_len;
            continue;
        }

        flush(&mut buffer, &mut chunks);
        buffered = 0;

        while line_len > max_len {
            let cut = byte_offset(line, max_len);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
            line_len -= max_len;
        }

        if !line.is_empty() {
            buffer.push_str(line);
            buffered = line_len;
        }
    }

    flush(&mut buffer, &mut chunks);

    if chunks.is_empty() {
        let cut = byte_offset(text, max_len);
        chunks.push(text[..cut].to_string());
    }

    chunks
}

/// Push the trimmed buffer as a chunk (if anything survives trimming) and
/// reset it.
fn flush(buffer: &mut String, chunks: &mut Vec<String>) {
    let trimmed = buffer.trim_end();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    buffer.clear();
}

/// Byte index just past the first `chars` characters of `s` (or `s.len()`).
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn split_empty_returns_placeholder() {
        assert_eq!(split("", 10), vec![NO_TEXT_PLACEHOLDER.to_string()]);
        assert_eq!(split("", 1), vec![NO_TEXT_PLACEHOLDER.to_string()]);
    }

    #[test]
    fn split_short_message_single_chunk() {
        assert_eq!(split("hello", 3500), vec!["hello"]);
    }

    #[test]
    fn split_trims_trailing_whitespace_of_final_chunk() {
        assert_eq!(split("up 3 days\n\n", 100), vec!["up 3 days"]);
    }

    #[test]
    fn split_several_short_lines_fit_one_chunk() {
        let text = "one\ntwo\nthree\n";
        let chunks = split(text, 20);
        assert_eq!(chunks, vec!["one\ntwo\nthree"]);
    }

    #[test]
    fn split_packs_lines_until_limit() {
        // Each line is 4 chars including the newline.
        let text = "aaa\nbbb\nccc\nddd\n";
        let chunks = split(text, 8);
        assert_eq!(chunks, vec!["aaa\nbbb", "ccc\nddd"]);
    }

    #[test]
    fn split_line_exactly_at_limit_is_kept_whole() {
        let chunks = split("abcd", 4);
        assert_eq!(chunks, vec!["abcd"]);
    }

    #[test]
    fn split_long_single_line_is_hard_cut() {
        let m = 10;
        let line = "x".repeat(3 * m + 5);
        let chunks = split(&line, m);
        assert!(chunks.len() >= 4);
        for chunk in &chunks[..3] {
            assert_eq!(char_len(chunk), m);
        }
        assert_eq!(chunks.concat(), line);
    }

    #[test]
    fn split_long_line_after_buffered_text_flushes_first() {
        let text = format!("head\n{}\ntail", "y".repeat(25));
        let chunks = split(&text, 10);
        assert_eq!(chunks[0], "head");
        assert_eq!(chunks[1], "y".repeat(10));
        assert_eq!(chunks[2], "y".repeat(10));
        // Remainder of the long line and the tail share a buffer.
        assert_eq!(chunks[3], "yyyyy\ntail");
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn split_unicode_safe() {
        let text = "🦀".repeat(7);
        let chunks = split(&text, 3);
        assert_eq!(chunks, vec!["🦀🦀🦀", "🦀🦀🦀", "🦀"]);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let text = "héllo\nwörld\n";
        let chunks = split(text, 12);
        assert_eq!(chunks, vec!["héllo\nwörld"]);
    }

    #[test]
    fn split_whitespace_only_falls_back_to_raw_prefix() {
        let chunks = split("   \n  ", 4);
        assert_eq!(chunks, vec!["   \n"]);
    }

    #[test]
    fn split_zero_limit_treated_as_one() {
        let chunks = split("abc", 0);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[test]
    fn split_never_exceeds_limit_and_never_empty() {
        let inputs = [
            "a",
            "a\n",
            "\n\n\n",
            "line one\nline two is a little longer\n\nshort\n",
            "0123456789012345678901234567890123456789",
            "mixed 🦀 unicode\nand ascii lines\n\tindented\n",
        ];
        for text in inputs {
            for m in 1..=12 {
                let chunks = split(text, m);
                assert!(!chunks.is_empty(), "no chunks for {text:?} at {m}");
                for chunk in &chunks {
                    assert!(char_len(chunk) <= m, "chunk {chunk:?} over {m}");
                    assert!(!chunk.is_empty(), "empty chunk for {text:?} at {m}");
                }
            }
        }
    }

    #[test]
    fn split_preserves_order_of_content() {
        let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let chunks = split(&text, 64);
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
        let original: Vec<&str> = text.lines().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn reference_ceiling_is_3500() {
        assert_eq!(TELEGRAM_CHUNK_SIZE, 3500);
    }
}
