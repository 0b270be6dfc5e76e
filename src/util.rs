//! Small helpers shared across modules.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-codepoint.
///
/// ```
/// use teleshell::util::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
/// assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
/// assert_eq!(truncate_with_ellipsis("", 10), "");
/// ```
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// Seconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_are_unchanged() {
        assert_eq!(truncate_with_ellipsis("uptime", 10), "uptime");
        assert_eq!(truncate_with_ellipsis("uptime", 6), "uptime");
    }

    #[test]
    fn long_strings_get_ellipsis() {
        assert_eq!(
            truncate_with_ellipsis("restart raspberrino", 7),
            "restart..."
        );
    }

    #[test]
    fn trailing_whitespace_is_trimmed_before_ellipsis() {
        assert_eq!(truncate_with_ellipsis("kodi  stop", 5), "kodi...");
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        assert_eq!(truncate_with_ellipsis("✅✅✅✅", 2), "✅✅...");
        assert_eq!(truncate_with_ellipsis("🔄 Initiating", 1), "🔄...");
    }

    #[test]
    fn zero_limit() {
        assert_eq!(truncate_with_ellipsis("df", 0), "...");
    }

    #[test]
    fn timestamp_is_after_2020() {
        assert!(unix_timestamp() > 1_577_836_800);
    }
}
