//! Small text helpers shared across crates.

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One-line preview for log messages.
pub fn preview(s: &str, max: usize) -> String {
    let line = s.replace('\n', " ");
    if line.chars().count() > max {
        format!("{}...", truncate_chars(&line, max))
    } else {
        line
    }
}
