//! Logging helpers: single-line escaping for player-supplied strings and a
//! compact label for sessions.

use std::fmt::Write;

/// Longest escaped preview of a single value, in characters.
pub const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging, capped at [`MAX_PREVIEW`] characters.
pub fn escape_log(s: &str) -> String {
    escape_log_limited(s, MAX_PREVIEW)
}

/// Like [`escape_log`] with an explicit character limit. Newlines, tabs and
/// backslashes get their usual escapes; other control characters become
/// `\xNN`. A value cut short ends with an ellipsis.
pub fn escape_log_limited(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 8);
    let mut chars = s.chars();
    for ch in chars.by_ref().take(limit) {
        push_escaped(&mut out, ch);
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c.is_control() => {
            let _ = write!(out, "\\x{:02X}", c as u32);
        }
        c => out.push(c),
    }
}

/// `owner/save_id` with both halves escaped.
pub fn session_label(owner: &str, save_id: &str) -> String {
    format!("{}/{}", escape_log(owner), escape_log(save_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_control_characters() {
        assert_eq!(escape_log("Line1\nLine2\r\tEnd"), "Line1\\nLine2\\r\\tEnd");
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }

    #[test]
    fn test_truncates_long_values() {
        let long = "x".repeat(500);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), 201);
    }

    #[test]
    fn test_exact_limit_not_marked() {
        assert_eq!(escape_log_limited("abcd", 4), "abcd");
        assert_eq!(escape_log_limited("abcde", 4), "abcd…");
    }

    #[test]
    fn test_session_label() {
        assert_eq!(session_label("al\nice", "s1"), "al\\nice/s1");
    }
}
