//! Utility functions and helpers.

pub mod clock;
pub mod geo;
pub mod http;

/// Cut `text` to at most `max_bytes` without splitting a UTF-8 sequence.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate_utf8("M4.2", 228), "M4.2");
    }

    #[test]
    fn truncate_respects_char_boundary() {
        // the siren is four bytes
        let text = "ab🚨cd";
        assert_eq!(truncate_utf8(text, 3), "ab");
        assert_eq!(truncate_utf8(text, 6), "ab🚨");
    }
}
