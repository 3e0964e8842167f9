// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting of texts longer than a single Telegram message.

/// Telegram rejects message texts longer than this many bytes of UTF-16;
/// staying under it in UTF-8 bytes is always safe.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Splits `text` at the last paragraph break, line break or space before
/// `max_len` bytes. Never splits inside a UTF-8 sequence.
pub fn split_at_boundary(text: &str, max_len: usize) -> (&str, &str) {
    if text.len() <= max_len {
        return (text, "");
    }

    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let region = &text[..cut];

    if let Some(pos) = region.rfind("\n\n") {
        return (&text[..pos], text[pos + 2..].trim_start());
    }
    if let Some(pos) = region.rfind('\n') {
        return (&text[..pos], text[pos + 1..].trim_start());
    }
    if let Some(pos) = region.rfind(' ') {
        return (&text[..pos], &text[pos + 1..]);
    }
    (&text[..cut], &text[cut..])
}

/// Breaks `text` into chunks that each fit in one message.
pub fn chunks(text: &str, max_len: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (head, tail) = split_at_boundary(rest, max_len);
        if head.is_empty() {
            // Only whitespace could produce this; stop rather than loop.
            break;
        }
        out.push(head);
        rest = tail;
    }
    if out.is_empty() {
        out.push(text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(split_at_boundary("Short text", 100), ("Short text", ""));
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let (first, rest) = split_at_boundary("A\nB\n\nC\nD", 6);
        assert_eq!(first, "A\nB");
        assert_eq!(rest, "C\nD");
    }

    #[test]
    fn falls_back_to_newline_then_space() {
        assert_eq!(
            split_at_boundary("First line\nSecond line that is longer", 20),
            ("First line", "Second line that is longer")
        );
        assert_eq!(
            split_at_boundary("OneLongWordThen another word", 20),
            ("OneLongWordThen", "another word")
        );
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        let text = "ééééé";
        let (first, rest) = split_at_boundary(text, 3);
        assert_eq!(first, "é");
        assert_eq!(rest, "éééé");
    }

    #[test]
    fn chunks_cover_the_whole_text() {
        let text = "Para 1.\n\nPara 2.\n\nPara 3 is very long and should cause a split.";
        let parts = chunks(text, 20);
        assert!(parts.iter().all(|p| p.len() <= 20));
        assert_eq!(parts[0], "Para 1.\n\nPara 2.");
        let words: Vec<&str> = parts.iter().flat_map(|p| p.split_whitespace()).collect();
        assert_eq!(words, text.split_whitespace().collect::<Vec<_>>());
    }
}
