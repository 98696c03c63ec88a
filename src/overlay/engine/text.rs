use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Column count with East Asian wide characters counted as two.
pub fn display_width(text: &str) -> usize {
    text.width()
}

pub fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}

pub(super) fn first_grapheme(text: &str) -> &str {
    text.graphemes(true).next().unwrap_or("")
}

pub(super) fn last_grapheme(text: &str) -> &str {
    text.graphemes(true).next_back().unwrap_or("")
}

/// Narrow graphemes belong to scripts that separate words with spaces.
pub(super) fn is_narrow(grapheme: &str) -> bool {
    display_width(grapheme) < 2
}

pub(crate) fn is_wide(grapheme: &str) -> bool {
    !is_narrow(grapheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_scripts_count_double() {
        assert_eq!(display_width("it"), 2);
        assert_eq!(display_width("日本"), 4);
        assert_eq!(display_width("aあ"), 3);
    }

    #[test]
    fn graphemes_are_not_chars() {
        assert_eq!(grapheme_count("e\u{301}te\u{301}"), 3);
        assert_eq!(grapheme_count("👍🏽ok"), 3);
        assert_eq!(grapheme_count(""), 0);
    }

    #[test]
    fn edge_graphemes() {
        assert_eq!(first_grapheme("漢字"), "漢");
        assert_eq!(last_grapheme("cafe\u{301}"), "e\u{301}");
        assert_eq!(last_grapheme(""), "");
        assert!(is_narrow(""));
        assert!(is_narrow("a"));
        assert!(is_wide("字"));
    }
}
