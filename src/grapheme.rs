//! Grapheme cluster segmentation.
//!
//! A user-perceived character can span several code points:
//!
//! ```text
//! "👩‍💻"  =  U+1F469  U+200D  U+1F4BB      (woman, ZWJ, laptop)
//! "é"   =  U+0065   U+0301               (e, combining acute)
//! ```
//!
//! Cutting between those code points leaves an orphan (a dangling ZWJ, a
//! combining accent with no base). Chunk boundaries are therefore placed on
//! extended grapheme cluster boundaries (UAX #29).

use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into extended grapheme clusters, in order.
pub fn segment(text: &str) -> Vec<&str> {
    text.graphemes(true).collect()
}

/// Number of extended grapheme clusters in `text`.
pub fn count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Whether `c` can only appear after a base character.
pub fn is_orphan_prone(c: char) -> bool {
    matches!(c,
        '\u{200D}'                      // zero width joiner
        | '\u{FE00}'..='\u{FE0F}'       // variation selectors
        | '\u{E0100}'..='\u{E01EF}'
        | '\u{0300}'..='\u{036F}'       // combining diacritics
        | '\u{1AB0}'..='\u{1AFF}'
        | '\u{1DC0}'..='\u{1DFF}'
        | '\u{20D0}'..='\u{20FF}'
        | '\u{FE20}'..='\u{FE2F}'
        | '\u{1F3FB}'..='\u{1F3FF}'     // skin tone modifiers
        | '\u{E0020}'..='\u{E007F}'     // tag characters
    )
}

/// Drop leading code points that would be orphaned at the start of a chunk.
///
/// Used after slicing by tokens or characters, where the cut can land inside
/// a cluster.
pub fn trim_orphaned_head(text: &str) -> &str {
    text.trim_start_matches(is_orphan_prone)
}

/// Whether a chunk starts or ends with an orphaned combining code point.
pub fn has_orphan_edge(text: &str) -> bool {
    text.chars().next().is_some_and(is_orphan_prone) || text.ends_with('\u{200D}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zwj_sequence_is_one_cluster() {
        let clusters = segment("a👩‍💻b");
        assert_eq!(clusters, vec!["a", "👩‍💻", "b"]);
    }

    #[test]
    fn test_combining_accent_is_one_cluster() {
        assert_eq!(count("e\u{301}x"), 2);
    }

    #[test]
    fn test_trim_orphaned_head() {
        assert_eq!(trim_orphaned_head("\u{200D}💻 rest"), "💻 rest");
        assert_eq!(trim_orphaned_head("\u{301}abc"), "abc");
        assert_eq!(trim_orphaned_head("abc"), "abc");
    }

    #[test]
    fn test_has_orphan_edge() {
        assert!(has_orphan_edge("\u{200D}x"));
        assert!(has_orphan_edge("x\u{200D}"));
        assert!(!has_orphan_edge("👩‍💻"));
        assert!(!has_orphan_edge(""));
    }
}
