//! Overlap injection.
//!
//! Every strategy shares one overlap rule: chunk *i* is prefixed with the
//! trailing *k* units of chunk *i-1*, where *i-1* is the already overlapped
//! output, so the window compounds:
//!
//! ```text
//! input:   ["The quick", "brown fox", "jumps"]         k = 3 characters
//!
//! out[0] = "The quick"
//! out[1] = "ick" + " " + "brown fox"   = "ick brown fox"
//! out[2] = "fox" + " " + "jumps"       = "fox jumps"
//!                 ^
//!            soft delimiter
//! ```
//!
//! ## Soft delimiter
//!
//! Sub-splitters often trim whitespace at their cuts. Gluing `"ick"` to
//! `"brown"` would yield `"ickbrown"`, which tokenizes as a different word.
//! When the tail is non-empty, the chunk is non-empty, and neither side has
//! whitespace at the join, exactly one ASCII space is inserted.
//!
//! ## Documents
//!
//! For [`Document`] sequences only the text changes. Each output keeps a copy
//! of the metadata of the input at the same position.

use crate::budget::Sizer;
use crate::document::Document;

/// Something whose text can be overlapped.
pub trait Overlappable: Clone {
    /// The current text.
    fn content(&self) -> &str;

    /// A copy of `self` with `text` as content.
    #[must_use]
    fn with_content(&self, text: String) -> Self;
}

impl Overlappable for String {
    fn content(&self) -> &str {
        self
    }

    fn with_content(&self, text: String) -> Self {
        text
    }
}

impl Overlappable for Document {
    fn content(&self) -> &str {
        &self.text
    }

    fn with_content(&self, text: String) -> Self {
        self.derive(text)
    }
}

/// Join an overlap tail to a chunk, inserting the soft delimiter if needed.
pub fn join_overlap(left: &str, right: &str) -> String {
    let needs_space = match (left.chars().next_back(), right.chars().next()) {
        (Some(l), Some(r)) => !l.is_whitespace() && !r.is_whitespace(),
        _ => false,
    };
    let mut joined = String::with_capacity(left.len() + right.len() + 1);
    joined.push_str(left);
    if needs_space {
        joined.push(' ');
    }
    joined.push_str(right);
    joined
}

/// Prefix each chunk after the first with the trailing `k` units of the
/// previous output chunk.
///
/// With `k == 0` or fewer than two chunks the input is returned unchanged.
///
/// ```rust
/// use docslabs::overlap::inject_overlap;
/// use docslabs::Sizer;
///
/// let chunks = vec!["The quick".to_string(), "brown fox".to_string()];
/// let out = inject_overlap(&chunks, 3, &Sizer::Characters);
/// assert_eq!(out, vec!["The quick", "ick brown fox"]);
/// ```
pub fn inject_overlap<T: Overlappable>(chunks: &[T], k: usize, sizer: &Sizer) -> Vec<T> {
    if k == 0 || chunks.len() < 2 {
        return chunks.to_vec();
    }

    let mut out: Vec<T> = Vec::with_capacity(chunks.len());
    out.push(chunks[0].clone());
    for chunk in &chunks[1..] {
        let prev = out
            .last()
            .map(|p| p.content().to_string())
            .unwrap_or_default();
        let tail = sizer.tail(&prev, k);
        out.push(chunk.with_content(join_overlap(&tail, chunk.content())));
    }
    out
}

/// Overlap for an externally supplied unit name (`"tokens"` or `"characters"`).
///
/// # Errors
///
/// Returns [`crate::Error::InvalidOverlapUnit`] for any other unit.
pub fn inject_overlap_named<T: Overlappable>(
    chunks: &[T],
    k: usize,
    unit: &str,
    tokens: std::sync::Arc<dyn crate::tokenizer::TokenMeasure>,
) -> crate::Result<Vec<T>> {
    let unit = unit.parse()?;
    Ok(inject_overlap(chunks, k, &Sizer::new(unit, tokens)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TiktokenMeasure;
    use std::sync::Arc;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_zero_overlap_is_identity() {
        let chunks = strings(&["a", "b", "c"]);
        assert_eq!(inject_overlap(&chunks, 0, &Sizer::Characters), chunks);
    }

    #[test]
    fn test_single_chunk_is_identity() {
        let chunks = strings(&["only"]);
        assert_eq!(inject_overlap(&chunks, 3, &Sizer::Characters), chunks);
    }

    #[test]
    fn test_overlap_compounds_from_output() {
        let chunks = strings(&["abcd", "ef", "gh"]);
        let out = inject_overlap(&chunks, 3, &Sizer::Characters);
        // out[1] = "bcd" + " " + "ef"; out[2] takes its tail from out[1].
        assert_eq!(out, strings(&["abcd", "bcd ef", " ef gh"]));
    }

    #[test]
    fn test_soft_delimiter_rules() {
        assert_eq!(join_overlap("ab", "cd"), "ab cd");
        assert_eq!(join_overlap("ab ", "cd"), "ab cd");
        assert_eq!(join_overlap("ab", "\ncd"), "ab\ncd");
        assert_eq!(join_overlap("", "cd"), "cd");
        assert_eq!(join_overlap("ab", ""), "ab");
    }

    #[test]
    fn test_documents_keep_own_metadata() {
        let docs = vec![
            Document::from_source("first part", "a.md", 0),
            Document::from_source("second part", "a.md", 1),
        ];
        let mut out = inject_overlap(&docs, 4, &Sizer::Characters);
        assert_eq!(out[1].text, "part second part");
        assert_eq!(out[1].page(), 1);

        out[0].metadata.insert("x".into(), 1.into());
        assert!(!out[1].metadata.contains_key("x"));
        assert!(!docs[0].metadata.contains_key("x"));
    }

    #[test]
    fn test_token_overlap_prefix_matches_tail() {
        let tokens = Arc::new(TiktokenMeasure::new("cl100k_base").unwrap());
        let sizer = Sizer::Tokens(tokens);
        let chunks = strings(&["one two three four", "five six seven"]);
        let out = inject_overlap(&chunks, 2, &sizer);
        assert!(out[1].starts_with(&sizer.tail(&out[0], 2)));
        assert!(out[1].ends_with("five six seven"));
    }

    #[test]
    fn test_named_unit_rejects_unknown() {
        let tokens: Arc<dyn crate::tokenizer::TokenMeasure> =
            Arc::new(TiktokenMeasure::new("cl100k_base").unwrap());
        let chunks = strings(&["a", "b"]);
        let err = inject_overlap_named(&chunks, 1, "words", Arc::clone(&tokens)).unwrap_err();
        assert!(err.to_string().contains("'tokens' or 'characters'"));
        assert!(inject_overlap_named(&chunks, 1, "characters", tokens).is_ok());
    }

    #[test]
    fn test_emoji_overlap_has_no_orphans() {
        let tokens = Arc::new(TiktokenMeasure::new("cl100k_base").unwrap());
        let sizer = Sizer::Tokens(tokens);
        let chunks = strings(&["work 👩‍💻👩‍💻", "👩‍💻 more work", "end 👨‍👩‍👧"]);
        for k in 1..6 {
            for chunk in inject_overlap(&chunks, k, &sizer) {
                assert!(!crate::grapheme::has_orphan_edge(&chunk), "k={k}: {chunk:?}");
                assert!(String::from_utf16(&chunk.encode_utf16().collect::<Vec<_>>()).is_ok());
            }
        }
    }
}
