//! Size measurement in the configured unit.
//!
//! Chunk budgets and overlap windows are expressed either in tokens or in
//! characters. [`Sizer`] hides the difference from the splitters:
//!
//! ```text
//!                 size("naïve café")     tail(.., 3)
//! Characters      10                     "afé"
//! Tokens          ~4  (encoding-dependent)  decode(last 3 ids)
//! ```
//!
//! Token tails are decoded from the trailing ids, so they are not always an
//! exact substring: BPE merges differ at the cut. A tail whose first id starts
//! inside a multi-byte character fails to decode; the window then shrinks from
//! the front until it decodes. Either way the tail never begins with an
//! orphaned combining code point.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::{ChunkConfig, OverlapUnit};
use crate::grapheme;
use crate::tokenizer::{TiktokenMeasure, TokenMeasure};
use crate::Result;

/// Measures text in tokens or characters.
#[derive(Debug, Clone)]
pub enum Sizer {
    /// Token counts from a tokenizer.
    Tokens(Arc<dyn TokenMeasure>),
    /// Unicode scalar values.
    Characters,
}

impl Sizer {
    /// A sizer for `unit`; the tokenizer is only used for [`OverlapUnit::Tokens`].
    pub fn new(unit: OverlapUnit, tokens: Arc<dyn TokenMeasure>) -> Self {
        match unit {
            OverlapUnit::Tokens => Self::Tokens(tokens),
            OverlapUnit::Characters => Self::Characters,
        }
    }

    /// The sizer for a configuration's overlap unit and encoding.
    ///
    /// # Errors
    ///
    /// Fails if the configured encoding cannot be loaded.
    pub fn from_config(cfg: &ChunkConfig) -> Result<Self> {
        Ok(match cfg.overlap_unit() {
            OverlapUnit::Characters => Self::Characters,
            OverlapUnit::Tokens => Self::Tokens(Arc::new(TiktokenMeasure::new(cfg.encoding_name())?)),
        })
    }

    /// The measurement unit.
    pub const fn unit(&self) -> OverlapUnit {
        match self {
            Self::Tokens(_) => OverlapUnit::Tokens,
            Self::Characters => OverlapUnit::Characters,
        }
    }

    /// Size of `text`.
    pub fn size(&self, text: &str) -> usize {
        match self {
            Self::Tokens(m) => m.count(text),
            Self::Characters => text.chars().count(),
        }
    }

    /// Compare the size of `text` against `budget`.
    ///
    /// - `Ordering::Less`/`Equal`: fits
    /// - `Ordering::Greater`: must split
    pub fn fits(&self, text: &str, budget: usize) -> Ordering {
        self.size(text).cmp(&budget)
    }

    /// Whether `text` exceeds `budget`.
    pub fn exceeds(&self, text: &str, budget: usize) -> bool {
        self.fits(text, budget) == Ordering::Greater
    }

    /// The trailing `k` units of `text`.
    pub fn tail(&self, text: &str, k: usize) -> String {
        if k == 0 || text.is_empty() {
            return String::new();
        }
        let raw = match self {
            Self::Tokens(m) => token_tail(m.as_ref(), text, k),
            Self::Characters => char_tail(text, k).to_string(),
        };
        grapheme::trim_orphaned_head(&raw).to_string()
    }
}

fn char_tail(text: &str, k: usize) -> &str {
    match text.char_indices().rev().nth(k - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

fn token_tail(m: &dyn TokenMeasure, text: &str, k: usize) -> String {
    let ids = m.encode(text);
    let mut start = ids.len().saturating_sub(k);
    while start < ids.len() {
        if let Ok(decoded) = m.decode(&ids[start..]) {
            return decoded;
        }
        start += 1;
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Sizer {
        Sizer::Tokens(Arc::new(TiktokenMeasure::new("cl100k_base").unwrap()))
    }

    #[test]
    fn test_char_size_counts_scalars() {
        assert_eq!(Sizer::Characters.size("日本語"), 3);
        assert_eq!(Sizer::Characters.size(""), 0);
    }

    #[test]
    fn test_char_tail() {
        assert_eq!(Sizer::Characters.tail("abcdef", 3), "def");
        assert_eq!(Sizer::Characters.tail("ab", 5), "ab");
        assert_eq!(Sizer::Characters.tail("abc", 0), "");
        assert_eq!(Sizer::Characters.tail("a日本語", 2), "本語");
    }

    #[test]
    fn test_char_tail_never_starts_with_orphan() {
        // Last two scalars of the ZWJ sequence are ZWJ + laptop.
        let tail = Sizer::Characters.tail("x👩‍💻", 2);
        assert_eq!(tail, "💻");
    }

    #[test]
    fn test_token_tail() {
        let s = tokens();
        let text = "alpha beta gamma delta";
        let tail = s.tail(text, 2);
        assert!(text.ends_with(&tail), "{tail:?}");
        assert_eq!(s.size(&tail), 2);
    }

    #[test]
    fn test_token_tail_on_emoji_decodes() {
        let s = tokens();
        let text = "done 👩‍💻👩‍💻";
        for k in 1..8 {
            let tail = s.tail(text, k);
            assert!(!grapheme::has_orphan_edge(&tail), "k={k}: {tail:?}");
        }
    }

    #[test]
    fn test_from_config_follows_overlap_unit() {
        let chars = ChunkConfig::builder()
            .chunk_size(32)
            .chunk_overlap(4)
            .overlap_unit(OverlapUnit::Characters)
            .build()
            .unwrap();
        assert_eq!(Sizer::from_config(&chars).unwrap().unit(), OverlapUnit::Characters);

        let toks = ChunkConfig::builder()
            .chunk_size(32)
            .chunk_overlap(4)
            .overlap_unit(OverlapUnit::Tokens)
            .build()
            .unwrap();
        let sizer = Sizer::from_config(&toks).unwrap();
        assert_eq!(sizer.unit(), OverlapUnit::Tokens);
        assert_eq!(sizer.size("hello world"), 2);
    }

    #[test]
    fn test_fits() {
        assert_eq!(Sizer::Characters.fits("abc", 4), Ordering::Less);
        assert_eq!(Sizer::Characters.fits("abcd", 4), Ordering::Equal);
        assert!(Sizer::Characters.exceeds("abcde", 4));
    }
}
