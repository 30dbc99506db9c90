//! Recursive token splitting (paragraph accumulation).
//!
//! Accumulates paragraph-like segments under a token or character budget.
//!
//! ## The Algorithm
//!
//! Given separator `"\n\n"` and budget `100`:
//!
//! ```text
//! 1. Split on "\n\n" (paragraphs)
//! 2. For each paragraph:
//!    - buffer + paragraph + "\n\n" fits?  -> append
//!    - otherwise flush the buffer, then
//!        paragraph + "\n\n" fits?         -> it starts the next buffer
//!        paragraph alone is oversized     -> greedy slicing:
//!            take the longest prefix whose size (with separator) fits,
//!            emit it, continue after it
//! 3. Flush the trailing buffer
//! 4. Inject overlap (if any)
//! ```
//!
//! ## Known Limitation
//!
//! Only the first (highest-priority) separator is used. Secondary separators
//! in the list do not drive further recursive splitting; oversized paragraphs
//! fall straight through to greedy slicing. Slices are cut on grapheme
//! cluster boundaries so a slice never ends inside a multi-code-point
//! character.

use crate::budget::Sizer;
use crate::config::ChunkConfig;
use crate::grapheme;
use crate::overlap::inject_overlap;
use crate::{Error, Result, Splitter};

/// Paragraph-accumulating greedy splitter with per-unit budgets.
///
/// ## Example
///
/// ```rust
/// use docslabs::{RecursiveTokenSplitter, Splitter};
///
/// let splitter = RecursiveTokenSplitter::characters(12, 0, &["---"]).unwrap();
/// let chunks = splitter.split_text("A---B---C").unwrap();
/// assert_eq!(chunks, vec!["A---B---C---"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveTokenSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    sizer: Sizer,
}

impl RecursiveTokenSplitter {
    /// Create a splitter.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - Budget per chunk, in the sizer's unit
    /// * `chunk_overlap` - Overlap window, in the sizer's unit
    /// * `separators` - Separator list; only the first is used
    /// * `sizer` - Measurement unit
    ///
    /// # Errors
    ///
    /// Rejects `chunk_size == 0` and `chunk_overlap >= chunk_size`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: &[impl AsRef<str>],
        sizer: Sizer,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::OverlapExceedsSize {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        let mut separators: Vec<String> =
            separators.iter().map(|s| s.as_ref().to_string()).collect();
        if separators.is_empty() {
            separators.push("\n\n".to_string());
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
            sizer,
        })
    }

    /// Create a character-budget splitter.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn characters(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: &[&str],
    ) -> Result<Self> {
        Self::new(chunk_size, chunk_overlap, separators, Sizer::Characters)
    }

    /// Build from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configured encoding cannot be loaded.
    pub fn from_config(cfg: &ChunkConfig) -> Result<Self> {
        let sizer = Sizer::from_config(cfg)?;
        Self::new(
            cfg.chunk_size(),
            cfg.chunk_overlap(),
            &cfg.separators(),
            sizer,
        )
    }

    /// The separator actually used for splitting.
    pub fn primary_separator(&self) -> &str {
        &self.separators[0]
    }

    /// The sizer.
    pub fn sizer(&self) -> &Sizer {
        &self.sizer
    }

    /// Split into segments on the primary separator.
    fn segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let sep = self.primary_separator();
        if sep.is_empty() {
            return grapheme::segment(text);
        }
        text.split(sep).filter(|s| !s.is_empty()).collect()
    }

    /// Greedily slice an oversized segment into windows that fit.
    fn slice_oversized(&self, segment: &str, out: &mut Vec<String>) {
        let sep = self.primary_separator();
        let clusters = grapheme::segment(segment);
        let mut cursor = 0;

        while cursor < clusters.len() {
            let rest = &clusters[cursor..];
            let take = self.longest_fitting_prefix(rest, sep).max(1);
            let mut window: String = rest[..take].concat();
            window.push_str(sep);
            out.push(window);
            cursor += take;
        }
    }

    /// Largest `n` such that `rest[..n] + sep` is within budget.
    ///
    /// Equivalent to shrinking from the full remainder one cluster at a time,
    /// but with a logarithmic number of measurements.
    fn longest_fitting_prefix(&self, rest: &[&str], sep: &str) -> usize {
        let fits = |n: usize| {
            let mut candidate: String = rest[..n].concat();
            candidate.push_str(sep);
            !self.sizer.exceeds(&candidate, self.chunk_size)
        };

        if fits(rest.len()) {
            return rest.len();
        }
        let (mut lo, mut hi) = (0, rest.len());
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Split without overlap.
    fn split_raw(&self, text: &str) -> Vec<String> {
        let sep = self.primary_separator();
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for segment in self.segments(text) {
            let mut candidate = String::with_capacity(buffer.len() + segment.len() + sep.len());
            candidate.push_str(&buffer);
            candidate.push_str(segment);
            candidate.push_str(sep);

            if !self.sizer.exceeds(&candidate, self.chunk_size) {
                buffer = candidate;
                continue;
            }

            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }

            let mut alone = String::with_capacity(segment.len() + sep.len());
            alone.push_str(segment);
            alone.push_str(sep);
            if self.sizer.exceeds(&alone, self.chunk_size) {
                self.slice_oversized(segment, &mut chunks);
            } else {
                buffer = alone;
            }
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }
        chunks
    }
}

impl Splitter for RecursiveTokenSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(vec![]);
        }
        let chunks = self.split_raw(text);
        if self.chunk_overlap == 0 {
            return Ok(chunks);
        }
        Ok(inject_overlap(&chunks, self.chunk_overlap, &self.sizer))
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }
}
