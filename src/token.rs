//! Grapheme-safe greedy token splitting.
//!
//! Fills chunks one grapheme cluster at a time, so a boundary never lands
//! inside a multi-code-point character.
//!
//! ## Linear Cost Tracking
//!
//! The naive loop re-encodes the whole buffer after every append:
//!
//! ```text
//! for cluster in clusters:
//!     buffer += cluster
//!     if count(buffer) > budget: ...      <- O(len(buffer)) per step, O(N²) total
//! ```
//!
//! Instead the buffer's token count is carried forward and each append is
//! priced on a short tail window:
//!
//! ```text
//! delta = count(window + cluster) - count(window)      window = last W clusters
//! ```
//!
//! The window starts at the most recent word boundary (the tokenizer's
//! pre-split never merges across it), falling back to the last few clusters
//! for unspaced scripts. A window estimate can read zero even when the true
//! count grows (digit runs pre-split into groups of three from the run start,
//! so the window's grouping differs from the buffer's). The running count is
//! therefore re-synced with an exact count every few estimated appends, which
//! keeps the accumulated drift below the margin. Once the running count comes
//! within that margin of the budget, appends are measured exactly on the whole
//! buffer, so drift can never push a chunk over budget. Each cluster costs at
//! most three encodes; each flush costs a handful more.
//!
//! ## Overflow
//!
//! ```text
//! buffer + cluster > budget
//!   -> flush buffer as a chunk
//!   -> cluster alone > budget?  emit it verbatim, start empty
//!   -> else next buffer = overlap tail of the flushed chunk + cluster
//! ```

use std::sync::Arc;

use crate::budget::Sizer;
use crate::config::ChunkConfig;
use crate::grapheme;
use crate::tokenizer::TokenMeasure;
use crate::{Error, Result, Splitter};

/// Clusters priced together when no word boundary is nearby.
const PRICE_WINDOW: usize = 8;

/// How far back to look for a word boundary.
const WORD_LOOKBACK: usize = 32;

/// Grapheme-cluster-aware greedy splitter.
///
/// ## Example
///
/// ```rust
/// use docslabs::{Splitter, UnicodeSafeTokenSplitter};
///
/// let splitter = UnicodeSafeTokenSplitter::characters(5, 0).unwrap();
/// let chunks = splitter.split_text("ab👩‍💻cdefg").unwrap();
/// assert_eq!(chunks, vec!["ab👩‍💻", "cdefg"]);
/// ```
#[derive(Debug, Clone)]
pub struct UnicodeSafeTokenSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    sizer: Sizer,
}

/// Accumulation buffer with a running size.
#[derive(Default)]
struct Buffer {
    text: String,
    /// Byte offset where each cluster starts.
    starts: Vec<usize>,
    size: usize,
    /// Appends since `size` was last counted exactly.
    estimated: usize,
    /// Holds content beyond the overlap seed.
    fresh: bool,
}

/// A size, and whether it came from counting the whole buffer.
#[derive(Debug, Clone, Copy)]
struct Measured {
    size: usize,
    exact: bool,
}

impl Buffer {
    fn push(&mut self, cluster: &str, measured: Measured) {
        self.starts.push(self.text.len());
        self.text.push_str(cluster);
        self.size = measured.size;
        self.estimated = if measured.exact { 0 } else { self.estimated + 1 };
        self.fresh = true;
    }

    /// Tail of the buffer starting at the last word boundary.
    ///
    /// The window opens at the start of the whitespace run, since the
    /// tokenizer re-splits a run when a word follows it.
    fn price_window(&self) -> &str {
        let n = self.starts.len();
        let lo = n.saturating_sub(WORD_LOOKBACK);
        let is_space = |i: usize| self.text[self.starts[i]..].starts_with(char::is_whitespace);
        for i in (lo..n).rev() {
            if is_space(i) {
                let mut start = i;
                while start > lo && is_space(start - 1) {
                    start -= 1;
                }
                return &self.text[self.starts[start]..];
            }
        }
        self.starts
            .get(n.saturating_sub(PRICE_WINDOW))
            .map_or("", |&start| &self.text[start..])
    }

    fn seeded(seed: &str, size: usize) -> Self {
        let mut starts = Vec::new();
        let mut offset = 0;
        for cluster in grapheme::segment(seed) {
            starts.push(offset);
            offset += cluster.len();
        }
        Self {
            text: seed.to_string(),
            starts,
            size,
            estimated: 0,
            fresh: false,
        }
    }
}

impl UnicodeSafeTokenSplitter {
    /// Create a splitter.
    ///
    /// # Errors
    ///
    /// Rejects `chunk_size == 0` and `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize, sizer: Sizer) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::OverlapExceedsSize {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            sizer,
        })
    }

    /// Create a character-budget splitter.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn characters(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(chunk_size, chunk_overlap, Sizer::Characters)
    }

    /// Create a token-budget splitter over `tokens`.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn tokens(
        chunk_size: usize,
        chunk_overlap: usize,
        tokens: Arc<dyn TokenMeasure>,
    ) -> Result<Self> {
        Self::new(chunk_size, chunk_overlap, Sizer::Tokens(tokens))
    }

    /// Build from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configured encoding cannot be loaded.
    pub fn from_config(cfg: &ChunkConfig) -> Result<Self> {
        Self::new(cfg.chunk_size(), cfg.chunk_overlap(), Sizer::from_config(cfg)?)
    }

    /// The sizer.
    pub fn sizer(&self) -> &Sizer {
        &self.sizer
    }

    /// Size of `buffer` once `cluster` is appended.
    fn size_with(&self, buffer: &Buffer, cluster: &str) -> Measured {
        let m = match &self.sizer {
            Sizer::Characters => {
                return Measured {
                    size: buffer.size + cluster.chars().count(),
                    exact: true,
                }
            }
            Sizer::Tokens(m) => m,
        };
        let exact = || {
            let mut joined = String::with_capacity(buffer.text.len() + cluster.len());
            joined.push_str(&buffer.text);
            joined.push_str(cluster);
            Measured {
                size: m.count(&joined),
                exact: true,
            }
        };

        let margin = self.verify_margin();
        if buffer.size + margin >= self.chunk_size || buffer.estimated >= self.resync_interval() {
            return exact();
        }
        let window = buffer.price_window();
        let estimate = if window.is_empty() {
            m.count(cluster)
        } else {
            let mut joined = String::with_capacity(window.len() + cluster.len());
            joined.push_str(window);
            joined.push_str(cluster);
            buffer.size + m.count(&joined).saturating_sub(m.count(window))
        };
        if estimate + margin >= self.chunk_size {
            exact()
        } else {
            Measured {
                size: estimate,
                exact: false,
            }
        }
    }

    /// Distance from the budget at which estimates give way to exact counts.
    fn verify_margin(&self) -> usize {
        (self.chunk_size / 8).max(2)
    }

    /// Estimated appends allowed between exact counts.
    ///
    /// An estimate undercounts by at most one token per append, so the
    /// drift stays below half the margin.
    fn resync_interval(&self) -> usize {
        (self.verify_margin() / 2).max(1)
    }

    /// The next buffer after flushing `flushed`.
    fn seed_from(&self, flushed: &str) -> Buffer {
        let seed = self.sizer.tail(flushed, self.chunk_overlap);
        if seed.is_empty() {
            return Buffer::default();
        }
        let size = self.sizer.size(&seed);
        Buffer::seeded(&seed, size)
    }
}

impl Splitter for UnicodeSafeTokenSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let mut chunks = Vec::new();
        let mut buffer = Buffer::default();

        for cluster in grapheme::segment(text) {
            let measured = self.size_with(&buffer, cluster);
            if measured.size <= self.chunk_size {
                buffer.push(cluster, measured);
                continue;
            }

            // Roll back: the cluster is not part of the flushed chunk.
            let seed = if buffer.fresh {
                let flushed = std::mem::take(&mut buffer.text);
                let seed = self.seed_from(&flushed);
                chunks.push(flushed);
                seed
            } else {
                Buffer::default()
            };

            if self.sizer.exceeds(cluster, self.chunk_size) {
                // Never split a cluster: emit it whole.
                chunks.push(cluster.to_string());
                buffer = Buffer::default();
                continue;
            }

            buffer = seed;
            let measured = self.size_with(&buffer, cluster);
            buffer.push(cluster, measured);
        }

        if buffer.fresh {
            chunks.push(buffer.text);
        }
        Ok(chunks)
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }
}
