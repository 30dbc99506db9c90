//! # docslabs
//!
//! Document chunking for retrieval-augmented generation (RAG) pipelines.
//!
//! ## The Problem
//!
//! Retrieval indexes want pieces of a document small enough to embed and
//! large enough to mean something. Cutting them is easy to get subtly wrong:
//!
//! - A budget counted in characters drifts from the model's token budget
//! - An emoji cut between its code points leaves an orphaned joiner
//! - Re-tokenizing a growing buffer on every step is quadratic
//! - Overlap windows must survive whitespace trimming without fusing words
//!
//! ## Pipeline
//!
//! ```text
//! DocumentLoader ──> SplitterFactory::build(cfg) ──> split_documents
//!   (txt, md,            (prototype cache)               │
//!    jsonl, json)                                        ├─ strategy split
//!                                                        └─ overlap injection
//!                                                               │
//!                                 RecordWriter + IdAllocator <──┘
//!                                 {"id": "src#p0.3-1f2e...", "text", "meta"}
//! ```
//!
//! ## Strategies
//!
//! | Strategy | Unit | Boundaries |
//! |----------|------|------------|
//! | `recursive` | tokens or characters | primary separator, then grapheme slicing |
//! | `markdown` | tokens or characters | ATX headings, then `recursive` |
//! | `token` | tokens or characters | grapheme clusters, linear time |
//! | `semantic` | tokens (overlap) | embedding distance between sentences |
//!
//! Every strategy injects the configured overlap after splitting: chunk `i`
//! is prefixed with the last `k` units of *output* chunk `i - 1`.
//!
//! ## Quick Start
//!
//! ```rust
//! use docslabs::{ChunkConfig, OverlapUnit, Splitter, SplitterFactory, Strategy};
//!
//! let cfg = ChunkConfig::builder()
//!     .strategy(Strategy::Token)
//!     .chunk_size(16)
//!     .chunk_overlap(4)
//!     .overlap_unit(OverlapUnit::Characters)
//!     .build()
//!     .unwrap();
//!
//! let splitter = SplitterFactory::global().build(&cfg).unwrap();
//! let chunks = splitter.split_text("The quick brown fox jumps over the lazy dog.").unwrap();
//! assert!(chunks.len() > 1);
//! ```
//!
//! ## Identifiers
//!
//! Each emitted chunk gets `{source}#p{page}.{position}-{digest}` where the
//! position counts per `(source, page)` in emission order, so identical text
//! on one page still yields distinct ids. See [`id`].

pub mod budget;
pub mod config;
pub mod document;
mod error;
pub mod factory;
pub mod grapheme;
pub mod id;
pub mod loader;
pub mod markdown;
pub mod overlap;
pub mod record;
pub mod recursive;
pub mod registry;
pub mod semantic;
pub mod token;
pub mod tokenizer;

use std::fmt;

pub use budget::Sizer;
pub use config::{ChunkConfig, ChunkConfigBuilder, IdPathMode, OverlapUnit, Strategy, Tunables};
pub use document::{Document, Metadata};
pub use error::{Error, Result};
pub use factory::SplitterFactory;
pub use id::{build_id, IdAllocator, IdScheme};
pub use loader::DocumentLoader;
pub use markdown::MarkdownSplitter;
pub use overlap::inject_overlap;
pub use record::{OutputRecord, RecordWriter};
pub use recursive::RecursiveTokenSplitter;
pub use registry::StrategyRegistry;
pub use semantic::{Embedder, SemanticSplitter};
pub use token::UnicodeSafeTokenSplitter;
pub use tokenizer::{TiktokenMeasure, TokenMeasure};

/// A text splitting strategy.
///
/// All splitters implement this trait, enabling polymorphic usage:
///
/// ```rust
/// use docslabs::{Document, RecursiveTokenSplitter, Splitter, UnicodeSafeTokenSplitter};
///
/// fn split_all(splitter: &dyn Splitter, docs: &[Document]) -> usize {
///     splitter.split_documents(docs).unwrap().len()
/// }
///
/// let recursive = RecursiveTokenSplitter::characters(40, 0, &["\n\n"]).unwrap();
/// let token = UnicodeSafeTokenSplitter::characters(40, 0).unwrap();
///
/// let docs = vec![Document::from_source("Hello world.\n\nThis is a test.", "a.txt", 0)];
/// assert_eq!(split_all(&recursive, &docs), 1);
/// assert_eq!(split_all(&token, &docs), 1);
/// ```
pub trait Splitter: Send + Sync + fmt::Debug {
    /// Split text into chunks, overlap included.
    ///
    /// # Errors
    ///
    /// Strategy-specific; splitting plain text with a tokenizer or character
    /// budget does not fail, the semantic strategy reports embedder errors.
    fn split_text(&self, text: &str) -> Result<Vec<String>>;

    /// Split each document, deriving one record per chunk.
    ///
    /// Derived records carry a deep copy of their parent's metadata.
    ///
    /// # Errors
    ///
    /// See [`Splitter::split_text`].
    fn split_documents(&self, docs: &[Document]) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        for doc in docs {
            for chunk in self.split_text(&doc.text)? {
                out.push(doc.derive(chunk));
            }
        }
        Ok(out)
    }

    /// An independent copy of this splitter.
    fn clone_box(&self) -> Box<dyn Splitter>;
}

impl Clone for Box<dyn Splitter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
