//! Semantic chunking using embedding similarity.
//!
//! Splits text where the topic changes, detected by jumps in embedding
//! distance between neighbouring sentences.
//!
//! ## The Idea
//!
//! ```text
//! Sentences:   [S1] [S2] [S3] [S4] [S5]
//! Distances:      0.1  0.2  0.7  0.1
//!                           ↑
//!             above the 95th percentile of all distances -> split
//!
//! Chunks: [S1 S2 S3] [S4 S5]
//! ```
//!
//! The threshold is relative (a percentile of the document's own distances),
//! so it adapts to how homogeneous each document is.
//!
//! ## Embeddings
//!
//! Vectors come from an injected [`Embedder`]: one vector per input text, in
//! order. The crate ships no model; remote services and local models plug in
//! behind the trait, and tests substitute deterministic fakes. Because the
//! capability is live and substitutable, the factory never caches semantic
//! splitters.

use std::fmt;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::budget::Sizer;
use crate::config::ChunkConfig;
use crate::document::Document;
use crate::overlap::inject_overlap;
use crate::tokenizer::TiktokenMeasure;
use crate::{Error, Result, Splitter};

/// Text to vector capability.
pub trait Embedder: Send + Sync + fmt::Debug {
    /// Embed each text; the output has one vector per input, same order.
    ///
    /// # Errors
    ///
    /// Implementation-defined (network, model, quota).
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Semantic chunker over an injected embedder.
#[derive(Clone)]
pub struct SemanticSplitter {
    embedder: Arc<dyn Embedder>,
    percentile: u8,
    chunk_overlap: usize,
    sizer: Sizer,
}

impl SemanticSplitter {
    /// Create a semantic splitter.
    ///
    /// # Arguments
    ///
    /// * `embedder` - Vector source
    /// * `percentile` - Distance percentile above which to split (0..=100)
    /// * `chunk_overlap` - Token overlap injected after splitting
    /// * `sizer` - Token sizer for the overlap
    pub fn new(
        embedder: Arc<dyn Embedder>,
        percentile: u8,
        chunk_overlap: usize,
        sizer: Sizer,
    ) -> Self {
        Self {
            embedder,
            percentile: percentile.min(100),
            chunk_overlap,
            sizer,
        }
    }

    /// Build from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configured encoding cannot be loaded.
    pub fn from_config(cfg: &ChunkConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let sizer = Sizer::Tokens(Arc::new(TiktokenMeasure::new(cfg.encoding_name())?));
        Ok(Self::new(
            embedder,
            cfg.semantic_threshold_percentile(),
            cfg.chunk_overlap(),
            sizer,
        ))
    }

    /// Extract trimmed, non-empty sentences.
    fn extract_sentences(text: &str) -> Vec<String> {
        text.split_sentence_bounds()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Indices `i` such that a chunk ends after sentence `i`.
    fn breakpoints(&self, embeddings: &[Vec<f32>]) -> Vec<usize> {
        if embeddings.len() < 2 {
            return vec![];
        }
        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|w| 1.0 - cosine_similarity(&w[0], &w[1]))
            .collect();
        let threshold = percentile(&distances, self.percentile);
        distances
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d > threshold)
            .map(|(i, _)| i)
            .collect()
    }

    fn split_raw(&self, text: &str) -> Result<Vec<String>> {
        let sentences = Self::extract_sentences(text);
        if sentences.len() < 2 {
            return Ok(sentences);
        }

        let embeddings = self.embedder.embed(&sentences)?;
        if embeddings.len() != sentences.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                embeddings.len(),
                sentences.len()
            )));
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        for end in self.breakpoints(&embeddings) {
            chunks.push(sentences[start..=end].join(" "));
            start = end + 1;
        }
        if start < sentences.len() {
            chunks.push(sentences[start..].join(" "));
        }
        Ok(chunks)
    }
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Linear-interpolated percentile of `values` (`p` in 0..=100).
pub fn percentile(values: &[f32], p: u8) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let rank = f32::from(p.min(100)) / 100.0 * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Splitter for SemanticSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let chunks = self.split_raw(text)?;
        Ok(inject_overlap(&chunks, self.chunk_overlap, &self.sizer))
    }

    fn split_documents(&self, docs: &[Document]) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        for doc in docs {
            let derived: Vec<Document> = self
                .split_raw(&doc.text)?
                .into_iter()
                .map(|chunk| doc.derive(chunk))
                .collect();
            out.extend(inject_overlap(&derived, self.chunk_overlap, &self.sizer));
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for SemanticSplitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticSplitter")
            .field("percentile", &self.percentile)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sentences mentioning "weather" point one way, everything else another.
    #[derive(Debug)]
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("weather") {
                        vec![0.0, 1.0]
                    } else {
                        vec![1.0, 0.0]
                    }
                })
                .collect())
        }
    }

    #[derive(Debug)]
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    fn splitter(embedder: Arc<dyn Embedder>, overlap: usize) -> SemanticSplitter {
        let sizer = Sizer::Tokens(Arc::new(TiktokenMeasure::new("cl100k_base").unwrap()));
        SemanticSplitter::new(embedder, 50, overlap, sizer)
    }

    #[test]
    fn test_splits_on_topic_shift() {
        let s = splitter(Arc::new(TopicEmbedder), 0);
        let text = "Rust is fast. Rust is safe. The weather is sunny. The weather is warm.";
        let chunks = s.split_text(text).unwrap();
        assert_eq!(
            chunks,
            vec!["Rust is fast. Rust is safe.", "The weather is sunny. The weather is warm."]
        );
    }

    #[test]
    fn test_single_sentence() {
        let s = splitter(Arc::new(TopicEmbedder), 0);
        assert_eq!(s.split_text("Only one.").unwrap(), vec!["Only one."]);
        assert!(s.split_text("   ").unwrap().is_empty());
    }

    #[test]
    fn test_vector_count_mismatch() {
        let s = splitter(Arc::new(ShortEmbedder), 0);
        let err = s.split_text("One. Two. Three.").unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_overlap_in_tokens() {
        let s = splitter(Arc::new(TopicEmbedder), 2);
        let text = "Rust is fast. Rust is safe. The weather is sunny.";
        let chunks = s.split_text(text).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].ends_with("The weather is sunny."));
        assert!(chunks[1].len() > "The weather is sunny.".len());
    }

    #[test]
    fn test_percentile() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&v, 50) - 2.0).abs() < f32::EPSILON);
        assert!((percentile(&v, 95) - 3.8).abs() < 1e-5);
        assert!((percentile(&v, 100) - 4.0).abs() < f32::EPSILON);
        assert!((percentile(&[], 50)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0])).abs() < f32::EPSILON);
    }
}
