//! Error types for docslabs.

use std::path::PathBuf;

/// Errors that can occur while configuring, loading or chunking.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid chunk size (must be > 0).
    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    /// Overlap is not strictly smaller than the chunk size.
    #[error("chunk_overlap {overlap} must be < chunk_size {size}")]
    OverlapExceedsSize {
        /// The chunk size.
        size: usize,
        /// The overlap that reached or exceeded the size.
        overlap: usize,
    },

    /// The semantic strategy only measures overlap in tokens.
    #[error("overlap_unit 'characters' is not supported by the semantic strategy")]
    SemanticCharacterOverlap,

    /// `id_hash_bits` is not a multiple of 4 or outside 32..=256.
    #[error("id_hash_bits {0} must be a multiple of 4 in 32..=256")]
    InvalidHashBits(u32),

    /// `id_base` was given without `id_path_mode = rel`.
    #[error("id_base is only meaningful with id_path_mode 'rel' (got '{mode}')")]
    IdBaseRequiresRelMode {
        /// The configured path mode.
        mode: String,
    },

    /// Percentile outside 0..=100.
    #[error("semantic_threshold_percentile {0} must be within 0..=100")]
    InvalidPercentile(u8),

    /// The semantic strategy was requested without an embedding capability.
    #[error("the semantic strategy requires an embedder; configure one on the factory")]
    MissingEmbedder,

    /// Overlap unit string is neither `tokens` nor `characters`.
    #[error("invalid overlap unit '{0}' (expected 'tokens' or 'characters')")]
    InvalidOverlapUnit(String),

    /// Id path mode string is not `abs`, `rel` or `hash`.
    #[error("invalid id_path_mode '{0}' (expected 'abs', 'rel' or 'hash')")]
    InvalidIdPathMode(String),

    /// Strategy name not present in the registry.
    #[error("unknown chunking strategy '{name}' (expected one of: {known})")]
    UnknownStrategy {
        /// The rejected name.
        name: String,
        /// Comma separated registered names.
        known: String,
    },

    /// Tokenizer encoding name not recognized.
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),

    /// File extension the loader has no parser for.
    #[error("unsupported input {}: accepted extensions are {accepted}", path.display())]
    UnsupportedInput {
        /// The offending file.
        path: PathBuf,
        /// Comma separated accepted extensions.
        accepted: String,
    },

    /// Large JSON found but incremental parsing is compiled out.
    #[error(
        "{} is {size} bytes, above the streaming threshold of {threshold} bytes, \
         and incremental JSON parsing is unavailable; rebuild with the `json-stream` \
         feature or raise DOCSLABS_JSON_STREAM_THRESHOLD",
        path.display()
    )]
    StreamingCapabilityMissing {
        /// The oversized file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
        /// The configured threshold.
        threshold: u64,
    },

    /// A load pattern produced no usable records.
    #[error("no parsable documents found for '{0}'")]
    NoDocuments(String),

    /// Invalid glob pattern.
    #[error("invalid pattern: {0}")]
    Pattern(String),

    /// Tokenizer failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Embedding model error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is an operator/programmer configuration mistake.
    ///
    /// Front ends should map these to a failure exit distinct from input errors.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidChunkSize(_)
                | Self::OverlapExceedsSize { .. }
                | Self::SemanticCharacterOverlap
                | Self::InvalidHashBits(_)
                | Self::IdBaseRequiresRelMode { .. }
                | Self::InvalidPercentile(_)
                | Self::MissingEmbedder
                | Self::InvalidOverlapUnit(_)
                | Self::InvalidIdPathMode(_)
                | Self::UnknownStrategy { .. }
                | Self::UnknownEncoding(_)
        )
    }
}

/// Result type for docslabs operations.
pub type Result<T> = std::result::Result<T, Error>;
