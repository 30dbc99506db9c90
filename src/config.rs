//! Chunking configuration.
//!
//! [`ChunkConfig`] is the stable contract every front end populates: a CLI,
//! a TOML file or an API request all end up here. It is validated once, at
//! construction, and is immutable afterwards. Invalid combinations are
//! rejected, never coerced:
//!
//! ```text
//! chunk_overlap < chunk_size          (unless strategy = semantic)
//! overlap_unit != characters          (when strategy = semantic)
//! id_hash_bits % 4 == 0, 32..=256
//! id_base set  =>  id_path_mode = rel
//! ```
//!
//! Process-level knobs that are not part of a chunking request (cache bounds,
//! the JSON streaming threshold) live in [`Tunables`] and are read from the
//! environment when the component that needs them is constructed.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default separators for the recursive strategy.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Default tokenizer encoding.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Below this many bits the content digest is considered collision prone.
pub const WEAK_HASH_BITS: u32 = 48;

/// Chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Paragraph-accumulating greedy token splitter.
    #[default]
    Recursive,
    /// Heading-aware sections, sized by the recursive splitter.
    Markdown,
    /// Grapheme-safe greedy token splitter.
    Token,
    /// Embedding-similarity breakpoints.
    Semantic,
}

impl Strategy {
    /// Every built-in strategy.
    pub const ALL: [Self; 4] = [Self::Recursive, Self::Markdown, Self::Token, Self::Semantic];

    /// The registry name of this strategy.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Markdown => "markdown",
            Self::Token => "token",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| Error::UnknownStrategy {
                name: s.to_string(),
                known: Self::ALL.map(Self::as_str).join(", "),
            })
    }
}

/// Unit in which chunk size and overlap are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverlapUnit {
    /// Tokenizer tokens.
    #[default]
    Tokens,
    /// Unicode scalar values.
    Characters,
}

impl OverlapUnit {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Characters => "characters",
        }
    }
}

impl fmt::Display for OverlapUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlapUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tokens" => Ok(Self::Tokens),
            "characters" => Ok(Self::Characters),
            other => Err(Error::InvalidOverlapUnit(other.to_string())),
        }
    }
}

/// How the source path is rendered inside chunk identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdPathMode {
    /// Absolute POSIX-style path.
    Abs,
    /// Path relative to `id_base` (or the working directory).
    #[default]
    Rel,
    /// Salted digest of the absolute path.
    Hash,
}

impl IdPathMode {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Rel => "rel",
            Self::Hash => "hash",
        }
    }
}

impl fmt::Display for IdPathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdPathMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "abs" => Ok(Self::Abs),
            "rel" => Ok(Self::Rel),
            "hash" => Ok(Self::Hash),
            other => Err(Error::InvalidIdPathMode(other.to_string())),
        }
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Strategy);
string_serde!(OverlapUnit);
string_serde!(IdPathMode);

/// Validated, immutable chunking configuration.
///
/// Build one with [`ChunkConfig::builder`] or deserialize it; both paths run
/// the same validation.
///
/// ```rust
/// use docslabs::{ChunkConfig, OverlapUnit, Strategy};
///
/// let cfg = ChunkConfig::builder()
///     .strategy(Strategy::Token)
///     .chunk_size(256)
///     .chunk_overlap(32)
///     .build()
///     .unwrap();
/// assert_eq!(cfg.overlap_unit(), OverlapUnit::Tokens);
///
/// // Overlap must stay below the chunk size.
/// assert!(ChunkConfig::builder().chunk_size(10).chunk_overlap(10).build().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChunkConfigBuilder")]
pub struct ChunkConfig {
    strategy: Strategy,
    chunk_size: usize,
    chunk_overlap: usize,
    overlap_unit: OverlapUnit,
    separators: Option<Vec<String>>,
    encoding_name: String,
    embed_model: Option<String>,
    embed_deployment: Option<String>,
    semantic_threshold_percentile: u8,
    id_path_mode: IdPathMode,
    id_base: Option<PathBuf>,
    id_hash_bits: u32,
}

impl ChunkConfig {
    /// Start from the documented defaults.
    pub fn builder() -> ChunkConfigBuilder {
        ChunkConfigBuilder::default()
    }

    /// The chunking strategy.
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Budget per chunk, in [`Self::overlap_unit`].
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap window, in [`Self::overlap_unit`].
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Measurement unit.
    pub const fn overlap_unit(&self) -> OverlapUnit {
        self.overlap_unit
    }

    /// Configured separators, or the defaults.
    pub fn separators(&self) -> Vec<String> {
        self.separators.clone().unwrap_or_else(|| {
            DEFAULT_SEPARATORS
                .iter()
                .map(|&s| s.to_string())
                .collect()
        })
    }

    /// Tokenizer encoding name.
    pub fn encoding_name(&self) -> &str {
        &self.encoding_name
    }

    /// Embedding model name, semantic strategy only.
    pub fn embed_model(&self) -> Option<&str> {
        self.embed_model.as_deref()
    }

    /// Embedding deployment name, semantic strategy only.
    pub fn embed_deployment(&self) -> Option<&str> {
        self.embed_deployment.as_deref()
    }

    /// Breakpoint percentile for the semantic strategy.
    pub const fn semantic_threshold_percentile(&self) -> u8 {
        self.semantic_threshold_percentile
    }

    /// Identifier path rendering.
    pub const fn id_path_mode(&self) -> IdPathMode {
        self.id_path_mode
    }

    /// Base directory for relative identifiers.
    pub fn id_base(&self) -> Option<&Path> {
        self.id_base.as_deref()
    }

    /// Content digest width in bits.
    pub const fn id_hash_bits(&self) -> u32 {
        self.id_hash_bits
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Recursive,
            chunk_size: 1024,
            chunk_overlap: 128,
            overlap_unit: OverlapUnit::Tokens,
            separators: None,
            encoding_name: DEFAULT_ENCODING.to_string(),
            embed_model: None,
            embed_deployment: None,
            semantic_threshold_percentile: 95,
            id_path_mode: IdPathMode::Rel,
            id_base: None,
            id_hash_bits: 64,
        }
    }
}

/// Builder (and serde input shape) for [`ChunkConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfigBuilder {
    strategy: Strategy,
    chunk_size: usize,
    chunk_overlap: usize,
    overlap_unit: OverlapUnit,
    separators: Option<Vec<String>>,
    encoding_name: String,
    embed_model: Option<String>,
    embed_deployment: Option<String>,
    semantic_threshold_percentile: u8,
    id_path_mode: IdPathMode,
    id_base: Option<PathBuf>,
    id_hash_bits: u32,
}

impl Default for ChunkConfigBuilder {
    fn default() -> Self {
        let d = ChunkConfig::default();
        Self {
            strategy: d.strategy,
            chunk_size: d.chunk_size,
            chunk_overlap: d.chunk_overlap,
            overlap_unit: d.overlap_unit,
            separators: d.separators,
            encoding_name: d.encoding_name,
            embed_model: d.embed_model,
            embed_deployment: d.embed_deployment,
            semantic_threshold_percentile: d.semantic_threshold_percentile,
            id_path_mode: d.id_path_mode,
            id_base: d.id_base,
            id_hash_bits: d.id_hash_bits,
        }
    }
}

impl ChunkConfigBuilder {
    /// Set the strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the chunk budget.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the overlap window.
    #[must_use]
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Set the measurement unit.
    #[must_use]
    pub fn overlap_unit(mut self, unit: OverlapUnit) -> Self {
        self.overlap_unit = unit;
        self
    }

    /// Set the separator list, highest priority first.
    #[must_use]
    pub fn separators<S: AsRef<str>>(mut self, separators: &[S]) -> Self {
        self.separators = Some(separators.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Set the tokenizer encoding.
    #[must_use]
    pub fn encoding_name(mut self, name: impl Into<String>) -> Self {
        self.encoding_name = name.into();
        self
    }

    /// Set the embedding model name.
    #[must_use]
    pub fn embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = Some(model.into());
        self
    }

    /// Set the embedding deployment name.
    #[must_use]
    pub fn embed_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.embed_deployment = Some(deployment.into());
        self
    }

    /// Set the semantic breakpoint percentile.
    #[must_use]
    pub fn semantic_threshold_percentile(mut self, percentile: u8) -> Self {
        self.semantic_threshold_percentile = percentile;
        self
    }

    /// Set the identifier path mode.
    #[must_use]
    pub fn id_path_mode(mut self, mode: IdPathMode) -> Self {
        self.id_path_mode = mode;
        self
    }

    /// Set the identifier base directory.
    #[must_use]
    pub fn id_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.id_base = Some(base.into());
        self
    }

    /// Set the content digest width.
    #[must_use]
    pub fn id_hash_bits(mut self, bits: u32) -> Self {
        self.id_hash_bits = bits;
        self
    }

    /// Validate and freeze.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any invalid combination.
    pub fn build(self) -> Result<ChunkConfig> {
        ChunkConfig::try_from(self)
    }
}

impl TryFrom<ChunkConfigBuilder> for ChunkConfig {
    type Error = Error;

    fn try_from(b: ChunkConfigBuilder) -> Result<Self> {
        if b.chunk_size == 0 {
            return Err(Error::InvalidChunkSize(0));
        }
        if b.strategy == Strategy::Semantic {
            if b.overlap_unit == OverlapUnit::Characters {
                return Err(Error::SemanticCharacterOverlap);
            }
        } else if b.chunk_overlap >= b.chunk_size {
            return Err(Error::OverlapExceedsSize {
                size: b.chunk_size,
                overlap: b.chunk_overlap,
            });
        }
        if b.id_hash_bits % 4 != 0 || !(32..=256).contains(&b.id_hash_bits) {
            return Err(Error::InvalidHashBits(b.id_hash_bits));
        }
        if b.id_base.is_some() && b.id_path_mode != IdPathMode::Rel {
            return Err(Error::IdBaseRequiresRelMode {
                mode: b.id_path_mode.to_string(),
            });
        }
        if b.semantic_threshold_percentile > 100 {
            return Err(Error::InvalidPercentile(b.semantic_threshold_percentile));
        }
        if b.id_hash_bits < WEAK_HASH_BITS {
            tracing::warn!(
                id_hash_bits = b.id_hash_bits,
                "id_hash_bits below {WEAK_HASH_BITS}; chunk id collisions become likely on large corpora"
            );
        }

        Ok(Self {
            strategy: b.strategy,
            chunk_size: b.chunk_size,
            chunk_overlap: b.chunk_overlap,
            overlap_unit: b.overlap_unit,
            separators: b.separators,
            encoding_name: b.encoding_name,
            embed_model: b.embed_model,
            embed_deployment: b.embed_deployment,
            semantic_threshold_percentile: b.semantic_threshold_percentile,
            id_path_mode: b.id_path_mode,
            id_base: b.id_base,
            id_hash_bits: b.id_hash_bits,
        })
    }
}

/// Process-level knobs read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// JSON files larger than this are streamed (bytes).
    pub json_stream_threshold: u64,
    /// Maximum cached splitter prototypes.
    pub prototype_cache_size: usize,
    /// Maximum cached tokenizer encodings.
    pub encoding_cache_size: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            json_stream_threshold: 10 * 1024 * 1024,
            prototype_cache_size: 64,
            encoding_cache_size: 8,
        }
    }
}

impl Tunables {
    /// Defaults overridden by `DOCSLABS_*` environment variables.
    pub fn from_env() -> Self {
        let mut tunables = Self::default();
        if let Some(v) = env_parse("DOCSLABS_JSON_STREAM_THRESHOLD") {
            tunables.json_stream_threshold = v;
        }
        if let Some(v) = env_parse("DOCSLABS_PROTOTYPE_CACHE_SIZE") {
            tunables.prototype_cache_size = v;
        }
        if let Some(v) = env_parse("DOCSLABS_ENCODING_CACHE_SIZE") {
            tunables.encoding_cache_size = v;
        }
        tunables
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ChunkConfig::builder().build().unwrap();
        assert_eq!(cfg.strategy(), Strategy::Recursive);
        assert_eq!(cfg.chunk_size(), 1024);
        assert_eq!(cfg.chunk_overlap(), 128);
        assert_eq!(cfg.overlap_unit(), OverlapUnit::Tokens);
        assert_eq!(cfg.encoding_name(), "cl100k_base");
        assert_eq!(cfg.id_path_mode(), IdPathMode::Rel);
        assert_eq!(cfg.id_hash_bits(), 64);
        assert_eq!(cfg.semantic_threshold_percentile(), 95);
        assert_eq!(cfg.separators(), vec!["\n\n", "\n", " ", ""]);
        assert_eq!(cfg, ChunkConfig::default());
    }

    #[test]
    fn test_overlap_must_be_below_size() {
        let err = ChunkConfig::builder()
            .chunk_size(10)
            .chunk_overlap(10)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::OverlapExceedsSize { size: 10, overlap: 10 }));
    }

    #[test]
    fn test_semantic_allows_large_overlap_but_not_characters() {
        assert!(ChunkConfig::builder()
            .strategy(Strategy::Semantic)
            .chunk_size(10)
            .chunk_overlap(20)
            .build()
            .is_ok());

        let err = ChunkConfig::builder()
            .strategy(Strategy::Semantic)
            .overlap_unit(OverlapUnit::Characters)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SemanticCharacterOverlap));
    }

    #[test]
    fn test_hash_bits_validation() {
        assert!(ChunkConfig::builder().id_hash_bits(62).build().is_err());
        assert!(ChunkConfig::builder().id_hash_bits(28).build().is_err());
        assert!(ChunkConfig::builder().id_hash_bits(260).build().is_err());
        // Weak but legal.
        assert!(ChunkConfig::builder().id_hash_bits(32).build().is_ok());
        assert!(ChunkConfig::builder().id_hash_bits(256).build().is_ok());
    }

    #[test]
    fn test_id_base_requires_rel() {
        assert!(ChunkConfig::builder().id_base("/srv").build().is_ok());
        let err = ChunkConfig::builder()
            .id_base("/srv")
            .id_path_mode(IdPathMode::Abs)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::IdBaseRequiresRelMode { .. }));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = ChunkConfig::builder()
            .chunk_size(0)
            .chunk_overlap(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChunkSize(0)));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("markdown".parse::<Strategy>().unwrap(), Strategy::Markdown);
        let err = "fractal".parse::<Strategy>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fractal"));
        assert!(msg.contains("recursive, markdown, token, semantic"));
    }

    #[test]
    fn test_deserialize_validates() {
        let cfg: ChunkConfig = serde_json::from_str(
            r#"{"strategy": "token", "chunk_size": 64, "chunk_overlap": 8, "overlap_unit": "characters"}"#,
        )
        .unwrap();
        assert_eq!(cfg.strategy(), Strategy::Token);
        assert_eq!(cfg.overlap_unit(), OverlapUnit::Characters);

        let bad = serde_json::from_str::<ChunkConfig>(r#"{"chunk_size": 8, "chunk_overlap": 9}"#);
        assert!(bad.is_err());

        let unknown = serde_json::from_str::<ChunkConfig>(r#"{"strategy": "fractal"}"#);
        assert!(unknown.unwrap_err().to_string().contains("fractal"));
    }

    #[test]
    fn test_tunable_defaults() {
        let t = Tunables::default();
        assert_eq!(t.json_stream_threshold, 10 * 1024 * 1024);
        assert!(t.prototype_cache_size > 0);
        assert!(t.encoding_cache_size > 0);
    }
}
