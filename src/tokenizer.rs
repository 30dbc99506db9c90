//! Token measurement.
//!
//! Everything that budgets in tokens goes through [`TokenMeasure`]: count,
//! encode, decode. The production implementation wraps a `tiktoken-rs`
//! encoding; tests substitute cheaper or instrumented measures.
//!
//! Encodings are expensive to build (the BPE tables are parsed on load), so
//! [`encoding`] keeps a small process-wide LRU of them. An encoding is shared
//! read-only behind an `Arc`: encode and decode are pure given fixed tables,
//! which makes sharing across threads safe.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;
use tiktoken_rs::CoreBPE;

use crate::config::Tunables;
use crate::{Error, Result};

/// Token id.
pub type TokenId = u32;

/// Text to token measurement.
pub trait TokenMeasure: Send + Sync + fmt::Debug {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<TokenId>;

    /// Decode token ids into text.
    ///
    /// # Errors
    ///
    /// Fails when the ids do not decode to valid UTF-8 (for example a slice
    /// that starts in the middle of a multi-byte character).
    fn decode(&self, tokens: &[TokenId]) -> Result<String>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// A `tiktoken` encoding.
#[derive(Clone)]
pub struct TiktokenMeasure {
    name: String,
    bpe: Arc<CoreBPE>,
}

impl TiktokenMeasure {
    /// Load (or fetch from cache) the named encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEncoding`] for unsupported names.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            bpe: encoding(name)?,
        })
    }

    /// The encoding name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TiktokenMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenMeasure")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TokenMeasure for TiktokenMeasure {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as TokenId)
            .collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| Error::Tokenizer(e.to_string()))
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

fn cache() -> &'static Mutex<LruCache<String, Arc<CoreBPE>>> {
    static CACHE: OnceLock<Mutex<LruCache<String, Arc<CoreBPE>>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        let cap = NonZeroUsize::new(Tunables::from_env().encoding_cache_size)
            .unwrap_or(NonZeroUsize::MIN);
        Mutex::new(LruCache::new(cap))
    })
}

/// Shared handle to the named encoding.
///
/// # Errors
///
/// Returns [`Error::UnknownEncoding`] for unsupported names.
pub fn encoding(name: &str) -> Result<Arc<CoreBPE>> {
    if let Some(bpe) = lock(cache()).get(name) {
        return Ok(Arc::clone(bpe));
    }

    // Built outside the lock; the first insert wins a race.
    let bpe = Arc::new(load(name)?);
    tracing::debug!(encoding = name, "loaded tokenizer encoding");
    let mut cache = lock(cache());
    if let Some(existing) = cache.get(name) {
        return Ok(Arc::clone(existing));
    }
    cache.put(name.to_string(), Arc::clone(&bpe));
    Ok(bpe)
}

fn load(name: &str) -> Result<CoreBPE> {
    let loaded = match name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "p50k_edit" => tiktoken_rs::p50k_edit(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        other => return Err(Error::UnknownEncoding(other.to_string())),
    };
    loaded.map_err(|e| Error::Tokenizer(e.to_string()))
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panic while holding a cache lock cannot leave the cache inconsistent.
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
