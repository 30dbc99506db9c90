//! Splitter factory with a prototype cache.
//!
//! Building a splitter loads tokenizer tables and validates configuration.
//! The factory builds each distinct configuration once, keeps the result as
//! a *prototype*, and hands every caller a clone:
//!
//! ```text
//! build(cfg) ──> registry[cfg.strategy]
//!                   │
//!        cacheable? ├── no  ──> construct fresh                (semantic)
//!                   └── yes ──> prototypes[cfg] hit?  ──> clone
//!                                          miss ──> construct, clone, insert
//! ```
//!
//! ## Concurrency
//!
//! `build` takes `&self` and may be called from any number of threads. The
//! cache mutex is held only for the lookup and the insert, never while
//! constructing or cloning. Each call returns its own boxed instance; the
//! only state instances share is the read-only tokenizer behind an `Arc`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;

use crate::config::{ChunkConfig, Tunables};
use crate::registry::{BuildContext, StrategyRegistry};
use crate::semantic::Embedder;
use crate::tokenizer::lock;
use crate::{Result, Splitter};

type PrototypeKey = (String, ChunkConfig);

/// Resolves configurations to independent splitter instances.
#[derive(Debug)]
pub struct SplitterFactory {
    registry: StrategyRegistry,
    context: BuildContext,
    prototypes: Mutex<LruCache<PrototypeKey, Arc<dyn Splitter>>>,
}

impl SplitterFactory {
    /// Built-in strategies, cache bound from [`Tunables::from_env`].
    pub fn new() -> Self {
        Self::with_registry(StrategyRegistry::builtin(), Tunables::from_env().prototype_cache_size)
    }

    /// A factory over a custom registry.
    pub fn with_registry(registry: StrategyRegistry, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            context: BuildContext::default(),
            prototypes: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Attach the embedding capability used by the semantic strategy.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.context.embedder = Some(embedder);
        self
    }

    /// The process-wide factory (built-in strategies, no embedder).
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SplitterFactory> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// The registry in use.
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Build a splitter for `cfg.strategy()`.
    ///
    /// # Errors
    ///
    /// Unknown strategy, missing embedder, or tokenizer load failure.
    pub fn build(&self, cfg: &ChunkConfig) -> Result<Box<dyn Splitter>> {
        self.build_named(cfg.strategy().as_str(), cfg)
    }

    /// Build a splitter for a strategy given by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStrategy`] when `name` is not registered.
    pub fn build_named(&self, name: &str, cfg: &ChunkConfig) -> Result<Box<dyn Splitter>> {
        let entry = self.registry.get(name)?;
        if !entry.cacheable() {
            return entry.construct(cfg, &self.context);
        }

        let key: PrototypeKey = (name.to_string(), cfg.clone());
        let cached = lock(&self.prototypes).get(&key).cloned();
        if let Some(prototype) = cached {
            tracing::debug!(strategy = name, "splitter prototype cache hit");
            return Ok(prototype.clone_box());
        }

        tracing::debug!(strategy = name, "splitter prototype cache miss");
        let prototype: Arc<dyn Splitter> = Arc::from(entry.construct(cfg, &self.context)?);
        let instance = prototype.clone_box();
        let mut cache = lock(&self.prototypes);
        if !cache.contains(&key) {
            cache.put(key, prototype);
        }
        Ok(instance)
    }

    /// Number of cached prototypes.
    pub fn cached_prototypes(&self) -> usize {
        lock(&self.prototypes).len()
    }
}

impl Default for SplitterFactory {
    fn default() -> Self {
        Self::new()
    }
}
