//! Strategy registry: name to constructor.
//!
//! An explicit table built once; adding a strategy is one
//! [`StrategyRegistry::register`] call, with no discovery at runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{ChunkConfig, Strategy};
use crate::markdown::MarkdownSplitter;
use crate::recursive::RecursiveTokenSplitter;
use crate::semantic::{Embedder, SemanticSplitter};
use crate::token::UnicodeSafeTokenSplitter;
use crate::{Error, Result, Splitter};

/// Collaborators available to constructors.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Embedding capability for strategies that need one.
    pub embedder: Option<Arc<dyn Embedder>>,
}

/// Builds a splitter from a configuration.
pub type Constructor = fn(&ChunkConfig, &BuildContext) -> Result<Box<dyn Splitter>>;

/// A registered strategy.
#[derive(Clone, Copy)]
pub struct StrategyEntry {
    construct: Constructor,
    cacheable: bool,
}

impl StrategyEntry {
    /// Construct a fresh splitter.
    ///
    /// # Errors
    ///
    /// Whatever the constructor reports.
    pub fn construct(&self, cfg: &ChunkConfig, ctx: &BuildContext) -> Result<Box<dyn Splitter>> {
        (self.construct)(cfg, ctx)
    }

    /// Whether built instances may serve as cached prototypes.
    pub const fn cacheable(&self) -> bool {
        self.cacheable
    }
}

impl fmt::Debug for StrategyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyEntry")
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}

/// Name to constructor table.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, StrategyEntry>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in strategies.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Strategy::Recursive.as_str(), build_recursive, true);
        registry.register(Strategy::Markdown.as_str(), build_markdown, true);
        registry.register(Strategy::Token.as_str(), build_token, true);
        // Depends on a live, substitutable embedder: always built fresh.
        registry.register(Strategy::Semantic.as_str(), build_semantic, false);
        registry
    }

    /// Register (or replace) a strategy.
    pub fn register(&mut self, name: &str, construct: Constructor, cacheable: bool) {
        self.entries.insert(
            name.to_string(),
            StrategyEntry {
                construct,
                cacheable,
            },
        );
    }

    /// Look up a strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStrategy`] naming the registered set.
    pub fn get(&self, name: &str) -> Result<StrategyEntry> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownStrategy {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

fn build_recursive(cfg: &ChunkConfig, _: &BuildContext) -> Result<Box<dyn Splitter>> {
    Ok(Box::new(RecursiveTokenSplitter::from_config(cfg)?))
}

fn build_markdown(cfg: &ChunkConfig, _: &BuildContext) -> Result<Box<dyn Splitter>> {
    Ok(Box::new(MarkdownSplitter::from_config(cfg)?))
}

fn build_token(cfg: &ChunkConfig, _: &BuildContext) -> Result<Box<dyn Splitter>> {
    Ok(Box::new(UnicodeSafeTokenSplitter::from_config(cfg)?))
}

fn build_semantic(cfg: &ChunkConfig, ctx: &BuildContext) -> Result<Box<dyn Splitter>> {
    let embedder = ctx.embedder.clone().ok_or(Error::MissingEmbedder)?;
    Ok(Box::new(SemanticSplitter::from_config(cfg, embedder)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.names(), vec!["markdown", "recursive", "semantic", "token"]);
        assert!(registry.get("recursive").unwrap().cacheable());
        assert!(!registry.get("semantic").unwrap().cacheable());
    }

    #[test]
    fn test_unknown_strategy() {
        let err = StrategyRegistry::builtin().get("fractal").unwrap_err();
        match err {
            Error::UnknownStrategy { name, known } => {
                assert_eq!(name, "fractal");
                assert!(known.contains("recursive"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_semantic_requires_embedder() {
        let cfg = ChunkConfig::builder()
            .strategy(Strategy::Semantic)
            .build()
            .unwrap();
        let entry = StrategyRegistry::builtin().get("semantic").unwrap();
        let err = entry.construct(&cfg, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, Error::MissingEmbedder));
    }
}
