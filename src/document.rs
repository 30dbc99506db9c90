//! Documents: text plus metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to a [`Document`].
///
/// Values are JSON scalars in practice. Every `Document` owns its map, so a
/// clone is a deep copy and mutating one record never leaks into a sibling.
pub type Metadata = BTreeMap<String, Value>;

/// Metadata key for the origin path.
pub const SOURCE_KEY: &str = "source";

/// Metadata key for the zero-based page index.
pub const PAGE_KEY: &str = "page";

/// A unit of text flowing from the loader through the splitters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// The text content.
    pub text: String,
    /// Metadata (`source`, `page`, and anything the input carried).
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// A document with empty metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// A document tagged with `source` and `page`.
    pub fn from_source(text: impl Into<String>, source: impl Into<String>, page: u64) -> Self {
        let mut doc = Self::new(text);
        doc.metadata
            .insert(SOURCE_KEY.to_string(), Value::String(source.into()));
        doc.metadata.insert(PAGE_KEY.to_string(), Value::from(page));
        doc
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// A sibling document with new text and a copy of this metadata.
    #[must_use]
    pub fn derive(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: self.metadata.clone(),
        }
    }

    /// The `source` entry, if it is a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// The `page` entry normalized to an integer (default 0).
    pub fn page(&self) -> u64 {
        self.metadata.get(PAGE_KEY).map_or(0, normalize_page)
    }
}

/// Coerce a page value (`3`, `3.0`, `"3"`) to an integer; anything else is 0.
pub fn normalize_page(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
