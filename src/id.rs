//! Chunk identifiers.
//!
//! ```text
//! {normalized_source}#p{page}.{position}-{digest}
//!
//! docs/guide.md#p0.3-9f86d081884c7d65
//! │             │ │  └ sha256(content), id_hash_bits / 4 hex chars
//! │             │ └ per-(source, page) counter, emission order
//! │             └ page
//! └ path per IdPathMode
//! ```
//!
//! Path modes:
//!
//! - `abs`: resolved absolute path, `/` separators.
//! - `rel`: path relative to the base (default: working directory); a
//!   source outside the base falls back to a 12-hex digest of its absolute
//!   path, so same-named files elsewhere cannot collide.
//! - `hash`: 12-hex digest of `{base}:{absolute}`, a salted opaque scheme.
//!
//! Building an id never fails: a path that cannot be resolved is hashed raw.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::{ChunkConfig, IdPathMode};

/// Hex length of path digests, independent of `id_hash_bits`.
pub const PATH_DIGEST_HEX: usize = 12;

/// Path normalization and digest settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    mode: IdPathMode,
    base: Option<PathBuf>,
    hash_bits: u32,
}

impl IdScheme {
    /// A scheme with explicit settings.
    ///
    /// `hash_bits` is expected to be validated already (see [`ChunkConfig`]).
    pub fn new(mode: IdPathMode, base: Option<PathBuf>, hash_bits: u32) -> Self {
        Self {
            mode,
            base,
            hash_bits,
        }
    }

    /// The scheme described by a configuration.
    pub fn from_config(cfg: &ChunkConfig) -> Self {
        Self::new(
            cfg.id_path_mode(),
            cfg.id_base().map(Path::to_path_buf),
            cfg.id_hash_bits(),
        )
    }

    /// Normalize a source path for use in ids.
    pub fn normalize_source(&self, source: &str) -> String {
        match self.try_normalize(source) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!(source, error = %e, "unresolvable id source; hashing raw path");
                digest_hex(source.as_bytes(), PATH_DIGEST_HEX)
            }
        }
    }

    fn try_normalize(&self, source: &str) -> io::Result<String> {
        let abs = resolve(Path::new(source))?;
        match self.mode {
            IdPathMode::Abs => Ok(posix(&abs)),
            IdPathMode::Rel => {
                let base = match &self.base {
                    Some(base) => resolve(base)?,
                    None => resolve(&std::env::current_dir()?)?,
                };
                match abs.strip_prefix(&base) {
                    Ok(rel) => Ok(posix(rel)),
                    Err(_) => Ok(digest_hex(posix(&abs).as_bytes(), PATH_DIGEST_HEX)),
                }
            }
            IdPathMode::Hash => {
                let salt = self
                    .base
                    .as_deref()
                    .map(|b| b.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let salted = format!("{salt}:{}", posix(&abs));
                Ok(digest_hex(salted.as_bytes(), PATH_DIGEST_HEX))
            }
        }
    }

    /// Content digest truncated to `hash_bits / 4` hex characters.
    pub fn content_digest(&self, content: &str) -> String {
        digest_hex(content.as_bytes(), (self.hash_bits / 4) as usize)
    }
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::new(IdPathMode::default(), None, 64)
    }
}

/// Build one identifier.
pub fn build_id(scheme: &IdScheme, source: &str, page: u64, position: u64, content: &str) -> String {
    format_id(
        &scheme.normalize_source(source),
        page,
        position,
        &scheme.content_digest(content),
    )
}

fn format_id(normalized: &str, page: u64, position: u64, digest: &str) -> String {
    format!("{normalized}#p{page}.{position}-{digest}")
}

/// Assigns ids in emission order with per-(source, page) positions.
#[derive(Debug, Default)]
pub struct IdAllocator {
    scheme: IdScheme,
    normalized: HashMap<String, String>,
    positions: HashMap<(String, u64), u64>,
}

impl IdAllocator {
    /// An allocator over `scheme`.
    pub fn new(scheme: IdScheme) -> Self {
        Self {
            scheme,
            normalized: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// The next id for a chunk of `source` at `page`.
    pub fn next_id(&mut self, source: &str, page: u64, content: &str) -> String {
        let normalized = self
            .normalized
            .entry(source.to_string())
            .or_insert_with(|| self.scheme.normalize_source(source))
            .clone();
        let counter = self.positions.entry((normalized.clone(), page)).or_insert(0);
        let position = *counter;
        *counter += 1;
        format_id(&normalized, page, position, &self.scheme.content_digest(content))
    }
}

fn resolve(path: &Path) -> io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) => std::path::absolute(path),
    }
}

/// Join path components with `/`.
fn posix(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(p) => out.push_str(&p.as_os_str().to_string_lossy()),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

fn digest_hex(bytes: &[u8], len: usize) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{digest:x}");
    hex.truncate(len);
    hex
}
