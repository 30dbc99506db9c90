//! Document loading.
//!
//! Resolves a pattern to files and parses each by extension:
//!
//! | Extension | Records |
//! |-----------|---------|
//! | `.txt` `.md` `.markdown` | one per file (blank files yield none) |
//! | `.jsonl` `.ndjson` | one per non-blank line, `page` = line ordinal |
//! | `.json` | one per object in a list, or the single object |
//!
//! ## Size-adaptive JSON
//!
//! ```text
//! size <= threshold ──> parse the whole file
//! size >  threshold ──> streaming enabled?    ── no  ──> StreamingCapabilityMissing
//!                                            └─ yes ──> stream the root:
//!                                                        [ a, b, ... ]   one element at a time
//!                                                        { k: a, ... }   one value at a time,
//!                                                                        page = pair ordinal
//! ```
//!
//! Per-file failures are logged and skipped; only a load that yields no
//! records at all is an error.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::config::Tunables;
use crate::document::{normalize_page, Document, Metadata, PAGE_KEY, SOURCE_KEY};
use crate::{Error, Result};

/// Keys searched, in order, for a record's text.
pub const TEXT_KEYS: [&str; 3] = ["text", "page_content", "body"];

/// Key of a nested metadata object inside a JSON record.
pub const METADATA_KEY: &str = "metadata";

/// Accepted extensions, for error messages.
pub const ACCEPTED_EXTENSIONS: &str = ".txt, .md, .markdown, .jsonl, .ndjson, .json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    JsonLines,
    Json,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Some(Self::Text),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn require(path: &Path) -> Result<Self> {
        Self::of(path).ok_or_else(|| Error::UnsupportedInput {
            path: path.to_path_buf(),
            accepted: ACCEPTED_EXTENSIONS.to_string(),
        })
    }
}

/// Loads documents from files, directories and glob patterns.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    stream_threshold: u64,
    streaming: bool,
}

impl DocumentLoader {
    /// A loader with the streaming threshold from [`Tunables::from_env`].
    pub fn new() -> Self {
        Self {
            stream_threshold: Tunables::from_env().json_stream_threshold,
            streaming: cfg!(feature = "json-stream"),
        }
    }

    /// Enable or disable incremental parsing of large JSON files.
    ///
    /// Enabling has no effect without the `json-stream` feature.
    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled && cfg!(feature = "json-stream");
        self
    }

    /// Whether large JSON files are streamed.
    pub fn streaming(&self) -> bool {
        self.streaming
    }

    /// Override the JSON streaming threshold (bytes).
    #[must_use]
    pub fn with_stream_threshold(mut self, bytes: u64) -> Self {
        self.stream_threshold = bytes;
        self
    }

    /// The JSON streaming threshold (bytes).
    pub fn stream_threshold(&self) -> u64 {
        self.stream_threshold
    }

    /// Load every document matched by `pattern`.
    ///
    /// `pattern` is a file, a directory (walked recursively, unsupported
    /// extensions ignored) or a glob (`**` recurses).
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedInput`] if a named or globbed file has an
    ///   unsupported extension
    /// - [`Error::Pattern`] for a malformed glob
    /// - [`Error::NoDocuments`] if nothing could be loaded
    pub fn load(&self, pattern: &str) -> Result<Vec<Document>> {
        let files = resolve(pattern)?;
        let mut docs = Vec::new();

        for file in &files {
            match self.load_file(file) {
                Ok(loaded) => docs.extend(loaded),
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "skipping unreadable input");
                }
            }
        }

        if docs.is_empty() {
            return Err(Error::NoDocuments(pattern.to_string()));
        }
        tracing::debug!(pattern, files = files.len(), documents = docs.len(), "loaded documents");
        Ok(docs)
    }

    /// Load a single file.
    ///
    /// # Errors
    ///
    /// Unsupported extension, I/O and parse failures, or a large JSON file
    /// without streaming support.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let source = path.display().to_string();
        match Format::require(path)? {
            Format::Text => {
                let text = fs::read_to_string(path)?;
                if text.trim().is_empty() {
                    return Ok(vec![]);
                }
                Ok(vec![Document::from_source(text, source, 0)])
            }
            Format::JsonLines => load_json_lines(path, &source),
            Format::Json => {
                let size = fs::metadata(path)?.len();
                if size <= self.stream_threshold {
                    let value: Value = serde_json::from_slice(&fs::read(path)?)?;
                    Ok(records_from_root(value, &source))
                } else {
                    if !self.streaming {
                        return Err(Error::StreamingCapabilityMissing {
                            path: path.to_path_buf(),
                            size,
                            threshold: self.stream_threshold,
                        });
                    }
                    tracing::debug!(path = %source, size, threshold = self.stream_threshold, "streaming large JSON");
                    self.stream_json(path, &source)
                }
            }
        }
    }

    #[cfg(feature = "json-stream")]
    fn stream_json(&self, path: &Path, source: &str) -> Result<Vec<Document>> {
        let file = fs::File::open(path)?;
        let mut docs = Vec::new();
        stream::for_each_record(BufReader::new(file), |value, ordinal| {
            if let Some(doc) = record_from_value(value, source, ordinal) {
                docs.push(doc);
            }
        })?;
        Ok(docs)
    }

    #[cfg(not(feature = "json-stream"))]
    fn stream_json(&self, path: &Path, _source: &str) -> Result<Vec<Document>> {
        Err(Error::StreamingCapabilityMissing {
            path: path.to_path_buf(),
            size: fs::metadata(path)?.len(),
            threshold: self.stream_threshold,
        })
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a pattern to a sorted file list.
fn resolve(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);

    if path.is_file() {
        Format::require(path)?;
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "walk error");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| Format::of(p).is_some())
            .collect();
        files.sort();
        return Ok(files);
    }

    if pattern.contains(['*', '?', '[']) {
        let entries = glob::glob(pattern).map_err(|e| Error::Pattern(format!("{pattern}: {e}")))?;
        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(p) if p.is_file() => {
                    Format::require(&p)?;
                    files.push(p);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "glob error"),
            }
        }
        files.sort();
        return Ok(files);
    }

    Err(Error::NoDocuments(pattern.to_string()))
}

fn load_json_lines(path: &Path, source: &str) -> Result<Vec<Document>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut docs = Vec::new();
    for (ordinal, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)?;
        if let Some(doc) = record_from_value(value, source, ordinal as u64) {
            docs.push(doc);
        }
    }
    Ok(docs)
}

/// Records from an eagerly parsed root: a list of objects or one object.
fn records_from_root(root: Value, source: &str) -> Vec<Document> {
    match root {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| record_from_value(item, source, i as u64))
            .collect(),
        other => record_from_value(other, source, 0).into_iter().collect(),
    }
}

/// First non-blank string among [`TEXT_KEYS`].
fn record_text(obj: &Map<String, Value>) -> Option<&str> {
    TEXT_KEYS
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
}

/// One JSON object to a document; objects without text are dropped.
fn record_from_value(value: Value, source: &str, ordinal: u64) -> Option<Document> {
    let Value::Object(obj) = value else {
        return None;
    };
    let text = record_text(&obj)?.to_string();

    let mut metadata = Metadata::new();
    if let Some(Value::Object(nested)) = obj.get(METADATA_KEY) {
        for (k, v) in nested {
            metadata.insert(k.clone(), v.clone());
        }
    }
    metadata.insert(SOURCE_KEY.to_string(), Value::String(source.to_string()));
    let page = metadata.get(PAGE_KEY).map_or(ordinal, normalize_page);
    metadata.insert(PAGE_KEY.to_string(), Value::from(page));

    Some(Document { text, metadata })
}

#[cfg(feature = "json-stream")]
mod stream {
    //! Incremental traversal of a JSON root, one child value at a time.

    use std::fmt;
    use std::io::Read;

    use serde::de::{DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
    use serde_json::Value;

    /// Call `sink(value, ordinal)` for each element of a root array, or
    /// each value of a root object.
    pub(super) fn for_each_record<R, F>(reader: R, mut sink: F) -> serde_json::Result<()>
    where
        R: Read,
        F: FnMut(Value, u64),
    {
        let mut de = serde_json::Deserializer::from_reader(reader);
        RootSeed { sink: &mut sink }.deserialize(&mut de)?;
        de.end()
    }

    struct RootSeed<'a, F> {
        sink: &'a mut F,
    }

    impl<'de, F: FnMut(Value, u64)> DeserializeSeed<'de> for RootSeed<'_, F> {
        type Value = ();

        fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
            deserializer.deserialize_any(self)
        }
    }

    impl<'de, F: FnMut(Value, u64)> Visitor<'de> for RootSeed<'_, F> {
        type Value = ();

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a JSON array or object of records")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
            let mut ordinal = 0;
            while let Some(item) = seq.next_element::<Value>()? {
                (self.sink)(item, ordinal);
                ordinal += 1;
            }
            Ok(())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
            let mut ordinal = 0;
            while let Some((_key, item)) = map.next_entry::<String, Value>()? {
                (self.sink)(item, ordinal);
                ordinal += 1;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn loader() -> DocumentLoader {
        DocumentLoader::new().with_stream_threshold(10 * 1024 * 1024)
    }

    #[test]
    fn test_text_and_blank() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", "hello");
        write(&dir, "b.md", "   \n\n");
        let docs = loader().load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello");
        assert_eq!(docs[0].page(), 0);
        assert!(docs[0].source().unwrap().ends_with("a.txt"));
    }

    #[test]
    fn test_json_lines_pages() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "rows.jsonl",
            "{\"text\":\"zero\"}\n\n{\"body\":\"two\"}\n{\"other\":1}\n",
        );
        let docs = loader().load(path.to_str().unwrap()).unwrap();
        let got: Vec<(&str, u64)> = docs.iter().map(|d| (d.text.as_str(), d.page())).collect();
        assert_eq!(got, vec![("zero", 0), ("two", 2)]);
    }

    #[test]
    fn test_json_text_key_priority_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "docs.json",
            r#"[
                {"text": "  ", "page_content": "from page_content"},
                {"text": "t", "metadata": {"page": "7", "lang": "en"}}
            ]"#,
        );
        let docs = loader().load(path.to_str().unwrap()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "from page_content");
        assert_eq!(docs[0].page(), 0);
        assert_eq!(docs[1].page(), 7);
        assert_eq!(docs[1].metadata[PAGE_KEY], Value::from(7));
        assert_eq!(docs[1].metadata["lang"], "en");
    }

    #[test]
    fn test_json_single_object() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "one.json", r#"{"text": "only"}"#);
        let docs = loader().load(path.to_str().unwrap()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "only");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scan.pdf", "%PDF");
        let err = loader().load(path.to_str().unwrap()).unwrap_err();
        match err {
            Error::UnsupportedInput { accepted, .. } => assert!(accepted.contains(".jsonl")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directory_walk_ignores_unsupported() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", "a");
        write(&dir, "nested/deeper/b.md", "b");
        write(&dir, "image.png", "binary");
        let docs = loader().load(dir.path().to_str().unwrap()).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_recursive_glob() {
        let dir = TempDir::new().unwrap();
        write(&dir, "top.md", "top");
        write(&dir, "x/y/deep.md", "deep");
        write(&dir, "x/skip.txt", "skip");
        let pattern = format!("{}/**/*.md", dir.path().display());
        let docs = loader().load(&pattern).unwrap();
        let mut texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        texts.sort_unstable();
        assert_eq!(texts, vec!["deep", "top"]);
    }

    #[test]
    fn test_partial_failure_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.txt", "fine");
        write(&dir, "bad.json", "{ not json");
        let docs = loader().load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "fine");
    }

    #[test]
    fn test_no_documents() {
        let dir = TempDir::new().unwrap();
        write(&dir, "empty.txt", "");
        let pattern = dir.path().to_str().unwrap().to_string();
        match loader().load(&pattern).unwrap_err() {
            Error::NoDocuments(p) => assert_eq!(p, pattern),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            loader().load("/definitely/not/here.txt"),
            Err(Error::NoDocuments(_))
        ));
    }

    #[cfg(feature = "json-stream")]
    #[test]
    fn test_streams_large_array_and_object() {
        let dir = TempDir::new().unwrap();
        let array = write(
            &dir,
            "array.json",
            r#"[{"text":"a"},{"text":"b"},7,{"text":"c"}]"#,
        );
        let object = write(
            &dir,
            "object.json",
            r#"{"k1":{"text":"x"},"k2":{"text":"y","metadata":{"page":9}}}"#,
        );
        let streaming = DocumentLoader::new().with_stream_threshold(8);

        let docs = streaming.load(array.to_str().unwrap()).unwrap();
        let got: Vec<(&str, u64)> = docs.iter().map(|d| (d.text.as_str(), d.page())).collect();
        assert_eq!(got, vec![("a", 0), ("b", 1), ("c", 3)]);

        let docs = streaming.load(object.to_str().unwrap()).unwrap();
        let got: Vec<(&str, u64)> = docs.iter().map(|d| (d.text.as_str(), d.page())).collect();
        assert_eq!(got, vec![("x", 0), ("y", 9)]);
    }

    #[test]
    fn test_large_json_without_streaming() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "big.json", r#"[{"text":"a"}]"#);
        let loader = DocumentLoader::new()
            .with_stream_threshold(4)
            .with_streaming(false);
        assert!(!loader.streaming());

        let err = loader.load_file(&path).unwrap_err();
        match err {
            Error::StreamingCapabilityMissing {
                size, threshold, ..
            } => {
                assert_eq!(size, 14);
                assert_eq!(threshold, 4);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Under the threshold the same file parses eagerly.
        let docs = loader.with_stream_threshold(1024).load_file(&path).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_streaming_follows_feature() {
        let loader = DocumentLoader::new();
        assert_eq!(loader.streaming(), cfg!(feature = "json-stream"));
        assert_eq!(
            loader.with_streaming(true).streaming(),
            cfg!(feature = "json-stream")
        );
    }
}
