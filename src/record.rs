//! JSON Lines output.
//!
//! One object per chunk, in emission order:
//!
//! ```text
//! {"id":"guide.md#p0.0-9f86d081884c7d65","text":"...","meta":{"page":0,"source":"guide.md"}}
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::document::{normalize_page, Document, Metadata, PAGE_KEY};
use crate::id::{IdAllocator, IdScheme};
use crate::Result;

/// One persisted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Identifier, see [`crate::id`].
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Source metadata with `page` as an integer.
    pub meta: Metadata,
}

/// Writes chunks as JSON Lines, assigning ids on the way.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    out: W,
    ids: IdAllocator,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// A writer assigning ids with `scheme`.
    pub fn new(out: W, scheme: IdScheme) -> Self {
        Self {
            out,
            ids: IdAllocator::new(scheme),
            written: 0,
        }
    }

    /// Build the record for `doc` without writing it.
    pub fn record(&mut self, doc: &Document) -> OutputRecord {
        let page = doc.page();
        let source = doc.source().unwrap_or_default().to_string();
        let mut meta = doc.metadata.clone();
        if let Some(value) = meta.get_mut(PAGE_KEY) {
            *value = normalize_page(value).into();
        }
        OutputRecord {
            id: self.ids.next_id(&source, page, &doc.text),
            text: doc.text.clone(),
            meta,
        }
    }

    /// Write one chunk.
    ///
    /// # Errors
    ///
    /// I/O or serialization failure.
    pub fn write(&mut self, doc: &Document) -> Result<OutputRecord> {
        let record = self.record(doc);
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(record)
    }

    /// Write chunks in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed write.
    pub fn write_all(&mut self, docs: &[Document]) -> Result<usize> {
        for doc in docs {
            self.write(doc)?;
        }
        Ok(docs.len())
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the sink.
    ///
    /// # Errors
    ///
    /// Flush failure.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdPathMode;
    use serde_json::Value;

    #[test]
    fn test_jsonl_output() {
        let mut writer = RecordWriter::new(Vec::new(), IdScheme::new(IdPathMode::Hash, None, 48));
        let docs = vec![
            Document::from_source("one", "/x/a.md", 0),
            Document::from_source("one", "/x/a.md", 0).with_meta(PAGE_KEY, "3"),
        ];
        assert_eq!(writer.write_all(&docs).unwrap(), 2);
        assert_eq!(writer.written(), 2);

        let bytes = writer.finish().unwrap();
        let lines: Vec<OutputRecord> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].id.contains("#p0.0-"));
        assert!(lines[1].id.contains("#p3.0-"));
        assert_eq!(lines[1].meta[PAGE_KEY], Value::from(3));
        assert_eq!(lines[0].text, "one");
    }

    #[test]
    fn test_duplicate_text_distinct_ids() {
        let mut writer = RecordWriter::new(Vec::new(), IdScheme::new(IdPathMode::Hash, None, 64));
        let doc = Document::from_source("dup", "/x/a.md", 0);
        let a = writer.write(&doc).unwrap();
        let b = writer.write(&doc).unwrap();
        assert_ne!(a.id, b.id);
    }
}
