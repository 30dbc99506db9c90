//! Markdown-aware splitting.
//!
//! Headings are the natural seams of a Markdown document. The text is first
//! cut into sections at ATX headings (`#` .. `######`, ignoring fenced code),
//! each section is sized with the [`RecursiveTokenSplitter`], and the overlap
//! is injected across the pieces of one document:
//!
//! ```text
//! # Guide               section "Guide"
//! intro...
//! ## Install            section "Guide > Install"
//! steps...
//! ## Usage              section "Guide > Usage"
//! ```
//!
//! Derived documents carry the heading trail as `section` metadata.

use crate::budget::Sizer;
use crate::config::ChunkConfig;
use crate::document::Document;
use crate::overlap::inject_overlap;
use crate::recursive::RecursiveTokenSplitter;
use crate::{Result, Splitter};

/// Metadata key holding the heading trail.
pub const SECTION_KEY: &str = "section";

/// A contiguous run of lines under one heading trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Headings from the top level down, joined with `" > "`.
    pub trail: String,
    /// Section text including its heading line.
    pub text: String,
}

/// Cut Markdown into heading sections.
pub fn sections(text: &str) -> Vec<Section> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut current = String::new();
    let mut trail = String::new();
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }
        let heading = if in_fence { None } else { parse_heading(line) };

        if let Some((level, title)) = heading {
            if !current.trim().is_empty() {
                out.push(Section {
                    trail: trail.clone(),
                    text: std::mem::take(&mut current),
                });
            } else {
                current.clear();
            }
            stack.retain(|(l, _)| *l < level);
            stack.push((level, title));
            trail = stack
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>()
                .join(" > ");
        }
        current.push_str(line);
    }

    if !current.trim().is_empty() {
        out.push(Section {
            trail,
            text: current,
        });
    }
    out
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let line = line.trim_end();
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim().to_string()))
}

/// Heading-aware splitter.
#[derive(Debug, Clone)]
pub struct MarkdownSplitter {
    inner: RecursiveTokenSplitter,
    chunk_overlap: usize,
}

impl MarkdownSplitter {
    /// Wrap a non-overlapping recursive splitter and apply `chunk_overlap` on top.
    pub fn new(inner: RecursiveTokenSplitter, chunk_overlap: usize) -> Self {
        Self {
            inner,
            chunk_overlap,
        }
    }

    /// Build from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configured encoding cannot be loaded.
    pub fn from_config(cfg: &ChunkConfig) -> Result<Self> {
        let inner = RecursiveTokenSplitter::new(
            cfg.chunk_size(),
            0,
            &cfg.separators(),
            Sizer::from_config(cfg)?,
        )?;
        Ok(Self::new(inner, cfg.chunk_overlap()))
    }

    fn sizer(&self) -> &Sizer {
        self.inner.sizer()
    }

    fn pieces(&self, text: &str) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for section in sections(text) {
            for piece in self.inner.split_text(&section.text)? {
                out.push((section.trail.clone(), piece));
            }
        }
        Ok(out)
    }
}

impl Splitter for MarkdownSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let pieces: Vec<String> = self.pieces(text)?.into_iter().map(|(_, p)| p).collect();
        Ok(inject_overlap(&pieces, self.chunk_overlap, self.sizer()))
    }

    fn split_documents(&self, docs: &[Document]) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        for doc in docs {
            let derived: Vec<Document> = self
                .pieces(&doc.text)?
                .into_iter()
                .map(|(trail, piece)| {
                    let child = doc.derive(piece);
                    if trail.is_empty() {
                        child
                    } else {
                        child.with_meta(SECTION_KEY, trail)
                    }
                })
                .collect();
            out.extend(inject_overlap(&derived, self.chunk_overlap, self.sizer()));
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "Preamble.\n\n# Guide\n\nIntro text.\n\n## Install\n\nRun it.\n\n```sh\n# not a heading\n```\n\n## Usage\n\nUse it.\n";

    #[test]
    fn test_sections_follow_headings() {
        let secs = sections(GUIDE);
        let trails: Vec<&str> = secs.iter().map(|s| s.trail.as_str()).collect();
        assert_eq!(trails, vec!["", "Guide", "Guide > Install", "Guide > Usage"]);
        assert!(secs[2].text.contains("# not a heading"));
    }

    #[test]
    fn test_parse_heading() {
        assert_eq!(parse_heading("## Title ##\n"), Some((2, "Title".to_string())));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### seven"), None);
    }

    #[test]
    fn test_split_documents_tags_sections() {
        let inner = RecursiveTokenSplitter::characters(200, 0, &["\n\n"]).unwrap();
        let splitter = MarkdownSplitter::new(inner, 0);
        let docs = vec![Document::from_source(GUIDE, "guide.md", 0)];
        let out = splitter.split_documents(&docs).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].metadata.get(SECTION_KEY), None);
        assert_eq!(out[3].metadata[SECTION_KEY], "Guide > Usage");
        assert!(out.iter().all(|d| d.source() == Some("guide.md")));
    }

    #[test]
    fn test_overlap_across_sections() {
        let inner = RecursiveTokenSplitter::characters(200, 0, &["\n\n"]).unwrap();
        let splitter = MarkdownSplitter::new(inner, 5);
        let chunks = splitter.split_text(GUIDE).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[1].starts_with(&Sizer::Characters.tail(&pair[0], 5)));
        }
    }
}
