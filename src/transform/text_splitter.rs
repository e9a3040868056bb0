//! text_splitter.rs
//!
//! Cleans documents and cuts them into overlapping word windows (nodes)
//! ready for embedding.
//!
//! Responsibilities:
//! - Normalize line endings and surrounding whitespace
//! - Split into `chunk_size` word windows overlapping by `chunk_overlap` words
//! - Compute stable node ids and content hashes
//!
//! Does not mutate document metadata; every node inherits it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::id_generator;
use crate::ingest::dir_reader::Document;

pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

/// A retrievable piece of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub id: String,
    pub ref_doc_id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub hash: String,
}

impl TextNode {
    /// Text sent to the embedding model: metadata header, blank line, body.
    pub fn embedding_input(&self) -> String {
        let header: Vec<String> = self
            .metadata
            .iter()
            .filter(|(k, _)| k.as_str() == "file_path" || k.as_str() == "file_name")
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        if header.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\n{}", header.join("\n"), self.text)
        }
    }
}

impl TextSplitter {
    pub fn split(&self, doc: &Document) -> Vec<TextNode> {
        let text = normalize_text(&doc.text);
        split_words(&text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let hash = id_generator::content_hash(&chunk);
                TextNode {
                    id: id_generator::node_id(&doc.id, i, &hash),
                    ref_doc_id: doc.id.clone(),
                    text: chunk,
                    metadata: doc.metadata.clone(),
                    hash,
                }
            })
            .collect()
    }

    pub fn split_all(&self, docs: &[Document]) -> Vec<TextNode> {
        docs.iter().flat_map(|d| self.split(d)).collect()
    }
}

/// ---- helpers ----
fn normalize_text(src: &str) -> String {
    src.replace("\r\n", "\n").trim().to_string()
}

/// Word windows; paragraph breaks inside a window are kept as-is.
fn split_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    // byte spans of each word, so windows can be sliced from the original text
    let spans: Vec<(usize, usize)> = word_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(spans.len());
        let (from, _) = spans[start];
        let (_, to) = spans[end - 1];
        out.push(text[from..to].to_string());
        if end == spans.len() {
            break;
        }
        start += step;
    }
    out
}

fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
