//! dir_reader.rs
//!
//! Reads every top-level file of a source directory into a [`Document`].
//!
//! Responsibilities:
//! - Walk the directory with `ignore::WalkBuilder` (non-recursive, hidden files skipped)
//! - Read UTF-8 files; skip anything else with a warning
//! - Attach file metadata (path, name, size, last modified)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ignore::{DirEntry, WalkBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("source directory {0} does not exist")]
    MissingDir(PathBuf),

    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk: {0}")]
    Walk(#[from] ignore::Error),
}

/// One source file as loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the source directory.
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Where documents come from when an index has to be built.
pub trait DocumentSource {
    fn load_data(&self) -> Result<Vec<Document>, ReaderError>;
}

pub struct DirectoryReader {
    root: PathBuf,
}

impl DirectoryReader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for DirectoryReader {
    fn load_data(&self) -> Result<Vec<Document>, ReaderError> {
        if !self.root.is_dir() {
            return Err(ReaderError::MissingDir(self.root.clone()));
        }

        let walker = WalkBuilder::new(&self.root)
            .max_depth(Some(1))
            .hidden(true)
            .follow_links(false)
            .git_ignore(false)
            .git_exclude(false)
            .git_global(false)
            .ignore(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut out = Vec::new();
        for result in walker {
            let entry = result?;
            if !is_file(&entry) {
                continue;
            }
            if let Some(doc) = read_document(&self.root, entry.path())? {
                out.push(doc);
            }
        }

        tracing::info!(dir = %self.root.display(), documents = out.len(), "loaded documents");
        Ok(out)
    }
}

fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().map(|t| t.is_file()).unwrap_or(false)
}

fn read_document(root: &Path, path: &Path) -> Result<Option<Document>, ReaderError> {
    let io_err = |source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = fs::read(path).map_err(io_err)?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            tracing::warn!(path = %path.display(), "skipping file that is not UTF-8 text");
            return Ok(None);
        }
    };

    let meta = fs::metadata(path).map_err(io_err)?;
    let rel = path.strip_prefix(root).unwrap_or(path);
    let id = rel.to_string_lossy().to_string();

    let mut metadata = BTreeMap::new();
    metadata.insert("file_path".to_string(), path.to_string_lossy().to_string());
    metadata.insert(
        "file_name".to_string(),
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone()),
    );
    metadata.insert("file_size".to_string(), meta.len().to_string());
    if let Ok(modified) = meta.modified() {
        let ts: DateTime<Utc> = modified.into();
        metadata.insert("last_modified_date".to_string(), ts.format("%Y-%m-%d").to_string());
    }

    Ok(Some(Document { id, text, metadata }))
}
