//! storage.rs
//!
//! On-disk layout of a persisted index:
//! - `docstore.json`: node id -> node
//! - `vector_store.json`: node id -> embedding
//! - `index_store.json`: marker; index id, node order, embedding model, dimension
//!
//! The marker is written last, so a directory without it never counts as a
//! completed build.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::text_splitter::TextNode;

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const MARKER_FILE: &str = "index_store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("persisted index is inconsistent: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocStore {
    pub docs: BTreeMap<String, TextNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub embedding_dict: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStore {
    pub index_id: String,
    /// Insertion order of nodes; retrieval ties resolve by this order.
    pub node_ids: Vec<String>,
    pub embed_model: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
}

/// Everything that is written to / read from a persist directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageContext {
    pub docstore: DocStore,
    pub vector_store: VectorStore,
    pub index_store: IndexStore,
}

impl StorageContext {
    pub fn persist(&self, dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write_json(&dir.join(DOCSTORE_FILE), &self.docstore)?;
        write_json(&dir.join(VECTOR_STORE_FILE), &self.vector_store)?;
        write_json(&dir.join(MARKER_FILE), &self.index_store)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let index_store: IndexStore = read_json(&dir.join(MARKER_FILE))?;
        let docstore: DocStore = read_json(&dir.join(DOCSTORE_FILE))?;
        let vector_store: VectorStore = read_json(&dir.join(VECTOR_STORE_FILE))?;

        let ctx = Self {
            docstore,
            vector_store,
            index_store,
        };
        ctx.validate()?;
        Ok(ctx)
    }

    fn validate(&self) -> Result<(), StoreError> {
        for id in &self.index_store.node_ids {
            if !self.docstore.docs.contains_key(id) {
                return Err(StoreError::Corrupt(format!("node {id} missing from docstore")));
            }
            let Some(v) = self.vector_store.embedding_dict.get(id) else {
                return Err(StoreError::Corrupt(format!("node {id} has no embedding")));
            };
            if v.len() != self.index_store.dimension {
                return Err(StoreError::Corrupt(format!(
                    "node {id} has dimension {}, expected {}",
                    v.len(),
                    self.index_store.dimension
                )));
            }
        }
        Ok(())
    }
}

pub fn has_marker(dir: &Path) -> bool {
    dir.join(MARKER_FILE).is_file()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string(value).map_err(|source| StoreError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StorageContext {
        let node = TextNode {
            id: "n1".into(),
            ref_doc_id: "a.txt".into(),
            text: "hello".into(),
            metadata: BTreeMap::new(),
            hash: "h".into(),
        };
        StorageContext {
            docstore: DocStore {
                docs: BTreeMap::from([("n1".to_string(), node)]),
            },
            vector_store: VectorStore {
                embedding_dict: BTreeMap::from([("n1".to_string(), vec![0.5, 0.5])]),
            },
            index_store: IndexStore {
                index_id: "idx".into(),
                node_ids: vec!["n1".into()],
                embed_model: "ada".into(),
                dimension: 2,
                built_at: Utc::now(),
            },
        }
    }

    #[test]
    fn persist_then_load_restores_everything() {
        let tmpdir = tempfile::tempdir().unwrap();
        let dir = tmpdir.path().join("vectors");
        let ctx = sample();

        ctx.persist(&dir).unwrap();
        assert!(has_marker(&dir));

        let loaded = StorageContext::load(&dir).unwrap();
        assert_eq!(loaded, ctx);
    }

    #[test]
    fn missing_embedding_is_corrupt() {
        let tmpdir = tempfile::tempdir().unwrap();
        let mut ctx = sample();
        ctx.vector_store.embedding_dict.clear();
        ctx.persist(tmpdir.path()).unwrap();

        let err = StorageContext::load(tmpdir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn garbage_marker_is_reported_with_path() {
        let tmpdir = tempfile::tempdir().unwrap();
        sample().persist(tmpdir.path()).unwrap();
        fs::write(tmpdir.path().join(MARKER_FILE), "{not json").unwrap();

        let err = StorageContext::load(tmpdir.path()).unwrap_err();
        match err {
            StoreError::Serde { path, .. } => assert!(path.ends_with(MARKER_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
