//! lifecycle.rs
//!
//! Decides whether the persisted index is loaded or rebuilt:
//! - inspect the persist directory
//! - optionally wipe it (the caller supplies the user's answer)
//! - marker present → load; otherwise read documents, embed, persist
//!
//! How the user is asked lives in `terminal`; this module never does console I/O.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::client::embedder_client::Embedder;
use crate::index::storage;
use crate::index::vector_index::{IndexError, VectorIndex};
use crate::ingest::dir_reader::{DocumentSource, ReaderError};
use crate::transform::text_splitter::TextSplitter;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading documents: {0}")]
    Reader(#[from] ReaderError),

    #[error("no documents with text to index")]
    NoDocuments,

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Loaded,
    Built,
}

/// What is currently on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistedState {
    Absent,
    Empty,
    Populated { has_marker: bool },
}

pub struct IndexManager {
    persist_dir: PathBuf,
    splitter: TextSplitter,
    state: IndexState,
}

impl IndexManager {
    pub fn new<P: Into<PathBuf>>(persist_dir: P) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            splitter: TextSplitter::default(),
            state: IndexState::Uninitialized,
        }
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn inspect(&self) -> Result<PersistedState, LifecycleError> {
        if !self.persist_dir.is_dir() {
            return Ok(PersistedState::Absent);
        }
        let mut entries = fs::read_dir(&self.persist_dir).map_err(|e| self.io_err(e))?;
        if entries.next().is_none() {
            return Ok(PersistedState::Empty);
        }
        Ok(PersistedState::Populated {
            has_marker: storage::has_marker(&self.persist_dir),
        })
    }

    /// True when there is persisted state the user may want to discard.
    pub fn needs_confirmation(&self) -> Result<bool, LifecycleError> {
        Ok(matches!(self.inspect()?, PersistedState::Populated { .. }))
    }

    /// Produce a usable index, loading or building as the disk state dictates.
    ///
    /// `remove_existing` is the user's answer to the removal prompt; pass
    /// `false` when no prompt was shown.
    pub async fn initialize<S, E>(
        &mut self,
        remove_existing: bool,
        source: &S,
        embedder: &E,
    ) -> Result<VectorIndex, LifecycleError>
    where
        S: DocumentSource,
        E: Embedder,
    {
        if remove_existing {
            self.remove_persisted()?;
        }
        fs::create_dir_all(&self.persist_dir).map_err(|e| self.io_err(e))?;

        if storage::has_marker(&self.persist_dir) {
            let index = VectorIndex::load(&self.persist_dir)?;
            if index.embed_model() != embedder.model_name() {
                tracing::warn!(
                    persisted = index.embed_model(),
                    configured = embedder.model_name(),
                    "index was built with a different embedding deployment"
                );
            }
            tracing::info!(
                dir = %self.persist_dir.display(),
                nodes = index.node_count(),
                "loaded existing index"
            );
            self.state = IndexState::Loaded;
            return Ok(index);
        }

        tracing::info!(dir = %self.persist_dir.display(), "no usable index found, building");
        let docs = source.load_data()?;
        if docs.is_empty() {
            return Err(LifecycleError::NoDocuments);
        }

        let index = VectorIndex::from_documents(&docs, &self.splitter, embedder).await?;
        if index.node_count() == 0 {
            return Err(LifecycleError::NoDocuments);
        }
        index.persist(&self.persist_dir)?;
        self.state = IndexState::Built;
        Ok(index)
    }

    fn remove_persisted(&mut self) -> Result<(), LifecycleError> {
        if self.persist_dir.exists() {
            fs::remove_dir_all(&self.persist_dir).map_err(|e| self.io_err(e))?;
            tracing::info!(dir = %self.persist_dir.display(), "removed persisted index");
        }
        self.state = IndexState::Uninitialized;
        Ok(())
    }

    fn io_err(&self, source: io::Error) -> LifecycleError {
        LifecycleError::Io {
            path: self.persist_dir.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::vector_index::tests::{KeywordEmbedder, docs};
    use crate::ingest::dir_reader::Document;
    use std::cell::Cell;

    /// Serves a fixed set of documents and counts reads.
    struct CountingSource {
        docs: Vec<Document>,
        reads: Cell<usize>,
    }

    impl CountingSource {
        fn new(docs: Vec<Document>) -> Self {
            Self {
                docs,
                reads: Cell::new(0),
            }
        }
    }

    impl DocumentSource for CountingSource {
        fn load_data(&self) -> Result<Vec<Document>, ReaderError> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.docs.clone())
        }
    }

    async fn build_into(dir: &Path) {
        let mut manager = IndexManager::new(dir);
        manager
            .initialize(false, &CountingSource::new(docs()), &KeywordEmbedder::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn builds_when_nothing_is_persisted() {
        let tmpdir = tempfile::tempdir().unwrap();
        let dir = tmpdir.path().join("vectors");
        let mut manager = IndexManager::new(&dir);
        assert_eq!(manager.inspect().unwrap(), PersistedState::Absent);
        assert!(!manager.needs_confirmation().unwrap());

        let source = CountingSource::new(docs());
        let embedder = KeywordEmbedder::new();
        let index = manager.initialize(false, &source, &embedder).await.unwrap();

        assert_eq!(manager.state(), IndexState::Built);
        assert_eq!(source.reads.get(), 1);
        assert_eq!(index.node_count(), 3);
        assert!(storage::has_marker(&dir));
    }

    #[tokio::test]
    async fn loads_when_marker_is_present() {
        let tmpdir = tempfile::tempdir().unwrap();
        build_into(tmpdir.path()).await;

        let mut manager = IndexManager::new(tmpdir.path());
        assert_eq!(
            manager.inspect().unwrap(),
            PersistedState::Populated { has_marker: true }
        );

        let source = CountingSource::new(docs());
        let embedder = KeywordEmbedder::new();
        let index = manager.initialize(false, &source, &embedder).await.unwrap();

        assert_eq!(manager.state(), IndexState::Loaded);
        assert_eq!(source.reads.get(), 0);
        assert_eq!(embedder.calls.get(), 0);
        assert_eq!(index.node_count(), 3);
    }

    #[tokio::test]
    async fn confirmed_removal_wipes_and_rebuilds() {
        let tmpdir = tempfile::tempdir().unwrap();
        build_into(tmpdir.path()).await;
        let stray = tmpdir.path().join("stray.txt");
        fs::write(&stray, "left over").unwrap();

        let mut manager = IndexManager::new(tmpdir.path());
        assert!(manager.needs_confirmation().unwrap());

        let source = CountingSource::new(docs()[..1].to_vec());
        let embedder = KeywordEmbedder::new();
        let index = manager.initialize(true, &source, &embedder).await.unwrap();

        assert_eq!(manager.state(), IndexState::Built);
        assert_eq!(source.reads.get(), 1);
        assert_eq!(index.node_count(), 1);
        assert!(!stray.exists());
        assert!(storage::has_marker(tmpdir.path()));
    }

    #[tokio::test]
    async fn declined_removal_keeps_everything() {
        let tmpdir = tempfile::tempdir().unwrap();
        build_into(tmpdir.path()).await;
        let stray = tmpdir.path().join("stray.txt");
        fs::write(&stray, "left over").unwrap();

        let mut manager = IndexManager::new(tmpdir.path());
        manager
            .initialize(false, &CountingSource::new(docs()), &KeywordEmbedder::new())
            .await
            .unwrap();

        assert_eq!(manager.state(), IndexState::Loaded);
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn populated_dir_without_marker_is_rebuilt() {
        let tmpdir = tempfile::tempdir().unwrap();
        fs::write(tmpdir.path().join("docstore.json"), "{}").unwrap();

        let mut manager = IndexManager::new(tmpdir.path());
        assert_eq!(
            manager.inspect().unwrap(),
            PersistedState::Populated { has_marker: false }
        );

        let source = CountingSource::new(docs());
        manager
            .initialize(false, &source, &KeywordEmbedder::new())
            .await
            .unwrap();
        assert_eq!(manager.state(), IndexState::Built);
        assert_eq!(source.reads.get(), 1);
    }

    #[tokio::test]
    async fn empty_source_is_an_error() {
        let tmpdir = tempfile::tempdir().unwrap();
        let mut manager = IndexManager::new(tmpdir.path());
        assert_eq!(manager.inspect().unwrap(), PersistedState::Empty);

        let err = manager
            .initialize(false, &CountingSource::new(Vec::new()), &KeywordEmbedder::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NoDocuments));
        assert_eq!(manager.state(), IndexState::Uninitialized);
    }

    #[tokio::test]
    async fn whitespace_only_documents_are_rejected() {
        let tmpdir = tempfile::tempdir().unwrap();
        let mut manager = IndexManager::new(tmpdir.path());
        let blank = Document {
            id: "blank.txt".into(),
            text: " \n\t \r\n".into(),
            metadata: Default::default(),
        };
        let embedder = KeywordEmbedder::new();

        let result = manager
            .initialize(false, &CountingSource::new(vec![blank]), &embedder)
            .await;

        assert!(matches!(result, Err(LifecycleError::NoDocuments)));
        assert_eq!(embedder.calls.get(), 0);
        assert!(!storage::has_marker(tmpdir.path()));
        assert_eq!(manager.state(), IndexState::Uninitialized);
    }
}
