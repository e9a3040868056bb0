//! vector_index.rs
//!
//! In-memory vector index over text nodes:
//! - build from documents (split → embed in batches)
//! - exhaustive cosine top-k retrieval
//! - persist to / load from a [`StorageContext`] directory

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::client::embedder_client::{EmbedError, Embedder};
use crate::index::id_generator;
use crate::index::storage::{DocStore, IndexStore, StorageContext, StoreError, VectorStore};
use crate::ingest::dir_reader::Document;
use crate::transform::text_splitter::{TextNode, TextSplitter};

const EMBED_BATCH: usize = 16;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed on nodes [{start}..{end}): {source}")]
    Embed {
        start: usize,
        end: usize,
        #[source]
        source: EmbedError,
    },

    #[error("embedding dimension changed mid-build: expected {expected}, got {got}")]
    MixedDimensions { expected: usize, got: usize },

    #[error("query vector has dimension {got}, index was built with {expected}")]
    QueryDimension { expected: usize, got: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A node together with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWithScore {
    pub node: TextNode,
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    index_id: String,
    embed_model: String,
    dimension: usize,
    nodes: Vec<TextNode>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Split, embed, and index `docs`.
    pub async fn from_documents<E: Embedder>(
        docs: &[Document],
        splitter: &TextSplitter,
        embedder: &E,
    ) -> Result<Self, IndexError> {
        let nodes = splitter.split_all(docs);
        tracing::info!(documents = docs.len(), nodes = nodes.len(), "embedding nodes");

        let pb = ProgressBar::new(nodes.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{prefix} {bar:40} {pos}/{len} {wide_msg}") {
            pb.set_style(style);
        }
        pb.set_prefix("[embed]");
        pb.enable_steady_tick(Duration::from_millis(100));

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(nodes.len());
        let mut start = 0usize;
        while start < nodes.len() {
            let end = (start + EMBED_BATCH).min(nodes.len());
            let inputs: Vec<String> = nodes[start..end].iter().map(TextNode::embedding_input).collect();

            let vectors = embedder
                .embed_texts(&inputs)
                .await
                .map_err(|source| IndexError::Embed { start, end, source })?;
            embeddings.extend(vectors);

            pb.set_position(end as u64);
            start = end;
        }
        pb.finish_and_clear();

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimension) {
            return Err(IndexError::MixedDimensions {
                expected: dimension,
                got: bad.len(),
            });
        }

        let built_at = Utc::now().to_rfc3339();
        let index_id = id_generator::index_id(nodes.iter().map(|n| n.id.as_str()), &built_at);

        Ok(Self {
            index_id,
            embed_model: embedder.model_name().to_string(),
            dimension,
            nodes,
            embeddings,
        })
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let StorageContext {
            mut docstore,
            mut vector_store,
            index_store,
        } = StorageContext::load(dir)?;

        let mut nodes = Vec::with_capacity(index_store.node_ids.len());
        let mut embeddings = Vec::with_capacity(index_store.node_ids.len());
        for id in &index_store.node_ids {
            // presence checked by StorageContext::load
            if let (Some(node), Some(v)) = (
                docstore.docs.remove(id),
                vector_store.embedding_dict.remove(id),
            ) {
                nodes.push(node);
                embeddings.push(v);
            }
        }

        Ok(Self {
            index_id: index_store.index_id,
            embed_model: index_store.embed_model,
            dimension: index_store.dimension,
            nodes,
            embeddings,
        })
    }

    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        let docs: BTreeMap<String, TextNode> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.clone()))
            .collect();
        let embedding_dict: BTreeMap<String, Vec<f32>> = self
            .nodes
            .iter()
            .zip(&self.embeddings)
            .map(|(n, v)| (n.id.clone(), v.clone()))
            .collect();

        let ctx = StorageContext {
            docstore: DocStore { docs },
            vector_store: VectorStore { embedding_dict },
            index_store: IndexStore {
                index_id: self.index_id.clone(),
                node_ids: self.nodes.iter().map(|n| n.id.clone()).collect(),
                embed_model: self.embed_model.clone(),
                dimension: self.dimension,
                built_at: Utc::now(),
            },
        };
        ctx.persist(dir)?;
        tracing::info!(dir = %dir.display(), nodes = self.nodes.len(), "persisted index");
        Ok(())
    }

    /// Top-`k` nodes by cosine similarity, best first.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<NodeWithScore>, IndexError> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::QueryDimension {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        // stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| NodeWithScore {
                node: self.nodes[i].clone(),
                score,
            })
            .collect())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}
