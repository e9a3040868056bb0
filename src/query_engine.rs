//! query_engine.rs
//!
//! Retrieval-augmented answering over a [`VectorIndex`].
//!
//! query(question) -> Response
//!   1. Embeds the question with the same deployment used to build the index
//!   2. Retrieves the top-k nodes by cosine similarity
//!   3. Asks the chat deployment to answer from those nodes only
//!
//! The terminal only sees the [`QueryEngine`] trait.

use std::fmt;

use thiserror::Error;

use crate::client::embedder_client::{EmbedError, Embedder};
use crate::client::llm_client::{ChatError, ChatMessage, ChatModel};
use crate::index::vector_index::{IndexError, NodeWithScore, VectorIndex};

const DEFAULT_TOP_K: usize = 2;
const EMPTY_RESPONSE: &str = "Empty Response";
const SOURCE_PREVIEW_CHARS: usize = 100;

const SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the world. \
Always answer the query using the provided context information, and not prior knowledge. \
Never directly reference the given context in your answer.";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("embedding the question: {0}")]
    Embed(#[from] EmbedError),

    #[error("retrieving context: {0}")]
    Retrieve(#[from] IndexError),

    #[error("generating the answer: {0}")]
    Chat(#[from] ChatError),
}

/// Generated answer plus the nodes it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub answer: String,
    pub source_nodes: Vec<NodeWithScore>,
}

impl Response {
    /// One `> Source (Doc id: ..): ..` line per node, text cut to `max_chars`.
    pub fn formatted_sources(&self, max_chars: usize) -> String {
        self.source_nodes
            .iter()
            .map(|n| {
                format!(
                    "> Source (Doc id: {}): {}",
                    n.node.id,
                    truncate(&n.node.text, max_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn default_formatted_sources(&self) -> String {
        self.formatted_sources(SOURCE_PREVIEW_CHARS)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.answer)
    }
}

pub trait QueryEngine {
    async fn query(&self, question: &str) -> Result<Response, QueryError>;
}

pub struct RetrieverQueryEngine<'a, E, C> {
    index: &'a VectorIndex,
    embedder: &'a E,
    llm: &'a C,
    top_k: usize,
}

impl<'a, E, C> RetrieverQueryEngine<'a, E, C>
where
    E: Embedder,
    C: ChatModel,
{
    pub fn new(index: &'a VectorIndex, embedder: &'a E, llm: &'a C) -> Self {
        Self {
            index,
            embedder,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.max(1);
        self
    }
}

impl<E, C> QueryEngine for RetrieverQueryEngine<'_, E, C>
where
    E: Embedder,
    C: ChatModel,
{
    async fn query(&self, question: &str) -> Result<Response, QueryError> {
        let question = question.trim();
        let vector = self.embedder.embed_text(question).await?;
        let source_nodes = self.index.retrieve(&vector, self.top_k)?;
        tracing::debug!(retrieved = source_nodes.len(), "retrieved nodes");

        if source_nodes.is_empty() {
            return Ok(Response {
                answer: EMPTY_RESPONSE.to_string(),
                source_nodes,
            });
        }

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(qa_prompt(question, &source_nodes)),
        ];
        let answer = self.llm.complete(&messages).await?;

        Ok(Response {
            answer: answer.trim().to_string(),
            source_nodes,
        })
    }
}

fn qa_prompt(question: &str, nodes: &[NodeWithScore]) -> String {
    let context = nodes
        .iter()
        .map(|n| match n.node.metadata.get("file_path") {
            Some(path) => format!("file_path: {path}\n\n{}", n.node.text.trim()),
            None => n.node.text.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {question}\n\
Answer: "
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::vector_index::tests::{KeywordEmbedder, docs};
    use crate::transform::text_splitter::{TextNode, TextSplitter};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Echoes a canned answer and records the prompts it was sent.
    struct RecordingChat {
        answer: String,
        seen: RefCell<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingChat {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatModel for RecordingChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.seen.borrow_mut().push(messages.to_vec());
            Ok(format!("  {}\n", self.answer))
        }
    }

    async fn index() -> VectorIndex {
        VectorIndex::from_documents(&docs(), &TextSplitter::default(), &KeywordEmbedder::new())
            .await
            .unwrap()
    }

    pub(crate) fn response(answer: &str, texts: &[&str]) -> Response {
        Response {
            answer: answer.to_string(),
            source_nodes: texts
                .iter()
                .enumerate()
                .map(|(i, t)| NodeWithScore {
                    node: TextNode {
                        id: format!("node-{i}"),
                        ref_doc_id: "doc".into(),
                        text: t.to_string(),
                        metadata: BTreeMap::new(),
                        hash: String::new(),
                    },
                    score: 1.0,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn answers_from_retrieved_context() {
        let index = index().await;
        let embedder = KeywordEmbedder::new();
        let chat = RecordingChat::new("Ownership rules.");
        let engine = RetrieverQueryEngine::new(&index, &embedder, &chat).with_top_k(1);

        let resp = engine.query("  what about rust?  ").await.unwrap();

        assert_eq!(resp.answer, "Ownership rules.");
        assert_eq!(resp.source_nodes.len(), 1);
        assert_eq!(resp.source_nodes[0].node.text, "rust ownership");

        let seen = chat.seen.borrow();
        let prompt = &seen[0][1].content;
        assert!(prompt.contains("rust ownership"));
        assert!(prompt.contains("Query: what about rust?"));
        assert!(!prompt.contains("cooking pasta"));
    }

    #[tokio::test]
    async fn default_top_k_is_two() {
        let index = index().await;
        let embedder = KeywordEmbedder::new();
        let chat = RecordingChat::new("ok");
        let engine = RetrieverQueryEngine::new(&index, &embedder, &chat);

        let resp = engine.query("python").await.unwrap();
        assert_eq!(resp.source_nodes.len(), 2);
        assert_eq!(resp.to_string(), "ok");
    }

    #[tokio::test]
    async fn mismatched_query_dimension_never_reaches_the_model() {
        struct TwoDim;
        impl Embedder for TwoDim {
            fn model_name(&self) -> &str {
                "two-dim"
            }
            async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let index = index().await;
        let chat = RecordingChat::new("unused");
        let engine = RetrieverQueryEngine::new(&index, &TwoDim, &chat);

        let err = engine.query("rust").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Retrieve(IndexError::QueryDimension { expected: 3, got: 2 })
        ));
        assert!(chat.seen.borrow().is_empty());
    }

    #[test]
    fn formats_sources_with_truncation() {
        let long = "word ".repeat(40);
        let resp = response("a", &["short\ntext", &long]);
        let out = resp.formatted_sources(10);

        assert_eq!(
            out,
            "> Source (Doc id: node-0): short text\n\n> Source (Doc id: node-1): word word ..."
        );
    }
}
