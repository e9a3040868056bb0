//! embedder_client.rs
//!
//! Client for an Azure OpenAI embeddings deployment. Provides single and
//! batch embedding behind the [`Embedder`] trait so index building and
//! querying can be driven by a fake in tests.
//!
//! Assumptions:
//! - One request per batch; the caller decides batch size.
//! - No retry. Transport errors and non-2xx responses surface as [`EmbedError`].

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::AzureEndpoint;

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("empty embedding response")]
    EmptyResponse,

    #[error("embedding count mismatch: sent {sent}, got {got}")]
    CountMismatch { sent: usize, got: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },
}

/// Anything that turns text into vectors.
pub trait Embedder {
    /// Name recorded alongside persisted vectors.
    fn model_name(&self) -> &str;

    /// Embed multiple texts; output order matches input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single text string.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.embed_texts(&[text.to_string()]).await?;
        out.pop().ok_or(EmbedError::EmptyResponse)
    }
}

/// Embedding client bound to one deployment.
pub struct AzureEmbedder {
    http: reqwest::Client,
    endpoint: AzureEndpoint,
    deployment: String,
    /// Vector dimension; fixed by the first successful response.
    dim: OnceLock<usize>,
}

impl AzureEmbedder {
    pub fn new<S: Into<String>>(endpoint: AzureEndpoint, deployment: S) -> Result<Self, EmbedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            deployment: deployment.into(),
            dim: OnceLock::new(),
        })
    }

    fn embeddings_url(&self) -> String {
        self.endpoint.deployment_url(&self.deployment, "embeddings")
    }

    fn check_dim(&self, got: usize) -> Result<(), EmbedError> {
        let expected = *self.dim.get_or_init(|| got);
        if expected != got {
            return Err(EmbedError::DimMismatch { expected, got });
        }
        Ok(())
    }

    async fn embed_texts_raw(&self, texts: &[String]) -> Result<Vec<EmbeddingDatum>, EmbedError> {
        let req = EmbeddingsRequest { input: texts };

        let resp = self
            .http
            .post(self.embeddings_url())
            .header("api-key", &self.endpoint.api_key)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Status { status, body });
        }

        let parsed: EmbeddingsResponse = resp.json().await?;
        if parsed.data.is_empty() {
            return Err(EmbedError::EmptyResponse);
        }
        Ok(parsed.data)
    }
}

impl Embedder for AzureEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let n = texts.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let data = self.embed_texts_raw(texts).await?;
        let vectors = order_by_index(data, n)?;
        for v in &vectors {
            self.check_dim(v.len())?;
        }
        Ok(vectors)
    }
}

/// Sort by `index` (some servers already do this) and check the count.
fn order_by_index(data: Vec<EmbeddingDatum>, sent: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    if data.len() != sent {
        return Err(EmbedError::CountMismatch {
            sent,
            got: data.len(),
        });
    }

    let mut pairs: Vec<(usize, Vec<f32>)> = data
        .into_iter()
        .enumerate()
        .map(|(pos, d)| (d.index.unwrap_or(pos), d.embedding))
        .collect();
    pairs.sort_by_key(|(i, _)| *i);

    Ok(pairs.into_iter().map(|(_, emb)| emb).collect())
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

/// Response payload (subset) for embeddings.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    embedding: Vec<f32>,
}
