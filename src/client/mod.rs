//! Clients for the hosted model service.
//!
//! Both clients are built once from [`Settings`] and handed to their
//! consumers by reference.

pub mod embedder_client;
pub mod llm_client;

use thiserror::Error;

use crate::config::Settings;
use embedder_client::{AzureEmbedder, EmbedError};
use llm_client::{AzureChatClient, ChatError};

/// Base URL, key and API version shared by every deployment.
#[derive(Clone)]
pub struct AzureEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
}

impl AzureEndpoint {
    /// `{base}/openai/deployments/{deployment}/{operation}?api-version={v}`
    pub fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.base_url.trim_end_matches('/'),
            deployment,
            operation,
            self.api_version
        )
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("embedding client: {0}")]
    Embed(#[from] EmbedError),

    #[error("chat client: {0}")]
    Chat(#[from] ChatError),
}

pub struct ModelClients {
    pub llm: AzureChatClient,
    pub embedder: AzureEmbedder,
}

impl ModelClients {
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let endpoint = AzureEndpoint {
            base_url: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            api_version: settings.api_version.clone(),
        };

        let llm = AzureChatClient::new(endpoint.clone(), settings.chat.name.as_str())?;
        let embedder = AzureEmbedder::new(endpoint, settings.embedding.name.as_str())?;

        tracing::info!(
            endpoint = %settings.endpoint,
            api_version = %settings.api_version,
            chat = %settings.chat.name,
            chat_model = %settings.chat.model,
            embedding = %settings.embedding.name,
            embedding_model = %settings.embedding.model,
            "model clients ready"
        );

        Ok(Self { llm, embedder })
    }
}
