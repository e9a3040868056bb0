//! llm_client.rs
//!
//! Chat-completion client for an Azure OpenAI deployment (non-streaming).

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::AzureEndpoint;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.1;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("chat response contained no message content")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Anything that answers a list of chat messages with one completion.
pub trait ChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

pub struct AzureChatClient {
    http: reqwest::Client,
    endpoint: AzureEndpoint,
    deployment: String,
    temperature: f32,
}

impl AzureChatClient {
    pub fn new<S: Into<String>>(endpoint: AzureEndpoint, deployment: S) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            deployment: deployment.into(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    fn completions_url(&self) -> String {
        self.endpoint
            .deployment_url(&self.deployment, "chat/completions")
    }
}

impl ChatModel for AzureChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let body = ChatRequest {
            messages,
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.endpoint.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let parsed: ChatResponse = resp.json().await?;
        first_content(parsed)
    }
}

fn first_content(resp: ChatResponse) -> Result<String, ChatError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ChatError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    // null when the content filter trips
    content: Option<String>,
}
