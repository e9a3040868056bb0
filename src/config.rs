//! config.rs
//!
//! Connection settings for the hosted model service, read from the process
//! environment (after an optional `.env` file has been loaded).
//!
//! Required: API key, endpoint, API version. Deployment names have defaults.

use std::env;
use std::fmt;

use thiserror::Error;

const API_KEY_VARS: &[&str] = &["AZURE_OPENAI_API_KEY", "API-KEY"];
const ENDPOINT_VARS: &[&str] = &["AZURE_OPENAI_ENDPOINT"];
const API_VERSION_VARS: &[&str] = &["OPENAI_API_VERSION", "AZURE_OPENAI_API_VERSION"];
const CHAT_DEPLOYMENT_VAR: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT";
const EMBED_DEPLOYMENT_VAR: &str = "AZURE_OPENAI_EMBED_DEPLOYMENT";

const DEFAULT_CHAT_DEPLOYMENT: &str = "saworks-gpt4o";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const DEFAULT_EMBED_DEPLOYMENT: &str = "saworks-ada2";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-ada-002";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: set {name}")]
    Missing { name: String },
}

/// A named deployment on the endpoint plus the model it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub name: String,
    pub model: String,
}

#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub chat: Deployment,
    pub embedding: Deployment,
}

impl Settings {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, API_KEY_VARS)?;
        let endpoint = required(&lookup, ENDPOINT_VARS)?;
        let api_version = required(&lookup, API_VERSION_VARS)?;

        let chat = Deployment {
            name: optional(&lookup, CHAT_DEPLOYMENT_VAR)
                .unwrap_or_else(|| DEFAULT_CHAT_DEPLOYMENT.to_string()),
            model: DEFAULT_CHAT_MODEL.to_string(),
        };
        let embedding = Deployment {
            name: optional(&lookup, EMBED_DEPLOYMENT_VAR)
                .unwrap_or_else(|| DEFAULT_EMBED_DEPLOYMENT.to_string()),
            model: DEFAULT_EMBED_MODEL.to_string(),
        };

        Ok(Self {
            api_key,
            endpoint,
            api_version,
            chat,
            embedding,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("chat", &self.chat)
            .field("embedding", &self.embedding)
            .finish()
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First non-blank value among `names`; the error names the preferred one.
fn required<F>(lookup: &F, names: &[&str]) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .find_map(|name| optional(lookup, name))
        .ok_or_else(|| ConfigError::Missing {
            name: names.join(" or "),
        })
}
