//! OpenAI client construction.
//!
//! The API key is read from `OPENAI_API_KEY`, falling back to the legacy
//! `OPEN_AI_KEY` variable used by older deployments of the assistant.

use crate::error::{Result, TyrewiseError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["OPENAI_API_KEY", "OPEN_AI_KEY"];

/// Look up the configured API key, if any.
pub fn api_key() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::default();
    if let Some(key) = api_key() {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Fail early when no API key is configured.
pub fn require_api_key() -> Result<String> {
    api_key().ok_or_else(|| {
        TyrewiseError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )
    })
}
