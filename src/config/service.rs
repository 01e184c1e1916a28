//! Job service connection configuration

use serde::{Deserialize, Serialize};

/// Connection settings for the remote job service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the job service, including any path prefix.
    pub base_url: String,
    /// User whose jobs are tracked.
    pub user: String,
    /// Bearer token. Prefer `token_env`; a token in the config file ends up
    /// in plain text on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Environment variable consulted when `token` is absent.
    pub token_env: String,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jobs.example.com".to_string(),
            user: String::new(),
            token: None,
            token_env: "LOOKOUT_TOKEN".to_string(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}

impl ServiceConfig {
    /// Bearer token from the config file, falling back to `token_env`.
    /// Empty strings count as absent in both places.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = &self.token {
            if !token.is_empty() {
                return Some(token.clone());
            }
        }
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }
}
