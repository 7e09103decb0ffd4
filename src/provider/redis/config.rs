//! Redis provider configuration

use serde::{Deserialize, Serialize};

/// Connection settings for a Redis store
///
/// Timeouts are enforced by the connection manager; an expired timeout
/// surfaces as an `Unavailable` error on the write that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisConfig {
    /// Server URL (e.g., "redis://:password@127.0.0.1:6379/0")
    pub url: String,

    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,

    /// Per-command response timeout in seconds
    pub response_timeout_secs: u64,

    /// Reconnect attempts before a command fails
    pub max_retries: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_secs: 5,
            response_timeout_secs: 5,
            max_retries: 3,
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// URL with any password replaced, safe for logs
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &self.url[..scheme_end], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}
