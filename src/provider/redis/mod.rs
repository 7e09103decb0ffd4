//! Redis store provider
//!
//! Implements `StoreProvider` on a single multiplexed connection that
//! reconnects on its own. The capped push runs as
//! `MULTI / LPUSH / LTRIM / EXEC`, so the trim can never be observed
//! without the push or vice versa.

mod config;

pub use config::RedisConfig;

use super::{check_max_len, StoreProvider};
use crate::error::{PipelineError, Result};
use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::AsyncCommands;
use async_trait::async_trait;
use std::time::Duration;

/// Redis-backed store provider
///
/// The connection is opened once in `connect` and reused for every
/// operation. Cloning the manager is cheap and shares the connection.
pub struct RedisProvider {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisProvider {
    /// Connect to Redis
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = ::redis::Client::open(config.url.as_str()).map_err(|e| {
            PipelineError::Config(format!("Invalid Redis URL '{}': {}", config.redacted_url(), e))
        })?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(config.connect_timeout_secs))
            .set_response_timeout(Duration::from_secs(config.response_timeout_secs))
            .set_number_of_retries(config.max_retries);

        let conn = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| PipelineError::unavailable(config.redacted_url(), e))?;

        tracing::info!(url = %config.redacted_url(), "Connected to Redis");

        Ok(Self { conn, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get a handle on the shared connection for advanced usage
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl StoreProvider for RedisProvider {
    async fn push_capped(&self, key: &str, value: &str, max_len: usize) -> Result<()> {
        check_max_len(key, max_len)?;
        let stop = isize::try_from(max_len)
            .map_err(|_| PipelineError::Config(format!("maxSize {} out of range", max_len)))?
            - 1;

        let mut conn = self.conn.clone();
        let _: () = ::redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| PipelineError::unavailable(key, e))?;

        tracing::trace!(key = %key, max_len, "Capped push committed");
        Ok(())
    }

    async fn publish(&self, channel: &str, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn
            .publish(channel, value)
            .await
            .map_err(|e| PipelineError::unavailable(channel, e))?;

        tracing::trace!(channel = %channel, receivers, "Published");
        Ok(receivers)
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, stop)
            .await
            .map_err(|e| PipelineError::unavailable(key, e))
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        conn.llen(key)
            .await
            .map_err(|e| PipelineError::unavailable(key, e))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| PipelineError::unavailable(self.config.redacted_url(), e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
