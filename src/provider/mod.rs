//! Store provider trait: the core abstraction for sink backends
//!
//! Sinks never talk to a store directly. Every backend (Redis, in-memory)
//! implements `StoreProvider`, which offers exactly what the sinks need:
//! an atomic capped push and a publish primitive, plus a few reads for
//! consumers and health checks.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;

pub mod memory;
pub mod redis;

/// Core trait for store backends
///
/// Each sink owns its own provider instance; providers are opened once
/// and reused for every write.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Push `value` to the head of list `key`, then trim the list to at
    /// most `max_len` entries, as a single atomic unit
    ///
    /// Readers observe either the list before the push or the list after
    /// the trim, never the intermediate state. A `max_len` of 0 is rejected
    /// with `PipelineError::Config` before the store is touched.
    async fn push_capped(&self, key: &str, value: &str, max_len: usize) -> Result<()>;

    /// Publish `value` on a broadcast channel
    ///
    /// Returns the number of subscribers that received it. No backlog is
    /// kept for absent subscribers.
    async fn publish(&self, channel: &str, value: &str) -> Result<usize>;

    /// Read up to `limit` entries from the head of list `key` (newest first)
    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>>;

    /// Current length of list `key` (0 if absent)
    async fn len(&self, key: &str) -> Result<usize>;

    /// Round-trip to the store
    async fn ping(&self) -> Result<()>;

    /// Provider name (e.g., "redis", "memory")
    fn name(&self) -> &str;

    /// Health check: returns true if the provider is reachable
    ///
    /// Default implementation delegates to `ping()`.
    async fn health(&self) -> Result<bool> {
        self.ping().await.map(|_| true)
    }
}

/// Reject a list bound no store can honor
pub(crate) fn check_max_len(key: &str, max_len: usize) -> Result<()> {
    if max_len == 0 {
        return Err(PipelineError::Config(format!(
            "list {} needs a max length of at least 1",
            key
        )));
    }
    Ok(())
}
