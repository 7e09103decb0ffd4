//! Bounded list sink
//!
//! Appends every entry to the head of a named list and trims the list to
//! `max_size`, atomically. The list name is resolved per entry, which lets
//! one sink partition entries by tenant.

use super::LogSink;
use crate::error::{PipelineError, Result};
use crate::provider::StoreProvider;
use crate::types::LogEntry;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default list capacity
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Tenant used when an entry carries none
pub const DEFAULT_TENANT: &str = "manager";

type NameFn = dyn Fn(&LogEntry) -> String + Send + Sync;

/// How the target list name is computed
///
/// Resolved on every write and never cached.
#[derive(Clone)]
pub enum ListTarget {
    /// Same list for every entry
    Constant(String),
    /// Name derived from the entry
    Derived(Arc<NameFn>),
}

impl ListTarget {
    pub fn constant(name: impl Into<String>) -> Self {
        ListTarget::Constant(name.into())
    }

    pub fn derived(f: impl Fn(&LogEntry) -> String + Send + Sync + 'static) -> Self {
        ListTarget::Derived(Arc::new(f))
    }

    /// `<prefix>:<tenant>`, with the tenant read from `config.tenant`
    pub fn per_tenant(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::derived(move |entry| {
            format!("{}:{}", prefix, entry.tenant().unwrap_or(DEFAULT_TENANT))
        })
    }

    pub fn resolve(&self, entry: &LogEntry) -> String {
        match self {
            ListTarget::Constant(name) => name.clone(),
            ListTarget::Derived(f) => f(entry),
        }
    }
}

impl fmt::Debug for ListTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListTarget::Constant(name) => f.debug_tuple("Constant").field(name).finish(),
            ListTarget::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Size-capped list sink
pub struct BoundedListSink {
    store: Box<dyn StoreProvider>,
    target: ListTarget,
    max_size: usize,
    write_lock: Mutex<()>,
}

impl BoundedListSink {
    /// Create a sink that owns its store provider
    pub fn new(
        store: impl StoreProvider + 'static,
        target: ListTarget,
        max_size: usize,
    ) -> Result<Self> {
        if max_size == 0 {
            return Err(PipelineError::Config("maxSize must be >= 1".to_string()));
        }
        Ok(Self {
            store: Box::new(store),
            target,
            max_size,
            write_lock: Mutex::new(()),
        })
    }

    pub fn target(&self) -> &ListTarget {
        &self.target
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get a reference to the underlying provider
    pub fn provider(&self) -> &dyn StoreProvider {
        self.store.as_ref()
    }
}

#[async_trait]
impl LogSink for BoundedListSink {
    async fn write_encoded(&self, entry: &LogEntry, encoded: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = self.target.resolve(entry);

        if let Err(e) = self.store.push_capped(&key, encoded, self.max_size).await {
            tracing::debug!(key = %key, error = %e, "List write failed");
            return Err(e);
        }

        tracing::trace!(key = %key, bytes = encoded.len(), "Entry appended");
        Ok(())
    }

    fn name(&self) -> &str {
        "list"
    }
}
