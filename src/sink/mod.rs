//! Sinks: terminal consumers of filtered log entries
//!
//! Two shapes exist: a bounded list that keeps the most recent entries per
//! target, and a fan-out channel for live subscribers. Both serialize their
//! own writes, so each sink sees entries one at a time in arrival order.

use crate::error::Result;
use crate::types::LogEntry;
use async_trait::async_trait;

pub mod channel;
pub mod list;

pub use channel::ChannelSink;
pub use list::{BoundedListSink, ListTarget, DEFAULT_MAX_SIZE, DEFAULT_TENANT};

/// A terminal consumer of log entries
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write an entry whose encoded form has already been computed
    ///
    /// The pipeline encodes once per event and hands the same bytes to
    /// every sink.
    async fn write_encoded(&self, entry: &LogEntry, encoded: &str) -> Result<()>;

    /// Sink name for logs and delivery reports
    fn name(&self) -> &str;

    /// Encode and write an entry
    async fn write(&self, entry: &LogEntry) -> Result<()> {
        let encoded = entry.encode()?;
        self.write_encoded(entry, &encoded).await
    }
}
