//! Fan-out channel sink
//!
//! Best-effort broadcast to live subscribers. Without a configured channel
//! the sink is inert: writes succeed and the store is never touched.

use super::LogSink;
use crate::error::Result;
use crate::provider::StoreProvider;
use crate::types::LogEntry;
use async_trait::async_trait;
use tokio::sync::Mutex;

struct Route {
    channel: String,
    store: Box<dyn StoreProvider>,
}

/// Publish/subscribe sink
pub struct ChannelSink {
    route: Option<Route>,
    write_lock: Mutex<()>,
}

impl ChannelSink {
    /// Create a sink publishing to `channel`, or an inert one for `None`
    ///
    /// An inert sink drops the provider immediately.
    pub fn new(store: impl StoreProvider + 'static, channel: Option<String>) -> Self {
        let route = channel.map(|channel| Route {
            channel,
            store: Box::new(store),
        });
        Self {
            route,
            write_lock: Mutex::new(()),
        }
    }

    /// Sink that never publishes
    pub fn inert() -> Self {
        Self {
            route: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.channel.as_str())
    }

    pub fn is_inert(&self) -> bool {
        self.route.is_none()
    }
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn write_encoded(&self, _entry: &LogEntry, encoded: &str) -> Result<()> {
        let Some(route) = &self.route else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let receivers = route.store.publish(&route.channel, encoded).await?;
        tracing::trace!(channel = %route.channel, receivers, "Entry published");
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }

    async fn write(&self, entry: &LogEntry) -> Result<()> {
        if self.route.is_none() {
            return Ok(());
        }
        let encoded = entry.encode()?;
        self.write_encoded(entry, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::{FailPoint, MemoryProvider};
    use crate::types::LogEvent;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_unconfigured_is_noop() {
        let store = MemoryProvider::default();
        let sink = ChannelSink::new(store.clone(), None);
        assert!(sink.is_inert());

        store.set_available(false);
        for _ in 0..3 {
            sink.write(&LogEvent::response(500).into()).await.unwrap();
        }
        assert_eq!(store.operations(), 0);
    }

    #[tokio::test]
    async fn test_inert_constructor() {
        let sink = ChannelSink::inert();
        assert!(sink.channel().is_none());
        sink.write(&LogEntry::from("x")).await.unwrap();
    }

    #[tokio::test]
    async fn test_publishes_to_subscribers() {
        let store = MemoryProvider::default();
        let sink = ChannelSink::new(store.clone(), Some("live".to_string()));
        let mut sub = store.subscribe("live").unwrap();

        let event = LogEvent::response(200).with_tag("api");
        sink.write(&event.clone().into()).await.unwrap();

        let received = sub.next().await.unwrap();
        let decoded: LogEvent = serde_json::from_str(&received).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn test_no_subscribers_is_ok() {
        let store = MemoryProvider::default();
        let sink = ChannelSink::new(store.clone(), Some("live".to_string()));
        sink.write(&LogEntry::from("nobody listening")).await.unwrap();
        assert_eq!(store.operations(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_propagates() {
        let store = MemoryProvider::default();
        let sink = ChannelSink::new(store.clone(), Some("live".to_string()));
        store.fail_next(FailPoint::Publish);
        let err = sink.write(&LogEntry::from("x")).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
