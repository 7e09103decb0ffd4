//! In-memory store provider
//!
//! Behaves like a single Redis server living inside the process: clones of
//! a `MemoryProvider` share the same lists and channels, so a test can hand
//! one clone to each sink and keep another to inspect the results.
//! Fault injection makes it possible to exercise unavailability and the
//! atomicity of the capped push.

use super::{check_max_len, StoreProvider};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Stream of messages received on a channel
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

type ChannelMap = HashMap<String, broadcast::Sender<String>>;

/// Where an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Before the value is pushed
    Push,
    /// After the push, before the trim
    Trim,
    /// On publish
    Publish,
}

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Per-channel buffer for slow subscribers
    pub channel_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

struct Shared {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
    channels: Mutex<ChannelMap>,
    fail_point: Mutex<Option<FailPoint>>,
    available: AtomicBool,
    operations: AtomicU64,
    config: MemoryConfig,
}

/// In-process store provider
#[derive(Clone)]
pub struct MemoryProvider {
    shared: Arc<Shared>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryProvider {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                lists: RwLock::new(HashMap::new()),
                channels: Mutex::new(HashMap::new()),
                fail_point: Mutex::new(None),
                available: AtomicBool::new(true),
                operations: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Subscribe to a channel; only messages published afterwards are seen
    pub fn subscribe(&self, channel: &str) -> Result<MessageStream> {
        let rx = self.sender(channel)?.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|msg| msg.ok());
        Ok(Box::pin(stream))
    }

    /// Arm a one-shot failure at the given point
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut slot) = self.shared.fail_point.lock() {
            *slot = Some(point);
        }
    }

    /// Simulate the store going away or coming back
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Number of operations that reached the store
    pub fn operations(&self) -> u64 {
        self.shared.operations.load(Ordering::SeqCst)
    }

    /// Snapshot of a list, newest first
    pub async fn list(&self, key: &str) -> Vec<String> {
        let lists = self.shared.lists.read().await;
        lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all non-empty lists
    pub async fn keys(&self) -> Vec<String> {
        let lists = self.shared.lists.read().await;
        let mut keys: Vec<String> = lists.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn enter(&self, target: &str) -> Result<()> {
        self.shared.operations.fetch_add(1, Ordering::SeqCst);
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(PipelineError::unavailable(target, "store not reachable"));
        }
        Ok(())
    }

    fn trip(&self, point: FailPoint) -> bool {
        match self.shared.fail_point.lock() {
            Ok(mut slot) if *slot == Some(point) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Number of channels with a registered sender
    pub fn open_channels(&self) -> usize {
        self.shared.channels.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn channels(&self, channel: &str) -> Result<MutexGuard<'_, ChannelMap>> {
        self.shared.channels.lock().map_err(|e| {
            PipelineError::unavailable(channel, format!("channel registry lock poisoned: {}", e))
        })
    }

    fn sender(&self, channel: &str) -> Result<broadcast::Sender<String>> {
        let mut channels = self.channels(channel)?;
        let capacity = self.shared.config.channel_capacity.max(1);
        Ok(channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone())
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn push_capped(&self, key: &str, value: &str, max_len: usize) -> Result<()> {
        check_max_len(key, max_len)?;
        self.enter(key)?;
        if self.trip(FailPoint::Push) {
            return Err(PipelineError::unavailable(key, "push rejected"));
        }

        // Write lock held across push and trim: readers never see the middle.
        let mut lists = self.shared.lists.write().await;
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());

        if self.trip(FailPoint::Trim) {
            list.pop_front();
            if list.is_empty() {
                lists.remove(key);
            }
            return Err(PipelineError::unavailable(key, "transaction aborted before trim"));
        }

        list.truncate(max_len);
        if list.is_empty() {
            lists.remove(key);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, value: &str) -> Result<usize> {
        self.enter(channel)?;
        if self.trip(FailPoint::Publish) {
            return Err(PipelineError::unavailable(channel, "publish rejected"));
        }
        // No receivers is not an error: the message is simply gone, and a
        // channel whose last subscriber left is forgotten.
        let mut channels = self.channels(channel)?;
        let Some(sender) = channels.get(channel) else {
            return Ok(0);
        };
        match sender.send(value.to_string()) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                channels.remove(channel);
                Ok(0)
            }
        }
    }

    async fn range(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        self.enter(key)?;
        let lists = self.shared.lists.read().await;
        Ok(lists
            .get(key)
            .map(|l| l.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize> {
        self.enter(key)?;
        let lists = self.shared.lists.read().await;
        Ok(lists.get(key).map(VecDeque::len).unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        self.enter("ping")
    }

    fn name(&self) -> &str {
        "memory"
    }
}
