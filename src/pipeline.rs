//! Filter-and-route pipeline
//!
//! `LogPipeline` evaluates each event against its policy and hands the
//! survivors to every sink. Sinks are independent: they run concurrently
//! for the same event and one failing never stops the others. Failures are
//! reported back to the caller; nothing here retries.
//!
//! `LogPipeline::start` (or `spawn` with an explicit depth) moves the
//! pipeline onto a single worker task fed by a bounded queue, which gives
//! strict arrival-order processing and backpressure on the producer.

use crate::config::{PipelineConfig, DEFAULT_QUEUE_CAPACITY};
use crate::error::{PipelineError, Result};
use crate::filter::{FilterEngine, FilterScope, Verdict};
use crate::provider::redis::RedisProvider;
use crate::provider::StoreProvider;
use crate::settings::{PolicyLoader, RequestScope, SettingsSource};
use crate::sink::{BoundedListSink, ChannelSink, ListTarget, LogSink};
use crate::types::{LogEntry, LogEvent};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Result of one sink write
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: Result<()>,
}

/// Per-sink results for one routed entry
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl DeliveryReport {
    /// True if every sink accepted the entry
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Sinks that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.sink.as_str(), e)))
    }

    /// Result for a named sink
    pub fn get(&self, sink: &str) -> Option<&Result<()>> {
        self.outcomes.iter().find(|o| o.sink == sink).map(|o| &o.result)
    }
}

/// What happened to one event
#[derive(Debug)]
pub enum Dispatch {
    /// Suppressed by the filter
    Dropped,
    /// Passed the filter and was routed to the sinks
    Delivered(DeliveryReport),
}

impl Dispatch {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Dispatch::Dropped)
    }

    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Dispatch::Delivered(report) => Some(report),
            Dispatch::Dropped => None,
        }
    }
}

/// Filter engine wired to its sinks
pub struct LogPipeline {
    engine: FilterEngine,
    loader: PolicyLoader,
    sinks: Vec<Arc<dyn LogSink>>,
    queue_capacity: usize,
}

impl LogPipeline {
    pub fn builder() -> LogPipelineBuilder {
        LogPipelineBuilder::default()
    }

    /// Build from configuration, connecting each sink to Redis
    ///
    /// Each sink opens its own connection.
    pub async fn connect(config: &PipelineConfig, redis_key: Option<ListTarget>) -> Result<Self> {
        Self::from_config(config, redis_key, || RedisProvider::connect(config.connection.clone()))
            .await
    }

    /// Build from configuration with a custom provider factory
    ///
    /// `open` is called once per sink that needs a store.
    pub async fn from_config<P, F, Fut>(
        config: &PipelineConfig,
        redis_key: Option<ListTarget>,
        mut open: F,
    ) -> Result<Self>
    where
        P: StoreProvider + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<P>>,
    {
        config.validate(redis_key.is_some())?;

        if redis_key.is_some() && config.name.is_some() {
            tracing::debug!("Both name and redisKey set; redisKey wins");
        }
        let target = redis_key.or_else(|| config.name.clone().map(ListTarget::Constant));

        let mut builder = Self::builder()
            .filter_scope(config.filter_scope)
            .policy_loader(config.policy_loader())
            .queue_capacity(config.queue_capacity);

        if let Some(target) = target {
            let store = open().await?;
            builder = builder.sink(BoundedListSink::new(store, target, config.max_size)?);
        }

        if let Some(channel) = &config.channel {
            let store = open().await?;
            builder = builder.sink(ChannelSink::new(store, Some(channel.clone())));
        }

        let pipeline = builder.build();
        tracing::info!(
            sinks = ?pipeline.sink_names(),
            max_size = config.max_size,
            scope = ?config.filter_scope,
            queue_capacity = config.queue_capacity,
            "Log pipeline ready"
        );
        Ok(pipeline)
    }

    /// Resolve the policy for a new unit of work
    ///
    /// Call once per inbound request, then pass each of its events through
    /// `RequestScope::attach` before `process`.
    pub fn begin(&self, settings: &dyn SettingsSource) -> RequestScope {
        self.loader.begin(settings)
    }

    /// Evaluate an event without routing it
    pub fn evaluate(&self, event: &LogEvent) -> Verdict {
        self.engine.evaluate(event)
    }

    /// Filter one event and route it if it passes
    ///
    /// Only a serialization failure is returned as `Err`; sink failures are
    /// reported per sink in the `DeliveryReport`.
    pub async fn process(&self, event: LogEvent) -> Result<Dispatch> {
        if self.engine.evaluate(&event) == Verdict::Drop {
            return Ok(Dispatch::Dropped);
        }
        let report = self.route(&LogEntry::Event(event)).await?;
        Ok(Dispatch::Delivered(report))
    }

    /// Route an entry to every sink without filtering
    pub async fn route(&self, entry: &LogEntry) -> Result<DeliveryReport> {
        let encoded = entry.encode()?;

        let writes = self.sinks.iter().map(|sink| {
            let encoded = encoded.as_str();
            async move {
                SinkOutcome {
                    sink: sink.name().to_string(),
                    result: sink.write_encoded(entry, encoded).await,
                }
            }
        });
        let outcomes = futures::future::join_all(writes).await;

        let report = DeliveryReport { outcomes };
        for (sink, error) in report.failures() {
            tracing::warn!(sink = %sink, error = %error, "Sink write failed");
        }
        Ok(report)
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn scope(&self) -> FilterScope {
        self.engine.scope()
    }

    /// Queue depth `start` will use
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Move the pipeline onto a worker task with the configured queue depth
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(self) -> PipelineHandle {
        let capacity = self.queue_capacity;
        self.spawn(capacity)
    }

    /// Move the pipeline onto a worker task behind a bounded queue
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(self, capacity: usize) -> PipelineHandle {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));

        let task = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = self.process(job.event).await;
                match job.reply {
                    Some(reply) => {
                        // Submitter may have given up waiting.
                        let _ = reply.send(result);
                    }
                    None => log_detached(result),
                }
            }
            tracing::debug!("Log pipeline worker stopped");
        });

        PipelineHandle { tx, task }
    }
}

fn log_detached(result: Result<Dispatch>) {
    match result {
        Ok(Dispatch::Delivered(report)) if !report.is_complete() => {
            tracing::warn!(
                failed = report.failures().count(),
                "Queued event not delivered to every sink"
            );
        }
        Err(e) => tracing::error!(error = %e, "Queued event could not be processed"),
        _ => {}
    }
}

/// Builder for `LogPipeline`
#[derive(Default)]
pub struct LogPipelineBuilder {
    scope: FilterScope,
    loader: PolicyLoader,
    sinks: Vec<Arc<dyn LogSink>>,
    queue_capacity: Option<usize>,
}

impl LogPipelineBuilder {
    pub fn filter_scope(mut self, scope: FilterScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn policy_loader(mut self, loader: PolicyLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn build(self) -> LogPipeline {
        LogPipeline {
            engine: FilterEngine::new(self.scope),
            loader: self.loader,
            sinks: self.sinks,
            queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
        }
    }
}

struct Job {
    event: LogEvent,
    reply: Option<oneshot::Sender<Result<Dispatch>>>,
}

/// Producer side of a spawned pipeline
pub struct PipelineHandle {
    tx: mpsc::Sender<Job>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Depth of the inbound queue
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Queue an event and wait for its outcome
    ///
    /// Suspends while the queue is full.
    pub async fn submit(&self, event: LogEvent) -> Result<Dispatch> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Closed)?
    }

    /// Queue an event without waiting for it to be processed
    ///
    /// Suspends while the queue is full. Failures are logged by the worker.
    pub async fn enqueue(&self, event: LogEvent) -> Result<()> {
        self.tx
            .send(Job { event, reply: None })
            .await
            .map_err(|_| PipelineError::Closed)
    }

    /// Stop accepting events and wait for the queue to drain
    pub async fn shutdown(self) -> Result<()> {
        drop(self.tx);
        self.task.await.map_err(|e| {
            tracing::error!(error = %e, "Log pipeline worker panicked");
            PipelineError::Closed
        })
    }
}
