//! # a3s-log-pipeline
//!
//! Filter-and-route pipeline that persists request/response log events to
//! Redis for the A3S ecosystem.
//!
//! ## Overview
//!
//! The host application hands structured log events to a `LogPipeline`.
//! Each event is checked against the filter policy attached to it; the
//! survivors go to a bounded list (most recent `maxSize` entries per
//! target) and, optionally, a broadcast channel for live tailing.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_log_pipeline::{BoundedListSink, ChannelSink, ListTarget, LogEvent, LogPipeline};
//! use a3s_log_pipeline::provider::memory::MemoryProvider;
//!
//! # async fn example() -> a3s_log_pipeline::Result<()> {
//! let store = MemoryProvider::default();
//! let pipeline = LogPipeline::builder()
//!     .sink(BoundedListSink::new(store.clone(), ListTarget::per_tenant("logs"), 1000)?)
//!     .sink(ChannelSink::new(store.clone(), Some("logs-live".to_string())))
//!     .build();
//!
//! let event = LogEvent::response(503)
//!     .with_tenant("acme")
//!     .with_filter(serde_json::json!({"errors": false}));
//!
//! // Suppressed: the policy turns off 5xx responses
//! assert!(pipeline.process(event).await?.is_dropped());
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - **memory**: In-process store for testing and single-process use
//! - **redis**: Redis lists (`LPUSH`/`LTRIM` in `MULTI`) and `PUBLISH`
//!
//! ## Architecture
//!
//! - **FilterEngine**: compiles a policy into exclusion predicates, drops on any match
//! - **PolicyLoader**: resolves a per-request policy from host settings
//! - **StoreProvider** trait: atomic capped push and publish on any backend
//! - **LogSink** trait: bounded list and fan-out channel sinks
//! - **LogPipeline**: wires the filter to the sinks, optional sequential worker

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod provider;
pub mod settings;
pub mod sink;
pub mod types;

// Re-export core types
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use filter::{
    CompiledFilter, Exclusion, FilterEngine, FilterPolicy, FilterScope, LogLevel, PolicyPatch,
    Switch, Verdict,
};
pub use pipeline::{
    DeliveryReport, Dispatch, LogPipeline, LogPipelineBuilder, PipelineHandle, SinkOutcome,
};
pub use provider::StoreProvider;
pub use settings::{PolicyLoader, RequestScope, SettingsSource};
pub use sink::{BoundedListSink, ChannelSink, ListTarget, LogSink};
pub use types::{LogEntry, LogEvent};

// Re-export providers for convenience
pub use provider::memory::{FailPoint, MemoryConfig, MemoryProvider};
pub use provider::redis::{RedisConfig, RedisProvider};
