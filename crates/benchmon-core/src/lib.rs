//! # benchmon-core
//!
//! **Live charts for gobench benchmark runs, fetched incrementally.**
//!
//! `benchmon-core` acquires the metrics a gobench application exposes
//! (counters, histograms, gauges), shapes them into chart series, and keeps
//! them current by fetching only the samples newer than what it already has.
//!
//! ## Quick Start
//!
//! ```no_run
//! use benchmon_core::{EngineConfig, MetricCatalog, MetricEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let engine = MetricEngine::from_config(&config)?;
//! let metrics = MetricCatalog::new(engine.transport()).descriptors("1").await?;
//!
//! let cancel = CancellationToken::new();
//! let first = engine
//!     .load_initial(&metrics, &config.load_options(None), &cancel)
//!     .await?;
//! let next = engine.poll(&metrics, &first.states, &cancel).await?;
//! println!("{} metrics, {} failed", next.states.len(), next.failures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Catalog → descriptors → InitialLoader (windowed) → states → PollingMerger
//! (from watermark, append) → states → ...
//!
//! - Every metric is fetched concurrently; one failure never drops its
//!   siblings. Failures are reported beside the states, and a failed metric
//!   keeps its last known series.
//! - A state's `last_timestamp` is the newest sample time folded into it.
//!   Polls request `from = last_timestamp`, so a cycle costs the delta.
//! - Counters and gauges become `{x, y}` points; histograms keep their raw
//!   samples for the chart layer.
//!
//! All HTTP goes through the [`Transport`] trait. [`HttpTransport`] talks to
//! the real API. With the `testing` feature, `testing::ScriptedTransport`
//! replays canned answers instead.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod kind;
pub mod loader;
pub mod model;
pub mod outcome;
pub mod poll;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;
pub mod transform;
pub mod transport;
pub mod window;

pub use catalog::{Application, ApplicationQuery, Graph, GraphMetric, Group, MetricCatalog};
pub use config::{DEFAULT_HISTORY_LIMIT, EngineConfig};
pub use engine::MetricEngine;
pub use error::{CycleError, StoreError, TransportError};
pub use fetch::MetricFetcher;
pub use kind::{Endpoint, MetricKind, Transform, select_endpoint, select_transformer};
pub use loader::{InitialLoader, LoadOptions, initial_state};
pub use model::{ChartPoint, ChartSeries, MetricDescriptor, MetricState, Sample, SeriesData};
pub use outcome::{BatchReport, MetricFailure, MetricOutcome};
pub use poll::{PollingMerger, merge};
pub use tracker::{CycleSummary, Tracker, TrackerSnapshot};
pub use transform::{latest_time, limit_history, to_points, transform};
pub use transport::{
    ApiRequest, DEFAULT_API_BASE, HttpTransport, StaticToken, TokenProvider, Transport,
    TransportConfig,
};
pub use window::{Clock, DEFAULT_TIME_RANGE_SECS, FetchWindow, FixedClock, SystemClock};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
