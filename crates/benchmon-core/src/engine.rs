//! Wiring of fetcher, loader, and merger over one transport.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{CycleError, TransportError};
use crate::fetch::MetricFetcher;
use crate::loader::{InitialLoader, LoadOptions};
use crate::model::{MetricDescriptor, MetricState};
use crate::outcome::BatchReport;
use crate::poll::PollingMerger;
use crate::transport::{HttpTransport, StaticToken, Transport};
use crate::window::{Clock, SystemClock};

/// Initial load plus incremental polling over a shared transport.
pub struct MetricEngine {
    transport: Arc<dyn Transport>,
    loader: InitialLoader,
    merger: PollingMerger,
}

impl MetricEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        history_limit: Option<usize>,
    ) -> Self {
        let fetcher = MetricFetcher::new(Arc::clone(&transport));
        Self {
            loader: InitialLoader::new(fetcher.clone(), clock, history_limit),
            merger: PollingMerger::new(fetcher, history_limit),
            transport,
        }
    }

    /// Engine over the HTTP API described by `config`, on the system clock.
    pub fn from_config(config: &EngineConfig) -> Result<Self, TransportError> {
        let tokens = Arc::new(StaticToken::new(config.token.clone()));
        let transport = HttpTransport::new(&config.transport_config(), tokens)?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(SystemClock),
            config.history_limit,
        ))
    }

    /// The transport, for collaborators such as the catalog.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub async fn load_initial(
        &self,
        metrics: &[MetricDescriptor],
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CycleError> {
        self.loader.load(metrics, options, cancel).await
    }

    pub async fn poll(
        &self,
        metrics: &[MetricDescriptor],
        previous: &[MetricState],
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CycleError> {
        self.merger.poll(metrics, previous, cancel).await
    }
}
