//! First load of a metric set.
//!
//! The fetch window is computed once per batch, then every metric is
//! fetched concurrently against it. A metric with no samples keeps the
//! caller's reference timestamp as its watermark, so a later, wider window
//! can still pick its data up.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::CycleError;
use crate::fetch::MetricFetcher;
use crate::model::{ChartSeries, MetricDescriptor, MetricState, Sample};
use crate::outcome::{BatchReport, MetricOutcome};
use crate::transform::{latest_time, limit_history, transform};
use crate::window::{Clock, DEFAULT_TIME_RANGE_SECS, FetchWindow};

/// Parameters of an initial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Maximum realtime look-back, seconds.
    pub time_range_secs: u64,
    /// Last timestamp the caller wants to resume from, unix ms.
    pub reference_timestamp: Option<i64>,
    /// Bound the fetch to `[from, now]` instead of fetching full history.
    pub realtime: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            time_range_secs: DEFAULT_TIME_RANGE_SECS,
            reference_timestamp: None,
            realtime: false,
        }
    }
}

pub struct InitialLoader {
    fetcher: MetricFetcher,
    clock: Arc<dyn Clock>,
    history_limit: Option<usize>,
}

impl InitialLoader {
    pub fn new(fetcher: MetricFetcher, clock: Arc<dyn Clock>, history_limit: Option<usize>) -> Self {
        Self {
            fetcher,
            clock,
            history_limit,
        }
    }

    /// Window shared by every metric of one batch.
    pub fn window(&self, options: &LoadOptions) -> FetchWindow {
        if options.realtime {
            FetchWindow::realtime(
                self.clock.now_ms(),
                options.time_range_secs,
                options.reference_timestamp,
            )
        } else {
            FetchWindow::unbounded()
        }
    }

    /// Load every metric in `metrics`. States come back in input order.
    pub async fn load(
        &self,
        metrics: &[MetricDescriptor],
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CycleError> {
        if metrics.is_empty() {
            return Ok(BatchReport::default());
        }

        let window = self.window(options);
        log::info!(
            "initial load of {} metrics (realtime={}, from={:?}, end={:?})",
            metrics.len(),
            options.realtime,
            window.from,
            window.end
        );

        let loads = metrics
            .iter()
            .map(|m| self.load_one(m, window, options.reference_timestamp));
        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CycleError::Cancelled),
            outcomes = join_all(loads) => outcomes,
        };

        let report = BatchReport::from_outcomes(outcomes);
        if !report.is_clean() {
            log::warn!(
                "initial load: {} of {} metrics failed",
                report.failures.len(),
                metrics.len()
            );
        }
        Ok(report)
    }

    async fn load_one(
        &self,
        metric: &MetricDescriptor,
        window: FetchWindow,
        reference: Option<i64>,
    ) -> MetricOutcome {
        match self.fetcher.fetch(&metric.id, metric.kind, window).await {
            Ok(samples) => MetricOutcome::Loaded(initial_state(
                metric,
                limit_history(samples, self.history_limit),
                reference,
            )),
            Err(error) => {
                log::warn!("metric {} ({}): {error}", metric.id, metric.kind);
                MetricOutcome::Failed {
                    fallback: MetricState::empty(metric.clone(), reference),
                    error,
                }
            }
        }
    }
}

/// State for a freshly loaded metric.
pub fn initial_state(
    metric: &MetricDescriptor,
    samples: Vec<Sample>,
    reference: Option<i64>,
) -> MetricState {
    let Some(last) = latest_time(&samples) else {
        return MetricState::empty(metric.clone(), reference);
    };
    MetricState {
        descriptor: metric.clone(),
        last_timestamp: Some(last),
        chart_data: ChartSeries {
            name: metric.title.clone(),
            data: transform(metric.kind, samples),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::kind::MetricKind;
    use crate::model::SeriesData;
    use crate::testing::ScriptedTransport;
    use crate::window::FixedClock;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn loader(transport: Arc<ScriptedTransport>) -> InitialLoader {
        InitialLoader::new(
            MetricFetcher::new(transport),
            Arc::new(FixedClock(NOW)),
            None,
        )
    }

    fn gauge(id: &str) -> MetricDescriptor {
        MetricDescriptor::new(id, MetricKind::Gauge, format!("gauge {id}"))
    }

    #[tokio::test]
    async fn empty_metric_list_loads_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let report = loader(transport.clone())
            .load(&[], &LoadOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.states.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_history_keeps_reference_watermark() {
        let transport = Arc::new(ScriptedTransport::new());
        let options = LoadOptions {
            reference_timestamp: Some(NOW - 5_000),
            realtime: true,
            ..LoadOptions::default()
        };
        let report = loader(transport)
            .load(&[gauge("1")], &options, &CancellationToken::new())
            .await
            .unwrap();
        let state = &report.states[0];
        assert_eq!(state.last_timestamp, Some(NOW - 5_000));
        assert_eq!(state.chart_data.name, "gauge 1");
        assert!(state.chart_data.data.is_empty());
    }

    #[tokio::test]
    async fn watermark_is_max_time_not_last_element() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/1/gauges",
            json!([
                {"time": 50, "value": 5},
                {"time": 90, "value": 9},
                {"time": 10, "value": 1}
            ]),
        );
        let report = loader(transport)
            .load(&[gauge("1")], &LoadOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.states[0].last_timestamp, Some(90));
        assert_eq!(report.states[0].series_len(), 3);
    }

    #[tokio::test]
    async fn realtime_window_is_shared_by_all_metrics() {
        let transport = Arc::new(ScriptedTransport::new());
        let options = LoadOptions {
            time_range_secs: 3600,
            reference_timestamp: Some(NOW - 7_200_000),
            realtime: true,
        };
        loader(transport.clone())
            .load(
                &[
                    gauge("1"),
                    MetricDescriptor::new("2", MetricKind::Counter, "c"),
                ],
                &options,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        for req in requests {
            assert_eq!(req.query_value("from"), Some("1699996400000"));
            assert_eq!(req.query_value("end"), Some("1700000000000"));
        }
    }

    #[tokio::test]
    async fn non_realtime_fetches_full_history() {
        let transport = Arc::new(ScriptedTransport::new());
        let options = LoadOptions {
            reference_timestamp: Some(NOW - 10_000),
            realtime: false,
            ..LoadOptions::default()
        };
        loader(transport.clone())
            .load(&[gauge("1")], &options, &CancellationToken::new())
            .await
            .unwrap();
        let req = &transport.requests()[0];
        assert_eq!(req.query_value("from"), Some(""));
        assert_eq!(req.query_value("end"), Some(""));
    }

    #[tokio::test]
    async fn histogram_state_stores_raw_samples() {
        let transport = Arc::new(ScriptedTransport::new());
        let raw = json!([{"time": 1, "buckets": [{"le": 10, "count": 3}]}]);
        transport.push_ok("applications/metrics/h/histograms", raw.clone());
        let metric = MetricDescriptor::new("h", MetricKind::Histogram, "latency");
        let report = loader(transport)
            .load(&[metric], &LoadOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        let SeriesData::Raw(ref samples) = report.states[0].chart_data.data else {
            panic!("histogram must keep raw samples");
        };
        assert_eq!(serde_json::to_value(samples).unwrap(), raw);
    }

    #[tokio::test]
    async fn one_failure_does_not_drop_siblings() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/1/gauges",
            json!([{"time": 7, "value": 1}]),
        );
        transport.push_err(
            "applications/metrics/2/gauges",
            TransportError::Network("reset".into()),
        );
        transport.push_ok(
            "applications/metrics/3/gauges",
            json!([{"time": 8, "value": 2}]),
        );
        let options = LoadOptions {
            reference_timestamp: Some(3),
            ..LoadOptions::default()
        };
        let report = loader(transport)
            .load(
                &[gauge("1"), gauge("2"), gauge("3")],
                &options,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = report.states.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(report.states[0].last_timestamp, Some(7));
        assert_eq!(report.states[1].last_timestamp, Some(3));
        assert!(report.states[1].chart_data.data.is_empty());
        assert_eq!(report.states[2].last_timestamp, Some(8));
        assert_eq!(report.failed_ids(), vec!["2"]);
    }

    #[tokio::test]
    async fn history_limit_truncates_oldest() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/1/gauges",
            json!([
                {"time": 1, "value": 1},
                {"time": 2, "value": 2},
                {"time": 3, "value": 3}
            ]),
        );
        let loader = InitialLoader::new(
            MetricFetcher::new(transport),
            Arc::new(FixedClock(NOW)),
            Some(2),
        );
        let report = loader
            .load(&[gauge("1")], &LoadOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.states[0].series_len(), 2);
        assert_eq!(report.states[0].last_timestamp, Some(3));
    }

    #[tokio::test]
    async fn cancelled_load_returns_cancelled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_delay(Some(std::time::Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = loader(transport)
            .load(&[gauge("1")], &LoadOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CycleError::Cancelled);
    }
}
