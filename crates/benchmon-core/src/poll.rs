//! Incremental polling merge.
//!
//! Each cycle fetches only samples at or after a metric's watermark and
//! appends them to the existing series. Cost is proportional to the delta,
//! never to the full history.

use std::collections::HashMap;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::CycleError;
use crate::fetch::MetricFetcher;
use crate::model::{ChartSeries, MetricDescriptor, MetricState, Sample};
use crate::outcome::{BatchReport, MetricOutcome};
use crate::transform::{latest_time, limit_history, transform};
use crate::window::FetchWindow;

pub struct PollingMerger {
    fetcher: MetricFetcher,
    history_limit: Option<usize>,
}

impl PollingMerger {
    pub fn new(fetcher: MetricFetcher, history_limit: Option<usize>) -> Self {
        Self {
            fetcher,
            history_limit,
        }
    }

    /// Poll every metric in `metrics` against its entry in `previous`.
    ///
    /// Metrics are matched to previous states by id; a metric without one
    /// is fetched from the beginning. States come back in `metrics` order.
    pub async fn poll(
        &self,
        metrics: &[MetricDescriptor],
        previous: &[MetricState],
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CycleError> {
        let by_id: HashMap<&str, &MetricState> =
            previous.iter().map(|s| (s.id(), s)).collect();

        let polls = metrics
            .iter()
            .map(|m| self.poll_one(m, by_id.get(m.id.as_str()).copied()));
        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CycleError::Cancelled),
            outcomes = join_all(polls) => outcomes,
        };

        let report = BatchReport::from_outcomes(outcomes);
        log::debug!(
            "poll cycle over {} metrics, {} failed",
            metrics.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn poll_one(
        &self,
        metric: &MetricDescriptor,
        previous: Option<&MetricState>,
    ) -> MetricOutcome {
        let window = match previous.and_then(|p| p.last_timestamp) {
            Some(watermark) => FetchWindow::since(watermark),
            None => FetchWindow::unbounded(),
        };

        match self.fetcher.fetch(&metric.id, metric.kind, window).await {
            Ok(samples) => MetricOutcome::Loaded(merge(
                metric,
                previous,
                limit_history(samples, self.history_limit),
            )),
            Err(error) => {
                log::warn!(
                    "metric {} ({}): {error}; keeping last known series",
                    metric.id,
                    metric.kind
                );
                MetricOutcome::Failed {
                    fallback: previous
                        .cloned()
                        .unwrap_or_else(|| MetricState::empty(metric.clone(), None)),
                    error,
                }
            }
        }
    }
}

/// Fold `samples` into `previous`.
///
/// No samples: `previous` comes back unchanged. Otherwise the new points
/// are appended after the existing ones, the watermark advances to the
/// newest sample, and the title follows the current descriptor.
pub fn merge(
    metric: &MetricDescriptor,
    previous: Option<&MetricState>,
    samples: Vec<Sample>,
) -> MetricState {
    let Some(newest) = latest_time(&samples) else {
        return previous
            .cloned()
            .unwrap_or_else(|| MetricState::empty(metric.clone(), None));
    };

    let fresh = transform(metric.kind, samples);
    let (data, last_timestamp) = match previous {
        Some(prev) => (
            prev.chart_data.data.clone().append(fresh),
            prev.last_timestamp.map_or(newest, |w| w.max(newest)),
        ),
        None => (fresh, newest),
    };

    MetricState {
        descriptor: metric.clone(),
        last_timestamp: Some(last_timestamp),
        chart_data: ChartSeries {
            name: metric.title.clone(),
            data,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::TransportError;
    use crate::kind::MetricKind;
    use crate::loader::{InitialLoader, LoadOptions};
    use crate::model::SeriesData;
    use crate::testing::ScriptedTransport;
    use crate::window::FixedClock;
    use serde_json::json;

    fn merger(transport: Arc<ScriptedTransport>) -> PollingMerger {
        PollingMerger::new(MetricFetcher::new(transport), None)
    }

    fn gauge(time: i64) -> Sample {
        Sample::new(time).with("value", time as f64)
    }

    fn seeded(id: &str, kind: MetricKind, times: &[i64]) -> MetricState {
        let metric = MetricDescriptor::new(id, kind, format!("metric {id}"));
        let samples = times.iter().copied().map(gauge).collect();
        merge(&metric, None, samples)
    }

    #[test]
    fn merge_without_samples_is_identity() {
        let prev = seeded("1", MetricKind::Gauge, &[1, 2, 3]);
        let after = merge(&prev.descriptor, Some(&prev), Vec::new());
        assert_eq!(after, prev);
    }

    #[test]
    fn merge_without_samples_or_history_is_empty() {
        let metric = MetricDescriptor::new("1", MetricKind::Gauge, "g");
        let after = merge(&metric, None, Vec::new());
        assert_eq!(after, MetricState::empty(metric, None));
    }

    #[test]
    fn merge_appends_and_advances_watermark_on_unsorted_delta() {
        let prev = seeded("1", MetricKind::Gauge, &[1, 5]);
        let after = merge(
            &prev.descriptor,
            Some(&prev),
            vec![gauge(50), gauge(10), gauge(90)],
        );
        assert_eq!(after.last_timestamp, Some(90));
        let SeriesData::Points(points) = after.chart_data.data else {
            panic!("gauge keeps points");
        };
        let xs: Vec<i64> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1, 5, 50, 10, 90]);
    }

    #[test]
    fn merge_takes_title_from_current_descriptor() {
        let prev = seeded("1", MetricKind::Gauge, &[1]);
        let renamed = MetricDescriptor::new("1", MetricKind::Gauge, "renamed");
        let after = merge(&renamed, Some(&prev), vec![gauge(2)]);
        assert_eq!(after.chart_data.name, "renamed");
        assert_eq!(after.descriptor.title, "renamed");
        assert_eq!(after.series_len(), 2);
    }

    #[test]
    fn merge_appends_raw_histogram_samples() {
        let metric = MetricDescriptor::new("h", MetricKind::Histogram, "latency");
        let first = merge(&metric, None, vec![Sample::new(1).with("count", 1)]);
        let second = merge(&metric, Some(&first), vec![Sample::new(2).with("count", 2)]);
        assert_eq!(
            second.chart_data.data,
            SeriesData::Raw(vec![
                Sample::new(1).with("count", 1),
                Sample::new(2).with("count", 2),
            ])
        );
    }

    #[test]
    fn append_only_length_law_over_cycles() {
        let mut state = seeded("1", MetricKind::Counter, &[1, 2, 3, 4]);
        let initial = state.series_len();
        let deltas: Vec<Vec<i64>> = vec![vec![5], vec![7, 6], vec![8, 9, 10]];
        let mut total = 0;
        for delta in &deltas {
            total += delta.len();
            let samples = delta.iter().copied().map(gauge).collect();
            state = merge(&state.descriptor, Some(&state), samples);
        }
        assert_eq!(state.series_len(), initial + total);
        assert_eq!(state.last_timestamp, Some(10));
    }

    #[tokio::test]
    async fn poll_requests_from_watermark() {
        let transport = Arc::new(ScriptedTransport::new());
        let prev = seeded("1", MetricKind::Gauge, &[100, 200]);
        merger(transport.clone())
            .poll(
                &[prev.descriptor.clone()],
                std::slice::from_ref(&prev),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let req = &transport.requests()[0];
        assert_eq!(req.path, "applications/metrics/1/gauges");
        assert_eq!(req.query_value("from"), Some("200"));
        assert_eq!(req.query_value("end"), Some(""));
    }

    #[tokio::test]
    async fn untracked_metric_is_fetched_unbounded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/new/gauges",
            json!([{"time": 4, "value": 1}]),
        );
        let metric = MetricDescriptor::new("new", MetricKind::Gauge, "new");
        let report = merger(transport.clone())
            .poll(&[metric], &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].query_value("from"), Some(""));
        assert_eq!(report.states[0].last_timestamp, Some(4));
        assert_eq!(report.states[0].series_len(), 1);
    }

    #[tokio::test]
    async fn failed_poll_keeps_last_known_good_state() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(
            "applications/metrics/1/gauges",
            TransportError::Status {
                status: 500,
                body: "boom".into(),
            },
        );
        transport.push_ok(
            "applications/metrics/2/gauges",
            json!([{"time": 30, "value": 3}]),
        );
        let a = seeded("1", MetricKind::Gauge, &[10]);
        let b = seeded("2", MetricKind::Gauge, &[20]);
        let report = merger(transport)
            .poll(
                &[a.descriptor.clone(), b.descriptor.clone()],
                &[a.clone(), b.clone()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(report.states[0], a);
        assert_eq!(report.states[1].last_timestamp, Some(30));
        assert_eq!(report.failed_ids(), vec!["1"]);
    }

    #[tokio::test]
    async fn scenario_counter_histogram_gauge() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/c/counters",
            json!([{"time": 1000, "value": 1}, {"time": 2000, "value": 3}]),
        );
        transport.push_ok(
            "applications/metrics/h/histograms",
            json!([{"time": 1500, "buckets": [{"le": 5, "count": 1}]}]),
        );
        transport.push_ok(
            "applications/metrics/g/gauges",
            json!([{"time": 1200, "value": 0.5}]),
        );
        let metrics = vec![
            MetricDescriptor::new("c", MetricKind::Counter, "requests"),
            MetricDescriptor::new("h", MetricKind::Histogram, "latency"),
            MetricDescriptor::new("g", MetricKind::Gauge, "workers"),
        ];

        let loader = InitialLoader::new(
            MetricFetcher::new(transport.clone()),
            Arc::new(FixedClock(10_000)),
            None,
        );
        let cancel = CancellationToken::new();
        let initial = loader
            .load(&metrics, &LoadOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(initial.is_clean());
        assert_eq!(initial.states[0].last_timestamp, Some(2000));
        assert_eq!(initial.states[1].last_timestamp, Some(1500));
        assert_eq!(initial.states[2].last_timestamp, Some(1200));

        transport.push_ok(
            "applications/metrics/g/gauges",
            json!([{"time": 1900, "value": 0.7}, {"time": 1800, "value": 0.6}]),
        );
        let polled = merger(transport)
            .poll(&metrics, &initial.states, &cancel)
            .await
            .unwrap();

        assert_eq!(polled.states[0], initial.states[0]);
        assert_eq!(polled.states[1], initial.states[1]);
        assert_eq!(polled.states[2].last_timestamp, Some(1900));
        assert_eq!(polled.states[2].series_len(), 3);
    }

    #[tokio::test]
    async fn cancelled_poll_returns_cancelled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_delay(Some(std::time::Duration::from_secs(30)));
        let prev = seeded("1", MetricKind::Gauge, &[1]);
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };
        let err = merger(transport)
            .poll(&[prev.descriptor.clone()], &[prev], &cancel)
            .await
            .unwrap_err();
        handle.await.unwrap();
        assert_eq!(err, CycleError::Cancelled);
    }
}
