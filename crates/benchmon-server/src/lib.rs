//! HTTP metric server.
//!
//! Polls a gobench application's metrics in the background and serves the
//! latest committed states as JSON, ready for a chart front end.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use benchmon_core::{
    EngineConfig, MetricDescriptor, MetricEngine, MetricState, Tracker, TrackerSnapshot,
    TransportError,
};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not set up the metrics API client: {0}")]
    Engine(#[from] TransportError),
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared server state.
struct AppState {
    metrics: Vec<MetricDescriptor>,
    snapshot: watch::Receiver<TrackerSnapshot>,
}

impl AppState {
    fn snapshot(&self) -> TrackerSnapshot {
        self.snapshot.borrow().clone()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    metrics: usize,
    failures: usize,
    cycles: u64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

trait JsonWithStatus<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>);
}

impl<T> JsonWithStatus<T> for Json<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>) {
        (status, self)
    }
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "benchmon",
        "version": benchmon_core::VERSION,
        "metrics": state.metrics.len(),
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/metrics": "All tracked metric states and the last cycle's failures",
            "/metrics/{id}": "One metric state",
        },
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.snapshot();
    Json(HealthResponse {
        status: if snapshot.failures.is_empty() {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        metrics: snapshot.states.len(),
        failures: snapshot.failures.len(),
        cycles: snapshot.cycles,
    })
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> Json<TrackerSnapshot> {
    Json(state.snapshot())
}

async fn handle_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MetricState>, (StatusCode, Json<ErrorResponse>)> {
    let found = state
        .snapshot
        .borrow()
        .states
        .iter()
        .find(|s| s.id() == id)
        .cloned();
    found.map(Json).ok_or_else(|| {
        Json(ErrorResponse {
            error: format!("unknown metric: {id}"),
        })
        .with_status(StatusCode::NOT_FOUND)
    })
}

/// Build the axum router.
fn build_router(metrics: Vec<MetricDescriptor>, snapshot: watch::Receiver<TrackerSnapshot>) -> Router {
    let state = Arc::new(AppState { metrics, snapshot });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/metrics/{id}", get(handle_metric))
        .with_state(state)
}

/// Run `tracker` in the background, publishing a snapshot after every
/// committed cycle. The task ends when `shutdown` is cancelled.
pub fn spawn_tracker(
    mut tracker: Tracker,
    interval: Duration,
    shutdown: CancellationToken,
) -> (watch::Receiver<TrackerSnapshot>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(tracker.snapshot());
    let handle = tokio::spawn(async move {
        tracker
            .run(interval, &shutdown, |summary, tracker| {
                if summary.new_samples > 0 || !summary.failed.is_empty() {
                    log::info!(
                        "cycle {}: +{} samples, {} failed",
                        summary.cycle,
                        summary.new_samples,
                        summary.failed.len()
                    );
                }
                tx.send_replace(tracker.snapshot());
            })
            .await;
    });
    (rx, handle)
}

/// Run the HTTP metric server until Ctrl+C.
pub async fn run_server(
    config: EngineConfig,
    metrics: Vec<MetricDescriptor>,
    host: &str,
    port: u16,
) -> Result<(), ServerError> {
    let engine = Arc::new(MetricEngine::from_config(&config)?);
    let tracker = Tracker::new(engine, metrics.clone(), config.load_options(None));

    let shutdown = CancellationToken::new();
    let (snapshot, tracker_task) = spawn_tracker(tracker, config.poll_interval, shutdown.clone());

    let app = build_router(metrics, snapshot);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("serving metrics on http://{addr}");

    let stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = stop.cancelled() => {}
            }
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = tracker_task.await {
        log::warn!("tracker task ended abnormally: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use benchmon_core::testing::ScriptedTransport;
    use benchmon_core::{FixedClock, LoadOptions, MetricFailure, MetricKind, Sample, merge};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn descriptors() -> Vec<MetricDescriptor> {
        vec![
            MetricDescriptor::new("1", MetricKind::Counter, "requests"),
            MetricDescriptor::new("2", MetricKind::Gauge, "workers"),
        ]
    }

    fn snapshot(failures: Vec<MetricFailure>) -> TrackerSnapshot {
        let metrics = descriptors();
        TrackerSnapshot {
            states: vec![
                merge(&metrics[0], None, vec![Sample::new(5).with("value", 2)]),
                MetricState::empty(metrics[1].clone(), None),
            ],
            failures,
            cycles: 3,
        }
    }

    fn router(snapshot: TrackerSnapshot) -> Router {
        let (_tx, rx) = watch::channel(snapshot);
        build_router(descriptors(), rx)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // -----------------------------------------------------------------------
    // Routes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (status, body) = get_json(router(snapshot(vec![])), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "benchmon");
        assert_eq!(body["metrics"], 2);
        assert!(body["endpoints"]["/metrics/{id}"].is_string());
    }

    #[tokio::test]
    async fn health_is_healthy_without_failures() {
        let (_, body) = get_json(router(snapshot(vec![])), "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["metrics"], 2);
        assert_eq!(body["cycles"], 3);
    }

    #[tokio::test]
    async fn health_is_degraded_with_failures() {
        let failures = vec![MetricFailure {
            id: "2".into(),
            error: TransportError::Unauthorized,
        }];
        let (_, body) = get_json(router(snapshot(failures)), "/health").await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["failures"], 1);
    }

    #[tokio::test]
    async fn metrics_returns_states_and_failures() {
        let failures = vec![MetricFailure {
            id: "2".into(),
            error: TransportError::Network("reset".into()),
        }];
        let (status, body) = get_json(router(snapshot(failures)), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["states"][0]["lastTimestamp"], 5);
        assert_eq!(body["states"][0]["chartData"]["data"], json!([{"x": 5, "y": 2}]));
        assert_eq!(body["failures"][0]["error"], "network error: reset");
    }

    #[tokio::test]
    async fn metric_by_id() {
        let (status, body) = get_json(router(snapshot(vec![])), "/metrics/2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "2");
        assert_eq!(body["type"], "gauge");
        assert_eq!(body["lastTimestamp"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_metric_is_404() {
        let (status, body) = get_json(router(snapshot(vec![])), "/metrics/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown metric: 99");
    }

    // -----------------------------------------------------------------------
    // Background tracker
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn spawned_tracker_publishes_snapshots() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(
            "applications/metrics/1/counters",
            json!([{"time": 10, "value": 1}]),
        );
        let engine = MetricEngine::new(transport, Arc::new(FixedClock(100)), None);
        let tracker = Tracker::new(Arc::new(engine), descriptors(), LoadOptions::default());

        let shutdown = CancellationToken::new();
        let (mut rx, handle) = spawn_tracker(tracker, Duration::from_secs(60), shutdown.clone());
        rx.changed().await.unwrap();
        let published = rx.borrow().clone();
        assert_eq!(published.states.len(), 2);
        assert_eq!(published.states[0].last_timestamp, Some(10));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
