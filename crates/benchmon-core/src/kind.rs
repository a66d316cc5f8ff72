//! Metric kinds and the dispatch that depends on them.
//!
//! A [`MetricKind`] decides two things: which API endpoint serves the
//! metric's samples ([`select_endpoint`]) and how those samples are shaped
//! for charting ([`select_transformer`]). Both are exhaustive matches, so a
//! new kind cannot be added without deciding both.

use serde::{Deserialize, Serialize};

/// Structural category of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic event counts.
    #[default]
    Counter,
    /// Latency distributions; samples carry bucket payloads.
    Histogram,
    /// Point-in-time values.
    Gauge,
    /// Anything the API reports that this client does not know.
    #[serde(other)]
    Other,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Histogram => write!(f, "histogram"),
            Self::Gauge => write!(f, "gauge"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown names map to [`MetricKind::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "counter" | "counters" => Self::Counter,
            "histogram" | "histograms" => Self::Histogram,
            "gauge" | "gauges" => Self::Gauge,
            _ => Self::Other,
        })
    }
}

/// API endpoint family serving a metric's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Counters,
    Histograms,
    Gauges,
    /// Generic per-metric endpoint.
    Metric,
}

impl Endpoint {
    /// Path of this endpoint for one metric, relative to the API base.
    pub fn path(&self, id: &str) -> String {
        match self {
            Self::Counters => format!("applications/metrics/{id}/counters"),
            Self::Histograms => format!("applications/metrics/{id}/histograms"),
            Self::Gauges => format!("applications/metrics/{id}/gauges"),
            Self::Metric => format!("applications/metrics/{id}"),
        }
    }
}

/// How raw samples of a kind become series data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Keep samples verbatim.
    PassThrough,
    /// Map each sample to an `(x = time, y = value)` point.
    Points,
}

pub fn select_endpoint(kind: MetricKind) -> Endpoint {
    match kind {
        MetricKind::Counter => Endpoint::Counters,
        MetricKind::Histogram => Endpoint::Histograms,
        MetricKind::Gauge => Endpoint::Gauges,
        MetricKind::Other => Endpoint::Metric,
    }
}

pub fn select_transformer(kind: MetricKind) -> Transform {
    match kind {
        MetricKind::Histogram => Transform::PassThrough,
        MetricKind::Counter | MetricKind::Gauge | MetricKind::Other => Transform::Points,
    }
}
