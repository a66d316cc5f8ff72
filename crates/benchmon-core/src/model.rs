//! Data model shared by the loader, the poller, and the UI boundary.
//!
//! [`MetricState`] is the unit the caller round-trips between polling
//! cycles. It serializes in camelCase (`lastTimestamp`, `chartData`) so a
//! dashboard can consume it directly.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::kind::MetricKind;

/// A tracked metric as configured by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: MetricKind,
    #[serde(default)]
    pub title: String,
}

impl MetricDescriptor {
    pub fn new(id: impl Into<String>, kind: MetricKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
        }
    }
}

/// One timestamped sample as returned by the metrics API.
///
/// `time` is unix milliseconds. Every other field of the wire object is
/// kept verbatim in `payload` (`value`, `count`, `buckets`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Sample {
    pub fn new(time: i64) -> Self {
        Self {
            time,
            payload: Map::new(),
        }
    }

    /// Builder helper: set one payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// The sample's `value` field, if present.
    pub fn value(&self) -> Option<&Value> {
        self.payload.get("value")
    }
}

/// Chart-ready point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: i64,
    pub y: Value,
}

/// Contents of a series: chart points, or raw samples for histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesData {
    Points(Vec<ChartPoint>),
    Raw(Vec<Sample>),
}

impl Default for SeriesData {
    fn default() -> Self {
        Self::Points(Vec::new())
    }
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            Self::Points(p) => p.len(),
            Self::Raw(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `newer` after the existing data, old first.
    ///
    /// An empty side adopts the other side's shape. When both sides are
    /// non-empty but differ in shape (the metric changed kind between
    /// cycles) the older data is dropped.
    pub fn append(self, newer: SeriesData) -> SeriesData {
        match (self, newer) {
            (Self::Points(mut old), Self::Points(new)) => {
                old.extend(new);
                Self::Points(old)
            }
            (Self::Raw(mut old), Self::Raw(new)) => {
                old.extend(new);
                Self::Raw(old)
            }
            (old, new) if old.is_empty() => new,
            (old, new) if new.is_empty() => old,
            (old, new) => {
                log::warn!(
                    "series shape changed ({} -> {}), dropping {} older entries",
                    old.shape(),
                    new.shape(),
                    old.len()
                );
                new
            }
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Points(_) => "points",
            Self::Raw(_) => "raw",
        }
    }
}

/// Named series as handed to a chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub data: SeriesData,
}

/// Per-metric state threaded from one polling cycle to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricState {
    #[serde(flatten)]
    pub descriptor: MetricDescriptor,
    /// Latest sample time folded into `chart_data` (the watermark).
    pub last_timestamp: Option<i64>,
    pub chart_data: ChartSeries,
}

impl MetricState {
    /// State with no data, carrying `last_timestamp` unchanged.
    pub fn empty(descriptor: MetricDescriptor, last_timestamp: Option<i64>) -> Self {
        let chart_data = ChartSeries {
            name: descriptor.title.clone(),
            data: SeriesData::default(),
        };
        Self {
            descriptor,
            last_timestamp,
            chart_data,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Number of points (or raw samples) in the series.
    pub fn series_len(&self) -> usize {
        self.chart_data.data.len()
    }
}

/// The gobench API uses integer ids; accept both numbers and strings.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(i64),
        Str(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Num(n) => n.to_string(),
        RawId::Str(s) => s,
    })
}
