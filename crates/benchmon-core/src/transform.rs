//! Sample shaping: raw API samples into series data.
//!
//! Nothing here sorts. Point series keep the order the API returned, and
//! callers that need strictly increasing `x` sort on their side.

use serde_json::Value;

use crate::kind::{MetricKind, Transform, select_transformer};
use crate::model::{ChartPoint, Sample, SeriesData};

/// Shape `samples` for a metric of `kind`.
pub fn transform(kind: MetricKind, samples: Vec<Sample>) -> SeriesData {
    match select_transformer(kind) {
        Transform::PassThrough => SeriesData::Raw(samples),
        Transform::Points => SeriesData::Points(to_points(&samples)),
    }
}

/// `(x = time, y = value)` per sample, in input order.
pub fn to_points(samples: &[Sample]) -> Vec<ChartPoint> {
    samples
        .iter()
        .map(|s| ChartPoint {
            x: s.time,
            y: s.value().cloned().unwrap_or(Value::Null),
        })
        .collect()
}

/// Maximum `time` across `samples`, regardless of order.
pub fn latest_time(samples: &[Sample]) -> Option<i64> {
    samples.iter().map(|s| s.time).max()
}

/// Keep at most `limit` samples, dropping the oldest by `time`.
///
/// Survivors keep their original relative order. The newest sample always
/// survives, so the watermark computed afterwards is unchanged.
pub fn limit_history(samples: Vec<Sample>, limit: Option<usize>) -> Vec<Sample> {
    let Some(limit) = limit else {
        return samples;
    };
    if samples.len() <= limit {
        return samples;
    }
    if limit == 0 {
        return Vec::new();
    }

    // Cutoff is the limit-th newest time.
    let mut times: Vec<i64> = samples.iter().map(|s| s.time).collect();
    let idx = times.len() - limit;
    let (_, cutoff, _) = times.select_nth_unstable(idx);
    let cutoff = *cutoff;

    let above = samples.iter().filter(|s| s.time > cutoff).count();
    let mut ties_left = limit - above;
    let dropped = samples.len() - limit;
    log::debug!("history limit {limit}: dropping {dropped} oldest samples");

    let mut kept = Vec::with_capacity(limit);
    // Among samples tied at the cutoff, later positions win.
    for s in samples.into_iter().rev() {
        if s.time > cutoff {
            kept.push(s);
        } else if s.time == cutoff && ties_left > 0 {
            ties_left -= 1;
            kept.push(s);
        }
    }
    kept.reverse();
    kept
}
