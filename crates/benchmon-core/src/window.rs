//! Fetch windows and the clock they are computed against.

use std::time::{SystemTime, UNIX_EPOCH};

/// Default realtime look-back in seconds.
pub const DEFAULT_TIME_RANGE_SECS: u64 = 3600;

/// Wall-clock source in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Time bounds of one fetch, unix milliseconds. `None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchWindow {
    pub from: Option<i64>,
    pub end: Option<i64>,
}

impl FetchWindow {
    /// Full history.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Everything from `from` onward.
    pub fn since(from: i64) -> Self {
        Self {
            from: Some(from),
            end: None,
        }
    }

    /// Realtime window ending at `now`.
    ///
    /// Resumes at `reference` when it lies less than `time_range_secs` in
    /// the past; otherwise the look-back is capped at `time_range_secs`. A
    /// missing reference is treated as arbitrarily old.
    pub fn realtime(now: i64, time_range_secs: u64, reference: Option<i64>) -> Self {
        let range_secs = i64::try_from(time_range_secs).unwrap_or(i64::MAX);
        let cap = now.saturating_sub(range_secs.saturating_mul(1000));
        let from = match reference {
            Some(reference) if elapsed_secs(now, reference) < range_secs => reference,
            _ => cap,
        };
        Self {
            from: Some(from),
            end: Some(now),
        }
    }

    /// Query parameters as the API expects them; open bounds are sent empty.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("from", self.from.map(|t| t.to_string()).unwrap_or_default()),
            ("end", self.end.map(|t| t.to_string()).unwrap_or_default()),
        ]
    }
}

/// Whole seconds between `reference` and `now`, rounded half up.
fn elapsed_secs(now: i64, reference: i64) -> i64 {
    (now.saturating_sub(reference) as f64 / 1000.0 + 0.5).floor() as i64
}
