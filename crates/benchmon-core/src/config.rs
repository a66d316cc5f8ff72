//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::LoadOptions;
use crate::transport::{DEFAULT_API_BASE, TransportConfig};
use crate::window::DEFAULT_TIME_RANGE_SECS;

/// Default cap on samples accepted from a single fetch.
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Everything needed to build a [`MetricEngine`](crate::engine::MetricEngine)
/// and drive a [`Tracker`](crate::tracker::Tracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the gobench API, e.g. `http://localhost:8080/api`.
    pub api_base: String,
    /// Bearer token attached to every request.
    pub token: Option<String>,
    /// Realtime look-back window in seconds.
    pub time_range_secs: u64,
    /// Bound the initial load to the realtime window.
    pub realtime: bool,
    /// Delay between polling cycles.
    pub poll_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Maximum samples kept from one fetch (`None` = unlimited).
    pub history_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            time_range_secs: DEFAULT_TIME_RANGE_SECS,
            realtime: true,
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
        }
    }
}

impl EngineConfig {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            api_base: self.api_base.clone(),
            timeout: self.request_timeout,
        }
    }

    /// Initial-load options resuming from `reference_timestamp`.
    pub fn load_options(&self, reference_timestamp: Option<i64>) -> LoadOptions {
        LoadOptions {
            time_range_secs: self.time_range_secs,
            reference_timestamp,
            realtime: self.realtime,
        }
    }
}
