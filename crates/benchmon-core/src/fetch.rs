//! Single-metric sample retrieval.

use std::sync::Arc;

use serde_json::Value;

use crate::error::TransportError;
use crate::kind::{MetricKind, select_endpoint};
use crate::model::Sample;
use crate::transport::{ApiRequest, Transport};
use crate::window::FetchWindow;

/// Fetches raw samples for one metric at a time. No caching: every call
/// is exactly one request.
#[derive(Clone)]
pub struct MetricFetcher {
    transport: Arc<dyn Transport>,
}

impl MetricFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Samples of metric `id` within `window`, as returned by the API.
    ///
    /// Transport failures are returned as-is. A JSON `null` body (the API's
    /// encoding of an empty list) yields an empty vector.
    pub async fn fetch(
        &self,
        id: &str,
        kind: MetricKind,
        window: FetchWindow,
    ) -> Result<Vec<Sample>, TransportError> {
        if id.is_empty() {
            return Err(TransportError::InvalidRequest(
                "metric id must not be empty".to_string(),
            ));
        }

        let mut request = ApiRequest::get(select_endpoint(kind).path(id));
        for (key, value) in window.query_params() {
            request = request.query(key, value);
        }

        let payload = self.transport.request(request).await?;
        let samples = decode_samples(payload)?;
        log::debug!(
            "fetched {} {kind} samples for metric {id} (from={:?}, end={:?})",
            samples.len(),
            window.from,
            window.end
        );
        Ok(samples)
    }
}

fn decode_samples(payload: Value) -> Result<Vec<Sample>, TransportError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other).map_err(|e| TransportError::Decode(e.to_string())),
    }
}
