//! Per-metric outcomes and the batch report they fold into.

use serde::{Serialize, Serializer};

use crate::error::TransportError;
use crate::model::MetricState;

/// Result of loading or polling one metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    Loaded(MetricState),
    /// The fetch failed; `fallback` is what the UI should keep showing.
    Failed {
        fallback: MetricState,
        error: TransportError,
    },
}

impl MetricOutcome {
    pub fn state(&self) -> &MetricState {
        match self {
            Self::Loaded(state) => state,
            Self::Failed { fallback, .. } => fallback,
        }
    }
}

/// A metric whose fetch failed during a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFailure {
    pub id: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: TransportError,
}

/// One state per input metric, in input order, plus the failures.
///
/// A failed metric still has an entry in `states` (its fallback), so the
/// caller can round-trip `states` into the next cycle unconditionally.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchReport {
    pub states: Vec<MetricState>,
    pub failures: Vec<MetricFailure>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = MetricOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                MetricOutcome::Loaded(state) => report.states.push(state),
                MetricOutcome::Failed { fallback, error } => {
                    report.failures.push(MetricFailure {
                        id: fallback.descriptor.id.clone(),
                        error,
                    });
                    report.states.push(fallback);
                }
            }
        }
        report
    }

    /// True when every metric was fetched successfully.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

fn serialize_display<S: Serializer>(error: &TransportError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}
