//! Error types shared by the transport, the batch operations, and the state store.

use thiserror::Error;

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// Messages are captured as strings so a failure can be cloned into a
/// per-metric report and serialized for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request was rejected before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Connection, DNS, timeout, or other I/O failure.
    #[error("network error: {0}")]
    Network(String),
    /// The API answered 401.
    #[error("unauthorized")]
    Unauthorized,
    /// Any other non-2xx answer.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Batch-level failure of a load or poll cycle.
///
/// Per-metric transport failures never surface here; they are folded into
/// [`BatchReport::failures`](crate::outcome::BatchReport::failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("cycle cancelled before completion")]
    Cancelled,
}

/// Failure while persisting or restoring metric states.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not replace state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
