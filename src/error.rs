//! Error taxonomy for the orchestration core.
//!
//! Internal library code returns `OrchestratorError` via `thiserror`; only the
//! smoke-test binary (`main.rs`) flattens things into `anyhow::Result` at the
//! very edge, matching the teacher repo's `thiserror`-inside /
//! `anyhow`-at-the-edge split.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Routing found no candidate model.
    #[error("no eligible model for request: {0}")]
    NoEligibleModel(String),

    /// A provider adapter rejected or could not serve a request.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No variation satisfied the collapse strategy's criterion.
    #[error("collapse failed: {0}")]
    CollapseFailure(String),

    /// The agent bus's per-recipient queue was full.
    #[error("backpressure: queue for {0} is full")]
    Backpressure(String),

    /// Normal for siblings after FIRST_SUCCESS and for request-level timeouts.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invalid manifest, missing credentials, or other startup-fatal config.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request_response timed out waiting for correlation_id {0}")]
    RequestResponseTimeout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// True for errors that are expected/benign noise (cancellation, cache
    /// misses folded into this type) rather than real failures — callers
    /// filtering logs or metrics can use this to separate the two.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled(_))
    }
}
