//! The error-kind taxonomy shared by every component (§7).

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The error taxonomy from §7. Every crate-local error type converts into
/// one of these variants; `ledger-server` maps each variant to an HTTP
/// status code.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input violates a §3 constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced identifier does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The Extractor classified its output as `failed`.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The completion service could not be reached at all.
    #[error("upstream completion service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A call to the completion service exceeded its configured timeout.
    #[error("upstream completion service timed out")]
    UpstreamTimeout,

    /// The relational store failed to complete an operation.
    #[error("store failure: {0}")]
    StoreFailure(String),

    /// The vector index failed to complete an operation.
    #[error("index failure: {0}")]
    IndexFailure(String),

    /// Anything not covered by the above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// A stable, lowercase kind name for structured logging and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            LedgerError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            LedgerError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            LedgerError::StoreFailure(_) => "STORE_FAILURE",
            LedgerError::IndexFailure(_) => "INDEX_FAILURE",
            LedgerError::Internal(_) => "INTERNAL",
        }
    }
}
