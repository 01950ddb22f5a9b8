//! Error type for completion-service calls, convertible into the shared
//! `LedgerError` taxonomy.

use ledger_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion service unreachable: {0}")]
    Unavailable(String),

    #[error("completion service call timed out")]
    Timeout,

    #[error("completion service returned an error response: {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed completion service response: {0}")]
    Malformed(String),
}

impl From<CompletionError> for LedgerError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Unavailable(msg) => LedgerError::UpstreamUnavailable(msg),
            CompletionError::Timeout => LedgerError::UpstreamTimeout,
            CompletionError::Upstream { status, body } => {
                LedgerError::UpstreamUnavailable(format!("status {status}: {body}"))
            }
            CompletionError::Malformed(msg) => LedgerError::Internal(msg),
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Unavailable(err.to_string())
        }
    }
}
