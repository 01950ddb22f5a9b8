use ledger_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("embedding call failed: {0}")]
    Embedding(#[from] ledger_completion::CompletionError),

    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("vector index entry {0} not found")]
    NotFound(i64),
}

impl From<VectorError> for LedgerError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Embedding(e) => e.into(),
            other => LedgerError::IndexFailure(other.to_string()),
        }
    }
}
