use ledger_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("receipt {0} not found")]
    NotFound(i64),

    #[error("decimal parse error: {0}")]
    Decimal(String),

    #[error("store task panicked: {0}")]
    Join(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LedgerError::NotFound(format!("receipt {id}")),
            other => LedgerError::StoreFailure(other.to_string()),
        }
    }
}
