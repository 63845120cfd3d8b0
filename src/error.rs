use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Coarse error classes the calling layer maps to responses
/// (e.g. `NotFound` -> 404).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    Validation,
    TransactionFailure,
    Cancelled,
    Storage,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transaction error: {0}")]
    Transaction(String),
    #[error("tx err: {source}, rb err: {rollback}")]
    Rollback {
        source: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },
    #[error("Lock conflict: {0}")]
    Conflict(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(rocksdb::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lock timeouts and detected deadlocks are retryable conflicts, not storage
/// faults.
#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::Busy
            | rocksdb::ErrorKind::TimedOut
            | rocksdb::ErrorKind::TryAgain => Self::Conflict(err.into_string()),
            _ => Self::Storage(err),
        }
    }
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::Validation(_) | Self::Csv(_) => ErrorKind::Validation,
            Self::Transaction(_) | Self::Conflict(_) => ErrorKind::TransactionFailure,
            // The original failure decides how the caller should react.
            Self::Rollback { source, .. } => source.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
            #[cfg(feature = "storage-rocksdb")]
            Self::Storage(_) => ErrorKind::Storage,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
