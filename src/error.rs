//! Store-layer error taxonomy.
//!
//! Raw `rusqlite` failures are classified so the hook adapter can tell a
//! store it cannot reach from one that is merely contended.

use rusqlite::ErrorCode;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The backing file cannot be opened, written, or is out of space.
    #[error("memory store unavailable: {0}")]
    Unavailable(String),

    /// A write could not take the lock within the configured busy timeout.
    #[error("memory store busy: write lock not acquired before busy timeout")]
    Timeout,

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Short machine-readable tag used in hook JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
            Self::Timeout => "concurrency_timeout",
            Self::Sqlite(_) => "store_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "malformed_data",
        }
    }

    /// Whether retrying the whole invocation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Timeout,
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt,
            ) => Self::Unavailable(err.to_string()),
            _ => Self::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: ErrorCode, extended: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code,
                extended_code: extended,
            },
            None,
        )
    }

    #[test]
    fn busy_is_timeout() {
        let err = StoreError::from(sqlite_failure(ErrorCode::DatabaseBusy, 5));
        assert!(matches!(err, StoreError::Timeout));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "concurrency_timeout");
    }

    #[test]
    fn cannot_open_is_unavailable() {
        let err = StoreError::from(sqlite_failure(ErrorCode::CannotOpen, 14));
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(err.kind(), "store_unavailable");
    }

    #[test]
    fn other_codes_stay_sqlite() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
