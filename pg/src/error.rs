//! The driver's error taxonomy (spec.md §7).
//!
//! One variant per cause family, mirroring the teacher's `driver::PgError`
//! but promoted to `thiserror` (matching `qail-core::error::CommandError`)
//! so structured detail like [`ErrorInfo`] travels with the error instead of
//! being flattened into a string.

use thiserror::Error;

use crate::protocol::ErrorInfo;

#[derive(Debug, Error)]
pub enum PgError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication error: {0}")]
    Auth(String),

    /// A server-side `ErrorResponse` for a submitted command.
    #[error("database error {}: {}", .0.code, .0.message)]
    Database(ErrorInfo),

    /// A command was issued while the current transaction is already
    /// aborted (`ReadyForQuery` status `E`); the server will reject anything
    /// but `ROLLBACK`/`ROLLBACK TO SAVEPOINT` until it clears.
    #[error("current transaction is aborted, commands ignored until end of transaction block")]
    TransactionAborted,

    /// `fetch_one` ran without error but the result set was empty.
    #[error("query returned no rows")]
    NoRows,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("type decode error: {0}")]
    TypeDecode(String),

    #[error("column index {index} out of bounds (row has {len} columns)")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Command(#[from] qail_core::error::CommandError),
}

pub type PgResult<T> = Result<T, PgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_display_includes_code_and_message() {
        let info = ErrorInfo {
            severity: "ERROR".into(),
            code: "23505".into(),
            message: "duplicate key value violates unique constraint".into(),
            detail: None,
            hint: None,
            position: None,
            schema: None,
            table: None,
            column: None,
        };
        let err = PgError::Database(info);
        let s = err.to_string();
        assert!(s.contains("23505"));
        assert!(s.contains("duplicate key"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err: PgError = io_err.into();
        assert!(matches!(err, PgError::Io(_)));
    }
}
