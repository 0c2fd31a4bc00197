//! Data access error types
//!
//! The data layer is mechanical: it never retries and never rewrites store
//! failures. `sqlx` errors travel to the caller unchanged inside
//! [`DataError::Store`]; the helpers below only classify them.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Errors that can occur while composing, executing or committing work
#[derive(Debug, Error)]
pub enum DataError {
    /// A caller supplied a malformed argument (page descriptor, missing
    /// order key for a paginated query, closed pool, unknown column...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raw SQL rejected before reaching the store
    #[error("Rejected raw SQL: {0}")]
    InvalidSql(String),

    /// Failure reported by the underlying store, passed through untouched
    #[error("Store failure: {0}")]
    Store(#[from] sqlx::Error),

    /// An UPDATE or DELETE matched no row
    #[error("Concurrency conflict: {entity} with key '{key}' was not found in the store")]
    ConcurrencyConflict { entity: &'static str, key: String },

    /// The commit was cancelled before it could finish; nothing was written
    #[error("Transaction cancelled")]
    Cancelled,

    /// The commit was rejected for a reason other than a store error
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// The owning unit of work has been disposed
    #[error("Unit of work has been disposed")]
    Disposed,

    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),
}

impl DataError {
    /// Creates an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DataError::InvalidArgument(message.into())
    }

    /// Creates an invalid SQL error
    pub fn invalid_sql(message: impl Into<String>) -> Self {
        DataError::InvalidSql(message.into())
    }

    /// Checks if this error came from the store (connectivity, constraint,
    /// timeout or concurrency conflict)
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            DataError::Store(_) | DataError::ConcurrencyConflict { .. } | DataError::ConnectionFailed(_)
        )
    }

    /// Checks if this error means a commit did not happen
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, DataError::Cancelled | DataError::Transaction(_))
    }

    /// Checks if this error is a caller contract violation
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, DataError::InvalidArgument(_) | DataError::InvalidSql(_))
    }

    /// Checks if this error is a unique, foreign key, not-null or check
    /// constraint violation reported by the store
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DataError::Store(sqlx::Error::Database(db_err)) => matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            _ => false,
        }
    }

    /// Checks if this error is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DataError::Store(sqlx::Error::Database(db_err)) => {
                matches!(db_err.kind(), ErrorKind::UniqueViolation)
            }
            _ => false,
        }
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DataError::ConnectionFailed(_)
                | DataError::Store(sqlx::Error::PoolTimedOut)
                | DataError::Store(sqlx::Error::PoolClosed)
                | DataError::Store(sqlx::Error::Io(_))
        )
    }
}
