//! Custom error types for the common library
//!
//! Every failure raised while talking to PostgreSQL is reported through
//! [`InfrastructureError`], so callers never handle raw driver errors.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Failure of the data-access infrastructure
#[derive(Error, Debug)]
pub enum InfrastructureError {
    /// Error occurred while opening the connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during statement execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Connect or execute did not finish in time
    #[error("Database operation timed out after {0} seconds")]
    Timeout(u64),

    /// A returned row did not have the expected shape
    #[error("Database decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl InfrastructureError {
    /// Name of the storage constraint the statement violated, if any.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            InfrastructureError::Query(SqlxError::Database(db)) => db.constraint(),
            _ => None,
        }
    }
}

/// Type alias for Result with InfrastructureError
pub type DatabaseResult<T> = Result<T, InfrastructureError>;
