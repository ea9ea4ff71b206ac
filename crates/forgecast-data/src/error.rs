//! Errors raised by the persistence layer.

use thiserror::Error;

/// Errors raised while reading or writing persisted pipeline state.
#[derive(Debug, Error)]
pub enum DataError {
    /// A database operation failed.
    #[error("database operation '{operation}' failed")]
    Database {
        /// Name of the operation that failed.
        operation: &'static str,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
    /// A row's JSON payload could not be decoded into the expected type.
    #[error("failed to decode '{field}' for {entity}")]
    Decode {
        /// Entity the row represents (for example `"file_entry"`).
        entity: &'static str,
        /// Column that failed to decode.
        field: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// The requested row does not exist.
    #[error("{entity} '{id}' was not found")]
    NotFound {
        /// Entity kind that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
}

/// Result alias for persistence operations.
pub type DataResult<T> = Result<T, DataError>;

pub(crate) fn db(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::Database { operation, source }
}
