//! Errors raised by the storage engine, classified close to the shape the
//! service facade needs for the DynamoDB error envelope.

use thiserror::Error;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("expression error: {0}")]
    Eval(#[from] ddb_expr::EvalError),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("index not found: {0} on table {1}")]
    IndexNotFound(String, String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("missing key attribute: {0}")]
    MissingKeyAttribute(String),

    #[error("conditional check failed")]
    ConditionalCheckFailed,

    #[error("provisioned throughput exceeded on table {0}")]
    ThroughputExceeded(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
