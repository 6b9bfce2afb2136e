//! The facade's error taxonomy (§7): every failure a handler can produce,
//! classified into a DynamoDB error name by `wire::classify`.

use ddb_expr::{EvalError, ParseError};
use ddb_storage::StorageError;
use thiserror::Error;

/// One action's outcome inside a cancelled `TransactWriteItems` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    None,
    ConditionalCheckFailed,
    ItemCollectionSizeLimitExceeded,
    TransactionConflict,
    ProvisionedThroughputExceeded,
    ValidationError,
}

impl CancellationReason {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::ConditionalCheckFailed => "ConditionalCheckFailed",
            Self::ItemCollectionSizeLimitExceeded => "ItemCollectionSizeLimitExceeded",
            Self::TransactionConflict => "TransactionConflict",
            Self::ProvisionedThroughputExceeded => "ProvisionedThroughputExceeded",
            Self::ValidationError => "ValidationError",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("{0}")]
    Validation(String),

    #[error("Transaction cancelled")]
    TransactionCanceled(Vec<CancellationReason>),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
