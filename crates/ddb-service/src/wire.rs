//! The DynamoDB JSON error envelope and the classification from
//! `ServiceError` into an error name plus HTTP status (§6/§7).

use serde::Serialize;

use crate::error::ServiceError;

const SERVICE_PREFIX: &str = "com.amazonaws.dynamodb.v20120810";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorName {
    ValidationException,
    ResourceNotFoundException,
    ResourceInUseException,
    ConditionalCheckFailedException,
    TransactionCanceledException,
    ProvisionedThroughputExceededException,
    InternalFailure,
}

impl ErrorName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationException => "ValidationException",
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ResourceInUseException => "ResourceInUseException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TransactionCanceledException => "TransactionCanceledException",
            Self::ProvisionedThroughputExceededException => "ProvisionedThroughputExceededException",
            Self::InternalFailure => "InternalFailure",
        }
    }

    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::InternalFailure => 500,
            _ => 400,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: String,
    message: String,
    #[serde(rename = "CancellationReasons", skip_serializing_if = "Option::is_none")]
    cancellation_reasons: Option<Vec<CancellationReasonBody>>,
}

#[derive(Serialize)]
struct CancellationReasonBody {
    #[serde(rename = "Code")]
    code: &'static str,
}

/// Classifies a `ServiceError` into a wire error name and its serialized
/// DynamoDB-style error envelope.
pub fn classify(err: &ServiceError) -> (ErrorName, Vec<u8>) {
    let name = match err {
        ServiceError::Parse(_) | ServiceError::Eval(_) | ServiceError::Validation(_) => ErrorName::ValidationException,
        ServiceError::Storage(storage_err) => classify_storage(storage_err),
        ServiceError::TransactionCanceled(_) => ErrorName::TransactionCanceledException,
    };

    let reasons = match err {
        ServiceError::TransactionCanceled(reasons) => Some(
            reasons
                .iter()
                .map(|r| CancellationReasonBody { code: r.code() })
                .collect(),
        ),
        _ => None,
    };

    let body = ErrorBody {
        error_type: format!("{SERVICE_PREFIX}#{}", name.as_str()),
        message: err.to_string(),
        cancellation_reasons: reasons,
    };
    let encoded = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
    (name, encoded)
}

fn classify_storage(err: &ddb_storage::StorageError) -> ErrorName {
    use ddb_storage::StorageError as E;
    match err {
        E::TableNotFound(_) | E::IndexNotFound(..) => ErrorName::ResourceNotFoundException,
        E::TableAlreadyExists(_) => ErrorName::ResourceInUseException,
        E::ConditionalCheckFailed => ErrorName::ConditionalCheckFailedException,
        E::ThroughputExceeded(_) => ErrorName::ProvisionedThroughputExceededException,
        E::MissingKeyAttribute(_) | E::Validation(_) => ErrorName::ValidationException,
        E::Database(_) | E::Serde(_) | E::Eval(_) => ErrorName::InternalFailure,
    }
}
