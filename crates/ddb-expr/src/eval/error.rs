//! Errors raised while compiling or evaluating an expression against a
//! substitution environment and an `Entry`.

use std::fmt;

/// An error produced by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// A `#name` placeholder has no entry in `ExpressionAttributeNames`.
    #[error("expression attribute name not defined: {0}")]
    NameNotDefined(String),
    /// A `:value` placeholder has no entry in `ExpressionAttributeValues`.
    #[error("expression attribute value not defined: {0}")]
    ValueNotDefined(String),
    /// A path traversal stepped into a missing map key, out-of-range list
    /// index, or scalar value.
    #[error("path not found: {0}")]
    PathNotFound(String),
    /// An operand resolved to a type the operator cannot act on.
    #[error("type error: {0}")]
    Type(String),
    /// `attribute_type` was given a string that is not a known type tag.
    #[error("invalid type tag: {0}")]
    InvalidTypeTag(String),
    /// An UpdateExpression violated a structural rule (e.g. ADD/DELETE on a
    /// non-top-level path).
    #[error("invalid UpdateExpression: {0}")]
    InvalidUpdate(String),
    /// A key-condition expression did not match the table's key schema.
    #[error("invalid key condition: {0}")]
    InvalidKeyCondition(String),
}

impl EvalError {
    pub(crate) fn path_not_found(display: impl fmt::Display) -> Self {
        Self::PathNotFound(display.to_string())
    }
}
