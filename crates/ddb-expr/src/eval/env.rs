//! The substitution environment an expression is compiled against:
//! `ExpressionAttributeNames` and `ExpressionAttributeValues`.

use std::collections::BTreeMap;

use super::error::EvalError;
use crate::value::AttributeValue;

/// Bundles the two substitution maps a request supplies alongside its
/// expression strings.
#[derive(Debug, Clone, Default)]
pub struct Env {
    /// `#name -> literal attribute name`.
    pub names: BTreeMap<String, String>,
    /// `:name -> value`.
    pub values: BTreeMap<String, AttributeValue>,
}

impl Env {
    /// Creates an environment from the two wire-format maps.
    #[must_use]
    pub fn new(names: BTreeMap<String, String>, values: BTreeMap<String, AttributeValue>) -> Self {
        Self { names, values }
    }

    /// Resolves a `:name` reference, cloning the bound value.
    pub fn resolve_value(&self, name: &str) -> Result<AttributeValue, EvalError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::ValueNotDefined(format!(":{name}")))
    }
}
