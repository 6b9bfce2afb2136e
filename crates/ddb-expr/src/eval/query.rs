//! Compiles a key-condition expression against a table's key schema into a
//! `Query`: a partition-key prefix plus an optional sort-key predicate.

use super::env::Env;
use super::error::EvalError;
use crate::ast::{KeyConditionExpr, KeyPredicate};
use crate::value::AttributeValue;

/// The partition/sort key attribute names of the table or index a query
/// targets.
#[derive(Debug, Clone)]
pub struct KeySchema {
    /// The partition-key attribute name.
    pub partition_key: String,
    /// The sort-key attribute name, if the schema has one.
    pub sort_key: Option<String>,
}

/// A sort-key predicate compiled to canonical key bytes.
#[derive(Debug, Clone)]
pub enum SortPredicate {
    Eq(Vec<u8>),
    Lt(Vec<u8>),
    LtEq(Vec<u8>),
    Gt(Vec<u8>),
    GtEq(Vec<u8>),
    Between(Vec<u8>, Vec<u8>),
    BeginsWith(Vec<u8>),
}

impl SortPredicate {
    /// Evaluates the predicate against a candidate sort-key byte string.
    #[must_use]
    pub fn matches(&self, sort_bytes: &[u8]) -> bool {
        match self {
            Self::Eq(v) => sort_bytes == v.as_slice(),
            Self::Lt(v) => sort_bytes < v.as_slice(),
            Self::LtEq(v) => sort_bytes <= v.as_slice(),
            Self::Gt(v) => sort_bytes > v.as_slice(),
            Self::GtEq(v) => sort_bytes >= v.as_slice(),
            Self::Between(lo, hi) => sort_bytes >= lo.as_slice() && sort_bytes <= hi.as_slice(),
            Self::BeginsWith(prefix) => sort_bytes.starts_with(prefix.as_slice()),
        }
    }
}

/// A compiled `Query`: the partition-key bytes to match exactly, plus an
/// optional predicate narrowing the sort key.
#[derive(Debug, Clone)]
pub struct Query {
    /// The partition-key bytes every matching row must equal.
    pub partition_key_bytes: Vec<u8>,
    /// The predicate a row's sort-key bytes must satisfy, if the key
    /// condition named one.
    pub sort_predicate: Option<SortPredicate>,
}

fn predicate_value_bytes(name: &str, env: &Env) -> Result<Vec<u8>, EvalError> {
    Ok(env.resolve_value(name)?.key_bytes())
}

/// Compiles a key-condition expression against `schema`.
///
/// Enforces: at most two predicates (already guaranteed by the parser), the
/// partition-key predicate names `schema.partition_key` and is an equality,
/// and any second predicate names `schema.sort_key`.
pub fn compile_key_condition(ast: &KeyConditionExpr, env: &Env, schema: &KeySchema) -> Result<Query, EvalError> {
    let mut partition_bytes = None;
    let mut sort_predicate = None;

    for predicate in &ast.predicates {
        let attr = super::entry::resolve_name(predicate.attr(), &env.names)?;
        if attr == schema.partition_key {
            let KeyPredicate::Eq(_, value) = predicate else {
                return Err(EvalError::InvalidKeyCondition(format!(
                    "partition key {attr} must use ="
                )));
            };
            if partition_bytes.is_some() {
                return Err(EvalError::InvalidKeyCondition(
                    "partition key predicate given twice".into(),
                ));
            }
            partition_bytes = Some(predicate_value_bytes(value, env)?);
        } else if Some(attr) == schema.sort_key.as_deref() {
            if sort_predicate.is_some() {
                return Err(EvalError::InvalidKeyCondition(
                    "sort key predicate given twice".into(),
                ));
            }
            sort_predicate = Some(compile_sort_predicate(predicate, env)?);
        } else {
            return Err(EvalError::InvalidKeyCondition(format!(
                "{attr} is neither the partition key nor the sort key"
            )));
        }
    }

    let partition_key_bytes = partition_bytes.ok_or_else(|| {
        EvalError::InvalidKeyCondition(format!(
            "key condition must include an equality on {}",
            schema.partition_key
        ))
    })?;

    Ok(Query {
        partition_key_bytes,
        sort_predicate,
    })
}

fn compile_sort_predicate(predicate: &KeyPredicate, env: &Env) -> Result<SortPredicate, EvalError> {
    Ok(match predicate {
        KeyPredicate::Eq(_, v) => SortPredicate::Eq(predicate_value_bytes(v, env)?),
        KeyPredicate::Lt(_, v) => SortPredicate::Lt(predicate_value_bytes(v, env)?),
        KeyPredicate::LtEq(_, v) => SortPredicate::LtEq(predicate_value_bytes(v, env)?),
        KeyPredicate::Gt(_, v) => SortPredicate::Gt(predicate_value_bytes(v, env)?),
        KeyPredicate::GtEq(_, v) => SortPredicate::GtEq(predicate_value_bytes(v, env)?),
        KeyPredicate::Between(_, lo, hi) => {
            SortPredicate::Between(predicate_value_bytes(lo, env)?, predicate_value_bytes(hi, env)?)
        }
        KeyPredicate::BeginsWith(_, v) => {
            let value = env.resolve_value(v)?;
            let AttributeValue::S(s) = value else {
                return Err(EvalError::InvalidKeyCondition(
                    "begins_with() on a key condition requires a string".into(),
                ));
            };
            SortPredicate::BeginsWith(s.into_bytes())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn schema() -> KeySchema {
        KeySchema {
            partition_key: "year".to_string(),
            sort_key: Some("title".to_string()),
        }
    }

    fn env() -> Env {
        let mut env = Env::default();
        env.values.insert(":y".to_string(), AttributeValue::N("2024".to_string()));
        env.values.insert(":t".to_string(), AttributeValue::S("A".to_string()));
        env
    }

    #[test]
    fn compiles_equality_on_both_keys() {
        let ast = Parser::parse_key_condition("year = :y AND begins_with(title, :t)").unwrap();
        let query = compile_key_condition(&ast, &env(), &schema()).unwrap();
        assert!(query.sort_predicate.unwrap().matches(b"Apple"));
    }

    #[test]
    fn rejects_non_equality_partition_predicate() {
        let ast = Parser::parse_key_condition("year > :y").unwrap();
        assert!(compile_key_condition(&ast, &env(), &schema()).is_err());
    }

    #[test]
    fn rejects_unknown_attribute() {
        let ast = Parser::parse_key_condition("year = :y AND other = :t").unwrap();
        assert!(compile_key_condition(&ast, &env(), &schema()).is_err());
    }
}
