//! Compiles the condition/filter AST into a closure over `Entry`.

use std::sync::Arc;

use super::entry::{path_exists, resolve_path, Entry};
use super::env::Env;
use super::error::EvalError;
use crate::ast::{CmpOp, Condition, Operand};
use crate::value::{parse_decimal, AttributeValue, TypeTag};

/// A condition compiled against a fixed environment; callable against any
/// number of entries.
pub struct CompiledCondition {
    ast: Condition,
    env: Arc<Env>,
}

impl CompiledCondition {
    /// Evaluates the condition against `entry`.
    pub fn evaluate(&self, entry: &Entry) -> Result<bool, EvalError> {
        eval_condition(&self.ast, entry, &self.env)
    }
}

/// Compiles a condition tree against `env`.
#[must_use]
pub fn compile_condition(ast: Condition, env: Arc<Env>) -> CompiledCondition {
    CompiledCondition { ast, env }
}

pub(super) fn resolve_operand(op: &Operand, entry: &Entry, env: &Env) -> Result<AttributeValue, EvalError> {
    match op {
        Operand::Path(p) => resolve_path(p, entry, &env.names).cloned(),
        Operand::Value(v) => env.resolve_value(v),
        Operand::Size(p) => {
            let v = resolve_path(p, entry, &env.names)?;
            let n = v.size()?;
            Ok(AttributeValue::N(n.to_string()))
        }
    }
}

fn type_tag_from_str(s: &str) -> Result<TypeTag, EvalError> {
    match s {
        "S" => Ok(TypeTag::S),
        "N" => Ok(TypeTag::N),
        "B" => Ok(TypeTag::B),
        "BOOL" => Ok(TypeTag::Bool),
        "NULL" => Ok(TypeTag::Null),
        "SS" => Ok(TypeTag::Ss),
        "NS" => Ok(TypeTag::Ns),
        "BS" => Ok(TypeTag::Bs),
        "L" => Ok(TypeTag::L),
        "M" => Ok(TypeTag::M),
        other => Err(EvalError::InvalidTypeTag(other.to_string())),
    }
}

fn contains(collection: &AttributeValue, item: &AttributeValue) -> Result<bool, EvalError> {
    match (collection, item) {
        (AttributeValue::S(s), AttributeValue::S(needle)) => Ok(s.contains(needle.as_str())),
        (AttributeValue::Ss(set), AttributeValue::S(needle)) => Ok(set.contains(needle)),
        (AttributeValue::Ns(set), AttributeValue::N(needle)) => {
            Ok(set.iter().any(|n| n == needle))
        }
        (AttributeValue::Bs(set), AttributeValue::B(needle)) => Ok(set.contains(needle)),
        (AttributeValue::L(list), item) => Ok(list.iter().any(|v| v.equal(item))),
        _ => Err(EvalError::Type(format!(
            "contains() not applicable between {:?} and {:?}",
            collection.type_tag(),
            item.type_tag()
        ))),
    }
}

/// Evaluates a condition tree against `entry` using the substitutions in
/// `env`. Boolean operators evaluate both sides; there is no observable
/// short-circuit.
pub fn eval_condition(cond: &Condition, entry: &Entry, env: &Env) -> Result<bool, EvalError> {
    match cond {
        Condition::Cmp(l, op, r) => {
            let lv = resolve_operand(l, entry, env)?;
            let rv = resolve_operand(r, entry, env)?;
            match op {
                CmpOp::Eq => Ok(lv.equal(&rv)),
                CmpOp::NotEq => Ok(!lv.equal(&rv)),
                CmpOp::Lt => Ok(lv.compare(&rv)?.is_lt()),
                CmpOp::LtEq => Ok(lv.compare(&rv)?.is_le()),
                CmpOp::Gt => Ok(lv.compare(&rv)?.is_gt()),
                CmpOp::GtEq => Ok(lv.compare(&rv)?.is_ge()),
            }
        }
        Condition::Between(x, lo, hi) => {
            let xv = resolve_operand(x, entry, env)?;
            let lov = resolve_operand(lo, entry, env)?;
            let hiv = resolve_operand(hi, entry, env)?;
            Ok(xv.compare(&lov)?.is_ge() && xv.compare(&hiv)?.is_le())
        }
        Condition::In(x, values) => {
            let xv = resolve_operand(x, entry, env)?;
            for v in values {
                let vv = resolve_operand(v, entry, env)?;
                if xv.equal(&vv) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::AttributeExists(p) => Ok(path_exists(p, entry, &env.names)),
        Condition::AttributeNotExists(p) => Ok(!path_exists(p, entry, &env.names)),
        Condition::AttributeType(p, t) => {
            let v = resolve_path(p, entry, &env.names)?;
            let tv = resolve_operand(t, entry, env)?;
            let AttributeValue::S(tag) = tv else {
                return Err(EvalError::Type("attribute_type() expects a string type tag".into()));
            };
            Ok(v.type_tag() == type_tag_from_str(&tag)?)
        }
        Condition::BeginsWith(s, prefix) => {
            let sv = resolve_operand(s, entry, env)?;
            let pv = resolve_operand(prefix, entry, env)?;
            match (sv, pv) {
                (AttributeValue::S(s), AttributeValue::S(p)) => Ok(s.starts_with(p.as_str())),
                _ => Err(EvalError::Type("begins_with() requires two strings".into())),
            }
        }
        Condition::Contains(col, item) => {
            let cv = resolve_operand(col, entry, env)?;
            let iv = resolve_operand(item, entry, env)?;
            contains(&cv, &iv)
        }
        Condition::And(l, r) => {
            let lv = eval_condition(l, entry, env)?;
            let rv = eval_condition(r, entry, env)?;
            Ok(lv && rv)
        }
        Condition::Or(l, r) => {
            let lv = eval_condition(l, entry, env)?;
            let rv = eval_condition(r, entry, env)?;
            Ok(lv || rv)
        }
        Condition::Not(c) => Ok(!eval_condition(c, entry, env)?),
    }
}

/// Verifies the `N` arithmetic precondition used by the `SET` infix forms:
/// both operands must parse as decimals.
pub(super) fn require_numeric(v: &AttributeValue) -> Result<f64, EvalError> {
    match v {
        AttributeValue::N(s) => parse_decimal(s).map_err(|e| EvalError::Type(e.to_string())),
        other => Err(EvalError::Type(format!(
            "expected a numeric (N) operand, found {:?}",
            other.type_tag()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::ast::Path;
    use crate::parser::Parser;

    fn env_with(values: &[(&str, AttributeValue)]) -> Env {
        let mut env = Env::default();
        for (k, v) in values {
            env.values.insert((*k).to_string(), v.clone());
        }
        env
    }

    #[test]
    fn not_negates_evaluation() {
        let cond = Parser::parse_condition("attribute_exists(title)").unwrap();
        let mut entry = Entry::new();
        entry.insert("title".to_string(), AttributeValue::S("A".into()));
        let env = Env::default();
        assert!(eval_condition(&cond, &entry, &env).unwrap());
        let negated = Condition::Not(Box::new(cond));
        assert!(!eval_condition(&negated, &entry, &env).unwrap());
    }

    #[test]
    fn exists_xor_not_exists() {
        let entry = Entry::new();
        let env = Env::default();
        let p = Path::new(crate::ast::Name::Literal("missing".into()));
        assert!(!path_exists(&p, &entry, &env.names));
        assert!(eval_condition(&Condition::AttributeNotExists(p.clone()), &entry, &env).unwrap());
        assert!(!eval_condition(&Condition::AttributeExists(p), &entry, &env).unwrap());
    }

    #[test]
    fn begins_with_empty_prefix_is_always_true() {
        let cond = Parser::parse_condition("begins_with(title, :p)").unwrap();
        let mut entry = Entry::new();
        entry.insert("title".to_string(), AttributeValue::S("anything".into()));
        let env = env_with(&[(":p", AttributeValue::S(String::new()))]);
        let env = Env::new(BTreeMap::new(), env.values);
        assert!(eval_condition(&cond, &entry, &env).unwrap());
    }

    #[test]
    fn between_matches_range_conjunction() {
        let cond = Parser::parse_condition("x BETWEEN :lo AND :hi").unwrap();
        let mut entry = Entry::new();
        entry.insert("x".to_string(), AttributeValue::N("5".into()));
        let env = env_with(&[
            (":lo", AttributeValue::N("1".into())),
            (":hi", AttributeValue::N("10".into())),
        ]);
        assert!(eval_condition(&cond, &entry, &env).unwrap());
    }
}
