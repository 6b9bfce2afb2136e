//! Compiles the update AST into a mutator over `Entry`.
//!
//! Application order is fixed: `SET`, then `REMOVE`, then `ADD`, then
//! `DELETE`; within a clause, actions apply in textual order and later
//! actions observe earlier ones.

use std::sync::Arc;

use super::condition::{require_numeric, resolve_operand};
use super::entry::{remove_path, resolve_path, set_path, Entry};
use super::env::Env;
use super::error::EvalError;
use crate::ast::{InfixOp, Name, Operand, SetValue, UpdateExpr};
use crate::value::{format_decimal, parse_decimal, AttributeValue};

/// An update expression compiled against a fixed environment.
pub struct CompiledUpdate {
    ast: UpdateExpr,
    env: Arc<Env>,
}

impl CompiledUpdate {
    /// Applies SET, REMOVE, ADD, DELETE (in that order) to `entry`.
    pub fn apply(&self, entry: &mut Entry) -> Result<(), EvalError> {
        apply_update(&self.ast, entry, &self.env)
    }
}

/// Compiles an update expression against `env`.
#[must_use]
pub fn compile_update(ast: UpdateExpr, env: Arc<Env>) -> CompiledUpdate {
    CompiledUpdate { ast, env }
}

fn resolve_set_value(value: &SetValue, entry: &Entry, env: &Env) -> Result<AttributeValue, EvalError> {
    match value {
        SetValue::Operand(op) => resolve_operand(op, entry, env),
        SetValue::Infix(l, op, r) => {
            let lv = resolve_operand(l, entry, env)?;
            let rv = resolve_operand(r, entry, env)?;
            let lf = require_numeric(&lv)?;
            let rf = require_numeric(&rv)?;
            let result = match op {
                InfixOp::Add => lf + rf,
                InfixOp::Sub => lf - rf,
            };
            Ok(AttributeValue::N(format_decimal(result)))
        }
        SetValue::IfNotExists(path, fallback) => match resolve_path(path, entry, &env.names) {
            Ok(v) => Ok(v.clone()),
            Err(_) => resolve_set_value(fallback, entry, env),
        },
        SetValue::ListAppend(a, b) => {
            let av = resolve_path(a, entry, &env.names)?;
            let bv = resolve_path(b, entry, &env.names)?;
            match (av, bv) {
                (AttributeValue::L(a), AttributeValue::L(b)) => {
                    let mut merged = a.clone();
                    merged.extend(b.iter().cloned());
                    Ok(AttributeValue::L(merged))
                }
                _ => Err(EvalError::Type("list_append() requires two lists".into())),
            }
        }
    }
}

fn resolve_add_name<'a>(name: &'a Name, env: &'a Env) -> Result<&'a str, EvalError> {
    super::entry::resolve_name(name, &env.names)
}

/// Applies the compiled clauses of `update` to `entry` in the fixed order.
pub fn apply_update(update: &UpdateExpr, entry: &mut Entry, env: &Env) -> Result<(), EvalError> {
    for action in &update.set {
        let value = resolve_set_value(&action.value, entry, env)?;
        set_path(&action.path, value, entry, &env.names)?;
    }
    for path in &update.remove {
        remove_path(path, entry, &env.names)?;
    }
    for (name, operand) in &update.add {
        apply_add(name, operand, entry, env)?;
    }
    for (name, value_name) in &update.delete {
        apply_delete(name, value_name, entry, env)?;
    }
    Ok(())
}

fn apply_add(name: &Name, operand: &Operand, entry: &mut Entry, env: &Env) -> Result<(), EvalError> {
    let key = resolve_add_name(name, env)?.to_string();
    let addend = resolve_operand(operand, entry, env)?;
    let existing = entry.remove(&key);
    let merged = match (&existing, &addend) {
        (None, AttributeValue::N(_)) => addend,
        (Some(AttributeValue::N(cur)), AttributeValue::N(add)) => {
            let cur = parse_decimal(cur).map_err(|e| EvalError::Type(e.to_string()))?;
            let add = parse_decimal(add).map_err(|e| EvalError::Type(e.to_string()))?;
            AttributeValue::N(format_decimal(cur + add))
        }
        (None, AttributeValue::Ss(_) | AttributeValue::Ns(_) | AttributeValue::Bs(_)) => addend,
        (Some(AttributeValue::Ss(cur)), AttributeValue::Ss(add)) => {
            AttributeValue::Ss(cur.union(add).cloned().collect())
        }
        (Some(AttributeValue::Ns(cur)), AttributeValue::Ns(add)) => {
            AttributeValue::Ns(cur.union(add).cloned().collect())
        }
        (Some(AttributeValue::Bs(cur)), AttributeValue::Bs(add)) => {
            AttributeValue::Bs(cur.union(add).cloned().collect())
        }
        _ => return Err(EvalError::InvalidUpdate(format!("ADD type mismatch on {key}"))),
    };
    entry.insert(key, merged);
    Ok(())
}

fn apply_delete(name: &Name, value_name: &str, entry: &mut Entry, env: &Env) -> Result<(), EvalError> {
    let key = resolve_add_name(name, env)?.to_string();
    let Some(existing) = entry.get(&key) else {
        return Ok(());
    };
    let to_remove = env.resolve_value(value_name)?;
    let updated = match (existing, &to_remove) {
        (AttributeValue::Ss(cur), AttributeValue::Ss(remove)) => {
            AttributeValue::Ss(cur.difference(remove).cloned().collect())
        }
        (AttributeValue::Ns(cur), AttributeValue::Ns(remove)) => {
            AttributeValue::Ns(cur.difference(remove).cloned().collect())
        }
        (AttributeValue::Bs(cur), AttributeValue::Bs(remove)) => {
            AttributeValue::Bs(cur.difference(remove).cloned().collect())
        }
        _ => return Err(EvalError::InvalidUpdate(format!("DELETE type mismatch on {key}"))),
    };
    entry.insert(key, updated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use std::collections::BTreeSet;

    fn env_with_value(name: &str, value: AttributeValue) -> Env {
        let mut env = Env::default();
        env.values.insert(name.to_string(), value);
        env
    }

    #[test]
    fn set_infix_subtraction() {
        let update = Parser::parse_update("SET price = price - :d").unwrap();
        let mut entry = Entry::new();
        entry.insert("price".to_string(), AttributeValue::N("100".into()));
        let env = env_with_value(":d", AttributeValue::N("10".into()));
        apply_update(&update, &mut entry, &env).unwrap();
        assert_eq!(entry.get("price"), Some(&AttributeValue::N("90".into())));
    }

    #[test]
    fn set_infix_on_non_numeric_errors() {
        let update = Parser::parse_update("SET price = price - :d").unwrap();
        let mut entry = Entry::new();
        entry.insert("price".to_string(), AttributeValue::S("\u{00a5}100".into()));
        let env = env_with_value(":d", AttributeValue::N("10".into()));
        assert!(apply_update(&update, &mut entry, &env).is_err());
    }

    #[test]
    fn add_increments_k_times() {
        let update = Parser::parse_update("ADD n :one").unwrap();
        let mut entry = Entry::new();
        let env = env_with_value(":one", AttributeValue::N("1".into()));
        for _ in 0..3 {
            apply_update(&update, &mut entry, &env).unwrap();
        }
        assert_eq!(entry.get("n"), Some(&AttributeValue::N("3".into())));
    }

    #[test]
    fn remove_twice_is_idempotent() {
        let update = Parser::parse_update("REMOVE x").unwrap();
        let mut entry = Entry::new();
        entry.insert("x".to_string(), AttributeValue::S("v".into()));
        let env = Env::default();
        apply_update(&update, &mut entry, &env).unwrap();
        assert!(!entry.contains_key("x"));
        apply_update(&update, &mut entry, &env).unwrap();
        assert!(!entry.contains_key("x"));
    }

    #[test]
    fn delete_ignores_missing_members() {
        let update = Parser::parse_update("DELETE tags :rm").unwrap();
        let mut entry = Entry::new();
        let mut set = BTreeSet::new();
        set.insert("a".to_string());
        entry.insert("tags".to_string(), AttributeValue::Ss(set));
        let mut remove = BTreeSet::new();
        remove.insert("a".to_string());
        remove.insert("b".to_string());
        let env = env_with_value(":rm", AttributeValue::Ss(remove));
        apply_update(&update, &mut entry, &env).unwrap();
        assert_eq!(entry.get("tags"), Some(&AttributeValue::Ss(BTreeSet::new())));
    }
}
