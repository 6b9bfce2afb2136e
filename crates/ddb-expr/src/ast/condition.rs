//! Condition/filter AST: the full boolean expression tree shared by
//! `ConditionExpression` and `FilterExpression`.

use std::fmt;

use super::operand::{Operand, Path};

/// A comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        };
        write!(f, "{s}")
    }
}

/// A condition tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `left op right`
    Cmp(Operand, CmpOp, Operand),
    /// `operand BETWEEN low AND high`
    Between(Operand, Operand, Operand),
    /// `operand IN (values...)`
    In(Operand, Vec<Operand>),
    /// `attribute_exists(path)`
    AttributeExists(Path),
    /// `attribute_not_exists(path)`
    AttributeNotExists(Path),
    /// `attribute_type(path, type)`
    AttributeType(Path, Operand),
    /// `begins_with(operand, prefix)`
    BeginsWith(Operand, Operand),
    /// `contains(collection, item)`
    Contains(Operand, Operand),
    /// `left AND right`
    And(Box<Condition>, Box<Condition>),
    /// `left OR right`
    Or(Box<Condition>, Box<Condition>),
    /// `NOT cond`
    Not(Box<Condition>),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmp(l, op, r) => write!(f, "{l} {op} {r}"),
            Self::Between(op, lo, hi) => write!(f, "{op} BETWEEN {lo} AND {hi}"),
            Self::In(op, values) => {
                write!(f, "{op} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Self::AttributeExists(p) => write!(f, "attribute_exists({p})"),
            Self::AttributeNotExists(p) => write!(f, "attribute_not_exists({p})"),
            Self::AttributeType(p, t) => write!(f, "attribute_type({p}, {t})"),
            Self::BeginsWith(s, prefix) => write!(f, "begins_with({s}, {prefix})"),
            Self::Contains(col, item) => write!(f, "contains({col}, {item})"),
            Self::And(l, r) => write!(f, "({l} AND {r})"),
            Self::Or(l, r) => write!(f, "({l} OR {r})"),
            Self::Not(c) => write!(f, "(NOT {c})"),
        }
    }
}
