//! Key-condition AST: the predicate grammar accepted by `Query`.

use std::fmt;

use super::operand::Name;

/// A single key predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// `attr = :v`
    Eq(Name, String),
    /// `attr < :v`
    Lt(Name, String),
    /// `attr <= :v`
    LtEq(Name, String),
    /// `attr > :v`
    Gt(Name, String),
    /// `attr >= :v`
    GtEq(Name, String),
    /// `attr BETWEEN :lo AND :hi`
    Between(Name, String, String),
    /// `begins_with(attr, :v)`
    BeginsWith(Name, String),
}

impl KeyPredicate {
    /// The attribute name this predicate constrains.
    #[must_use]
    pub const fn attr(&self) -> &Name {
        match self {
            Self::Eq(n, _)
            | Self::Lt(n, _)
            | Self::LtEq(n, _)
            | Self::Gt(n, _)
            | Self::GtEq(n, _)
            | Self::Between(n, _, _)
            | Self::BeginsWith(n, _) => n,
        }
    }

    /// True only for `=`, the sole comparator legal on the partition key.
    #[must_use]
    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::Eq(_, _))
    }
}

impl fmt::Display for KeyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(n, v) => write!(f, "{n} = :{v}"),
            Self::Lt(n, v) => write!(f, "{n} < :{v}"),
            Self::LtEq(n, v) => write!(f, "{n} <= :{v}"),
            Self::Gt(n, v) => write!(f, "{n} > :{v}"),
            Self::GtEq(n, v) => write!(f, "{n} >= :{v}"),
            Self::Between(n, lo, hi) => write!(f, "{n} BETWEEN :{lo} AND :{hi}"),
            Self::BeginsWith(n, v) => write!(f, "begins_with({n}, :{v})"),
        }
    }
}

/// A parsed key-condition expression: one or two predicates joined by `AND`.
///
/// The parser only enforces the predicate count (at most two); which
/// predicate addresses the partition key versus the sort key, and the
/// requirement that the partition-key predicate be an equality, is a
/// schema-dependent check performed when the expression is compiled
/// against a table (see `ddb-expr::eval`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConditionExpr {
    /// The predicates, in textual order (length 1 or 2).
    pub predicates: Vec<KeyPredicate>,
}

impl fmt::Display for KeyConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}
