//! Update-expression AST: `SET`, `REMOVE`, `ADD`, and `DELETE` clauses.

use std::fmt;

use super::operand::{Name, Operand, Path};

/// The operator in an infix `SET` right-hand side (`a + b` or `a - b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if matches!(self, Self::Add) { "+" } else { "-" })
    }
}

/// The right-hand side of a `SET` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    /// A bare operand.
    Operand(Operand),
    /// `a + b` or `a - b`.
    Infix(Operand, InfixOp, Operand),
    /// `if_not_exists(path, value)`.
    IfNotExists(Path, Box<SetValue>),
    /// `list_append(a, b)`.
    ListAppend(Path, Path),
}

impl fmt::Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(o) => write!(f, "{o}"),
            Self::Infix(l, op, r) => write!(f, "{l} {op} {r}"),
            Self::IfNotExists(p, v) => write!(f, "if_not_exists({p}, {v})"),
            Self::ListAppend(a, b) => write!(f, "list_append({a}, {b})"),
        }
    }
}

/// A single `SET path = value` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAction {
    /// The path being assigned.
    pub path: Path,
    /// The value to assign.
    pub value: SetValue,
}

impl fmt::Display for SetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.path, self.value)
    }
}

/// A compiled update expression: every clause present, in the fixed
/// application order `SET, REMOVE, ADD, DELETE`. Each section may appear at
/// most once in the source text (enforced by the parser).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateExpr {
    /// `SET` actions, in textual order.
    pub set: Vec<SetAction>,
    /// `REMOVE` paths, in textual order.
    pub remove: Vec<Path>,
    /// `ADD` actions: top-level attribute name plus the operand to add.
    pub add: Vec<(Name, Operand)>,
    /// `DELETE` actions: top-level attribute name plus the `:value` set to
    /// remove members from.
    pub delete: Vec<(Name, String)>,
}

impl UpdateExpr {
    /// True if no clause was present at all — an empty `UpdateExpression`
    /// is a validation error, this is just a convenience for callers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.add.is_empty() && self.delete.is_empty()
    }
}

impl fmt::Display for UpdateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if !self.set.is_empty() {
            write!(f, "SET ")?;
            for (i, a) in self.set.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{a}")?;
            }
            wrote = true;
        }
        if !self.remove.is_empty() {
            if wrote {
                write!(f, " ")?;
            }
            write!(f, "REMOVE ")?;
            for (i, p) in self.remove.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{p}")?;
            }
            wrote = true;
        }
        if !self.add.is_empty() {
            if wrote {
                write!(f, " ")?;
            }
            write!(f, "ADD ")?;
            for (i, (n, op)) in self.add.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{n} {op}")?;
            }
            wrote = true;
        }
        if !self.delete.is_empty() {
            if wrote {
                write!(f, " ")?;
            }
            write!(f, "DELETE ")?;
            for (i, (n, v)) in self.delete.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{n} :{v}")?;
            }
        }
        Ok(())
    }
}
