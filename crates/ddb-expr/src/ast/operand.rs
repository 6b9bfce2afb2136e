//! Operand syntax shared by all four expression dialects: attribute names,
//! substitutions, dotted/indexed paths, and the `size(...)` wrapper.

use std::fmt;

/// A single name component, either written literally or via a `#name`
/// substitution that the evaluator resolves against
/// `ExpressionAttributeNames`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Name {
    /// A literal attribute name, e.g. `year`.
    Literal(String),
    /// A `#placeholder` naming an entry in `ExpressionAttributeNames`.
    Placeholder(String),
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Placeholder(s) => write!(f, "#{s}"),
        }
    }
}

/// One step in a path after its root: either a `.field` or a `[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `.field`
    Field(Name),
    /// `[index]`
    Index(i64),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A path operand: a root name plus zero or more dot/index steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// The first component of the path.
    pub root: Name,
    /// Dot-composition and index-access steps following the root.
    pub segments: Vec<PathSegment>,
}

impl Path {
    /// Creates a bare single-segment path from a root name.
    #[must_use]
    pub fn new(root: Name) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for seg in &self.segments {
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

/// A fully general operand: a path, a `:value` reference, or `size(path)`.
/// Non-path operands (`size(...)` and `:value`) may only appear where a
/// value is accepted, never as the target of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A path operand (attribute, possibly dotted/indexed).
    Path(Path),
    /// A `:name` reference into `ExpressionAttributeValues`.
    Value(String),
    /// `size(path)`.
    Size(Path),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{p}"),
            Self::Value(v) => write!(f, ":{v}"),
            Self::Size(p) => write!(f, "size({p})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display_round_trips() {
        let path = Path {
            root: Name::Placeholder("a".into()),
            segments: vec![
                PathSegment::Field(Name::Literal("b".into())),
                PathSegment::Index(2),
            ],
        };
        assert_eq!(path.to_string(), "#a.b[2]");
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::Value("v".into()).to_string(), ":v");
        assert_eq!(
            Operand::Size(Path::new(Name::Literal("x".into()))).to_string(),
            "size(x)"
        );
    }
}
