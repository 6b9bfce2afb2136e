//! Parser error type, shared by all four expression dialects.

use std::fmt;

use crate::lexer::Span;

/// A parse error: malformed expression syntax, surfaced to callers as
/// `ValidationException`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable message naming the expected construct.
    pub message: String,
    /// Where in the source the error was detected.
    pub span: Span,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Creates an "unexpected token" error naming what was expected.
    pub fn unexpected(expected: impl Into<String>, span: Span) -> Self {
        Self::new(format!("expected {}", expected.into()), span)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at position {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}
