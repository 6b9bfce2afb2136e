//! Lexer, AST, parser, evaluator, and attribute-value model for the four
//! expression dialects accepted by item operations: key-condition,
//! condition/filter, update, and projection.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::{
    compile_condition, compile_key_condition, compile_update, CompiledCondition, CompiledUpdate, Entry, Env,
    EvalError, KeySchema, Query, SortPredicate,
};
pub use lexer::{Keyword, Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use value::{AttributeValue, TypeTag, ValueError};
