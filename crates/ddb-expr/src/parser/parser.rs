//! Recursive-descent parser with four entrypoints: key-condition,
//! condition/filter, update, and projection. All share the operand grammar.

use crate::ast::{
    CmpOp, Condition, InfixOp, KeyConditionExpr, KeyPredicate, Name, Operand, Path, PathSegment,
    Projection, SetAction, SetValue, UpdateExpr,
};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

use super::pratt;
use super::ParseError;

/// A parser over one of the four expression dialects.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Tokenizes `input` and prepares a parser over it.
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::tokenize(input)?;
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn span(&self) -> crate::lexer::Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(ParseError::unexpected("end of expression", self.span()))
        }
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(what, self.span()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.advance() {
            TokenKind::Identifier(s) => Ok(s),
            _ => Err(ParseError::unexpected(what, self.span())),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, what: &str) -> Result<(), ParseError> {
        if *self.peek() == TokenKind::Keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(what, self.span()))
        }
    }

    // ---- operand syntax, shared by all dialects ----

    /// `name` | `#name`
    fn parse_name(&mut self) -> Result<Name, ParseError> {
        match self.peek().clone() {
            TokenKind::Hash => {
                self.advance();
                let id = self.expect_identifier("an identifier after '#'")?;
                Ok(Name::Placeholder(id))
            }
            TokenKind::Identifier(_) => {
                let TokenKind::Identifier(id) = self.advance() else {
                    unreachable!()
                };
                Ok(Name::Literal(id))
            }
            _ => Err(ParseError::unexpected("an attribute name", self.span())),
        }
    }

    /// `name (.name | [int])*`
    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let root = self.parse_name()?;
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    segments.push(PathSegment::Field(self.parse_name()?));
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let idx = match self.advance() {
                        TokenKind::Integer(n) => n,
                        _ => return Err(ParseError::unexpected("an integer index", self.span())),
                    };
                    self.expect(&TokenKind::RightBracket, "']'")?;
                    segments.push(PathSegment::Index(idx));
                }
                _ => break,
            }
        }
        Ok(Path { root, segments })
    }

    /// `:name`
    fn parse_value_ref(&mut self) -> Result<String, ParseError> {
        self.expect(&TokenKind::Colon, "':'")?;
        self.expect_identifier("an identifier after ':'")
    }

    /// A general operand: `:value`, `size(path)`, or a path.
    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek() {
            TokenKind::Colon => Ok(Operand::Value(self.parse_value_ref()?)),
            TokenKind::Keyword(Keyword::Size) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after size")?;
                let path = self.parse_path()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Operand::Size(path))
            }
            _ => Ok(Operand::Path(self.parse_path()?)),
        }
    }

    // ---- key-condition entrypoint ----

    /// Parses a `KeyConditionExpression`.
    pub fn parse_key_condition(input: &str) -> Result<KeyConditionExpr, ParseError> {
        let mut parser = Self::new(input)?;
        let first = parser.parse_key_predicate()?;
        let mut predicates = vec![first];
        if *parser.peek() == TokenKind::Keyword(Keyword::And) {
            parser.advance();
            predicates.push(parser.parse_key_predicate()?);
        }
        parser.expect_eof()?;
        Ok(KeyConditionExpr { predicates })
    }

    fn parse_key_predicate(&mut self) -> Result<KeyPredicate, ParseError> {
        if *self.peek() == TokenKind::Keyword(Keyword::BeginsWith) {
            self.advance();
            self.expect(&TokenKind::LeftParen, "'(' after begins_with")?;
            let name = self.parse_name()?;
            self.expect(&TokenKind::Comma, "','")?;
            let value = self.parse_value_ref()?;
            self.expect(&TokenKind::RightParen, "')'")?;
            return Ok(KeyPredicate::BeginsWith(name, value));
        }

        let name = self.parse_name()?;
        if *self.peek() == TokenKind::Keyword(Keyword::Between) {
            self.advance();
            let lo = self.parse_value_ref()?;
            self.expect_keyword(Keyword::And, "'AND' in BETWEEN")?;
            let hi = self.parse_value_ref()?;
            return Ok(KeyPredicate::Between(name, lo, hi));
        }

        match self.advance() {
            TokenKind::Eq => Ok(KeyPredicate::Eq(name, self.parse_value_ref()?)),
            TokenKind::Lt => Ok(KeyPredicate::Lt(name, self.parse_value_ref()?)),
            TokenKind::LtEq => Ok(KeyPredicate::LtEq(name, self.parse_value_ref()?)),
            TokenKind::Gt => Ok(KeyPredicate::Gt(name, self.parse_value_ref()?)),
            TokenKind::GtEq => Ok(KeyPredicate::GtEq(name, self.parse_value_ref()?)),
            _ => Err(ParseError::unexpected(
                "a comparator or BETWEEN",
                self.span(),
            )),
        }
    }

    // ---- condition/filter entrypoint ----

    /// Parses a `ConditionExpression` or `FilterExpression`.
    pub fn parse_condition(input: &str) -> Result<Condition, ParseError> {
        let mut parser = Self::new(input)?;
        let cond = parser.parse_condition_bp(0)?;
        parser.expect_eof()?;
        Ok(cond)
    }

    fn parse_condition_bp(&mut self, min_bp: u8) -> Result<Condition, ParseError> {
        let mut lhs = if let Some(bp) = pratt::prefix_binding_power(self.peek()) {
            self.advance();
            let rhs = self.parse_condition_bp(bp)?;
            Condition::Not(Box::new(rhs))
        } else {
            self.parse_condition_primary()?
        };

        loop {
            let Some((l_bp, r_bp)) = pratt::infix_binding_power(self.peek()) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let is_and = *self.peek() == TokenKind::Keyword(Keyword::And);
            self.advance();
            let rhs = self.parse_condition_bp(r_bp)?;
            lhs = if is_and {
                Condition::And(Box::new(lhs), Box::new(rhs))
            } else {
                Condition::Or(Box::new(lhs), Box::new(rhs))
            };
        }

        Ok(lhs)
    }

    fn parse_condition_primary(&mut self) -> Result<Condition, ParseError> {
        match self.peek().clone() {
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_condition_bp(0)?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Keyword(Keyword::AttributeExists) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after attribute_exists")?;
                let path = self.parse_path()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Condition::AttributeExists(path))
            }
            TokenKind::Keyword(Keyword::AttributeNotExists) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after attribute_not_exists")?;
                let path = self.parse_path()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Condition::AttributeNotExists(path))
            }
            TokenKind::Keyword(Keyword::AttributeType) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after attribute_type")?;
                let path = self.parse_path()?;
                self.expect(&TokenKind::Comma, "','")?;
                let ty = self.parse_operand()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Condition::AttributeType(path, ty))
            }
            TokenKind::Keyword(Keyword::BeginsWith) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after begins_with")?;
                let s = self.parse_operand()?;
                self.expect(&TokenKind::Comma, "','")?;
                let prefix = self.parse_operand()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Condition::BeginsWith(s, prefix))
            }
            TokenKind::Keyword(Keyword::Contains) => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after contains")?;
                let col = self.parse_operand()?;
                self.expect(&TokenKind::Comma, "','")?;
                let item = self.parse_operand()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Condition::Contains(col, item))
            }
            _ => self.parse_condition_comparison(),
        }
    }

    fn parse_condition_comparison(&mut self) -> Result<Condition, ParseError> {
        let lhs = self.parse_operand()?;

        if *self.peek() == TokenKind::Keyword(Keyword::Between) {
            self.advance();
            let lo = self.parse_operand()?;
            self.expect_keyword(Keyword::And, "'AND' in BETWEEN")?;
            let hi = self.parse_operand()?;
            return Ok(Condition::Between(lhs, lo, hi));
        }

        if *self.peek() == TokenKind::Keyword(Keyword::In) {
            self.advance();
            self.expect(&TokenKind::LeftParen, "'(' after IN")?;
            let mut values = vec![self.parse_operand()?];
            while *self.peek() == TokenKind::Comma {
                self.advance();
                values.push(self.parse_operand()?);
            }
            self.expect(&TokenKind::RightParen, "')'")?;
            return Ok(Condition::In(lhs, values));
        }

        let op = match self.advance() {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::LtEq,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::GtEq,
            _ => {
                return Err(ParseError::unexpected(
                    "a comparator, BETWEEN, or IN",
                    self.span(),
                ));
            }
        };
        let rhs = self.parse_operand()?;
        Ok(Condition::Cmp(lhs, op, rhs))
    }

    // ---- update entrypoint ----

    /// Parses an `UpdateExpression`.
    pub fn parse_update(input: &str) -> Result<UpdateExpr, ParseError> {
        let mut parser = Self::new(input)?;
        let mut expr = UpdateExpr::default();
        let mut seen = std::collections::HashSet::new();

        loop {
            let section = match parser.peek().clone() {
                TokenKind::Keyword(Keyword::Set) => "SET",
                TokenKind::Keyword(Keyword::Remove) => "REMOVE",
                TokenKind::Keyword(Keyword::Add) => "ADD",
                TokenKind::Keyword(Keyword::Delete) => "DELETE",
                TokenKind::Eof if expr.is_empty() && seen.is_empty() => {
                    return Err(ParseError::unexpected(
                        "SET, REMOVE, ADD, or DELETE",
                        parser.span(),
                    ));
                }
                TokenKind::Eof => break,
                _ => {
                    return Err(ParseError::unexpected(
                        "SET, REMOVE, ADD, or DELETE",
                        parser.span(),
                    ));
                }
            };
            if !seen.insert(section) {
                return Err(ParseError::new(
                    format!("UpdateExpression may contain at most one {section} section"),
                    parser.span(),
                ));
            }
            parser.advance();
            match section {
                "SET" => expr.set = parser.parse_set_actions()?,
                "REMOVE" => expr.remove = parser.parse_remove_paths()?,
                "ADD" => expr.add = parser.parse_add_actions()?,
                _ => expr.delete = parser.parse_delete_actions()?,
            }
        }

        Ok(expr)
    }

    fn parse_set_actions(&mut self) -> Result<Vec<SetAction>, ParseError> {
        let mut actions = vec![self.parse_set_action()?];
        while *self.peek() == TokenKind::Comma {
            self.advance();
            actions.push(self.parse_set_action()?);
        }
        Ok(actions)
    }

    fn parse_set_action(&mut self) -> Result<SetAction, ParseError> {
        let path = self.parse_path()?;
        self.expect(&TokenKind::Eq, "'=' in SET action")?;
        let value = self.parse_set_value()?;
        Ok(SetAction { path, value })
    }

    fn parse_set_value(&mut self) -> Result<SetValue, ParseError> {
        if *self.peek() == TokenKind::Keyword(Keyword::IfNotExists) {
            self.advance();
            self.expect(&TokenKind::LeftParen, "'(' after if_not_exists")?;
            let path = self.parse_path()?;
            self.expect(&TokenKind::Comma, "','")?;
            let value = self.parse_set_value()?;
            self.expect(&TokenKind::RightParen, "')'")?;
            return Ok(SetValue::IfNotExists(path, Box::new(value)));
        }
        if *self.peek() == TokenKind::Keyword(Keyword::ListAppend) {
            self.advance();
            self.expect(&TokenKind::LeftParen, "'(' after list_append")?;
            let a = self.parse_path()?;
            self.expect(&TokenKind::Comma, "','")?;
            let b = self.parse_path()?;
            self.expect(&TokenKind::RightParen, "')'")?;
            return Ok(SetValue::ListAppend(a, b));
        }

        let lhs = self.parse_operand()?;
        let op = match self.peek() {
            TokenKind::Plus => Some(InfixOp::Add),
            TokenKind::Minus => Some(InfixOp::Sub),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let rhs = self.parse_operand()?;
                Ok(SetValue::Infix(lhs, op, rhs))
            }
            None => Ok(SetValue::Operand(lhs)),
        }
    }

    fn parse_remove_paths(&mut self) -> Result<Vec<Path>, ParseError> {
        let mut paths = vec![self.parse_path()?];
        while *self.peek() == TokenKind::Comma {
            self.advance();
            paths.push(self.parse_path()?);
        }
        Ok(paths)
    }

    fn parse_add_actions(&mut self) -> Result<Vec<(Name, Operand)>, ParseError> {
        let mut actions = vec![self.parse_add_action()?];
        while *self.peek() == TokenKind::Comma {
            self.advance();
            actions.push(self.parse_add_action()?);
        }
        Ok(actions)
    }

    fn parse_add_action(&mut self) -> Result<(Name, Operand), ParseError> {
        let name = self.parse_name()?;
        let operand = self.parse_operand()?;
        Ok((name, operand))
    }

    fn parse_delete_actions(&mut self) -> Result<Vec<(Name, String)>, ParseError> {
        let mut actions = vec![self.parse_delete_action()?];
        while *self.peek() == TokenKind::Comma {
            self.advance();
            actions.push(self.parse_delete_action()?);
        }
        Ok(actions)
    }

    fn parse_delete_action(&mut self) -> Result<(Name, String), ParseError> {
        let name = self.parse_name()?;
        let value = self.parse_value_ref()?;
        Ok((name, value))
    }

    // ---- projection entrypoint ----

    /// Parses a `ProjectionExpression`.
    pub fn parse_projection(input: &str) -> Result<Projection, ParseError> {
        let mut parser = Self::new(input)?;
        let mut paths = vec![parser.parse_path()?];
        while *parser.peek() == TokenKind::Comma {
            parser.advance();
            paths.push(parser.parse_path()?);
        }
        parser.expect_eof()?;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_condition_eq_and_begins_with() {
        let kc = Parser::parse_key_condition("#y = :year AND begins_with(#t, :prefix)").unwrap();
        assert_eq!(kc.predicates.len(), 2);
    }

    #[test]
    fn key_condition_rejects_third_predicate() {
        let err = Parser::parse_key_condition("a = :x AND b = :y AND c = :z");
        assert!(err.is_err());
    }

    #[test]
    fn condition_precedence_matches_canonical_form() {
        let cond = Parser::parse_condition("a = :v1 AND b = :v2 OR c = :v3").unwrap();
        assert_eq!(
            cond.to_string(),
            "((a = :v1 AND b = :v2) OR c = :v3)"
        );
    }

    #[test]
    fn parenthesized_overrides_precedence() {
        let cond = Parser::parse_condition("a = :v1 AND (b = :v2 OR c = :v3)").unwrap();
        assert_eq!(cond.to_string(), "(a = :v1 AND (b = :v2 OR c = :v3))");
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let cond = Parser::parse_condition("NOT a = :v1 AND b = :v2").unwrap();
        assert_eq!(cond.to_string(), "((NOT a = :v1) AND b = :v2)");
    }

    #[test]
    fn update_rejects_duplicate_section() {
        let err = Parser::parse_update("SET a = :v SET b = :w");
        assert!(err.is_err());
    }

    #[test]
    fn update_parses_all_four_sections() {
        let expr =
            Parser::parse_update("SET a = :v REMOVE b ADD c :n DELETE d :s").unwrap();
        assert_eq!(expr.set.len(), 1);
        assert_eq!(expr.remove.len(), 1);
        assert_eq!(expr.add.len(), 1);
        assert_eq!(expr.delete.len(), 1);
    }

    #[test]
    fn set_infix_and_functions() {
        let expr = Parser::parse_update(
            "SET price = price - :d, tags = list_append(tags, :more), missing = if_not_exists(missing, :def)",
        )
        .unwrap();
        assert_eq!(expr.set.len(), 3);
        assert!(matches!(expr.set[0].value, SetValue::Infix(_, InfixOp::Sub, _)));
        assert!(matches!(expr.set[1].value, SetValue::ListAppend(_, _)));
        assert!(matches!(expr.set[2].value, SetValue::IfNotExists(_, _)));
    }

    #[test]
    fn projection_list() {
        let proj = Parser::parse_projection("a, b.c, d[0]").unwrap();
        assert_eq!(proj.len(), 3);
    }
}
