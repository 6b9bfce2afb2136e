//! Tokenizer shared by the key-condition, condition, update, and projection
//! parsers.

use super::{Keyword, Span, Token, TokenKind};
use crate::parser::ParseError;

/// A lexer that tokenizes expression-dialect input.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        if let Some(keyword) = Keyword::from_ident(text) {
            self.make_token(TokenKind::Keyword(keyword))
        } else {
            self.make_token(TokenKind::Identifier(text.to_string()))
        }
    }

    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        match text.parse::<i64>() {
            Ok(n) => self.make_token(TokenKind::Integer(n)),
            Err(_) => self.make_token(TokenKind::Integer(0)),
        }
    }

    fn scan_string(&mut self) -> Result<Token, ParseError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => value.push(other),
                    None => {
                        return Err(ParseError::new(
                            "unterminated string literal",
                            self.make_span(),
                        ));
                    }
                },
                Some(c) => value.push(c),
                None => {
                    return Err(ParseError::new(
                        "unterminated string literal",
                        self.make_span(),
                    ));
                }
            }
        }
        Ok(self.make_token(TokenKind::String(value)))
    }

    /// Produces the next token, advancing the input position.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        if c.is_ascii_digit() {
            return Ok(self.scan_number());
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }
        if c == '"' {
            return self.scan_string();
        }

        self.advance();
        let token = match c {
            '=' => self.make_token(TokenKind::Eq),
            '<' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                } else if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::LtEq)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::GtEq)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '[' => self.make_token(TokenKind::LeftBracket),
            ']' => self.make_token(TokenKind::RightBracket),
            ',' => self.make_token(TokenKind::Comma),
            '.' => self.make_token(TokenKind::Dot),
            ':' => self.make_token(TokenKind::Colon),
            '#' => self.make_token(TokenKind::Hash),
            '+' => self.make_token(TokenKind::Plus),
            '-' => self.make_token(TokenKind::Minus),
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{other}'"),
                    self.make_span(),
                ));
            }
        };
        let _ = self.peek_next();
        Ok(token)
    }

    /// Tokenizes the entire input, including a trailing EOF token.
    pub fn tokenize(input: &'a str) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Self::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_key_condition() {
        let k = kinds("#y = :year AND begins_with(#t, :prefix)");
        assert_eq!(
            k,
            vec![
                TokenKind::Hash,
                TokenKind::Identifier("y".into()),
                TokenKind::Eq,
                TokenKind::Colon,
                TokenKind::Identifier("year".into()),
                TokenKind::Keyword(Keyword::And),
                TokenKind::Keyword(Keyword::BeginsWith),
                TokenKind::LeftParen,
                TokenKind::Hash,
                TokenKind::Identifier("t".into()),
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Identifier("prefix".into()),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive_identifiers_otherwise() {
        let k = kinds("and OR Not");
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier("and".into()),
                TokenKind::Keyword(Keyword::Or),
                TokenKind::Identifier("Not".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_literal_with_escape() {
        let k = kinds(r#""a\"b""#);
        assert_eq!(k, vec![TokenKind::String("a\"b".into()), TokenKind::Eof]);
    }

    #[test]
    fn path_with_index() {
        let k = kinds("a.b[3]");
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Dot,
                TokenKind::Identifier("b".into()),
                TokenKind::LeftBracket,
                TokenKind::Integer(3),
                TokenKind::RightBracket,
                TokenKind::Eof,
            ]
        );
    }
}
