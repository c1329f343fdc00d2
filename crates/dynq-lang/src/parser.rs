//! Recursive descent parser for condition and projection expressions.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::Span;

/// Parser over a tokenized expression.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end: usize,
}

impl Parser {
    /// Create a new parser for the given source.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            end: source.len(),
        })
    }

    /// Parse a complete condition expression.
    pub fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        let condition = self.parse_or()?;
        self.expect_end()?;
        Ok(condition)
    }

    /// Parse a comma-separated list of document paths.
    pub fn parse_projection(&mut self) -> Result<Vec<DocumentPath>, ParseError> {
        let mut paths = vec![self.parse_path()?];
        while self.eat(&Token::Comma) {
            paths.push(self.parse_path()?);
        }
        self.expect_end()?;
        Ok(paths)
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut children = vec![self.parse_and()?];
        while self.eat_keyword("OR") {
            children.push(self.parse_and()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Condition::Or(children)
        })
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut children = vec![self.parse_not()?];
        while self.eat_keyword("AND") {
            children.push(self.parse_not()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Condition::And(children)
        })
    }

    fn parse_not(&mut self) -> Result<Condition, ParseError> {
        if self.eat_keyword("NOT") {
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        if let Some(function) = self.peek_function_name() {
            self.advance();
            return self.parse_function(&function);
        }

        let operand = self.parse_operand()?;
        let tok = self.next_token()?;

        match &tok.token {
            Token::Eq => self.finish_compare(operand, Comparator::Eq),
            Token::Ne => self.finish_compare(operand, Comparator::Ne),
            Token::Lt => self.finish_compare(operand, Comparator::Lt),
            Token::Le => self.finish_compare(operand, Comparator::Le),
            Token::Gt => self.finish_compare(operand, Comparator::Gt),
            Token::Ge => self.finish_compare(operand, Comparator::Ge),
            t if t.is_keyword("BETWEEN") => {
                let low = self.parse_operand()?;
                self.expect_keyword("AND")?;
                let high = self.parse_operand()?;
                Ok(Condition::Between { operand, low, high })
            }
            t if t.is_keyword("IN") => {
                self.expect(Token::LParen)?;
                let mut list = vec![self.parse_operand()?];
                while self.eat(&Token::Comma) {
                    list.push(self.parse_operand()?);
                }
                self.expect(Token::RParen)?;
                Ok(Condition::In { operand, list })
            }
            other => Err(ParseError::new(
                format!("expected comparator, BETWEEN or IN, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn finish_compare(&mut self, left: Operand, op: Comparator) -> Result<Condition, ParseError> {
        let right = self.parse_operand()?;
        Ok(Condition::Compare { left, op, right })
    }

    fn peek_function_name(&self) -> Option<String> {
        let tok = self.tokens.get(self.pos)?;
        let next = self.tokens.get(self.pos + 1)?;
        match (&tok.token, &next.token) {
            (Token::Ident(name), Token::LParen) => {
                let lower = name.to_ascii_lowercase();
                match lower.as_str() {
                    "attribute_exists" | "attribute_not_exists" | "begins_with" | "contains" => {
                        Some(lower)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn parse_function(&mut self, name: &str) -> Result<Condition, ParseError> {
        self.expect(Token::LParen)?;
        let path = self.parse_path()?;

        let function = match name {
            "attribute_exists" => Function::AttributeExists(path),
            "attribute_not_exists" => Function::AttributeNotExists(path),
            _ => {
                self.expect(Token::Comma)?;
                let operand = self.parse_operand()?;
                if name == "begins_with" {
                    Function::BeginsWith(path, operand)
                } else {
                    Function::Contains(path, operand)
                }
            }
        };

        self.expect(Token::RParen)?;
        Ok(Condition::Function(function))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let tok = self.peek_token()?.clone();
        match tok.token {
            Token::ValuePlaceholder(value) => {
                self.advance();
                Ok(Operand::Value(value))
            }
            Token::Ident(ref name) if name.eq_ignore_ascii_case("size") => {
                self.advance();
                self.expect(Token::LParen)?;
                let path = self.parse_path()?;
                self.expect(Token::RParen)?;
                Ok(Operand::Size(path))
            }
            _ => Ok(Operand::Path(self.parse_path()?)),
        }
    }

    fn parse_path(&mut self) -> Result<DocumentPath, ParseError> {
        let mut elements = vec![self.parse_path_element()?];

        loop {
            if self.eat(&Token::Dot) {
                elements.push(self.parse_path_element()?);
            } else if self.eat(&Token::LBracket) {
                let tok = self.next_token()?;
                match tok.token {
                    Token::Index(index) => elements.push(PathElement::Index(index)),
                    other => {
                        return Err(ParseError::new(
                            format!("expected list index, found {:?}", other),
                            tok.span,
                        ))
                    }
                }
                self.expect(Token::RBracket)?;
            } else {
                break;
            }
        }

        Ok(DocumentPath::new(elements))
    }

    fn parse_path_element(&mut self) -> Result<PathElement, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::NamePlaceholder(name) => Ok(PathElement::Placeholder(name)),
            Token::Ident(name) if !is_reserved(&name) => Ok(PathElement::Attribute(name)),
            other => Err(ParseError::new(
                format!("expected attribute name, found {:?}", other),
                tok.span,
            )),
        }
    }

    // Token helpers

    fn peek_token(&self) -> Result<&SpannedToken, ParseError> {
        self.tokens
            .get(self.pos)
            .ok_or_else(|| ParseError::new("unexpected end of input", self.eof_span()))
    }

    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let tok = self.peek_token()?.clone();
        self.advance();
        Ok(tok)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, expected: &Token) -> bool {
        match self.tokens.get(self.pos) {
            Some(tok) if &tok.token == expected => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(tok) if tok.token.is_keyword(keyword) => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if tok.token == expected {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        let tok = self.next_token()?;
        if tok.token.is_keyword(keyword) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected {}, found {:?}", keyword, tok.token),
                tok.span,
            ))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(tok) => Err(ParseError::new(
                format!("unexpected trailing token {:?}", tok.token),
                tok.span,
            )),
        }
    }

    fn eof_span(&self) -> Span {
        Span::at(self.end)
    }
}

fn is_reserved(name: &str) -> bool {
    ["AND", "OR", "NOT", "IN", "BETWEEN"]
        .iter()
        .any(|kw| name.eq_ignore_ascii_case(kw))
}

/// Parse a condition (filter or key-condition) expression.
pub fn parse_condition(source: &str) -> Result<Condition, ParseError> {
    Parser::new(source)?.parse_condition()
}

/// Parse a projection expression.
pub fn parse_projection(source: &str) -> Result<Vec<DocumentPath>, ParseError> {
    Parser::new(source)?.parse_projection()
}
