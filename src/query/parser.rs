use std::iter::Peekable;
use std::vec::IntoIter;

use super::lexer::Token;
use super::{ArithOp, CmpOp, Expr};
use crate::errors::{EasyOgrError, Result};
use crate::value::FieldValue;

/// Recursive descent over a token stream, binding identifiers to field positions.
pub(crate) struct Parser<'f, S> {
    tokens: Peekable<IntoIter<Token>>,
    fields: &'f [S],
}

impl<'f, S: AsRef<str>> Parser<'f, S> {
    pub(crate) fn new(tokens: Vec<Token>, fields: &'f [S]) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            fields,
        }
    }

    /// Parses the whole stream as one expression.
    pub(crate) fn parse(mut self) -> Result<Expr> {
        let expr = self.or_expr()?;
        match self.tokens.next() {
            None => Ok(expr),
            Some(token) => Err(unexpected(Some(token))),
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        self.tokens.next_if_eq(expected).is_some()
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.tokens.next() {
            Some(token) if &token == expected => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.additive()?;
        match self.tokens.peek() {
            Some(Token::In) => {
                self.tokens.next();
                let items = self.list()?;
                return Ok(Expr::In {
                    value: Box::new(first),
                    items,
                    negated: false,
                });
            }
            Some(Token::Not) => {
                self.tokens.next();
                self.expect(&Token::In)?;
                let items = self.list()?;
                return Ok(Expr::In {
                    value: Box::new(first),
                    items,
                    negated: true,
                });
            }
            Some(Token::Is) => {
                self.tokens.next();
                let negated = self.eat(&Token::Not);
                self.expect(&Token::Null)?;
                return Ok(Expr::IsNull {
                    value: Box::new(first),
                    negated,
                });
            }
            _ => {}
        }

        let mut rest = Vec::new();
        while let Some(op) = self.tokens.peek().and_then(comparison_op) {
            self.tokens.next();
            rest.push((op, self.additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn list(&mut self) -> Result<Vec<Expr>> {
        let close = match self.tokens.next() {
            Some(Token::LParen) => Token::RParen,
            Some(Token::LBracket) => Token::RBracket,
            other => return Err(unexpected(other)),
        };
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.or_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(&close)?;
                return Ok(items);
            }
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.tokens.next();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Rem,
                _ => return Ok(left),
            };
            self.tokens.next();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let literal = match self.tokens.next() {
            Some(Token::Integer(v)) => FieldValue::Integer(v),
            Some(Token::Real(v)) => FieldValue::Real(v),
            Some(Token::Str(v)) => FieldValue::String(v),
            Some(Token::Null) => FieldValue::Null,
            Some(Token::True) => FieldValue::from(true),
            Some(Token::False) => FieldValue::from(false),
            Some(Token::Ident(name)) => return self.field(&name),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            other => return Err(unexpected(other)),
        };
        Ok(Expr::Literal(literal))
    }

    fn field(&self, name: &str) -> Result<Expr> {
        self.fields
            .iter()
            .position(|field| field.as_ref() == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|field| field.as_ref().eq_ignore_ascii_case(name))
            })
            .map(Expr::Field)
            .ok_or_else(|| {
                let known: Vec<&str> = self.fields.iter().map(AsRef::as_ref).collect();
                EasyOgrError::Query(format!("unknown field '{name}', expected one of {known:?}"))
            })
    }
}

fn comparison_op(token: &Token) -> Option<CmpOp> {
    let op = match token {
        Token::Eq => CmpOp::Eq,
        Token::Ne => CmpOp::Ne,
        Token::Lt => CmpOp::Lt,
        Token::Le => CmpOp::Le,
        Token::Gt => CmpOp::Gt,
        Token::Ge => CmpOp::Ge,
        _ => return None,
    };
    Some(op)
}

fn unexpected(token: Option<Token>) -> EasyOgrError {
    match token {
        Some(token) => EasyOgrError::Query(format!("unexpected token {token:?}")),
        None => EasyOgrError::Query("unexpected end of clause".to_string()),
    }
}
