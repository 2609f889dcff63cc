use std::iter::Peekable;
use std::str::CharIndices;

use crate::errors::{EasyOgrError, Result};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Integer(i64),
    Real(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    In,
    Is,
    Null,
    True,
    False,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "is" => Token::Is,
        "none" | "null" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        _ => return None,
    };
    Some(token)
}

fn error(text: &str, pos: usize, msg: &str) -> EasyOgrError {
    EasyOgrError::Query(format!("{msg} at offset {pos} in '{text}'"))
}

struct Lexer<'t> {
    text: &'t str,
    chars: Peekable<CharIndices<'t>>,
}

impl<'t> Lexer<'t> {
    fn next_if(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn number(&mut self, start: usize) -> Result<Token> {
        let mut end = start;
        let mut is_real = false;
        while let Some(&(pos, c)) = self.chars.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(self.text[start..pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || exponent_sign {
                end = pos + 1;
            } else if c == '.' || c == 'e' || c == 'E' {
                is_real = true;
                end = pos + 1;
            } else {
                break;
            }
            self.chars.next();
        }
        let literal = &self.text[start..end];
        if is_real {
            literal
                .parse::<f64>()
                .map(Token::Real)
                .map_err(|_| error(self.text, start, "malformed number"))
        } else {
            literal
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| error(self.text, start, "integer out of range"))
        }
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token> {
        let mut value = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        break;
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote => return Ok(Token::Str(value)),
                c => value.push(c),
            }
        }
        Err(error(self.text, start, "unterminated string"))
    }

    fn quoted_identifier(&mut self, start: usize) -> Result<Token> {
        let mut name = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == '`' {
                return Ok(Token::Ident(name));
            }
            name.push(c);
        }
        Err(error(self.text, start, "unterminated identifier"))
    }

    fn word(&mut self, start: usize) -> Token {
        let mut end = start;
        while let Some((pos, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_')
        {
            end = pos + c.len_utf8();
        }
        let word = &self.text[start..end];
        keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()))
    }
}

/// Splits a clause into tokens.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        text,
        chars: text.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    while let Some(&(pos, c)) = lexer.chars.peek() {
        if c.is_whitespace() {
            lexer.chars.next();
            continue;
        }
        if c.is_ascii_digit()
            || (c == '.' && text[pos + 1..].starts_with(|n: char| n.is_ascii_digit()))
        {
            tokens.push(lexer.number(pos)?);
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            tokens.push(lexer.word(pos));
            continue;
        }
        lexer.chars.next();
        let token = match c {
            '\'' | '"' => lexer.string(pos, c)?,
            '`' => lexer.quoted_identifier(pos)?,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' => {
                lexer.next_if('=');
                Token::Eq
            }
            '!' if lexer.next_if('=') => Token::Ne,
            '<' if lexer.next_if('=') => Token::Le,
            '<' if lexer.next_if('>') => Token::Ne,
            '<' => Token::Lt,
            '>' if lexer.next_if('=') => Token::Ge,
            '>' => Token::Gt,
            other => return Err(error(text, pos, &format!("unexpected character '{other}'"))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}
