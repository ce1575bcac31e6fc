//! Tokenizer for acceptability expressions.
//!
//! Literals are folded while lexing: `80%` is the number 80, `1:1.5` is
//! the ratio 1.5 (test lines per code line), and `1m30s` is a duration of
//! 90 seconds.

use std::iter::Peekable;
use std::str::CharIndices;

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    /// Seconds.
    Duration(f64),
    Ident(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source.
    pub pos: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

fn syntax(pos: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        pos,
        message: message.into(),
    }
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, ExpressionError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((pos, c)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '-' => TokenKind::Minus,
            '=' => {
                self.expect('=', pos, "expected '=='")?;
                TokenKind::Eq
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                self.expect('&', pos, "expected '&&'")?;
                TokenKind::And
            }
            '|' => {
                self.expect('|', pos, "expected '||'")?;
                TokenKind::Or
            }
            c if c.is_ascii_digit() => self.literal(pos)?,
            c if c.is_alphabetic() || c == '_' => {
                let end = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                TokenKind::Ident(self.src[pos..end].to_string())
            }
            other => return Err(syntax(pos, format!("unexpected character '{other}'"))),
        };
        Ok(Some(Token { kind, pos }))
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn expect(&mut self, expected: char, pos: usize, message: &str) -> Result<(), ExpressionError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(syntax(pos, message))
        }
    }

    /// Consume while `pred` holds; returns the end offset.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        self.offset()
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Number whose first digit (at `start`) was already consumed.
    fn number(&mut self, start: usize) -> Result<f64, ExpressionError> {
        let end = self.take_while(|c| c.is_ascii_digit() || c == '.');
        let text = &self.src[start..end];
        text.parse::<f64>()
            .map_err(|_| syntax(start, format!("invalid number '{text}'")))
    }

    fn literal(&mut self, start: usize) -> Result<TokenKind, ExpressionError> {
        let value = self.number(start)?;
        match self.peek_char() {
            Some('%') => {
                self.chars.next();
                Ok(TokenKind::Number(value))
            }
            Some(':') => {
                self.chars.next();
                let test_start = match self.chars.next() {
                    Some((i, c)) if c.is_ascii_digit() => i,
                    _ => return Err(syntax(start, "expected test part of ratio after ':'")),
                };
                let test = self.number(test_start)?;
                if value == 0.0 {
                    return Err(syntax(start, "code part of a ratio must not be zero"));
                }
                Ok(TokenKind::Number(test / value))
            }
            Some(c) if c.is_alphabetic() => self.duration(start, value),
            _ => Ok(TokenKind::Number(value)),
        }
    }

    /// `<n><unit>[<n><unit>...]`, the first number already parsed.
    fn duration(&mut self, start: usize, first: f64) -> Result<TokenKind, ExpressionError> {
        let mut nanos = 0.0;
        let mut value = first;
        loop {
            let unit_start = self.offset();
            let unit_end = self.take_while(char::is_alphabetic);
            let unit = &self.src[unit_start..unit_end];
            let factor = unit_nanos(unit)
                .ok_or_else(|| syntax(unit_start, format!("unknown duration unit '{unit}'")))?;
            nanos += value * factor;

            match self.chars.peek() {
                Some(&(i, c)) if c.is_ascii_digit() => {
                    self.chars.next();
                    value = self.number(i)?;
                    if !self.peek_char().is_some_and(char::is_alphabetic) {
                        return Err(syntax(start, "duration component without unit"));
                    }
                }
                _ => return Ok(TokenKind::Duration(nanos / 1e9)),
            }
        }
    }
}

fn unit_nanos(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1.0),
        "us" | "µs" => Some(1e3),
        "ms" => Some(1e6),
        "s" | "sec" => Some(1e9),
        "m" | "min" => Some(60e9),
        "h" => Some(3600e9),
        _ => None,
    }
}
