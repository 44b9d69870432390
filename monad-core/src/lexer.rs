//! Position-tracked lexer for the Monad reader.
//!
//! The lexer walks the source byte buffer keeping a 1-based line and
//! column. Numeric tokens carry the exact source slice (so `0xFF` stays
//! distinguishable from `255` downstream); string and char tokens carry
//! their escape-decoded payload.

use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// `->`, distinct from a `-` symbol.
    Arrow,
    /// The `'` quote prefix (when not introducing a char literal).
    Quote,
    Symbol(String),
    /// A numeric literal; the payload is the original source slice.
    Number(String),
    /// A string literal, escape-decoded.
    Str(String),
    /// A char literal, escape-decoded.
    Char(u8),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn is_symbol_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'-' | b'+' | b'*' | b'/' | b'<' | b'>' | b'=' | b'!' | b'?' | b'_' | b':'
        )
}

/// Decode one escape-sequence byte (the byte after `\`).
fn decode_escape(c: u8) -> u8 {
    match c {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'\\' => b'\\',
        b'\'' => b'\'',
        b'"' => b'"',
        b'0' => 0,
        other => other,
    }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> u8 {
        self.src.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_ahead(&self, offset: usize) -> u8 {
        self.src.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        if c != 0 {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), b' ' | b'\t' | b'\n' | b'\r') {
                self.advance();
            }
            if self.peek() == b';' {
                while self.peek() != b'\n' && self.peek() != 0 {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    /// Span from a recorded token start to the byte just consumed.
    fn span_from(&self, line: u32, column: u32) -> Span {
        if self.line == line && self.column > column {
            Span::new(line, column, self.column - 1)
        } else {
            Span::new(line, column, column)
        }
    }

    fn err(&self, message: impl Into<String>, span: Span) -> CoreError {
        CoreError::from_diagnostic(Diagnostic::error(message, span))
    }

    fn lexeme(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    pub fn next_token(&mut self) -> Result<Token, CoreError> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let c = self.peek();

        if c == 0 {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::point(line, column),
            });
        }

        let simple = match c {
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            _ => None,
        };
        if let Some(kind) = simple {
            self.advance();
            return Ok(Token {
                kind,
                span: self.span_from(line, column),
            });
        }

        if c == b'-' && self.peek_ahead(1) == b'>' {
            self.advance();
            self.advance();
            return Ok(Token {
                kind: TokenKind::Arrow,
                span: self.span_from(line, column),
            });
        }

        if c == b'\'' {
            return self.char_or_quote(line, column);
        }

        if c == b'"' {
            return self.string(line, column);
        }

        if c == b'0' && matches!(self.peek_ahead(1), b'x' | b'X') {
            return self.prefixed_number(line, column, is_hex_digit);
        }
        if c == b'0' && matches!(self.peek_ahead(1), b'b' | b'B') {
            return self.prefixed_number(line, column, |d| d == b'0' || d == b'1');
        }
        if c == b'0' && matches!(self.peek_ahead(1), b'o' | b'O') {
            return self.prefixed_number(line, column, |d| (b'0'..=b'7').contains(&d));
        }

        if is_digit(c) || (c == b'-' && is_digit(self.peek_ahead(1))) {
            return self.decimal_number(line, column);
        }

        if is_symbol_char(c) {
            let start = self.pos;
            while is_symbol_char(self.peek()) {
                self.advance();
            }
            return Ok(Token {
                kind: TokenKind::Symbol(self.lexeme(start)),
                span: self.span_from(line, column),
            });
        }

        Err(self.err(
            format!("unexpected character '{}'", c as char),
            Span::point(line, column),
        ))
    }

    /// Disambiguate `'x'` / `'\n'` char literals from the quote prefix
    /// by looking for the closing tick two or three bytes ahead.
    fn char_or_quote(&mut self, line: u32, column: u32) -> Result<Token, CoreError> {
        let next = self.peek_ahead(1);

        if next == b'\\' {
            if self.peek_ahead(3) == b'\'' {
                self.advance(); // opening '
                self.advance(); // backslash
                let value = decode_escape(self.advance());
                if self.peek() != b'\'' {
                    return Err(self.err(
                        "unterminated character literal",
                        Span::point(self.line, self.column),
                    ));
                }
                self.advance(); // closing '
                return Ok(Token {
                    kind: TokenKind::Char(value),
                    span: self.span_from(line, column),
                });
            }
        } else if next != b'\'' && next != 0 && self.peek_ahead(2) == b'\'' {
            self.advance(); // opening '
            let value = self.advance();
            self.advance(); // closing '
            return Ok(Token {
                kind: TokenKind::Char(value),
                span: self.span_from(line, column),
            });
        }

        self.advance();
        Ok(Token {
            kind: TokenKind::Quote,
            span: self.span_from(line, column),
        })
    }

    fn string(&mut self, line: u32, column: u32) -> Result<Token, CoreError> {
        self.advance(); // opening "
        let mut value = Vec::new();
        loop {
            match self.peek() {
                0 => {
                    return Err(self.err(
                        "unterminated string literal",
                        Span::point(line, column),
                    ));
                }
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    let c = self.peek();
                    if c == 0 {
                        return Err(self.err(
                            "unterminated string literal",
                            Span::point(line, column),
                        ));
                    }
                    value.push(decode_escape(self.advance()));
                }
                _ => {
                    value.push(self.advance());
                }
            }
        }
        Ok(Token {
            kind: TokenKind::Str(String::from_utf8_lossy(&value).into_owned()),
            span: self.span_from(line, column),
        })
    }

    /// A `0x`/`0b`/`0o` literal; the lexeme keeps the prefix.
    fn prefixed_number(
        &mut self,
        line: u32,
        column: u32,
        digit: impl Fn(u8) -> bool,
    ) -> Result<Token, CoreError> {
        let start = self.pos;
        self.advance(); // 0
        self.advance(); // x / b / o
        let mut digits = 0usize;
        while digit(self.peek()) {
            self.advance();
            digits += 1;
        }
        if digits == 0 {
            return Err(self.err(
                format!("malformed number literal '{}'", self.lexeme(start)),
                self.span_from(line, column),
            ));
        }
        Ok(Token {
            kind: TokenKind::Number(self.lexeme(start)),
            span: self.span_from(line, column),
        })
    }

    fn decimal_number(&mut self, line: u32, column: u32) -> Result<Token, CoreError> {
        let start = self.pos;
        if self.peek() == b'-' {
            self.advance();
        }
        let mut dots = 0usize;
        loop {
            let c = self.peek();
            if is_digit(c) {
                self.advance();
            } else if c == b'.' {
                dots += 1;
                self.advance();
            } else {
                break;
            }
        }
        let lexeme = self.lexeme(start);
        if dots > 1 {
            return Err(self.err(
                format!("malformed number literal '{}'", lexeme),
                self.span_from(line, column),
            ));
        }
        Ok(Token {
            kind: TokenKind::Number(lexeme),
            span: self.span_from(line, column),
        })
    }
}

/// Parse the numeric value of a lexeme produced by the lexer.
pub fn parse_number(lexeme: &str) -> Option<f64> {
    let bytes = lexeme.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        let radix = match bytes[1] {
            b'x' | b'X' => Some(16),
            b'b' | b'B' => Some(2),
            b'o' | b'O' => Some(8),
            _ => None,
        };
        if let Some(radix) = radix {
            return i64::from_str_radix(&lexeme[2..], radix)
                .ok()
                .map(|v| v as f64);
        }
    }
    lexeme.parse::<f64>().ok()
}
