//! Recursive-descent reader for Monad source.
//!
//! Two entry points: `parse_one` for a single expression (the REPL) and
//! `parse_all` for a whole file. Besides generic S-expressions the
//! grammar knows three special shapes:
//!
//! - `(lambda (sig…) docstring? body)` with a signature of bracket
//!   parameters and an optional `-> Ret` tail,
//! - `(define (name sig…) docstring? body)`, rewritten to
//!   `(define name (lambda …))`,
//! - `'expr`, rewritten to `(quote expr)`.
//!
//! A bare `->` outside a signature parses as the symbol `->`.

use crate::ast::{Ast, AstKind, Lambda, Param};
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::lexer::{parse_number, Lexer, Token, TokenKind};
use crate::span::Span;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Parser<'a>, CoreError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    fn bump(&mut self) -> Result<(), CoreError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn err(&self, message: impl Into<String>, span: Span) -> CoreError {
        CoreError::from_diagnostic(Diagnostic::error(message, span))
    }

    fn err_here(&self, message: impl Into<String>) -> CoreError {
        self.err(message, self.current.span)
    }

    pub fn at_eof(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    pub fn parse_expr(&mut self) -> Result<Ast, CoreError> {
        let token = self.current.clone();
        match token.kind {
            TokenKind::Number(lexeme) => {
                let value = parse_number(&lexeme).ok_or_else(|| {
                    self.err(format!("malformed number literal '{}'", lexeme), token.span)
                })?;
                self.bump()?;
                Ok(Ast::new(
                    AstKind::Number {
                        value,
                        literal: Some(lexeme),
                    },
                    token.span,
                ))
            }
            TokenKind::Symbol(name) => {
                self.bump()?;
                Ok(Ast::new(AstKind::Symbol(name), token.span))
            }
            TokenKind::Str(value) => {
                self.bump()?;
                Ok(Ast::new(AstKind::Str(value), token.span))
            }
            TokenKind::Char(value) => {
                self.bump()?;
                Ok(Ast::new(AstKind::Char(value), token.span))
            }
            TokenKind::LParen => self.parse_list(token.span),
            TokenKind::LBracket => self.parse_bracket_list(token.span),
            TokenKind::Quote => {
                self.bump()?;
                let quoted = self.parse_expr()?;
                let span = token.span.join(quoted.span);
                Ok(Ast::new(
                    AstKind::List(vec![Ast::symbol("quote", token.span), quoted]),
                    span,
                ))
            }
            // Outside a signature an arrow is just the symbol `->`.
            TokenKind::Arrow => {
                self.bump()?;
                Ok(Ast::symbol("->", token.span))
            }
            TokenKind::RParen => Err(self.err_here("unexpected ')'")),
            TokenKind::RBracket => Err(self.err_here("unexpected ']'")),
            TokenKind::Eof => Err(self.err_here("unexpected end of input")),
        }
    }

    fn parse_list(&mut self, open: Span) -> Result<Ast, CoreError> {
        self.bump()?; // (

        if let TokenKind::Symbol(head) = &self.current.kind {
            if head == "lambda" {
                let lambda_span = self.current.span;
                self.bump()?;
                return self.parse_lambda_tail(open, lambda_span);
            }
            if head == "define" {
                let define_span = self.current.span;
                self.bump()?;
                if self.current.kind == TokenKind::LParen {
                    return self.parse_short_define(open, define_span);
                }
                // Ordinary (define name-or-annotation value…): the head
                // is already consumed, collect the rest generically.
                let mut items = vec![Ast::symbol("define", define_span)];
                return self.finish_list(open, &mut items);
            }
        }

        let mut items = Vec::new();
        self.finish_list(open, &mut items)
    }

    fn finish_list(&mut self, open: Span, items: &mut Vec<Ast>) -> Result<Ast, CoreError> {
        while self.current.kind != TokenKind::RParen {
            if self.current.kind == TokenKind::Eof {
                return Err(self.err_here("expected ')'"));
            }
            items.push(self.parse_expr()?);
        }
        let close = self.current.span;
        self.bump()?; // )
        Ok(Ast::new(
            AstKind::List(std::mem::take(items)),
            open.join(close),
        ))
    }

    /// `(define (name sig…) docstring? body)` — rewritten to
    /// `(define name (lambda sig… docstring? body))`.
    fn parse_short_define(&mut self, open: Span, define_span: Span) -> Result<Ast, CoreError> {
        let sig_open = self.current.span;
        self.bump()?; // (

        let name = match &self.current.kind {
            TokenKind::Symbol(name) => {
                let name = name.clone();
                let span = self.current.span;
                self.bump()?;
                Ast::symbol(name, span)
            }
            _ => return Err(self.err_here("malformed function signature")),
        };

        let (params, return_type) = self.parse_signature()?;
        let (docstring, body) = self.parse_docstring_and_body()?;

        if self.current.kind != TokenKind::RParen {
            return Err(self.err_here("expected ')'"));
        }
        let close = self.current.span;
        self.bump()?;

        let lambda = Ast::new(
            AstKind::Lambda(Box::new(Lambda {
                params,
                return_type,
                docstring,
                body,
            })),
            sig_open.join(close),
        );
        Ok(Ast::new(
            AstKind::List(vec![Ast::symbol("define", define_span), name, lambda]),
            open.join(close),
        ))
    }

    /// The rest of `(lambda (sig…) docstring? body)` after the head.
    fn parse_lambda_tail(&mut self, open: Span, _lambda_span: Span) -> Result<Ast, CoreError> {
        if self.current.kind != TokenKind::LParen {
            return Err(self.err_here("malformed function signature"));
        }
        self.bump()?; // (

        let (params, return_type) = self.parse_signature()?;
        let (docstring, body) = self.parse_docstring_and_body()?;

        if self.current.kind != TokenKind::RParen {
            return Err(self.err_here("expected ')'"));
        }
        let close = self.current.span;
        self.bump()?;

        Ok(Ast::new(
            AstKind::Lambda(Box::new(Lambda {
                params,
                return_type,
                docstring,
                body,
            })),
            open.join(close),
        ))
    }

    /// A signature: bracket parameters, optionally `-> ReturnType`, up to
    /// and including the closing `)`.
    fn parse_signature(&mut self) -> Result<(Vec<Param>, Option<String>), CoreError> {
        let mut params = Vec::new();
        let mut return_type = None;

        loop {
            match &self.current.kind {
                TokenKind::LBracket => {
                    params.push(self.parse_signature_param()?);
                }
                TokenKind::Arrow => {
                    self.bump()?;
                    match &self.current.kind {
                        TokenKind::Symbol(name) => {
                            return_type = Some(name.clone());
                            self.bump()?;
                        }
                        _ => return Err(self.err_here("malformed function signature")),
                    }
                    if self.current.kind != TokenKind::RParen {
                        return Err(self.err_here("expected ')'"));
                    }
                }
                TokenKind::RParen => {
                    self.bump()?;
                    return Ok((params, return_type));
                }
                TokenKind::Eof => return Err(self.err_here("expected ')'")),
                _ => return Err(self.err_here("unknown token in function signature")),
            }
        }
    }

    /// One `[name]` or `[name :: TypeName]` parameter.
    fn parse_signature_param(&mut self) -> Result<Param, CoreError> {
        let open = self.current.span;
        self.bump()?; // [

        let name = match &self.current.kind {
            TokenKind::Symbol(name) => {
                let name = name.clone();
                self.bump()?;
                name
            }
            _ => return Err(self.err_here("malformed function signature")),
        };

        let mut type_name = None;
        if let TokenKind::Symbol(sep) = &self.current.kind {
            if sep == "::" {
                self.bump()?;
                match &self.current.kind {
                    TokenKind::Symbol(ty) => {
                        type_name = Some(ty.clone());
                        self.bump()?;
                    }
                    _ => return Err(self.err_here("malformed type annotation")),
                }
            }
        }

        if self.current.kind != TokenKind::RBracket {
            return Err(self.err_here("expected ']'"));
        }
        let close = self.current.span;
        self.bump()?;

        Ok(Param {
            name,
            type_name,
            span: open.join(close),
        })
    }

    /// After a signature: an optional docstring, then exactly one body
    /// expression. A lone string is the body, not a docstring.
    fn parse_docstring_and_body(&mut self) -> Result<(Option<String>, Ast), CoreError> {
        if self.current.kind == TokenKind::RParen {
            return Err(self.err_here("function definition requires a body expression"));
        }
        let first = self.parse_expr()?;
        if let AstKind::Str(doc) = &first.kind {
            if self.current.kind != TokenKind::RParen {
                let doc = doc.clone();
                let body = self.parse_expr()?;
                return Ok((Some(doc), body));
            }
        }
        Ok((None, first))
    }

    fn parse_bracket_list(&mut self, open: Span) -> Result<Ast, CoreError> {
        self.bump()?; // [
        let mut items = Vec::new();
        while self.current.kind != TokenKind::RBracket {
            if self.current.kind == TokenKind::Eof {
                return Err(self.err_here("expected ']'"));
            }
            items.push(self.parse_expr()?);
        }
        let close = self.current.span;
        self.bump()?; // ]
        Ok(Ast::new(AstKind::List(items), open.join(close)))
    }
}

/// Parse a single expression (interactive input).
pub fn parse_one(source: &str) -> Result<Ast, CoreError> {
    let mut parser = Parser::new(source)?;
    parser.parse_expr()
}

/// Parse every top-level expression in a file.
pub fn parse_all(source: &str) -> Result<Vec<Ast>, CoreError> {
    let mut parser = Parser::new(source)?;
    let mut exprs = Vec::new();
    while !parser.at_eof() {
        exprs.push(parser.parse_expr()?);
    }
    Ok(exprs)
}
