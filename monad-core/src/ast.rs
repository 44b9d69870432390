//! AST for the Monad reader.
//!
//! Numeric nodes keep the original lexeme alongside the parsed value so
//! the type model can tell `0xFF` from `255` and `3` from `3.0`. Every
//! node carries the span of its first token, extended over the rest of
//! the form.

use core::fmt;

use crate::span::Span;

/// A lambda parameter: a name with an optional annotated type name.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_name: Option<String>,
    pub span: Span,
}

/// A parsed `lambda` form (also produced by short-form `define`).
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    pub body: Ast,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    /// A numeric literal. `literal` is the exact source slice when the
    /// node came from the reader; synthesized numbers have none.
    Number { value: f64, literal: Option<String> },
    Symbol(String),
    Str(String),
    /// A character literal, escape-decoded to its byte value.
    Char(u8),
    List(Vec<Ast>),
    Lambda(Box<Lambda>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub kind: AstKind,
    pub span: Span,
}

impl Ast {
    pub fn new(kind: AstKind, span: Span) -> Ast {
        Ast { kind, span }
    }

    pub fn symbol(name: impl Into<String>, span: Span) -> Ast {
        Ast::new(AstKind::Symbol(name.into()), span)
    }

    /// The head symbol of a list form, if this is a non-empty list whose
    /// first item is a symbol.
    pub fn head_symbol(&self) -> Option<&str> {
        match &self.kind {
            AstKind::List(items) => match items.first() {
                Some(Ast {
                    kind: AstKind::Symbol(s),
                    ..
                }) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for `(quote expr)` forms.
    pub fn is_quote(&self) -> bool {
        self.head_symbol() == Some("quote")
    }
}

/// Print a numeric value the way the structural printer does: integral
/// values without a fractional part, everything else in shortest decimal.
pub fn display_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// The structural printer. The runtime walk emitted for `quote` must
/// agree with this output, so snapshot tests over `show '…` hold.
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AstKind::Number { value, .. } => write!(f, "{}", display_number(*value)),
            AstKind::Symbol(s) => write!(f, "{}", s),
            AstKind::Str(s) => write!(f, "\"{}\"", s),
            AstKind::Char(c) => write!(f, "'{}'", *c as char),
            AstKind::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            AstKind::Lambda(l) => {
                write!(f, "(lambda (")?;
                for (i, p) in l.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match &p.type_name {
                        Some(t) => write!(f, "[{} :: {}]", p.name, t)?,
                        None => write!(f, "[{}]", p.name)?,
                    }
                }
                if let Some(ret) = &l.return_type {
                    write!(f, " -> {}", ret)?;
                }
                write!(f, ")")?;
                if let Some(doc) = &l.docstring {
                    write!(f, " \"{}\"", doc)?;
                }
                write!(f, " {})", l.body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp() -> Span {
        Span::dummy()
    }

    #[test]
    fn displays_lists_space_separated() {
        let ast = Ast::new(
            AstKind::List(vec![
                Ast::symbol("foo", sp()),
                Ast::new(
                    AstKind::Number {
                        value: 1.0,
                        literal: Some("1".into()),
                    },
                    sp(),
                ),
                Ast::new(AstKind::Str("x".into()), sp()),
                Ast::new(AstKind::Char(b'c'), sp()),
            ]),
            sp(),
        );
        assert_eq!(ast.to_string(), "(foo 1 \"x\" 'c')");
    }

    #[test]
    fn displays_floats_and_integers() {
        assert_eq!(display_number(6.0), "6");
        assert_eq!(display_number(2.5), "2.5");
        assert_eq!(display_number(-3.0), "-3");
    }
}
