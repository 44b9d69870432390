//! The Monad type model.
//!
//! A closed set of value kinds plus a function type built from parameter
//! descriptors. The same descriptor record serves user functions (named,
//! typed parameters) and builtins (placeholder parameters with optional
//! and rest flags), so the arity display logic exists once.
//!
//! Integer-kinded values (Int, Hex, Bin, Oct) all share the 64-bit
//! signed representation; Hex/Bin/Oct only change how a value was
//! written and how it prints. Char is an 8-bit integer that widens to
//! 64 bits before arithmetic.

use core::fmt;

use crate::ast::{Ast, AstKind};
use crate::span::Span;

/// A single function parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FnParam {
    /// Parameter name; builtins use placeholder parameters without one.
    pub name: Option<String>,
    /// Declared type; `None` is a polymorphic placeholder (`_`).
    pub ty: Option<Type>,
    pub optional: bool,
    pub rest: bool,
}

impl FnParam {
    pub fn named(name: impl Into<String>, ty: Type) -> FnParam {
        FnParam {
            name: Some(name.into()),
            ty: Some(ty),
            optional: false,
            rest: false,
        }
    }

    fn placeholder(optional: bool, rest: bool) -> FnParam {
        FnParam {
            name: None,
            ty: None,
            optional,
            rest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnType {
    pub params: Vec<FnParam>,
    /// `None` = unknown/polymorphic return.
    pub return_type: Option<Box<Type>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Char,
    Str,
    Bool,
    Hex,
    Bin,
    Oct,
    Fn(FnType),
    Unknown,
}

/// Why an arithmetic promotion step failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PromoteError {
    /// The named operand type cannot take part in arithmetic.
    NonNumeric(Type),
    /// Two different special integer bases in one step.
    MixedBases(Type, Type),
}

/// An annotation named a type outside the fixed table.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownTypeName {
    pub name: String,
    pub span: Span,
}

impl Type {
    pub fn function(params: Vec<FnParam>, return_type: Option<Type>) -> Type {
        Type::Fn(FnType {
            params,
            return_type: return_type.map(Box::new),
        })
    }

    /// Build a builtin `Fn` type from raw arity info: `min_args` required
    /// placeholders, `opt_args` optional ones, then a rest placeholder.
    pub fn fn_builtin(min_args: usize, opt_args: usize, variadic: bool) -> Type {
        let mut params = Vec::with_capacity(min_args + opt_args + variadic as usize);
        for _ in 0..min_args {
            params.push(FnParam::placeholder(false, false));
        }
        for _ in 0..opt_args {
            params.push(FnParam::placeholder(true, false));
        }
        if variadic {
            params.push(FnParam::placeholder(false, true));
        }
        Type::function(params, None)
    }

    /// The fixed annotation table. Unknown names are not types.
    pub fn from_name(name: &str) -> Option<Type> {
        match name {
            "Int" => Some(Type::Int),
            "Float" => Some(Type::Float),
            "Char" => Some(Type::Char),
            "String" => Some(Type::Str),
            "Bool" => Some(Type::Bool),
            "Hex" => Some(Type::Hex),
            "Bin" => Some(Type::Bin),
            "Oct" => Some(Type::Oct),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Float | Type::Hex | Type::Bin | Type::Oct | Type::Char
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int | Type::Hex | Type::Bin | Type::Oct | Type::Char)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }

    /// Hex, Bin or Oct: an integer with a non-decimal surface form.
    pub fn is_base_kind(&self) -> bool {
        matches!(self, Type::Hex | Type::Bin | Type::Oct)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Char => write!(f, "Char"),
            Type::Str => write!(f, "String"),
            Type::Bool => write!(f, "Bool"),
            Type::Hex => write!(f, "Hex"),
            Type::Bin => write!(f, "Bin"),
            Type::Oct => write!(f, "Oct"),
            Type::Unknown => write!(f, "?"),
            Type::Fn(fn_ty) => {
                if fn_ty.params.is_empty() {
                    // No params recorded: variadic list style.
                    return write!(f, "Fn _");
                }
                let mut sig = String::new();
                let mut first_opt_seen = false;
                for (i, p) in fn_ty.params.iter().enumerate() {
                    if p.rest {
                        if i > 0 {
                            sig.push(' ');
                        }
                        sig.push_str(". _");
                    } else {
                        if p.optional && !first_opt_seen {
                            if i > 0 {
                                sig.push(' ');
                            }
                            sig.push_str("#:optional");
                            first_opt_seen = true;
                        }
                        if i > 0 || first_opt_seen {
                            sig.push(' ');
                        }
                        sig.push('_');
                    }
                }
                write!(f, "Fn ({})", sig)
            }
        }
    }
}

/// Infer the concrete type of a numeric literal from its value and the
/// original source slice.
pub fn infer_literal_type(value: f64, literal: Option<&str>) -> Type {
    let Some(s) = literal else {
        // No lexeme: fall back to the value shape.
        if value == (value as i64) as f64 {
            return Type::Int;
        }
        return Type::Float;
    };

    let bytes = s.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => return Type::Hex,
            b'b' | b'B' => return Type::Bin,
            b'o' | b'O' => return Type::Oct,
            _ => {}
        }
    }
    if s.contains(['.', 'e', 'E']) {
        return Type::Float;
    }
    Type::Int
}

/// Parse a bracket annotation `[name :: TypeName]`.
///
/// Returns `Ok(None)` when the list carries no `::` marker, the declared
/// type when it does, and an error when the name after `::` is missing,
/// not a symbol, or not in the type table.
pub fn parse_type_annotation(ast: &Ast) -> Result<Option<Type>, UnknownTypeName> {
    let AstKind::List(items) = &ast.kind else {
        return Ok(None);
    };

    for (i, item) in items.iter().enumerate() {
        if let AstKind::Symbol(s) = &item.kind {
            if s == "::" {
                let Some(type_node) = items.get(i + 1) else {
                    return Err(UnknownTypeName {
                        name: String::new(),
                        span: item.span,
                    });
                };
                let AstKind::Symbol(name) = &type_node.kind else {
                    return Err(UnknownTypeName {
                        name: type_node.to_string(),
                        span: type_node.span,
                    });
                };
                return match Type::from_name(name) {
                    Some(ty) => Ok(Some(ty)),
                    None => Err(UnknownTypeName {
                        name: name.clone(),
                        span: type_node.span,
                    }),
                };
            }
        }
    }
    Ok(None)
}

/// One binary reduction step of `+ - * /`: pick the result type for a
/// pair of operand types.
///
/// The rules, in order: non-numeric operands fail; two different members
/// of {Hex, Bin, Oct} fail (ambiguous result base); Float wins; Char
/// promotes to Int; equal kinds keep their kind; anything else is Int.
pub fn promote(lhs: &Type, rhs: &Type) -> Result<Type, PromoteError> {
    if !lhs.is_numeric() {
        return Err(PromoteError::NonNumeric(lhs.clone()));
    }
    if !rhs.is_numeric() {
        return Err(PromoteError::NonNumeric(rhs.clone()));
    }
    if lhs.is_base_kind() && rhs.is_base_kind() && lhs != rhs {
        return Err(PromoteError::MixedBases(lhs.clone(), rhs.clone()));
    }
    if lhs.is_float() || rhs.is_float() {
        return Ok(Type::Float);
    }
    if matches!(lhs, Type::Char) || matches!(rhs, Type::Char) {
        return Ok(Type::Int);
    }
    if lhs == rhs {
        return Ok(lhs.clone());
    }
    Ok(Type::Int)
}
