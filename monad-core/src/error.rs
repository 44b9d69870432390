//! Core error type for the Monad toolchain.
//!
//! Language-level failures are expressed as `Diagnostic` values; `CoreError`
//! is the outer error wrapper used by the compiler pipeline. High-level
//! tools (the CLI, tests) are expected to render `Diagnostic` values for
//! language errors and handle I/O on their side. Nothing in the core calls
//! `exit`; the process dies only at the CLI boundary.

use core::fmt;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

#[derive(Debug, Clone)]
pub enum CoreError {
    /// One or more language-level errors with span information.
    Diagnostics(Vec<Diagnostic>),

    /// A backend failure (verification, target lookup, artifact emission)
    /// with the message reported by LLVM.
    Backend(String),

    /// An internal error indicating a bug in the compiler or an
    /// unexpected unreachable situation.
    Internal(&'static str),
}

impl CoreError {
    /// Construct a CoreError from a single Diagnostic.
    pub fn from_diagnostic(diagnostic: Diagnostic) -> CoreError {
        CoreError::Diagnostics(vec![diagnostic])
    }

    /// Shorthand for the common single-error case.
    pub fn error(message: impl Into<String>, span: Span) -> CoreError {
        CoreError::from_diagnostic(Diagnostic::error(message, span))
    }

    pub fn backend(message: impl Into<String>) -> CoreError {
        CoreError::Backend(message.into())
    }

    pub fn internal(message: &'static str) -> CoreError {
        CoreError::Internal(message)
    }

    /// The diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CoreError::Diagnostics(ds) => ds,
            _ => &[],
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Diagnostics(diags) => {
                // Only the first message; callers render the full set.
                if let Some(first) = diags.first() {
                    write!(f, "{}", first.message)
                } else {
                    write!(f, "diagnostic error (no messages)")
                }
            }
            CoreError::Backend(msg) => write!(f, "backend error: {msg}"),
            CoreError::Internal(msg) => write!(f, "internal compiler error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<inkwell::builder::BuilderError> for CoreError {
    fn from(_: inkwell::builder::BuilderError) -> CoreError {
        CoreError::Internal("LLVM builder rejected an instruction")
    }
}
