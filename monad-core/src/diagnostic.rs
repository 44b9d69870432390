//! Diagnostics for the Monad compiler.
//!
//! A `Diagnostic` carries a message and a primary span; rendering
//! produces the canonical format
//!
//! ```text
//! <file>:<line>:<col>: error: <message>
//!     (show x)
//!          ^~~
//! ```
//!
//! with the caret covering `column..=end_column` when the span has an
//! extent, a single caret otherwise.

use crate::source::SourceInfo;
use crate::span::Span;

/// Severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A single diagnostic message produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    /// Create a new error diagnostic at the given span.
    pub fn error(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    /// Create a new warning diagnostic at the given span.
    pub fn warning(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    /// Render this diagnostic against its source, including the offending
    /// line and a caret line when the source line is available.
    pub fn render(&self, source: &SourceInfo) -> String {
        let mut out = format!(
            "{}:{}:{}: {}: {}",
            source.name,
            self.span.line,
            self.span.column,
            self.severity.as_str(),
            self.message
        );

        if let Some(line) = source.line_str(self.span.line) {
            out.push_str("\n    ");
            out.push_str(line);
            out.push_str("\n    ");
            let col = self.span.column.max(1) as usize;
            out.push_str(&" ".repeat(col - 1));
            out.push('^');
            if self.span.end_column > self.span.column {
                let extent = (self.span.end_column - self.span.column) as usize;
                out.push_str(&"~".repeat(extent));
            }
        }
        out
    }
}
