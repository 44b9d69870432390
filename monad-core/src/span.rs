//! Source code span utilities.
//!
//! This module defines the line/column spans attached to tokens and AST
//! nodes. Positions are 1-based, matching the `file:line:col` diagnostic
//! format; a span covers a byte range on its starting line via
//! `column..=end_column`.

/// A source location range: the line and column of the first byte plus
/// the column of the last byte on the starting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub end_column: u32,
}

impl Span {
    /// Construct a span for the given line and column range.
    pub fn new(line: u32, column: u32, end_column: u32) -> Span {
        Span {
            line,
            column,
            end_column,
        }
    }

    /// Construct a single-column span at the given position.
    pub fn point(line: u32, column: u32) -> Span {
        Span {
            line,
            column,
            end_column: column,
        }
    }

    /// Returns a span starting where `self` starts and extending to cover
    /// `other`. Extension only widens the range when `other` sits on the
    /// same line; a node whose last token is on a later line keeps the
    /// start line's extent.
    pub fn join(self, other: Span) -> Span {
        let end_column = if other.line == self.line {
            self.end_column.max(other.end_column)
        } else {
            self.end_column
        };
        Span {
            line: self.line,
            column: self.column,
            end_column,
        }
    }

    /// A placeholder span for situations where no precise source
    /// location is available (backend errors, synthesized nodes).
    pub fn dummy() -> Span {
        Span {
            line: 1,
            column: 1,
            end_column: 1,
        }
    }
}
