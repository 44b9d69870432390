//! Source text bookkeeping for diagnostics.
//!
//! `SourceInfo` pairs a display name with the full source text so that
//! diagnostics can render the offending line. There is no process-wide
//! current-file state: whoever renders a diagnostic supplies one of
//! these.

/// A named unit of source text.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub text: String,
}

impl SourceInfo {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> SourceInfo {
        SourceInfo {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Returns the 1-based `line`, without its trailing newline.
    pub fn line_str(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.text.lines().nth(line as usize - 1)
    }
}
