//! Source position tracking

use serde::{Deserialize, Serialize};

/// Position of a declaration or clause in the Pact source (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position for synthesized nodes that have no source location.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        assert_eq!(Span::new(12, 5).to_string(), "12:5");
    }

    #[test]
    fn test_unknown_span_display() {
        assert_eq!(Span::unknown().to_string(), "<unknown>");
        assert!(!Span::unknown().is_known());
    }
}
