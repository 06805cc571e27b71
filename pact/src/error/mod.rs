//! Error types

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile error
///
/// Contract violations are never compile errors: they become runtime
/// assertions in the generated code. These variants cover input the lowerer
/// cannot translate at all.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lowering error at {span}: {message}")]
    Lowering { message: String, span: Span },

    #[error("Unresolved name at {span}: {message}")]
    Resolve { message: String, span: Span },

    /// Malformed checked-tree input
    #[error("Input error: {message}")]
    Input { message: String },

    /// Invalid generator configuration
    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),
}

impl CompileError {
    pub fn lowering(message: impl Into<String>, span: Span) -> Self {
        Self::Lowering {
            message: message.into(),
            span,
        }
    }

    pub fn resolve(message: impl Into<String>, span: Span) -> Self {
        Self::Resolve {
            message: message.into(),
            span,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attach a position to an error raised without one
    pub fn at(self, at: Span) -> Self {
        match self {
            Self::Lowering { message, span } if !span.is_known() => Self::Lowering { message, span: at },
            Self::Resolve { message, span } if !span.is_known() => Self::Resolve { message, span: at },
            other => other,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lowering { span, .. } => Some(*span),
            Self::Resolve { span, .. } => Some(*span),
            Self::Input { .. } | Self::Config { .. } | Self::Format(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lowering { message, .. } => message,
            Self::Resolve { message, .. } => message,
            Self::Input { message } => message,
            Self::Config { message } => message,
            Self::Format(_) => "formatting into the output buffer failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_fills_unknown_span_only() {
        let e = CompileError::lowering("bad", Span::unknown()).at(Span::new(3, 1));
        assert_eq!(e.span(), Some(Span::new(3, 1)));

        let e = CompileError::lowering("bad", Span::new(1, 1)).at(Span::new(3, 1));
        assert_eq!(e.span(), Some(Span::new(1, 1)));
    }

    #[test]
    fn test_display_includes_position() {
        let e = CompileError::resolve("unknown variant `Nope`", Span::new(4, 9));
        assert_eq!(e.to_string(), "Unresolved name at 4:9: unknown variant `Nope`");
        assert_eq!(e.message(), "unknown variant `Nope`");
    }

    #[test]
    fn test_config_error_has_no_span() {
        assert_eq!(CompileError::config("x").span(), None);
    }
}
