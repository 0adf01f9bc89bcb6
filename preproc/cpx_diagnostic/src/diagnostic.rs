//! Core diagnostic types.

use cpx_ir::{SourceId, Span};
use std::fmt;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// Stable code identifying what went wrong.
///
/// Codes let consumers claim specific diagnostics without parsing message
/// text.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DiagCode {
    /// String literal with no closing quote.
    UnterminatedString,
    /// Character literal with no closing quote.
    UnterminatedChar,
    /// Block comment with no closing `*/`.
    UnterminatedComment,
    /// A directive the engine could not parse.
    MalformedDirective,
    /// `#else`/`#endif` with no open conditional, or a conditional left
    /// open at end of file.
    UnbalancedConditional,
    /// A `#define` replaced an incompatible existing definition.
    MacroRedefined,
    /// An `#include` target that header search could not find.
    FileNotFound,
    /// An include resolver failed or produced an unusable path.
    ResolutionFailed,
    /// Capture/dispatch pairing violation in the dynamic macro protocol.
    PragmaProtocol,
    /// A `#error` directive.
    UserError,
    /// A `#warning` directive.
    UserWarning,
}

impl DiagCode {
    /// Short stable code string.
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagCode::UnterminatedString => "E0101",
            DiagCode::UnterminatedChar => "E0102",
            DiagCode::UnterminatedComment => "E0103",
            DiagCode::MalformedDirective => "E0201",
            DiagCode::UnbalancedConditional => "E0202",
            DiagCode::MacroRedefined => "W0201",
            DiagCode::FileNotFound => "E0301",
            DiagCode::ResolutionFailed => "E0302",
            DiagCode::PragmaProtocol => "E0401",
            DiagCode::UserError => "E0501",
            DiagCode::UserWarning => "W0501",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic with its code, severity, message and location.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
    pub code: DiagCode,
    pub severity: Severity,
    pub message: String,
    pub source: SourceId,
    pub span: Span,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(code: DiagCode, message: impl Into<String>, source: SourceId, span: Span) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.into(),
            source,
            span,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(
        code: DiagCode,
        message: impl Into<String>,
        source: SourceId,
        span: Span,
    ) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            message: message.into(),
            source,
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(DiagCode::FileNotFound.as_str(), "E0301");
        assert_eq!(DiagCode::UserWarning.as_str(), "W0501");
    }

    #[test]
    fn test_constructors_set_severity() {
        let err = Diagnostic::error(
            DiagCode::MalformedDirective,
            "bad directive",
            SourceId::SYNTHETIC,
            Span::DUMMY,
        );
        assert_eq!(err.severity, Severity::Error);

        let warn = Diagnostic::warning(
            DiagCode::UserWarning,
            "heads up",
            SourceId::SYNTHETIC,
            Span::DUMMY,
        );
        assert_eq!(warn.severity, Severity::Warning);
    }
}
