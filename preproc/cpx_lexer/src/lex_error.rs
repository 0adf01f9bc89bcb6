//! Lexical errors with recovery.
//!
//! The cooker reports malformed lexemes here and keeps going; the engine
//! decides whether to surface them as diagnostics.

use cpx_ir::{SourceId, Span};
use std::fmt;

/// Kind of lexical error.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LexErrorKind {
    /// String literal with no closing quote before end of line.
    UnterminatedString,
    /// Character literal with no closing quote before end of line.
    UnterminatedChar,
    /// Block comment with no closing `*/` before end of input.
    UnterminatedBlockComment,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexErrorKind::UnterminatedChar => write!(f, "unterminated character literal"),
            LexErrorKind::UnterminatedBlockComment => write!(f, "unterminated block comment"),
        }
    }
}

/// A recovered lexical error.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub source: SourceId,
    pub span: Span,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

impl std::error::Error for LexError {}
