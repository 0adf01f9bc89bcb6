//! Engine errors.
//!
//! Failures that abort the current preprocessing operation. Host callback
//! failures never cross the engine as panics or foreign unwinding. They are
//! converted to [`EngineError::Callback`] at the handler boundary and
//! propagate as ordinary `Result`s through every lexing operation.

use cpx_diagnostic::DiagCode;
use cpx_ir::{SourceId, Span};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// A fatal preprocessing failure.
#[derive(Debug)]
pub enum EngineError {
    /// A host macro/pragma callback failed.
    Callback {
        /// The dynamic macro or pragma name.
        name: String,
        message: String,
    },
    /// An `#include` target could not be found.
    FileNotFound {
        /// The spelling reported to the user: the original include form, or
        /// the resolved path when a resolver produced one that does not
        /// denote a real file.
        spelling: String,
    },
    /// An include resolver failed or returned an unusable value.
    Resolution { message: String },
    /// A directive aborted preprocessing (`#error`, malformed `#include`,
    /// macro argument mismatch).
    Directive {
        code: DiagCode,
        message: String,
        source: SourceId,
        span: Span,
    },
    /// Capture/dispatch pairing violation in the dynamic macro protocol.
    PragmaProtocol { message: String },
    /// Macro expansion exceeded the nesting limit.
    TooDeep { name: String },
    /// A file could not be read.
    Io { path: PathBuf, error: io::Error },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Callback { name, message } => {
                write!(f, "handler for '{name}' failed: {message}")
            }
            EngineError::FileNotFound { spelling } => {
                write!(f, "'{spelling}' file not found")
            }
            EngineError::Resolution { message } => {
                write!(f, "include resolution failed: {message}")
            }
            EngineError::Directive { message, .. } => f.write_str(message),
            EngineError::PragmaProtocol { message } => {
                write!(f, "pragma protocol violation: {message}")
            }
            EngineError::TooDeep { name } => {
                write!(f, "macro expansion of '{name}' is too deeply nested")
            }
            EngineError::Io { path, error } => {
                write!(f, "cannot read '{}': {error}", path.display())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}
