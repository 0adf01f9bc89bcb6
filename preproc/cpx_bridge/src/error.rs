//! Bridge-level errors.
//!
//! The error a caller sees from any `Session` operation. Failures that
//! originate inside host callbacks surface as `CallbackFailure` at the next
//! session-boundary call; setup failures (malformed names, duplicate
//! bindings) are reported synchronously.

use cpx_engine::EngineError;
use cpx_ir::InvalidLiteral;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// A session operation failure.
#[derive(Debug)]
pub enum Error {
    /// The name is already bound as a macro or pragma.
    DuplicateDefinition { name: String },
    /// A macro name with a malformed parameter list.
    InvalidMacroName { name: String, reason: String },
    /// Synthetic token construction without a required value.
    InvalidLiteral(InvalidLiteral),
    /// An include resolver failed or returned an unusable value.
    ResolutionFailure { message: String },
    /// A macro or pragma callback failed.
    CallbackFailure { name: String, message: String },
    /// A pull on an exhausted token stream.
    StreamMisuse,
    /// An `#include` target could not be found.
    FileNotFound { spelling: String },
    /// A directive aborted preprocessing (`#error`, malformed directives,
    /// argument mismatches).
    Directive { message: String },
    /// Capture/dispatch pairing violation in the dynamic macro protocol.
    PragmaProtocol { message: String },
    /// Macro expansion exceeded the nesting limit.
    TooDeep { name: String },
    /// A file could not be read.
    Io { path: PathBuf, error: io::Error },
    /// Writing preprocessed output failed.
    Sink(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateDefinition { name } => {
                write!(f, "'{name}' is already defined")
            }
            Error::InvalidMacroName { name, reason } => {
                write!(f, "invalid macro name '{name}': {reason}")
            }
            Error::InvalidLiteral(err) => err.fmt(f),
            Error::ResolutionFailure { message } => {
                write!(f, "include resolution failed: {message}")
            }
            Error::CallbackFailure { name, message } => {
                write!(f, "handler for '{name}' failed: {message}")
            }
            Error::StreamMisuse => write!(f, "token stream is exhausted"),
            Error::FileNotFound { spelling } => write!(f, "'{spelling}' file not found"),
            Error::Directive { message } => f.write_str(message),
            Error::PragmaProtocol { message } => {
                write!(f, "pragma protocol violation: {message}")
            }
            Error::TooDeep { name } => {
                write!(f, "macro expansion of '{name}' is too deeply nested")
            }
            Error::Io { path, error } => {
                write!(f, "cannot read '{}': {error}", path.display())
            }
            Error::Sink(error) => write!(f, "cannot write output: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidLiteral(err) => Some(err),
            Error::Io { error, .. } | Error::Sink(error) => Some(error),
            _ => None,
        }
    }
}

impl From<InvalidLiteral> for Error {
    fn from(err: InvalidLiteral) -> Self {
        Error::InvalidLiteral(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Callback { name, message } => Error::CallbackFailure { name, message },
            EngineError::FileNotFound { spelling } => Error::FileNotFound { spelling },
            EngineError::Resolution { message } => Error::ResolutionFailure { message },
            EngineError::Directive { message, .. } => Error::Directive { message },
            EngineError::PragmaProtocol { message } => Error::PragmaProtocol { message },
            EngineError::TooDeep { name } => Error::TooDeep { name },
            EngineError::Io { path, error } => Error::Io { path, error },
        }
    }
}
