//! Host callback surface.
//!
//! A [`FunctionMacro`] computes a token sequence from argument tokens; the
//! same trait backs dynamic macros and pragmas. Callbacks receive a
//! [`MacroContext`] so they can mint tokens through the session's own
//! interner and source map; tokens built any other way would not compare
//! equal to the session's.

use cpx_engine::Preprocessor;
use cpx_ir::{Token, TokenCategory};
use std::fmt;

/// Failure raised by a host callback.
///
/// Carries a description only; it is converted to a session-level
/// [`crate::Error::CallbackFailure`] at the handler boundary and never
/// crosses the engine any other way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    /// Create a callback error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        CallbackError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CallbackError {}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError::new(message)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError { message }
    }
}

/// Capabilities a callback gets while it runs.
pub struct MacroContext<'a> {
    pp: &'a mut Preprocessor,
}

impl<'a> MacroContext<'a> {
    pub(crate) fn new(pp: &'a mut Preprocessor) -> Self {
        MacroContext { pp }
    }

    /// Lex text in isolation on the session's source map and interner.
    pub fn tokenize(&mut self, text: &str) -> Vec<Token> {
        self.pp.tokenize_detached(text)
    }

    /// Construct a synthetic token.
    pub fn token(
        &self,
        category: TokenCategory,
        value: Option<&str>,
    ) -> Result<Token, CallbackError> {
        Token::from_category(category, value, self.pp.interner())
            .map_err(|err| CallbackError::new(err.to_string()))
    }

    /// Render a token's spelling.
    pub fn spelling(&self, token: &Token) -> &'static str {
        token.spelling(self.pp.interner())
    }

    /// Render a token sequence as text, spaces per whitespace flags.
    pub fn render(&self, tokens: &[Token]) -> String {
        self.pp.spell_tokens(tokens)
    }
}

/// A host-computed macro or pragma body.
///
/// Invoked with the already-expanded argument tokens; the returned tokens
/// are spliced into the preprocessor's active lex position.
pub trait FunctionMacro {
    fn expand(
        &self,
        cx: &mut MacroContext<'_>,
        args: &[Token],
    ) -> Result<Vec<Token>, CallbackError>;
}

impl<F> FunctionMacro for F
where
    F: Fn(&mut MacroContext<'_>, &[Token]) -> Result<Vec<Token>, CallbackError>,
{
    fn expand(
        &self,
        cx: &mut MacroContext<'_>,
        args: &[Token],
    ) -> Result<Vec<Token>, CallbackError> {
        self(cx, args)
    }
}
