//! Lexer for C-family preprocessing tokens.
//!
//! Two layers, following a raw-scan / cook split:
//! - [`raw`]: a logos scanner producing raw lexeme categories, including
//!   whitespace, newlines and comments. Nothing is skipped; the cooker
//!   needs trivia to compute whitespace flags.
//! - [`cook`]: folds trivia into per-token flags, interns spellings and
//!   recovers from malformed literals.
//!
//! The only entry point the engine uses is [`lex_source`], which lexes a
//! whole registered buffer into a flag-annotated token list terminated by
//! an `Eof` token.

mod cook;
mod lex_error;
mod raw;

pub use cook::{lex_source, LexOutput};
pub use lex_error::{LexError, LexErrorKind};
