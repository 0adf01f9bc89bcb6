//! Host-callback bridge for the cpx preprocessing engine.
//!
//! The engine expands macros from a static token table. This crate
//! retrofits dynamic behavior onto its extension points:
//!
//! - **Dynamic macros** (`Session::define_macro`): a macro whose expansion
//!   is computed by a host callback, wired through the engine's pragma
//!   interface with a capture-then-dispatch protocol.
//! - **Dynamic pragmas** (`Session::add_pragma`): `#pragma name ...` bound
//!   to a callback receiving the directive's payload tokens.
//! - **Include resolution** (`Session::set_include_locator`): a fallback
//!   resolver consulted when the engine's header search misses.
//!
//! Output is consumed through [`TokenStream`], a pull-based iterator that
//! surfaces callback failures as errors on `next`, never by truncating
//! output, and never by letting a failure cross the engine's stack.

mod callback;
mod error;
mod fmt;
mod handlers;
mod session;
mod stream;
mod synth;

pub use callback::{CallbackError, FunctionMacro, MacroContext};
pub use error::Error;
pub use session::Session;
pub use stream::TokenStream;

// The host-facing vocabulary from the underlying crates.
pub use cpx_diagnostic::{DiagCode, Diagnostic, DiagnosticConsumer, DiagnosticQueue, Severity};
pub use cpx_engine::{IncludeForm, IncludeResolver, ResolveError};
pub use cpx_ir::{Punct, Token, TokenCategory, TokenFlags, TokenKind};
