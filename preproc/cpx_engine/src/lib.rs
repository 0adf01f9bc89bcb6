//! The cpx preprocessing engine.
//!
//! A small C-family preprocessor built around explicit extension points:
//!
//! - a macro table that stores token-sequence bodies only;
//! - a pragma-handler registry (the behavioral extension point);
//! - a diagnostic consumer chain;
//! - header search returning `Result`, with an external resolver consulted
//!   inline on a miss.
//!
//! Dynamic (callback-computed) macros are not implemented here; the
//! bridge crate layers them on through the pragma extension point. Every
//! lexing operation returns a `Result`, so handler failures unwind the
//! engine cleanly as values.
//!
//! The engine is deliberately sub-conformant: no `#if` expressions, no
//! trigraphs, no `#line`. See the directive module for the supported set.

mod directive;
mod engine;
mod error;
mod expand;
mod headers;
mod include;
mod macros;
mod pragma;

pub use engine::Preprocessor;
pub use error::EngineError;
pub use headers::{HeaderNotFound, HeaderSearch, ResolvedHeader};
pub use include::{IncludeForm, IncludeResolver, ResolveError};
pub use macros::{normalize_body, DefineConflict, MacroDef, MacroTable};
pub use pragma::{PragmaHandler, PragmaRegistry};
