//! Diagnostic system for the cpx preprocessor.
//!
//! - [`Diagnostic`] values carry a code, severity, message and location.
//! - [`DiagnosticEngine`] delivers each diagnostic to an ordered list of
//!   [`DiagnosticConsumer`]s, first-match-wins; unclaimed diagnostics land
//!   in a collecting [`DiagnosticQueue`].
//! - [`TerminalEmitter`] renders queued diagnostics with `file:line:col`
//!   prefixes.
//!
//! The consumer list is the extension point the rest of the system builds
//! on: a consumer that claims a diagnostic takes full responsibility for
//! it, and later consumers (and the queue) never see it.

mod consumer;
mod diagnostic;
mod emitter;
mod queue;

pub use consumer::{DiagnosticConsumer, DiagnosticEngine};
pub use diagnostic::{DiagCode, Diagnostic, Severity};
pub use emitter::{render, TerminalEmitter};
pub use queue::DiagnosticQueue;
