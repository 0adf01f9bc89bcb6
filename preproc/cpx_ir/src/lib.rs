//! Shared data types for the cpx preprocessor.
//!
//! This crate contains the types every other cpx crate speaks in:
//! - Spans for source locations
//! - Names for interned identifier and literal spellings
//! - The source map (files and virtual buffers) with line/column lookup
//! - Tokens, token kinds and per-token whitespace flags
//!
//! # Design
//!
//! A preprocessing session owns exactly one interner and one source map.
//! Every tokenizing context (the main file, included headers, `_Pragma`
//! payloads, host-supplied text) registers its buffer in the same source
//! map and interns through the same interner, so identifier identity is
//! stable no matter which context produced a token.

mod interner;
mod source_map;
mod span;
mod token;

pub use interner::{InternError, Name, SharedInterner, StringInterner};
pub use source_map::{FileCharacteristic, SourceFile, SourceId, SourceMap};
pub use span::{Span, SpanError};
pub use token::{InvalidLiteral, Punct, Token, TokenCategory, TokenFlags, TokenKind};
