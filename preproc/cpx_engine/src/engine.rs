//! The preprocessor core: input frame stack and lexing loop.
//!
//! Input is a stack of frames: source buffers (files, predefines,
//! `_Pragma` payloads) and spliced token streams (macro expansion results,
//! handler output). `lex` pulls tokens off the stack, handling directives
//! and macro expansion on the way; every operation that can fail returns a
//! `Result`, so host callback failures unwind the engine cleanly without
//! any foreign unwinding crossing its stack.

use crate::error::EngineError;
use crate::headers::HeaderSearch;
use crate::include::IncludeResolver;
use crate::macros::MacroTable;
use crate::pragma::PragmaRegistry;
use cpx_diagnostic::{DiagCode, Diagnostic, DiagnosticEngine};
use cpx_lexer::{lex_source, LexErrorKind};
use cpx_ir::{
    FileCharacteristic, Name, SharedInterner, SourceId, SourceMap, StringInterner, Token,
    TokenFlags, TokenKind,
};
use smallvec::SmallVec;
use std::path::Path;

/// Names the engine looks up on hot paths, interned once at construction.
pub(crate) struct WellKnown {
    pub define: Name,
    pub undef: Name,
    pub include: Name,
    pub ifdef: Name,
    pub ifndef: Name,
    pub else_: Name,
    pub endif: Name,
    pub pragma: Name,
    pub error: Name,
    pub warning: Name,
    pub va_args: Name,
    /// The `_Pragma` operator.
    pub pragma_op: Name,
}

impl WellKnown {
    fn new(interner: &StringInterner) -> Self {
        WellKnown {
            define: interner.intern("define"),
            undef: interner.intern("undef"),
            include: interner.intern("include"),
            ifdef: interner.intern("ifdef"),
            ifndef: interner.intern("ifndef"),
            else_: interner.intern("else"),
            endif: interner.intern("endif"),
            pragma: interner.intern("pragma"),
            error: interner.intern("error"),
            warning: interner.intern("warning"),
            va_args: interner.intern("__VA_ARGS__"),
            pragma_op: interner.intern("_Pragma"),
        }
    }
}

/// One open `#ifdef`/`#ifndef` group in a source frame.
#[derive(Copy, Clone, Debug)]
pub(crate) struct CondState {
    /// A live branch of this group has been entered.
    pub taken: bool,
    /// `#else` has been seen.
    pub seen_else: bool,
}

/// One input frame.
pub(crate) enum Frame {
    /// A lexed source buffer (file, predefines, `_Pragma` payload).
    Source {
        id: SourceId,
        tokens: Vec<Token>,
        pos: usize,
        conds: Vec<CondState>,
    },
    /// A spliced token stream (expansion results, handler output,
    /// pushed-back lookahead).
    Splice { tokens: Vec<Token>, pos: usize },
}

enum Step {
    Tok(Token, bool),
    MainEof(Token),
    PopSource,
    PopSplice,
    Empty,
}

/// The preprocessing engine.
pub struct Preprocessor {
    pub(crate) interner: SharedInterner,
    pub(crate) sources: SourceMap,
    pub(crate) diagnostics: DiagnosticEngine,
    pub(crate) macros: MacroTable,
    pub(crate) headers: HeaderSearch,
    pub(crate) pragmas: PragmaRegistry,
    pub(crate) resolver: Option<Box<dyn IncludeResolver>>,
    pub(crate) frames: Vec<Frame>,
    /// Macros whose expansion is in progress (blue paint).
    pub(crate) active: SmallVec<[Name; 8]>,
    pub(crate) names: WellKnown,
    /// Whether the most recent raw token came straight from a source frame
    /// (directives are only recognized there).
    pub(crate) last_from_source: bool,
    /// Dangling-conditional check already reported at end of main input.
    eof_reported: bool,
}

impl Preprocessor {
    /// Create an engine with no input.
    pub fn new() -> Self {
        let interner = SharedInterner::new();
        let names = WellKnown::new(&interner);
        Preprocessor {
            interner,
            sources: SourceMap::new(),
            diagnostics: DiagnosticEngine::new(),
            macros: MacroTable::new(),
            headers: HeaderSearch::new(),
            pragmas: PragmaRegistry::new(),
            resolver: None,
            frames: Vec::new(),
            active: SmallVec::new(),
            names,
            last_from_source: false,
            eof_reported: false,
        }
    }

    /// The session interner.
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// The session source map.
    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    /// The diagnostic engine (register consumers, inspect the queue).
    pub fn diagnostics(&self) -> &DiagnosticEngine {
        &self.diagnostics
    }

    /// Mutable diagnostic engine access.
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticEngine {
        &mut self.diagnostics
    }

    /// The macro table.
    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Mutable macro table access.
    pub fn macros_mut(&mut self) -> &mut MacroTable {
        &mut self.macros
    }

    /// The pragma handler registry.
    pub fn pragmas(&self) -> &PragmaRegistry {
        &self.pragmas
    }

    /// Mutable pragma registry access.
    pub fn pragmas_mut(&mut self) -> &mut PragmaRegistry {
        &mut self.pragmas
    }

    /// Append a header search directory.
    pub fn add_include_dir(&mut self, path: &Path, system: bool) {
        self.headers.add_dir(path, system);
    }

    /// Install the external include resolver.
    pub fn set_include_resolver(&mut self, resolver: Box<dyn IncludeResolver>) {
        self.resolver = Some(resolver);
    }

    /// Enter the main input from a file on disk.
    pub fn enter_main_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let text = std::fs::read_to_string(path).map_err(|error| EngineError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let id = self
            .sources
            .add_file(path.to_path_buf(), text, FileCharacteristic::User);
        self.push_source_frame(id);
        Ok(())
    }

    /// Enter the main input from in-memory text.
    pub fn enter_main_source(&mut self, name: impl Into<String>, text: String) {
        let id = self.sources.add_virtual(name.into(), text);
        self.push_source_frame(id);
    }

    /// Register the predefines buffer and enter it ahead of the main input.
    ///
    /// Must be called after the main input is entered; the predefines frame
    /// sits on top of the stack and is processed first.
    pub fn enter_predefines(&mut self, text: String) {
        let id = self.sources.add_virtual("<predefines>", text);
        self.sources.set_predefines(id);
        self.push_source_frame(id);
    }

    /// Lex a buffer and push it as a source frame.
    pub(crate) fn push_source_frame(&mut self, id: SourceId) {
        let output = {
            let Some(file) = self.sources.get(id) else {
                return;
            };
            lex_source(id, file.text(), &self.interner)
        };
        self.emit_lex_errors(&output.errors);
        self.frames.push(Frame::Source {
            id,
            tokens: output.tokens,
            pos: 0,
            conds: Vec::new(),
        });
    }

    /// Splice a token stream into the active lex position.
    ///
    /// The spliced tokens are the next ones delivered, ahead of whatever
    /// the current frame would produce.
    pub fn enter_token_stream(&mut self, tokens: Vec<Token>) {
        if !tokens.is_empty() {
            self.frames.push(Frame::Splice { tokens, pos: 0 });
        }
    }

    /// Push tokens back so they are delivered again.
    pub(crate) fn push_back(&mut self, tokens: Vec<Token>) {
        self.enter_token_stream(tokens);
    }

    /// Pull the next token off the frame stack, popping exhausted frames.
    ///
    /// Returns the main input's `Eof` token (repeatedly) once everything is
    /// exhausted. Performs no directive handling or expansion.
    pub(crate) fn next_raw_token(&mut self) -> Token {
        loop {
            let depth = self.frames.len();
            let step = match self.frames.last_mut() {
                None => Step::Empty,
                Some(Frame::Source { tokens, pos, .. }) => {
                    let tok = tokens[*pos];
                    if tok.is_eof() {
                        if depth == 1 {
                            Step::MainEof(tok)
                        } else {
                            Step::PopSource
                        }
                    } else {
                        *pos += 1;
                        Step::Tok(tok, true)
                    }
                }
                Some(Frame::Splice { tokens, pos }) => {
                    if *pos < tokens.len() {
                        let tok = tokens[*pos];
                        *pos += 1;
                        Step::Tok(tok, false)
                    } else {
                        Step::PopSplice
                    }
                }
            };
            match step {
                Step::Tok(tok, from_source) => {
                    self.last_from_source = from_source;
                    return tok;
                }
                Step::MainEof(tok) => {
                    if !self.eof_reported {
                        self.report_dangling_conditionals();
                        self.eof_reported = true;
                    }
                    self.last_from_source = true;
                    return tok;
                }
                Step::PopSource => {
                    self.report_dangling_conditionals();
                    self.frames.pop();
                }
                Step::PopSplice => {
                    self.frames.pop();
                }
                Step::Empty => {
                    self.last_from_source = false;
                    return Token::synthetic(TokenKind::Eof);
                }
            }
        }
    }

    /// Report conditionals left open by the top source frame.
    fn report_dangling_conditionals(&mut self) {
        let dangling = match self.frames.last_mut() {
            Some(Frame::Source { id, conds, .. }) if !conds.is_empty() => {
                let id = *id;
                conds.clear();
                Some(id)
            }
            _ => None,
        };
        if let Some(id) = dangling {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::UnbalancedConditional,
                "unterminated conditional directive",
                id,
                cpx_ir::Span::DUMMY,
            ));
        }
    }

    /// Pull the next macro-expanded token.
    pub fn lex(&mut self) -> Result<Token, EngineError> {
        self.lex_inner(true)
    }

    /// Pull the next token without macro expansion. Directives are still
    /// processed.
    pub fn lex_unexpanded(&mut self) -> Result<Token, EngineError> {
        self.lex_inner(false)
    }

    fn lex_inner(&mut self, expand: bool) -> Result<Token, EngineError> {
        loop {
            let tok = self.next_raw_token();
            if tok.is_eof() {
                return Ok(tok);
            }

            if tok.is_punct(cpx_ir::Punct::Hash)
                && tok.flags.is_line_start()
                && self.last_from_source
            {
                let line = self.collect_directive_line();
                self.handle_directive(tok, &line)?;
                continue;
            }

            if expand {
                if tok.is_ident(self.names.pragma_op) {
                    if self.pragma_operator(tok)? {
                        continue;
                    }
                    return Ok(tok);
                }
                if let TokenKind::Ident(name) = tok.kind {
                    if let Some(result) = self.try_expand_at_stream(name, tok)? {
                        self.enter_token_stream(result);
                        continue;
                    }
                }
            }

            return Ok(tok);
        }
    }

    /// Lex host-supplied text in an ephemeral context on the shared source
    /// map and interner.
    ///
    /// The tokens are raw: no expansion, no directive handling. Lexical
    /// errors are reported through the diagnostic engine. The trailing
    /// `Eof` is dropped.
    pub fn tokenize_detached(&mut self, text: &str) -> Vec<Token> {
        let id = self.sources.add_virtual("<generated>", text.to_string());
        let output = {
            let Some(file) = self.sources.get(id) else {
                return Vec::new();
            };
            lex_source(id, file.text(), &self.interner)
        };
        self.emit_lex_errors(&output.errors);
        let mut tokens = output.tokens;
        tokens.pop();
        tokens
    }

    /// Surface recovered lexical errors as diagnostics.
    pub(crate) fn emit_lex_errors(&mut self, errors: &[cpx_lexer::LexError]) {
        for err in errors {
            let code = match err.kind {
                LexErrorKind::UnterminatedString => DiagCode::UnterminatedString,
                LexErrorKind::UnterminatedChar => DiagCode::UnterminatedChar,
                LexErrorKind::UnterminatedBlockComment => DiagCode::UnterminatedComment,
            };
            self.diagnostics
                .emit(Diagnostic::error(code, err.kind.to_string(), err.source, err.span));
        }
    }

    /// Render a token sequence as text, inserting single spaces where the
    /// tokens' whitespace flags ask for one.
    pub fn spell_tokens(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for (idx, tok) in tokens.iter().enumerate() {
            if idx > 0 && tok.has_space_before() {
                out.push(' ');
            }
            out.push_str(tok.spelling(&self.interner));
        }
        out
    }

    /// Copy the invocation-site whitespace flags onto the first token of an
    /// expansion.
    pub(crate) fn carry_site_flags(result: &mut [Token], site: Token) {
        if let Some(first) = result.first_mut() {
            first.flags.clear(TokenFlags::SPACE_BEFORE | TokenFlags::LINE_START);
            if site.flags.has_space_before() {
                first.flags.set(TokenFlags::SPACE_BEFORE);
            }
            if site.flags.is_line_start() {
                first.flags.set(TokenFlags::LINE_START);
            }
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
