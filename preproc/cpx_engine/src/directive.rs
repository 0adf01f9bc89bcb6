//! Directive handling.
//!
//! A directive is a `#` at the start of a line in a source frame, followed
//! by the rest of that line (line continuations were already folded by the
//! lexer). Directives never produce output tokens; they mutate engine
//! state, enter files, or fire pragma handlers.

use crate::engine::{CondState, Frame};
use crate::error::EngineError;
use crate::headers::HeaderNotFound;
use crate::include::IncludeForm;
use crate::macros::{normalize_body, MacroDef};
use cpx_diagnostic::{DiagCode, Diagnostic};
use cpx_ir::{FileCharacteristic, Punct, Token, TokenKind};
use cpx_lexer::lex_source;
use std::path::Path;

/// Include nesting limit; cycles end here instead of exhausting the stack.
const MAX_INCLUDE_DEPTH: usize = 200;

/// Where a conditional-group skip stopped.
enum SkipStop {
    Else,
    Endif,
    Eof,
}

/// Remove `_Pragma` string quoting: strip the delimiting quotes and undo
/// `\"` and `\\` escapes.
pub(crate) fn destringize(spelling: &str) -> String {
    let inner = spelling.strip_prefix('"').unwrap_or(spelling);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Advance past the remaining tokens of a directive line.
fn consume_line(tokens: &[Token], pos: &mut usize) {
    while *pos < tokens.len() && !tokens[*pos].flags.is_line_start() && !tokens[*pos].is_eof() {
        *pos += 1;
    }
}

impl crate::Preprocessor {
    /// Take the rest of the current directive line off the top source
    /// frame.
    pub(crate) fn collect_directive_line(&mut self) -> Vec<Token> {
        let Some(Frame::Source { tokens, pos, .. }) = self.frames.last_mut() else {
            return Vec::new();
        };
        let mut line = Vec::new();
        while *pos < tokens.len() {
            let tok = tokens[*pos];
            if tok.is_eof() || tok.flags.is_line_start() {
                break;
            }
            line.push(tok);
            *pos += 1;
        }
        line
    }

    /// Execute one directive. `hash` is the introducing `#` token, `line`
    /// the rest of its line.
    pub(crate) fn handle_directive(
        &mut self,
        hash: Token,
        line: &[Token],
    ) -> Result<(), EngineError> {
        let Some(first) = line.first() else {
            // Null directive: a lone '#'.
            return Ok(());
        };
        let Some(name) = first.kind.ident_name() else {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                "invalid preprocessing directive",
                first.source,
                first.span,
            ));
            return Ok(());
        };
        let rest = &line[1..];

        if name == self.names.define {
            self.directive_define(first, rest)
        } else if name == self.names.undef {
            self.directive_undef(first, rest)
        } else if name == self.names.include {
            self.directive_include(hash, rest)
        } else if name == self.names.ifdef {
            self.directive_ifdef(false, first, rest)
        } else if name == self.names.ifndef {
            self.directive_ifdef(true, first, rest)
        } else if name == self.names.else_ {
            self.directive_else(first)
        } else if name == self.names.endif {
            self.directive_endif(first)
        } else if name == self.names.pragma {
            self.handle_pragma_tokens(rest)
        } else if name == self.names.error {
            let text = self.spell_tokens(rest);
            let message = if text.is_empty() {
                "#error".to_string()
            } else {
                format!("#error {text}")
            };
            Err(EngineError::Directive {
                code: DiagCode::UserError,
                message,
                source: first.source,
                span: first.span,
            })
        } else if name == self.names.warning {
            let text = self.spell_tokens(rest);
            self.diagnostics.emit(Diagnostic::warning(
                DiagCode::UserWarning,
                text,
                first.source,
                first.span,
            ));
            Ok(())
        } else {
            let spelling = self.interner.lookup_static(name);
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                format!("invalid preprocessing directive '#{spelling}'"),
                first.source,
                first.span,
            ));
            Ok(())
        }
    }

    fn directive_define(&mut self, at: &Token, rest: &[Token]) -> Result<(), EngineError> {
        match self.parse_define(rest) {
            Ok(def) => {
                let name = self.interner.lookup_static(def.name);
                tracing::trace!(name, "defining macro");
                if self.macros.define_or_replace(def) {
                    self.diagnostics.emit(Diagnostic::warning(
                        DiagCode::MacroRedefined,
                        format!("'{name}' macro redefined"),
                        at.source,
                        at.span,
                    ));
                }
                Ok(())
            }
            Err(message) => {
                self.diagnostics.emit(Diagnostic::error(
                    DiagCode::MalformedDirective,
                    message,
                    at.source,
                    at.span,
                ));
                Ok(())
            }
        }
    }

    /// Parse `NAME body...` or `NAME(params) body...` from a `#define`
    /// line.
    pub(crate) fn parse_define(&self, rest: &[Token]) -> Result<MacroDef, String> {
        let Some(first) = rest.first() else {
            return Err("macro name missing in #define".to_string());
        };
        let Some(name) = first.kind.ident_name() else {
            return Err("macro name must be an identifier".to_string());
        };

        // Function-like only when '(' is glued to the name.
        let function_like = rest
            .get(1)
            .is_some_and(|t| t.is_punct(Punct::LParen) && !t.has_space_before());
        if !function_like {
            return Ok(MacroDef::object(name, normalize_body(&rest[1..])));
        }

        let mut params = Vec::new();
        let mut variadic = false;
        let mut i = 2;
        if rest.get(i).is_some_and(|t| t.is_punct(Punct::RParen)) {
            i += 1;
        } else {
            loop {
                match rest.get(i) {
                    Some(t) if t.is_punct(Punct::Ellipsis) => {
                        variadic = true;
                        i += 1;
                        if !rest.get(i).is_some_and(|t| t.is_punct(Punct::RParen)) {
                            return Err("expected ')' after '...' in macro parameter list"
                                .to_string());
                        }
                        i += 1;
                        break;
                    }
                    Some(t) => {
                        let Some(param) = t.kind.ident_name() else {
                            return Err(
                                "expected parameter name in macro parameter list".to_string()
                            );
                        };
                        params.push(param);
                        i += 1;
                        match rest.get(i) {
                            Some(t) if t.is_punct(Punct::Comma) => i += 1,
                            Some(t) if t.is_punct(Punct::RParen) => {
                                i += 1;
                                break;
                            }
                            _ => {
                                return Err(
                                    "expected ',' or ')' in macro parameter list".to_string()
                                )
                            }
                        }
                    }
                    None => return Err("unterminated macro parameter list".to_string()),
                }
            }
        }
        Ok(MacroDef::function(
            name,
            params,
            variadic,
            normalize_body(&rest[i..]),
        ))
    }

    fn directive_undef(&mut self, at: &Token, rest: &[Token]) -> Result<(), EngineError> {
        match rest.first().and_then(|t| t.kind.ident_name()) {
            Some(name) => self.macros.remove(name),
            None => self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                "macro name missing in #undef",
                at.source,
                at.span,
            )),
        }
        Ok(())
    }

    fn directive_include(&mut self, hash: Token, rest: &[Token]) -> Result<(), EngineError> {
        let (name, angled) = self.parse_include_target(hash, rest)?;

        let source_depth = self
            .frames
            .iter()
            .filter(|f| matches!(f, Frame::Source { .. }))
            .count();
        if source_depth >= MAX_INCLUDE_DEPTH {
            return Err(EngineError::Directive {
                code: DiagCode::MalformedDirective,
                message: "#include nested too deeply".to_string(),
                source: hash.source,
                span: hash.span,
            });
        }

        let includer_characteristic = self
            .sources
            .get(hash.source)
            .map_or(FileCharacteristic::User, |f| f.characteristic());
        let current_dir = self
            .sources
            .get(hash.source)
            .and_then(|f| f.path())
            .and_then(|p| p.parent())
            .map(Path::to_path_buf);

        match self.headers.resolve(&name, angled, current_dir.as_deref()) {
            Ok(resolved) => {
                let characteristic = resolved.characteristic.max(includer_characteristic);
                tracing::debug!(path = %resolved.path.display(), "entering include");
                self.enter_include_file(&resolved.path, characteristic)
            }
            Err(HeaderNotFound) => {
                self.resolve_externally(IncludeForm { name, angled }, includer_characteristic)
            }
        }
    }

    /// Consult the external resolver for an include header search missed.
    ///
    /// Every outcome is decided here: enter the resolved file, fail naming
    /// the resolved path, fail naming the original spelling, or fail with
    /// the resolver's own error description. Resolver failures never
    /// propagate as-is.
    fn resolve_externally(
        &mut self,
        form: IncludeForm,
        includer_characteristic: FileCharacteristic,
    ) -> Result<(), EngineError> {
        let Some(resolver) = self.resolver.as_deref() else {
            return Err(EngineError::FileNotFound {
                spelling: form.to_string(),
            });
        };
        match resolver.resolve(&form) {
            Ok(Some(path)) => {
                if path.is_file() {
                    let characteristic = self.headers.dir_flavor(&path).max(includer_characteristic);
                    tracing::debug!(include = %form, path = %path.display(), "resolver located include");
                    self.enter_include_file(&path, characteristic)
                } else {
                    Err(EngineError::FileNotFound {
                        spelling: path.display().to_string(),
                    })
                }
            }
            Ok(None) => Err(EngineError::FileNotFound {
                spelling: form.to_string(),
            }),
            Err(err) => Err(EngineError::Resolution {
                message: err.to_string(),
            }),
        }
    }

    fn parse_include_target(
        &self,
        hash: Token,
        rest: &[Token],
    ) -> Result<(String, bool), EngineError> {
        let malformed = |message: &str| EngineError::Directive {
            code: DiagCode::MalformedDirective,
            message: message.to_string(),
            source: hash.source,
            span: hash.span,
        };
        match rest.first() {
            Some(tok) if matches!(tok.kind, TokenKind::Str(_)) => {
                let spelling = tok.spelling(&self.interner);
                let name = spelling.strip_prefix('"').unwrap_or(spelling);
                let name = name.strip_suffix('"').unwrap_or(name);
                if name.is_empty() {
                    return Err(malformed("empty filename in #include"));
                }
                Ok((name.to_string(), false))
            }
            Some(tok) if tok.is_punct(Punct::Lt) => {
                let Some(gt_idx) = rest.iter().position(|t| t.is_punct(Punct::Gt)) else {
                    return Err(malformed("expected '>' in #include"));
                };
                // The angled name is whatever source text sits between the
                // delimiters; it may lex as many tokens (`<sys/types.h>`).
                let text = self.sources.get(hash.source).map_or("", |f| f.text());
                let name = text
                    .get(tok.span.end as usize..rest[gt_idx].span.start as usize)
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if name.is_empty() {
                    return Err(malformed("empty filename in #include"));
                }
                Ok((name, true))
            }
            _ => Err(malformed("expected \"FILENAME\" or <FILENAME> after #include")),
        }
    }

    /// Read a header and push it as a source frame.
    pub(crate) fn enter_include_file(
        &mut self,
        path: &Path,
        characteristic: FileCharacteristic,
    ) -> Result<(), EngineError> {
        let text = std::fs::read_to_string(path).map_err(|error| EngineError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let id = self.sources.add_file(path.to_path_buf(), text, characteristic);
        self.push_source_frame(id);
        Ok(())
    }

    fn directive_ifdef(
        &mut self,
        negated: bool,
        at: &Token,
        rest: &[Token],
    ) -> Result<(), EngineError> {
        let name = rest.first().and_then(|t| t.kind.ident_name());
        if name.is_none() {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                "macro name missing in conditional directive",
                at.source,
                at.span,
            ));
        }
        let defined = name.is_some_and(|n| self.macros.contains(n));
        let live = defined != negated;
        if let Some(Frame::Source { conds, .. }) = self.frames.last_mut() {
            conds.push(CondState {
                taken: live,
                seen_else: false,
            });
        }
        if !live {
            match self.skip_group(true) {
                SkipStop::Else => {
                    if let Some(Frame::Source { conds, .. }) = self.frames.last_mut() {
                        if let Some(state) = conds.last_mut() {
                            state.taken = true;
                            state.seen_else = true;
                        }
                    }
                }
                SkipStop::Endif => {
                    if let Some(Frame::Source { conds, .. }) = self.frames.last_mut() {
                        conds.pop();
                    }
                }
                SkipStop::Eof => {}
            }
        }
        Ok(())
    }

    fn directive_else(&mut self, at: &Token) -> Result<(), EngineError> {
        let state = match self.frames.last_mut() {
            Some(Frame::Source { conds, .. }) => conds.last_mut(),
            _ => None,
        };
        match state {
            None => {
                self.diagnostics.emit(Diagnostic::error(
                    DiagCode::UnbalancedConditional,
                    "#else without #ifdef",
                    at.source,
                    at.span,
                ));
                Ok(())
            }
            Some(state) if state.seen_else => {
                self.diagnostics.emit(Diagnostic::error(
                    DiagCode::UnbalancedConditional,
                    "#else after #else",
                    at.source,
                    at.span,
                ));
                Ok(())
            }
            Some(state) => {
                // We were lexing the live branch; skip the else branch.
                state.seen_else = true;
                if let SkipStop::Endif = self.skip_group(false) {
                    if let Some(Frame::Source { conds, .. }) = self.frames.last_mut() {
                        conds.pop();
                    }
                }
                Ok(())
            }
        }
    }

    fn directive_endif(&mut self, at: &Token) -> Result<(), EngineError> {
        let popped = match self.frames.last_mut() {
            Some(Frame::Source { conds, .. }) => conds.pop().is_some(),
            _ => false,
        };
        if !popped {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::UnbalancedConditional,
                "#endif without #ifdef",
                at.source,
                at.span,
            ));
        }
        Ok(())
    }

    /// Skip a dead conditional branch in the top source frame.
    ///
    /// Consumes tokens up to and including the `#else` (when `stop_at_else`
    /// and the group has not yet taken a branch) or `#endif` line that
    /// closes the group, tracking nested conditionals.
    fn skip_group(&mut self, stop_at_else: bool) -> SkipStop {
        let (ifdef, ifndef, else_, endif) = (
            self.names.ifdef,
            self.names.ifndef,
            self.names.else_,
            self.names.endif,
        );
        let Some(Frame::Source { tokens, pos, .. }) = self.frames.last_mut() else {
            return SkipStop::Eof;
        };
        let mut depth = 0usize;
        loop {
            if *pos >= tokens.len() || tokens[*pos].is_eof() {
                return SkipStop::Eof;
            }
            let tok = tokens[*pos];
            *pos += 1;
            if !(tok.is_punct(Punct::Hash) && tok.flags.is_line_start()) {
                continue;
            }
            let dname = match tokens.get(*pos) {
                Some(t) if !t.flags.is_line_start() && !t.is_eof() => t.kind.ident_name(),
                _ => None,
            };
            let Some(dname) = dname else {
                continue;
            };
            if dname == ifdef || dname == ifndef {
                depth += 1;
            } else if dname == endif {
                if depth == 0 {
                    consume_line(tokens, pos);
                    return SkipStop::Endif;
                }
                depth -= 1;
            } else if dname == else_ && depth == 0 && stop_at_else {
                consume_line(tokens, pos);
                return SkipStop::Else;
            }
        }
    }

    /// Dispatch a pragma token sequence (`#pragma` line or `_Pragma`
    /// payload) to its handler.
    ///
    /// Unknown pragmas are consumed and ignored.
    pub(crate) fn handle_pragma_tokens(&mut self, tokens: &[Token]) -> Result<(), EngineError> {
        let Some(first) = tokens.first() else {
            return Ok(());
        };
        let TokenKind::Ident(intro) = first.kind else {
            tracing::trace!("ignoring pragma with non-identifier introducer");
            return Ok(());
        };
        if self.pragmas.is_namespace(intro) {
            if let Some(second) = tokens.get(1) {
                if let TokenKind::Ident(name) = second.kind {
                    if let Some(handler) = self.pragmas.get(Some(intro), name) {
                        return handler.handle(self, &tokens[2..]);
                    }
                }
            }
            tracing::trace!(
                namespace = self.interner.lookup_static(intro),
                "ignoring unknown namespaced pragma"
            );
            return Ok(());
        }
        if let Some(handler) = self.pragmas.get(None, intro) {
            return handler.handle(self, &tokens[1..]);
        }
        tracing::trace!(
            name = self.interner.lookup_static(intro),
            "ignoring unknown pragma"
        );
        Ok(())
    }

    /// Handle the `_Pragma("...")` operator. The introducing identifier has
    /// already been consumed; returns `false` (with lookahead pushed back)
    /// when no parenthesized string follows.
    pub(crate) fn pragma_operator(&mut self, at: Token) -> Result<bool, EngineError> {
        let lparen = self.next_raw_token();
        if !lparen.is_punct(Punct::LParen) {
            if !lparen.is_eof() {
                self.push_back(vec![lparen]);
            }
            return Ok(false);
        }
        let literal = self.next_raw_token();
        let TokenKind::Str(text_name) = literal.kind else {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                "_Pragma takes a parenthesized string literal",
                at.source,
                at.span,
            ));
            return Ok(true);
        };
        let rparen = self.next_raw_token();
        if !rparen.is_punct(Punct::RParen) {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                "expected ')' after _Pragma string",
                at.source,
                at.span,
            ));
            if !rparen.is_eof() {
                self.push_back(vec![rparen]);
            }
        }
        let text = destringize(self.interner.lookup_static(text_name));
        self.execute_pragma_text(&text)?;
        Ok(true)
    }

    /// Re-lex `_Pragma` payload text through a virtual buffer and execute
    /// it as a pragma directive.
    pub(crate) fn execute_pragma_text(&mut self, text: &str) -> Result<(), EngineError> {
        let id = self.sources.add_virtual("<_Pragma>", text.to_string());
        let output = {
            let Some(file) = self.sources.get(id) else {
                return Ok(());
            };
            lex_source(id, file.text(), &self.interner)
        };
        self.emit_lex_errors(&output.errors);
        let mut tokens = output.tokens;
        tokens.pop();
        self.handle_pragma_tokens(&tokens)
    }

    /// Execute pragma text and reclaim any tokens its handler spliced,
    /// instead of leaving them on the frame stack.
    ///
    /// Used during functional expansion, where handler output must feed the
    /// expansion in progress rather than the outer token stream.
    pub(crate) fn execute_pragma_text_reclaiming(
        &mut self,
        text: &str,
    ) -> Result<Vec<Token>, EngineError> {
        let frames_before = self.frames.len();
        self.execute_pragma_text(text)?;
        let mut spliced = Vec::new();
        while self.frames.len() > frames_before {
            match self.frames.pop() {
                Some(Frame::Splice { tokens, pos }) => {
                    spliced.extend(tokens.into_iter().skip(pos));
                }
                Some(other) => {
                    self.frames.push(other);
                    break;
                }
                None => break,
            }
        }
        Ok(spliced)
    }
}
