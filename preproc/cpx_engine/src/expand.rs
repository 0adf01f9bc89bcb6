//! Macro expansion.
//!
//! Expansion is functional: an invocation is rewritten into its fully
//! expanded token sequence before anything is delivered downstream.
//! Recursion is blocked by the active-expansion stack; an identifier that
//! declines expansion because its own macro is active is flagged
//! `NO_EXPAND` permanently, so rescans terminate.
//!
//! The `_Pragma` operator is executed inline during expansion; that is
//! what lets a macro body fire pragma handlers mid-expansion, which the
//! dynamic macro protocol is built on. Tokens a handler splices while an
//! expansion is in progress are reclaimed into that expansion rather than
//! left on the frame stack.

use crate::directive::destringize;
use crate::error::EngineError;
use crate::macros::MacroDef;
use cpx_diagnostic::{DiagCode, Diagnostic};
use cpx_ir::{Name, Punct, SourceId, Span, Token, TokenFlags, TokenKind};
use cpx_lexer::lex_source;

/// Expansion nesting limit.
const MAX_EXPANSION_DEPTH: usize = 128;

/// Match `_Pragma ( "..." )` at `work[i..]`, returning the string's
/// interned name.
fn pragma_payload(work: &[Token], i: usize, pragma_op: Name) -> Option<Name> {
    if !work.get(i).is_some_and(|t| t.is_ident(pragma_op)) {
        return None;
    }
    if !work.get(i + 1).is_some_and(|t| t.is_punct(Punct::LParen)) {
        return None;
    }
    let TokenKind::Str(payload) = work.get(i + 2)?.kind else {
        return None;
    };
    if !work.get(i + 3).is_some_and(|t| t.is_punct(Punct::RParen)) {
        return None;
    }
    Some(payload)
}

/// Index of the `)` matching the `(` at `open`, if present.
fn find_balanced_close(work: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, tok) in work.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::Punct(Punct::LParen) => depth += 1,
            TokenKind::Punct(Punct::RParen) => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

impl crate::Preprocessor {
    /// Expand a macro invocation at the token stream position.
    ///
    /// Returns `None` when the identifier is not (or must not be) expanded:
    /// unknown name, painted token, or a function-like macro name without a
    /// following `(`. Otherwise returns the complete expansion, first token
    /// carrying the invocation site's whitespace flags.
    pub(crate) fn try_expand_at_stream(
        &mut self,
        name: Name,
        site: Token,
    ) -> Result<Option<Vec<Token>>, EngineError> {
        if site.flags.contains(TokenFlags::NO_EXPAND)
            || self.active.contains(&name)
            || !self.macros.contains(name)
        {
            return Ok(None);
        }
        let def = match self.macros.get(name) {
            Some(def) => def.clone(),
            None => return Ok(None),
        };
        let args = if def.is_function_like() {
            match self.collect_stream_args(&def, site)? {
                Some(args) => Some(args),
                None => return Ok(None),
            }
        } else {
            None
        };
        let mut result = self.expand_invocation(&def, args, 0)?;
        Self::carry_site_flags(&mut result, site);
        Ok(Some(result))
    }

    /// Fully expand a detached token sequence (bare pragma payloads, host
    /// requests).
    pub fn expand_token_sequence(&mut self, tokens: &[Token]) -> Result<Vec<Token>, EngineError> {
        self.expand_tokens(tokens.to_vec(), 0)
    }

    /// Substitute arguments into a definition body, then expand the result
    /// with the macro painted active.
    fn expand_invocation(
        &mut self,
        def: &MacroDef,
        args: Option<Vec<Vec<Token>>>,
        depth: usize,
    ) -> Result<Vec<Token>, EngineError> {
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(EngineError::TooDeep {
                name: self.interner.lookup_static(def.name).to_string(),
            });
        }
        let substituted = self.substitute(def, args.as_deref(), depth)?;
        self.active.push(def.name);
        let result = self.expand_tokens(substituted, depth + 1);
        self.active.pop();
        result
    }

    /// The expansion driver: rescans a working sequence, expanding macros
    /// and executing `_Pragma` operators until nothing is left to do.
    pub(crate) fn expand_tokens(
        &mut self,
        tokens: Vec<Token>,
        depth: usize,
    ) -> Result<Vec<Token>, EngineError> {
        let mut work = tokens;
        let mut out: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < work.len() {
            let tok = work[i];

            if let Some(payload) = pragma_payload(&work, i, self.names.pragma_op) {
                let text = destringize(self.interner.lookup_static(payload));
                let spliced = self.execute_pragma_text_reclaiming(&text)?;
                // Handler output replaces the operator and is rescanned.
                let _removed: Vec<Token> = work.splice(i..i + 4, spliced).collect();
                continue;
            }

            let TokenKind::Ident(name) = tok.kind else {
                out.push(tok);
                i += 1;
                continue;
            };
            if tok.flags.contains(TokenFlags::NO_EXPAND) || !self.macros.contains(name) {
                out.push(tok);
                i += 1;
                continue;
            }
            if self.active.contains(&name) {
                work[i].flags.set(TokenFlags::NO_EXPAND);
                out.push(work[i]);
                i += 1;
                continue;
            }
            let def = match self.macros.get(name) {
                Some(def) => def.clone(),
                None => {
                    out.push(tok);
                    i += 1;
                    continue;
                }
            };
            if def.is_function_like() {
                if !work.get(i + 1).is_some_and(|t| t.is_punct(Punct::LParen)) {
                    out.push(tok);
                    i += 1;
                    continue;
                }
                let Some(close) = find_balanced_close(&work, i + 1) else {
                    // No matching ')' in this sequence: not an invocation.
                    out.push(tok);
                    i += 1;
                    continue;
                };
                let args = self.split_args(&def, &work[i + 2..close], tok)?;
                let mut expansion = self.expand_invocation(&def, Some(args), depth)?;
                Self::carry_site_flags(&mut expansion, tok);
                out.extend(expansion);
                i = close + 1;
            } else {
                let mut expansion = self.expand_invocation(&def, None, depth)?;
                Self::carry_site_flags(&mut expansion, tok);
                out.extend(expansion);
                i += 1;
            }
        }
        Ok(out)
    }

    /// Collect a function-like invocation's arguments from the live token
    /// stream. Returns `None` (with lookahead pushed back) when no `(`
    /// follows the macro name.
    fn collect_stream_args(
        &mut self,
        def: &MacroDef,
        site: Token,
    ) -> Result<Option<Vec<Vec<Token>>>, EngineError> {
        let lparen = self.next_raw_token();
        if !lparen.is_punct(Punct::LParen) {
            if !lparen.is_eof() {
                self.push_back(vec![lparen]);
            }
            return Ok(None);
        }
        let mut inner = Vec::new();
        let mut depth = 1usize;
        loop {
            let tok = self.next_raw_token();
            if tok.is_eof() {
                return Err(EngineError::Directive {
                    code: DiagCode::MalformedDirective,
                    message: format!(
                        "unterminated invocation of macro '{}'",
                        self.interner.lookup_static(def.name)
                    ),
                    source: site.source,
                    span: site.span,
                });
            }
            match tok.kind {
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            inner.push(tok);
        }
        Ok(Some(self.split_args(def, &inner, site)?))
    }

    /// Split collected invocation tokens into per-parameter argument lists.
    ///
    /// Top-level commas separate the named arguments; for variadic macros
    /// the remainder (commas included) becomes the trailing argument.
    fn split_args(
        &self,
        def: &MacroDef,
        inner: &[Token],
        site: Token,
    ) -> Result<Vec<Vec<Token>>, EngineError> {
        let named = def.param_names().len();
        let total = named + usize::from(def.variadic);
        let mut args: Vec<Vec<Token>> = vec![Vec::new()];
        let mut depth = 0usize;
        for tok in inner {
            match tok.kind {
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => depth = depth.saturating_sub(1),
                TokenKind::Punct(Punct::Comma)
                    if depth == 0 && (!def.variadic || args.len() < total) =>
                {
                    args.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(last) = args.last_mut() {
                last.push(*tok);
            }
        }

        let name = self.interner.lookup_static(def.name);
        if def.variadic {
            if args.len() == named {
                args.push(Vec::new());
            }
            if args.len() != total {
                return Err(EngineError::Directive {
                    code: DiagCode::MalformedDirective,
                    message: format!(
                        "macro '{name}' requires at least {named} argument(s), but only {} given",
                        args.len()
                    ),
                    source: site.source,
                    span: site.span,
                });
            }
        } else if named == 0 {
            if args.len() == 1 && args[0].is_empty() {
                args.clear();
            } else {
                return Err(EngineError::Directive {
                    code: DiagCode::MalformedDirective,
                    message: format!("macro '{name}' passed arguments, but takes none"),
                    source: site.source,
                    span: site.span,
                });
            }
        } else if args.len() != named {
            return Err(EngineError::Directive {
                code: DiagCode::MalformedDirective,
                message: format!(
                    "macro '{name}' passed {} argument(s), expected {named}",
                    args.len()
                ),
                source: site.source,
                span: site.span,
            });
        }
        Ok(args)
    }

    /// Position of `tok` in the definition's parameter list, with
    /// `__VA_ARGS__` addressing the trailing variadic slot.
    fn param_index(&self, def: &MacroDef, tok: Token) -> Option<usize> {
        let TokenKind::Ident(n) = tok.kind else {
            return None;
        };
        if let Some(idx) = def.param_names().iter().position(|&p| p == n) {
            return Some(idx);
        }
        if def.variadic && n == self.names.va_args {
            return Some(def.param_names().len());
        }
        None
    }

    /// Rewrite a definition body with arguments substituted, `#` and `##`
    /// applied. Ordinary parameter uses get fully pre-expanded arguments;
    /// stringize and paste operands use the raw argument tokens.
    fn substitute(
        &mut self,
        def: &MacroDef,
        args: Option<&[Vec<Token>]>,
        depth: usize,
    ) -> Result<Vec<Token>, EngineError> {
        let body = &def.body;
        let mut out = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let tok = body[i];

            if def.is_function_like() && tok.is_punct(Punct::Hash) {
                if let Some(p) = body
                    .get(i + 1)
                    .copied()
                    .and_then(|t| self.param_index(def, t))
                {
                    let empty = Vec::new();
                    let arg = args.and_then(|a| a.get(p)).unwrap_or(&empty);
                    out.push(self.stringize(arg, tok));
                    i += 2;
                    continue;
                }
            }

            if body.get(i + 1).is_some_and(|t| t.is_punct(Punct::HashHash))
                && i + 2 < body.len()
                && !tok.is_punct(Punct::HashHash)
            {
                let mut acc = self.paste_operand(def, args, tok);
                let mut j = i + 1;
                while j + 1 < body.len() && body[j].is_punct(Punct::HashHash) {
                    let rhs = self.paste_operand(def, args, body[j + 1]);
                    acc = self.paste(acc, rhs);
                    j += 2;
                }
                Self::carry_site_flags(&mut acc, tok);
                out.extend(acc);
                i = j;
                continue;
            }

            if let Some(p) = self.param_index(def, tok) {
                let arg = args.and_then(|a| a.get(p)).cloned().unwrap_or_default();
                let mut expanded = self.expand_tokens(arg, depth + 1)?;
                Self::carry_site_flags(&mut expanded, tok);
                out.extend(expanded);
                i += 1;
                continue;
            }

            out.push(tok);
            i += 1;
        }
        Ok(out)
    }

    /// A `##` operand: raw argument tokens for parameters, the literal
    /// token otherwise.
    fn paste_operand(&self, def: &MacroDef, args: Option<&[Vec<Token>]>, tok: Token) -> Vec<Token> {
        if let Some(p) = self.param_index(def, tok) {
            if let Some(arg) = args.and_then(|a| a.get(p)) {
                return arg.clone();
            }
        }
        vec![tok]
    }

    /// Paste the last token of `lhs` against the first of `rhs`, re-lexing
    /// the concatenated spelling. An empty operand drops out (placemarker
    /// behavior); a paste that does not form one token is reported and both
    /// tokens are kept.
    fn paste(&mut self, mut lhs: Vec<Token>, rhs: Vec<Token>) -> Vec<Token> {
        let Some(left) = lhs.pop() else {
            return rhs;
        };
        let Some((right, rhs_rest)) = rhs.split_first() else {
            lhs.push(left);
            return lhs;
        };
        let text = format!(
            "{}{}",
            left.spelling(&self.interner),
            right.spelling(&self.interner)
        );
        let lexed = lex_source(SourceId::SYNTHETIC, &text, &self.interner);
        // Exactly the pasted token plus Eof means the paste formed one token.
        if lexed.errors.is_empty() && lexed.tokens.len() == 2 {
            let mut pasted = lexed.tokens[0];
            pasted.source = SourceId::SYNTHETIC;
            pasted.span = Span::DUMMY;
            pasted.flags = TokenFlags::from_bits(TokenFlags::SYNTHETIC);
            if left.has_space_before() {
                pasted.flags.set(TokenFlags::SPACE_BEFORE);
            }
            lhs.push(pasted);
        } else {
            self.diagnostics.emit(Diagnostic::error(
                DiagCode::MalformedDirective,
                format!("pasting formed '{text}', an invalid preprocessing token"),
                left.source,
                left.span,
            ));
            lhs.push(left);
            lhs.push(*right);
        }
        lhs.extend_from_slice(rhs_rest);
        lhs
    }

    /// Build the string literal for `#arg`: spellings joined by single
    /// spaces where the tokens had whitespace, quotes and backslashes in
    /// nested literals escaped.
    fn stringize(&self, tokens: &[Token], hash: Token) -> Token {
        let mut text = String::from("\"");
        for (idx, tok) in tokens.iter().enumerate() {
            if idx > 0 && tok.has_space_before() {
                text.push(' ');
            }
            let spelling = tok.spelling(&self.interner);
            match tok.kind {
                TokenKind::Str(_) | TokenKind::CharLit(_) => {
                    for c in spelling.chars() {
                        if c == '"' || c == '\\' {
                            text.push('\\');
                        }
                        text.push(c);
                    }
                }
                _ => text.push_str(spelling),
            }
        }
        text.push('"');
        let mut tok = Token::synthetic(TokenKind::Str(self.interner.intern(&text)));
        if hash.has_space_before() {
            tok.flags.set(TokenFlags::SPACE_BEFORE);
        }
        if hash.flags.is_line_start() {
            tok.flags.set(TokenFlags::LINE_START);
        }
        tok
    }
}
