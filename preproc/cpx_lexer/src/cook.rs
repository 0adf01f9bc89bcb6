//! Token cooking layer.
//!
//! Transforms raw lexemes into flag-annotated [`Token`]s with string
//! interning:
//!
//! ```text
//! text → RawTok stream → fold trivia into flags → intern → Token
//! ```
//!
//! Trivia never reaches the engine; it survives only as `SPACE_BEFORE` /
//! `LINE_START` flags on the next significant token.

use crate::lex_error::{LexError, LexErrorKind};
use crate::raw::RawTok;
use cpx_ir::{Punct, SourceId, Span, StringInterner, Token, TokenFlags, TokenKind};
use logos::Logos;

/// Result of lexing one buffer.
#[derive(Debug)]
pub struct LexOutput {
    /// Cooked tokens; always terminated by an `Eof` token.
    pub tokens: Vec<Token>,
    /// Recovered lexical errors, in source order.
    pub errors: Vec<LexError>,
}

/// Lex a registered buffer into cooked tokens.
///
/// Never fails: malformed lexemes are recovered (the spelling is kept
/// verbatim) and reported in [`LexOutput::errors`].
pub fn lex_source(source: SourceId, text: &str, interner: &StringInterner) -> LexOutput {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    // Flags accumulated from trivia, applied to the next significant token.
    let mut space_before = false;
    let mut line_start = true;

    let mut lexer = RawTok::lexer(text);
    while let Some(raw) = lexer.next() {
        let span = Span::from_range(lexer.span());
        let raw = match raw {
            Ok(raw) => raw,
            Err(()) => {
                // Bytes with no preprocessing meaning (`@`, `$`, a stray
                // backslash) pass through as Unknown tokens.
                let kind = TokenKind::Unknown(interner.intern(lexer.slice()));
                tokens.push(make_token(kind, source, span, &mut space_before, &mut line_start));
                continue;
            }
        };

        let kind = match raw {
            RawTok::Whitespace | RawTok::LineComment | RawTok::BlockComment => {
                space_before = true;
                continue;
            }
            RawTok::Newline => {
                space_before = false;
                line_start = true;
                continue;
            }
            RawTok::LineContinuation => {
                // Splices the next line onto this one: whitespace, but not
                // a line start.
                space_before = true;
                continue;
            }
            RawTok::BlockCommentUnterminated => {
                errors.push(LexError {
                    kind: LexErrorKind::UnterminatedBlockComment,
                    source,
                    span,
                });
                space_before = true;
                continue;
            }
            RawTok::Ident => TokenKind::Ident(interner.intern(lexer.slice())),
            RawTok::Number => TokenKind::Number(interner.intern(lexer.slice())),
            RawTok::Str => TokenKind::Str(interner.intern(lexer.slice())),
            RawTok::StrUnterminated => {
                errors.push(LexError {
                    kind: LexErrorKind::UnterminatedString,
                    source,
                    span,
                });
                TokenKind::Str(interner.intern(lexer.slice()))
            }
            RawTok::CharLit => TokenKind::CharLit(interner.intern(lexer.slice())),
            RawTok::CharLitUnterminated => {
                errors.push(LexError {
                    kind: LexErrorKind::UnterminatedChar,
                    source,
                    span,
                });
                TokenKind::CharLit(interner.intern(lexer.slice()))
            }
            raw => TokenKind::Punct(punct_for(raw)),
        };

        tokens.push(make_token(kind, source, span, &mut space_before, &mut line_start));
    }

    let end = Span::from_range(text.len()..text.len());
    tokens.push(make_token(
        TokenKind::Eof,
        source,
        end,
        &mut space_before,
        &mut line_start,
    ));

    LexOutput { tokens, errors }
}

fn make_token(
    kind: TokenKind,
    source: SourceId,
    span: Span,
    space_before: &mut bool,
    line_start: &mut bool,
) -> Token {
    let mut flags = TokenFlags::EMPTY;
    if *space_before {
        flags.set(TokenFlags::SPACE_BEFORE);
    }
    if *line_start {
        flags.set(TokenFlags::LINE_START);
    }
    *space_before = false;
    *line_start = false;
    Token::new(kind, source, span, flags)
}

/// Map a raw punctuator lexeme to its token kind.
fn punct_for(raw: RawTok) -> Punct {
    match raw {
        RawTok::LParen => Punct::LParen,
        RawTok::RParen => Punct::RParen,
        RawTok::LBrace => Punct::LBrace,
        RawTok::RBrace => Punct::RBrace,
        RawTok::LBracket => Punct::LBracket,
        RawTok::RBracket => Punct::RBracket,
        RawTok::Comma => Punct::Comma,
        RawTok::Semi => Punct::Semi,
        RawTok::Ellipsis => Punct::Ellipsis,
        RawTok::Dot => Punct::Dot,
        RawTok::Arrow => Punct::Arrow,
        RawTok::PlusPlus => Punct::PlusPlus,
        RawTok::MinusMinus => Punct::MinusMinus,
        RawTok::PlusEq => Punct::PlusEq,
        RawTok::MinusEq => Punct::MinusEq,
        RawTok::StarEq => Punct::StarEq,
        RawTok::SlashEq => Punct::SlashEq,
        RawTok::PercentEq => Punct::PercentEq,
        RawTok::ShlEq => Punct::ShlEq,
        RawTok::ShrEq => Punct::ShrEq,
        RawTok::AmpEq => Punct::AmpEq,
        RawTok::CaretEq => Punct::CaretEq,
        RawTok::PipeEq => Punct::PipeEq,
        RawTok::Shl => Punct::Shl,
        RawTok::Shr => Punct::Shr,
        RawTok::Le => Punct::Le,
        RawTok::Ge => Punct::Ge,
        RawTok::EqEq => Punct::EqEq,
        RawTok::Ne => Punct::Ne,
        RawTok::AmpAmp => Punct::AmpAmp,
        RawTok::PipePipe => Punct::PipePipe,
        RawTok::Plus => Punct::Plus,
        RawTok::Minus => Punct::Minus,
        RawTok::Star => Punct::Star,
        RawTok::Slash => Punct::Slash,
        RawTok::Percent => Punct::Percent,
        RawTok::Amp => Punct::Amp,
        RawTok::Pipe => Punct::Pipe,
        RawTok::Caret => Punct::Caret,
        RawTok::Tilde => Punct::Tilde,
        RawTok::Bang => Punct::Bang,
        RawTok::Lt => Punct::Lt,
        RawTok::Gt => Punct::Gt,
        RawTok::Question => Punct::Question,
        RawTok::Colon => Punct::Colon,
        RawTok::Eq => Punct::Eq,
        RawTok::HashHash => Punct::HashHash,
        RawTok::Hash => Punct::Hash,
        // Trivia and literal categories are handled before this point.
        RawTok::Whitespace
        | RawTok::Newline
        | RawTok::LineContinuation
        | RawTok::LineComment
        | RawTok::BlockComment
        | RawTok::BlockCommentUnterminated
        | RawTok::Ident
        | RawTok::Number
        | RawTok::Str
        | RawTok::StrUnterminated
        | RawTok::CharLit
        | RawTok::CharLitUnterminated => unreachable!("trivia handled by cooker"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpx_ir::SourceMap;
    use pretty_assertions::assert_eq;

    fn lex(text: &str) -> (Vec<Token>, StringInterner) {
        let mut map = SourceMap::new();
        let id = map.add_virtual("<test>", text.to_string());
        let interner = StringInterner::new();
        let out = lex_source(id, text, &interner);
        assert!(out.errors.is_empty(), "unexpected lex errors: {:?}", out.errors);
        (out.tokens, interner)
    }

    fn spellings(tokens: &[Token], interner: &StringInterner) -> Vec<&'static str> {
        tokens
            .iter()
            .filter(|t| !t.is_eof())
            .map(|t| t.spelling(interner))
            .collect()
    }

    #[test]
    fn test_simple_expression() {
        let (tokens, interner) = lex("a+b");
        assert_eq!(spellings(&tokens, &interner), vec!["a", "+", "b"]);
        // No whitespace anywhere
        assert!(!tokens[1].has_space_before());
        assert!(!tokens[2].has_space_before());
    }

    #[test]
    fn test_space_flags() {
        let (tokens, interner) = lex("a + b");
        assert_eq!(spellings(&tokens, &interner), vec!["a", "+", "b"]);
        assert!(tokens[0].flags.is_line_start());
        assert!(!tokens[0].has_space_before());
        assert!(tokens[1].has_space_before());
        assert!(tokens[2].has_space_before());
    }

    #[test]
    fn test_line_start_flags() {
        let (tokens, _) = lex("a\nb c");
        assert!(tokens[0].flags.is_line_start());
        assert!(tokens[1].flags.is_line_start());
        assert!(!tokens[2].flags.is_line_start());
        assert!(tokens[2].has_space_before());
    }

    #[test]
    fn test_comment_counts_as_space() {
        let (tokens, interner) = lex("a/* x */b");
        assert_eq!(spellings(&tokens, &interner), vec!["a", "b"]);
        assert!(tokens[1].has_space_before());
        assert!(!tokens[1].flags.is_line_start());
    }

    #[test]
    fn test_directive_line_shape() {
        let (tokens, interner) = lex("#define ABC 123\nABC");
        assert_eq!(
            spellings(&tokens, &interner),
            vec!["#", "define", "ABC", "123", "ABC"]
        );
        assert!(tokens[0].flags.is_line_start());
        assert!(!tokens[1].flags.is_line_start());
        assert!(tokens[4].flags.is_line_start());
    }

    #[test]
    fn test_line_continuation_is_not_line_start() {
        let (tokens, _) = lex("#define A \\\n 1\nB");
        // "1" is spliced onto the directive line
        assert!(!tokens[3].flags.is_line_start());
        assert!(tokens[3].has_space_before());
        // "B" starts a fresh line
        assert!(tokens[4].flags.is_line_start());
    }

    #[test]
    fn test_unknown_passthrough() {
        let mut map = SourceMap::new();
        let id = map.add_virtual("<test>", "a @ b".to_string());
        let interner = StringInterner::new();
        let out = lex_source(id, "a @ b", &interner);
        assert!(out.errors.is_empty());
        assert_eq!(
            spellings(&out.tokens, &interner),
            vec!["a", "@", "b"]
        );
        assert!(matches!(out.tokens[1].kind, TokenKind::Unknown(_)));
    }

    #[test]
    fn test_unterminated_string_recovers() {
        let mut map = SourceMap::new();
        let text = "\"open\nnext";
        let id = map.add_virtual("<test>", text.to_string());
        let interner = StringInterner::new();
        let out = lex_source(id, text, &interner);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, LexErrorKind::UnterminatedString);
        // The malformed literal is kept, and lexing continues on the next line.
        assert!(matches!(out.tokens[0].kind, TokenKind::Str(_)));
        assert!(matches!(out.tokens[1].kind, TokenKind::Ident(_)));
    }

    #[test]
    fn test_eof_terminated() {
        let (tokens, _) = lex("x");
        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].is_eof());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn lex_never_panics_and_stays_in_bounds(text in "[ -~\n]{0,200}") {
                let mut map = SourceMap::new();
                let id = map.add_virtual("<prop>", text.clone());
                let interner = StringInterner::new();
                let out = lex_source(id, &text, &interner);
                prop_assert!(out.tokens.last().is_some_and(Token::is_eof));
                let mut prev_end = 0u32;
                for tok in &out.tokens {
                    prop_assert!(tok.span.start >= prev_end);
                    prop_assert!(tok.span.end as usize <= text.len());
                    prev_end = tok.span.end;
                }
            }
        }
    }
}
