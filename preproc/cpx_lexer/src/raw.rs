//! Raw token scanner.
//!
//! Produces raw lexeme categories before interning. Trivia (whitespace,
//! newlines, comments) is emitted as tokens rather than skipped; the cooker
//! consumes it to compute whitespace flags.

use logos::Logos;

/// Raw token from logos (before interning and flag computation).
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawTok {
    #[regex(r"[ \t\r\x0c]+")]
    Whitespace,

    #[token("\n")]
    Newline,

    // Backslash-newline splices lines; it never starts a new logical line.
    #[regex(r"\\[ \t\r]*\n")]
    LineContinuation,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    // A block comment that runs to end of input.
    #[regex(r"/\*([^*]|\*+[^*/])*\*?")]
    BlockCommentUnterminated,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    // Preprocessing number: digits with identifier characters, dots and
    // exponent sign pairs glued on (covers 42, 3.14f, 0x1p-2, 1.0e+9).
    #[regex(r"\.?[0-9]([a-zA-Z0-9_.]|[eEpP][+-])*")]
    Number,

    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    Str,

    #[regex(r#""([^"\\\n]|\\[^\n])*"#)]
    StrUnterminated,

    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    CharLit,

    #[regex(r"'([^'\\\n]|\\[^\n])*")]
    CharLitUnterminated,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&=")]
    AmpEq,
    #[token("^=")]
    CaretEq,
    #[token("|=")]
    PipeEq,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token("##")]
    HashHash,
    #[token("#")]
    Hash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use logos::Logos;

    fn kinds(input: &str) -> Vec<RawTok> {
        RawTok::lexer(input).filter_map(Result::ok).collect()
    }

    #[test]
    fn test_punctuator_maximal_munch() {
        assert_eq!(
            kinds("<<=<<<"),
            vec![RawTok::ShlEq, RawTok::Shl, RawTok::Lt]
        );
        assert_eq!(kinds("##"), vec![RawTok::HashHash]);
        assert_eq!(kinds("...."), vec![RawTok::Ellipsis, RawTok::Dot]);
    }

    #[test]
    fn test_pp_number() {
        assert_eq!(kinds("0x1p-2"), vec![RawTok::Number]);
        assert_eq!(kinds("3.14f"), vec![RawTok::Number]);
        assert_eq!(kinds(".5e+9"), vec![RawTok::Number]);
    }

    #[test]
    fn test_block_comment() {
        assert_eq!(kinds("/* a ** b */"), vec![RawTok::BlockComment]);
        assert_eq!(kinds("/**/"), vec![RawTok::BlockComment]);
        assert_eq!(
            kinds("/* open"),
            vec![RawTok::BlockCommentUnterminated]
        );
    }

    #[test]
    fn test_string_and_char() {
        assert_eq!(kinds(r#""a\"b""#), vec![RawTok::Str]);
        assert_eq!(kinds(r#""open"#), vec![RawTok::StrUnterminated]);
        assert_eq!(kinds(r"'\n'"), vec![RawTok::CharLit]);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(
            kinds("a\\\nb"),
            vec![RawTok::Ident, RawTok::LineContinuation, RawTok::Ident]
        );
    }
}
