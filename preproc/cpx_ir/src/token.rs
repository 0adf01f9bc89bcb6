//! Token representation for the preprocessor.
//!
//! A token records its lexical kind, the buffer it came from, its span in
//! that buffer and its whitespace flags. Identifier and literal spellings
//! are interned; punctuators carry their canonical spelling in the kind.

use crate::{Name, SourceId, Span, StringInterner};
use std::fmt;

/// Per-token whitespace and metadata flags.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct TokenFlags(u8);

impl TokenFlags {
    /// Whitespace (or a comment) preceded this token.
    pub const SPACE_BEFORE: u8 = 1 << 0;
    /// Token is the first significant token on its line.
    pub const LINE_START: u8 = 1 << 1;
    /// Token was constructed by a host or the engine, not lexed from a
    /// buffer.
    pub const SYNTHETIC: u8 = 1 << 2;
    /// Identifier declined expansion while its own macro was active; it is
    /// never considered for expansion again.
    pub const NO_EXPAND: u8 = 1 << 3;

    /// Empty flags (no bits set).
    pub const EMPTY: Self = TokenFlags(0);

    /// Create flags from raw bits.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        TokenFlags(bits)
    }

    /// Get the raw bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if a specific flag is set.
    #[inline]
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Set a flag.
    #[inline]
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Clear a flag.
    #[inline]
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Check if whitespace preceded this token.
    #[inline]
    pub const fn has_space_before(self) -> bool {
        self.contains(Self::SPACE_BEFORE)
    }

    /// Check if this token starts its line.
    #[inline]
    pub const fn is_line_start(self) -> bool {
        self.contains(Self::LINE_START)
    }
}

/// C punctuators, with canonical spellings.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Punct {
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semi,      // ;
    Colon,     // :
    Question,  // ?
    Dot,       // .
    Ellipsis,  // ...
    Arrow,     // ->
    PlusPlus,  // ++
    MinusMinus, // --
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Amp,       // &
    Pipe,      // |
    Caret,     // ^
    Tilde,     // ~
    Bang,      // !
    AmpAmp,    // &&
    PipePipe,  // ||
    Shl,       // <<
    Shr,       // >>
    Lt,        // <
    Gt,        // >
    Le,        // <=
    Ge,        // >=
    EqEq,      // ==
    Ne,        // !=
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    ShlEq,     // <<=
    ShrEq,     // >>=
    AmpEq,     // &=
    CaretEq,   // ^=
    PipeEq,    // |=
    Hash,      // #
    HashHash,  // ##
}

impl Punct {
    /// Canonical spelling of the punctuator.
    pub const fn spelling(self) -> &'static str {
        match self {
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::Comma => ",",
            Punct::Semi => ";",
            Punct::Colon => ":",
            Punct::Question => "?",
            Punct::Dot => ".",
            Punct::Ellipsis => "...",
            Punct::Arrow => "->",
            Punct::PlusPlus => "++",
            Punct::MinusMinus => "--",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::Amp => "&",
            Punct::Pipe => "|",
            Punct::Caret => "^",
            Punct::Tilde => "~",
            Punct::Bang => "!",
            Punct::AmpAmp => "&&",
            Punct::PipePipe => "||",
            Punct::Shl => "<<",
            Punct::Shr => ">>",
            Punct::Lt => "<",
            Punct::Gt => ">",
            Punct::Le => "<=",
            Punct::Ge => ">=",
            Punct::EqEq => "==",
            Punct::Ne => "!=",
            Punct::Eq => "=",
            Punct::PlusEq => "+=",
            Punct::MinusEq => "-=",
            Punct::StarEq => "*=",
            Punct::SlashEq => "/=",
            Punct::PercentEq => "%=",
            Punct::ShlEq => "<<=",
            Punct::ShrEq => ">>=",
            Punct::AmpEq => "&=",
            Punct::CaretEq => "^=",
            Punct::PipeEq => "|=",
            Punct::Hash => "#",
            Punct::HashHash => "##",
        }
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Lexical category of a token.
///
/// Spellings of identifiers and literals are interned `Name`s; literal
/// spellings are stored verbatim (quotes and escapes included).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenKind {
    /// Identifier (interned). Keywords are not distinguished at the
    /// preprocessing level.
    Ident(Name),
    /// Preprocessing number: `42`, `3.14f`, `0x1p-2` (spelling preserved).
    Number(Name),
    /// String literal, quotes included: `"abc"`.
    Str(Name),
    /// Character literal, quotes included: `'a'`.
    CharLit(Name),
    /// Punctuator.
    Punct(Punct),
    /// A byte sequence with no preprocessing meaning (passes through).
    Unknown(Name),
    /// End of input.
    Eof,
}

impl TokenKind {
    /// The interned identifier name, if this is an identifier.
    #[inline]
    pub fn ident_name(self) -> Option<Name> {
        match self {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Check for end of input.
    #[inline]
    pub fn is_eof(self) -> bool {
        matches!(self, TokenKind::Eof)
    }
}

/// Host-facing lexical category used to construct synthetic tokens.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TokenCategory {
    Identifier,
    Number,
    Str,
    CharLit,
    Punct(Punct),
}

/// Error constructing a synthetic token with a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidLiteral {
    /// Identifier kind requested without a name.
    MissingIdentifierValue,
    /// Literal kind requested without a value.
    MissingLiteralValue(&'static str),
}

impl fmt::Display for InvalidLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidLiteral::MissingIdentifierValue => {
                write!(f, "expected a non-empty value for identifier")
            }
            InvalidLiteral::MissingLiteralValue(kind) => {
                write!(f, "expected a non-empty value for {kind} literal")
            }
        }
    }
}

impl std::error::Error for InvalidLiteral {}

/// A token with its owning buffer, span and whitespace flags.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub source: SourceId,
    pub span: Span,
    pub flags: TokenFlags,
}

impl Token {
    /// Create a token lexed from a registered buffer.
    #[inline]
    pub fn new(kind: TokenKind, source: SourceId, span: Span, flags: TokenFlags) -> Self {
        Token {
            kind,
            source,
            span,
            flags,
        }
    }

    /// Create a synthetic token with no backing buffer.
    pub fn synthetic(kind: TokenKind) -> Self {
        Token {
            kind,
            source: SourceId::SYNTHETIC,
            span: Span::DUMMY,
            flags: TokenFlags::from_bits(TokenFlags::SYNTHETIC),
        }
    }

    /// Construct a synthetic token from a host-facing category and optional
    /// value.
    ///
    /// Identifier and literal categories require a non-empty value;
    /// punctuator categories ignore the value and use the canonical
    /// spelling.
    pub fn from_category(
        category: TokenCategory,
        value: Option<&str>,
        interner: &StringInterner,
    ) -> Result<Self, InvalidLiteral> {
        let value = value.filter(|v| !v.is_empty());
        let kind = match category {
            TokenCategory::Identifier => {
                let text = value.ok_or(InvalidLiteral::MissingIdentifierValue)?;
                TokenKind::Ident(interner.intern(text))
            }
            TokenCategory::Number => {
                let text = value.ok_or(InvalidLiteral::MissingLiteralValue("numeric"))?;
                TokenKind::Number(interner.intern(text))
            }
            TokenCategory::Str => {
                let text = value.ok_or(InvalidLiteral::MissingLiteralValue("string"))?;
                TokenKind::Str(interner.intern(text))
            }
            TokenCategory::CharLit => {
                let text = value.ok_or(InvalidLiteral::MissingLiteralValue("character"))?;
                TokenKind::CharLit(interner.intern(text))
            }
            TokenCategory::Punct(punct) => TokenKind::Punct(punct),
        };
        Ok(Token::synthetic(kind))
    }

    /// Render the token's spelling.
    ///
    /// Identifiers and literals render their interned text; punctuators
    /// render the canonical spelling.
    pub fn spelling(&self, interner: &StringInterner) -> &'static str {
        match self.kind {
            TokenKind::Ident(name)
            | TokenKind::Number(name)
            | TokenKind::Str(name)
            | TokenKind::CharLit(name)
            | TokenKind::Unknown(name) => interner.lookup_static(name),
            TokenKind::Punct(punct) => punct.spelling(),
            TokenKind::Eof => "",
        }
    }

    /// Check if whitespace preceded this token.
    #[inline]
    pub fn has_space_before(&self) -> bool {
        self.flags.has_space_before()
    }

    /// Check for end of input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.kind.is_eof()
    }

    /// Check whether this token is the identifier `name`.
    #[inline]
    pub fn is_ident(&self, name: Name) -> bool {
        self.kind == TokenKind::Ident(name)
    }

    /// Check whether this token is the punctuator `punct`.
    #[inline]
    pub fn is_punct(&self, punct: Punct) -> bool {
        self.kind == TokenKind::Punct(punct)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:?}:{}", self.kind, self.source, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_punct_spelling() {
        assert_eq!(Punct::Ellipsis.spelling(), "...");
        assert_eq!(Punct::HashHash.spelling(), "##");
        assert_eq!(Punct::LParen.spelling(), "(");
    }

    #[test]
    fn test_spelling_renders_interned_text() {
        let interner = StringInterner::new();
        let token = Token::synthetic(TokenKind::Ident(interner.intern("abc")));
        assert_eq!(token.spelling(&interner), "abc");

        let token = Token::synthetic(TokenKind::Str(interner.intern("\"x\"")));
        assert_eq!(token.spelling(&interner), "\"x\"");

        let token = Token::synthetic(TokenKind::Punct(Punct::Arrow));
        assert_eq!(token.spelling(&interner), "->");
    }

    #[test]
    fn test_from_category_identifier_requires_value() {
        let interner = StringInterner::new();
        assert_eq!(
            Token::from_category(TokenCategory::Identifier, None, &interner),
            Err(InvalidLiteral::MissingIdentifierValue)
        );
        assert_eq!(
            Token::from_category(TokenCategory::Identifier, Some(""), &interner),
            Err(InvalidLiteral::MissingIdentifierValue)
        );
    }

    #[test]
    fn test_from_category_literal_requires_value() {
        let interner = StringInterner::new();
        assert_eq!(
            Token::from_category(TokenCategory::Number, None, &interner),
            Err(InvalidLiteral::MissingLiteralValue("numeric"))
        );
    }

    #[test]
    fn test_from_category_punct_ignores_value() {
        let interner = StringInterner::new();
        let Ok(token) = Token::from_category(TokenCategory::Punct(Punct::Plus), None, &interner)
        else {
            panic!("punctuator without value should succeed");
        };
        assert_eq!(token.kind, TokenKind::Punct(Punct::Plus));
        assert!(token.flags.contains(TokenFlags::SYNTHETIC));
    }

    #[test]
    fn test_flags() {
        let mut flags = TokenFlags::EMPTY;
        assert!(!flags.has_space_before());
        flags.set(TokenFlags::SPACE_BEFORE);
        assert!(flags.has_space_before());
        flags.clear(TokenFlags::SPACE_BEFORE);
        assert!(!flags.has_space_before());
    }
}
