//! Macro definition synthesis for dynamic macros.
//!
//! The engine's macro table cannot hold callback-computed bodies, but its
//! pragma extension point accepts arbitrary token payloads. The synthesizer
//! bridges the two: a dynamic macro `M` is installed as an ordinary
//! variadic macro whose body expands, in strict order, into
//!
//! ```text
//! __CPX_PRAGMA(__cpx_capture M __VA_ARGS__) _Pragma("__cpx M")
//! ```
//!
//! The predefined helper `__CPX_PRAGMA(...)` stringizes its arguments into
//! a `_Pragma`, so step one fires the capture handler with `M`'s actual
//! arguments (expanded by the engine under its own rules before the capture
//! handler sees them), and step two fires `M`'s namespaced dispatch
//! handler, which consumes the captured frame.

use crate::Error;
use cpx_engine::Preprocessor;
use cpx_ir::{Name, Punct, StringInterner, Token, TokenFlags, TokenKind};

/// Private capture directive name. Double-underscore-reserved, so it cannot
/// collide with user-visible macros or pragmas.
pub(crate) const CAPTURE_PRAGMA: &str = "__cpx_capture";

/// Namespace the per-macro dispatch handlers are registered under.
pub(crate) const DISPATCH_NAMESPACE: &str = "__cpx";

/// The predefined stringize-to-pragma helper macro.
const HELPER_MACRO: &str = "__CPX_PRAGMA";

/// Directive text seeded into the predefines buffer.
pub(crate) fn predefines_text() -> String {
    format!("#define {HELPER_MACRO}(...) _Pragma(#__VA_ARGS__)\n")
}

/// A parsed `define` name: `NAME` or `NAME(a, b, ...)`.
pub(crate) struct MacroSpec {
    pub name: Name,
    pub display: String,
    /// `Some((params, variadic))` for function-like names.
    pub params: Option<(Vec<Name>, bool)>,
}

/// Parse a host-supplied macro name.
///
/// Mirrors the checks a `#define` line would get; every malformation is an
/// `InvalidMacroName` naming the offending input.
pub(crate) fn parse_macro_spec(pp: &mut Preprocessor, name: &str) -> Result<MacroSpec, Error> {
    let invalid = |reason: &str| Error::InvalidMacroName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let tokens = pp.tokenize_detached(name);
    let Some(first) = tokens.first() else {
        return Err(invalid("empty name"));
    };
    let Some(macro_name) = first.kind.ident_name() else {
        return Err(invalid("macro name must be an identifier"));
    };
    let display = pp.interner().lookup_static(macro_name).to_string();

    if tokens.len() == 1 {
        return Ok(MacroSpec {
            name: macro_name,
            display,
            params: None,
        });
    }

    if !tokens[1].is_punct(Punct::LParen) {
        return Err(invalid("expected '(' after macro name"));
    }
    let mut params = Vec::new();
    let mut variadic = false;
    let mut i = 2;
    if tokens.get(i).is_some_and(|t| t.is_punct(Punct::RParen)) {
        i += 1;
    } else {
        loop {
            match tokens.get(i) {
                Some(t) if t.is_punct(Punct::Ellipsis) => {
                    variadic = true;
                    i += 1;
                    if !tokens.get(i).is_some_and(|t| t.is_punct(Punct::RParen)) {
                        return Err(invalid("expected ')' after '...'"));
                    }
                    i += 1;
                    break;
                }
                Some(t) if t.is_punct(Punct::Comma) => {
                    return Err(invalid("expected parameter name before ','"));
                }
                Some(t) => {
                    let Some(param) = t.kind.ident_name() else {
                        return Err(invalid("parameter names must be identifiers"));
                    };
                    params.push(param);
                    i += 1;
                    match tokens.get(i) {
                        Some(t) if t.is_punct(Punct::Comma) => i += 1,
                        Some(t) if t.is_punct(Punct::RParen) => {
                            i += 1;
                            break;
                        }
                        _ => return Err(invalid("expected ',' or ')' in parameter list")),
                    }
                }
                None => return Err(invalid("name ends without matching ')'")),
            }
        }
    }
    if i != tokens.len() {
        return Err(invalid("unexpected tokens after ')'"));
    }
    Ok(MacroSpec {
        name: macro_name,
        display,
        params: Some((params, variadic)),
    })
}

/// Build the crafted variadic body for a dynamic macro.
pub(crate) fn synthesize_dynamic_body(interner: &StringInterner, name: Name) -> Vec<Token> {
    let ident = |text: &str| Token::synthetic(TokenKind::Ident(interner.intern(text)));
    let with_space = |mut tok: Token| {
        tok.flags.set(TokenFlags::SPACE_BEFORE);
        tok
    };
    let punct = |p: Punct| Token::synthetic(TokenKind::Punct(p));

    let name_text = interner.lookup_static(name);
    let dispatch_literal = format!("\"{DISPATCH_NAMESPACE} {name_text}\"");

    vec![
        // __CPX_PRAGMA(__cpx_capture M __VA_ARGS__)
        ident(HELPER_MACRO),
        punct(Punct::LParen),
        ident(CAPTURE_PRAGMA),
        with_space(Token::synthetic(TokenKind::Ident(name))),
        with_space(ident("__VA_ARGS__")),
        punct(Punct::RParen),
        // _Pragma("__cpx M")
        with_space(ident("_Pragma")),
        punct(Punct::LParen),
        Token::synthetic(TokenKind::Str(interner.intern(&dispatch_literal))),
        punct(Punct::RParen),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn pp() -> Preprocessor {
        let mut pp = Preprocessor::new();
        pp.enter_main_source("<main>", String::new());
        pp
    }

    #[test]
    fn test_parse_object_name() {
        let mut pp = pp();
        let Ok(spec) = parse_macro_spec(&mut pp, "ABC") else {
            panic!("plain identifier should parse");
        };
        assert_eq!(spec.display, "ABC");
        assert!(spec.params.is_none());
    }

    #[test]
    fn test_parse_function_name() {
        let mut pp = pp();
        let Ok(spec) = parse_macro_spec(&mut pp, "F(a, b, ...)") else {
            panic!("function-like name should parse");
        };
        let Some((params, variadic)) = spec.params else {
            panic!("expected parameters");
        };
        assert_eq!(params.len(), 2);
        assert!(variadic);
    }

    #[test]
    fn test_parse_rejects_missing_open_paren() {
        let mut pp = pp();
        assert!(matches!(
            parse_macro_spec(&mut pp, "F)"),
            Err(Error::InvalidMacroName { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_leading_comma() {
        let mut pp = pp();
        assert!(matches!(
            parse_macro_spec(&mut pp, "F(, a)"),
            Err(Error::InvalidMacroName { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_unterminated_list() {
        let mut pp = pp();
        assert!(matches!(
            parse_macro_spec(&mut pp, "F(a"),
            Err(Error::InvalidMacroName { .. })
        ));
    }

    #[test]
    fn test_synthesized_body_shape() {
        let mut pp = pp();
        let name = pp.interner().intern("DOUBLE");
        let body = synthesize_dynamic_body(pp.interner(), name);
        let rendered = pp.spell_tokens(&body);
        assert_eq!(
            rendered,
            "__CPX_PRAGMA(__cpx_capture DOUBLE __VA_ARGS__) _Pragma(\"__cpx DOUBLE\")"
        );
    }
}
