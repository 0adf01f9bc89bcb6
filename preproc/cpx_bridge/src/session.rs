//! The preprocessing session facade.
//!
//! One `Session` drives one complete preprocessing run over a single root
//! input, owning the engine and all bridge state: dynamic macro/pragma
//! bindings, the capture stack, and the include resolver. All operations a
//! host calls go through here.

use crate::callback::FunctionMacro;
use crate::error::Error;
use crate::fmt::TokenPrinter;
use crate::handlers::{CaptureHandler, CaptureStack, DispatchHandler};
use crate::stream::TokenStream;
use crate::synth::{
    parse_macro_spec, predefines_text, synthesize_dynamic_body, CAPTURE_PRAGMA, DISPATCH_NAMESPACE,
};
use cpx_diagnostic::{DiagnosticConsumer, DiagnosticQueue};
use cpx_engine::{normalize_body, IncludeResolver, MacroDef, Preprocessor};
use cpx_ir::{Name, Token, TokenCategory};
use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;

/// A preprocessing session over one root input.
pub struct Session {
    pub(crate) pp: Preprocessor,
    capture: Rc<RefCell<CaptureStack>>,
    namespace: Name,
}

impl Session {
    /// Create a session over a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut pp = Preprocessor::new();
        pp.enter_main_file(path.as_ref())?;
        Ok(Self::bootstrap(pp))
    }

    /// Create a session over in-memory source text.
    pub fn from_source(name: &str, text: &str) -> Self {
        let mut pp = Preprocessor::new();
        pp.enter_main_source(name, text.to_string());
        Self::bootstrap(pp)
    }

    fn bootstrap(mut pp: Preprocessor) -> Self {
        pp.enter_predefines(predefines_text());
        let capture = Rc::new(RefCell::new(CaptureStack::default()));
        let capture_name = pp.interner().intern(CAPTURE_PRAGMA);
        let namespace = pp.interner().intern(DISPATCH_NAMESPACE);
        pp.pragmas_mut().add(
            None,
            capture_name,
            Rc::new(CaptureHandler {
                stack: Rc::clone(&capture),
            }),
        );
        Session {
            pp,
            capture,
            namespace,
        }
    }

    /// Install a static macro: object-like, or function-like when `name`
    /// has the form `id(a, b, ...)`.
    ///
    /// Re-defining a name with an identical definition succeeds; an
    /// incompatible redefinition fails and leaves the original intact.
    pub fn define(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let spec = parse_macro_spec(&mut self.pp, name)?;
        let body = normalize_body(&self.pp.tokenize_detached(value));
        let def = match spec.params {
            Some((params, variadic)) => MacroDef::function(spec.name, params, variadic, body),
            None => MacroDef::object(spec.name, body),
        };
        self.pp
            .macros_mut()
            .define(def)
            .map_err(|_| Error::DuplicateDefinition { name: spec.display })
    }

    /// Install a dynamic macro whose expansion is computed by `callback`.
    ///
    /// A declared parameter list is accepted for documentation, but the
    /// installed macro is variadic: the callback receives whatever
    /// arguments the invocation supplies.
    pub fn define_macro(
        &mut self,
        name: &str,
        callback: impl FunctionMacro + 'static,
    ) -> Result<(), Error> {
        let spec = parse_macro_spec(&mut self.pp, name)?;
        if self.pp.macros().contains(spec.name)
            || self.pp.pragmas().contains(Some(self.namespace), spec.name)
        {
            return Err(Error::DuplicateDefinition { name: spec.display });
        }
        tracing::debug!(name = %spec.display, "binding dynamic macro");
        let handler = DispatchHandler {
            name: spec.name,
            display: spec.display.clone(),
            callback: Box::new(callback),
            stack: Rc::clone(&self.capture),
            namespaced: true,
        };
        self.pp
            .pragmas_mut()
            .add(Some(self.namespace), spec.name, Rc::new(handler));
        let body = synthesize_dynamic_body(self.pp.interner(), spec.name);
        self.pp
            .macros_mut()
            .define(MacroDef::function(spec.name, Vec::new(), true, body))
            .map_err(|_| Error::DuplicateDefinition { name: spec.display })
    }

    /// Install a user-facing pragma bound to `callback`.
    ///
    /// `#pragma name tok...` invokes the callback with the directive's own
    /// macro-expanded payload tokens.
    pub fn add_pragma(
        &mut self,
        name: &str,
        callback: impl FunctionMacro + 'static,
    ) -> Result<(), Error> {
        let spec = parse_macro_spec(&mut self.pp, name)?;
        if spec.params.is_some() {
            return Err(Error::InvalidMacroName {
                name: name.to_string(),
                reason: "pragma names take no parameter list".to_string(),
            });
        }
        if self.pp.pragmas().contains(None, spec.name) {
            return Err(Error::DuplicateDefinition { name: spec.display });
        }
        tracing::debug!(name = %spec.display, "binding pragma");
        let handler = DispatchHandler {
            name: spec.name,
            display: spec.display,
            callback: Box::new(callback),
            stack: Rc::clone(&self.capture),
            namespaced: false,
        };
        self.pp.pragmas_mut().add(None, spec.name, Rc::new(handler));
        Ok(())
    }

    /// Append a header search directory.
    pub fn add_include_dir(&mut self, path: impl AsRef<Path>, system: bool) {
        self.pp.add_include_dir(path.as_ref(), system);
    }

    /// Install the resolver consulted when header search misses.
    pub fn set_include_locator(&mut self, resolver: impl IncludeResolver + 'static) {
        self.pp.set_include_resolver(Box::new(resolver));
    }

    /// Lex `text` in isolation: raw tokens on the session's source map and
    /// interner, no expansion, no directives.
    pub fn tokenize(&mut self, text: &str) -> Vec<Token> {
        self.pp.tokenize_detached(text)
    }

    /// Construct a synthetic token.
    pub fn create_token(
        &self,
        category: TokenCategory,
        value: Option<&str>,
    ) -> Result<Token, Error> {
        Token::from_category(category, value, self.pp.interner()).map_err(Error::from)
    }

    /// Pull one token directly: macro-expanded when `expand`, raw
    /// otherwise.
    pub fn next(&mut self, expand: bool) -> Result<Token, Error> {
        let tok = if expand {
            self.pp.lex()
        } else {
            self.pp.lex_unexpanded()
        };
        tok.map_err(Error::from)
    }

    /// The token stream over the full preprocessed output.
    ///
    /// The stream borrows the session; it cannot outlive it.
    pub fn stream(&mut self) -> TokenStream<'_> {
        TokenStream::new(self)
    }

    /// Render a token sequence, reproducing original line/column spacing
    /// where source positions allow.
    pub fn format(&self, tokens: &[Token]) -> String {
        let mut printer = TokenPrinter::new();
        let mut out = String::new();
        for tok in tokens {
            printer.render(tok, self.pp.sources(), self.pp.interner(), &mut out);
        }
        out
    }

    /// Render a single token's spelling.
    pub fn spelling(&self, token: &Token) -> &'static str {
        token.spelling(self.pp.interner())
    }

    /// Drive preprocessing to completion, writing formatted output to
    /// `sink`.
    pub fn preprocess(&mut self, sink: &mut dyn io::Write) -> Result<(), Error> {
        let mut printer = TokenPrinter::new();
        let mut wrote_any = false;
        loop {
            let tok = self.pp.lex()?;
            if tok.is_eof() {
                break;
            }
            if self.pp.sources().is_predefines(tok.source) {
                continue;
            }
            let mut fragment = String::new();
            printer.render(&tok, self.pp.sources(), self.pp.interner(), &mut fragment);
            sink.write_all(fragment.as_bytes()).map_err(Error::Sink)?;
            wrote_any = true;
        }
        if wrote_any {
            sink.write_all(b"\n").map_err(Error::Sink)?;
        }
        Ok(())
    }

    /// Diagnostics collected so far (warnings, recovered errors).
    pub fn diagnostics(&self) -> &DiagnosticQueue {
        self.pp.diagnostics().queue()
    }

    /// Register a diagnostic consumer ahead of the collecting queue.
    ///
    /// Consumers see every non-fatal diagnostic in registration order; the
    /// first one to claim a diagnostic ends its delivery.
    pub fn add_diagnostic_consumer(&mut self, consumer: Box<dyn DiagnosticConsumer>) {
        self.pp.diagnostics_mut().push_consumer(consumer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_static_define_is_rejected() {
        let mut session = Session::from_source("<t>", "ABC");
        let Ok(()) = session.define("ABC", "1") else {
            panic!("first define should succeed");
        };
        let Ok(()) = session.define("ABC", "1") else {
            panic!("identical redefinition should succeed");
        };
        assert!(matches!(
            session.define("ABC", "2"),
            Err(Error::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn test_define_malformed_parameter_list() {
        let mut session = Session::from_source("<t>", "");
        assert!(matches!(
            session.define("F(a,", "x"),
            Err(Error::InvalidMacroName { .. })
        ));
    }

    #[test]
    fn test_create_token_requires_literal_value() {
        let session = Session::from_source("<t>", "");
        assert!(matches!(
            session.create_token(TokenCategory::Identifier, None),
            Err(Error::InvalidLiteral(_))
        ));
        let Ok(tok) = session.create_token(TokenCategory::Identifier, Some("abc")) else {
            panic!("identifier with value should succeed");
        };
        assert_eq!(session.spelling(&tok), "abc");
    }

    #[test]
    fn test_pragma_name_rejects_parameter_list() {
        let mut session = Session::from_source("<t>", "");
        let result = session.add_pragma("p(a)", |_cx: &mut crate::MacroContext<'_>, _args: &[Token]| {
            Ok(Vec::new())
        });
        assert!(matches!(result, Err(Error::InvalidMacroName { .. })));
    }
}
