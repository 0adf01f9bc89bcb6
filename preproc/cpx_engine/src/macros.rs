//! The macro table.
//!
//! Stores token-sequence macro bodies only. There is deliberately no
//! callback-computed body here; dynamic behavior is layered on through the
//! pragma extension point, which is what keeps the table dumb enough to
//! compare definitions structurally.

use cpx_ir::{Name, SourceId, Span, Token, TokenFlags};
use rustc_hash::FxHashMap;
use std::fmt;

/// Canonicalize tokens for storage as a macro body.
///
/// Positional flags are meaningless inside a body (the expansion site
/// decides them), and definition-site spans must not leak into output
/// formatting, so bodies are stored position-free.
pub fn normalize_body(tokens: &[Token]) -> Vec<Token> {
    let mut body = tokens.to_vec();
    for tok in &mut body {
        tok.flags.clear(TokenFlags::LINE_START);
        tok.flags.set(TokenFlags::SYNTHETIC);
        tok.source = SourceId::SYNTHETIC;
        tok.span = Span::DUMMY;
    }
    if let Some(first) = body.first_mut() {
        first.flags.clear(TokenFlags::SPACE_BEFORE);
    }
    body
}

/// A macro definition.
///
/// `params` is `None` for object-like macros. For variadic macros the named
/// parameters exclude `__VA_ARGS__`; the trailing arguments are collected
/// separately.
#[derive(Clone, Debug)]
pub struct MacroDef {
    pub name: Name,
    pub params: Option<Vec<Name>>,
    pub variadic: bool,
    pub body: Vec<Token>,
}

impl MacroDef {
    /// Create an object-like definition.
    pub fn object(name: Name, body: Vec<Token>) -> Self {
        MacroDef {
            name,
            params: None,
            variadic: false,
            body,
        }
    }

    /// Create a function-like definition.
    pub fn function(name: Name, params: Vec<Name>, variadic: bool, body: Vec<Token>) -> Self {
        MacroDef {
            name,
            params: Some(params),
            variadic,
            body,
        }
    }

    /// Check for a function-like definition.
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Named parameters (empty for object-like macros).
    pub fn param_names(&self) -> &[Name] {
        self.params.as_deref().unwrap_or(&[])
    }

    /// Structural identity: same shape, same parameters, same body
    /// spellings and spacing. Spans are irrelevant.
    pub fn identical_to(&self, other: &MacroDef) -> bool {
        if self.params != other.params || self.variadic != other.variadic {
            return false;
        }
        if self.body.len() != other.body.len() {
            return false;
        }
        self.body
            .iter()
            .zip(other.body.iter())
            .all(|(a, b)| a.kind == b.kind && a.has_space_before() == b.has_space_before())
    }
}

/// Error installing a definition that conflicts with an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineConflict {
    pub name: Name,
}

impl fmt::Display for DefineConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "macro already defined with a different definition")
    }
}

impl std::error::Error for DefineConflict {}

/// The session's macro table.
#[derive(Default, Debug)]
pub struct MacroTable {
    map: FxHashMap<Name, MacroDef>,
}

impl MacroTable {
    /// Create an empty table.
    pub fn new() -> Self {
        MacroTable::default()
    }

    /// Look up a definition.
    pub fn get(&self, name: Name) -> Option<&MacroDef> {
        self.map.get(&name)
    }

    /// Check whether a name is defined.
    pub fn contains(&self, name: Name) -> bool {
        self.map.contains_key(&name)
    }

    /// Install a definition with idempotent-if-identical semantics.
    ///
    /// Re-installing an identical definition succeeds and keeps the
    /// original; an incompatible redefinition is rejected without touching
    /// the table.
    pub fn define(&mut self, def: MacroDef) -> Result<(), DefineConflict> {
        if let Some(existing) = self.map.get(&def.name) {
            if existing.identical_to(&def) {
                return Ok(());
            }
            return Err(DefineConflict { name: def.name });
        }
        self.map.insert(def.name, def);
        Ok(())
    }

    /// Install a definition, replacing any existing one.
    ///
    /// Returns `true` when an incompatible definition was replaced (the
    /// caller reports the redefinition warning).
    pub fn define_or_replace(&mut self, def: MacroDef) -> bool {
        let replaced_incompatible = self
            .map
            .get(&def.name)
            .is_some_and(|existing| !existing.identical_to(&def));
        self.map.insert(def.name, def);
        replaced_incompatible
    }

    /// Remove a definition (`#undef`). Removing an unknown name is not an
    /// error.
    pub fn remove(&mut self, name: Name) {
        self.map.remove(&name);
    }
}
