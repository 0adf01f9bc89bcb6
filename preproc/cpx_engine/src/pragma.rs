//! Pragma handler registry.
//!
//! The engine's only behavioral extension point. Handlers are registered
//! under a bare name or under a namespace (`#pragma ns name ...`); the
//! namespaced form exists so machinery-owned handlers can never collide
//! with user-visible pragma names.

use crate::error::EngineError;
use crate::Preprocessor;
use cpx_ir::{Name, Token};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// A pragma handler.
///
/// `payload` is the directive's own token sequence after the (namespaced)
/// handler name, never including an end-of-directive marker. Handlers may
/// splice tokens back into the active lex position via
/// [`Preprocessor::enter_token_stream`].
pub trait PragmaHandler {
    fn handle(&self, pp: &mut Preprocessor, payload: &[Token]) -> Result<(), EngineError>;
}

/// Registry of pragma handlers keyed by optional namespace + name.
#[derive(Default)]
pub struct PragmaRegistry {
    handlers: FxHashMap<(Option<Name>, Name), Rc<dyn PragmaHandler>>,
    namespaces: FxHashSet<Name>,
}

impl PragmaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        PragmaRegistry::default()
    }

    /// Register a handler. Later registrations under the same key replace
    /// earlier ones; callers enforce uniqueness where it matters.
    pub fn add(&mut self, namespace: Option<Name>, name: Name, handler: Rc<dyn PragmaHandler>) {
        if let Some(ns) = namespace {
            self.namespaces.insert(ns);
        }
        self.handlers.insert((namespace, name), handler);
    }

    /// Check whether a handler is registered under a key.
    pub fn contains(&self, namespace: Option<Name>, name: Name) -> bool {
        self.handlers.contains_key(&(namespace, name))
    }

    /// Check whether a name introduces a handler namespace.
    pub fn is_namespace(&self, name: Name) -> bool {
        self.namespaces.contains(&name)
    }

    /// Look up a handler.
    pub fn get(&self, namespace: Option<Name>, name: Name) -> Option<Rc<dyn PragmaHandler>> {
        self.handlers.get(&(namespace, name)).cloned()
    }
}

impl std::fmt::Debug for PragmaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PragmaRegistry")
            .field("handlers", &self.handlers.len())
            .field("namespaces", &self.namespaces.len())
            .finish()
    }
}
