//! External include resolution.
//!
//! When header search misses, a configured [`IncludeResolver`] is consulted
//! inline, before any diagnostic exists, with the include form exactly as
//! it was written. The resolver either maps it to an absolute path or
//! declines; every failure mode is contained here and converted to a value.

use std::fmt;
use std::path::PathBuf;

/// An `#include` target: raw name plus angled/quoted form.
///
/// Renders as it appeared in source: `<name>` or `"name"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeForm {
    pub name: String,
    pub angled: bool,
}

impl fmt::Display for IncludeForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.angled {
            write!(f, "<{}>", self.name)
        } else {
            write!(f, "\"{}\"", self.name)
        }
    }
}

/// Failure raised by a resolver.
///
/// Resolver failures never escape into directive handling as-is; the engine
/// converts them into a resolution error naming this description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    message: String,
}

impl ResolveError {
    /// Create a resolve error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        ResolveError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResolveError {}

/// External collaborator mapping an unresolved include form to an absolute
/// path.
///
/// `Ok(None)` means "not mine"; the engine falls back to its ordinary
/// file-not-found handling.
pub trait IncludeResolver {
    fn resolve(&self, include: &IncludeForm) -> Result<Option<PathBuf>, ResolveError>;
}

impl<F> IncludeResolver for F
where
    F: Fn(&IncludeForm) -> Result<Option<PathBuf>, ResolveError>,
{
    fn resolve(&self, include: &IncludeForm) -> Result<Option<PathBuf>, ResolveError> {
        self(include)
    }
}
