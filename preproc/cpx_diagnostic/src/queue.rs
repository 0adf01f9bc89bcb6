//! Collecting queue for unclaimed diagnostics.

use crate::{Diagnostic, Severity};

/// Ordered collection of delivered diagnostics with severity counts.
#[derive(Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        DiagnosticQueue::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Iterate over collected diagnostics in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Check if no diagnostics were collected.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Number of collected errors.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }
}
