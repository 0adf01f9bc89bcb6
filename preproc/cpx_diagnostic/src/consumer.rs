//! Diagnostic delivery through an ordered consumer chain.

use crate::{Diagnostic, DiagnosticQueue};

/// A consumer in the delivery chain.
///
/// Consumers are invoked in registration order. Returning `true` claims the
/// diagnostic: later consumers and the queue never see it, and the consumer
/// takes full responsibility for any follow-up.
pub trait DiagnosticConsumer {
    fn consume(&mut self, diagnostic: &Diagnostic) -> bool;
}

/// Delivers diagnostics through the consumer chain, collecting unclaimed
/// ones in a queue.
#[derive(Default)]
pub struct DiagnosticEngine {
    consumers: Vec<Box<dyn DiagnosticConsumer>>,
    queue: DiagnosticQueue,
}

impl DiagnosticEngine {
    /// Create an engine with an empty chain.
    pub fn new() -> Self {
        DiagnosticEngine::default()
    }

    /// Append a consumer to the chain.
    pub fn push_consumer(&mut self, consumer: Box<dyn DiagnosticConsumer>) {
        self.consumers.push(consumer);
    }

    /// Deliver one diagnostic: first claiming consumer wins, otherwise the
    /// diagnostic is queued.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        for consumer in &mut self.consumers {
            if consumer.consume(&diagnostic) {
                return;
            }
        }
        self.queue.push(diagnostic);
    }

    /// The collected unclaimed diagnostics.
    pub fn queue(&self) -> &DiagnosticQueue {
        &self.queue
    }

    /// Number of unclaimed errors.
    pub fn error_count(&self) -> usize {
        self.queue.error_count()
    }
}

impl std::fmt::Debug for DiagnosticEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticEngine")
            .field("consumers", &self.consumers.len())
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiagCode, Severity};
    use cpx_ir::{SourceId, Span};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Claiming {
        code: DiagCode,
        seen: Rc<RefCell<Vec<DiagCode>>>,
    }

    impl DiagnosticConsumer for Claiming {
        fn consume(&mut self, diagnostic: &Diagnostic) -> bool {
            self.seen.borrow_mut().push(diagnostic.code);
            diagnostic.code == self.code
        }
    }

    fn diag(code: DiagCode) -> Diagnostic {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: String::new(),
            source: SourceId::SYNTHETIC,
            span: Span::DUMMY,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let mut engine = DiagnosticEngine::new();
        engine.push_consumer(Box::new(Claiming {
            code: DiagCode::FileNotFound,
            seen: Rc::clone(&seen_a),
        }));
        engine.push_consumer(Box::new(Claiming {
            code: DiagCode::UserError,
            seen: Rc::clone(&seen_b),
        }));

        engine.emit(diag(DiagCode::FileNotFound));
        // Claimed by the first consumer; never reaches the second or the queue.
        assert_eq!(*seen_a.borrow(), vec![DiagCode::FileNotFound]);
        assert!(seen_b.borrow().is_empty());
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn test_unclaimed_falls_through_to_queue() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = DiagnosticEngine::new();
        engine.push_consumer(Box::new(Claiming {
            code: DiagCode::FileNotFound,
            seen: Rc::clone(&seen),
        }));

        engine.emit(diag(DiagCode::UserError));
        assert_eq!(*seen.borrow(), vec![DiagCode::UserError]);
        assert_eq!(engine.queue().len(), 1);
        assert_eq!(engine.error_count(), 1);
    }
}
