//! The capture and dispatch pragma handlers.
//!
//! A dynamic macro invocation reaches its callback through two pragma
//! firings (see the synth module for why):
//!
//! 1. the capture handler stores the invocation's already-expanded argument
//!    tokens, tagged with the target macro's name, on a capture stack;
//! 2. the macro's own dispatch handler pops the stack, verifies the tag,
//!    invokes the callback and splices the result back into the engine.
//!
//! The stack pairs each capture with its dispatch even when dynamic macros
//! nest (an inner invocation inside an outer one's argument list completes
//! its capture/dispatch pair before the outer capture fires). A tag
//! mismatch means the pairing protocol was violated and is an error, not a
//! silent misfire.

use crate::callback::{FunctionMacro, MacroContext};
use cpx_engine::{EngineError, PragmaHandler, Preprocessor};
use cpx_ir::{Name, Punct, Token, TokenFlags, TokenKind};
use std::cell::RefCell;
use std::rc::Rc;

/// Drop the commas separating a captured invocation's arguments.
///
/// The callback contract is "argument tokens": `M(x, y)` hands the
/// callback `[x, y]`. Commas nested in parentheses belong to the argument
/// that contains them and stay.
fn strip_argument_separators(tokens: Vec<Token>) -> Vec<Token> {
    let mut depth = 0usize;
    tokens
        .into_iter()
        .filter(|tok| {
            match tok.kind {
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => depth = depth.saturating_sub(1),
                TokenKind::Punct(Punct::Comma) if depth == 0 => return false,
                _ => {}
            }
            true
        })
        .collect()
}

/// One captured argument sequence awaiting dispatch.
#[derive(Debug)]
pub(crate) struct CaptureFrame {
    /// The dynamic macro these arguments belong to.
    pub name: Name,
    pub tokens: Vec<Token>,
}

/// Session-scoped stack of capture frames.
#[derive(Default, Debug)]
pub(crate) struct CaptureStack {
    frames: Vec<CaptureFrame>,
}

impl CaptureStack {
    fn push(&mut self, frame: CaptureFrame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) -> Option<CaptureFrame> {
        self.frames.pop()
    }
}

/// Records a directive's payload verbatim onto the capture stack.
///
/// Registered once per session under a private name. The first payload
/// token is the target macro's name tag; the rest are the argument tokens,
/// already macro-expanded by the engine. Never fails; an empty directive
/// pushes an empty frame.
pub(crate) struct CaptureHandler {
    pub stack: Rc<RefCell<CaptureStack>>,
}

impl PragmaHandler for CaptureHandler {
    fn handle(&self, _pp: &mut Preprocessor, payload: &[Token]) -> Result<(), EngineError> {
        let (name, tokens) = match payload.split_first() {
            Some((tag, rest)) => (
                tag.kind.ident_name().unwrap_or_default(),
                rest.to_vec(),
            ),
            None => (Name::default(), Vec::new()),
        };
        tracing::trace!(captured = tokens.len(), "pushing capture frame");
        self.stack.borrow_mut().push(CaptureFrame { name, tokens });
        Ok(())
    }
}

/// Invokes one bound callback with captured (or directive) argument tokens
/// and splices the result into the engine.
///
/// Namespaced instances serve dynamic macros and consume the capture stack;
/// bare instances serve user-facing pragmas and take their own directive's
/// payload instead.
pub(crate) struct DispatchHandler {
    pub name: Name,
    pub display: String,
    pub callback: Box<dyn FunctionMacro>,
    pub stack: Rc<RefCell<CaptureStack>>,
    pub namespaced: bool,
}

impl PragmaHandler for DispatchHandler {
    fn handle(&self, pp: &mut Preprocessor, payload: &[Token]) -> Result<(), EngineError> {
        let args = if self.namespaced {
            // Trailing directive tokens are discarded; there should be none.
            let frame = self.stack.borrow_mut().pop();
            let Some(frame) = frame else {
                return Err(EngineError::PragmaProtocol {
                    message: format!("dispatch for '{}' with no captured arguments", self.display),
                });
            };
            if frame.name != self.name {
                return Err(EngineError::PragmaProtocol {
                    message: format!(
                        "capture tagged '{}' dispatched as '{}'",
                        pp.interner().lookup_static(frame.name),
                        self.display
                    ),
                });
            }
            strip_argument_separators(frame.tokens)
        } else {
            // User-facing pragma: the payload is the directive's own tokens,
            // macro-expanded.
            pp.expand_token_sequence(payload)?
        };

        tracing::debug!(name = %self.display, args = args.len(), "invoking dynamic handler");
        let mut cx = MacroContext::new(pp);
        let result = self
            .callback
            .expand(&mut cx, &args)
            .map_err(|err| EngineError::Callback {
                name: self.display.clone(),
                message: err.to_string(),
            })?;

        if !result.is_empty() {
            // The first token keeps its own leading-whitespace flag; every
            // later token gets one so splicing cannot paste tokens together.
            let mut tokens = result;
            for tok in tokens.iter_mut().skip(1) {
                tok.flags.set(TokenFlags::SPACE_BEFORE);
            }
            pp.enter_token_stream(tokens);
        }
        Ok(())
    }
}
