//! The output token stream.
//!
//! Lazy, forward-only, single-pass. One token of lookahead mirrors the
//! pull-ahead the end-of-input check needs; construction skips tokens
//! attributable to the predefines buffer, which are engine-internal.
//!
//! Callback failures are ordinary `Err` values from `next`: a failing
//! handler surfaces on the pull that encounters it instead of silently
//! truncating output.

use crate::error::Error;
use crate::session::Session;
use cpx_ir::Token;

/// Pull-based sequence over the preprocessed output tokens.
///
/// Borrows its session; it cannot outlive it, and the session cannot be
/// used for anything else while a stream is live.
pub struct TokenStream<'s> {
    session: &'s mut Session,
    lookahead: Option<Result<Token, Error>>,
}

impl<'s> TokenStream<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        let lookahead = Some(Self::initial(session));
        TokenStream { session, lookahead }
    }

    /// Initial positioning: skip predefines-buffer tokens.
    fn initial(session: &mut Session) -> Result<Token, Error> {
        loop {
            let tok = session.pp.lex()?;
            if !tok.is_eof() && session.pp.sources().is_predefines(tok.source) {
                continue;
            }
            return Ok(tok);
        }
    }

    /// Whether another `next` call can produce a token or error.
    pub fn has_next(&self) -> bool {
        match &self.lookahead {
            Some(Ok(tok)) => !tok.is_eof(),
            Some(Err(_)) => true,
            None => false,
        }
    }

    /// Pull the next output token.
    ///
    /// Fails with the deferred callback/include error when one was
    /// captured, and with `StreamMisuse` when pulled past exhaustion (after
    /// end of input or after an error was delivered).
    pub fn next(&mut self) -> Result<Token, Error> {
        match self.lookahead.take() {
            Some(Ok(tok)) if tok.is_eof() => {
                self.lookahead = Some(Ok(tok));
                Err(Error::StreamMisuse)
            }
            Some(Ok(tok)) => {
                self.lookahead = Some(self.session.pp.lex().map_err(Error::from));
                Ok(tok)
            }
            Some(Err(err)) => {
                self.lookahead = None;
                Err(err)
            }
            None => Err(Error::StreamMisuse),
        }
    }
}

impl Iterator for TokenStream<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(TokenStream::next(self))
        } else {
            None
        }
    }
}
