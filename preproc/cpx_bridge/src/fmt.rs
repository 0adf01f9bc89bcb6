//! Token output formatting.
//!
//! Reproduces the original line/column layout where a token's source
//! position is derivable. Tokens without a position (callback results,
//! pasted tokens, macro-body tokens) fall back to their whitespace flags,
//! as does the transition between source buffers (returning from an
//! included file, say), where column arithmetic would be meaningless.

use cpx_ir::{SourceId, SourceMap, StringInterner, Token};

/// Tracks the output cursor while rendering a token sequence.
pub(crate) struct TokenPrinter {
    /// Buffer the current line/column tracking belongs to.
    source: Option<SourceId>,
    line: usize,
    col: usize,
    wrote: bool,
}

impl TokenPrinter {
    pub(crate) fn new() -> Self {
        TokenPrinter {
            source: None,
            line: 0,
            col: 1,
            wrote: false,
        }
    }

    /// Append one token to `out`, padding with newlines/spaces to restore
    /// its source layout where possible.
    pub(crate) fn render(
        &mut self,
        token: &Token,
        sources: &SourceMap,
        interner: &StringInterner,
        out: &mut String,
    ) {
        let spelling = token.spelling(interner);
        if spelling.is_empty() {
            return;
        }
        let position = sources
            .line_col(token.source, token.span.start)
            .map(|(line, col)| (line as usize, col as usize));

        match position {
            // Forward motion within the tracked buffer: real layout.
            Some((line, col)) if self.source == Some(token.source) && line >= self.line => {
                if line > self.line {
                    for _ in 0..(line - self.line) {
                        out.push('\n');
                    }
                    self.line = line;
                    self.col = 1;
                }
                if col > self.col {
                    for _ in 0..(col - self.col) {
                        out.push(' ');
                    }
                    self.col = col;
                } else if self.wrote && token.has_space_before() {
                    out.push(' ');
                    self.col += 1;
                }
                out.push_str(spelling);
                self.col += spelling.len();
            }
            // First positioned token, or a buffer change: separate by
            // flags, then adopt the new buffer's tracking.
            Some((line, col)) => {
                let fresh_line = token.flags.is_line_start() || !self.wrote;
                if self.wrote {
                    if token.flags.is_line_start() {
                        out.push('\n');
                    } else if token.has_space_before() {
                        out.push(' ');
                    }
                }
                self.source = Some(token.source);
                self.line = line;
                self.col = 1;
                if fresh_line && col > self.col {
                    for _ in 0..(col - self.col) {
                        out.push(' ');
                    }
                }
                self.col = col;
                out.push_str(spelling);
                self.col += spelling.len();
            }
            // Synthetic token: flags only.
            None => {
                if self.wrote {
                    if token.flags.is_line_start() {
                        out.push('\n');
                        self.col = 1;
                    } else if token.has_space_before() {
                        out.push(' ');
                        self.col += 1;
                    }
                }
                out.push_str(spelling);
                self.col += spelling.len();
            }
        }
        self.wrote = true;
    }
}
