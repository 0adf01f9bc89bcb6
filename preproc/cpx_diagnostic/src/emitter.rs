//! Terminal rendering for diagnostics.

use crate::Diagnostic;
use cpx_ir::SourceMap;
use std::io;

/// Render a diagnostic as a single `file:line:col: severity: message [code]`
/// line.
///
/// Diagnostics on synthetic tokens render without a location prefix.
pub fn render(diagnostic: &Diagnostic, map: &SourceMap) -> String {
    let location = map.get(diagnostic.source).map(|file| {
        let (line, col) = file.line_col(diagnostic.span.start);
        format!("{}:{line}:{col}: ", file.name())
    });
    format!(
        "{}{}: {} [{}]",
        location.unwrap_or_default(),
        diagnostic.severity,
        diagnostic.message,
        diagnostic.code
    )
}

/// Writes rendered diagnostics to an output stream.
pub struct TerminalEmitter<W: io::Write> {
    out: W,
}

impl<W: io::Write> TerminalEmitter<W> {
    /// Create an emitter over a writer.
    pub fn new(out: W) -> Self {
        TerminalEmitter { out }
    }

    /// Emit a single diagnostic.
    pub fn emit(&mut self, diagnostic: &Diagnostic, map: &SourceMap) -> io::Result<()> {
        writeln!(self.out, "{}", render(diagnostic, map))
    }

    /// Emit every diagnostic in the iterator, in order.
    pub fn emit_all<'a>(
        &mut self,
        diagnostics: impl Iterator<Item = &'a Diagnostic>,
        map: &SourceMap,
    ) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.emit(diagnostic, map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiagCode;
    use cpx_ir::{SourceId, Span};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_with_location() {
        let mut map = SourceMap::new();
        let id = map.add_virtual("<main>", "abc\ndef\n".to_string());
        let diag = Diagnostic::error(DiagCode::FileNotFound, "'x.h' not found", id, Span::new(5, 6));
        assert_eq!(
            render(&diag, &map),
            "<main>:2:2: error: 'x.h' not found [E0301]"
        );
    }

    #[test]
    fn test_render_synthetic_without_location() {
        let map = SourceMap::new();
        let diag = Diagnostic::warning(
            DiagCode::UserWarning,
            "careful",
            SourceId::SYNTHETIC,
            Span::DUMMY,
        );
        assert_eq!(render(&diag, &map), "warning: careful [W0501]");
    }

    #[test]
    fn test_emitter_writes_lines() {
        let mut map = SourceMap::new();
        let id = map.add_virtual("<main>", "x".to_string());
        let mut out = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut out);
        let diag = Diagnostic::error(DiagCode::UserError, "boom", id, Span::new(0, 1));
        let Ok(()) = emitter.emit(&diag, &map) else {
            panic!("writing to a Vec cannot fail");
        };
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text, "<main>:1:1: error: boom [E0501]\n");
    }
}
