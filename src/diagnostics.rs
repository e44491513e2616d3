//! Position-aware, multi-error diagnostics.
//!
//! Every stage of compilation appends to a single [`Diagnostics`] sink and
//! keeps going; the compile call reports failure once, at the end, iff the
//! sink holds any error-severity entry. Nothing on the compile path throws
//! per-problem.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Absolute byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// One compile-time problem with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

/// Append-only collector shared by the lexer, parser, and compiling pass.
/// Lifecycle spans one compile call; read once at the end.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::warning(message, span));
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// The single failure value of a compile call, bundling every collected
/// diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("compilation failed with {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
pub struct CompileError(pub Vec<Diagnostic>);

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }

    /// Render every diagnostic against the source it came from: one header
    /// line with severity and line:column, then the source line with a
    /// caret under the offending column.
    pub fn render(&self, source: &str) -> String {
        let starts = line_starts(source);
        let mut out = String::new();
        for d in &self.0 {
            render_diagnostic(&mut out, source, &starts, d);
        }
        out
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Byte offsets of every line start, for offset -> line/col conversion.
pub fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, ch) in source.char_indices() {
        if ch == '\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Convert a byte offset into a 1-based (line, column) pair.
pub fn offset_to_line_col(starts: &[usize], offset: usize) -> (usize, usize) {
    let mut lo = 0;
    let mut hi = starts.len();
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if starts[mid] <= offset {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + 1, offset.saturating_sub(starts[lo]) + 1)
}

fn render_diagnostic(out: &mut String, source: &str, starts: &[usize], d: &Diagnostic) {
    use fmt::Write;

    let (line, col) = offset_to_line_col(starts, d.span.start);
    let label = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let _ = writeln!(out, "{}:{}: {}: {}", line, col, label, d.message);

    let line_start = starts[line - 1];
    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());
    let _ = writeln!(out, "  {} | {}", line, &source[line_start..line_end]);

    let mut caret = String::from("  ");
    for _ in 0..line.to_string().len() {
        caret.push(' ');
    }
    caret.push_str(" | ");
    for _ in 1..col {
        caret.push(' ');
    }
    caret.push('^');
    let _ = writeln!(out, "{}", caret);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_count_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.error("bad", Span::new(0, 1));
        diags.warning("iffy", Span::new(2, 3));
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.len(), 2);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_offset_to_line_col() {
        let source = "line1\nline2\nline3";
        let starts = line_starts(source);
        assert_eq!(offset_to_line_col(&starts, 0), (1, 1));
        assert_eq!(offset_to_line_col(&starts, 5), (1, 6));
        assert_eq!(offset_to_line_col(&starts, 6), (2, 1));
        assert_eq!(offset_to_line_col(&starts, 12), (3, 1));
    }

    #[test]
    fn test_render_points_caret_at_column() {
        let source = "name = 'tp'\nliteral(?)";
        let err = CompileError(vec![Diagnostic::error(
            "unexpected character '?'",
            Span::new(20, 21),
        )]);
        let rendered = err.render(source);
        assert!(rendered.contains("2:9: error: unexpected character '?'"));
        assert!(rendered.contains("2 | literal(?)"));
        let caret_line = rendered.lines().last().unwrap();
        assert_eq!(caret_line.find('^'), Some(caret_line.find('|').unwrap() + 10));
    }

    #[test]
    fn test_span_merge() {
        let merged = Span::new(4, 8).merge(Span::new(2, 6));
        assert_eq!(merged, Span::new(2, 8));
    }
}
