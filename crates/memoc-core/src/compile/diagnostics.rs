//! Structured compiler diagnostics and their collection.

use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error,
    Warning,
    Note,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Note => f.write_str("note"),
        }
    }
}

/// A location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

/// One message reported by a toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level
    pub kind: DiagnosticKind,

    /// Diagnostic code (e.g., "E0412" or "unused_variables")
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// URI of the source the diagnostic refers to
    pub source: Option<String>,

    /// Primary position in that source
    pub position: Option<Position>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            source: None,
            position: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, code, message)
    }

    pub fn with_source(mut self, uri: impl Into<String>) -> Self {
        self.source = Some(uri.into());
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.position = Some(Position { line, column });
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.kind, self.code, self.message)?;
        match (&self.source, self.position) {
            (Some(source), Some(pos)) => write!(f, " ({source}:{}:{})", pos.line, pos.column),
            (Some(source), None) => write!(f, " ({source})"),
            _ => Ok(()),
        }
    }
}

/// Sink a toolchain reports diagnostics into.
pub trait DiagnosticListener {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Accumulates the diagnostics of one compilation attempt.
///
/// Construct one per attempt; a collector is never reset or shared.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics in the order they were reported.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticKind::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(DiagnosticKind::Warning)
    }

    fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Render every diagnostic as a numbered block.
    ///
    /// ```text
    /// Diagnostic #1
    /// [code: E0412, kind: error]
    /// message: cannot find type `Foo` in this scope
    /// at: memo:///demo/Counter.rs:3:12
    /// ```
    pub fn format(&self) -> String {
        let mut output = String::new();

        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            output.push_str(&format!("Diagnostic #{}\n", i + 1));
            output.push_str(&format!(
                "[code: {}, kind: {}]\n",
                diagnostic.code, diagnostic.kind
            ));
            output.push_str(&format!("message: {}\n", diagnostic.message));
            match (&diagnostic.source, diagnostic.position) {
                (Some(source), Some(pos)) => {
                    output.push_str(&format!("at: {source}:{}:{}\n", pos.line, pos.column));
                }
                (Some(source), None) => output.push_str(&format!("at: {source}\n")),
                _ => {}
            }
        }

        output
    }
}

impl DiagnosticListener for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_numbers_entries() {
        let mut collector = DiagnosticCollector::new();
        collector.report(
            Diagnostic::error("E0412", "cannot find type `Foo` in this scope")
                .with_source("memo:///demo/Counter.rs")
                .at(3, 12),
        );
        collector.report(Diagnostic::warning("unused_variables", "unused variable: `x`"));

        let formatted = collector.format();
        assert!(formatted.starts_with("Diagnostic #1\n[code: E0412, kind: error]\n"));
        assert!(formatted.contains("at: memo:///demo/Counter.rs:3:12"));
        assert!(formatted.contains("Diagnostic #2\n[code: unused_variables, kind: warning]"));
        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.has_errors());
    }

    #[test]
    fn test_empty_collector() {
        let collector = DiagnosticCollector::new();
        assert!(collector.is_empty());
        assert!(!collector.has_errors());
        assert_eq!(collector.format(), "");
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::error("E0308", "mismatched types").at(1, 2);
        assert_eq!(diagnostic.to_string(), "error[E0308]: mismatched types");
    }
}
