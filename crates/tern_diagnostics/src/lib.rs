//! Request-scoped collector for errors and warnings produced by every pass.
//!
//! Diagnostics are plain data: they carry a 1-based line/column and the file name
//! they belong to (`0:0` and an empty file name when no location applies, e.g. for
//! graph-level problems). Rendering to annotated text happens only at the edge.

use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::Serialize;
use tern_lexer::LineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub file: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            line: 0,
            column: 0,
            file: String::new(),
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn has_location(&self) -> bool {
        self.line > 0
    }

    /// Render as an annotated report when the source text is available,
    /// otherwise as a single `severity: file:line:col: message` line.
    pub fn render(&self, source: Option<&str>) -> String {
        match source {
            Some(text) if self.has_location() => self.render_report(text),
            _ => format!("{}\n", self),
        }
    }

    fn render_report(&self, text: &str) -> String {
        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        // ariadne spans count chars, not bytes
        let index = LineIndex::new(text);
        let byte = index.offset(text, self.line, self.column);
        let start = text[..byte].chars().count();
        let end = (start + 1).min(text.chars().count()).max(start);

        let id = self.file.as_str();
        let mut out = Vec::new();
        let written = Report::build(kind, id, start)
            .with_config(Config::default().with_color(false))
            .with_message(&self.message)
            .with_label(Label::new((id, start..end)).with_message(&self.message))
            .finish()
            .write((id, Source::from(text.to_string())), &mut out);

        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => format!("{}\n", self),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.file.is_empty(), self.has_location()) {
            (true, false) => write!(f, "{}: {}", self.severity, self.message),
            (false, false) => write!(f, "{}: {}: {}", self.severity, self.file, self.message),
            _ => write!(
                f,
                "{}: {}:{}:{}: {}",
                self.severity, self.file, self.line, self.column, self.message
            ),
        }
    }
}

/// Errors and warnings for one compilation, each list in emission order
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn error(&mut self, file: &str, line: u32, column: u32, message: impl Into<String>) {
        self.push(Diagnostic::error(message).with_location(file, line, column));
    }

    pub fn warning(&mut self, file: &str, line: u32, column: u32, message: impl Into<String>) {
        self.push(Diagnostic::warning(message).with_location(file, line, column));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Errors first, then warnings
    pub fn into_vec(self) -> Vec<Diagnostic> {
        let mut all = self.errors;
        all.extend(self.warnings);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_and_warnings_are_kept_apart() {
        let mut diags = Diagnostics::new();
        diags.warning("a.tn", 1, 1, "first warning");
        diags.error("b.tn", 2, 3, "first error");
        diags.warning("a.tn", 4, 1, "second warning");

        assert!(diags.has_errors());
        assert_eq!(diags.errors().len(), 1);
        assert_eq!(diags.warnings().len(), 2);

        let all = diags.into_vec();
        assert_eq!(all[0].message, "first error");
        assert_eq!(all[1].message, "first warning");
        assert_eq!(all[2].message, "second warning");
    }

    #[test]
    fn test_warnings_alone_are_not_errors() {
        let mut diags = Diagnostics::new();
        diags.warning("a.tn", 1, 1, "careful");
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_display_without_location() {
        let diag = Diagnostic::error("no main namespace");
        assert_eq!(diag.to_string(), "error: no main namespace");
        let diag = Diagnostic::warning("cycle").with_file("a.tn");
        assert_eq!(diag.to_string(), "warning: a.tn: cycle");
        let diag = Diagnostic::error("bad").with_location("a.tn", 3, 7);
        assert_eq!(diag.to_string(), "error: a.tn:3:7: bad");
    }

    #[test]
    fn test_render_annotates_source_line() {
        let source = "let x = 1\nlet = 2\n";
        let diag = Diagnostic::error("expected identifier").with_location("main.tn", 2, 5);
        let rendered = diag.render(Some(source));
        assert!(rendered.contains("expected identifier"));
        assert!(rendered.contains("main.tn"));
        assert!(rendered.contains("let = 2"));
    }

    #[test]
    fn test_render_falls_back_without_source() {
        let diag = Diagnostic::error("bad").with_location("a.tn", 1, 1);
        assert_eq!(diag.render(None), "error: a.tn:1:1: bad\n");
    }

    #[test]
    fn test_serializes_lowercase_severity() {
        let diag = Diagnostic::warning("w").with_location("a.tn", 1, 2);
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["line"], 1);
        assert_eq!(json["file"], "a.tn");
    }
}
