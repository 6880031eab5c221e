//! Diagnostic rendering
//!
//! Renders analysis diagnostics with source code context through
//! codespan-reporting, or as JSON for editor integration.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use termcolor::{ColorChoice, StandardStream, WriteColor};

use super::error::Diagnostic;

impl Diagnostic {
    /// Convert into a codespan diagnostic against `file_id`
    pub fn to_codespan(&self, file_id: usize) -> CsDiagnostic<usize> {
        let label_message = match self.hint() {
            Some(hint) => hint,
            None => self.category.to_string(),
        };
        let mut inner = CsDiagnostic::error()
            .with_message(&self.message)
            .with_code(self.code.code)
            .with_labels(vec![
                Label::primary(file_id, self.span.start..self.span.end).with_message(label_message)
            ]);
        inner.notes.push(format!("{} ({})", self.code.name, self.category));
        if let Some(hint) = self.hint() {
            inner.notes.push(format!("help: {}", hint));
        }
        inner
    }

    /// Emit the diagnostic to stderr, colored unless `NO_COLOR` is set
    pub fn emit(
        &self,
        files: &SimpleFiles<String, String>,
        file_id: usize,
    ) -> Result<(), codespan_reporting::files::Error> {
        let mut writer = StandardStream::stderr(color_choice());
        self.emit_to(&mut writer, files, file_id)
    }

    /// Emit the diagnostic to any color-capable writer
    pub fn emit_to(
        &self,
        writer: &mut dyn WriteColor,
        files: &SimpleFiles<String, String>,
        file_id: usize,
    ) -> Result<(), codespan_reporting::files::Error> {
        let config = term::Config::default();
        term::emit(writer, &config, files, &self.to_codespan(file_id))
    }

    /// Convert to JSON representation for IDE integration
    pub fn to_json(
        &self,
        files: &SimpleFiles<String, String>,
        file_id: usize,
    ) -> Result<String, serde_json::Error> {
        let json_diag = JsonDiagnostic::from_diagnostic(self, files, file_id);
        serde_json::to_string_pretty(&json_diag)
    }
}

/// Terminal color mode: `NO_COLOR` wins, otherwise auto-detect
pub fn color_choice() -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// JSON representation of a diagnostic for IDE integration
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    /// Error code (e.g., "E2001")
    pub code: String,
    /// Symbolic name (e.g., "UNDEFINED_NAME")
    pub name: String,
    pub category: String,
    pub severity: String,
    pub message: String,
    pub suggestions: Vec<String>,
    /// Source locations with labels
    pub labels: Vec<JsonLabel>,
}

/// JSON representation of a diagnostic label
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    /// Start line (1-indexed)
    pub start_line: usize,
    /// Start column (1-indexed)
    pub start_column: usize,
    /// End line (1-indexed)
    pub end_line: usize,
    /// End column (1-indexed)
    pub end_column: usize,
    pub message: Option<String>,
    /// Label style (primary or secondary)
    pub style: String,
}

impl JsonDiagnostic {
    pub fn from_diagnostic(
        diag: &Diagnostic,
        files: &SimpleFiles<String, String>,
        file_id: usize,
    ) -> Self {
        let cs = diag.to_codespan(file_id);
        let severity = match cs.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
            Severity::Bug => "bug",
        };

        let labels = cs
            .labels
            .iter()
            .map(|label| {
                let file = files.get(label.file_id).ok();
                let start = file.and_then(|f| f.location((), label.range.start).ok());
                let end = file.and_then(|f| f.location((), label.range.end).ok());
                JsonLabel {
                    file: file
                        .map(|f| f.name().to_string())
                        .unwrap_or_else(|| diag.file.clone()),
                    // Fall back to the recorded line/column when the byte
                    // range is unknown to the file database
                    start_line: start.map_or(diag.line as usize, |l| l.line_number),
                    start_column: start.map_or(diag.col as usize, |l| l.column_number),
                    end_line: end.map_or(diag.line as usize, |l| l.line_number),
                    end_column: end.map_or(diag.col as usize, |l| l.column_number),
                    message: Some(label.message.clone()),
                    style: match label.style {
                        LabelStyle::Primary => "primary",
                        LabelStyle::Secondary => "secondary",
                    }
                    .to_string(),
                }
            })
            .collect();

        JsonDiagnostic {
            code: diag.code.code.to_string(),
            name: diag.code.name.to_string(),
            category: diag.category.to_string(),
            severity: severity.to_string(),
            message: diag.message.clone(),
            suggestions: diag.suggestions.clone(),
            labels,
        }
    }
}

/// Helper to create a SimpleFiles instance from source code
pub fn create_files(
    path: impl Into<PathBuf>,
    source: impl Into<String>,
) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}

/// Serialize a whole diagnostics list, in order
pub fn diagnostics_to_json(diagnostics: &[Diagnostic]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::checker::error::codes;
    use termcolor::{Buffer, NoColor};

    fn undefined_foo() -> Diagnostic {
        Diagnostic::new(
            "test.ps",
            Span::new(8, 11, 1, 9),
            codes::UNDEFINED_NAME,
            "Cannot find name 'foo'",
        )
        .with_suggestions(vec!["for".to_string()])
    }

    #[test]
    fn test_codespan_conversion() {
        let cs = undefined_foo().to_codespan(0);
        assert_eq!(cs.severity, Severity::Error);
        assert_eq!(cs.code.as_deref(), Some("E2001"));
        assert_eq!(cs.labels[0].range, 8..11);
    }

    #[test]
    fn test_render_to_writer() {
        let files = create_files("test.ps", "int x = foo;");
        let mut out = NoColor::new(Vec::new());
        undefined_foo().emit_to(&mut out, &files, 0).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("E2001"));
        assert!(text.contains("Did you mean 'for'?"));
    }

    #[test]
    fn test_render_to_buffer() {
        let files = create_files("test.ps", "int x = foo;");
        let mut buffer = Buffer::no_color();
        undefined_foo().emit_to(&mut buffer, &files, 0).unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("error[E2001]: Cannot find name 'foo'"));
        assert!(text.contains("test.ps:1:9"));
    }

    #[test]
    fn test_json_output() {
        let files = create_files("test.ps", "int x = foo;");
        let json = undefined_foo().to_json(&files, 0).unwrap();

        assert!(json.contains("\"code\": \"E2001\""));
        assert!(json.contains("\"name\": \"UNDEFINED_NAME\""));
        assert!(json.contains("\"start_line\": 1"));
        assert!(json.contains("\"start_column\": 9"));
    }

    #[test]
    fn test_diagnostics_list_json() {
        let json = diagnostics_to_json(&[undefined_foo()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["code"]["code"], "E2001");
        assert_eq!(value[0]["category"], "name_resolution");
        assert_eq!(value[0]["suggestions"][0], "for");
    }
}
