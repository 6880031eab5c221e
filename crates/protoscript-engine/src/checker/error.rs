//! Diagnostic codes and the diagnostic record produced by analysis

use crate::ast::Span;
use serde::Serialize;
use std::fmt;

/// Error code with its symbolic name (`E3005` / `STATIC_EMPTY_POP`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCode {
    pub code: &'static str,
    pub name: &'static str,
}

impl ErrorCode {
    pub const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }

    pub fn as_str(&self) -> &'static str {
        self.code
    }

    /// Numeric part of the code (`3005` for `E3005`)
    pub fn number(&self) -> u32 {
        self.code
            .get(1..)
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0)
    }

    pub fn category(&self) -> DiagnosticCategory {
        DiagnosticCategory::from_number(self.number())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.name)
    }
}

/// Every compile-time diagnostic code
pub mod codes {
    use super::ErrorCode;

    // Name resolution
    pub const UNDEFINED_NAME: ErrorCode = ErrorCode::new("E2001", "UNDEFINED_NAME");
    pub const UNDEFINED_FUNCTION: ErrorCode = ErrorCode::new("E2002", "UNDEFINED_FUNCTION");
    pub const UNDEFINED_PROTOTYPE: ErrorCode = ErrorCode::new("E2003", "UNDEFINED_PROTOTYPE");
    pub const UNDEFINED_MEMBER: ErrorCode = ErrorCode::new("E2004", "UNDEFINED_MEMBER");
    pub const DUPLICATE_DECLARATION: ErrorCode =
        ErrorCode::new("E2005", "DUPLICATE_DECLARATION");

    // Types
    pub const TYPE_MISMATCH: ErrorCode = ErrorCode::new("E3001", "TYPE_MISMATCH");
    pub const INVALID_OPERAND: ErrorCode = ErrorCode::new("E3002", "INVALID_OPERAND");
    pub const ARGUMENT_COUNT: ErrorCode = ErrorCode::new("E3003", "ARGUMENT_COUNT");
    pub const CONDITION_NOT_BOOL: ErrorCode = ErrorCode::new("E3004", "CONDITION_NOT_BOOL");
    pub const STATIC_EMPTY_POP: ErrorCode = ErrorCode::new("E3005", "STATIC_EMPTY_POP");
    pub const INVALID_CAST: ErrorCode = ErrorCode::new("E3006", "INVALID_CAST");
    pub const CAST_NOT_REPRESENTABLE: ErrorCode =
        ErrorCode::new("E3007", "CAST_NOT_REPRESENTABLE");
    pub const CONST_REASSIGN: ErrorCode = ErrorCode::new("E3008", "CONST_REASSIGN");
    pub const CONST_WITHOUT_INIT: ErrorCode = ErrorCode::new("E3009", "CONST_WITHOUT_INIT");
    pub const GROUP_MEMBER_ASSIGN: ErrorCode = ErrorCode::new("E3010", "GROUP_MEMBER_ASSIGN");
    pub const RETURN_TYPE_MISMATCH: ErrorCode =
        ErrorCode::new("E3011", "RETURN_TYPE_MISMATCH");

    // Control flow and statements
    pub const MISSING_RETURN_VALUE: ErrorCode =
        ErrorCode::new("E3012", "MISSING_RETURN_VALUE");
    pub const BREAK_OUTSIDE_LOOP: ErrorCode = ErrorCode::new("E3013", "BREAK_OUTSIDE_LOOP");
    pub const CONTINUE_OUTSIDE_LOOP: ErrorCode =
        ErrorCode::new("E3014", "CONTINUE_OUTSIDE_LOOP");
    pub const SWITCH_FALLTHROUGH: ErrorCode = ErrorCode::new("E3015", "SWITCH_FALLTHROUGH");
    pub const INVALID_CATCH_TYPE: ErrorCode = ErrorCode::new("E3016", "INVALID_CATCH_TYPE");
    pub const THROW_NON_EXCEPTION: ErrorCode = ErrorCode::new("E3017", "THROW_NON_EXCEPTION");
    pub const UNINITIALIZED_USE: ErrorCode = ErrorCode::new("E3018", "UNINITIALIZED_USE");
    pub const RETURN_SELF: ErrorCode = ErrorCode::new("E3019", "RETURN_SELF");
    pub const NOT_CALLABLE: ErrorCode = ErrorCode::new("E3020", "NOT_CALLABLE");
    pub const SELF_OUTSIDE_METHOD: ErrorCode = ErrorCode::new("E3021", "SELF_OUTSIDE_METHOD");
    pub const READ_ONLY_TARGET: ErrorCode = ErrorCode::new("E3022", "READ_ONLY_TARGET");

    // Visibility and literals
    pub const INTERNAL_ACCESS: ErrorCode = ErrorCode::new("E3100", "INTERNAL_ACCESS");
    pub const BYTE_LITERAL_RANGE: ErrorCode = ErrorCode::new("E3101", "BYTE_LITERAL_RANGE");

    // Groups
    pub const GROUP_BASE_TYPE: ErrorCode = ErrorCode::new("E3110", "GROUP_BASE_TYPE");
    pub const GROUP_NOT_CONSTANT: ErrorCode = ErrorCode::new("E3111", "GROUP_NOT_CONSTANT");
    pub const GROUP_DUPLICATE_MEMBER: ErrorCode =
        ErrorCode::new("E3112", "GROUP_DUPLICATE_MEMBER");
    pub const GROUP_MEMBER_TYPE: ErrorCode = ErrorCode::new("E3113", "GROUP_MEMBER_TYPE");

    // Prototype registry
    pub const BUILTIN_REDECLARED: ErrorCode = ErrorCode::new("E3130", "BUILTIN_REDECLARED");
    pub const DUPLICATE_MEMBER: ErrorCode = ErrorCode::new("E3131", "DUPLICATE_MEMBER");
    pub const FIELD_SHADOWS_ANCESTOR: ErrorCode =
        ErrorCode::new("E3132", "FIELD_SHADOWS_ANCESTOR");
    pub const UNKNOWN_PARENT: ErrorCode = ErrorCode::new("E3133", "UNKNOWN_PARENT");
    pub const OVERRIDE_VISIBILITY: ErrorCode = ErrorCode::new("E3134", "OVERRIDE_VISIBILITY");
    pub const OVERRIDE_SIGNATURE: ErrorCode = ErrorCode::new("E3135", "OVERRIDE_SIGNATURE");
    pub const INHERITANCE_CYCLE: ErrorCode = ErrorCode::new("E3136", "INHERITANCE_CYCLE");
    pub const DUPLICATE_PROTOTYPE: ErrorCode = ErrorCode::new("E3137", "DUPLICATE_PROTOTYPE");
    pub const SEALED_INHERITANCE: ErrorCode = ErrorCode::new("E3140", "SEALED_INHERITANCE");

    // Imports
    pub const UNKNOWN_MODULE: ErrorCode = ErrorCode::new("E5001", "UNKNOWN_MODULE");
    pub const UNKNOWN_IMPORT: ErrorCode = ErrorCode::new("E5002", "UNKNOWN_IMPORT");
    pub const DUPLICATE_IMPORT: ErrorCode = ErrorCode::new("E5003", "DUPLICATE_IMPORT");
}

/// Coarse classification derived from the code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// E1xxx
    Parse,
    /// E2xxx
    NameResolution,
    /// E3000-E3099
    Type,
    /// E3100-E3999: visibility, groups, prototype declarations
    Declaration,
    /// E5xxx
    Import,
    /// Anything else
    Internal,
}

impl DiagnosticCategory {
    pub fn from_number(number: u32) -> Self {
        match number {
            1000..=1999 => DiagnosticCategory::Parse,
            2000..=2999 => DiagnosticCategory::NameResolution,
            3000..=3099 => DiagnosticCategory::Type,
            3100..=3999 => DiagnosticCategory::Declaration,
            5000..=5999 => DiagnosticCategory::Import,
            _ => DiagnosticCategory::Internal,
        }
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticCategory::Parse => "parse",
            DiagnosticCategory::NameResolution => "name resolution",
            DiagnosticCategory::Type => "type",
            DiagnosticCategory::Declaration => "declaration",
            DiagnosticCategory::Import => "import",
            DiagnosticCategory::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// One reported problem
///
/// Immutable once built; at most two suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub code: ErrorCode,
    pub category: DiagnosticCategory,
    pub message: String,
    pub suggestions: Vec<String>,
    /// Byte range of the offending node (for source rendering)
    #[serde(skip)]
    pub span: Span,
}

impl Diagnostic {
    pub fn new(file: &str, span: Span, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            line: span.line,
            col: span.column,
            code,
            category: code.category(),
            message: message.into(),
            suggestions: Vec::new(),
            span,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions.into_iter().take(2).collect();
        self
    }

    /// "Did you mean 'x'?" / "Did you mean 'x' or 'y'?"
    pub fn hint(&self) -> Option<String> {
        match self.suggestions.as_slice() {
            [one] => Some(format!("Did you mean '{}'?", one)),
            [a, b] => Some(format!("Did you mean '{}' or '{}'?", a, b)),
            _ => None,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} {}: {}",
            self.file, self.line, self.col, self.code.code, self.code.name, self.message
        )?;
        if let Some(hint) = self.hint() {
            write!(f, " {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code_range() {
        assert_eq!(
            codes::UNDEFINED_NAME.category(),
            DiagnosticCategory::NameResolution
        );
        assert_eq!(codes::STATIC_EMPTY_POP.category(), DiagnosticCategory::Type);
        assert_eq!(
            codes::SEALED_INHERITANCE.category(),
            DiagnosticCategory::Declaration
        );
        assert_eq!(codes::UNKNOWN_MODULE.category(), DiagnosticCategory::Import);
        assert_eq!(
            ErrorCode::new("E1001", "UNEXPECTED_TOKEN").category(),
            DiagnosticCategory::Parse
        );
    }

    #[test]
    fn test_display_with_hint() {
        let diag = Diagnostic::new(
            "main.ps",
            Span::at(3, 7),
            codes::UNDEFINED_NAME,
            "Cannot find name 'cout'",
        )
        .with_suggestions(vec!["count".to_string()]);

        assert_eq!(
            diag.to_string(),
            "main.ps:3:7: E2001 UNDEFINED_NAME: Cannot find name 'cout' Did you mean 'count'?"
        );
    }

    #[test]
    fn test_suggestions_are_capped() {
        let diag = Diagnostic::new("a.ps", Span::default(), codes::UNDEFINED_NAME, "x")
            .with_suggestions(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(diag.suggestions.len(), 2);
    }
}
