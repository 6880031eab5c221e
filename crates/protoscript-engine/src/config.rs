//! Compiler options (`protoscript.toml`)
//!
//! ```toml
//! [compiler]
//! opt_level = "basic"
//! module_name = "app"
//! file_name = "app.ps"
//! emit_prelude = true
//! ```

use crate::compiler::optimize::OptLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the options file
    #[error("Failed to read compiler options: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse compiler options: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to render TOML
    #[error("Failed to write compiler options: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Validation error
    #[error("Invalid compiler options: {0}")]
    ValidationError(String),
}

/// Options for one compiler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub opt_level: OptLevel,
    /// Name of the IR module and of the generated translation unit
    pub module_name: String,
    /// Overrides the program's file name in diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Inline the C runtime instead of including `protoscript_runtime.h`
    pub emit_prelude: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Full,
            module_name: "main".to_string(),
            file_name: None,
            emit_prelude: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    compiler: CompilerOptions,
}

impl CompilerOptions {
    /// Parse options from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse options from the text of an options file
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let file: OptionsFile = toml::from_str(content)?;
        file.compiler.validate()?;
        Ok(file.compiler)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "module_name cannot be empty".to_string(),
            ));
        }
        if !self
            .module_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid module_name: {}. Must contain only alphanumeric characters, '_', '-' and '.'",
                self.module_name
            )));
        }
        if self.file_name.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::ValidationError(
                "file_name cannot be empty when given".to_string(),
            ));
        }
        Ok(())
    }

    /// Write options to a file under a `[compiler]` table
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let file = OptionsFile {
            compiler: self.clone(),
        };
        std::fs::write(path, toml::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_table_missing() {
        let options = CompilerOptions::from_str("").unwrap();
        assert_eq!(options, CompilerOptions::default());
        assert_eq!(options.opt_level, OptLevel::Full);
    }

    #[test]
    fn test_parse_compiler_table() {
        let options = CompilerOptions::from_str(
            r#"
            [compiler]
            opt_level = "none"
            module_name = "calc"
            emit_prelude = false
            "#,
        )
        .unwrap();
        assert_eq!(options.opt_level, OptLevel::None);
        assert_eq!(options.module_name, "calc");
        assert!(!options.emit_prelude);
        assert!(options.file_name.is_none());
    }

    #[test]
    fn test_unknown_level_is_a_parse_error() {
        let err = CompilerOptions::from_str("[compiler]\nopt_level = \"max\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation() {
        let err = CompilerOptions::from_str("[compiler]\nmodule_name = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = CompilerOptions::from_str("[compiler]\nmodule_name = \"a b\"\n").unwrap_err();
        assert!(err.to_string().contains("a b"));
    }
}
