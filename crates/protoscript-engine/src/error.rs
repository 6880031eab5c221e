//! Compilation errors
//!
//! Everything the pipeline can fail with once analysis has run. Source
//! problems are not errors here: they are [`Diagnostic`]s, and a program
//! with any of them stops at the analysis gate.

use crate::checker::Diagnostic;
use crate::compiler::codegen::CodegenError;
use crate::compiler::ir::IrFormatError;
use crate::compiler::lower::LowerError;
use crate::config::ConfigError;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("analysis reported {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    #[error("lowering failed: {0}")]
    Lower(#[from] LowerError),

    #[error("optimizer produced invalid IR: {0}")]
    InvalidIr(String),

    #[error(transparent)]
    IrFormat(#[from] IrFormatError),

    #[error("C generation failed: {0}")]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CompileError {
    /// Diagnostics behind an analysis-gate failure
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Diagnostics(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}
