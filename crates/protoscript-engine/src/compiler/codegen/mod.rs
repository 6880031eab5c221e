//! C Code Generation
//!
//! Turns a validated IR module into a single C translation unit that links
//! against nothing but libc and libm.

mod context;
mod ctypes;
mod emit;
mod index;
mod infer;
mod runtime;

pub use context::{dispatcher_name, CGenerator};
pub use ctypes::{container_name, mangle, CTypes};
pub use index::{c_function_name, DefaultMethod, MethodImpl, ModuleIndex};
pub use infer::{infer_function, is_reference, FunctionTypes, IterSource};
pub use runtime::{PRELUDE, RUNTIME_HEADER};

use crate::compiler::ir::{IrModule, Temp};
use thiserror::Error;

/// C generation errors
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("in `{function}`: no type could be inferred for {temp}")]
    UntypedTemp { function: String, temp: Temp },

    #[error("in `{function}`: variable `{name}` is never declared")]
    UnknownVariable { function: String, name: String },

    #[error("in `{function}`: call to unknown function `{callee}`")]
    UnknownFunction { function: String, callee: String },

    #[error("unknown prototype `{name}`")]
    UnknownPrototype { name: String },

    #[error("prototype `{proto}` has no field `{field}`")]
    UnknownField { proto: String, field: String },

    #[error("prototype `{proto}` has no method `{method}`")]
    UnknownMethod { proto: String, method: String },

    #[error("type `{ty}` has no C representation")]
    UnsupportedType { ty: String },

    #[error("in `{function}`: `{op}` is not defined on `{ty}`")]
    Unsupported {
        function: String,
        op: &'static str,
        ty: String,
    },

    #[error("invalid IR: {0}")]
    InvalidIr(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Generate C for `module`
///
/// With `emit_prelude` the runtime is inlined at the top of the output;
/// otherwise the unit includes [`RUNTIME_HEADER`], which must provide the
/// same definitions as [`PRELUDE`].
pub fn generate_c(module: &IrModule, emit_prelude: bool) -> CodegenResult<String> {
    module
        .validate()
        .map_err(|errors| CodegenError::InvalidIr(errors.join("; ")))?;
    tracing::debug!(module = %module.name, emit_prelude, "generating c");
    CGenerator::new(module, emit_prelude).generate()
}
