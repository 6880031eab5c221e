//! ProtoScript compiler back half
//!
//! - **IR**: per-function control-flow graphs (`ir` module)
//! - **Lowering**: checked AST to IR with explicit safety checks (`lower`)
//! - **Optimizer**: inlining, constant propagation, check elimination
//! - **C backend**: IR to a single C translation unit (`codegen`)

pub mod codegen;
pub mod const_eval;
pub mod ir;
pub mod lower;
pub mod optimize;

pub use codegen::{generate_c, CodegenError, CodegenResult};
pub use lower::{lower_program, LowerError, LowerResult};
pub use optimize::{OptLevel, OptStats, Optimizer};
