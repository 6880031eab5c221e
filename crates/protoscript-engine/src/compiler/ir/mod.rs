//! Intermediate Representation (IR) for ProtoScript
//!
//! A control-flow graph of labeled basic blocks holding three-address
//! instructions, with runtime safety checks made explicit.
//!
//! # Structure
//!
//! - `IrModule` - Functions plus prototype layouts
//! - `IrFunction` - Parameters and labeled basic blocks, entry first
//! - `BasicBlock` - A sequence of instructions with a single entry and exit
//! - `IrInstr` - Three-address code instructions
//! - `Temp` - Single-definition temporaries

pub mod block;
pub mod format;
pub mod function;
pub mod instr;
pub mod module;
pub mod pretty;
pub mod value;

pub use block::{BasicBlock, Terminator};
pub use format::{read_ir, write_ir, IrFormatError};
pub use function::{IrFunction, IrParam};
pub use instr::{IrInstr, IterKind};
pub use module::{IrField, IrModule, IrPrototype};
pub use pretty::PrettyPrint;
pub use value::{IrConstant, Temp};
