//! ProtoScript semantic analysis
//!
//! This module provides:
//! - The prototype registry (single inheritance, sealing, overrides)
//! - Lexical scopes with flow facts (initialization, known list lengths)
//! - Import resolution and group validation
//! - Type checking of every function and method body
//! - Diagnostics with suggestions, rendered through codespan-reporting
//!
//! Analysis never aborts: every problem becomes a [`Diagnostic`] and the
//! walk continues. Results the IR builder needs (expression types,
//! resolved calls and members) are recorded in a [`CheckResult`] side
//! table keyed by node identity.

pub mod builtins;
pub mod checker;
pub mod diagnostic;
pub mod error;
mod expr;
pub mod groups;
pub mod imports;
pub mod modules;
pub mod registry;
pub mod suggest;
pub mod symbols;
pub mod value;

pub use builtins::ContainerMethod;
pub use checker::TypeChecker;
pub use diagnostic::{create_files, diagnostics_to_json, JsonDiagnostic};
pub use error::{codes, Diagnostic, DiagnosticCategory, ErrorCode};
pub use groups::{GroupInfo, GroupTable};
pub use imports::ImportScope;
pub use modules::{ModuleLookup, ModuleRegistry};
pub use registry::PrototypeRegistry;
pub use symbols::{Binding, ScopeKind, SymbolTable};
pub use value::ValueKind;

use crate::ast::{Expression, Program};
use crate::compiler::ir::IrConstant;
use crate::types::Type;
use rustc_hash::FxHashMap;

/// What a call expression resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// Function declared in this program
    Function(String),
    /// The built-in `print`
    Print,
    /// Method of a prototype instance; `proto` is the receiver's static type
    Method {
        proto: String,
        method: String,
        /// Some descendant of `proto` overrides the method
        virtual_dispatch: bool,
    },
    /// `Proto.clone()` on a prototype name: a fresh, initialized instance
    PrototypeClone(String),
    /// `obj.clone()` with no override anywhere below `proto`
    InstanceClone(String),
    /// Built-in container or string method
    Container(ContainerMethod),
    /// Module function, or a method of a built-in handle prototype
    Extern {
        module: String,
        func: String,
        ret: Type,
    },
}

/// What an identifier or member expression resolved to, when it is not a
/// plain local variable
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTarget {
    /// `obj.field`
    Field { proto: String, field: String },
    /// Group member, module constant, or directly imported constant
    Constant(IrConstant),
    /// A prototype name used as a value
    Descriptor(String),
}

/// Side tables produced by analysis
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    /// Expression types: maps expression ID (ptr as usize) to its type
    pub expr_types: FxHashMap<usize, Type>,
    /// Resolved call targets, keyed like `expr_types`
    pub call_targets: FxHashMap<usize, CallTarget>,
    /// Resolved non-local names and members, keyed like `expr_types`
    pub value_targets: FxHashMap<usize, ValueTarget>,
    pub groups: GroupTable,
    pub imports: ImportScope,
}

impl CheckResult {
    pub fn type_of(&self, expr: &Expression) -> Option<&Type> {
        self.expr_types.get(&expr.node_id())
    }

    pub fn call_target(&self, expr: &Expression) -> Option<&CallTarget> {
        self.call_targets.get(&expr.node_id())
    }

    pub fn value_target(&self, expr: &Expression) -> Option<&ValueTarget> {
        self.value_targets.get(&expr.node_id())
    }
}

/// Type-check `program` against an already built registry
pub fn check_program(
    program: &Program,
    registry: &PrototypeRegistry,
    modules: &dyn ModuleLookup,
) -> (CheckResult, Vec<Diagnostic>) {
    TypeChecker::new(program, registry, modules).check_program()
}
