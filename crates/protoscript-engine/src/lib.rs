//! ProtoScript Compiler Engine
//!
//! This crate provides the middle of the ProtoScript toolchain:
//! - **Types**: the type model and its canonical string form (`types` module)
//! - **AST**: the tree handed over by the parser (`ast` module)
//! - **Checker**: prototype registry and semantic analysis (`checker` module)
//! - **Compiler**: IR, optimizations, and C generation (`compiler` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use protoscript_engine::ast::{Expression, FunctionDecl, Program, Statement};
//! use protoscript_engine::checker::ModuleRegistry;
//! use protoscript_engine::{compile_to_c, CompilerOptions, Type};
//!
//! let main = FunctionDecl::new("main", vec![], Type::void(), vec![
//!     Statement::expr(Expression::call("print", vec![Expression::int(42)])),
//! ]);
//! let program = Program::new("main.ps").with_function(main);
//! let c = compile_to_c(&program, &ModuleRegistry::new(), &CompilerOptions::default())?;
//! ```

pub mod ast;
pub mod checker;
pub mod compiler;
pub mod config;
pub mod error;
pub mod types;

pub use checker::{
    check_program, CallTarget, CheckResult, Diagnostic, ModuleLookup, ModuleRegistry,
    PrototypeRegistry, ValueTarget,
};
pub use compiler::{
    generate_c,
    ir::{read_ir, write_ir, IrModule},
    lower_program, CodegenError, LowerError, OptLevel, OptStats, Optimizer,
};
pub use config::{CompilerOptions, ConfigError};
pub use error::{CompileError, CompileResult};
pub use types::{GenericKind, PrimitiveType, Type, TypeParseError};

use crate::ast::Program;
use tracing::debug;

/// Everything analysis produces for one program
#[derive(Debug)]
pub struct Analysis {
    pub registry: PrototypeRegistry,
    pub check: CheckResult,
    /// Registry diagnostics first, then those of the main pass
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// No diagnostics: the program may be lowered
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Build the prototype registry for `program` and type-check it
pub fn analyze(program: &Program, modules: &dyn ModuleLookup) -> Analysis {
    let (registry, mut diagnostics) = PrototypeRegistry::build(program);
    let (check, body_diagnostics) = check_program(program, &registry, modules);
    diagnostics.extend(body_diagnostics);
    debug!(
        file = %program.file,
        diagnostics = diagnostics.len(),
        typed_exprs = check.expr_types.len(),
        "analysis finished"
    );
    Analysis {
        registry,
        check,
        diagnostics,
    }
}

/// Analyze, then lower and optimize into an IR module
///
/// Fails with [`CompileError::Diagnostics`] unless analysis is clean.
pub fn compile_to_ir(
    program: &Program,
    modules: &dyn ModuleLookup,
    options: &CompilerOptions,
) -> CompileResult<(IrModule, OptStats)> {
    options.validate()?;
    let analysis = analyze(program, modules);
    if !analysis.is_clean() {
        let mut diagnostics = analysis.diagnostics;
        if let Some(file) = &options.file_name {
            for diagnostic in &mut diagnostics {
                diagnostic.file = file.clone();
            }
        }
        return Err(CompileError::Diagnostics(diagnostics));
    }

    let module = lower_program(program, &analysis.registry, &analysis.check, &options.module_name)?;
    let (module, stats) = Optimizer::new(options.opt_level).optimize(&module);
    module
        .validate()
        .map_err(|errors| CompileError::InvalidIr(errors.join("; ")))?;
    debug!(
        module = %module.name,
        functions = module.functions.len(),
        instructions = module.total_instruction_count(),
        "ir ready"
    );
    Ok((module, stats))
}

/// Full pipeline: analysis gate, lowering, optimization, C generation
pub fn compile_to_c(
    program: &Program,
    modules: &dyn ModuleLookup,
    options: &CompilerOptions,
) -> CompileResult<String> {
    let (module, _) = compile_to_ir(program, modules, options)?;
    Ok(generate_c(&module, options.emit_prelude)?)
}
