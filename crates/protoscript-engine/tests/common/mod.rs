//! Shared helpers for building programs and running the pipeline

#![allow(dead_code)]

use protoscript_engine::ast::*;
use protoscript_engine::compiler::ir::{IrFunction, IrInstr, IrModule};
use protoscript_engine::{analyze, compile_to_c, compile_to_ir, CompilerOptions, ModuleRegistry, OptLevel};
use protoscript_engine::{Diagnostic, Type};

pub fn main_with(body: Vec<Statement>) -> Program {
    Program::new("main.ps").with_function(FunctionDecl::new("main", vec![], Type::void(), body))
}

pub fn print(value: Expression) -> Statement {
    Statement::expr(Expression::call("print", vec![value]))
}

/// `int double(int n) { return n * 2; }`
pub fn double() -> FunctionDecl {
    FunctionDecl::new(
        "double",
        vec![Param::new("n", Type::int())],
        Type::int(),
        vec![Statement::ret(Expression::binary(
            BinaryOp::Mul,
            Expression::ident("n"),
            Expression::int(2),
        ))],
    )
}

pub fn diagnostics(program: &Program) -> Vec<Diagnostic> {
    analyze(program, &ModuleRegistry::new()).diagnostics
}

pub fn codes(program: &Program) -> Vec<&'static str> {
    diagnostics(program).iter().map(|d| d.code.as_str()).collect()
}

pub fn ir_at(program: &Program, level: OptLevel) -> IrModule {
    let options = CompilerOptions::default().with_opt_level(level);
    match compile_to_ir(program, &ModuleRegistry::new(), &options) {
        Ok((module, _)) => module,
        Err(err) => panic!("{}: {:?}", err, err.diagnostics()),
    }
}

/// Lowered, unoptimized IR
pub fn lower(program: &Program) -> IrModule {
    ir_at(program, OptLevel::None)
}

pub fn c_source(program: &Program) -> String {
    match compile_to_c(program, &ModuleRegistry::new(), &CompilerOptions::default()) {
        Ok(c) => c,
        Err(err) => panic!("{}: {:?}", err, err.diagnostics()),
    }
}

pub fn ops(func: &IrFunction) -> Vec<&'static str> {
    func.blocks
        .iter()
        .flat_map(|b| b.instructions.iter().map(IrInstr::opcode))
        .collect()
}

pub fn instrs(func: &IrFunction) -> Vec<&IrInstr> {
    func.blocks.iter().flat_map(|b| &b.instructions).collect()
}
