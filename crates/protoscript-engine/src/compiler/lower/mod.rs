//! AST to IR Lowering
//!
//! Converts an analyzer-clean AST into the IR representation, reading
//! expression types and resolved calls from the analyzer's side tables.

mod control_flow;
mod expr;
mod stmt;

use crate::ast::{Decl, Expression, FunctionDecl, Program, Statement};
use crate::checker::{CheckResult, PrototypeRegistry};
use crate::compiler::ir::{
    BasicBlock, IrField, IrFunction, IrInstr, IrModule, IrParam, IrPrototype, Temp, Terminator,
};
use crate::types::Type;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

/// Lowering failure
///
/// Only raised when the side tables do not cover the tree, which means the
/// program was not analyzed (or not cleanly).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LowerError {
    #[error("{function}: expression at {line}:{column} has no recorded type")]
    MissingType {
        function: String,
        line: u32,
        column: u32,
    },

    #[error("{function}: cannot resolve '{name}'")]
    UnresolvedName { function: String, name: String },

    #[error("{function}: call at {line}:{column} has no resolved target")]
    UnresolvedCall {
        function: String,
        line: u32,
        column: u32,
    },

    #[error("{function}: expression at {line}:{column} produces no value")]
    VoidValue {
        function: String,
        line: u32,
        column: u32,
    },

    #[error("{function}: '{kind}' outside of a loop or switch")]
    StrayJump {
        function: String,
        kind: &'static str,
    },
}

pub type LowerResult<T> = Result<T, LowerError>;

/// Where `break` and `continue` go from inside a loop or switch arm
#[derive(Debug, Clone)]
struct JumpTargets {
    break_label: String,
    /// `None` for a switch arm (continue goes to the enclosing loop)
    continue_label: Option<String>,
    /// Open `try` regions when the construct was entered
    try_depth: usize,
}

/// Lower a whole program
pub fn lower_program(
    program: &Program,
    registry: &PrototypeRegistry,
    check: &CheckResult,
    module_name: &str,
) -> LowerResult<IrModule> {
    let mut module = IrModule::new(module_name);

    for proto in registry.iter() {
        let mut ir_proto = IrPrototype::new(
            proto.name.clone(),
            registry.proto_id(&proto.name).unwrap_or_default(),
            proto.parent.clone(),
        );
        ir_proto.fields = registry
            .layout(&proto.name)
            .into_iter()
            .map(|f| IrField::new(f.name.clone(), f.ty.clone()))
            .collect();
        module.add_prototype(ir_proto);
    }

    for decl in &program.decls {
        match decl {
            Decl::Function(func) => {
                let lowered = Lowerer::new(program, registry, check).lower_function(func, None)?;
                module.add_function(lowered);
            }
            Decl::Prototype(proto) => {
                let registered = registry
                    .get(&proto.name)
                    .is_some_and(|p| !p.builtin && p.span == proto.span);
                if !registered {
                    continue;
                }
                for method in &proto.methods {
                    let lowered = Lowerer::new(program, registry, check)
                        .lower_function(&method.func, Some(&proto.name))?;
                    module.add_function(lowered);
                }
            }
            Decl::Group(_) => {}
        }
    }

    debug!(
        module = module_name,
        functions = module.function_count(),
        instructions = module.total_instruction_count(),
        "program lowered"
    );
    Ok(module)
}

/// IR function name of a method
pub fn method_symbol(proto: &str, method: &str) -> String {
    format!("{}::{}", proto, method)
}

/// Per-function AST to IR lowerer
pub struct Lowerer<'a> {
    program: &'a Program,
    registry: &'a PrototypeRegistry,
    check: &'a CheckResult,

    /// Function being built
    func: IrFunction,
    /// Index of the block receiving instructions
    current: usize,
    /// The current block has no terminator yet
    open: bool,

    next_temp: u32,
    next_label: u32,

    /// Source name -> IR variable name, innermost scope last
    scopes: Vec<FxHashMap<String, String>>,
    /// IR variable names taken in this function
    used_names: FxHashSet<String>,

    jump_targets: Vec<JumpTargets>,
    try_depth: usize,
}

impl<'a> Lowerer<'a> {
    pub fn new(program: &'a Program, registry: &'a PrototypeRegistry, check: &'a CheckResult) -> Self {
        Self {
            program,
            registry,
            check,
            func: IrFunction::new("", Vec::new(), Type::void()),
            current: 0,
            open: false,
            next_temp: 0,
            next_label: 0,
            scopes: Vec::new(),
            used_names: FxHashSet::default(),
            jump_targets: Vec::new(),
            try_depth: 0,
        }
    }

    /// Lower a function, or a method of `proto` (which gains a leading `self`)
    pub fn lower_function(mut self, decl: &FunctionDecl, proto: Option<&str>) -> LowerResult<IrFunction> {
        let name = match proto {
            Some(proto) => method_symbol(proto, &decl.name),
            None => decl.name.clone(),
        };

        let mut params = Vec::with_capacity(decl.params.len() + 1);
        let mut bindings = FxHashMap::default();
        if let Some(proto) = proto {
            params.push(IrParam::new("self", Type::named(proto)));
            self.used_names.insert("self".to_string());
        }
        for param in &decl.params {
            params.push(IrParam::new(param.name.clone(), param.ty.clone()));
            self.used_names.insert(param.name.clone());
            bindings.insert(param.name.clone(), param.name.clone());
        }
        self.scopes.push(bindings);

        self.func = IrFunction::new(name, params, decl.return_type.clone());
        self.func.add_block(BasicBlock::new("entry"));
        self.current = 0;
        self.open = true;

        self.lower_block(&decl.body)?;

        if self.open {
            let term = if decl.return_type.is_void() {
                Terminator::RetVoid
            } else {
                Terminator::Unreachable
            };
            self.terminate(term);
        }

        debug!(
            function = %self.func.name,
            blocks = self.func.block_count(),
            temps = self.next_temp,
            "function lowered"
        );
        Ok(self.func)
    }

    fn lower_block(&mut self, stmts: &[Statement]) -> LowerResult<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_scoped(&mut self, stmts: &[Statement]) -> LowerResult<()> {
        self.scopes.push(FxHashMap::default());
        let result = self.lower_block(stmts);
        self.scopes.pop();
        result
    }

    fn fresh_temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    /// Unique block label with a readable prefix
    fn fresh_label(&mut self, prefix: &str) -> String {
        self.next_label += 1;
        format!("{}{}", prefix, self.next_label)
    }

    fn emit(&mut self, instr: IrInstr) {
        if let Some(block) = self.func.blocks.get_mut(self.current) {
            block.add_instr(instr);
        }
    }

    fn emit_value(&mut self, build: impl FnOnce(Temp) -> IrInstr) -> Temp {
        let dest = self.fresh_temp();
        self.emit(build(dest));
        dest
    }

    /// Set the current block's terminator; later code goes nowhere until
    /// [`Self::start_block`]
    fn terminate(&mut self, term: Terminator) {
        if !self.open {
            return;
        }
        if let Some(block) = self.func.blocks.get_mut(self.current) {
            block.set_terminator(term);
        }
        self.open = false;
    }

    fn jump(&mut self, target: &str) {
        self.terminate(Terminator::jump(target));
    }

    /// Append a block and make it current
    fn start_block(&mut self, label: String) {
        self.func.add_block(BasicBlock::new(label));
        self.current = self.func.blocks.len() - 1;
        self.open = true;
    }

    /// Declare a program variable under a name unique in this function
    fn declare_var(&mut self, source: &str, ty: &Type) -> String {
        let mut ir_name = source.to_string();
        let mut n = 0;
        while self.used_names.contains(&ir_name) {
            n += 1;
            ir_name = format!("{}_{}", source, n);
        }
        self.used_names.insert(ir_name.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(source.to_string(), ir_name.clone());
        }
        self.emit(IrInstr::VarDecl {
            name: ir_name.clone(),
            ty: ty.clone(),
        });
        ir_name
    }

    /// Variable holding a value joined from several blocks
    fn declare_hidden(&mut self, ty: &Type) -> String {
        let label = self.next_temp;
        let mut name = format!("__join{}", label);
        let mut n = 0;
        while self.used_names.contains(&name) {
            n += 1;
            name = format!("__join{}_{}", label, n);
        }
        self.used_names.insert(name.clone());
        self.emit(IrInstr::VarDecl {
            name: name.clone(),
            ty: ty.clone(),
        });
        name
    }

    fn local(&self, source: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(source))
            .map(String::as_str)
    }

    fn type_of(&self, expr: &Expression) -> LowerResult<&'a Type> {
        self.check
            .type_of(expr)
            .ok_or_else(|| LowerError::MissingType {
                function: self.func.name.clone(),
                line: expr.span.line,
                column: expr.span.column,
            })
    }

    /// Close every `try` region opened since `depth`
    fn unwind_to(&mut self, depth: usize) {
        for _ in depth..self.try_depth {
            self.emit(IrInstr::EndTry);
        }
    }
}
