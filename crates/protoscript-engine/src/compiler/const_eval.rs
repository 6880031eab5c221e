//! Compile-time constant evaluation
//!
//! Lowers a pure expression into a throwaway single-block function and
//! lets the optimizer's constant folder evaluate it. An expression is
//! constant exactly when its result temp folds to a `const`.

use crate::ast::{ExprKind, Expression, Literal};
use crate::compiler::ir::{BasicBlock, IrConstant, IrFunction, IrInstr, Temp, Terminator};
use crate::compiler::optimize::{eval_cast, ConstantFolder};
use crate::types::Type;
use rustc_hash::FxHashMap;

/// Known constants by name: bare names (`Red`) or qualified ones
/// (`Color.Red`, `math.PI`)
pub type ConstEnv = FxHashMap<String, IrConstant>;

/// Evaluate `expr` at compile time
///
/// Returns `None` for anything that is not a compile-time constant,
/// including operations the folder refuses (overflow, division by zero).
pub fn evaluate(expr: &Expression, env: &ConstEnv) -> Option<IrConstant> {
    let mut lowerer = ConstLowerer {
        block: BasicBlock::new("entry"),
        next_temp: 0,
        env,
    };
    let result = lowerer.lower(expr)?;
    let mut block = lowerer.block;
    block.set_terminator(Terminator::Ret { value: result });

    let mut func = IrFunction::new("__const", Vec::new(), Type::void());
    func.add_block(block);
    ConstantFolder::new().fold_function(&mut func);

    func.blocks[0]
        .instructions
        .iter()
        .find_map(|instr| match instr {
            IrInstr::Const { dest, value } if *dest == result => Some(value.clone()),
            _ => None,
        })
}

/// Convert a constant to `target`, or `None` when it is not representable
pub fn cast_constant(value: &IrConstant, target: &Type) -> Option<IrConstant> {
    eval_cast(value, target)
}

struct ConstLowerer<'a> {
    block: BasicBlock,
    next_temp: u32,
    env: &'a ConstEnv,
}

impl ConstLowerer<'_> {
    fn fresh(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    fn constant(&mut self, value: IrConstant) -> Temp {
        let dest = self.fresh();
        self.block.add_instr(IrInstr::Const { dest, value });
        dest
    }

    fn lower(&mut self, expr: &Expression) -> Option<Temp> {
        match &expr.kind {
            ExprKind::Literal(lit) => Some(self.constant(literal_constant(lit))),
            ExprKind::Identifier(name) => {
                let value = self.env.get(name)?.clone();
                Some(self.constant(value))
            }
            ExprKind::Member { object, member } => {
                let ExprKind::Identifier(owner) = &object.kind else {
                    return None;
                };
                let value = self.env.get(&format!("{}.{}", owner, member))?.clone();
                Some(self.constant(value))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower(operand)?;
                let dest = self.fresh();
                self.block.add_instr(IrInstr::UnaryOp {
                    dest,
                    op: *op,
                    operand,
                });
                Some(dest)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                let dest = self.fresh();
                self.block.add_instr(IrInstr::BinOp {
                    dest,
                    op: *op,
                    left,
                    right,
                });
                Some(dest)
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                let cond = self.lower(condition)?;
                let then_val = self.lower(then_expr)?;
                let else_val = self.lower(else_expr)?;
                let dest = self.fresh();
                self.block.add_instr(IrInstr::Select {
                    dest,
                    cond,
                    then_val,
                    else_val,
                });
                Some(dest)
            }
            ExprKind::Cast { expr, target } => {
                let src = self.lower(expr)?;
                let dest = self.fresh();
                self.block.add_instr(IrInstr::Cast {
                    dest,
                    src,
                    target: target.clone(),
                });
                Some(dest)
            }
            _ => None,
        }
    }
}

/// IR constant for a source literal (integer literals are `int`)
pub fn literal_constant(lit: &Literal) -> IrConstant {
    match lit {
        Literal::Bool(b) => IrConstant::Bool(*b),
        Literal::Int(i) => IrConstant::Int(*i),
        Literal::Float(f) => IrConstant::Float(*f),
        Literal::Glyph(c) => IrConstant::Glyph(*c),
        Literal::String(s) => IrConstant::Str(s.clone()),
    }
}
