//! Constant Propagation
//!
//! Evaluates constant expressions at compile time, one block at a time,
//! and drops safety checks whose constant operands provably pass.

use crate::ast::{BinaryOp, UnaryOp};
use crate::compiler::ir::{BasicBlock, IrConstant, IrFunction, IrInstr, Temp};
use crate::types::{PrimitiveType, Type};
use rustc_hash::FxHashMap;

/// Counts from one folding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Instructions replaced by `const` (or `copy`, for selects)
    pub folded: usize,
    /// Checks removed because their operands are constant and pass
    pub checks_removed: usize,
}

/// Constant folding optimizer
#[derive(Debug, Default)]
pub struct ConstantFolder;

impl ConstantFolder {
    pub fn new() -> Self {
        Self
    }

    /// Fold constants in a function
    ///
    /// Each block gets its own fresh constants map. Nothing is propagated
    /// across block boundaries.
    pub fn fold_function(&self, func: &mut IrFunction) -> FoldStats {
        let mut stats = FoldStats::default();
        for block in &mut func.blocks {
            let mut constants = FxHashMap::default();
            self.fold_block(block, &mut constants, &mut stats);
        }
        stats
    }

    /// Fold constants in a basic block
    pub fn fold_block(
        &self,
        block: &mut BasicBlock,
        constants: &mut FxHashMap<Temp, IrConstant>,
        stats: &mut FoldStats,
    ) {
        let mut new_instrs = Vec::with_capacity(block.instructions.len());

        for instr in block.instructions.drain(..) {
            match &instr {
                IrInstr::Const { dest, value } => {
                    constants.insert(*dest, value.clone());
                }

                IrInstr::Copy { dest, src } => {
                    if let Some(c) = constants.get(src).cloned() {
                        constants.insert(*dest, c.clone());
                        new_instrs.push(IrInstr::Const {
                            dest: *dest,
                            value: c,
                        });
                        stats.folded += 1;
                        continue;
                    }
                }

                IrInstr::BinOp {
                    dest,
                    op,
                    left,
                    right,
                } => {
                    if let (Some(l), Some(r)) = (constants.get(left), constants.get(right)) {
                        if let Some(result) = eval_binary(*op, l, r) {
                            constants.insert(*dest, result.clone());
                            new_instrs.push(IrInstr::Const {
                                dest: *dest,
                                value: result,
                            });
                            stats.folded += 1;
                            continue;
                        }
                    }
                }

                IrInstr::UnaryOp { dest, op, operand } => {
                    if let Some(result) = constants.get(operand).and_then(|c| eval_unary(*op, c)) {
                        constants.insert(*dest, result.clone());
                        new_instrs.push(IrInstr::Const {
                            dest: *dest,
                            value: result,
                        });
                        stats.folded += 1;
                        continue;
                    }
                }

                IrInstr::Cast { dest, src, target } => {
                    if let Some(result) = constants.get(src).and_then(|c| eval_cast(c, target)) {
                        constants.insert(*dest, result.clone());
                        new_instrs.push(IrInstr::Const {
                            dest: *dest,
                            value: result,
                        });
                        stats.folded += 1;
                        continue;
                    }
                }

                IrInstr::Select {
                    dest,
                    cond,
                    then_val,
                    else_val,
                } => {
                    if let Some(c) = constants.get(cond).and_then(IrConstant::as_bool) {
                        let chosen = if c { *then_val } else { *else_val };
                        stats.folded += 1;
                        match constants.get(&chosen).cloned() {
                            Some(value) => {
                                constants.insert(*dest, value.clone());
                                new_instrs.push(IrInstr::Const { dest: *dest, value });
                            }
                            None => new_instrs.push(IrInstr::Copy {
                                dest: *dest,
                                src: chosen,
                            }),
                        }
                        continue;
                    }
                }

                check if check.is_check() => {
                    if check_passes(check, constants) {
                        stats.checks_removed += 1;
                        continue;
                    }
                }

                _ => {}
            }
            new_instrs.push(instr);
        }

        block.instructions = new_instrs;
    }
}

/// Whether a check provably succeeds given the known constants
fn check_passes(check: &IrInstr, constants: &FxHashMap<Temp, IrConstant>) -> bool {
    match check {
        IrInstr::CheckOverflow {
            op,
            left,
            right,
            ty,
        } => match (constants.get(left), constants.get(right)) {
            (Some(l), Some(r)) => ty.is_integer() && eval_binary(*op, l, r).is_some(),
            _ => false,
        },
        IrInstr::CheckNegOverflow { operand, .. } => constants
            .get(operand)
            .is_some_and(|c| eval_unary(UnaryOp::Neg, c).is_some()),
        IrInstr::CheckDivZero { divisor } => constants
            .get(divisor)
            .and_then(IrConstant::as_integer)
            .is_some_and(|d| d != 0),
        IrInstr::CheckShiftRange { amount, width } => constants
            .get(amount)
            .and_then(IrConstant::as_integer)
            .is_some_and(|a| a >= 0 && a < i64::from(*width)),
        _ => false,
    }
}

fn finite(v: f64) -> Option<IrConstant> {
    v.is_finite().then_some(IrConstant::Float(v))
}

/// Evaluate a binary operation on constants
///
/// Returns `None` when the operation cannot be folded: mismatched operands,
/// integer overflow, division by zero, out-of-range shifts, or a non-finite
/// float result.
pub fn eval_binary(op: BinaryOp, left: &IrConstant, right: &IrConstant) -> Option<IrConstant> {
    use IrConstant as C;
    match (left, right) {
        (C::Int(a), C::Int(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::Add => C::Int(a.checked_add(b)?),
                BinaryOp::Sub => C::Int(a.checked_sub(b)?),
                BinaryOp::Mul => C::Int(a.checked_mul(b)?),
                BinaryOp::Div => C::Int(a.checked_div(b)?),
                BinaryOp::Mod => C::Int(a.checked_rem(b)?),
                BinaryOp::BitAnd => C::Int(a & b),
                BinaryOp::BitOr => C::Int(a | b),
                BinaryOp::BitXor => C::Int(a ^ b),
                BinaryOp::ShiftLeft if (0..64).contains(&b) => C::Int(((a as u64) << b) as i64),
                BinaryOp::ShiftRight if (0..64).contains(&b) => C::Int(a >> b),
                _ => return compare(op, a.cmp(&b)),
            })
        }
        (C::Byte(a), C::Byte(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::Add => C::Byte(a.checked_add(b)?),
                BinaryOp::Sub => C::Byte(a.checked_sub(b)?),
                BinaryOp::Mul => C::Byte(a.checked_mul(b)?),
                BinaryOp::Div => C::Byte(a.checked_div(b)?),
                BinaryOp::Mod => C::Byte(a.checked_rem(b)?),
                BinaryOp::BitAnd => C::Byte(a & b),
                BinaryOp::BitOr => C::Byte(a | b),
                BinaryOp::BitXor => C::Byte(a ^ b),
                BinaryOp::ShiftLeft if b < 8 => C::Byte(((u32::from(a)) << b) as u8),
                BinaryOp::ShiftRight if b < 8 => C::Byte(a >> b),
                _ => return compare(op, a.cmp(&b)),
            })
        }
        (C::Float(a), C::Float(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Add => finite(a + b),
                BinaryOp::Sub => finite(a - b),
                BinaryOp::Mul => finite(a * b),
                BinaryOp::Div => finite(a / b),
                BinaryOp::Mod => finite(a % b),
                _ => compare(op, a.partial_cmp(&b)?),
            }
        }
        (C::Str(a), C::Str(b)) => match op {
            BinaryOp::Add => Some(C::Str(format!("{}{}", a, b))),
            _ => compare(op, a.cmp(b)),
        },
        (C::Glyph(a), C::Glyph(b)) => compare(op, a.cmp(b)),
        (C::Bool(a), C::Bool(b)) => match op {
            BinaryOp::And => Some(C::Bool(*a && *b)),
            BinaryOp::Or => Some(C::Bool(*a || *b)),
            BinaryOp::Equal => Some(C::Bool(a == b)),
            BinaryOp::NotEqual => Some(C::Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> Option<IrConstant> {
    use std::cmp::Ordering::*;
    let result = match op {
        BinaryOp::Equal => ord == Equal,
        BinaryOp::NotEqual => ord != Equal,
        BinaryOp::Less => ord == Less,
        BinaryOp::LessEqual => ord != Greater,
        BinaryOp::Greater => ord == Greater,
        BinaryOp::GreaterEqual => ord != Less,
        _ => return None,
    };
    Some(IrConstant::Bool(result))
}

/// Evaluate a unary operation on a constant
pub fn eval_unary(op: UnaryOp, operand: &IrConstant) -> Option<IrConstant> {
    use IrConstant as C;
    match (op, operand) {
        (UnaryOp::Neg, C::Int(a)) => Some(C::Int(a.checked_neg()?)),
        (UnaryOp::Neg, C::Byte(0)) => Some(C::Byte(0)),
        (UnaryOp::Neg, C::Float(a)) => Some(C::Float(-a)),
        (UnaryOp::Not, C::Bool(b)) => Some(C::Bool(!b)),
        (UnaryOp::BitNot, C::Int(a)) => Some(C::Int(!a)),
        (UnaryOp::BitNot, C::Byte(a)) => Some(C::Byte(!a)),
        _ => None,
    }
}

/// Convert a constant to `target` exactly
///
/// `byte` needs an integral value in 0..=255, `int` an exact 64-bit integer;
/// `float` accepts any `int` or `byte`. Anything else returns `None`.
pub fn eval_cast(value: &IrConstant, target: &Type) -> Option<IrConstant> {
    use IrConstant as C;
    let target = target.as_primitive()?;
    match (value, target) {
        (C::Byte(v), PrimitiveType::Byte) => Some(C::Byte(*v)),
        (C::Byte(v), PrimitiveType::Int) => Some(C::Int(i64::from(*v))),
        (C::Byte(v), PrimitiveType::Float) => Some(C::Float(f64::from(*v))),
        (C::Int(v), PrimitiveType::Byte) => u8::try_from(*v).ok().map(C::Byte),
        (C::Int(v), PrimitiveType::Int) => Some(C::Int(*v)),
        (C::Int(v), PrimitiveType::Float) => Some(C::Float(*v as f64)),
        (C::Float(v), PrimitiveType::Byte) => {
            (v.fract() == 0.0 && (0.0..=255.0).contains(v)).then(|| C::Byte(*v as u8))
        }
        (C::Float(v), PrimitiveType::Int) => {
            // 2^63 itself is out of range; -2^63 is in
            let in_range = *v >= -9_223_372_036_854_775_808.0 && *v < 9_223_372_036_854_775_808.0;
            (v.is_finite() && v.fract() == 0.0 && in_range).then(|| C::Int(*v as i64))
        }
        (C::Float(v), PrimitiveType::Float) => Some(C::Float(*v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::Terminator;

    fn block_of(instrs: Vec<IrInstr>) -> BasicBlock {
        let mut block = BasicBlock::new("entry");
        block.instructions = instrs;
        block.set_terminator(Terminator::RetVoid);
        block
    }

    fn fold(block: &mut BasicBlock) -> FoldStats {
        let mut stats = FoldStats::default();
        ConstantFolder::new().fold_block(block, &mut FxHashMap::default(), &mut stats);
        stats
    }

    fn int(dest: u32, v: i64) -> IrInstr {
        IrInstr::Const {
            dest: Temp(dest),
            value: IrConstant::Int(v),
        }
    }

    #[test]
    fn test_fold_arithmetic_and_drop_passing_checks() {
        let mut block = block_of(vec![
            int(0, 20),
            int(1, 22),
            IrInstr::CheckOverflow {
                op: BinaryOp::Add,
                left: Temp(0),
                right: Temp(1),
                ty: Type::int(),
            },
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Add,
                left: Temp(0),
                right: Temp(1),
            },
        ]);
        let stats = fold(&mut block);
        assert_eq!(stats.folded, 1);
        assert_eq!(stats.checks_removed, 1);
        assert_eq!(block.instructions[2], int(2, 42));
    }

    #[test]
    fn test_overflow_left_alone() {
        let mut block = block_of(vec![
            int(0, i64::MAX),
            int(1, 1),
            IrInstr::CheckOverflow {
                op: BinaryOp::Add,
                left: Temp(0),
                right: Temp(1),
                ty: Type::int(),
            },
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Add,
                left: Temp(0),
                right: Temp(1),
            },
        ]);
        let stats = fold(&mut block);
        assert_eq!(stats, FoldStats::default());
        assert_eq!(block.instructions.len(), 4);
    }

    #[test]
    fn test_division_by_zero_left_alone() {
        let mut block = block_of(vec![
            int(0, 5),
            int(1, 0),
            IrInstr::CheckDivZero { divisor: Temp(1) },
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Div,
                left: Temp(0),
                right: Temp(1),
            },
        ]);
        fold(&mut block);
        assert!(matches!(block.instructions[2], IrInstr::CheckDivZero { .. }));
        assert!(matches!(block.instructions[3], IrInstr::BinOp { .. }));
    }

    #[test]
    fn test_select_with_constant_condition() {
        let mut block = block_of(vec![
            IrInstr::Const {
                dest: Temp(0),
                value: IrConstant::Bool(false),
            },
            IrInstr::LoadVar {
                dest: Temp(1),
                name: "a".into(),
            },
            IrInstr::LoadVar {
                dest: Temp(2),
                name: "b".into(),
            },
            IrInstr::Select {
                dest: Temp(3),
                cond: Temp(0),
                then_val: Temp(1),
                else_val: Temp(2),
            },
        ]);
        fold(&mut block);
        assert_eq!(
            block.instructions[3],
            IrInstr::Copy {
                dest: Temp(3),
                src: Temp(2)
            }
        );
    }

    #[test]
    fn test_refold_changes_nothing() {
        let mut block = block_of(vec![
            int(0, 6),
            int(1, 7),
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Mul,
                left: Temp(0),
                right: Temp(1),
            },
            IrInstr::Copy {
                dest: Temp(3),
                src: Temp(2),
            },
        ]);
        fold(&mut block);
        let once = block.clone();
        assert_eq!(fold(&mut block), FoldStats::default());
        assert_eq!(block, once);
    }

    #[test]
    fn test_eval_cast_representability() {
        assert_eq!(
            eval_cast(&IrConstant::Int(255), &Type::byte()),
            Some(IrConstant::Byte(255))
        );
        assert_eq!(eval_cast(&IrConstant::Int(256), &Type::byte()), None);
        assert_eq!(eval_cast(&IrConstant::Float(2.5), &Type::int()), None);
        assert_eq!(
            eval_cast(&IrConstant::Float(3.0), &Type::int()),
            Some(IrConstant::Int(3))
        );
        assert_eq!(eval_cast(&IrConstant::Float(1e19), &Type::int()), None);
        assert_eq!(
            eval_cast(&IrConstant::Int(7), &Type::float()),
            Some(IrConstant::Float(7.0))
        );
        assert_eq!(eval_cast(&IrConstant::Str("1".into()), &Type::int()), None);
    }

    #[test]
    fn test_eval_binary_edges() {
        assert_eq!(
            eval_binary(BinaryOp::Div, &IrConstant::Int(i64::MIN), &IrConstant::Int(-1)),
            None
        );
        assert_eq!(
            eval_binary(BinaryOp::Add, &IrConstant::Byte(200), &IrConstant::Byte(56)),
            None
        );
        assert_eq!(
            eval_binary(BinaryOp::Less, &IrConstant::Glyph('a'), &IrConstant::Glyph('b')),
            Some(IrConstant::Bool(true))
        );
        assert_eq!(
            eval_binary(
                BinaryOp::Add,
                &IrConstant::Str("ab".into()),
                &IrConstant::Str("c".into())
            ),
            Some(IrConstant::Str("abc".into()))
        );
        assert_eq!(
            eval_binary(BinaryOp::ShiftLeft, &IrConstant::Int(1), &IrConstant::Int(64)),
            None
        );
        assert_eq!(
            eval_binary(BinaryOp::Div, &IrConstant::Float(1.0), &IrConstant::Float(0.0)),
            None
        );
    }
}
