//! Redundant Check Elimination
//!
//! Removes a safety check when an identical check already ran earlier in
//! the same block. Arithmetic checks read immutable temps and stay valid to
//! the end of the block; bounds and key checks are forgotten at any
//! instruction that may change a container.

use crate::compiler::ir::{BasicBlock, IrFunction, IrInstr};

#[derive(Debug, Default)]
pub struct CheckEliminator;

impl CheckEliminator {
    pub fn new() -> Self {
        Self
    }

    /// Returns the number of checks removed
    pub fn eliminate_function(&self, func: &mut IrFunction) -> usize {
        func.blocks
            .iter_mut()
            .map(|block| self.eliminate_block(block))
            .sum()
    }

    fn eliminate_block(&self, block: &mut BasicBlock) -> usize {
        let mut seen: Vec<IrInstr> = Vec::new();
        let mut removed = 0;

        block.instructions.retain(|instr| {
            if instr.is_check() {
                if seen.contains(instr) {
                    removed += 1;
                    return false;
                }
                seen.push(instr.clone());
            } else if instr.has_side_effects() {
                seen.retain(|c| !depends_on_container(c));
            }
            true
        });

        removed
    }
}

fn depends_on_container(check: &IrInstr) -> bool {
    matches!(
        check,
        IrInstr::CheckIndexBounds { .. } | IrInstr::CheckMapKey { .. }
    )
}
