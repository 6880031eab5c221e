//! IR Functions
//!
//! Functions in the IR contain parameters and labeled basic blocks; the
//! first block is the entry.

use super::block::BasicBlock;
use super::value::Temp;
use crate::types::Type;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrParam {
    pub name: String,
    pub ty: Type,
}

impl IrParam {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An IR function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    /// Function name (`Proto::method` for methods)
    pub name: String,
    pub params: Vec<IrParam>,
    pub return_type: Type,
    /// Basic blocks, entry first
    pub blocks: Vec<BasicBlock>,
}

impl IrFunction {
    /// Create a new function
    pub fn new(name: impl Into<String>, params: Vec<IrParam>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            blocks: Vec::new(),
        }
    }

    /// Add a basic block
    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.push(block);
    }

    /// Get a block by label
    pub fn get_block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Get a mutable block by label
    pub fn get_block_mut(&mut self, label: &str) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.label == label)
    }

    /// Get the entry block
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Get the number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Check if this function has any blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Compute the total number of instructions across all blocks
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// One past the highest temp used anywhere in the function
    pub fn next_temp(&self) -> u32 {
        let mut max = None;
        for block in &self.blocks {
            for instr in &block.instructions {
                for t in instr.dest().into_iter().chain(instr.operands()) {
                    max = max.max(Some(t.0));
                }
            }
            for t in block.terminator.operands() {
                max = max.max(Some(t.0));
            }
        }
        max.map_or(0, |m| m + 1)
    }

    /// Labels reachable from the entry block
    pub fn reachable_labels(&self) -> FxHashSet<&str> {
        let mut seen = FxHashSet::default();
        // Exception handlers are entered from `setup_try`, not from a terminator
        let mut stack: Vec<&str> = self.entry().map(|b| b.label.as_str()).into_iter().collect();
        while let Some(label) = stack.pop() {
            if !seen.insert(label) {
                continue;
            }
            if let Some(block) = self.get_block(label) {
                stack.extend(block.successors());
                for instr in &block.instructions {
                    if let super::instr::IrInstr::SetupTry { handler } = instr {
                        stack.push(handler.as_str());
                    }
                }
            }
        }
        seen
    }

    /// Validate the function structure
    ///
    /// Checks: at least one block, unique labels, every jump, branch and
    /// handler target resolves, and every temp is defined exactly once.
    pub fn validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err(format!("Function '{}' has no blocks", self.name));
        }

        let mut labels = FxHashSet::default();
        for block in &self.blocks {
            if !labels.insert(block.label.as_str()) {
                return Err(format!(
                    "Function '{}' has duplicate block label '{}'",
                    self.name, block.label
                ));
            }
        }

        let mut defined: FxHashMap<Temp, &str> = FxHashMap::default();
        for block in &self.blocks {
            for succ in block.successors() {
                if !labels.contains(succ) {
                    return Err(format!(
                        "Block '{}' of '{}' references non-existent block '{}'",
                        block.label, self.name, succ
                    ));
                }
            }
            for instr in &block.instructions {
                if let super::instr::IrInstr::SetupTry { handler } = instr {
                    if !labels.contains(handler.as_str()) {
                        return Err(format!(
                            "Block '{}' of '{}' installs non-existent handler '{}'",
                            block.label, self.name, handler
                        ));
                    }
                }
                if let Some(dest) = instr.dest() {
                    if let Some(previous) = defined.insert(dest, block.label.as_str()) {
                        return Err(format!(
                            "Temp {} of '{}' is defined in both '{}' and '{}'",
                            dest, self.name, previous, block.label
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::block::Terminator;
    use crate::compiler::ir::instr::IrInstr;
    use crate::compiler::ir::value::IrConstant;

    fn ret_void_block(label: &str) -> BasicBlock {
        let mut block = BasicBlock::new(label);
        block.set_terminator(Terminator::RetVoid);
        block
    }

    #[test]
    fn test_function_new() {
        let func = IrFunction::new("test", vec![], Type::void());
        assert_eq!(func.name, "test");
        assert!(func.params.is_empty());
        assert!(func.blocks.is_empty());
    }

    #[test]
    fn test_function_validate() {
        let mut func = IrFunction::new("test", vec![], Type::void());
        assert!(func.validate().is_err());
        func.add_block(ret_void_block("entry"));
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_successor() {
        let mut func = IrFunction::new("test", vec![], Type::void());
        let mut block = BasicBlock::new("entry");
        block.set_terminator(Terminator::jump("nowhere"));
        func.add_block(block);
        assert!(func.validate().unwrap_err().contains("nowhere"));
    }

    #[test]
    fn test_validate_duplicate_label() {
        let mut func = IrFunction::new("test", vec![], Type::void());
        func.add_block(ret_void_block("entry"));
        func.add_block(ret_void_block("entry"));
        assert!(func.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_validate_single_definition() {
        let mut func = IrFunction::new("test", vec![], Type::void());
        let mut block = ret_void_block("entry");
        for _ in 0..2 {
            block.add_instr(IrInstr::Const {
                dest: Temp(0),
                value: IrConstant::Int(1),
            });
        }
        func.add_block(block);
        assert!(func.validate().is_err());
    }

    #[test]
    fn test_next_temp_and_reachability() {
        let mut func = IrFunction::new("test", vec![], Type::int());
        let mut entry = BasicBlock::new("entry");
        entry.add_instr(IrInstr::Const {
            dest: Temp(5),
            value: IrConstant::Int(1),
        });
        entry.set_terminator(Terminator::Ret { value: Temp(5) });
        func.add_block(entry);
        func.add_block(ret_void_block("dead"));

        assert_eq!(func.next_temp(), 6);
        let reachable = func.reachable_labels();
        assert!(reachable.contains("entry"));
        assert!(!reachable.contains("dead"));
    }
}
