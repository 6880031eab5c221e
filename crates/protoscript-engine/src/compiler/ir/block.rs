//! Basic Blocks and Control Flow
//!
//! Basic blocks are sequences of instructions with a single entry point
//! and a single exit point (the terminator). Blocks are identified by a
//! label unique within their function.

use super::instr::IrInstr;
use super::value::Temp;
use serde::{Deserialize, Serialize};

/// A basic block: sequence of instructions with single entry and exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    /// Instructions in this block (excluding terminator)
    pub instructions: Vec<IrInstr>,
    /// How this block exits
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Create a new empty block; its terminator starts as `unreachable`
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        }
    }

    /// Add an instruction to this block
    pub fn add_instr(&mut self, instr: IrInstr) {
        self.instructions.push(instr);
    }

    /// Set the terminator for this block
    pub fn set_terminator(&mut self, term: Terminator) {
        self.terminator = term;
    }

    /// Labels this block may jump to
    pub fn successors(&self) -> Vec<&str> {
        self.terminator.successors()
    }

    /// Get the number of instructions (excluding terminator)
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if this block has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Control flow terminator (ends a basic block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Terminator {
    /// Return a value
    Ret { value: Temp },

    /// Return from a `void` function
    RetVoid,

    /// Unconditional jump
    Jump { target: String },

    /// Two-way branch on a `bool` temp
    BranchIf {
        cond: Temp,
        then_target: String,
        else_target: String,
    },

    /// Loop on an iterator: `body` while items remain, `done` afterwards
    BranchIterHasNext {
        iter: Temp,
        body: String,
        done: String,
    },

    /// Control never reaches the end of the block (after `throw`, or a
    /// non-void function falling off its end)
    Unreachable,
}

impl Terminator {
    pub fn jump(target: impl Into<String>) -> Self {
        Terminator::Jump {
            target: target.into(),
        }
    }

    pub fn branch(cond: Temp, then_target: impl Into<String>, else_target: impl Into<String>) -> Self {
        Terminator::BranchIf {
            cond,
            then_target: then_target.into(),
            else_target: else_target.into(),
        }
    }

    /// Get all successor labels
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Terminator::Jump { target } => vec![target.as_str()],
            Terminator::BranchIf {
                then_target,
                else_target,
                ..
            } => vec![then_target.as_str(), else_target.as_str()],
            Terminator::BranchIterHasNext { body, done, .. } => vec![body.as_str(), done.as_str()],
            Terminator::Ret { .. } | Terminator::RetVoid | Terminator::Unreachable => vec![],
        }
    }

    /// Temps read by the terminator
    pub fn operands(&self) -> Vec<Temp> {
        match self {
            Terminator::Ret { value } => vec![*value],
            Terminator::BranchIf { cond, .. } => vec![*cond],
            Terminator::BranchIterHasNext { iter, .. } => vec![*iter],
            _ => vec![],
        }
    }

    pub fn map_operands(&mut self, mut f: impl FnMut(Temp) -> Temp) {
        match self {
            Terminator::Ret { value } => *value = f(*value),
            Terminator::BranchIf { cond, .. } => *cond = f(*cond),
            Terminator::BranchIterHasNext { iter, .. } => *iter = f(*iter),
            _ => {}
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Terminator::Ret { .. } | Terminator::RetVoid)
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            Terminator::Ret { .. } => "ret",
            Terminator::RetVoid => "ret_void",
            Terminator::Jump { .. } => "jump",
            Terminator::BranchIf { .. } => "branch_if",
            Terminator::BranchIterHasNext { .. } => "branch_iter_has_next",
            Terminator::Unreachable => "unreachable",
        }
    }
}

/// Every terminator opcode accepted in serialized IR
pub const TERMINATOR_OPCODES: &[&str] = &[
    "ret",
    "ret_void",
    "jump",
    "branch_if",
    "branch_iter_has_next",
    "unreachable",
];

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminator::Ret { value } => write!(f, "ret {}", value),
            Terminator::RetVoid => write!(f, "ret_void"),
            Terminator::Jump { target } => write!(f, "jump {}", target),
            Terminator::BranchIf {
                cond,
                then_target,
                else_target,
            } => write!(f, "branch_if {} ? {} : {}", cond, then_target, else_target),
            Terminator::BranchIterHasNext { iter, body, done } => {
                write!(f, "branch_iter_has_next {} ? {} : {}", iter, body, done)
            }
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_block_new() {
        let block = BasicBlock::new("entry");
        assert_eq!(block.label, "entry");
        assert!(block.instructions.is_empty());
        assert_eq!(block.terminator, Terminator::Unreachable);
    }

    #[test]
    fn test_terminator_successors() {
        assert_eq!(Terminator::jump("bb1").successors(), vec!["bb1"]);
        assert_eq!(
            Terminator::branch(Temp(0), "then", "else").successors(),
            vec!["then", "else"]
        );
        assert!(Terminator::RetVoid.successors().is_empty());
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(Terminator::jump("loop").to_string(), "jump loop");
        assert_eq!(Terminator::Ret { value: Temp(4) }.to_string(), "ret t4");
        assert_eq!(
            Terminator::branch(Temp(1), "a", "b").to_string(),
            "branch_if t1 ? a : b"
        );
    }

    #[test]
    fn test_terminator_serde_tag() {
        let json = serde_json::to_value(Terminator::jump("x")).unwrap();
        assert_eq!(json["op"], "jump");
        assert_eq!(json["target"], "x");
    }
}
