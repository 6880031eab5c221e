//! Function Inlining Optimization
//!
//! Inlines leaf functions (a single block of pure, call-free instructions)
//! at their `call_static` sites. Rounds repeat until no call site changes,
//! since inlining can turn a caller into a leaf.

use crate::compiler::ir::{IrFunction, IrInstr, IrModule, Temp, Terminator};
use rustc_hash::FxHashMap;

/// Function inliner
#[derive(Debug, Default)]
pub struct Inliner;

/// Cached body of an inlinable function
#[derive(Debug, Clone)]
struct InlinableBody {
    params: Vec<String>,
    instructions: Vec<IrInstr>,
    return_value: Option<Temp>,
}

impl Inliner {
    pub fn new() -> Self {
        Self
    }

    /// Run inlining on an entire module, returning the number of call sites replaced
    pub fn inline(&self, module: &mut IrModule) -> usize {
        let mut total = 0;
        loop {
            // Phase 1: find all inlinable functions and cache their bodies
            let inlinable = self.find_inlinable_functions(module);
            if inlinable.is_empty() {
                break;
            }

            // Phase 2: inline calls in every function
            let mut round = 0;
            for func in &mut module.functions {
                round += self.inline_calls_in_function(func, &inlinable);
            }
            if round == 0 {
                break;
            }
            total += round;
        }
        total
    }

    fn find_inlinable_functions(&self, module: &IrModule) -> FxHashMap<String, InlinableBody> {
        module
            .functions
            .iter()
            .filter_map(|func| Some((func.name.clone(), self.extract_inlinable_body(func)?)))
            .collect()
    }

    /// Check if a function is inlinable and extract its body if so
    fn extract_inlinable_body(&self, func: &IrFunction) -> Option<InlinableBody> {
        // Must have exactly one basic block
        let [block] = func.blocks.as_slice() else {
            return None;
        };

        let return_value = match &block.terminator {
            Terminator::Ret { value } => Some(*value),
            Terminator::RetVoid => None,
            _ => return None,
        };

        if !block
            .instructions
            .iter()
            .all(|instr| self.is_inlinable_instruction(instr, func))
        {
            return None;
        }

        Some(InlinableBody {
            params: func.params.iter().map(|p| p.name.clone()).collect(),
            instructions: block.instructions.clone(),
            return_value,
        })
    }

    fn is_inlinable_instruction(&self, instr: &IrInstr, func: &IrFunction) -> bool {
        match instr {
            // Loading anything but a parameter would read the caller's variables
            IrInstr::LoadVar { name, .. } => func.is_param(name),
            IrInstr::Const { .. }
            | IrInstr::Copy { .. }
            | IrInstr::BinOp { .. }
            | IrInstr::UnaryOp { .. }
            | IrInstr::Cast { .. }
            | IrInstr::Select { .. } => true,
            check => check.is_check(),
        }
    }

    /// Inline calls in a single function
    fn inline_calls_in_function(
        &self,
        func: &mut IrFunction,
        inlinable: &FxHashMap<String, InlinableBody>,
    ) -> usize {
        let mut next_temp = func.next_temp();
        let mut replaced = 0;

        for block in &mut func.blocks {
            let mut new_instructions = Vec::with_capacity(block.instructions.len());

            for instr in block.instructions.drain(..) {
                if let IrInstr::CallStatic {
                    dest,
                    func: callee,
                    args,
                } = &instr
                {
                    if let Some(body) = inlinable.get(callee) {
                        if body.params.len() == args.len() {
                            let inlined = self.inline_call(*dest, args, body, &mut next_temp);
                            new_instructions.extend(inlined);
                            replaced += 1;
                            continue;
                        }
                    }
                }
                new_instructions.push(instr);
            }

            block.instructions = new_instructions;
        }

        replaced
    }

    /// Inline a single call, returning the replacement instructions
    fn inline_call(
        &self,
        call_dest: Option<Temp>,
        args: &[Temp],
        body: &InlinableBody,
        next_temp: &mut u32,
    ) -> Vec<IrInstr> {
        let mut temp_map: FxHashMap<Temp, Temp> = FxHashMap::default();
        let mut result = Vec::with_capacity(body.instructions.len() + 1);

        for instr in &body.instructions {
            // Parameter loads are elided: their temp maps straight to the argument
            if let IrInstr::LoadVar { dest, name } = instr {
                if let Some(index) = body.params.iter().position(|p| p == name) {
                    temp_map.insert(*dest, args[index]);
                    continue;
                }
            }

            let mut renamed = instr.clone();
            renamed.map_operands(|t| temp_map.get(&t).copied().unwrap_or(t));
            if let Some(dest) = renamed.dest_mut() {
                let fresh = Temp(*next_temp);
                *next_temp += 1;
                temp_map.insert(*dest, fresh);
                *dest = fresh;
            }
            result.push(renamed);
        }

        if let (Some(ret), Some(dest)) = (body.return_value, call_dest) {
            let src = temp_map.get(&ret).copied().unwrap_or(ret);
            result.push(IrInstr::Copy { dest, src });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::compiler::ir::{BasicBlock, IrConstant, IrParam};
    use crate::types::Type;

    fn double() -> IrFunction {
        let mut func = IrFunction::new("double", vec![IrParam::new("n", Type::int())], Type::int());
        let mut block = BasicBlock::new("entry");
        block.add_instr(IrInstr::LoadVar {
            dest: Temp(0),
            name: "n".into(),
        });
        block.add_instr(IrInstr::Const {
            dest: Temp(1),
            value: IrConstant::Int(2),
        });
        block.add_instr(IrInstr::BinOp {
            dest: Temp(2),
            op: BinaryOp::Mul,
            left: Temp(0),
            right: Temp(1),
        });
        block.set_terminator(Terminator::Ret { value: Temp(2) });
        func.add_block(block);
        func
    }

    fn caller(callee: &str) -> IrFunction {
        let mut func = IrFunction::new("main", vec![], Type::void());
        let mut block = BasicBlock::new("entry");
        block.add_instr(IrInstr::Const {
            dest: Temp(0),
            value: IrConstant::Int(21),
        });
        block.add_instr(IrInstr::CallStatic {
            dest: Some(Temp(1)),
            func: callee.into(),
            args: vec![Temp(0)],
        });
        block.add_instr(IrInstr::Print { value: Temp(1) });
        block.set_terminator(Terminator::RetVoid);
        func.add_block(block);
        func
    }

    #[test]
    fn test_inline_leaf_call() {
        let mut module = IrModule::new("test");
        module.add_function(double());
        module.add_function(caller("double"));

        assert_eq!(Inliner::new().inline(&mut module), 1);
        let main = module.get_function("main").unwrap();
        let instrs = &main.blocks[0].instructions;
        assert!(!instrs.iter().any(|i| matches!(i, IrInstr::CallStatic { .. })));
        assert!(matches!(instrs[3], IrInstr::Copy { dest: Temp(1), .. }));
        assert!(main.validate().is_ok());
    }

    #[test]
    fn test_non_leaf_not_inlined() {
        let mut looping = double();
        looping.name = "looping".into();
        looping.blocks[0].add_instr(IrInstr::Print { value: Temp(2) });

        let mut module = IrModule::new("test");
        module.add_function(looping);
        module.add_function(caller("looping"));
        assert_eq!(Inliner::new().inline(&mut module), 0);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut module = IrModule::new("test");
        module.add_function(double());
        module.add_function(caller("double"));
        let inliner = Inliner::new();
        inliner.inline(&mut module);
        let once = module.clone();
        assert_eq!(inliner.inline(&mut module), 0);
        assert_eq!(module, once);
    }
}
