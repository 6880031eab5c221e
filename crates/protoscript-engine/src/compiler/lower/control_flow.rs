//! Control-flow lowering: conditionals, loops, switch, and exception regions

use super::{JumpTargets, LowerResult, Lowerer};
use crate::ast::{
    BinaryOp, DoWhileStatement, ForEachStatement, ForStatement, IfStatement, SwitchStatement,
    TryStatement, WhileStatement,
};
use crate::compiler::ir::{IrInstr, IterKind, Terminator};
use crate::types::Type;
use rustc_hash::FxHashMap;

impl<'a> Lowerer<'a> {
    pub(super) fn lower_if(&mut self, if_stmt: &IfStatement) -> LowerResult<()> {
        let cond = self.lower_expr(&if_stmt.condition)?;
        let then_label = self.fresh_label("if_then");
        let end_label = self.fresh_label("if_end");
        let else_label = match if_stmt.else_branch {
            Some(_) => self.fresh_label("if_else"),
            None => end_label.clone(),
        };
        self.terminate(Terminator::branch(cond, then_label.clone(), else_label.clone()));

        self.start_block(then_label);
        self.lower_scoped(&if_stmt.then_branch)?;
        self.jump(&end_label);

        if let Some(else_branch) = &if_stmt.else_branch {
            self.start_block(else_label);
            self.lower_scoped(else_branch)?;
            self.jump(&end_label);
        }

        self.start_block(end_label);
        Ok(())
    }

    pub(super) fn lower_while(&mut self, while_stmt: &WhileStatement) -> LowerResult<()> {
        let cond_label = self.fresh_label("while_cond");
        let body_label = self.fresh_label("while_body");
        let done_label = self.fresh_label("while_done");

        self.jump(&cond_label);
        self.start_block(cond_label.clone());
        let cond = self.lower_expr(&while_stmt.condition)?;
        self.terminate(Terminator::branch(cond, body_label.clone(), done_label.clone()));

        self.start_block(body_label);
        self.lower_loop_body(&while_stmt.body, &done_label, &cond_label)?;
        self.jump(&cond_label);

        self.start_block(done_label);
        Ok(())
    }

    pub(super) fn lower_do_while(&mut self, do_while: &DoWhileStatement) -> LowerResult<()> {
        let body_label = self.fresh_label("do_body");
        let cond_label = self.fresh_label("do_cond");
        let done_label = self.fresh_label("do_done");

        self.jump(&body_label);
        self.start_block(body_label.clone());
        self.lower_loop_body(&do_while.body, &done_label, &cond_label)?;
        self.jump(&cond_label);

        self.start_block(cond_label);
        let cond = self.lower_expr(&do_while.condition)?;
        self.terminate(Terminator::branch(cond, body_label, done_label.clone()));

        self.start_block(done_label);
        Ok(())
    }

    pub(super) fn lower_for(&mut self, for_stmt: &ForStatement) -> LowerResult<()> {
        self.scopes.push(FxHashMap::default());
        if let Some(init) = &for_stmt.init {
            self.lower_stmt(init)?;
        }

        let cond_label = self.fresh_label("for_cond");
        let body_label = self.fresh_label("for_body");
        let step_label = self.fresh_label("for_step");
        let done_label = self.fresh_label("for_done");

        self.jump(&cond_label);
        self.start_block(cond_label.clone());
        match &for_stmt.condition {
            Some(condition) => {
                let cond = self.lower_expr(condition)?;
                self.terminate(Terminator::branch(cond, body_label.clone(), done_label.clone()));
            }
            None => self.jump(&body_label),
        }

        self.start_block(body_label);
        self.lower_loop_body(&for_stmt.body, &done_label, &step_label)?;
        self.jump(&step_label);

        self.start_block(step_label);
        if let Some(update) = &for_stmt.update {
            self.lower_stmt(update)?;
        }
        self.jump(&cond_label);

        self.start_block(done_label);
        self.scopes.pop();
        Ok(())
    }

    /// `for-of` iterates values, `for-in` keys (indices for sequences)
    pub(super) fn lower_for_each(&mut self, each: &ForEachStatement, keys: bool) -> LowerResult<()> {
        let iterable_ty = self.type_of(&each.iterable)?;
        let elem = match &each.var_type {
            Some(ty) => ty.clone(),
            None => {
                let inferred = if keys {
                    iterable_ty.key_type()
                } else {
                    iterable_ty.element_type()
                };
                inferred.unwrap_or_else(Type::void)
            }
        };
        let kind = if keys { IterKind::Keys } else { IterKind::Values };

        let iterable = self.lower_expr(&each.iterable)?;
        let iter = self.emit_value(|dest| IrInstr::IterBegin {
            dest,
            iterable,
            kind,
            elem: elem.clone(),
        });

        let head_label = self.fresh_label("each_head");
        let body_label = self.fresh_label("each_body");
        let done_label = self.fresh_label("each_done");

        self.jump(&head_label);
        self.start_block(head_label.clone());
        self.terminate(Terminator::BranchIterHasNext {
            iter,
            body: body_label.clone(),
            done: done_label.clone(),
        });

        self.start_block(body_label);
        self.scopes.push(FxHashMap::default());
        let item = self.emit_value(|dest| IrInstr::IterNext { dest, iter });
        let var = self.declare_var(&each.var_name, &elem);
        self.emit(IrInstr::StoreVar { name: var, src: item });
        let body = self.lower_loop_body(&each.body, &done_label, &head_label);
        self.scopes.pop();
        body?;
        self.jump(&head_label);

        self.start_block(done_label);
        Ok(())
    }

    fn lower_loop_body(
        &mut self,
        body: &[crate::ast::Statement],
        break_label: &str,
        continue_label: &str,
    ) -> LowerResult<()> {
        self.jump_targets.push(JumpTargets {
            break_label: break_label.to_string(),
            continue_label: Some(continue_label.to_string()),
            try_depth: self.try_depth,
        });
        let result = self.lower_scoped(body);
        self.jump_targets.pop();
        result
    }

    /// Chained compare-and-branch blocks sharing one done block
    pub(super) fn lower_switch(&mut self, switch: &SwitchStatement) -> LowerResult<()> {
        let discriminant = self.lower_expr(&switch.discriminant)?;
        let done_label = self.fresh_label("switch_done");

        let body_labels: Vec<String> = switch
            .cases
            .iter()
            .map(|_| self.fresh_label("case_body"))
            .collect();
        let default_target = switch
            .cases
            .iter()
            .position(|c| c.test.is_none())
            .map_or_else(|| done_label.clone(), |i| body_labels[i].clone());

        // Test chain, in source order, skipping the default arm
        let tested: Vec<usize> = (0..switch.cases.len())
            .filter(|&i| switch.cases[i].test.is_some())
            .collect();
        for (n, &i) in tested.iter().enumerate() {
            let Some(test) = &switch.cases[i].test else {
                continue;
            };
            let value = self.lower_expr(test)?;
            let matches = self.emit_value(|dest| IrInstr::BinOp {
                dest,
                op: BinaryOp::Equal,
                left: discriminant,
                right: value,
            });
            let next = if n + 1 < tested.len() {
                self.fresh_label("case_test")
            } else {
                default_target.clone()
            };
            self.terminate(Terminator::branch(matches, body_labels[i].clone(), next.clone()));
            if n + 1 < tested.len() {
                self.start_block(next);
            }
        }
        if tested.is_empty() {
            self.jump(&default_target);
        }

        for (i, case) in switch.cases.iter().enumerate() {
            self.start_block(body_labels[i].clone());
            self.jump_targets.push(JumpTargets {
                break_label: done_label.clone(),
                continue_label: None,
                try_depth: self.try_depth,
            });
            let result = self.lower_scoped(&case.body);
            self.jump_targets.pop();
            result?;
            let next = match body_labels.get(i + 1) {
                Some(next) if case.fallthrough => next.clone(),
                _ => done_label.clone(),
            };
            self.jump(&next);
        }

        self.start_block(done_label);
        Ok(())
    }

    /// `setup_try`/`end_try` around the body; the handler tests each catch
    /// clause in order and re-throws when none matches
    pub(super) fn lower_try(&mut self, try_stmt: &TryStatement) -> LowerResult<()> {
        let handler_label = self.fresh_label("try_handler");
        let done_label = self.fresh_label("try_done");

        self.emit(IrInstr::SetupTry {
            handler: handler_label.clone(),
        });
        self.try_depth += 1;
        let body = self.lower_scoped(&try_stmt.body);
        self.try_depth -= 1;
        body?;
        if self.open {
            self.emit(IrInstr::EndTry);
        }
        self.jump(&done_label);

        self.start_block(handler_label);
        let exception = self.emit_value(|dest| IrInstr::CatchValue { dest });

        for catch in &try_stmt.catches {
            let is_match = self.emit_value(|dest| IrInstr::InstanceOf {
                dest,
                object: exception,
                proto: catch.proto.clone(),
            });
            let body_label = self.fresh_label("catch_body");
            let next_label = self.fresh_label("catch_next");
            self.terminate(Terminator::branch(is_match, body_label.clone(), next_label.clone()));

            self.start_block(body_label);
            self.scopes.push(FxHashMap::default());
            let var = self.declare_var(&catch.binding, &Type::named(catch.proto.clone()));
            self.emit(IrInstr::StoreVar {
                name: var,
                src: exception,
            });
            let result = self.lower_block(&catch.body);
            self.scopes.pop();
            result?;
            self.jump(&done_label);

            self.start_block(next_label);
        }

        // No clause matched
        self.emit(IrInstr::Throw { value: exception });
        self.terminate(Terminator::Unreachable);

        self.start_block(done_label);
        Ok(())
    }
}
