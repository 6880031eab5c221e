//! Statement Lowering
//!
//! Converts AST statements to IR instructions.

use super::{LowerError, LowerResult, Lowerer};
use crate::ast::{Assignment, ExprKind, ReturnStatement, Statement, VarDecl};
use crate::checker::ValueTarget;
use crate::compiler::ir::{IrInstr, Terminator};
use crate::types::GenericKind;

impl<'a> Lowerer<'a> {
    /// Lower a statement
    pub(super) fn lower_stmt(&mut self, stmt: &Statement) -> LowerResult<()> {
        // Nothing after a terminator is reachable
        if !self.open {
            return Ok(());
        }

        match stmt {
            Statement::VarDecl(decl) => self.lower_var_decl(decl),
            Statement::Assign(assign) => self.lower_assignment(assign),
            Statement::Expression(expr_stmt) => {
                self.lower_expr_opt(&expr_stmt.expr)?;
                Ok(())
            }
            Statement::If(if_stmt) => self.lower_if(if_stmt),
            Statement::While(while_stmt) => self.lower_while(while_stmt),
            Statement::DoWhile(do_while) => self.lower_do_while(do_while),
            Statement::For(for_stmt) => self.lower_for(for_stmt),
            Statement::ForOf(each) => self.lower_for_each(each, false),
            Statement::ForIn(each) => self.lower_for_each(each, true),
            Statement::Switch(switch) => self.lower_switch(switch),
            Statement::Break(_) => self.lower_break(),
            Statement::Continue(_) => self.lower_continue(),
            Statement::Return(ret) => self.lower_return(ret),
            Statement::Throw(throw) => {
                let value = self.lower_expr(&throw.value)?;
                self.emit(IrInstr::Throw { value });
                self.terminate(Terminator::Unreachable);
                Ok(())
            }
            Statement::Try(try_stmt) => self.lower_try(try_stmt),
            Statement::Block(block) => self.lower_scoped(&block.body),
        }
    }

    fn lower_var_decl(&mut self, decl: &VarDecl) -> LowerResult<()> {
        // The initializer sees the outer binding of a shadowed name
        let value = match &decl.init {
            Some(init) => Some(self.lower_expr(init)?),
            None => None,
        };
        let name = self.declare_var(&decl.name, &decl.ty);
        if let Some(src) = value {
            self.emit(IrInstr::StoreVar { name, src });
        }
        Ok(())
    }

    fn lower_assignment(&mut self, assign: &Assignment) -> LowerResult<()> {
        match &assign.target.kind {
            ExprKind::Identifier(source) => {
                let name = self
                    .local(source)
                    .map(str::to_string)
                    .ok_or_else(|| LowerError::UnresolvedName {
                        function: self.func.name.clone(),
                        name: source.clone(),
                    })?;
                let value = match assign.op {
                    None => self.lower_expr(&assign.value)?,
                    Some(op) => {
                        let current = self.emit_value(|dest| IrInstr::LoadVar {
                            dest,
                            name: name.clone(),
                        });
                        let rhs = self.lower_expr(&assign.value)?;
                        let ty = self.type_of(&assign.target)?;
                        self.lower_arith(op, current, rhs, ty)
                    }
                };
                self.emit(IrInstr::StoreVar { name, src: value });
            }
            ExprKind::Member { object, member } => {
                let Some(ValueTarget::Field { proto, .. }) = self.check.value_target(&assign.target) else {
                    return Err(LowerError::UnresolvedName {
                        function: self.func.name.clone(),
                        name: member.clone(),
                    });
                };
                let object = self.lower_expr(object)?;
                let value = match assign.op {
                    None => self.lower_expr(&assign.value)?,
                    Some(op) => {
                        let current = self.emit_value(|dest| IrInstr::FieldGet {
                            dest,
                            object,
                            proto: proto.clone(),
                            field: member.clone(),
                        });
                        let rhs = self.lower_expr(&assign.value)?;
                        let ty = self.type_of(&assign.target)?;
                        self.lower_arith(op, current, rhs, ty)
                    }
                };
                self.emit(IrInstr::FieldSet {
                    object,
                    proto: proto.clone(),
                    field: member.clone(),
                    value,
                });
            }
            ExprKind::Index { object, index } => {
                let is_map = self.type_of(object)?.generic_kind() == Some(GenericKind::Map);
                let object = self.lower_expr(object)?;
                let index = self.lower_expr(index)?;
                if !is_map {
                    self.emit(IrInstr::CheckIndexBounds { object, index });
                }
                let value = match assign.op {
                    None => self.lower_expr(&assign.value)?,
                    Some(op) => {
                        if is_map {
                            self.emit(IrInstr::CheckMapKey { map: object, key: index });
                        }
                        let current = self.emit_value(|dest| IrInstr::IndexGet { dest, object, index });
                        let rhs = self.lower_expr(&assign.value)?;
                        let ty = self.type_of(&assign.target)?;
                        self.lower_arith(op, current, rhs, ty)
                    }
                };
                self.emit(IrInstr::IndexSet { object, index, value });
            }
            _ => {
                return Err(LowerError::UnresolvedName {
                    function: self.func.name.clone(),
                    name: "<assignment target>".to_string(),
                })
            }
        }
        Ok(())
    }

    fn lower_return(&mut self, ret: &ReturnStatement) -> LowerResult<()> {
        let value = match &ret.value {
            Some(value) => Some(self.lower_expr(value)?),
            None => None,
        };
        self.unwind_to(0);
        match value {
            Some(value) => self.terminate(Terminator::Ret { value }),
            None => self.terminate(Terminator::RetVoid),
        }
        Ok(())
    }

    fn lower_break(&mut self) -> LowerResult<()> {
        let Some(targets) = self.jump_targets.last().cloned() else {
            return Err(LowerError::StrayJump {
                function: self.func.name.clone(),
                kind: "break",
            });
        };
        self.unwind_to(targets.try_depth);
        self.jump(&targets.break_label);
        Ok(())
    }

    fn lower_continue(&mut self) -> LowerResult<()> {
        let found = self
            .jump_targets
            .iter()
            .rev()
            .find_map(|t| t.continue_label.clone().map(|label| (label, t.try_depth)));
        let Some((label, depth)) = found else {
            return Err(LowerError::StrayJump {
                function: self.func.name.clone(),
                kind: "continue",
            });
        };
        self.unwind_to(depth);
        self.jump(&label);
        Ok(())
    }
}
