//! Expression Lowering
//!
//! Converts AST expressions to IR instructions. Runtime checks are emitted
//! immediately before the operation they guard.

use super::{LowerError, LowerResult, Lowerer};
use crate::ast::{BinaryOp, ExprKind, Expression, Literal, UnaryOp};
use crate::checker::{CallTarget, ContainerMethod, ValueTarget};
use crate::compiler::const_eval::literal_constant;
use crate::compiler::ir::{IrConstant, IrInstr, Temp, Terminator};
use crate::types::{GenericKind, Type};
use rustc_hash::FxHashMap;

impl<'a> Lowerer<'a> {
    /// Lower an expression that must produce a value
    pub(super) fn lower_expr(&mut self, expr: &Expression) -> LowerResult<Temp> {
        self.lower_expr_opt(expr)?.ok_or_else(|| LowerError::VoidValue {
            function: self.func.name.clone(),
            line: expr.span.line,
            column: expr.span.column,
        })
    }

    /// Lower an expression; `None` for calls returning `void`
    pub(super) fn lower_expr_opt(&mut self, expr: &Expression) -> LowerResult<Option<Temp>> {
        let value = match &expr.kind {
            ExprKind::Literal(lit) => self.lower_literal(expr, lit)?,
            ExprKind::Identifier(name) => self.lower_identifier(expr, name)?,
            ExprKind::SelfRef => self.emit_value(|dest| IrInstr::LoadVar {
                dest,
                name: "self".to_string(),
            }),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand)?,
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => self.lower_logical(*op, left, right)?,
                _ => {
                    let ty = self.type_of(left)?;
                    let l = self.lower_expr(left)?;
                    let r = self.lower_expr(right)?;
                    self.lower_arith(*op, l, r, ty)
                }
            },
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => self.lower_ternary(expr, condition, then_expr, else_expr)?,
            ExprKind::Call { args, .. } => return self.lower_call(expr, None, args),
            ExprKind::MethodCall { receiver, args, .. } => {
                return self.lower_call(expr, Some(receiver), args)
            }
            ExprKind::Member { object, member } => self.lower_member(expr, object, member)?,
            ExprKind::Index { object, index } => {
                let is_map = self.type_of(object)?.generic_kind() == Some(GenericKind::Map);
                let object = self.lower_expr(object)?;
                let index = self.lower_expr(index)?;
                if is_map {
                    self.emit(IrInstr::CheckMapKey { map: object, key: index });
                } else {
                    self.emit(IrInstr::CheckIndexBounds { object, index });
                }
                self.emit_value(|dest| IrInstr::IndexGet { dest, object, index })
            }
            ExprKind::Cast { expr: inner, target } => {
                let src = self.lower_expr(inner)?;
                self.emit_value(|dest| IrInstr::Cast {
                    dest,
                    src,
                    target: target.clone(),
                })
            }
            ExprKind::ListLiteral(items) => {
                let elem = self.type_of(expr)?.element_type().unwrap_or_else(Type::void);
                let items = items
                    .iter()
                    .map(|item| self.lower_expr(item))
                    .collect::<LowerResult<Vec<_>>>()?;
                self.emit_value(|dest| IrInstr::MakeList { dest, elem, items })
            }
            ExprKind::MapLiteral(entries) => {
                let ty = self.type_of(expr)?;
                let key = ty.key_type().unwrap_or_else(Type::void);
                let value = ty.element_type().unwrap_or_else(Type::void);
                let mut lowered = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let k = self.lower_expr(k)?;
                    let v = self.lower_expr(v)?;
                    lowered.push((k, v));
                }
                self.emit_value(|dest| IrInstr::MakeMap {
                    dest,
                    key,
                    value,
                    entries: lowered,
                })
            }
        };
        Ok(Some(value))
    }

    fn lower_literal(&mut self, expr: &Expression, lit: &Literal) -> LowerResult<Temp> {
        let value = match lit {
            Literal::Int(v) if self.check.type_of(expr) == Some(&Type::byte()) => {
                // Range was checked during analysis
                IrConstant::Byte(u8::try_from(*v).unwrap_or_default())
            }
            _ => literal_constant(lit),
        };
        Ok(self.emit_value(|dest| IrInstr::Const { dest, value }))
    }

    fn lower_identifier(&mut self, expr: &Expression, name: &str) -> LowerResult<Temp> {
        if let Some(var) = self.local(name) {
            let var = var.to_string();
            return Ok(self.emit_value(|dest| IrInstr::LoadVar { dest, name: var }));
        }
        match self.check.value_target(expr) {
            Some(ValueTarget::Constant(value)) => {
                let value = value.clone();
                Ok(self.emit_value(|dest| IrInstr::Const { dest, value }))
            }
            Some(ValueTarget::Descriptor(proto)) => self.lower_new_instance(proto),
            _ => Err(LowerError::UnresolvedName {
                function: self.func.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expression) -> LowerResult<Temp> {
        let ty = self.type_of(operand)?;
        let operand = self.lower_expr(operand)?;
        if op == UnaryOp::Neg && ty.is_integer() {
            self.emit(IrInstr::CheckNegOverflow {
                operand,
                ty: ty.clone(),
            });
        }
        Ok(self.emit_value(|dest| IrInstr::UnaryOp { dest, op, operand }))
    }

    /// Emit `left op right` on operands of type `ty`, preceded by the
    /// runtime check the operator needs
    pub(super) fn lower_arith(&mut self, op: BinaryOp, left: Temp, right: Temp, ty: &Type) -> Temp {
        if ty.is_integer() {
            match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                    self.emit(IrInstr::CheckOverflow {
                        op,
                        left,
                        right,
                        ty: ty.clone(),
                    });
                }
                BinaryOp::Div | BinaryOp::Mod => {
                    self.emit(IrInstr::CheckDivZero { divisor: right });
                }
                BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                    let width = if *ty == Type::byte() { 8 } else { 64 };
                    self.emit(IrInstr::CheckShiftRange {
                        amount: right,
                        width,
                    });
                }
                _ => {}
            }
        }
        self.emit_value(|dest| IrInstr::BinOp {
            dest,
            op,
            left,
            right,
        })
    }

    /// `&&` and `||`
    ///
    /// A right operand without effects or checks is evaluated eagerly and
    /// combined with `select`; anything else short-circuits through a
    /// branch.
    fn lower_logical(&mut self, op: BinaryOp, left: &Expression, right: &Expression) -> LowerResult<Temp> {
        let l = self.lower_expr(left)?;

        let trivial = match &right.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Identifier(name) => self.local(name).is_some(),
            _ => false,
        };
        if trivial {
            let r = self.lower_expr(right)?;
            let (then_val, else_val) = match op {
                BinaryOp::And => (r, l),
                _ => (l, r),
            };
            return Ok(self.emit_value(|dest| IrInstr::Select {
                dest,
                cond: l,
                then_val,
                else_val,
            }));
        }

        let joined = self.declare_hidden(&Type::bool());
        self.emit(IrInstr::StoreVar {
            name: joined.clone(),
            src: l,
        });
        let rhs_label = self.fresh_label("logic_rhs");
        let end_label = self.fresh_label("logic_end");
        let term = match op {
            BinaryOp::And => Terminator::branch(l, rhs_label.clone(), end_label.clone()),
            _ => Terminator::branch(l, end_label.clone(), rhs_label.clone()),
        };
        self.terminate(term);

        self.start_block(rhs_label);
        let r = self.lower_expr(right)?;
        self.emit(IrInstr::StoreVar {
            name: joined.clone(),
            src: r,
        });
        self.jump(&end_label);

        self.start_block(end_label);
        Ok(self.emit_value(|dest| IrInstr::LoadVar { dest, name: joined }))
    }

    fn lower_ternary(
        &mut self,
        expr: &Expression,
        condition: &Expression,
        then_expr: &Expression,
        else_expr: &Expression,
    ) -> LowerResult<Temp> {
        let ty = self.type_of(expr)?;
        let cond = self.lower_expr(condition)?;
        let joined = self.declare_hidden(ty);
        let then_label = self.fresh_label("tern_then");
        let else_label = self.fresh_label("tern_else");
        let end_label = self.fresh_label("tern_end");
        self.terminate(Terminator::branch(cond, then_label.clone(), else_label.clone()));

        for (label, branch) in [(then_label, then_expr), (else_label, else_expr)] {
            self.start_block(label);
            let value = self.lower_expr(branch)?;
            self.emit(IrInstr::StoreVar {
                name: joined.clone(),
                src: value,
            });
            self.jump(&end_label);
        }

        self.start_block(end_label);
        Ok(self.emit_value(|dest| IrInstr::LoadVar { dest, name: joined }))
    }

    fn lower_args(&mut self, args: &[Expression]) -> LowerResult<Vec<Temp>> {
        args.iter().map(|arg| self.lower_expr(arg)).collect()
    }

    /// Calls of every kind, dispatched on the resolved target
    fn lower_call(
        &mut self,
        expr: &Expression,
        receiver: Option<&Expression>,
        args: &[Expression],
    ) -> LowerResult<Option<Temp>> {
        let Some(target) = self.check.call_target(expr) else {
            return Err(LowerError::UnresolvedCall {
                function: self.func.name.clone(),
                line: expr.span.line,
                column: expr.span.column,
            });
        };
        let returns_value = !self.type_of(expr)?.is_void();

        match target {
            CallTarget::Function(func) => {
                let args = self.lower_args(args)?;
                let dest = returns_value.then(|| self.fresh_temp());
                self.emit(IrInstr::CallStatic {
                    dest,
                    func: func.clone(),
                    args,
                });
                Ok(dest)
            }
            CallTarget::Print => {
                for value in self.lower_args(args)? {
                    self.emit(IrInstr::Print { value });
                }
                Ok(None)
            }
            CallTarget::Extern { module, func, ret } => {
                // Handle methods pass the handle first; namespaces have no value
                let mut lowered = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = receiver.filter(|r| self.check.type_of(r).is_some()) {
                    lowered.push(self.lower_expr(receiver)?);
                }
                lowered.extend(self.lower_args(args)?);
                let dest = (!ret.is_void()).then(|| self.fresh_temp());
                self.emit(IrInstr::CallExtern {
                    dest,
                    module: module.clone(),
                    func: func.clone(),
                    args: lowered,
                    ret: ret.clone(),
                });
                Ok(dest)
            }
            CallTarget::Method { proto, method, .. } => {
                let receiver = self.lower_receiver(expr, receiver)?;
                let args = self.lower_args(args)?;
                let dest = returns_value.then(|| self.fresh_temp());
                self.emit(IrInstr::CallMethod {
                    dest,
                    receiver,
                    proto: proto.clone(),
                    method: method.clone(),
                    args,
                });
                Ok(dest)
            }
            CallTarget::PrototypeClone(proto) => self.lower_new_instance(proto).map(Some),
            CallTarget::InstanceClone(proto) => {
                let src = self.lower_receiver(expr, receiver)?;
                let proto = proto.clone();
                Ok(Some(self.emit_value(|dest| IrInstr::CloneObject { dest, src, proto })))
            }
            CallTarget::Container(method) => {
                let container = self.lower_receiver(expr, receiver)?;
                let args = self.lower_args(args)?;
                self.lower_container_call(expr, *method, container, &args)
            }
        }
    }

    fn lower_receiver(&mut self, call: &Expression, receiver: Option<&Expression>) -> LowerResult<Temp> {
        match receiver {
            Some(receiver) => self.lower_expr(receiver),
            None => Err(LowerError::UnresolvedCall {
                function: self.func.name.clone(),
                line: call.span.line,
                column: call.span.column,
            }),
        }
    }

    fn lower_container_call(
        &mut self,
        expr: &Expression,
        method: ContainerMethod,
        container: Temp,
        args: &[Temp],
    ) -> LowerResult<Option<Temp>> {
        let function = self.func.name.clone();
        let arg = |i: usize| -> LowerResult<Temp> {
            args.get(i).copied().ok_or_else(|| LowerError::UnresolvedCall {
                function: function.clone(),
                line: expr.span.line,
                column: expr.span.column,
            })
        };

        let value = match method {
            ContainerMethod::Push => {
                let value = arg(0)?;
                self.emit(IrInstr::ListPush {
                    list: container,
                    value,
                });
                None
            }
            ContainerMethod::Pop => Some(self.emit_value(|dest| IrInstr::ListPop {
                dest,
                list: container,
            })),
            ContainerMethod::Length => Some(self.emit_value(|dest| IrInstr::Length {
                dest,
                object: container,
            })),
            ContainerMethod::View | ContainerMethod::Slice => {
                let (start, end) = (arg(0)?, arg(1)?);
                let elem = self.type_of(expr)?.element_type().unwrap_or_else(Type::void);
                Some(self.emit_value(|dest| {
                    if method == ContainerMethod::View {
                        IrInstr::MakeView {
                            dest,
                            source: container,
                            start,
                            end,
                            elem,
                        }
                    } else {
                        IrInstr::MakeSlice {
                            dest,
                            source: container,
                            start,
                            end,
                            elem,
                        }
                    }
                }))
            }
            ContainerMethod::Clear => {
                self.emit(IrInstr::ListClear { list: container });
                None
            }
            ContainerMethod::Has => {
                let key = arg(0)?;
                Some(self.emit_value(|dest| IrInstr::MapHas {
                    dest,
                    map: container,
                    key,
                }))
            }
            ContainerMethod::Remove => {
                let key = arg(0)?;
                self.emit(IrInstr::MapRemove { map: container, key });
                None
            }
        };
        Ok(value)
    }

    fn lower_member(&mut self, expr: &Expression, object: &Expression, member: &str) -> LowerResult<Temp> {
        match self.check.value_target(expr) {
            Some(ValueTarget::Constant(value)) => {
                let value = value.clone();
                Ok(self.emit_value(|dest| IrInstr::Const { dest, value }))
            }
            Some(ValueTarget::Field { proto, field }) => {
                let object = self.lower_expr(object)?;
                let (proto, field) = (proto.clone(), field.clone());
                Ok(self.emit_value(|dest| IrInstr::FieldGet {
                    dest,
                    object,
                    proto,
                    field,
                }))
            }
            _ => Err(LowerError::UnresolvedName {
                function: self.func.name.clone(),
                name: member.to_string(),
            }),
        }
    }

    /// Fresh instance of `proto` with every declared field initializer
    /// applied, ancestors first
    fn lower_new_instance(&mut self, proto: &str) -> LowerResult<Temp> {
        let object = self.emit_value(|dest| IrInstr::NewObject {
            dest,
            proto: proto.to_string(),
        });

        let registry = self.registry;
        let program = self.program;
        for field in registry.layout(proto).into_iter().filter(|f| f.has_init) {
            let init = program
                .prototypes()
                .find(|p| p.name == field.declared_in)
                .and_then(|p| p.fields.iter().find(|f| f.name == field.name))
                .and_then(|f| f.init.as_ref());
            let Some(init) = init else {
                continue;
            };

            // Initializers see no locals of the surrounding function
            let saved = std::mem::replace(&mut self.scopes, vec![FxHashMap::default()]);
            let value = self.lower_expr(init);
            self.scopes = saved;
            let value = value?;

            self.emit(IrInstr::FieldSet {
                object,
                proto: proto.to_string(),
                field: field.name.clone(),
                value,
            });
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{lower, main_with, ops};
    use crate::ast::*;
    use crate::compiler::ir::{IrConstant, IrInstr, Terminator};
    use crate::types::Type;

    fn double() -> FunctionDecl {
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

    #[test]
    fn test_call_lowers_to_call_static() {
        let program = main_with(vec![Statement::expr(Expression::call(
            "print",
            vec![Expression::call("double", vec![Expression::int(21)])],
        ))])
        .with_function(double());
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(ops(main), vec!["const", "call_static", "print"]);
        assert!(matches!(
            &main.blocks[0].instructions[1],
            IrInstr::CallStatic { dest: Some(_), func, args } if func == "double" && args.len() == 1
        ));
    }

    #[test]
    fn test_and_with_plain_operand_uses_select() {
        let program = main_with(vec![
            Statement::var(Type::bool(), "a", Expression::bool(true)),
            Statement::var(Type::bool(), "b", Expression::bool(false)),
            Statement::var(
                Type::bool(),
                "c",
                Expression::binary(BinaryOp::And, Expression::ident("a"), Expression::ident("b")),
            ),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(main.blocks.len(), 1);
        assert!(ops(main).contains(&"select"));
    }

    #[test]
    fn test_or_with_call_short_circuits() {
        let is_ready = FunctionDecl::new("ready", vec![], Type::bool(), vec![Statement::ret(Expression::bool(true))]);
        let program = main_with(vec![
            Statement::var(Type::bool(), "a", Expression::bool(false)),
            Statement::var(
                Type::bool(),
                "c",
                Expression::binary(BinaryOp::Or, Expression::ident("a"), Expression::call("ready", vec![])),
            ),
        ])
        .with_function(is_ready);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(main.blocks.len(), 3);
        assert!(matches!(
            &main.blocks[0].terminator,
            Terminator::BranchIf { then_target, .. } if then_target.starts_with("logic_end")
        ));
        assert!(!ops(main).contains(&"select"));
        assert!(module.validate().is_ok());
    }

    #[test]
    fn test_byte_literal_and_shift_width() {
        let program = main_with(vec![
            Statement::var(Type::byte(), "b", Expression::int(200)),
            Statement::var(
                Type::byte(),
                "c",
                Expression::binary(BinaryOp::ShiftLeft, Expression::ident("b"), Expression::int(1)),
            ),
        ]);
        let module = lower(&program);
        let instrs = &module.get_function("main").unwrap().blocks[0].instructions;
        assert!(instrs
            .iter()
            .any(|i| matches!(i, IrInstr::Const { value: IrConstant::Byte(200), .. })));
        assert!(instrs
            .iter()
            .any(|i| matches!(i, IrInstr::CheckShiftRange { width: 8, .. })));
    }

    #[test]
    fn test_negation_is_guarded() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(1)),
            Statement::var(Type::int(), "y", Expression::unary(UnaryOp::Neg, Expression::ident("x"))),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        let all = ops(main);
        let neg = all.iter().position(|o| *o == "unary_op").unwrap();
        assert_eq!(all[neg - 1], "check_neg_overflow");
    }

    #[test]
    fn test_prototype_clone_applies_initializers() {
        let program = main_with(vec![Statement::var(
            Type::named("Point"),
            "p",
            Expression::method(Expression::ident("Point"), "clone", vec![]),
        )])
        .with_prototype(
            PrototypeDecl::new("Point")
                .with_field(FieldDecl::new("x", Type::int(), Some(Expression::int(3))))
                .with_field(FieldDecl::new("y", Type::int(), None)),
        );
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(
            ops(main),
            vec!["new_object", "const", "field_set", "var_decl", "store_var"]
        );
    }

    #[test]
    fn test_ternary_joins_through_variable() {
        let program = main_with(vec![
            Statement::var(Type::bool(), "f", Expression::bool(true)),
            Statement::var(
                Type::int(),
                "x",
                Expression::ternary(Expression::ident("f"), Expression::int(1), Expression::int(2)),
            ),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(main.blocks.len(), 4);
        let end = main.blocks.last().unwrap();
        assert!(matches!(&end.instructions[0], IrInstr::LoadVar { name, .. } if name.starts_with("__join")));
        assert!(module.validate().is_ok());
    }

    #[test]
    fn test_container_methods() {
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "xs", Expression::list(vec![])),
            Statement::expr(Expression::method(Expression::ident("xs"), "push", vec![Expression::int(4)])),
            Statement::var(
                Type::view(Type::int()),
                "v",
                Expression::method(Expression::ident("xs"), "view", vec![Expression::int(0), Expression::int(1)]),
            ),
            Statement::expr(Expression::call(
                "print",
                vec![Expression::method(Expression::ident("v"), "length", vec![])],
            )),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        let all = ops(main);
        assert!(all.contains(&"list_push"));
        assert!(all.contains(&"length"));
        assert!(main.blocks[0]
            .instructions
            .iter()
            .any(|i| matches!(i, IrInstr::MakeView { elem, .. } if *elem == Type::int())));
    }
}
