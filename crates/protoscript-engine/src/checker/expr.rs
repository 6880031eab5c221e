//! Expression checking

use super::builtins::{container_method, ContainerMethod};
use super::error::codes;
use super::imports::constant_value;
use super::suggest::suggest;
use super::checker::TypeChecker;
use super::{CallTarget, ValueTarget};
use crate::ast::{BinaryOp, ExprKind, Expression, Literal, Span, UnaryOp};
use crate::compiler::const_eval::{cast_constant, evaluate};
use crate::types::{GenericKind, Type};

impl<'a> TypeChecker<'a> {
    /// Type of `expr`, or `None` when an error was already reported
    pub(super) fn check_expr(&mut self, expr: &Expression) -> Option<Type> {
        self.check_expr_with(expr, None)
    }

    /// Like [`Self::check_expr`], with the type the context expects
    ///
    /// Only literals use the expectation: integer literals become `byte`,
    /// empty containers adopt the expected container type.
    pub(super) fn check_expr_with(
        &mut self,
        expr: &Expression,
        expected: Option<&Type>,
    ) -> Option<Type> {
        let ty = self.infer_expr(expr, expected)?;
        self.result.expr_types.insert(expr.node_id(), ty.clone());
        Some(ty)
    }

    /// Check `expr` and report `E3001` unless it can be stored as `expected`
    pub(super) fn check_assignable_expr(&mut self, expr: &Expression, expected: &Type) {
        let Some(actual) = self.check_expr_with(expr, Some(expected)) else {
            return;
        };
        if !self.registry.is_assignable(&actual, expected) {
            self.error(
                expr.span,
                codes::TYPE_MISMATCH,
                format!("expected '{}', found '{}'", expected, actual),
            );
        }
    }

    fn infer_expr(&mut self, expr: &Expression, expected: Option<&Type>) -> Option<Type> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.check_literal(lit, expr.span, expected),
            ExprKind::Identifier(name) => self.check_identifier(expr, name),
            ExprKind::SelfRef => match &self.current_proto {
                Some(proto) => Some(Type::named(proto.clone())),
                None => {
                    self.error(
                        expr.span,
                        codes::SELF_OUTSIDE_METHOD,
                        "'self' can only be used inside a method",
                    );
                    None
                }
            },
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, expr.span),
            ExprKind::Binary { op, left, right } => self.check_binary(*op, left, right, expr.span),
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => self.check_ternary(condition, then_expr, else_expr, expected),
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(expr, receiver, method, args),
            ExprKind::Member { object, member } => self.check_member(expr, object, member),
            ExprKind::Index { object, index } => {
                let Some(object_ty) = self.check_expr(object) else {
                    self.check_expr(index);
                    return None;
                };
                self.check_index_parts(&object_ty, index, expr.span)
            }
            ExprKind::Cast { expr: inner, target } => self.check_cast(inner, target, expr.span),
            ExprKind::ListLiteral(items) => self.check_list_literal(items, expected),
            ExprKind::MapLiteral(entries) => self.check_map_literal(entries, expected),
        }
    }

    fn check_literal(&mut self, lit: &Literal, span: Span, expected: Option<&Type>) -> Option<Type> {
        match lit {
            Literal::Int(value) if expected == Some(&Type::byte()) => {
                if u8::try_from(*value).is_err() {
                    self.error(
                        span,
                        codes::BYTE_LITERAL_RANGE,
                        format!("literal {} does not fit in a byte (0..255)", value),
                    );
                }
                Some(Type::byte())
            }
            _ => Some(lit.ty()),
        }
    }

    fn check_identifier(&mut self, expr: &Expression, name: &str) -> Option<Type> {
        if let Some(binding) = self.symbols.resolve(name) {
            let ty = binding.ty.clone();
            if !binding.initialized {
                self.error(
                    expr.span,
                    codes::UNINITIALIZED_USE,
                    format!("'{}' is used before being initialized", name),
                );
            }
            return Some(ty);
        }

        if self.registry.contains(name) {
            self.result
                .value_targets
                .insert(expr.node_id(), ValueTarget::Descriptor(name.to_string()));
            return Some(Type::named(name));
        }

        if let Some((module, member)) = self.result.imports.member(name) {
            let modules = self.modules;
            if let Some(constant) = modules.constant(module, member) {
                return self.module_constant(expr, constant);
            }
            self.error(
                expr.span,
                codes::INVALID_OPERAND,
                format!("'{}' is a function and must be called", name),
            );
            return None;
        }

        if self.result.groups.contains(name) {
            self.error(
                expr.span,
                codes::INVALID_OPERAND,
                format!("group '{}' is not a value; use one of its members", name),
            );
            return None;
        }
        if self.result.imports.namespace(name).is_some() {
            self.error(
                expr.span,
                codes::INVALID_OPERAND,
                format!("module '{}' is not a value", name),
            );
            return None;
        }
        if self.functions.contains_key(name) {
            self.error(
                expr.span,
                codes::INVALID_OPERAND,
                format!("function '{}' must be called", name),
            );
            return None;
        }

        self.undefined_name(name, expr.span);
        None
    }

    fn module_constant(
        &mut self,
        expr: &Expression,
        constant: &super::modules::ModuleConstant,
    ) -> Option<Type> {
        match constant_value(constant) {
            Some(value) => {
                self.result
                    .value_targets
                    .insert(expr.node_id(), ValueTarget::Constant(value));
                Some(constant.ty.clone())
            }
            None => {
                self.error(
                    expr.span,
                    codes::TYPE_MISMATCH,
                    format!(
                        "module constant '{}' has a value that is not a '{}'",
                        constant.name, constant.ty
                    ),
                );
                None
            }
        }
    }

    /// Report `E2001` with suggestions drawn from every visible name
    pub(super) fn undefined_name(&mut self, name: &str, span: Span) {
        let suggestions = {
            let mut candidates: Vec<&str> = self.symbols.visible_names();
            candidates.extend(self.functions.keys().copied());
            candidates.extend(self.registry.names());
            candidates.extend(self.result.groups.names());
            candidates.extend(self.result.imports.namespace_names());
            candidates.extend(self.result.imports.member_names());
            candidates.push("print");
            suggest(name, candidates)
        };
        self.error_with(
            span,
            codes::UNDEFINED_NAME,
            format!("Cannot find name '{}'", name),
            suggestions,
        );
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expression, span: Span) -> Option<Type> {
        let ty = self.check_expr(operand)?;
        let ok = match op {
            UnaryOp::Neg => ty.is_numeric(),
            UnaryOp::Not => ty.is_bool(),
            UnaryOp::BitNot => ty.is_integer(),
        };
        if !ok {
            self.error(
                span,
                codes::INVALID_OPERAND,
                format!("operator '{}' cannot be applied to '{}'", op, ty),
            );
            return None;
        }
        Some(ty)
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        span: Span,
    ) -> Option<Type> {
        // An integer literal takes the type of the other operand (`b + 1` on a byte)
        let (left_ty, right_ty) = if is_int_literal(left) && !is_int_literal(right) {
            let right_ty = self.check_expr(right);
            (self.check_expr_with(left, right_ty.as_ref()), right_ty)
        } else {
            let left_ty = self.check_expr(left);
            (left_ty.clone(), self.check_expr_with(right, left_ty.as_ref()))
        };
        self.binary_result(op, &left_ty?, &right_ty?, span)
    }

    /// Result type of `left op right`, reporting operand errors
    pub(super) fn binary_result(
        &mut self,
        op: BinaryOp,
        left: &Type,
        right: &Type,
        span: Span,
    ) -> Option<Type> {
        if op.is_logical() {
            if left.is_bool() && right.is_bool() {
                return Some(Type::bool());
            }
            self.error(
                span,
                codes::INVALID_OPERAND,
                format!("'{}' needs 'bool' operands, found '{}' and '{}'", op, left, right),
            );
            return None;
        }

        if left != right {
            let related = op.is_equality()
                && (self.registry.is_assignable(left, right)
                    || self.registry.is_assignable(right, left));
            if related {
                return Some(Type::bool());
            }
            self.error(
                span,
                codes::TYPE_MISMATCH,
                format!(
                    "operands of '{}' must have the same type, found '{}' and '{}'",
                    op, left, right
                ),
            );
            return None;
        }

        let ok = if op.is_equality() {
            left.is_scalar() || left.as_named().is_some()
        } else if op.is_comparison() {
            left.is_numeric() || left.is_string() || *left == Type::glyph()
        } else if op.is_arithmetic() {
            left.is_numeric() || (op == BinaryOp::Add && left.is_string())
        } else {
            left.is_integer()
        };
        if !ok {
            self.error(
                span,
                codes::INVALID_OPERAND,
                format!("operator '{}' cannot be applied to '{}'", op, left),
            );
            return None;
        }

        if op.is_comparison() {
            Some(Type::bool())
        } else {
            Some(left.clone())
        }
    }

    fn check_ternary(
        &mut self,
        condition: &Expression,
        then_expr: &Expression,
        else_expr: &Expression,
        expected: Option<&Type>,
    ) -> Option<Type> {
        self.check_condition(condition);
        let then_ty = self.check_expr_with(then_expr, expected);
        let else_ty = self.check_expr_with(else_expr, expected.or(then_ty.as_ref()));
        let (then_ty, else_ty) = (then_ty?, else_ty?);

        if self.registry.is_assignable(&else_ty, &then_ty) {
            Some(then_ty)
        } else if self.registry.is_assignable(&then_ty, &else_ty) {
            Some(else_ty)
        } else {
            self.error(
                else_expr.span,
                codes::TYPE_MISMATCH,
                format!(
                    "branches of '?:' have different types '{}' and '{}'",
                    then_ty, else_ty
                ),
            );
            None
        }
    }

    /// Check arguments against parameter types
    fn check_args(&mut self, callee: &str, params: &[Type], args: &[Expression], span: Span) {
        if params.len() != args.len() {
            self.error(
                span,
                codes::ARGUMENT_COUNT,
                format!(
                    "'{}' expects {} argument(s), found {}",
                    callee,
                    params.len(),
                    args.len()
                ),
            );
            for arg in args {
                self.check_expr(arg);
            }
            return;
        }
        for (arg, param) in args.iter().zip(params) {
            self.check_assignable_expr(arg, param);
            self.escape(arg);
        }
    }

    fn check_call(&mut self, expr: &Expression, callee: &str, args: &[Expression]) -> Option<Type> {
        let not_callable = self.symbols.resolve(callee).is_some()
            || self.registry.contains(callee)
            || self.result.groups.contains(callee)
            || self.result.imports.namespace(callee).is_some();
        if not_callable {
            self.error(
                expr.span,
                codes::NOT_CALLABLE,
                format!("'{}' is not a function", callee),
            );
            for arg in args {
                self.check_expr(arg);
            }
            return None;
        }

        if callee == "print" {
            return self.check_print(expr, args);
        }

        if let Some(func) = self.functions.get(callee).copied() {
            let params: Vec<Type> = func.params.iter().map(|p| p.ty.clone()).collect();
            self.check_args(callee, &params, args, expr.span);
            self.result
                .call_targets
                .insert(expr.node_id(), CallTarget::Function(callee.to_string()));
            return Some(func.return_type.clone());
        }

        if let Some((module, member)) = self.result.imports.member(callee) {
            let (module, member) = (module.to_string(), member.to_string());
            return self.check_module_call(expr, &module, &member, args);
        }

        let suggestions = {
            let mut candidates: Vec<&str> = self.functions.keys().copied().collect();
            candidates.extend(self.result.imports.member_names());
            candidates.push("print");
            suggest(callee, candidates)
        };
        self.error_with(
            expr.span,
            codes::UNDEFINED_FUNCTION,
            format!("Cannot find function '{}'", callee),
            suggestions,
        );
        for arg in args {
            self.check_expr(arg);
        }
        None
    }

    fn check_print(&mut self, expr: &Expression, args: &[Expression]) -> Option<Type> {
        self.result
            .call_targets
            .insert(expr.node_id(), CallTarget::Print);
        let [arg] = args else {
            self.error(
                expr.span,
                codes::ARGUMENT_COUNT,
                format!("'print' expects 1 argument, found {}", args.len()),
            );
            for arg in args {
                self.check_expr(arg);
            }
            return Some(Type::void());
        };
        if let Some(ty) = self.check_expr(arg) {
            if !ty.is_scalar() {
                self.error(
                    arg.span,
                    codes::INVALID_OPERAND,
                    format!("cannot print a value of type '{}'", ty),
                );
            }
        }
        Some(Type::void())
    }

    fn check_method_call(
        &mut self,
        expr: &Expression,
        receiver: &Expression,
        method: &str,
        args: &[Expression],
    ) -> Option<Type> {
        if let ExprKind::Identifier(owner) = &receiver.kind {
            if self.symbols.resolve(owner).is_none() {
                if let Some(module) = self.result.imports.namespace(owner) {
                    let module = module.to_string();
                    return self.check_module_call(expr, &module, method, args);
                }
                if self.registry.contains(owner) && method == "clone" {
                    if !args.is_empty() {
                        self.error(
                            expr.span,
                            codes::ARGUMENT_COUNT,
                            format!("'clone' expects 0 argument(s), found {}", args.len()),
                        );
                    }
                    self.check_expr(receiver);
                    self.result
                        .call_targets
                        .insert(expr.node_id(), CallTarget::PrototypeClone(owner.clone()));
                    return Some(Type::named(owner.clone()));
                }
                if let Some(group) = self.result.groups.get(owner) {
                    let message = format!("group '{}' has no methods", owner);
                    let suggestions = suggest(method, group.member_names());
                    self.error_with(expr.span, codes::UNDEFINED_MEMBER, message, suggestions);
                    return None;
                }
            }
        }

        let Some(receiver_ty) = self.check_expr(receiver) else {
            for arg in args {
                self.check_expr(arg);
            }
            return None;
        };

        if let Type::Named(proto) = &receiver_ty {
            return self.check_proto_method(expr, proto, method, args);
        }
        if !ContainerMethod::available_on(&receiver_ty).is_empty() {
            return self.check_container_method(expr, receiver, &receiver_ty, method, args);
        }

        self.error(
            expr.span,
            codes::UNDEFINED_MEMBER,
            format!("type '{}' has no method '{}'", receiver_ty, method),
        );
        for arg in args {
            self.check_expr(arg);
        }
        None
    }

    fn check_module_call(
        &mut self,
        expr: &Expression,
        module: &str,
        member: &str,
        args: &[Expression],
    ) -> Option<Type> {
        let modules = self.modules;
        if let Some(func) = modules.function(module, member) {
            self.check_args(member, &func.params, args, expr.span);
            self.result.call_targets.insert(
                expr.node_id(),
                CallTarget::Extern {
                    module: module.to_string(),
                    func: member.to_string(),
                    ret: func.ret.clone(),
                },
            );
            return Some(func.ret.clone());
        }

        if modules.constant(module, member).is_some() {
            self.error(
                expr.span,
                codes::NOT_CALLABLE,
                format!("'{}.{}' is a constant, not a function", module, member),
            );
        } else {
            let suggestions = suggest(member, modules.member_names(module));
            self.error_with(
                expr.span,
                codes::UNDEFINED_MEMBER,
                format!("Module '{}' has no member '{}'", module, member),
                suggestions,
            );
        }
        for arg in args {
            self.check_expr(arg);
        }
        None
    }

    fn check_proto_method(
        &mut self,
        expr: &Expression,
        proto: &str,
        method: &str,
        args: &[Expression],
    ) -> Option<Type> {
        let registry = self.registry;
        let Some(info) = registry.lookup_method(proto, method) else {
            if registry.lookup_field(proto, method).is_some() {
                self.error(
                    expr.span,
                    codes::NOT_CALLABLE,
                    format!("field '{}.{}' is not a method", proto, method),
                );
            } else {
                let suggestions = suggest(method, registry.member_names(proto));
                self.error_with(
                    expr.span,
                    codes::UNDEFINED_MEMBER,
                    format!("Prototype '{}' has no member '{}'", proto, method),
                    suggestions,
                );
            }
            for arg in args {
                self.check_expr(arg);
            }
            return None;
        };

        if !registry.can_access(info.visibility, &info.declared_in, self.current_proto.as_deref()) {
            self.error(
                expr.span,
                codes::INTERNAL_ACCESS,
                format!(
                    "method '{}.{}' is internal to '{}'",
                    proto, method, info.declared_in
                ),
            );
        }
        self.check_args(method, &info.params, args, expr.span);

        let declared = registry.get(&info.declared_in);
        let builtin = declared.is_some_and(|p| p.builtin);
        let (target, ret) = if builtin && declared.is_some_and(|p| p.sealed) {
            let target = CallTarget::Extern {
                module: info.declared_in.clone(),
                func: method.to_string(),
                ret: info.ret.clone(),
            };
            (target, info.ret.clone())
        } else if builtin && method == "clone" && !registry.is_overridden_below(proto, method) {
            (CallTarget::InstanceClone(proto.to_string()), Type::named(proto))
        } else {
            let target = CallTarget::Method {
                proto: proto.to_string(),
                method: method.to_string(),
                virtual_dispatch: registry.is_overridden_below(proto, method),
            };
            (target, info.ret.clone())
        };
        self.result.call_targets.insert(expr.node_id(), target);
        Some(ret)
    }

    fn check_container_method(
        &mut self,
        expr: &Expression,
        receiver: &Expression,
        receiver_ty: &Type,
        method: &str,
        args: &[Expression],
    ) -> Option<Type> {
        let Some(sig) = container_method(receiver_ty, method) else {
            let names = ContainerMethod::available_on(receiver_ty)
                .iter()
                .map(|m| m.name());
            let suggestions = suggest(method, names);
            self.error_with(
                expr.span,
                codes::UNDEFINED_MEMBER,
                format!("type '{}' has no method '{}'", receiver_ty, method),
                suggestions,
            );
            for arg in args {
                self.check_expr(arg);
            }
            return None;
        };
        self.check_args(method, &sig.params, args, expr.span);

        if receiver_ty.generic_kind() == Some(GenericKind::List) {
            if let ExprKind::Identifier(name) = &receiver.kind {
                self.track_list_length(name, sig.method, expr.span);
            }
        }

        self.result
            .call_targets
            .insert(expr.node_id(), CallTarget::Container(sig.method));
        Some(sig.ret)
    }

    fn track_list_length(&mut self, name: &str, method: ContainerMethod, span: Span) {
        let Some(binding) = self.symbols.resolve_mut(name) else {
            return;
        };
        let known = binding.known_list_len;
        binding.known_list_len = match method {
            ContainerMethod::Push => known.map(|n| n + 1),
            ContainerMethod::Pop => known.and_then(|n| n.checked_sub(1)),
            ContainerMethod::Clear => Some(0),
            // A view or slice may be used to reach the list later
            ContainerMethod::View | ContainerMethod::Slice => None,
            _ => known,
        };
        if method == ContainerMethod::Pop && known == Some(0) {
            self.error(
                span,
                codes::STATIC_EMPTY_POP,
                format!("'{}.pop()' on a list that is statically empty", name),
            );
        }
    }

    fn check_member(&mut self, expr: &Expression, object: &Expression, member: &str) -> Option<Type> {
        if let ExprKind::Identifier(owner) = &object.kind {
            if self.symbols.resolve(owner).is_none() {
                if let Some(group) = self.result.groups.get(owner) {
                    if let Some(value) = group.member(member) {
                        let (value, ty) = (value.clone(), group.base_type.clone());
                        self.result
                            .value_targets
                            .insert(expr.node_id(), ValueTarget::Constant(value));
                        return Some(ty);
                    }
                    let suggestions = suggest(member, group.member_names());
                    self.error_with(
                        expr.span,
                        codes::UNDEFINED_MEMBER,
                        format!("Group '{}' has no member '{}'", owner, member),
                        suggestions,
                    );
                    return None;
                }
                if let Some(module) = self.result.imports.namespace(owner) {
                    let module = module.to_string();
                    return self.check_module_member(expr, &module, member);
                }
            }
        }

        let object_ty = self.check_expr(object)?;
        let Some(proto) = object_ty.as_named() else {
            self.error(
                expr.span,
                codes::UNDEFINED_MEMBER,
                format!("type '{}' has no field '{}'", object_ty, member),
            );
            return None;
        };

        let registry = self.registry;
        match registry.lookup_field(proto, member) {
            Some(field) => {
                if !registry.can_access(field.visibility, &field.declared_in, self.current_proto.as_deref()) {
                    self.error(
                        expr.span,
                        codes::INTERNAL_ACCESS,
                        format!(
                            "field '{}.{}' is internal to '{}'",
                            proto, member, field.declared_in
                        ),
                    );
                }
                self.result.value_targets.insert(
                    expr.node_id(),
                    ValueTarget::Field {
                        proto: proto.to_string(),
                        field: member.to_string(),
                    },
                );
                Some(field.ty.clone())
            }
            None if registry.lookup_method(proto, member).is_some() => {
                self.error(
                    expr.span,
                    codes::INVALID_OPERAND,
                    format!("method '{}.{}' must be called", proto, member),
                );
                None
            }
            None => {
                let suggestions = suggest(member, registry.member_names(proto));
                self.error_with(
                    expr.span,
                    codes::UNDEFINED_MEMBER,
                    format!("Prototype '{}' has no member '{}'", proto, member),
                    suggestions,
                );
                None
            }
        }
    }

    fn check_module_member(&mut self, expr: &Expression, module: &str, member: &str) -> Option<Type> {
        let modules = self.modules;
        if let Some(constant) = modules.constant(module, member) {
            return self.module_constant(expr, constant);
        }
        if modules.function(module, member).is_some() {
            self.error(
                expr.span,
                codes::INVALID_OPERAND,
                format!("function '{}.{}' must be called", module, member),
            );
        } else {
            let suggestions = suggest(member, modules.member_names(module));
            self.error_with(
                expr.span,
                codes::UNDEFINED_MEMBER,
                format!("Module '{}' has no member '{}'", module, member),
                suggestions,
            );
        }
        None
    }

    /// Element type of `object_ty[index]`
    pub(super) fn check_index_parts(
        &mut self,
        object_ty: &Type,
        index: &Expression,
        span: Span,
    ) -> Option<Type> {
        match object_ty.generic_kind() {
            Some(GenericKind::Map) => {
                let key = object_ty.key_type()?;
                self.check_assignable_expr(index, &key);
                object_ty.element_type()
            }
            Some(_) => {
                self.check_int_index(index);
                object_ty.element_type()
            }
            None if object_ty.is_string() => {
                self.check_int_index(index);
                Some(Type::glyph())
            }
            None => {
                self.check_expr(index);
                self.error(
                    span,
                    codes::INVALID_OPERAND,
                    format!("cannot index into a value of type '{}'", object_ty),
                );
                None
            }
        }
    }

    fn check_int_index(&mut self, index: &Expression) {
        if let Some(ty) = self.check_expr(index) {
            if ty != Type::int() {
                self.error(
                    index.span,
                    codes::TYPE_MISMATCH,
                    format!("index must be 'int', found '{}'", ty),
                );
            }
        }
    }

    fn check_cast(&mut self, inner: &Expression, target: &Type, span: Span) -> Option<Type> {
        let source = self.check_expr(inner)?;
        if !source.is_numeric() || !target.is_numeric() {
            self.error(
                span,
                codes::INVALID_CAST,
                format!("cannot cast '{}' to '{}'", source, target),
            );
            return None;
        }

        if !self.mentions_local(inner) {
            if let Some(value) = evaluate(inner, &self.consts) {
                if cast_constant(&value, target).is_none() {
                    self.error(
                        span,
                        codes::CAST_NOT_REPRESENTABLE,
                        format!("{} cannot be represented as '{}'", value, target),
                    );
                }
            }
        }
        Some(target.clone())
    }

    /// Some identifier inside `expr` is a local variable
    fn mentions_local(&self, expr: &Expression) -> bool {
        match &expr.kind {
            ExprKind::Identifier(name) => self.symbols.resolve(name).is_some(),
            ExprKind::Member { object, .. } => self.mentions_local(object),
            ExprKind::Unary { operand, .. } => self.mentions_local(operand),
            ExprKind::Binary { left, right, .. } => {
                self.mentions_local(left) || self.mentions_local(right)
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.mentions_local(condition)
                    || self.mentions_local(then_expr)
                    || self.mentions_local(else_expr)
            }
            ExprKind::Cast { expr, .. } => self.mentions_local(expr),
            _ => false,
        }
    }

    fn check_list_literal(&mut self, items: &[Expression], expected: Option<&Type>) -> Option<Type> {
        let expected = expected.filter(|t| t.generic_kind() == Some(GenericKind::List));
        if items.is_empty() {
            return Some(expected.cloned().unwrap_or_else(|| Type::list(Type::void())));
        }

        let mut elem = expected.and_then(Type::element_type);
        for item in items {
            let Some(ty) = self.check_expr_with(item, elem.as_ref()) else {
                continue;
            };
            match &elem {
                None => elem = Some(ty),
                Some(e) if self.registry.is_assignable(&ty, e) => {}
                Some(e) => {
                    let message = format!("list elements must share one type: expected '{}', found '{}'", e, ty);
                    self.error(item.span, codes::TYPE_MISMATCH, message);
                }
            }
            self.escape(item);
        }
        elem.map(Type::list)
    }

    fn check_map_literal(
        &mut self,
        entries: &[(Expression, Expression)],
        expected: Option<&Type>,
    ) -> Option<Type> {
        let expected = expected.filter(|t| t.generic_kind() == Some(GenericKind::Map));
        if entries.is_empty() {
            return Some(
                expected
                    .cloned()
                    .unwrap_or_else(|| Type::map(Type::void(), Type::void())),
            );
        }

        let mut key_ty = expected.and_then(Type::key_type);
        let mut value_ty = expected.and_then(Type::element_type);
        for (key, value) in entries {
            if let Some(ty) = self.check_expr_with(key, key_ty.as_ref()) {
                if !ty.is_scalar() {
                    self.error(
                        key.span,
                        codes::INVALID_OPERAND,
                        format!("map keys must be scalar, found '{}'", ty),
                    );
                }
                self.unify_entry(&mut key_ty, ty, key.span, "key");
            }
            if let Some(ty) = self.check_expr_with(value, value_ty.as_ref()) {
                self.unify_entry(&mut value_ty, ty, value.span, "value");
            }
            self.escape(value);
        }
        Some(Type::map(key_ty?, value_ty?))
    }

    fn unify_entry(&mut self, slot: &mut Option<Type>, ty: Type, span: Span, what: &str) {
        match slot {
            None => *slot = Some(ty),
            Some(existing) if self.registry.is_assignable(&ty, existing) => {}
            Some(existing) => {
                let message = format!(
                    "map {}s must share one type: expected '{}', found '{}'",
                    what, existing, ty
                );
                self.error(span, codes::TYPE_MISMATCH, message);
            }
        }
    }
}

fn is_int_literal(expr: &Expression) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Int(_)))
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::checker::modules::{ModuleInfo, ModuleValue};
    use crate::checker::{
        check_program, CallTarget, CheckResult, Diagnostic, ModuleRegistry, PrototypeRegistry,
        ValueTarget,
    };
    use crate::types::Type;

    fn analyze(program: &Program) -> (CheckResult, Vec<Diagnostic>) {
        let (registry, mut diags) = PrototypeRegistry::build(program);
        let modules = ModuleRegistry::new().with_module(
            ModuleInfo::new("math")
                .with_function("sqrt", vec![Type::float()], Type::float())
                .with_constant("PI", Type::float(), ModuleValue::Float(3.25)),
        );
        let (result, more) = check_program(program, &registry, &modules);
        diags.extend(more);
        (result, diags)
    }

    fn codes_of(program: &Program) -> Vec<&'static str> {
        analyze(program).1.iter().map(|d| d.code.code).collect()
    }

    fn main_with(body: Vec<Statement>) -> Program {
        Program::new("main.ps").with_function(FunctionDecl::new("main", vec![], Type::void(), body))
    }

    fn print(expr: Expression) -> Statement {
        Statement::expr(Expression::call("print", vec![expr]))
    }

    fn point() -> PrototypeDecl {
        PrototypeDecl::new("Point")
            .with_field(FieldDecl::new("x", Type::int(), Some(Expression::int(0))))
            .with_field(FieldDecl::new("secret", Type::int(), Some(Expression::int(0))).internal())
            .with_method(FunctionDecl::new(
                "norm",
                vec![],
                Type::int(),
                vec![Statement::ret(Expression::member(Expression::self_ref(), "secret"))],
            ))
    }

    #[test]
    fn test_undefined_name_suggests() {
        let program = main_with(vec![
            Statement::var(Type::int(), "count", Expression::int(1)),
            print(Expression::ident("cont")),
        ]);
        let (_, diags) = analyze(&program);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code.code, "E2001");
        assert_eq!(diags[0].suggestions, vec!["count".to_string()]);
    }

    #[test]
    fn test_operands_must_match() {
        let program = main_with(vec![
            Statement::var(Type::int(), "a", Expression::int(1)),
            Statement::var(
                Type::int(),
                "b",
                Expression::binary(BinaryOp::Add, Expression::ident("a"), Expression::float(1.0)),
            ),
            Statement::var(
                Type::bool(),
                "c",
                Expression::binary(BinaryOp::And, Expression::ident("a"), Expression::bool(true)),
            ),
        ]);
        assert_eq!(codes_of(&program), vec!["E3001", "E3002"]);
    }

    #[test]
    fn test_byte_literals() {
        let program = main_with(vec![
            Statement::var(Type::byte(), "b", Expression::int(200)),
            Statement::var(
                Type::byte(),
                "c",
                Expression::binary(BinaryOp::Add, Expression::ident("b"), Expression::int(1)),
            ),
            Statement::var(Type::byte(), "d", Expression::int(256)),
        ]);
        assert_eq!(codes_of(&program), vec!["E3101"]);
    }

    #[test]
    fn test_constant_casts() {
        let program = main_with(vec![
            Statement::var(Type::byte(), "a", Expression::cast(Expression::int(255), Type::byte())),
            Statement::var(Type::byte(), "b", Expression::cast(Expression::int(256), Type::byte())),
            Statement::var(Type::int(), "c", Expression::cast(Expression::float(2.5), Type::int())),
            Statement::var(Type::int(), "d", Expression::cast(Expression::string("1"), Type::int())),
        ]);
        assert_eq!(codes_of(&program), vec!["E3007", "E3007", "E3006"]);
    }

    #[test]
    fn test_non_constant_cast_is_deferred() {
        let program = main_with(vec![
            Statement::var(Type::int(), "n", Expression::int(300)),
            Statement::var(Type::byte(), "b", Expression::cast(Expression::ident("n"), Type::byte())),
        ]);
        assert!(codes_of(&program).is_empty());
    }

    #[test]
    fn test_internal_field_access() {
        let program = main_with(vec![
            Statement::var(
                Type::named("Point"),
                "p",
                Expression::method(Expression::ident("Point"), "clone", vec![]),
            ),
            print(Expression::member(Expression::ident("p"), "x")),
            print(Expression::member(Expression::ident("p"), "secret")),
        ])
        .with_prototype(point());
        assert_eq!(codes_of(&program), vec!["E3100"]);
    }

    #[test]
    fn test_call_targets() {
        let program = main_with(vec![
            Statement::var(
                Type::named("Point"),
                "p",
                Expression::method(Expression::ident("Point"), "clone", vec![]),
            ),
            Statement::var(Type::int(), "n", Expression::method(Expression::ident("p"), "norm", vec![])),
            Statement::var(Type::named("Point"), "q", Expression::method(Expression::ident("p"), "clone", vec![])),
        ])
        .with_prototype(point());
        let (result, diags) = analyze(&program);
        assert!(diags.is_empty(), "{:?}", diags);

        let Some(Decl::Function(main)) = program.decls.first() else {
            panic!("main first");
        };
        let init = |i: usize| match &main.body[i] {
            Statement::VarDecl(v) => v.init.as_ref().unwrap(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            result.call_target(init(0)),
            Some(&CallTarget::PrototypeClone("Point".into()))
        );
        assert_eq!(
            result.call_target(init(1)),
            Some(&CallTarget::Method {
                proto: "Point".into(),
                method: "norm".into(),
                virtual_dispatch: false,
            })
        );
        assert_eq!(
            result.call_target(init(2)),
            Some(&CallTarget::InstanceClone("Point".into()))
        );
    }

    #[test]
    fn test_override_makes_dispatch_virtual() {
        let program = main_with(vec![
            Statement::var(
                Type::named("Point"),
                "p",
                Expression::method(Expression::ident("Point3"), "clone", vec![]),
            ),
            Statement::var(Type::int(), "n", Expression::method(Expression::ident("p"), "norm", vec![])),
        ])
        .with_prototype(point())
        .with_prototype(PrototypeDecl::new("Point3").with_parent("Point").with_method(
            FunctionDecl::new("norm", vec![], Type::int(), vec![Statement::ret(Expression::int(3))]),
        ));
        let (result, diags) = analyze(&program);
        assert!(diags.is_empty(), "{:?}", diags);
        let virtual_calls = result
            .call_targets
            .values()
            .filter(|t| matches!(t, CallTarget::Method { virtual_dispatch: true, .. }))
            .count();
        assert_eq!(virtual_calls, 1);
    }

    #[test]
    fn test_module_members() {
        let program = main_with(vec![
            Statement::var(
                Type::float(),
                "r",
                Expression::method(Expression::ident("math"), "sqrt", vec![Expression::float(2.0)]),
            ),
            Statement::var(Type::float(), "p", Expression::member(Expression::ident("math"), "PI")),
            Statement::var(Type::float(), "q", Expression::method(Expression::ident("math"), "sqr", vec![])),
        ])
        .with_import(Import::namespace("math"));
        let (result, diags) = analyze(&program);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code.code, "E2004");
        assert_eq!(diags[0].suggestions, vec!["sqrt".to_string()]);
        assert!(result
            .value_targets
            .values()
            .any(|t| *t == ValueTarget::Constant(crate::compiler::ir::IrConstant::Float(3.25))));
    }

    #[test]
    fn test_not_callable_and_self_outside_method() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(1)),
            Statement::expr(Expression::call("x", vec![])),
            print(Expression::self_ref()),
        ]);
        assert_eq!(codes_of(&program), vec!["E3020", "E3021"]);
    }

    #[test]
    fn test_return_self_through_alias() {
        let program = Program::new("main.ps").with_prototype(
            PrototypeDecl::new("Node").with_method(FunctionDecl::new(
                "me",
                vec![],
                Type::named("Node"),
                vec![
                    Statement::var(Type::named("Node"), "n", Expression::self_ref()),
                    Statement::ret(Expression::ident("n")),
                ],
            )),
        );
        assert_eq!(codes_of(&program), vec!["E3019"]);
    }

    #[test]
    fn test_print_arity_and_argument_counts() {
        let program = main_with(vec![
            Statement::expr(Expression::call("print", vec![])),
            Statement::expr(Expression::call("add", vec![Expression::int(1)])),
        ])
        .with_function(FunctionDecl::new(
            "add",
            vec![Param::new("a", Type::int()), Param::new("b", Type::int())],
            Type::int(),
            vec![Statement::ret(Expression::binary(
                BinaryOp::Add,
                Expression::ident("a"),
                Expression::ident("b"),
            ))],
        ));
        assert_eq!(codes_of(&program), vec!["E3003", "E3003"]);
    }

    #[test]
    fn test_container_literals() {
        let program = main_with(vec![
            Statement::var(
                Type::map(Type::string(), Type::int()),
                "m",
                Expression::map(vec![(Expression::string("a"), Expression::int(1))]),
            ),
            Statement::var(Type::map(Type::string(), Type::int()), "e", Expression::map(vec![])),
            Statement::var(
                Type::list(Type::int()),
                "l",
                Expression::list(vec![Expression::int(1), Expression::string("x")]),
            ),
            print(Expression::index(Expression::ident("m"), Expression::string("a"))),
            print(Expression::index(Expression::ident("l"), Expression::string("a"))),
        ]);
        assert_eq!(codes_of(&program), vec!["E3001", "E3001"]);
    }

    #[test]
    fn test_view_is_read_only() {
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "l", Expression::list(vec![Expression::int(1)])),
            Statement::var(
                Type::view(Type::int()),
                "v",
                Expression::method(
                    Expression::ident("l"),
                    "view",
                    vec![Expression::int(0), Expression::int(1)],
                ),
            ),
            Statement::assign(
                Expression::index(Expression::ident("l"), Expression::int(0)),
                Expression::int(5),
            ),
            Statement::assign(
                Expression::index(Expression::ident("v"), Expression::int(0)),
                Expression::int(5),
            ),
        ]);
        assert_eq!(codes_of(&program), vec!["E3022"]);
    }

    #[test]
    fn test_group_members_are_constants() {
        let program = main_with(vec![
            print(Expression::member(Expression::ident("Color"), "Red")),
            print(Expression::member(Expression::ident("Color"), "Rde")),
            Statement::assign(Expression::member(Expression::ident("Color"), "Red"), Expression::int(3)),
        ])
        .with_group(GroupDecl::new("Color", Type::int()).with_member("Red", Expression::int(1)));
        let (_, diags) = analyze(&program);
        let codes: Vec<_> = diags.iter().map(|d| d.code.code).collect();
        assert_eq!(codes, vec!["E2004", "E3010"]);
        assert_eq!(diags[0].suggestions, vec!["Red".to_string()]);
    }
}
