//! Type checker
//!
//! Walks declarations and statements over lexical scopes layered on the
//! prototype registry. Expression rules live in `expr.rs`.

use super::error::{codes, Diagnostic, ErrorCode};
use super::groups::check_groups;
use super::imports::resolve_imports;
use super::modules::ModuleLookup;
use super::registry::PrototypeRegistry;
use super::suggest::suggest;
use super::symbols::{Binding, FlowSnapshot, ScopeKind, SymbolTable};
use super::{builtins, CheckResult, ValueTarget};
use crate::ast::{
    ends_in_jump, Assignment, Decl, ExprKind, Expression, ForEachStatement, ForStatement,
    FunctionDecl, IfStatement, Program, PrototypeDecl, ReturnStatement, Span, Statement,
    SwitchStatement, TryStatement, VarDecl,
};
use crate::compiler::const_eval::ConstEnv;
use crate::types::{GenericKind, Type};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Type checker
///
/// Consumed by [`TypeChecker::check_program`], which returns the side
/// tables together with every diagnostic found.
pub struct TypeChecker<'a> {
    pub(super) program: &'a Program,
    pub(super) registry: &'a PrototypeRegistry,
    pub(super) modules: &'a dyn ModuleLookup,

    /// Top-level functions by name (first declaration wins)
    pub(super) functions: FxHashMap<&'a str, &'a FunctionDecl>,

    /// Constants visible to compile-time evaluation (groups, module constants)
    pub(super) consts: ConstEnv,

    pub(super) symbols: SymbolTable,

    /// Prototype whose method is being checked
    pub(super) current_proto: Option<String>,

    /// Declared return type of the body being checked
    pub(super) return_type: Type,

    pub(super) result: CheckResult,
    pub(super) diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        program: &'a Program,
        registry: &'a PrototypeRegistry,
        modules: &'a dyn ModuleLookup,
    ) -> Self {
        TypeChecker {
            program,
            registry,
            modules,
            functions: FxHashMap::default(),
            consts: ConstEnv::default(),
            symbols: SymbolTable::new(),
            current_proto: None,
            return_type: Type::void(),
            result: CheckResult::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Check every declaration of the program
    pub fn check_program(mut self) -> (CheckResult, Vec<Diagnostic>) {
        let program = self.program;

        let (imports, diags) = resolve_imports(&program.file, &program.imports, self.modules);
        self.diagnostics.extend(diags);
        self.consts = imports.constants(self.modules);
        self.result.imports = imports;

        let (groups, diags) = check_groups(program, &mut self.consts);
        self.diagnostics.extend(diags);
        self.result.groups = groups;

        self.collect_functions();

        for decl in &program.decls {
            match decl {
                Decl::Function(func) => self.check_function(func, None),
                Decl::Prototype(proto) => self.check_prototype(proto),
                Decl::Group(_) => {}
            }
        }

        debug!(
            file = %program.file,
            diagnostics = self.diagnostics.len(),
            typed_exprs = self.result.expr_types.len(),
            "analysis done"
        );
        (self.result, self.diagnostics)
    }

    pub(super) fn error(&mut self, span: Span, code: ErrorCode, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(&self.program.file, span, code, message));
    }

    pub(super) fn error_with(
        &mut self,
        span: Span,
        code: ErrorCode,
        message: impl Into<String>,
        suggestions: Vec<String>,
    ) {
        self.diagnostics.push(
            Diagnostic::new(&self.program.file, span, code, message).with_suggestions(suggestions),
        );
    }

    fn collect_functions(&mut self) {
        let program = self.program;

        for group in program.groups() {
            if self.registry.contains(&group.name) {
                self.error(
                    group.span,
                    codes::DUPLICATE_DECLARATION,
                    format!("group '{}' conflicts with a prototype of the same name", group.name),
                );
            }
        }

        for func in program.functions() {
            let name = func.name.as_str();
            if self.functions.contains_key(name) {
                self.error(
                    func.span,
                    codes::DUPLICATE_DECLARATION,
                    format!("function '{}' is declared more than once", name),
                );
                continue;
            }
            if builtins::is_builtin_function(name)
                || self.registry.contains(name)
                || self.result.groups.contains(name)
            {
                self.error(
                    func.span,
                    codes::DUPLICATE_DECLARATION,
                    format!("function '{}' conflicts with an existing name", name),
                );
            }
            self.functions.insert(name, func);
        }
    }

    /// Check that every prototype named in `ty` exists
    pub(super) fn check_type(&mut self, ty: &Type, span: Span) -> bool {
        match ty {
            Type::Primitive(_) => true,
            Type::Named(name) => {
                if self.registry.contains(name) {
                    return true;
                }
                let suggestions = suggest(name, self.registry.names());
                self.error_with(
                    span,
                    codes::UNDEFINED_PROTOTYPE,
                    format!("Cannot find prototype '{}'", name),
                    suggestions,
                );
                false
            }
            Type::Generic { args, .. } => args.iter().all(|arg| self.check_type(arg, span)),
        }
    }

    fn check_prototype(&mut self, decl: &PrototypeDecl) {
        // Rejected declarations (duplicates, built-in names) are not checked again
        let registered = self
            .registry
            .get(&decl.name)
            .is_some_and(|p| !p.builtin && p.span == decl.span);
        if !registered {
            return;
        }

        for field in &decl.fields {
            let ty_ok = self.check_type(&field.ty, field.span);
            if field.is_const && field.init.is_none() {
                self.error(
                    field.span,
                    codes::CONST_WITHOUT_INIT,
                    format!("constant field '{}.{}' needs an initializer", decl.name, field.name),
                );
            }
            if let Some(init) = &field.init {
                // Initializers run outside any method: no locals, no `self`
                self.current_proto = None;
                self.symbols = SymbolTable::new();
                self.symbols.push_scope(ScopeKind::Function);
                if ty_ok {
                    self.check_assignable_expr(init, &field.ty);
                } else {
                    self.check_expr(init);
                }
                self.symbols.pop_scope();
            }
        }

        for method in &decl.methods {
            self.check_function(&method.func, Some(&decl.name));
        }
    }

    fn check_function(&mut self, func: &FunctionDecl, proto: Option<&str>) {
        self.current_proto = proto.map(str::to_string);
        self.return_type = func.return_type.clone();
        self.check_type(&func.return_type, func.span);

        self.symbols = SymbolTable::new();
        self.symbols.push_scope(ScopeKind::Function);
        for param in &func.params {
            self.check_type(&param.ty, param.span);
            if let Err(previous) = self
                .symbols
                .define(&param.name, Binding::new(param.ty.clone(), param.span))
            {
                self.error(
                    param.span,
                    codes::DUPLICATE_DECLARATION,
                    format!(
                        "parameter '{}' is already declared (line {})",
                        param.name, previous.line
                    ),
                );
            }
        }

        self.check_stmts(&func.body);

        if !func.return_type.is_void() && !always_returns(&func.body) {
            self.error(
                func.span,
                codes::MISSING_RETURN_VALUE,
                format!(
                    "function '{}' must return a value of type '{}' on every path",
                    func.name, func.return_type
                ),
            );
        }

        self.symbols.pop_scope();
        debug!(function = %func.name, proto = ?proto, "function checked");
    }

    fn check_stmts(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_scoped(&mut self, stmts: &[Statement], kind: ScopeKind) {
        self.symbols.push_scope(kind);
        self.check_stmts(stmts);
        self.symbols.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VarDecl(decl) => self.check_var_decl(decl),
            Statement::Assign(assign) => self.check_assignment(assign),
            Statement::Expression(expr_stmt) => {
                self.check_expr(&expr_stmt.expr);
            }
            Statement::If(if_stmt) => self.check_if(if_stmt),
            Statement::While(while_stmt) => {
                self.symbols.forget_list_lengths();
                self.check_condition(&while_stmt.condition);
                self.check_loop_body(&while_stmt.body);
            }
            Statement::DoWhile(do_while) => {
                // The body runs at least once, so its initializations stand
                self.symbols.forget_list_lengths();
                self.check_scoped(&do_while.body, ScopeKind::Loop);
                self.check_condition(&do_while.condition);
                self.symbols.forget_list_lengths();
            }
            Statement::For(for_stmt) => self.check_for(for_stmt),
            Statement::ForOf(each) => self.check_for_each(each, false),
            Statement::ForIn(each) => self.check_for_each(each, true),
            Statement::Switch(switch) => self.check_switch(switch),
            Statement::Break(span) => {
                if !self.symbols.can_break() {
                    self.error(*span, codes::BREAK_OUTSIDE_LOOP, "'break' outside of a loop or switch");
                }
            }
            Statement::Continue(span) => {
                if !self.symbols.in_loop() {
                    self.error(*span, codes::CONTINUE_OUTSIDE_LOOP, "'continue' outside of a loop");
                }
            }
            Statement::Return(ret) => self.check_return(ret),
            Statement::Throw(throw) => {
                if let Some(ty) = self.check_expr(&throw.value) {
                    let is_exception = ty.as_named().is_some_and(|n| self.registry.is_exception(n));
                    if !is_exception {
                        self.error(
                            throw.span,
                            codes::THROW_NON_EXCEPTION,
                            format!("cannot throw a value of type '{}'; expected an Exception", ty),
                        );
                    }
                }
            }
            Statement::Try(try_stmt) => self.check_try(try_stmt),
            Statement::Block(block) => self.check_scoped(&block.body, ScopeKind::Block),
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) {
        let mut ty_ok = self.check_type(&decl.ty, decl.span);
        if decl.ty.contains_void() {
            self.error(
                decl.span,
                codes::TYPE_MISMATCH,
                format!("variable '{}' cannot have type '{}'", decl.name, decl.ty),
            );
            ty_ok = false;
        }
        if decl.is_const && decl.init.is_none() {
            self.error(
                decl.span,
                codes::CONST_WITHOUT_INIT,
                format!("constant '{}' needs an initializer", decl.name),
            );
        }

        let mut binding = Binding::new(decl.ty.clone(), decl.span);
        binding.is_const = decl.is_const;
        binding.initialized = decl.init.is_some();

        if let Some(init) = &decl.init {
            if ty_ok {
                self.check_assignable_expr(init, &decl.ty);
            } else {
                self.check_expr(init);
            }
            binding.known_list_len = list_literal_len(init);
            binding.alias_self = self.aliases_self(init);
            self.escape(init);
        }

        if let Err(previous) = self.symbols.define(&decl.name, binding) {
            self.error(
                decl.span,
                codes::DUPLICATE_DECLARATION,
                format!(
                    "'{}' is already declared in this scope (line {})",
                    decl.name, previous.line
                ),
            );
        }
    }

    fn check_assignment(&mut self, assign: &Assignment) {
        match &assign.target.kind {
            ExprKind::Identifier(name) => self.assign_to_name(name, assign),
            ExprKind::Member { object, member } => {
                if let ExprKind::Identifier(owner) = &object.kind {
                    if self.symbols.resolve(owner).is_none() {
                        if self.result.groups.contains(owner) {
                            self.error(
                                assign.span,
                                codes::GROUP_MEMBER_ASSIGN,
                                format!("cannot assign to group member '{}.{}'", owner, member),
                            );
                            self.check_expr(&assign.value);
                            return;
                        }
                        if self.result.imports.namespace(owner).is_some() {
                            self.error(
                                assign.span,
                                codes::CONST_REASSIGN,
                                format!("cannot assign to module member '{}.{}'", owner, member),
                            );
                            self.check_expr(&assign.value);
                            return;
                        }
                    }
                }

                let Some(field_ty) = self.check_expr(&assign.target) else {
                    self.check_expr(&assign.value);
                    return;
                };
                if let Some(ValueTarget::Field { proto, field }) =
                    self.result.value_target(&assign.target).cloned()
                {
                    let is_const = self
                        .registry
                        .lookup_field(&proto, &field)
                        .is_some_and(|f| f.is_const);
                    if is_const {
                        self.error(
                            assign.span,
                            codes::CONST_REASSIGN,
                            format!("cannot assign to constant field '{}.{}'", proto, field),
                        );
                    }
                }
                self.check_assigned_value(assign, &field_ty);
            }
            ExprKind::Index { object, index } => {
                let Some(object_ty) = self.check_expr(object) else {
                    self.check_expr(index);
                    self.check_expr(&assign.value);
                    return;
                };
                let read_only = object_ty.is_string()
                    || object_ty.generic_kind() == Some(GenericKind::View);
                if read_only {
                    self.error(
                        assign.span,
                        codes::READ_ONLY_TARGET,
                        format!("cannot write into a value of type '{}'", object_ty),
                    );
                    self.check_expr(index);
                    self.check_expr(&assign.value);
                    return;
                }
                match self.check_index_parts(&object_ty, index, assign.target.span) {
                    Some(elem) => {
                        self.result
                            .expr_types
                            .insert(assign.target.node_id(), elem.clone());
                        self.check_assigned_value(assign, &elem);
                    }
                    None => {
                        self.check_expr(&assign.value);
                    }
                }
            }
            _ => {
                self.error(
                    assign.span,
                    codes::READ_ONLY_TARGET,
                    "left-hand side of an assignment must be a variable, field, or element",
                );
                self.check_expr(&assign.value);
            }
        }
        self.escape(&assign.value);
    }

    fn assign_to_name(&mut self, name: &str, assign: &Assignment) {
        let Some(binding) = self.symbols.resolve(name).cloned() else {
            let message = if self.result.groups.contains(name) {
                Some((codes::GROUP_MEMBER_ASSIGN, format!("cannot assign to group '{}'", name)))
            } else if self.result.imports.member(name).is_some() {
                Some((codes::CONST_REASSIGN, format!("cannot assign to imported '{}'", name)))
            } else if self.registry.contains(name)
                || self.functions.contains_key(name)
                || self.result.imports.namespace(name).is_some()
            {
                Some((codes::READ_ONLY_TARGET, format!("cannot assign to '{}'", name)))
            } else {
                None
            };
            match message {
                Some((code, message)) => self.error(assign.span, code, message),
                None => self.undefined_name(name, assign.target.span),
            }
            self.check_expr(&assign.value);
            return;
        };

        if binding.is_const {
            self.error(
                assign.span,
                codes::CONST_REASSIGN,
                format!("cannot assign to constant '{}'", name),
            );
        }
        if assign.op.is_some() && !binding.initialized {
            self.error(
                assign.target.span,
                codes::UNINITIALIZED_USE,
                format!("'{}' is used before being initialized", name),
            );
        }
        self.result
            .expr_types
            .insert(assign.target.node_id(), binding.ty.clone());
        self.check_assigned_value(assign, &binding.ty);

        let known_len = match assign.op {
            None => list_literal_len(&assign.value),
            Some(_) => None,
        };
        let alias_self = self.aliases_self(&assign.value);
        if let Some(b) = self.symbols.resolve_mut(name) {
            b.initialized = true;
            b.known_list_len = known_len;
            b.alias_self = alias_self;
        }
    }

    /// Check the right-hand side against the target type, through the
    /// compound operator when there is one
    fn check_assigned_value(&mut self, assign: &Assignment, target_ty: &Type) {
        match assign.op {
            None => self.check_assignable_expr(&assign.value, target_ty),
            Some(op) => {
                let Some(value_ty) = self.check_expr_with(&assign.value, Some(target_ty)) else {
                    return;
                };
                if let Some(result) = self.binary_result(op, target_ty, &value_ty, assign.span) {
                    if result != *target_ty {
                        self.error(
                            assign.span,
                            codes::TYPE_MISMATCH,
                            format!(
                                "'{}=' produces '{}', which cannot be stored in '{}'",
                                op, result, target_ty
                            ),
                        );
                    }
                }
            }
        }
    }

    fn check_if(&mut self, if_stmt: &IfStatement) {
        self.check_condition(&if_stmt.condition);
        let before = self.symbols.snapshot();

        self.check_scoped(&if_stmt.then_branch, ScopeKind::Block);
        let after_then = self.symbols.snapshot();
        let then_jumps = ends_in_jump(&if_stmt.then_branch);
        self.symbols.restore(&before);

        let (after_else, else_jumps) = match &if_stmt.else_branch {
            Some(else_branch) => {
                self.check_scoped(else_branch, ScopeKind::Block);
                (self.symbols.snapshot(), ends_in_jump(else_branch))
            }
            None => (before, false),
        };

        // A branch that jumps away contributes nothing to the code after the if
        let merged = match (then_jumps, else_jumps) {
            (true, false) => after_else,
            (false, true) => after_then,
            _ => after_then.join(&after_else),
        };
        self.symbols.restore(&merged);
    }

    /// Loop bodies may run zero or many times: lengths are unknown inside
    /// and after, initializations inside do not count after
    fn check_loop_body(&mut self, body: &[Statement]) {
        let before = self.symbols.snapshot();
        self.symbols.forget_list_lengths();
        self.check_scoped(body, ScopeKind::Loop);
        self.symbols.restore(&before);
        self.symbols.forget_list_lengths();
    }

    fn check_for(&mut self, for_stmt: &ForStatement) {
        self.symbols.push_scope(ScopeKind::Block);
        if let Some(init) = &for_stmt.init {
            self.check_stmt(init);
        }
        let before = self.symbols.snapshot();
        self.symbols.forget_list_lengths();
        if let Some(condition) = &for_stmt.condition {
            self.check_condition(condition);
        }
        self.symbols.push_scope(ScopeKind::Loop);
        self.check_stmts(&for_stmt.body);
        if let Some(update) = &for_stmt.update {
            self.check_stmt(update);
        }
        self.symbols.pop_scope();
        self.symbols.restore(&before);
        self.symbols.forget_list_lengths();
        self.symbols.pop_scope();
    }

    fn check_for_each(&mut self, each: &ForEachStatement, keys: bool) {
        let elem = self.check_expr(&each.iterable).and_then(|ty| {
            let elem = iteration_type(&ty, keys);
            if elem.is_none() {
                self.error(
                    each.iterable.span,
                    codes::INVALID_OPERAND,
                    format!("cannot iterate over a value of type '{}'", ty),
                );
            }
            elem
        });

        let var_ty = match (&each.var_type, elem) {
            (Some(declared), Some(elem)) => {
                if self.check_type(declared, each.span) && *declared != elem {
                    self.error(
                        each.span,
                        codes::TYPE_MISMATCH,
                        format!(
                            "loop variable '{}' is declared '{}' but the loop yields '{}'",
                            each.var_name, declared, elem
                        ),
                    );
                }
                declared.clone()
            }
            (Some(declared), None) => declared.clone(),
            (None, Some(elem)) => elem,
            (None, None) => Type::void(),
        };

        let before = self.symbols.snapshot();
        self.symbols.forget_list_lengths();
        self.symbols.push_scope(ScopeKind::Loop);
        let _ = self
            .symbols
            .define(&each.var_name, Binding::new(var_ty, each.span));
        self.check_stmts(&each.body);
        self.symbols.pop_scope();
        self.symbols.restore(&before);
        self.symbols.forget_list_lengths();
    }

    fn check_switch(&mut self, switch: &SwitchStatement) {
        let discriminant = self.check_expr(&switch.discriminant);
        if let Some(ty) = &discriminant {
            if !ty.is_scalar() {
                self.error(
                    switch.discriminant.span,
                    codes::INVALID_OPERAND,
                    format!("cannot switch on a value of type '{}'", ty),
                );
            }
        }

        let before = self.symbols.snapshot();
        let mut merged: Option<FlowSnapshot> = None;
        let mut has_default = false;

        for case in &switch.cases {
            match (&case.test, &discriminant) {
                (Some(test), Some(ty)) => self.check_assignable_expr(test, ty),
                (Some(test), None) => {
                    self.check_expr(test);
                }
                (None, _) => has_default = true,
            }

            self.symbols.restore(&before);
            self.check_scoped(&case.body, ScopeKind::Switch);
            if !case.fallthrough && !ends_in_jump(&case.body) {
                self.error(
                    case.span,
                    codes::SWITCH_FALLTHROUGH,
                    "switch arm must end in 'break', 'return', or 'throw'",
                );
            }
            let after = self.symbols.snapshot();
            merged = Some(match merged {
                Some(m) => m.join(&after),
                None => after,
            });
        }

        let merged = match merged {
            Some(m) if has_default => m,
            Some(m) => m.join(&before),
            None => before,
        };
        self.symbols.restore(&merged);
    }

    fn check_return(&mut self, ret: &ReturnStatement) {
        let return_type = self.return_type.clone();
        match &ret.value {
            Some(value) => {
                if self.current_proto.is_some() && self.aliases_self(value) {
                    self.error(
                        ret.span,
                        codes::RETURN_SELF,
                        "a method cannot return 'self'; return a clone instead",
                    );
                }
                if return_type.is_void() {
                    self.check_expr(value);
                    self.error(
                        ret.span,
                        codes::RETURN_TYPE_MISMATCH,
                        "a void function cannot return a value",
                    );
                } else if let Some(actual) = self.check_expr_with(value, Some(&return_type)) {
                    if !self.registry.is_assignable(&actual, &return_type) {
                        self.error(
                            value.span,
                            codes::RETURN_TYPE_MISMATCH,
                            format!("expected to return '{}', found '{}'", return_type, actual),
                        );
                    }
                }
                self.escape(value);
            }
            None => {
                if !return_type.is_void() {
                    self.error(
                        ret.span,
                        codes::MISSING_RETURN_VALUE,
                        format!("missing return value of type '{}'", return_type),
                    );
                }
            }
        }
    }

    fn check_try(&mut self, try_stmt: &TryStatement) {
        let before = self.symbols.snapshot();
        self.check_scoped(&try_stmt.body, ScopeKind::Block);
        let mut merged = self.symbols.snapshot();

        for catch in &try_stmt.catches {
            self.symbols.restore(&before);
            if !self.registry.contains(&catch.proto) {
                let suggestions = suggest(&catch.proto, self.registry.names());
                self.error_with(
                    catch.span,
                    codes::UNDEFINED_PROTOTYPE,
                    format!("Cannot find prototype '{}'", catch.proto),
                    suggestions,
                );
            } else if !self.registry.is_exception(&catch.proto) {
                self.error(
                    catch.span,
                    codes::INVALID_CATCH_TYPE,
                    format!("'{}' is not an Exception and cannot be caught", catch.proto),
                );
            }

            self.symbols.push_scope(ScopeKind::Block);
            let _ = self.symbols.define(
                &catch.binding,
                Binding::new(Type::named(catch.proto.clone()), catch.span),
            );
            self.check_stmts(&catch.body);
            self.symbols.pop_scope();
            merged = merged.join(&self.symbols.snapshot());
        }

        self.symbols.restore(&merged);
    }

    pub(super) fn check_condition(&mut self, condition: &Expression) {
        if let Some(ty) = self.check_expr(condition) {
            if !ty.is_bool() {
                self.error(
                    condition.span,
                    codes::CONDITION_NOT_BOOL,
                    format!("condition must be 'bool', found '{}'", ty),
                );
            }
        }
    }

    /// `self`, or a local holding it
    pub(super) fn aliases_self(&self, expr: &Expression) -> bool {
        match &expr.kind {
            ExprKind::SelfRef => true,
            ExprKind::Identifier(name) => self.symbols.resolve(name).is_some_and(|b| b.alias_self),
            _ => false,
        }
    }

    /// A list local used as a value may be mutated through another name
    pub(super) fn escape(&mut self, expr: &Expression) {
        if let ExprKind::Identifier(name) = &expr.kind {
            if let Some(binding) = self.symbols.resolve_mut(name) {
                binding.known_list_len = None;
            }
        }
    }
}

fn list_literal_len(expr: &Expression) -> Option<usize> {
    match &expr.kind {
        ExprKind::ListLiteral(items) => Some(items.len()),
        _ => None,
    }
}

/// What `for-of` (values) or `for-in` (keys) yields over `ty`
pub(super) fn iteration_type(ty: &Type, keys: bool) -> Option<Type> {
    let iterable = ty.is_string() || ty.generic_kind().is_some();
    if !iterable {
        return None;
    }
    if keys {
        ty.key_type()
    } else {
        ty.element_type()
    }
}

/// Every path through `body` ends in `return` or `throw`
fn always_returns(body: &[Statement]) -> bool {
    match body.last() {
        Some(Statement::Return(_)) | Some(Statement::Throw(_)) => true,
        Some(Statement::Block(block)) => always_returns(&block.body),
        Some(Statement::If(if_stmt)) => match &if_stmt.else_branch {
            Some(else_branch) => always_returns(&if_stmt.then_branch) && always_returns(else_branch),
            None => false,
        },
        Some(Statement::Try(try_stmt)) => {
            always_returns(&try_stmt.body)
                && try_stmt.catches.iter().all(|c| always_returns(&c.body))
        }
        Some(Statement::Switch(switch)) => {
            switch.cases.iter().any(|c| c.test.is_none())
                && switch
                    .cases
                    .iter()
                    .all(|c| c.fallthrough || always_returns(&c.body))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, SwitchCase};
    use crate::checker::ModuleRegistry;

    fn check(program: &Program) -> Vec<Diagnostic> {
        let (registry, mut diags) = PrototypeRegistry::build(program);
        let modules = ModuleRegistry::new();
        let (_, more) = TypeChecker::new(program, &registry, &modules).check_program();
        diags.extend(more);
        diags
    }

    fn main_with(body: Vec<Statement>) -> Program {
        Program::new("main.ps").with_function(FunctionDecl::new("main", vec![], Type::void(), body))
    }

    fn codes_of(diags: &[Diagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.code.code).collect()
    }

    #[test]
    fn test_static_empty_pop() {
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "b", Expression::list(vec![])),
            Statement::expr(Expression::method(Expression::ident("b"), "pop", vec![])),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3005"]);
    }

    #[test]
    fn test_pop_after_literal_is_fine() {
        let program = main_with(vec![
            Statement::var(
                Type::list(Type::int()),
                "b",
                Expression::list(vec![Expression::int(1), Expression::int(2), Expression::int(3)]),
            ),
            Statement::expr(Expression::method(Expression::ident("b"), "pop", vec![])),
        ]);
        assert!(check(&program).is_empty());
    }

    #[test]
    fn test_loop_forgets_lengths() {
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "b", Expression::list(vec![])),
            Statement::while_(
                Expression::bool(true),
                vec![
                    Statement::expr(Expression::method(Expression::ident("b"), "pop", vec![])),
                    Statement::break_(),
                ],
            ),
        ]);
        assert!(check(&program).is_empty());
    }

    #[test]
    fn test_branch_join_keeps_agreeing_lengths() {
        let push = |v| Statement::expr(Expression::method(Expression::ident("b"), "push", vec![Expression::int(v)]));
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "b", Expression::list(vec![])),
            Statement::if_(Expression::bool(true), vec![push(1)], Some(vec![push(2)])),
            Statement::expr(Expression::method(Expression::ident("b"), "pop", vec![])),
            Statement::expr(Expression::method(Expression::ident("b"), "pop", vec![])),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3005"]);
    }

    #[test]
    fn test_condition_must_be_bool() {
        let program = main_with(vec![Statement::if_(Expression::int(1), vec![], None)]);
        assert_eq!(codes_of(&check(&program)), vec!["E3004"]);
    }

    #[test]
    fn test_break_and_continue_outside_loop() {
        let program = main_with(vec![Statement::break_(), Statement::continue_()]);
        assert_eq!(codes_of(&check(&program)), vec!["E3013", "E3014"]);
    }

    #[test]
    fn test_switch_arm_must_jump() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(1)),
            Statement::switch(
                Expression::ident("x"),
                vec![
                    SwitchCase::case(Expression::int(1), vec![Statement::break_()]),
                    SwitchCase::case(Expression::int(2), vec![]).falls_through(),
                    SwitchCase::case(
                        Expression::int(3),
                        vec![Statement::expr(Expression::call("print", vec![Expression::ident("x")]))],
                    ),
                    SwitchCase::default_arm(vec![Statement::break_()]),
                ],
            ),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3015"]);
    }

    #[test]
    fn test_const_rules() {
        let program = main_with(vec![
            Statement::constant(Type::int(), "k", Expression::int(1)),
            Statement::assign(Expression::ident("k"), Expression::int(2)),
            Statement::VarDecl(VarDecl {
                name: "c".into(),
                ty: Type::int(),
                is_const: true,
                init: None,
                span: Span::default(),
            }),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3008", "E3009"]);
    }

    #[test]
    fn test_uninitialized_use_and_branch_initialization() {
        let program = main_with(vec![
            Statement::var_uninit(Type::int(), "x"),
            Statement::if_(
                Expression::bool(true),
                vec![Statement::assign(Expression::ident("x"), Expression::int(1))],
                Some(vec![Statement::assign(Expression::ident("x"), Expression::int(2))]),
            ),
            Statement::expr(Expression::call("print", vec![Expression::ident("x")])),
            Statement::var_uninit(Type::int(), "y"),
            Statement::if_(
                Expression::bool(true),
                vec![Statement::assign(Expression::ident("y"), Expression::int(1))],
                None,
            ),
            Statement::expr(Expression::call("print", vec![Expression::ident("y")])),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3018"]);
    }

    #[test]
    fn test_missing_return_paths() {
        let program = Program::new("main.ps")
            .with_function(FunctionDecl::new(
                "f",
                vec![],
                Type::int(),
                vec![Statement::if_(Expression::bool(true), vec![Statement::ret(Expression::int(1))], None)],
            ))
            .with_function(FunctionDecl::new(
                "g",
                vec![],
                Type::int(),
                vec![Statement::ret_void()],
            ));
        assert_eq!(codes_of(&check(&program)), vec!["E3012", "E3012"]);
    }

    #[test]
    fn test_duplicate_local() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(1)),
            Statement::var(Type::int(), "x", Expression::int(2)),
            Statement::block(vec![Statement::var(Type::int(), "x", Expression::int(3))]),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E2005"]);
    }

    #[test]
    fn test_compound_assignment_types() {
        let program = main_with(vec![
            Statement::var(Type::string(), "s", Expression::string("a")),
            Statement::compound(Expression::ident("s"), BinaryOp::Add, Expression::string("b")),
            Statement::compound(Expression::ident("s"), BinaryOp::Sub, Expression::string("b")),
        ]);
        assert_eq!(codes_of(&check(&program)), vec!["E3002"]);
    }
}
