//! Convenience constructors for building trees programmatically
//!
//! Every constructor uses `Span::default()`; chain `.at(line, col)` on an
//! expression when location matters. Statements built from an expression
//! take their span from it.

use super::*;
use crate::types::Type;

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    /// Same node at a different location
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::at(line, column);
        self
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn glyph(value: char) -> Self {
        Self::new(ExprKind::Literal(Literal::Glyph(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(Literal::String(value.into())))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Identifier(name.into()))
    }

    pub fn self_ref() -> Self {
        Self::new(ExprKind::SelfRef)
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn ternary(condition: Expression, then_expr: Expression, else_expr: Expression) -> Self {
        Self::new(ExprKind::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Call {
            callee: callee.into(),
            args,
        })
    }

    pub fn method(receiver: Expression, method: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        })
    }

    pub fn member(object: Expression, member: impl Into<String>) -> Self {
        Self::new(ExprKind::Member {
            object: Box::new(object),
            member: member.into(),
        })
    }

    pub fn index(object: Expression, index: Expression) -> Self {
        Self::new(ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    pub fn cast(expr: Expression, target: Type) -> Self {
        Self::new(ExprKind::Cast {
            expr: Box::new(expr),
            target,
        })
    }

    pub fn list(items: Vec<Expression>) -> Self {
        Self::new(ExprKind::ListLiteral(items))
    }

    pub fn map(entries: Vec<(Expression, Expression)>) -> Self {
        Self::new(ExprKind::MapLiteral(entries))
    }
}

impl Statement {
    /// `T name = init;`
    pub fn var(ty: Type, name: impl Into<String>, init: Expression) -> Self {
        Statement::VarDecl(VarDecl {
            name: name.into(),
            ty,
            is_const: false,
            init: Some(init),
            span: Span::default(),
        })
    }

    /// `T name;`
    pub fn var_uninit(ty: Type, name: impl Into<String>) -> Self {
        Statement::VarDecl(VarDecl {
            name: name.into(),
            ty,
            is_const: false,
            init: None,
            span: Span::default(),
        })
    }

    /// `const T name = init;`
    pub fn constant(ty: Type, name: impl Into<String>, init: Expression) -> Self {
        Statement::VarDecl(VarDecl {
            name: name.into(),
            ty,
            is_const: true,
            init: Some(init),
            span: Span::default(),
        })
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        let span = target.span;
        Statement::Assign(Assignment {
            target,
            op: None,
            value,
            span,
        })
    }

    /// `target op= value;`
    pub fn compound(target: Expression, op: BinaryOp, value: Expression) -> Self {
        let span = target.span;
        Statement::Assign(Assignment {
            target,
            op: Some(op),
            value,
            span,
        })
    }

    pub fn expr(expr: Expression) -> Self {
        let span = expr.span;
        Statement::Expression(ExpressionStatement { expr, span })
    }

    pub fn if_(
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    ) -> Self {
        let span = condition.span;
        Statement::If(IfStatement {
            condition,
            then_branch,
            else_branch,
            span,
        })
    }

    pub fn while_(condition: Expression, body: Vec<Statement>) -> Self {
        let span = condition.span;
        Statement::While(WhileStatement {
            condition,
            body,
            span,
        })
    }

    pub fn do_while(body: Vec<Statement>, condition: Expression) -> Self {
        let span = condition.span;
        Statement::DoWhile(DoWhileStatement {
            body,
            condition,
            span,
        })
    }

    pub fn for_(
        init: Option<Statement>,
        condition: Option<Expression>,
        update: Option<Statement>,
        body: Vec<Statement>,
    ) -> Self {
        Statement::For(ForStatement {
            init: init.map(Box::new),
            condition,
            update: update.map(Box::new),
            body,
            span: Span::default(),
        })
    }

    /// `for (T name of iterable)`
    pub fn for_of(
        var_type: Option<Type>,
        var_name: impl Into<String>,
        iterable: Expression,
        body: Vec<Statement>,
    ) -> Self {
        let span = iterable.span;
        Statement::ForOf(ForEachStatement {
            var_name: var_name.into(),
            var_type,
            iterable,
            body,
            span,
        })
    }

    /// `for (T name in iterable)`
    pub fn for_in(
        var_type: Option<Type>,
        var_name: impl Into<String>,
        iterable: Expression,
        body: Vec<Statement>,
    ) -> Self {
        let span = iterable.span;
        Statement::ForIn(ForEachStatement {
            var_name: var_name.into(),
            var_type,
            iterable,
            body,
            span,
        })
    }

    pub fn switch(discriminant: Expression, cases: Vec<SwitchCase>) -> Self {
        let span = discriminant.span;
        Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span,
        })
    }

    pub fn break_() -> Self {
        Statement::Break(Span::default())
    }

    pub fn continue_() -> Self {
        Statement::Continue(Span::default())
    }

    pub fn ret(value: Expression) -> Self {
        let span = value.span;
        Statement::Return(ReturnStatement {
            value: Some(value),
            span,
        })
    }

    pub fn ret_void() -> Self {
        Statement::Return(ReturnStatement {
            value: None,
            span: Span::default(),
        })
    }

    pub fn throw(value: Expression) -> Self {
        let span = value.span;
        Statement::Throw(ThrowStatement { value, span })
    }

    pub fn try_(body: Vec<Statement>, catches: Vec<CatchClause>) -> Self {
        Statement::Try(TryStatement {
            body,
            catches,
            span: Span::default(),
        })
    }

    pub fn block(body: Vec<Statement>) -> Self {
        Statement::Block(BlockStatement {
            body,
            span: Span::default(),
        })
    }
}

impl SwitchCase {
    /// `case test: body` (no fallthrough)
    pub fn case(test: Expression, body: Vec<Statement>) -> Self {
        let span = test.span;
        Self {
            test: Some(test),
            body,
            fallthrough: false,
            span,
        }
    }

    pub fn default_arm(body: Vec<Statement>) -> Self {
        Self {
            test: None,
            body,
            fallthrough: false,
            span: Span::default(),
        }
    }

    /// Mark the arm as falling through into the next one
    pub fn falls_through(mut self) -> Self {
        self.fallthrough = true;
        self
    }
}

impl CatchClause {
    pub fn new(proto: impl Into<String>, binding: impl Into<String>, body: Vec<Statement>) -> Self {
        Self {
            proto: proto.into(),
            binding: binding.into(),
            body,
            span: Span::default(),
        }
    }
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            span: Span::default(),
        }
    }
}

impl FunctionDecl {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Type,
        body: Vec<Statement>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            body,
            span: Span::default(),
        }
    }
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: Type, init: Option<Expression>) -> Self {
        Self {
            name: name.into(),
            ty,
            is_const: false,
            init,
            visibility: Visibility::Public,
            span: Span::default(),
        }
    }

    pub fn internal(mut self) -> Self {
        self.visibility = Visibility::Internal;
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }
}

impl PrototypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            sealed: false,
            fields: Vec::new(),
            methods: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, func: FunctionDecl) -> Self {
        self.methods.push(MethodDecl {
            visibility: Visibility::Public,
            func,
        });
        self
    }

    pub fn with_internal_method(mut self, func: FunctionDecl) -> Self {
        self.methods.push(MethodDecl {
            visibility: Visibility::Internal,
            func,
        });
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::at(line, column);
        self
    }
}

impl GroupDecl {
    pub fn new(name: impl Into<String>, base_type: Type) -> Self {
        Self {
            name: name.into(),
            base_type,
            members: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: Expression) -> Self {
        let span = value.span;
        self.members.push(GroupMemberDecl {
            name: name.into(),
            value,
            span,
        });
        self
    }
}

impl Import {
    /// `import module;`
    pub fn namespace(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            alias: None,
            names: Vec::new(),
            span: Span::default(),
        }
    }

    /// `import module as alias;`
    pub fn aliased(module: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            alias: Some(alias.into()),
            names: Vec::new(),
            span: Span::default(),
        }
    }

    /// `import { a, b } from module;`
    pub fn members(module: impl Into<String>, names: &[&str]) -> Self {
        Self {
            module: module.into(),
            alias: None,
            names: names.iter().map(|n| n.to_string()).collect(),
            span: Span::default(),
        }
    }
}

impl Program {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            imports: Vec::new(),
            decls: Vec::new(),
        }
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_function(mut self, func: FunctionDecl) -> Self {
        self.decls.push(Decl::Function(func));
        self
    }

    pub fn with_prototype(mut self, proto: PrototypeDecl) -> Self {
        self.decls.push(Decl::Prototype(proto));
        self
    }

    pub fn with_group(mut self, group: GroupDecl) -> Self {
        self.decls.push(Decl::Group(group));
        self
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn prototypes(&self) -> impl Iterator<Item = &PrototypeDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Prototype(p) => Some(p),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Group(g) => Some(g),
            _ => None,
        })
    }
}
