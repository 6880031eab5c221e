//! Statement AST nodes

use super::{BinaryOp, Expression, Span};
use crate::types::Type;

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `[const] T name [= init];`
    VarDecl(VarDecl),

    /// `target = value;` or `target op= value;`
    Assign(Assignment),

    /// Expression evaluated for its effects
    Expression(ExpressionStatement),

    If(IfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),

    /// `for (init; cond; update) body`
    For(ForStatement),

    /// `for (T x of xs)`: iterates values
    ForOf(ForEachStatement),

    /// `for (T k in xs)`: iterates keys (map keys, sequence indices)
    ForIn(ForEachStatement),

    Switch(SwitchStatement),
    Break(Span),
    Continue(Span),
    Return(ReturnStatement),
    Throw(ThrowStatement),
    Try(TryStatement),

    /// Nested `{ ... }` block with its own scope
    Block(BlockStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::VarDecl(s) => s.span,
            Statement::Assign(s) => s.span,
            Statement::Expression(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::DoWhile(s) => s.span,
            Statement::For(s) => s.span,
            Statement::ForOf(s) | Statement::ForIn(s) => s.span,
            Statement::Switch(s) => s.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
            Statement::Return(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Block(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub init: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Identifier, member, or index expression
    pub target: Expression,
    /// Compound operator (`+=` carries `Add`)
    pub op: Option<BinaryOp>,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expr: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Vec<Statement>,
    pub else_branch: Option<Vec<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    pub body: Vec<Statement>,
    pub condition: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    pub update: Option<Box<Statement>>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStatement {
    pub var_name: String,
    /// Declared loop variable type; inferred from the iterable when absent
    pub var_type: Option<Type>,
    pub iterable: Expression,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

/// `case v: body` or `default: body`
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the default arm
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
    /// Arm explicitly falls through into the next one
    pub fallthrough: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStatement {
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    pub body: Vec<Statement>,
    pub catches: Vec<CatchClause>,
    pub span: Span,
}

/// `catch (Proto name) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub proto: String,
    pub binding: String,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    pub span: Span,
}

/// Whether a statement list always transfers control away at its end
/// (`break`, `continue`, `return`, or `throw`, possibly nested in a block
/// or in both arms of an `if`)
pub fn ends_in_jump(body: &[Statement]) -> bool {
    match body.last() {
        Some(Statement::Break(_))
        | Some(Statement::Continue(_))
        | Some(Statement::Return(_))
        | Some(Statement::Throw(_)) => true,
        Some(Statement::Block(block)) => ends_in_jump(&block.body),
        Some(Statement::If(if_stmt)) => match &if_stmt.else_branch {
            Some(else_branch) => ends_in_jump(&if_stmt.then_branch) && ends_in_jump(else_branch),
            None => false,
        },
        _ => false,
    }
}
