//! Abstract Syntax Tree
//!
//! The tree produced by the (external) parser and consumed, unmodified, by
//! both the analyzer and the IR builder. Nodes are never annotated in place;
//! results keyed by node identity live in side tables (see
//! `checker::CheckResult`).

mod build;
pub mod expression;
pub mod statement;

pub use expression::*;
pub use statement::*;

use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Source location of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span pointing at a line/column with no byte range
    pub fn at(line: u32, column: u32) -> Self {
        Self::new(0, 0, line, column)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::at(1, 1)
    }
}

/// A parsed compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// File name used in diagnostics
    pub file: String,
    /// Import declarations, in source order
    pub imports: Vec<Import>,
    /// Top-level declarations, in source order
    pub decls: Vec<Decl>,
}

/// `import math;`, `import math as m;`, `import { sqrt, pi } from math;`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    /// Namespace alias (`as m`)
    pub alias: Option<String>,
    /// Individually imported members; empty for a namespace import
    pub names: Vec<String>,
    pub span: Span,
}

impl Import {
    /// Name under which the namespace is visible
    pub fn namespace_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.module)
    }
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Prototype(PrototypeDecl),
    Function(FunctionDecl),
    Group(GroupDecl),
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    /// Visible only to the declaring prototype and its descendants
    Internal,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
        }
    }
}

/// `[sealed] prototype Name [: Parent] { fields; methods }`
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeDecl {
    pub name: String,
    pub parent: Option<String>,
    pub sealed: bool,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// Field declaration inside a prototype
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub init: Option<Expression>,
    pub visibility: Visibility,
    pub span: Span,
}

/// Method declaration inside a prototype
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub visibility: Visibility,
    pub func: FunctionDecl,
}

/// `function name(params): ret { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// `group Name : base { A = expr, B = expr }`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDecl {
    pub name: String,
    pub base_type: Type,
    pub members: Vec<GroupMemberDecl>,
    pub span: Span,
}

/// One member of a group declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMemberDecl {
    pub name: String,
    pub value: Expression,
    pub span: Span,
}
