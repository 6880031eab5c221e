//! Expression AST nodes

use super::Span;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expression {
    /// Identity of this node, used as the key of analysis side tables
    ///
    /// Stable as long as the tree is not moved, which holds because the
    /// tree is immutable and borrowed for the whole pipeline.
    pub fn node_id(&self) -> usize {
        self as *const Expression as usize
    }
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value
    Literal(Literal),

    /// Variable, function, prototype, group, or namespace name
    Identifier(String),

    /// `self` inside a method
    SelfRef,

    /// Unary expression: `-x`, `!b`, `~n`
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Binary expression, including `&&` and `||`
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `cond ? a : b`
    Ternary {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },

    /// Free function call: `name(args)`
    Call { callee: String, args: Vec<Expression> },

    /// Method call: `receiver.method(args)`; also module functions
    /// (`math.sqrt(x)`) and container built-ins (`xs.push(1)`)
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },

    /// Member access: `obj.field`, `Group.Member`, `module.constant`
    Member {
        object: Box<Expression>,
        member: String,
    },

    /// Index access: `xs[i]`, `m[k]`, `s[i]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },

    /// Numeric cast: `(int) x`
    Cast {
        expr: Box<Expression>,
        target: Type,
    },

    /// `[a, b, c]`
    ListLiteral(Vec<Expression>),

    /// `{k: v, ...}`
    MapLiteral(Vec<(Expression, Expression)>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Glyph(char),
    String(String),
}

impl Literal {
    /// Type of the literal on its own
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::bool(),
            Literal::Int(_) => Type::int(),
            Literal::Float(_) => Type::float(),
            Literal::Glyph(_) => Type::glyph(),
            Literal::String(_) => Type::string(),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    /// Check if this is an arithmetic operator
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Check if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    /// `==` or `!=`
    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    /// Check if this is a logical operator
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Check if this is a bitwise or shift operator
    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::ShiftLeft | BinaryOp::ShiftRight)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Numeric negation (-)
    Neg,
    /// Logical not (!)
    Not,
    /// Bitwise not (~)
    BitNot,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_categories() {
        assert!(BinaryOp::Add.is_arithmetic());
        assert!(!BinaryOp::Add.is_comparison());
        assert!(BinaryOp::Less.is_comparison());
        assert!(BinaryOp::Or.is_logical());
        assert!(BinaryOp::ShiftLeft.is_bitwise());
        assert!(BinaryOp::ShiftLeft.is_shift());
        assert!(!BinaryOp::BitAnd.is_shift());
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(format!("{}", BinaryOp::Mod), "%");
        assert_eq!(format!("{}", BinaryOp::GreaterEqual), ">=");
        assert_eq!(format!("{}", UnaryOp::BitNot), "~");
    }

    #[test]
    fn test_node_ids_are_distinct() {
        let a = Expression {
            kind: ExprKind::Literal(Literal::Int(1)),
            span: Span::default(),
        };
        let b = a.clone();
        assert_ne!(a.node_id(), b.node_id());
    }
}
