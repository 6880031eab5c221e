//! IR values: temporaries and constants

use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A temporary, defined by exactly one instruction of its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temp(pub u32);

impl Temp {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrConstant {
    Bool(bool),
    Byte(u8),
    Int(i64),
    Float(f64),
    Glyph(char),
    Str(String),
}

impl IrConstant {
    pub fn ty(&self) -> Type {
        match self {
            IrConstant::Bool(_) => Type::bool(),
            IrConstant::Byte(_) => Type::byte(),
            IrConstant::Int(_) => Type::int(),
            IrConstant::Float(_) => Type::float(),
            IrConstant::Glyph(_) => Type::glyph(),
            IrConstant::Str(_) => Type::string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            IrConstant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value of an `int` or `byte` constant
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            IrConstant::Int(v) => Some(*v),
            IrConstant::Byte(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Numeric value of an `int`, `byte` or `float` constant
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IrConstant::Int(v) => Some(*v as f64),
            IrConstant::Byte(v) => Some(f64::from(*v)),
            IrConstant::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Zero value of a scalar type, used for field defaults
    pub fn zero_of(ty: &Type) -> Option<IrConstant> {
        use crate::types::PrimitiveType as P;
        Some(match ty.as_primitive()? {
            P::Bool => IrConstant::Bool(false),
            P::Byte => IrConstant::Byte(0),
            P::Int => IrConstant::Int(0),
            P::Float => IrConstant::Float(0.0),
            P::Glyph => IrConstant::Glyph('\0'),
            P::String => IrConstant::Str(String::new()),
            P::Void => return None,
        })
    }
}

impl fmt::Display for IrConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrConstant::Bool(b) => write!(f, "{}", b),
            IrConstant::Byte(v) => write!(f, "{}b", v),
            IrConstant::Int(v) => write!(f, "{}", v),
            IrConstant::Float(v) => write!(f, "{:?}", v),
            IrConstant::Glyph(c) => write!(f, "{:?}", c),
            IrConstant::Str(s) => write!(f, "{:?}", s),
        }
    }
}
