//! What a resolved expression denotes

use crate::types::Type;
use std::fmt;

/// Classification of a resolved name or expression
///
/// Closed union: every identifier resolves to exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A value of a non-prototype type (scalars, strings, containers)
    Primitive(Type),
    /// A prototype instance, or a prototype name used as its own descriptor
    Instance(String),
    /// A group name; only its members are values
    Group(String),
    /// An imported module namespace
    Namespace(String),
}

impl ValueKind {
    /// Classify a value of type `ty`
    pub fn of_type(ty: Type) -> Self {
        match ty {
            Type::Named(name) => ValueKind::Instance(name),
            other => ValueKind::Primitive(other),
        }
    }

    /// Static type when the kind denotes a runtime value
    pub fn value_type(&self) -> Option<Type> {
        match self {
            ValueKind::Primitive(ty) => Some(ty.clone()),
            ValueKind::Instance(name) => Some(Type::named(name.clone())),
            ValueKind::Group(_) | ValueKind::Namespace(_) => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Primitive(ty) => write!(f, "{}", ty),
            ValueKind::Instance(name) => write!(f, "{}", name),
            ValueKind::Group(name) => write!(f, "group {}", name),
            ValueKind::Namespace(name) => write!(f, "module {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            ValueKind::of_type(Type::named("Point")),
            ValueKind::Instance("Point".to_string())
        );
        assert_eq!(
            ValueKind::of_type(Type::list(Type::int())).value_type(),
            Some(Type::list(Type::int()))
        );
        assert_eq!(ValueKind::Group("Color".into()).value_type(), None);
        assert_eq!(ValueKind::Namespace("math".into()).to_string(), "module math");
    }
}
