//! Core type definitions for the ProtoScript type system

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Primitive (scalar) types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    /// `bool`
    Bool,
    /// `byte` (unsigned, 0..=255)
    Byte,
    /// `int` (64-bit signed)
    Int,
    /// `float` (IEEE 754 double)
    Float,
    /// `glyph` (one Unicode scalar value)
    Glyph,
    /// `string`
    String,
    /// `void` (no value)
    Void,
}

impl PrimitiveType {
    /// Every primitive, in declaration order
    pub const ALL: [PrimitiveType; 7] = [
        PrimitiveType::Bool,
        PrimitiveType::Byte,
        PrimitiveType::Int,
        PrimitiveType::Float,
        PrimitiveType::Glyph,
        PrimitiveType::String,
        PrimitiveType::Void,
    ];

    /// Source-level spelling
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Glyph => "glyph",
            PrimitiveType::String => "string",
            PrimitiveType::Void => "void",
        }
    }

    /// Look up a primitive by its spelling
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// `byte`, `int` or `float`
    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveType::Byte | PrimitiveType::Int | PrimitiveType::Float)
    }

    /// `byte` or `int`
    pub fn is_integer(&self) -> bool {
        matches!(self, PrimitiveType::Byte | PrimitiveType::Int)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in generic container constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenericKind {
    /// `list<T>`: growable, owned sequence
    List,
    /// `map<K,V>`
    Map,
    /// `view<T>`: read-only window
    View,
    /// `slice<T>`: mutable window
    Slice,
}

impl GenericKind {
    /// Source-level spelling
    pub fn name(&self) -> &'static str {
        match self {
            GenericKind::List => "list",
            GenericKind::Map => "map",
            GenericKind::View => "view",
            GenericKind::Slice => "slice",
        }
    }

    /// Look up a generic constructor by its spelling
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "list" => Some(GenericKind::List),
            "map" => Some(GenericKind::Map),
            "view" => Some(GenericKind::View),
            "slice" => Some(GenericKind::Slice),
            _ => None,
        }
    }

    /// Number of type arguments the constructor takes
    pub fn arity(&self) -> usize {
        match self {
            GenericKind::Map => 2,
            _ => 1,
        }
    }
}

/// A ProtoScript type
///
/// Equality is structural, which coincides with equality of the canonical
/// rendering produced by `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Type {
    /// Scalar primitive
    Primitive(PrimitiveType),
    /// Reference to a prototype by name
    Named(String),
    /// Generic container instance
    Generic {
        /// Container constructor
        kind: GenericKind,
        /// Type arguments (`kind.arity()` of them)
        args: Vec<Type>,
    },
}

impl Type {
    pub fn bool() -> Self {
        Type::Primitive(PrimitiveType::Bool)
    }

    pub fn byte() -> Self {
        Type::Primitive(PrimitiveType::Byte)
    }

    pub fn int() -> Self {
        Type::Primitive(PrimitiveType::Int)
    }

    pub fn float() -> Self {
        Type::Primitive(PrimitiveType::Float)
    }

    pub fn glyph() -> Self {
        Type::Primitive(PrimitiveType::Glyph)
    }

    pub fn string() -> Self {
        Type::Primitive(PrimitiveType::String)
    }

    pub fn void() -> Self {
        Type::Primitive(PrimitiveType::Void)
    }

    /// Named prototype type
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named(name.into())
    }

    pub fn list(elem: Type) -> Self {
        Type::Generic {
            kind: GenericKind::List,
            args: vec![elem],
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Generic {
            kind: GenericKind::Map,
            args: vec![key, value],
        }
    }

    pub fn view(elem: Type) -> Self {
        Type::Generic {
            kind: GenericKind::View,
            args: vec![elem],
        }
    }

    pub fn slice(elem: Type) -> Self {
        Type::Generic {
            kind: GenericKind::Slice,
            args: vec![elem],
        }
    }

    /// Parse the canonical string form (`int`, `list<int>`, `map<string,Point>`)
    pub fn parse(input: &str) -> Result<Type, TypeParseError> {
        let mut parser = TypeStringParser::new(input);
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            return Err(parser.error("trailing characters after type"));
        }
        Ok(ty)
    }

    /// The primitive, if this is one
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// The prototype name, if this is a named type
    pub fn as_named(&self) -> Option<&str> {
        match self {
            Type::Named(name) => Some(name),
            _ => None,
        }
    }

    /// The generic constructor, if this is a container
    pub fn generic_kind(&self) -> Option<GenericKind> {
        match self {
            Type::Generic { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Void))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Bool))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::String))
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_numeric())
    }

    pub fn is_integer(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_integer())
    }

    /// Non-void primitive
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Primitive(p) if *p != PrimitiveType::Void)
    }

    /// Element type of an indexable sequence (`list`/`view`/`slice` element,
    /// `glyph` for strings, value type for maps)
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Primitive(PrimitiveType::String) => Some(Type::glyph()),
            Type::Generic { kind: GenericKind::Map, args } => args.get(1).cloned(),
            Type::Generic { args, .. } => args.first().cloned(),
            _ => None,
        }
    }

    /// Key type of a map, `int` for indexable sequences
    pub fn key_type(&self) -> Option<Type> {
        match self {
            Type::Generic { kind: GenericKind::Map, args } => args.first().cloned(),
            Type::Primitive(PrimitiveType::String) | Type::Generic { .. } => Some(Type::int()),
            _ => None,
        }
    }

    /// True if `void` appears anywhere inside (the placeholder of empty literals)
    pub fn contains_void(&self) -> bool {
        match self {
            Type::Primitive(p) => *p == PrimitiveType::Void,
            Type::Named(_) => false,
            Type::Generic { args, .. } => args.iter().any(Type::contains_void),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Named(name) => f.write_str(name),
            Type::Generic { kind, args } => {
                write!(f, "{}<", kind.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
        }
    }
}

impl From<Type> for String {
    fn from(ty: Type) -> String {
        ty.to_string()
    }
}

impl TryFrom<String> for Type {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Type::parse(&value)
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Self {
        Type::Primitive(p)
    }
}

/// Error produced when a type string is malformed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid type '{input}' at offset {offset}: {message}")]
pub struct TypeParseError {
    /// The full input string
    pub input: String,
    /// Character offset of the problem
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

struct TypeStringParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> TypeStringParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.chars.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String, TypeParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_alphanumeric() || self.chars[self.pos] == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        if self.chars[start].is_ascii_digit() {
            self.pos = start;
            return Err(self.error("type names cannot start with a digit"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_type(&mut self) -> Result<Type, TypeParseError> {
        let name = self.ident()?;

        if let Some(kind) = GenericKind::from_name(&name) {
            if !self.eat('<') {
                return Err(self.error(format!("'{}' requires type arguments", name)));
            }
            let mut args = vec![self.parse_type()?];
            while self.eat(',') {
                args.push(self.parse_type()?);
            }
            if !self.eat('>') {
                return Err(self.error("expected '>'"));
            }
            if args.len() != kind.arity() {
                return Err(self.error(format!(
                    "'{}' expects {} type argument(s), got {}",
                    name,
                    kind.arity(),
                    args.len()
                )));
            }
            return Ok(Type::Generic { kind, args });
        }

        if let Some(p) = PrimitiveType::from_name(&name) {
            return Ok(Type::Primitive(p));
        }

        Ok(Type::Named(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_rendering() {
        assert_eq!(Type::int().to_string(), "int");
        assert_eq!(Type::list(Type::int()).to_string(), "list<int>");
        assert_eq!(
            Type::map(Type::string(), Type::list(Type::named("Point"))).to_string(),
            "map<string,list<Point>>"
        );
    }

    #[test]
    fn test_round_trip_every_combination() {
        let mut scalars: Vec<Type> = PrimitiveType::ALL.iter().map(|p| Type::from(*p)).collect();
        scalars.push(Type::named("Point"));

        let mut all = scalars.clone();
        for inner in &scalars {
            all.push(Type::list(inner.clone()));
            all.push(Type::view(inner.clone()));
            all.push(Type::slice(inner.clone()));
            for value in &scalars {
                all.push(Type::map(inner.clone(), value.clone()));
            }
        }
        all.push(Type::list(Type::map(Type::string(), Type::slice(Type::byte()))));

        for ty in all {
            let rendered = ty.to_string();
            assert_eq!(Type::parse(&rendered).unwrap(), ty, "round trip of {}", rendered);
        }
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert_eq!(
            Type::parse("map< string , int >").unwrap(),
            Type::map(Type::string(), Type::int())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Type::parse("list").is_err());
        assert!(Type::parse("map<int>").is_err());
        assert!(Type::parse("list<int").is_err());
        assert!(Type::parse("int int").is_err());
        assert!(Type::parse("").is_err());
    }

    #[test]
    fn test_element_and_key_types() {
        assert_eq!(Type::string().element_type(), Some(Type::glyph()));
        assert_eq!(
            Type::map(Type::string(), Type::float()).element_type(),
            Some(Type::float())
        );
        assert_eq!(
            Type::map(Type::string(), Type::float()).key_type(),
            Some(Type::string())
        );
        assert_eq!(Type::view(Type::byte()).key_type(), Some(Type::int()));
        assert_eq!(Type::int().element_type(), None);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let json = serde_json::to_string(&Type::list(Type::int())).unwrap();
        assert_eq!(json, "\"list<int>\"");
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Type::list(Type::int()));
    }
}
