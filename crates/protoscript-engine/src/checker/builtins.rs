//! Built-in prototypes, container methods and free functions
//!
//! This is the only place built-ins are defined; the registry, the
//! analyzer and the IR builder all read from here.

use crate::types::{GenericKind, Type};

/// Root of every prototype
pub const OBJECT: &str = "Object";
/// Root of every throwable prototype
pub const EXCEPTION: &str = "Exception";

/// A built-in method signature, types in canonical string form
#[derive(Debug, Clone, Copy)]
pub struct BuiltinMethod {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub ret: &'static str,
}

/// A built-in prototype
#[derive(Debug, Clone, Copy)]
pub struct BuiltinPrototype {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub sealed: bool,
    /// `(name, type)`
    pub fields: &'static [(&'static str, &'static str)],
    pub methods: &'static [BuiltinMethod],
}

const fn method(
    name: &'static str,
    params: &'static [&'static str],
    ret: &'static str,
) -> BuiltinMethod {
    BuiltinMethod { name, params, ret }
}

const fn exception(name: &'static str, parent: &'static str) -> BuiltinPrototype {
    BuiltinPrototype {
        name,
        parent: Some(parent),
        sealed: false,
        fields: &[],
        methods: &[],
    }
}

const fn handle(name: &'static str, methods: &'static [BuiltinMethod]) -> BuiltinPrototype {
    BuiltinPrototype {
        name,
        parent: Some(OBJECT),
        sealed: true,
        fields: &[],
        methods,
    }
}

/// Every built-in prototype; parents precede children
pub const BUILTIN_PROTOTYPES: &[BuiltinPrototype] = &[
    BuiltinPrototype {
        name: OBJECT,
        parent: None,
        sealed: false,
        fields: &[],
        methods: &[
            method("clone", &[], "Object"),
            method("toString", &[], "string"),
        ],
    },
    BuiltinPrototype {
        name: EXCEPTION,
        parent: Some(OBJECT),
        sealed: false,
        fields: &[("message", "string")],
        methods: &[method("getMessage", &[], "string")],
    },
    exception("RuntimeException", EXCEPTION),
    exception("IOException", EXCEPTION),
    exception("ValueException", EXCEPTION),
    exception("TypeException", EXCEPTION),
    exception("IndexException", "RuntimeException"),
    exception("KeyException", "RuntimeException"),
    exception("OverflowException", "RuntimeException"),
    exception("DivideByZeroException", "RuntimeException"),
    exception("InvalidCallException", "RuntimeException"),
    handle(
        "File",
        &[
            method("read", &[], "string"),
            method("write", &["string"], "void"),
            method("close", &[], "void"),
        ],
    ),
    handle(
        "Directory",
        &[method("entries", &[], "list<string>")],
    ),
    handle(
        "Regex",
        &[
            method("matches", &["string"], "bool"),
            method("find", &["string"], "RegexMatch"),
        ],
    ),
    handle(
        "RegexMatch",
        &[
            method("group", &["int"], "string"),
            method("start", &[], "int"),
            method("end", &[], "int"),
        ],
    ),
    handle(
        "JsonValue",
        &[
            method("asString", &[], "string"),
            method("asInt", &[], "int"),
            method("asFloat", &[], "float"),
            method("asBool", &[], "bool"),
            method("get", &["string"], "JsonValue"),
        ],
    ),
    handle(
        "Date",
        &[
            method("year", &[], "int"),
            method("month", &[], "int"),
            method("day", &[], "int"),
            method("timestamp", &[], "int"),
        ],
    ),
    handle(
        "Duration",
        &[
            method("seconds", &[], "int"),
            method("millis", &[], "int"),
        ],
    ),
    handle(
        "ProcessResult",
        &[
            method("exitCode", &[], "int"),
            method("output", &[], "string"),
        ],
    ),
    handle(
        "Path",
        &[
            method("join", &["string"], "Path"),
            method("name", &[], "string"),
        ],
    ),
];

pub fn builtin_prototype(name: &str) -> Option<&'static BuiltinPrototype> {
    BUILTIN_PROTOTYPES.iter().find(|p| p.name == name)
}

pub fn is_builtin_prototype(name: &str) -> bool {
    builtin_prototype(name).is_some()
}

/// Parse a built-in type string; the table only holds well-formed ones
pub fn builtin_type(text: &str) -> Type {
    Type::parse(text).unwrap_or_else(|_| Type::named(text))
}

/// Built-in methods on containers and strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerMethod {
    Push,
    Pop,
    Length,
    View,
    Slice,
    Clear,
    Has,
    Remove,
}

impl ContainerMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerMethod::Push => "push",
            ContainerMethod::Pop => "pop",
            ContainerMethod::Length => "length",
            ContainerMethod::View => "view",
            ContainerMethod::Slice => "slice",
            ContainerMethod::Clear => "clear",
            ContainerMethod::Has => "has",
            ContainerMethod::Remove => "remove",
        }
    }

    /// Methods available on a receiver of `ty`
    pub fn available_on(ty: &Type) -> &'static [ContainerMethod] {
        use ContainerMethod::*;
        if ty.is_string() {
            return &[Length, View];
        }
        match ty.generic_kind() {
            Some(GenericKind::List) => &[Push, Pop, Length, View, Slice, Clear],
            Some(GenericKind::Map) => &[Has, Remove, Length],
            Some(GenericKind::View) => &[Length, View],
            Some(GenericKind::Slice) => &[Length, View, Slice],
            None => &[],
        }
    }
}

/// Resolved signature of a container method on a concrete receiver
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSignature {
    pub method: ContainerMethod,
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Look up `name` on a container or string receiver
pub fn container_method(receiver: &Type, name: &str) -> Option<ContainerSignature> {
    let method = ContainerMethod::available_on(receiver)
        .iter()
        .copied()
        .find(|m| m.name() == name)?;
    let elem = receiver.element_type()?;
    let (params, ret) = match method {
        ContainerMethod::Push => (vec![elem], Type::void()),
        ContainerMethod::Pop => (vec![], elem),
        ContainerMethod::Length => (vec![], Type::int()),
        ContainerMethod::View => (vec![Type::int(), Type::int()], Type::view(elem)),
        ContainerMethod::Slice => (vec![Type::int(), Type::int()], Type::slice(elem)),
        ContainerMethod::Clear => (vec![], Type::void()),
        ContainerMethod::Has => (vec![receiver.key_type()?], Type::bool()),
        ContainerMethod::Remove => (vec![receiver.key_type()?], Type::void()),
    };
    Some(ContainerSignature {
        method,
        params,
        ret,
    })
}

/// Free built-in functions
pub const BUILTIN_FUNCTIONS: &[&str] = &["print"];

pub fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types_parse() {
        for proto in BUILTIN_PROTOTYPES {
            for (_, ty) in proto.fields {
                assert!(Type::parse(ty).is_ok(), "{}", ty);
            }
            for m in proto.methods {
                assert!(Type::parse(m.ret).is_ok(), "{}", m.ret);
                for p in m.params {
                    assert!(Type::parse(p).is_ok(), "{}", p);
                }
            }
        }
    }

    #[test]
    fn test_parents_precede_children() {
        for (i, proto) in BUILTIN_PROTOTYPES.iter().enumerate() {
            if let Some(parent) = proto.parent {
                let parent_index = BUILTIN_PROTOTYPES
                    .iter()
                    .position(|p| p.name == parent)
                    .unwrap();
                assert!(parent_index < i, "{} before {}", parent, proto.name);
            }
        }
    }

    #[test]
    fn test_handles_are_sealed() {
        assert!(builtin_prototype("File").unwrap().sealed);
        assert!(builtin_prototype("Path").unwrap().sealed);
        assert!(!builtin_prototype("Exception").unwrap().sealed);
    }

    #[test]
    fn test_list_methods() {
        let list = Type::list(Type::int());
        let pop = container_method(&list, "pop").unwrap();
        assert_eq!(pop.ret, Type::int());
        let push = container_method(&list, "push").unwrap();
        assert_eq!(push.params, vec![Type::int()]);
        let view = container_method(&list, "view").unwrap();
        assert_eq!(view.ret, Type::view(Type::int()));
        assert!(container_method(&list, "has").is_none());
    }

    #[test]
    fn test_map_and_string_methods() {
        let map = Type::map(Type::string(), Type::int());
        assert_eq!(
            container_method(&map, "has").unwrap().params,
            vec![Type::string()]
        );
        assert!(container_method(&map, "push").is_none());
        let view = container_method(&Type::string(), "view").unwrap();
        assert_eq!(view.ret, Type::view(Type::glyph()));
        assert!(container_method(&Type::view(Type::int()), "push").is_none());
    }
}
