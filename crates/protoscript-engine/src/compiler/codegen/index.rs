//! Name lookups over an IR module
//!
//! Functions and prototypes by name, flattened field types, and static
//! method resolution along the parent chain.

use super::{CodegenError, CodegenResult};
use crate::compiler::ir::{IrFunction, IrModule, IrPrototype};
use crate::types::Type;
use rustc_hash::FxHashMap;

/// Built-in method bodies provided by the generated runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultMethod {
    /// `Object.clone()`: shallow copy of the dynamic prototype
    Clone,
    /// `Object.toString()`: the dynamic prototype's name
    ToString,
    /// `Exception.getMessage()`
    GetMessage,
}

impl DefaultMethod {
    pub fn lookup(owner: &str, method: &str) -> Option<Self> {
        match (owner, method) {
            ("Object", "clone") => Some(DefaultMethod::Clone),
            ("Object", "toString") => Some(DefaultMethod::ToString),
            ("Exception", "getMessage") => Some(DefaultMethod::GetMessage),
            _ => None,
        }
    }

    pub fn owner(self) -> &'static str {
        match self {
            DefaultMethod::Clone | DefaultMethod::ToString => "Object",
            DefaultMethod::GetMessage => "Exception",
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            DefaultMethod::Clone => "psm_Object__clone",
            DefaultMethod::ToString => "psm_Object__toString",
            DefaultMethod::GetMessage => "psm_Exception__getMessage",
        }
    }

    pub fn return_type(self) -> Type {
        match self {
            DefaultMethod::Clone => Type::named("Object"),
            DefaultMethod::ToString | DefaultMethod::GetMessage => Type::string(),
        }
    }
}

/// The body a method call runs for a given receiver prototype
#[derive(Debug, Clone, Copy)]
pub enum MethodImpl<'m> {
    Declared(&'m IrFunction),
    Default(DefaultMethod),
}

impl<'m> MethodImpl<'m> {
    pub fn c_name(&self) -> String {
        match self {
            MethodImpl::Declared(func) => c_function_name(&func.name),
            MethodImpl::Default(method) => method.c_name().to_string(),
        }
    }

    pub fn return_type(&self) -> Type {
        match self {
            MethodImpl::Declared(func) => func.return_type.clone(),
            MethodImpl::Default(method) => method.return_type(),
        }
    }

    /// Parameter types, receiver first
    pub fn param_types(&self) -> Vec<Type> {
        match self {
            MethodImpl::Declared(func) => func.params.iter().map(|p| p.ty.clone()).collect(),
            MethodImpl::Default(method) => vec![Type::named(method.owner())],
        }
    }
}

/// C name of an IR function: `psf_name`, or `psm_Proto__method` for methods
pub fn c_function_name(name: &str) -> String {
    match name.split_once("::") {
        Some((proto, method)) => format!("psm_{}__{}", sanitize(proto), sanitize(method)),
        None => format!("psf_{}", sanitize(name)),
    }
}

/// Replace characters C identifiers cannot hold
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub struct ModuleIndex<'m> {
    module: &'m IrModule,
    functions: FxHashMap<&'m str, &'m IrFunction>,
    prototypes: FxHashMap<&'m str, &'m IrPrototype>,
}

impl<'m> ModuleIndex<'m> {
    pub fn new(module: &'m IrModule) -> Self {
        Self {
            module,
            functions: module.functions.iter().map(|f| (f.name.as_str(), f)).collect(),
            prototypes: module.prototypes.iter().map(|p| (p.name.as_str(), p)).collect(),
        }
    }

    pub fn module(&self) -> &'m IrModule {
        self.module
    }

    pub fn function(&self, name: &str) -> Option<&'m IrFunction> {
        self.functions.get(name).copied()
    }

    pub fn prototype(&self, name: &str) -> CodegenResult<&'m IrPrototype> {
        self.prototypes
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnknownPrototype {
                name: name.to_string(),
            })
    }

    pub fn has_prototype(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    pub fn field_type(&self, proto: &str, field: &str) -> CodegenResult<&'m Type> {
        self.prototype(proto)?
            .get_field(field)
            .map(|(_, f)| &f.ty)
            .ok_or_else(|| CodegenError::UnknownField {
                proto: proto.to_string(),
                field: field.to_string(),
            })
    }

    /// `name` then each ancestor, stopping at unknown parents
    pub fn ancestors(&self, name: &str) -> Vec<&'m str> {
        let mut chain = Vec::new();
        let mut current = self.prototypes.get(name).copied();
        while let Some(proto) = current {
            if chain.contains(&proto.name.as_str()) {
                break;
            }
            chain.push(proto.name.as_str());
            current = proto
                .parent
                .as_deref()
                .and_then(|parent| self.prototypes.get(parent).copied());
        }
        chain
    }

    pub fn is_subtype(&self, child: &str, ancestor: &str) -> bool {
        self.ancestors(child).contains(&ancestor)
    }

    /// Prototypes strictly below `proto`, in module order
    pub fn strict_subtypes(&self, proto: &str) -> Vec<&'m IrPrototype> {
        self.module
            .prototypes
            .iter()
            .filter(|p| p.name != proto && self.is_subtype(&p.name, proto))
            .collect()
    }

    /// Nearest body of `method` for a receiver whose dynamic prototype is
    /// `proto`
    pub fn resolve_method(&self, proto: &str, method: &str) -> Option<MethodImpl<'m>> {
        for owner in self.ancestors(proto) {
            let symbol = format!("{}::{}", owner, method);
            if let Some(func) = self.function(&symbol) {
                return Some(MethodImpl::Declared(func));
            }
            if let Some(default) = DefaultMethod::lookup(owner, method) {
                return Some(MethodImpl::Default(default));
            }
        }
        None
    }

    pub fn require_method(&self, proto: &str, method: &str) -> CodegenResult<MethodImpl<'m>> {
        self.resolve_method(proto, method)
            .ok_or_else(|| CodegenError::UnknownMethod {
                proto: proto.to_string(),
                method: method.to_string(),
            })
    }

    /// Some prototype below `proto` runs a different body for `method`
    pub fn needs_dispatch(&self, proto: &str, method: &str) -> bool {
        let Some(base) = self.resolve_method(proto, method) else {
            return false;
        };
        let base = base.c_name();
        self.strict_subtypes(proto).iter().any(|sub| {
            self.resolve_method(&sub.name, method)
                .is_some_and(|m| m.c_name() != base)
        })
    }
}
