//! Prototype registry
//!
//! Single-inheritance tree of every prototype visible to a program: the
//! fixed built-ins plus the user declarations. Built once, before analysis,
//! and shared read-only by the analyzer, the IR builder and the C backend.

use super::builtins::{builtin_type, is_builtin_prototype, BUILTIN_PROTOTYPES, EXCEPTION, OBJECT};
use super::error::{codes, Diagnostic};
use crate::ast::{Program, PrototypeDecl, Span, Visibility};
use crate::types::Type;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// A field slot
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    /// Declared with an initializer
    pub has_init: bool,
    pub visibility: Visibility,
    /// Prototype that declares the field
    pub declared_in: String,
}

/// A method signature (excluding the implicit receiver)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub visibility: Visibility,
    /// Prototype that declares (or overrides) the method
    pub declared_in: String,
}

/// A prototype and its own (non-inherited) members
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub parent: Option<String>,
    pub sealed: bool,
    pub builtin: bool,
    /// Own fields, in declaration order
    pub fields: Vec<FieldInfo>,
    /// Own methods, in declaration order
    pub methods: Vec<MethodInfo>,
    pub span: Span,
}

impl Prototype {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    fn has_member(&self, name: &str) -> bool {
        self.field(name).is_some() || self.method(name).is_some()
    }
}

/// Registry of all prototypes
#[derive(Debug, Clone)]
pub struct PrototypeRegistry {
    prototypes: FxHashMap<String, Prototype>,
    /// Registration order; built-ins first, parents before children for
    /// built-ins, declaration order for user prototypes
    order: Vec<String>,
}

impl Default for PrototypeRegistry {
    fn default() -> Self {
        Self::builtins()
    }
}

impl PrototypeRegistry {
    /// Registry holding only the built-in prototypes
    pub fn builtins() -> Self {
        let mut registry = Self {
            prototypes: FxHashMap::default(),
            order: Vec::new(),
        };

        for builtin in BUILTIN_PROTOTYPES {
            let fields = builtin
                .fields
                .iter()
                .map(|(name, ty)| FieldInfo {
                    name: name.to_string(),
                    ty: builtin_type(ty),
                    is_const: false,
                    has_init: false,
                    visibility: Visibility::Public,
                    declared_in: builtin.name.to_string(),
                })
                .collect();
            let methods = builtin
                .methods
                .iter()
                .map(|m| MethodInfo {
                    name: m.name.to_string(),
                    params: m.params.iter().map(|p| builtin_type(p)).collect(),
                    ret: builtin_type(m.ret),
                    visibility: Visibility::Public,
                    declared_in: builtin.name.to_string(),
                })
                .collect();
            registry.insert(Prototype {
                name: builtin.name.to_string(),
                parent: builtin.parent.map(str::to_string),
                sealed: builtin.sealed,
                builtin: true,
                fields,
                methods,
                span: Span::default(),
            });
        }

        registry
    }

    /// Build the registry for a program, reporting every declaration error
    ///
    /// The registry is still usable when diagnostics are returned: duplicated
    /// declarations keep their first occurrence, unknown parents and broken
    /// cycles fall back to `Object`.
    pub fn build(program: &Program) -> (Self, Vec<Diagnostic>) {
        let decls: Vec<&PrototypeDecl> = program.prototypes().collect();
        let (registry, diagnostics) = Self::build_from(&program.file, &decls);
        debug!(
            prototypes = registry.order.len(),
            user = decls.len(),
            errors = diagnostics.len(),
            "prototype registry built"
        );
        (registry, diagnostics)
    }

    fn build_from(file: &str, decls: &[&PrototypeDecl]) -> (Self, Vec<Diagnostic>) {
        let mut registry = Self::builtins();
        let mut diags = Vec::new();
        let mut user: Vec<String> = Vec::new();

        // Register declarations with their own members
        for decl in decls {
            if is_builtin_prototype(&decl.name) {
                diags.push(Diagnostic::new(
                    file,
                    decl.span,
                    codes::BUILTIN_REDECLARED,
                    format!("Prototype '{}' redeclares a built-in prototype", decl.name),
                ));
                continue;
            }
            if registry.contains(&decl.name) {
                diags.push(Diagnostic::new(
                    file,
                    decl.span,
                    codes::DUPLICATE_PROTOTYPE,
                    format!("Prototype '{}' is already declared", decl.name),
                ));
                continue;
            }
            let proto = Self::declare(file, decl, &mut diags);
            user.push(proto.name.clone());
            registry.insert(proto);
        }

        // Resolve parents
        for name in &user {
            let Some(parent) = registry.prototypes[name].parent.clone() else {
                continue;
            };
            let span = registry.prototypes[name].span;
            match registry.get(&parent).map(|p| p.sealed) {
                None => {
                    diags.push(Diagnostic::new(
                        file,
                        span,
                        codes::UNKNOWN_PARENT,
                        format!("Prototype '{}' extends unknown prototype '{}'", name, parent),
                    ));
                    registry.set_parent(name, OBJECT);
                }
                Some(true) => {
                    diags.push(Diagnostic::new(
                        file,
                        span,
                        codes::SEALED_INHERITANCE,
                        format!(
                            "Prototype '{}' cannot extend sealed prototype '{}'",
                            name, parent
                        ),
                    ));
                }
                Some(false) => {}
            }
        }

        // Reject cycles, breaking each one at the prototype that closes it
        for name in &user {
            if registry.closes_cycle(name) {
                let span = registry.prototypes[name].span;
                diags.push(Diagnostic::new(
                    file,
                    span,
                    codes::INHERITANCE_CYCLE,
                    format!("Inheritance chain of '{}' loops back to itself", name),
                ));
                registry.set_parent(name, OBJECT);
            }
        }

        // Shadowing and override compatibility against ancestors
        for name in &user {
            registry.check_inherited_members(file, name, &mut diags);
        }

        (registry, diags)
    }

    fn declare(file: &str, decl: &PrototypeDecl, diags: &mut Vec<Diagnostic>) -> Prototype {
        let mut proto = Prototype {
            name: decl.name.clone(),
            parent: Some(decl.parent.clone().unwrap_or_else(|| OBJECT.to_string())),
            sealed: decl.sealed,
            builtin: false,
            fields: Vec::new(),
            methods: Vec::new(),
            span: decl.span,
        };

        for field in &decl.fields {
            if proto.has_member(&field.name) {
                diags.push(Diagnostic::new(
                    file,
                    field.span,
                    codes::DUPLICATE_MEMBER,
                    format!("Duplicate member '{}' in prototype '{}'", field.name, decl.name),
                ));
                continue;
            }
            proto.fields.push(FieldInfo {
                name: field.name.clone(),
                ty: field.ty.clone(),
                is_const: field.is_const,
                has_init: field.init.is_some(),
                visibility: field.visibility,
                declared_in: decl.name.clone(),
            });
        }

        for method in &decl.methods {
            let func = &method.func;
            if proto.has_member(&func.name) {
                diags.push(Diagnostic::new(
                    file,
                    func.span,
                    codes::DUPLICATE_MEMBER,
                    format!("Duplicate member '{}' in prototype '{}'", func.name, decl.name),
                ));
                continue;
            }
            proto.methods.push(MethodInfo {
                name: func.name.clone(),
                params: func.params.iter().map(|p| p.ty.clone()).collect(),
                ret: func.return_type.clone(),
                visibility: method.visibility,
                declared_in: decl.name.clone(),
            });
        }

        proto
    }

    fn check_inherited_members(&self, file: &str, name: &str, diags: &mut Vec<Diagnostic>) {
        let Some(proto) = self.get(name) else {
            return;
        };
        let Some(parent) = proto.parent.as_deref() else {
            return;
        };

        for field in &proto.fields {
            if let Some(inherited) = self.lookup_field(parent, &field.name) {
                diags.push(Diagnostic::new(
                    file,
                    proto.span,
                    codes::FIELD_SHADOWS_ANCESTOR,
                    format!(
                        "Field '{}' of '{}' shadows the field declared in '{}'",
                        field.name, name, inherited.declared_in
                    ),
                ));
            }
        }

        for method in &proto.methods {
            let Some(base) = self.lookup_method(parent, &method.name) else {
                continue;
            };
            if base.visibility == Visibility::Public && method.visibility == Visibility::Internal {
                diags.push(Diagnostic::new(
                    file,
                    proto.span,
                    codes::OVERRIDE_VISIBILITY,
                    format!(
                        "Override '{}.{}' narrows public method of '{}' to internal",
                        name, method.name, base.declared_in
                    ),
                ));
            }
            let ret_ok = if method.name == "clone" {
                self.is_assignable(&method.ret, &base.ret)
            } else {
                method.ret == base.ret
            };
            if method.params != base.params || !ret_ok {
                diags.push(Diagnostic::new(
                    file,
                    proto.span,
                    codes::OVERRIDE_SIGNATURE,
                    format!(
                        "Override '{}.{}' does not match the signature declared in '{}'",
                        name, method.name, base.declared_in
                    ),
                ));
            }
        }
    }

    fn insert(&mut self, proto: Prototype) {
        self.order.push(proto.name.clone());
        self.prototypes.insert(proto.name.clone(), proto);
    }

    fn set_parent(&mut self, name: &str, parent: &str) {
        if let Some(proto) = self.prototypes.get_mut(name) {
            proto.parent = Some(parent.to_string());
        }
    }

    /// Whether following parents from `name` leads back to `name`
    fn closes_cycle(&self, name: &str) -> bool {
        let mut seen = FxHashSet::default();
        let mut current = self.get(name).and_then(|p| p.parent.as_deref());
        while let Some(n) = current {
            if n == name {
                return true;
            }
            if !seen.insert(n) {
                // A loop that does not pass through `name`
                return false;
            }
            current = self.get(n).and_then(|p| p.parent.as_deref());
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    /// Prototype names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// All prototypes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Prototype> {
        self.order.iter().filter_map(|n| self.prototypes.get(n))
    }

    pub fn user_prototypes(&self) -> impl Iterator<Item = &Prototype> {
        self.iter().filter(|p| !p.builtin)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stable numeric identity (registration index)
    pub fn proto_id(&self, name: &str) -> Option<u32> {
        self.order.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// `name` followed by its ancestors up to the root
    pub fn ancestors(&self, name: &str) -> Vec<&Prototype> {
        let mut chain: Vec<&Prototype> = Vec::new();
        let mut current = self.get(name);
        while let Some(proto) = current {
            if chain.iter().any(|p| p.name == proto.name) {
                break;
            }
            chain.push(proto);
            current = proto.parent.as_deref().and_then(|p| self.get(p));
        }
        chain
    }

    /// Field lookup walking toward the root, first match wins
    pub fn lookup_field(&self, proto: &str, field: &str) -> Option<&FieldInfo> {
        self.ancestors(proto).into_iter().find_map(|p| p.field(field))
    }

    /// Method lookup walking toward the root, first match wins
    pub fn lookup_method(&self, proto: &str, method: &str) -> Option<&MethodInfo> {
        self.ancestors(proto).into_iter().find_map(|p| p.method(method))
    }

    /// Every member name visible on `proto` (own and inherited)
    pub fn member_names(&self, proto: &str) -> Vec<&str> {
        let mut names = Vec::new();
        for p in self.ancestors(proto) {
            names.extend(p.fields.iter().map(|f| f.name.as_str()));
            names.extend(p.methods.iter().map(|m| m.name.as_str()));
        }
        names
    }

    /// Flattened field layout, root fields first
    pub fn layout(&self, proto: &str) -> Vec<&FieldInfo> {
        let mut chain = self.ancestors(proto);
        chain.reverse();
        chain.into_iter().flat_map(|p| p.fields.iter()).collect()
    }

    /// `child` is `ancestor` or inherits from it
    pub fn is_subtype(&self, child: &str, ancestor: &str) -> bool {
        self.ancestors(child).iter().any(|p| p.name == ancestor)
    }

    /// Value of type `from` may be stored where `to` is expected
    pub fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        if from == to {
            return true;
        }
        match (from.as_named(), to.as_named()) {
            (Some(f), Some(t)) => self.is_subtype(f, t),
            _ => false,
        }
    }

    /// `Exception` or one of its descendants
    pub fn is_exception(&self, name: &str) -> bool {
        self.is_subtype(name, EXCEPTION)
    }

    /// `proto` and every prototype inheriting from it, in registration order
    pub fn subtypes_of(&self, proto: &str) -> Vec<&Prototype> {
        self.iter().filter(|p| self.is_subtype(&p.name, proto)).collect()
    }

    /// Some strict descendant of `proto` redeclares `method`
    pub fn is_overridden_below(&self, proto: &str, method: &str) -> bool {
        self.subtypes_of(proto)
            .iter()
            .any(|p| p.name != proto && p.method(method).is_some())
    }

    /// Code from `accessor` (the prototype whose method is running, if any)
    /// may touch a member declared in `declared_in` with `visibility`
    pub fn can_access(
        &self,
        visibility: Visibility,
        declared_in: &str,
        accessor: Option<&str>,
    ) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Internal => accessor.is_some_and(|a| self.is_subtype(a, declared_in)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldDecl, FunctionDecl, Param};

    fn build(protos: Vec<PrototypeDecl>) -> (PrototypeRegistry, Vec<Diagnostic>) {
        let mut program = Program::new("test.ps");
        for p in protos {
            program = program.with_prototype(p);
        }
        PrototypeRegistry::build(&program)
    }

    fn codes_of(diags: &[Diagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.code.code).collect()
    }

    #[test]
    fn test_builtins_only() {
        let registry = PrototypeRegistry::builtins();
        assert!(registry.contains("Object"));
        assert!(registry.is_exception("DivideByZeroException"));
        assert!(registry.is_subtype("DivideByZeroException", "RuntimeException"));
        assert!(!registry.is_exception("File"));
        assert_eq!(registry.proto_id("Object"), Some(0));
    }

    #[test]
    fn test_lookup_walks_to_root() {
        let (registry, diags) = build(vec![PrototypeDecl::new("MyError")
            .with_parent("Exception")
            .with_field(FieldDecl::new("code", Type::int(), None))]);
        assert!(diags.is_empty());
        assert_eq!(
            registry.lookup_field("MyError", "message").unwrap().declared_in,
            "Exception"
        );
        assert!(registry.lookup_method("MyError", "clone").is_some());
        let layout: Vec<&str> = registry
            .layout("MyError")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(layout, vec!["message", "code"]);
    }

    #[test]
    fn test_builtin_redeclared() {
        let (_, diags) = build(vec![PrototypeDecl::new("Object")]);
        assert_eq!(codes_of(&diags), vec!["E3130"]);
    }

    #[test]
    fn test_duplicate_prototype_and_member() {
        let (registry, diags) = build(vec![
            PrototypeDecl::new("A")
                .with_field(FieldDecl::new("x", Type::int(), None))
                .with_field(FieldDecl::new("x", Type::float(), None)),
            PrototypeDecl::new("A"),
        ]);
        assert_eq!(codes_of(&diags), vec!["E3131", "E3137"]);
        assert_eq!(registry.get("A").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_sealed_inheritance_reported_once_on_child() {
        let (_, diags) = build(vec![
            PrototypeDecl::new("A").sealed().at(1, 1),
            PrototypeDecl::new("B").with_parent("A").at(2, 1),
        ]);
        assert_eq!(codes_of(&diags), vec!["E3140"]);
        assert_eq!(diags[0].line, 2);
        assert!(diags[0].message.contains("'B'"));
    }

    #[test]
    fn test_unknown_parent_falls_back_to_object() {
        let (registry, diags) = build(vec![PrototypeDecl::new("A").with_parent("Missing")]);
        assert_eq!(codes_of(&diags), vec!["E3133"]);
        assert_eq!(registry.get("A").unwrap().parent.as_deref(), Some("Object"));
    }

    #[test]
    fn test_cycle_rejected_and_broken() {
        let (registry, diags) = build(vec![
            PrototypeDecl::new("A").with_parent("B"),
            PrototypeDecl::new("B").with_parent("A"),
        ]);
        assert_eq!(codes_of(&diags), vec!["E3136"]);
        assert!(registry.is_subtype("B", "Object"));
        assert!(registry.is_subtype("A", "Object"));
    }

    #[test]
    fn test_field_shadowing() {
        let (_, diags) = build(vec![
            PrototypeDecl::new("A").with_field(FieldDecl::new("x", Type::int(), None)),
            PrototypeDecl::new("B")
                .with_parent("A")
                .with_field(FieldDecl::new("x", Type::int(), None)),
        ]);
        assert_eq!(codes_of(&diags), vec!["E3132"]);
    }

    #[test]
    fn test_override_rules() {
        let speak = |ret: Type| FunctionDecl::new("speak", vec![], ret, vec![]);
        let (_, diags) = build(vec![
            PrototypeDecl::new("A").with_method(speak(Type::string())),
            PrototypeDecl::new("B")
                .with_parent("A")
                .with_internal_method(speak(Type::string())),
            PrototypeDecl::new("C").with_parent("A").with_method(FunctionDecl::new(
                "speak",
                vec![Param::new("loud", Type::bool())],
                Type::string(),
                vec![],
            )),
        ]);
        assert_eq!(codes_of(&diags), vec!["E3134", "E3135"]);
    }

    #[test]
    fn test_clone_return_is_covariant() {
        let (registry, diags) = build(vec![PrototypeDecl::new("Point").with_method(
            FunctionDecl::new("clone", vec![], Type::named("Point"), vec![]),
        )]);
        assert!(diags.is_empty());
        assert!(registry.is_overridden_below("Object", "clone"));
        assert!(!registry.is_overridden_below("Point", "clone"));
    }

    #[test]
    fn test_internal_access() {
        let registry = PrototypeRegistry::builtins();
        assert!(registry.can_access(Visibility::Internal, "Exception", Some("IOException")));
        assert!(!registry.can_access(Visibility::Internal, "Exception", Some("File")));
        assert!(!registry.can_access(Visibility::Internal, "Exception", None));
    }
}
