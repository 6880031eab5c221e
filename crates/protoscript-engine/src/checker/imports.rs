//! Import resolution
//!
//! Runs once, before the main pass, against the module registry. Produces
//! the namespaces and directly imported members visible to the program.

use super::error::{codes, Diagnostic};
use super::modules::{ModuleConstant, ModuleLookup, ModuleValue};
use super::suggest::suggest;
use crate::ast::Import;
use crate::compiler::const_eval::ConstEnv;
use crate::compiler::ir::IrConstant;
use crate::types::PrimitiveType;
use rustc_hash::FxHashMap;

/// Names brought into scope by `import` declarations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportScope {
    /// Visible namespace name (module or alias) -> module
    namespaces: FxHashMap<String, String>,
    /// Directly imported member -> (module, member)
    members: FxHashMap<String, (String, String)>,
}

impl ImportScope {
    /// Module behind a visible namespace name
    pub fn namespace(&self, name: &str) -> Option<&str> {
        self.namespaces.get(name).map(String::as_str)
    }

    /// `(module, member)` behind a directly imported name
    pub fn member(&self, name: &str) -> Option<(&str, &str)> {
        self.members
            .get(name)
            .map(|(m, n)| (m.as_str(), n.as_str()))
    }

    pub fn namespace_names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Every imported constant, keyed the way expressions spell it
    /// (`ns.NAME` for namespaces, bare `NAME` for direct imports)
    pub fn constants(&self, modules: &dyn ModuleLookup) -> ConstEnv {
        let mut env = ConstEnv::default();
        for (alias, module) in &self.namespaces {
            for name in modules.member_names(module) {
                if let Some(value) = modules.constant(module, name).and_then(constant_value) {
                    env.insert(format!("{}.{}", alias, name), value);
                }
            }
        }
        for (local, (module, name)) in &self.members {
            if let Some(value) = modules.constant(module, name).and_then(constant_value) {
                env.insert(local.clone(), value);
            }
        }
        env
    }
}

/// Resolve every import against `modules`
pub fn resolve_imports(
    file: &str,
    imports: &[Import],
    modules: &dyn ModuleLookup,
) -> (ImportScope, Vec<Diagnostic>) {
    let mut scope = ImportScope::default();
    let mut diagnostics = Vec::new();

    for import in imports {
        if !modules.has_module(&import.module) {
            diagnostics.push(
                Diagnostic::new(
                    file,
                    import.span,
                    codes::UNKNOWN_MODULE,
                    format!("Cannot find module '{}'", import.module),
                )
                .with_suggestions(suggest(&import.module, modules.module_names())),
            );
            continue;
        }

        if import.names.is_empty() {
            let visible = import.namespace_name();
            if scope.namespaces.contains_key(visible) || scope.members.contains_key(visible) {
                diagnostics.push(Diagnostic::new(
                    file,
                    import.span,
                    codes::DUPLICATE_IMPORT,
                    format!("'{}' is already imported", visible),
                ));
                continue;
            }
            scope
                .namespaces
                .insert(visible.to_string(), import.module.clone());
            continue;
        }

        for name in &import.names {
            let exists = modules.function(&import.module, name).is_some()
                || modules.constant(&import.module, name).is_some();
            if !exists {
                diagnostics.push(
                    Diagnostic::new(
                        file,
                        import.span,
                        codes::UNKNOWN_IMPORT,
                        format!("Module '{}' has no member '{}'", import.module, name),
                    )
                    .with_suggestions(suggest(name, modules.member_names(&import.module))),
                );
                continue;
            }
            if scope.members.contains_key(name) || scope.namespaces.contains_key(name) {
                diagnostics.push(Diagnostic::new(
                    file,
                    import.span,
                    codes::DUPLICATE_IMPORT,
                    format!("'{}' is already imported", name),
                ));
                continue;
            }
            scope
                .members
                .insert(name.clone(), (import.module.clone(), name.clone()));
        }
    }

    (scope, diagnostics)
}

/// Compile-time value of a module constant, converted to its declared type
pub fn constant_value(constant: &ModuleConstant) -> Option<IrConstant> {
    let primitive = constant.ty.as_primitive()?;
    match (&constant.value, primitive) {
        (ModuleValue::Bool(b), PrimitiveType::Bool) => Some(IrConstant::Bool(*b)),
        (ModuleValue::Int(i), PrimitiveType::Int) => Some(IrConstant::Int(*i)),
        (ModuleValue::Int(i), PrimitiveType::Byte) => u8::try_from(*i).ok().map(IrConstant::Byte),
        (ModuleValue::Int(i), PrimitiveType::Float) => Some(IrConstant::Float(*i as f64)),
        (ModuleValue::Float(f), PrimitiveType::Float) => Some(IrConstant::Float(*f)),
        (ModuleValue::Text(s), PrimitiveType::String) => Some(IrConstant::Str(s.clone())),
        (ModuleValue::Text(s), PrimitiveType::Glyph) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(IrConstant::Glyph(c)),
                _ => None,
            }
        }
        _ => None,
    }
}
