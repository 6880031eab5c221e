//! C spellings of ProtoScript types
//!
//! Scalars map to fixed-width C types and prototypes to struct pointers.
//! Every distinct container type gets its own struct, synthesized on first
//! use together with its helpers: `{ptr,len,cap}` lists behind a pointer,
//! `{ptr,len}` views and slices by value, and maps as parallel key/value
//! arrays searched linearly.

use super::index::sanitize;
use super::{CodegenError, CodegenResult};
use crate::types::{GenericKind, PrimitiveType, Type};
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// Container types in dependency order (element types first)
#[derive(Debug, Default)]
pub struct CTypes {
    order: Vec<Type>,
    seen: FxHashSet<Type>,
}

impl CTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// C type of `ty`, registering any container it mentions
    pub fn c_type(&mut self, ty: &Type) -> CodegenResult<String> {
        match ty {
            Type::Primitive(p) => Ok(primitive_c_type(*p).to_string()),
            Type::Named(name) => Ok(format!("ps_{}*", sanitize(name))),
            Type::Generic { kind, args } => {
                for arg in args {
                    if arg.contains_void() {
                        return Err(CodegenError::UnsupportedType {
                            ty: ty.to_string(),
                        });
                    }
                    self.c_type(arg)?;
                }
                if self.seen.insert(ty.clone()) {
                    self.order.push(ty.clone());
                }
                let name = container_name(ty);
                Ok(match kind {
                    GenericKind::List | GenericKind::Map => format!("{}*", name),
                    GenericKind::View | GenericKind::Slice => name,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Struct definitions and helpers of every registered container
    pub fn render(&self) -> CodegenResult<String> {
        let mut out = String::new();
        for ty in &self.order {
            let Type::Generic { kind, args } = ty else {
                continue;
            };
            let name = container_name(ty);
            let mut scratch = CTypes::new();
            match kind {
                GenericKind::List => {
                    let elem = scratch.c_type(&args[0])?;
                    render_list(&mut out, &name, &elem);
                }
                GenericKind::View | GenericKind::Slice => {
                    let elem = scratch.c_type(&args[0])?;
                    let _ = writeln!(out, "typedef struct {} {{ {}* ptr; int64_t len; }} {};", name, elem, name);
                    let _ = writeln!(out);
                }
                GenericKind::Map => {
                    let key = scratch.c_type(&args[0])?;
                    let value = scratch.c_type(&args[1])?;
                    let eq = if args[0].is_string() { "ps_str_eq(m->keys[i], k)" } else { "m->keys[i] == k" };
                    render_map(&mut out, &name, &key, &value, eq);
                }
            }
        }
        Ok(out)
    }
}

fn primitive_c_type(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Bool => "bool",
        PrimitiveType::Byte => "uint8_t",
        PrimitiveType::Int => "int64_t",
        PrimitiveType::Float => "double",
        PrimitiveType::Glyph => "uint32_t",
        PrimitiveType::String => "ps_str",
        PrimitiveType::Void => "void",
    }
}

/// Struct name of a container type, e.g. `ps_map_string_list_int`
pub fn container_name(ty: &Type) -> String {
    format!("ps_{}", mangle(ty))
}

/// Unambiguous identifier fragment for a type: prefix notation over fixed
/// arities, prototype names length-prefixed
pub fn mangle(ty: &Type) -> String {
    match ty {
        Type::Primitive(p) => p.name().to_string(),
        Type::Named(name) => {
            let name = sanitize(name);
            format!("o{}{}", name.len(), name)
        }
        Type::Generic { kind, args } => {
            let mut out = kind.name().to_string();
            for arg in args {
                out.push('_');
                out.push_str(&mangle(arg));
            }
            out
        }
    }
}

fn render_list(out: &mut String, name: &str, elem: &str) {
    let _ = writeln!(out, "typedef struct {} {{ {}* ptr; int64_t len; int64_t cap; }} {};", name, elem, name);
    let _ = writeln!(out, "static {n}* {n}_new(void) {{", n = name);
    let _ = writeln!(out, "    {n}* l = ps_alloc(sizeof({n}));", n = name);
    let _ = writeln!(out, "    l->cap = 4;");
    let _ = writeln!(out, "    l->ptr = ps_alloc(sizeof({}) * 4);", elem);
    let _ = writeln!(out, "    return l;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static void {n}_push({n}* l, {e} v) {{", n = name, e = elem);
    let _ = writeln!(out, "    if (l->len == l->cap) {{");
    let _ = writeln!(out, "        l->cap *= 2;");
    let _ = writeln!(out, "        l->ptr = ps_realloc(l->ptr, sizeof({}) * (size_t)l->cap);", elem);
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    l->ptr[l->len++] = v;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static {e} {n}_pop({n}* l) {{", n = name, e = elem);
    let _ = writeln!(out, "    if (l->len == 0) ps_fail(\"R1005\", \"pop from an empty list\");");
    let _ = writeln!(out, "    return l->ptr[--l->len];");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
}

fn render_map(out: &mut String, name: &str, key: &str, value: &str, eq: &str) {
    let _ = writeln!(
        out,
        "typedef struct {n} {{ {k}* keys; {v}* values; int64_t len; int64_t cap; }} {n};",
        n = name,
        k = key,
        v = value
    );
    let _ = writeln!(out, "static {n}* {n}_new(void) {{", n = name);
    let _ = writeln!(out, "    {n}* m = ps_alloc(sizeof({n}));", n = name);
    let _ = writeln!(out, "    m->cap = 4;");
    let _ = writeln!(out, "    m->keys = ps_alloc(sizeof({}) * 4);", key);
    let _ = writeln!(out, "    m->values = ps_alloc(sizeof({}) * 4);", value);
    let _ = writeln!(out, "    return m;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static int64_t {n}_find({n}* m, {k} k) {{", n = name, k = key);
    let _ = writeln!(out, "    for (int64_t i = 0; i < m->len; i++) {{");
    let _ = writeln!(out, "        if ({}) return i;", eq);
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    return -1;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static bool {n}_has({n}* m, {k} k) {{ return {n}_find(m, k) >= 0; }}", n = name, k = key);
    let _ = writeln!(out, "static {v} {n}_get({n}* m, {k} k) {{", n = name, k = key, v = value);
    let _ = writeln!(out, "    int64_t i = {}_find(m, k);", name);
    let _ = writeln!(out, "    if (i < 0) ps_fail(\"R1006\", \"missing map key\");");
    let _ = writeln!(out, "    return m->values[i];");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static void {n}_set({n}* m, {k} k, {v} v) {{", n = name, k = key, v = value);
    let _ = writeln!(out, "    int64_t i = {}_find(m, k);", name);
    let _ = writeln!(out, "    if (i >= 0) {{");
    let _ = writeln!(out, "        m->values[i] = v;");
    let _ = writeln!(out, "        return;");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    if (m->len == m->cap) {{");
    let _ = writeln!(out, "        m->cap *= 2;");
    let _ = writeln!(out, "        m->keys = ps_realloc(m->keys, sizeof({}) * (size_t)m->cap);", key);
    let _ = writeln!(out, "        m->values = ps_realloc(m->values, sizeof({}) * (size_t)m->cap);", value);
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    m->keys[m->len] = k;");
    let _ = writeln!(out, "    m->values[m->len] = v;");
    let _ = writeln!(out, "    m->len++;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "static void {n}_remove({n}* m, {k} k) {{", n = name, k = key);
    let _ = writeln!(out, "    int64_t i = {}_find(m, k);", name);
    let _ = writeln!(out, "    if (i < 0) return;");
    let _ = writeln!(out, "    size_t tail = (size_t)(m->len - i - 1);");
    let _ = writeln!(out, "    memmove(&m->keys[i], &m->keys[i + 1], sizeof({}) * tail);", key);
    let _ = writeln!(out, "    memmove(&m->values[i], &m->values[i + 1], sizeof({}) * tail);", value);
    let _ = writeln!(out, "    m->len--;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_and_prototype_types() {
        let mut types = CTypes::new();
        assert_eq!(types.c_type(&Type::int()).unwrap(), "int64_t");
        assert_eq!(types.c_type(&Type::glyph()).unwrap(), "uint32_t");
        assert_eq!(types.c_type(&Type::named("Point")).unwrap(), "ps_Point*");
        assert!(types.is_empty());
    }

    #[test]
    fn test_containers_register_elements_first() {
        let mut types = CTypes::new();
        let ty = Type::map(Type::string(), Type::list(Type::int()));
        assert_eq!(types.c_type(&ty).unwrap(), "ps_map_string_list_int*");
        assert_eq!(types.c_type(&Type::view(Type::int())).unwrap(), "ps_view_int");
        assert_eq!(types.len(), 3);

        let rendered = types.render().unwrap();
        let list = rendered.find("typedef struct ps_list_int").unwrap();
        let map = rendered.find("typedef struct ps_map_string_list_int").unwrap();
        assert!(list < map);
        assert!(rendered.contains("ps_str_eq(m->keys[i], k)"));
        assert!(rendered.contains("typedef struct ps_view_int { int64_t* ptr; int64_t len; } ps_view_int;"));
    }

    #[test]
    fn test_mangling_is_unambiguous() {
        assert_eq!(mangle(&Type::list(Type::named("Point"))), "list_o5Point");
        assert_ne!(
            mangle(&Type::map(Type::int(), Type::list(Type::int()))),
            mangle(&Type::list(Type::map(Type::int(), Type::int())))
        );
    }

    #[test]
    fn test_void_elements_are_rejected() {
        let mut types = CTypes::new();
        assert!(matches!(
            types.c_type(&Type::list(Type::void())),
            Err(CodegenError::UnsupportedType { .. })
        ));
    }
}
