//! C Generator Context
//!
//! Holds the state shared by every function of a module while it is turned
//! into one C translation unit: the container types in use, the external
//! entry points referenced, and the virtual dispatchers requested.

use super::ctypes::CTypes;
use super::emit::{c_string_literal, field_name, FunctionEmitter};
use super::index::{sanitize, MethodImpl, ModuleIndex};
use super::runtime::{PRELUDE, RUNTIME_HEADER};
use super::CodegenResult;
use crate::compiler::ir::IrModule;
use crate::types::{PrimitiveType, Type};
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// C name of the dispatcher for `proto.method`
pub fn dispatcher_name(proto: &str, method: &str) -> String {
    format!("psd_{}__{}", sanitize(proto), sanitize(method))
}

/// Generator that transforms an IR module into C source
pub struct CGenerator<'m> {
    index: ModuleIndex<'m>,
    ctypes: CTypes,
    /// `extern` declarations, in first-use order
    externs: Vec<String>,
    extern_names: FxHashSet<String>,
    /// `(proto, method)` pairs reached through a dispatcher
    dispatchers: Vec<(String, String)>,
    emit_prelude: bool,
}

impl<'m> CGenerator<'m> {
    pub fn new(module: &'m IrModule, emit_prelude: bool) -> Self {
        Self {
            index: ModuleIndex::new(module),
            ctypes: CTypes::new(),
            externs: Vec::new(),
            extern_names: FxHashSet::default(),
            dispatchers: Vec::new(),
            emit_prelude,
        }
    }

    pub fn index(&self) -> &ModuleIndex<'m> {
        &self.index
    }

    pub fn c_type(&mut self, ty: &Type) -> CodegenResult<String> {
        self.ctypes.c_type(ty)
    }

    pub fn declare_extern(&mut self, name: &str, ret: &str, params: &[String]) {
        if self.extern_names.insert(name.to_string()) {
            let params = if params.is_empty() {
                "void".to_string()
            } else {
                params.join(", ")
            };
            self.externs.push(format!("extern {} {}({});", ret, name, params));
        }
    }

    /// Name of the dispatcher for `proto.method`, generated on first request
    pub fn request_dispatcher(&mut self, proto: &str, method: &str) -> String {
        let key = (proto.to_string(), method.to_string());
        if !self.dispatchers.contains(&key) {
            self.dispatchers.push(key);
        }
        dispatcher_name(proto, method)
    }

    pub fn generate(mut self) -> CodegenResult<String> {
        let module = self.index.module();

        let mut signatures = Vec::with_capacity(module.functions.len());
        let mut bodies = Vec::with_capacity(module.functions.len());
        for func in &module.functions {
            signatures.push(FunctionEmitter::signature(&mut self, func)?);
            bodies.push(FunctionEmitter::new(&mut self, func)?.emit()?);
        }
        let (dispatch_decls, dispatch_bodies) = self.render_dispatchers()?;
        let structs = self.render_structs()?;
        let tables = self.render_tables()?;
        let defaults = self.render_defaults()?;
        let containers = self.ctypes.render()?;

        let mut out = String::new();
        let _ = writeln!(out, "/* generated from ProtoScript module `{}` */", module.name);
        if self.emit_prelude {
            out.push_str(PRELUDE);
        } else {
            let _ = writeln!(out, "#include \"{}\"", RUNTIME_HEADER);
        }
        let _ = writeln!(out);

        for proto in &module.prototypes {
            let name = sanitize(&proto.name);
            let _ = writeln!(out, "typedef struct ps_{} ps_{};", name, name);
        }
        let _ = writeln!(out);
        out.push_str(&containers);
        out.push_str(&structs);
        out.push_str(&tables);
        out.push_str(&defaults);

        for decl in &self.externs {
            let _ = writeln!(out, "{}", decl);
        }
        for signature in signatures.iter().chain(&dispatch_decls) {
            let _ = writeln!(out, "{};", signature);
        }
        let _ = writeln!(out);
        for body in dispatch_bodies.iter().chain(&bodies) {
            out.push_str(body);
            let _ = writeln!(out);
        }

        if let Some(main) = module.get_function("main").filter(|f| f.params.is_empty()) {
            let _ = writeln!(out, "int main(void) {{");
            match main.return_type.as_primitive() {
                Some(PrimitiveType::Void) => {
                    let _ = writeln!(out, "    psf_main();");
                    let _ = writeln!(out, "    return 0;");
                }
                Some(PrimitiveType::Int) => {
                    let _ = writeln!(out, "    return (int)psf_main();");
                }
                _ => {
                    let _ = writeln!(out, "    (void)psf_main();");
                    let _ = writeln!(out, "    return 0;");
                }
            }
            let _ = writeln!(out, "}}");
        }

        tracing::debug!(
            module = %module.name,
            functions = module.functions.len(),
            containers = self.ctypes.len(),
            dispatchers = self.dispatchers.len(),
            bytes = out.len(),
            "c module generated"
        );
        Ok(out)
    }

    fn render_structs(&mut self) -> CodegenResult<String> {
        let mut out = String::new();
        for proto in &self.index.module().prototypes {
            let _ = writeln!(out, "struct ps_{} {{", sanitize(&proto.name));
            let _ = writeln!(out, "    int32_t proto_id;");
            for field in &proto.fields {
                let c_type = self.ctypes.c_type(&field.ty)?;
                let _ = writeln!(out, "    {} {};", c_type, field_name(&field.name));
            }
            let _ = writeln!(out, "}};");
            let _ = writeln!(out);
        }
        Ok(out)
    }

    /// Parent, name and size tables indexed by prototype id, plus the
    /// helpers the prelude declares
    fn render_tables(&self) -> CodegenResult<String> {
        let module = self.index.module();
        let count = module
            .prototypes
            .iter()
            .map(|p| p.proto_id as usize + 1)
            .max()
            .unwrap_or(0)
            .max(1);
        let mut parents = vec!["-1".to_string(); count];
        let mut names = vec!["\"?\"".to_string(); count];
        let mut sizes = vec!["sizeof(ps_header)".to_string(); count];
        for proto in &module.prototypes {
            let id = proto.proto_id as usize;
            if let Some(parent) = proto.parent.as_deref() {
                parents[id] = self.index.prototype(parent)?.proto_id.to_string();
            }
            names[id] = c_string_literal(&proto.name);
            sizes[id] = format!("sizeof(ps_{})", sanitize(&proto.name));
        }

        let mut out = String::new();
        let _ = writeln!(out, "static const int32_t ps_proto_parents[{}] = {{ {} }};", count, parents.join(", "));
        let _ = writeln!(out, "static const char* const ps_proto_names[{}] = {{ {} }};", count, names.join(", "));
        let _ = writeln!(out, "static const size_t ps_proto_sizes[{}] = {{ {} }};", count, sizes.join(", "));
        let _ = writeln!(out);
        let _ = writeln!(out, "static const char* ps_proto_name(int32_t id) {{");
        let _ = writeln!(out, "    return id >= 0 && id < {} ? ps_proto_names[id] : \"?\";", count);
        let _ = writeln!(out, "}}");
        let _ = writeln!(out, "static bool ps_instance_of(void* object, int32_t proto_id) {{");
        let _ = writeln!(out, "    int32_t id = object ? ((ps_header*)object)->proto_id : -1;");
        let _ = writeln!(out, "    while (id >= 0 && id < {}) {{", count);
        let _ = writeln!(out, "        if (id == proto_id) return true;");
        let _ = writeln!(out, "        id = ps_proto_parents[id];");
        let _ = writeln!(out, "    }}");
        let _ = writeln!(out, "    return false;");
        let _ = writeln!(out, "}}");
        let _ = writeln!(out);
        Ok(out)
    }

    /// Bodies of the built-in `Object` and `Exception` methods
    fn render_defaults(&self) -> CodegenResult<String> {
        let mut out = String::new();
        if self.index.has_prototype("Object") {
            let _ = writeln!(out, "static ps_Object* psm_Object__clone(ps_Object* self) {{");
            let _ = writeln!(out, "    size_t size = ps_proto_sizes[self->proto_id];");
            let _ = writeln!(out, "    ps_Object* copy = ps_alloc(size);");
            let _ = writeln!(out, "    memcpy(copy, self, size);");
            let _ = writeln!(out, "    return copy;");
            let _ = writeln!(out, "}}");
            let _ = writeln!(out, "static ps_str psm_Object__toString(ps_Object* self) {{");
            let _ = writeln!(out, "    return ps_proto_name(self->proto_id);");
            let _ = writeln!(out, "}}");
        }

        let message = self.index.has_prototype("Exception")
            && self.index.field_type("Exception", "message").is_ok_and(Type::is_string);
        if self.index.has_prototype("Exception") {
            let _ = writeln!(out, "static ps_str psm_Exception__getMessage(ps_Exception* self) {{");
            if message {
                let _ = writeln!(out, "    return self->f_message;");
            } else {
                let _ = writeln!(out, "    (void)self;");
                let _ = writeln!(out, "    return \"\";");
            }
            let _ = writeln!(out, "}}");
        }
        let _ = writeln!(out, "static const char* ps_exception_message(void* exception) {{");
        if message {
            let _ = writeln!(out, "    return ((ps_Exception*)exception)->f_message;");
        } else {
            let _ = writeln!(out, "    (void)exception;");
            let _ = writeln!(out, "    return \"\";");
        }
        let _ = writeln!(out, "}}");
        let _ = writeln!(out);
        Ok(out)
    }

    /// Switch on the receiver's prototype id; prototypes that inherit the
    /// base body fall to `default`
    fn render_dispatchers(&mut self) -> CodegenResult<(Vec<String>, Vec<String>)> {
        let mut decls = Vec::new();
        let mut bodies = Vec::new();
        for (proto, method) in self.dispatchers.clone() {
            let base = self.index.require_method(&proto, &method)?;
            let ret = base.return_type();
            let ret_c = self.c_type(&ret)?;
            let receiver_c = self.c_type(&Type::named(proto.clone()))?;

            let mut params = vec![format!("{} self", receiver_c)];
            let mut args = Vec::new();
            for (i, ty) in base.param_types().iter().enumerate().skip(1) {
                params.push(format!("{} a{}", self.c_type(ty)?, i));
                args.push(format!("a{}", i));
            }
            let signature = format!(
                "static {} {}({})",
                ret_c,
                dispatcher_name(&proto, &method),
                params.join(", ")
            );

            let mut body = String::new();
            let _ = writeln!(body, "{} {{", signature);
            let _ = writeln!(body, "    switch (self->proto_id) {{");
            let base_name = base.c_name();
            for sub in self.index.strict_subtypes(&proto) {
                let imp = self.index.require_method(&sub.name, &method)?;
                if imp.c_name() == base_name {
                    continue;
                }
                let call = self.dispatch_call(imp, &ret, &args)?;
                let _ = writeln!(body, "    case {}: {}", sub.proto_id, call);
            }
            let call = self.dispatch_call(base, &ret, &args)?;
            let _ = writeln!(body, "    default: {}", call);
            let _ = writeln!(body, "    }}");
            let _ = writeln!(body, "}}");

            decls.push(signature);
            bodies.push(body);
        }
        Ok((decls, bodies))
    }

    fn dispatch_call(&mut self, imp: MethodImpl<'m>, ret: &Type, args: &[String]) -> CodegenResult<String> {
        let receiver = imp
            .param_types()
            .first()
            .cloned()
            .unwrap_or_else(|| Type::named("Object"));
        let receiver_c = self.c_type(&receiver)?;
        let mut call_args = vec![format!("({})self", receiver_c)];
        call_args.extend(args.iter().cloned());
        let call = format!("{}({})", imp.c_name(), call_args.join(", "));
        if ret.is_void() {
            Ok(format!("{}; return;", call))
        } else if imp.return_type() != *ret && ret.as_named().is_some() {
            Ok(format!("return ({}){};", self.c_type(ret)?, call))
        } else {
            Ok(format!("return {};", call))
        }
    }
}
