//! Per-function C emission
//!
//! Every temp and variable is hoisted to the top of the C function, typed
//! by [`infer_function`]. Blocks become `goto` labels named after their IR
//! labels. Functions that install exception handlers declare their locals
//! `volatile` so values survive the `longjmp` into the handler.

use super::context::CGenerator;
use super::ctypes::container_name;
use super::index::{c_function_name, sanitize};
use super::infer::{infer_function, FunctionTypes};
use super::{CodegenError, CodegenResult};
use crate::ast::{BinaryOp, UnaryOp};
use crate::compiler::ir::{IrConstant, IrFunction, IrInstr, IterKind, Temp, Terminator};
use crate::types::{GenericKind, PrimitiveType, Type};
use std::fmt::Write;

pub(super) fn temp_name(temp: Temp) -> String {
    format!("t{}", temp.0)
}

pub(super) fn var_name(name: &str) -> String {
    format!("v_{}", sanitize(name))
}

pub(super) fn label_name(label: &str) -> String {
    format!("L_{}", sanitize(label))
}

pub(super) fn field_name(field: &str) -> String {
    format!("f_{}", sanitize(field))
}

/// C initializer for a hoisted local of type `ty`
pub(super) fn zero_value(ty: &Type) -> &'static str {
    match ty {
        Type::Primitive(PrimitiveType::Bool) => "false",
        Type::Primitive(PrimitiveType::String) => "\"\"",
        Type::Primitive(_) => "0",
        Type::Named(_) => "NULL",
        Type::Generic { kind, .. } => match kind {
            GenericKind::List | GenericKind::Map => "NULL",
            GenericKind::View | GenericKind::Slice => "{0}",
        },
    }
}

pub(super) fn c_constant(value: &IrConstant) -> String {
    match value {
        IrConstant::Bool(b) => b.to_string(),
        IrConstant::Byte(v) => format!("((uint8_t){})", v),
        IrConstant::Int(v) if *v == i64::MIN => "INT64_MIN".to_string(),
        IrConstant::Int(v) => format!("INT64_C({})", v),
        IrConstant::Float(v) if v.is_nan() => "NAN".to_string(),
        IrConstant::Float(v) if v.is_infinite() => {
            if *v > 0.0 { "INFINITY".to_string() } else { "(-INFINITY)".to_string() }
        }
        IrConstant::Float(v) => format!("{:?}", v),
        IrConstant::Glyph(c) => format!("UINT32_C({})", *c as u32),
        IrConstant::Str(s) => c_string_literal(s),
    }
}

/// Double-quoted C literal; bytes outside printable ASCII become octal escapes
pub(super) fn c_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for byte in s.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'?' => out.push_str("\\?"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{:03o}", byte);
            }
        }
    }
    out.push('"');
    out
}

fn c_operator(op: BinaryOp) -> &'static str {
    match op {
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
    }
}

pub(super) struct FunctionEmitter<'g, 'm> {
    gen: &'g mut CGenerator<'m>,
    func: &'m IrFunction,
    types: FunctionTypes,
    body: String,
    /// `ps_handler` slots, one per `setup_try`
    try_slots: usize,
}

impl<'g, 'm> FunctionEmitter<'g, 'm> {
    pub(super) fn new(gen: &'g mut CGenerator<'m>, func: &'m IrFunction) -> CodegenResult<Self> {
        let types = infer_function(func, gen.index())?;
        Ok(Self {
            gen,
            func,
            types,
            body: String::new(),
            try_slots: 0,
        })
    }

    /// `static RET name(PARAMS)`
    pub(super) fn signature(gen: &mut CGenerator<'m>, func: &IrFunction) -> CodegenResult<String> {
        let ret = gen.c_type(&func.return_type)?;
        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            params.push(format!("{} {}", gen.c_type(&param.ty)?, var_name(&param.name)));
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        Ok(format!("static {} {}({})", ret, c_function_name(&func.name), params))
    }

    /// Full C definition of the function
    pub(super) fn emit(mut self) -> CodegenResult<String> {
        let func = self.func;
        let signature = Self::signature(self.gen, func)?;
        for block in &func.blocks {
            let _ = writeln!(self.body, "{}:;", label_name(&block.label));
            for instr in &block.instructions {
                self.emit_instr(instr)?;
            }
            self.emit_terminator(&block.terminator)?;
        }

        let qualifier = if self.try_slots > 0 { " volatile" } else { "" };
        let mut out = String::new();
        let _ = writeln!(out, "{} {{", signature);

        let mut temps: Vec<(&Temp, &Type)> = self.types.temps.iter().collect();
        temps.sort_by_key(|(t, _)| **t);
        for (temp, ty) in temps {
            let c_type = self.gen.c_type(ty)?;
            let _ = writeln!(out, "    {}{} {} = {};", c_type, qualifier, temp_name(*temp), zero_value(ty));
        }
        let mut iterators: Vec<&Temp> = self.types.iterators.keys().collect();
        iterators.sort();
        for temp in iterators {
            let _ = writeln!(out, "    int64_t{} {} = 0;", qualifier, temp_name(*temp));
        }
        let mut vars: Vec<(&String, &Type)> = self
            .types
            .vars
            .iter()
            .filter(|(name, _)| !func.is_param(name))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        for (name, ty) in vars {
            let c_type = self.gen.c_type(ty)?;
            let _ = writeln!(out, "    {}{} {} = {};", c_type, qualifier, var_name(name), zero_value(ty));
        }
        for slot in 0..self.try_slots {
            let _ = writeln!(out, "    ps_handler ps_try{};", slot);
        }

        out.push_str(&self.body);
        let _ = writeln!(out, "}}");
        Ok(out)
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.body, "    {}", text.as_ref());
    }

    fn ty(&self, temp: Temp) -> CodegenResult<Type> {
        self.types.temp(&self.func.name, temp).cloned()
    }

    fn unsupported(&self, op: &'static str, ty: &Type) -> CodegenError {
        CodegenError::Unsupported {
            function: self.func.name.clone(),
            op,
            ty: ty.to_string(),
        }
    }

    /// `value` converted for a slot of type `to` (prototype pointers only)
    fn coerce(&mut self, value: String, from: &Type, to: &Type) -> CodegenResult<String> {
        if from != to && to.as_named().is_some() {
            Ok(format!("({})({})", self.gen.c_type(to)?, value))
        } else {
            Ok(value)
        }
    }

    fn coerce_temp(&mut self, temp: Temp, to: &Type) -> CodegenResult<String> {
        let from = self.ty(temp)?;
        self.coerce(temp_name(temp), &from, to)
    }

    /// Length of a container or string held in `object`
    fn length_of(&self, object: &str, ty: &Type) -> CodegenResult<String> {
        match ty.generic_kind() {
            Some(GenericKind::List) | Some(GenericKind::Map) => Ok(format!("{}->len", object)),
            Some(GenericKind::View) | Some(GenericKind::Slice) => Ok(format!("{}.len", object)),
            None if ty.is_string() => Ok(format!("ps_str_len({})", object)),
            None => Err(self.unsupported("length", ty)),
        }
    }

    fn assign(&mut self, dest: Temp, value: impl AsRef<str>) {
        self.line(format!("{} = {};", temp_name(dest), value.as_ref()));
    }

    fn emit_instr(&mut self, instr: &IrInstr) -> CodegenResult<()> {
        match instr {
            IrInstr::Const { dest, value } => self.assign(*dest, c_constant(value)),
            IrInstr::Copy { dest, src } => {
                let to = self.ty(*dest)?;
                let value = self.coerce_temp(*src, &to)?;
                self.assign(*dest, value);
            }
            IrInstr::VarDecl { .. } => {}
            IrInstr::LoadVar { dest, name } => self.assign(*dest, var_name(name)),
            IrInstr::StoreVar { name, src } => {
                let to = self.types.var(&self.func.name, name)?.clone();
                let value = self.coerce_temp(*src, &to)?;
                self.line(format!("{} = {};", var_name(name), value));
            }
            IrInstr::BinOp {
                dest,
                op,
                left,
                right,
            } => {
                let ty = self.ty(*left)?;
                let value = self.binary(*op, &temp_name(*left), &temp_name(*right), &ty)?;
                self.assign(*dest, value);
            }
            IrInstr::UnaryOp { dest, op, operand } => {
                let ty = self.ty(*operand)?;
                let x = temp_name(*operand);
                let value = match (op, ty.as_primitive()) {
                    (UnaryOp::Not, _) => format!("!{}", x),
                    (UnaryOp::Neg, Some(PrimitiveType::Byte)) => format!("(uint8_t)(0 - {})", x),
                    (UnaryOp::Neg, _) => format!("-{}", x),
                    (UnaryOp::BitNot, Some(PrimitiveType::Byte)) => format!("(uint8_t)~{}", x),
                    (UnaryOp::BitNot, _) => format!("~{}", x),
                };
                self.assign(*dest, value);
            }
            IrInstr::Select {
                dest,
                cond,
                then_val,
                else_val,
            } => {
                let to = self.ty(*dest)?;
                let a = self.coerce_temp(*then_val, &to)?;
                let b = self.coerce_temp(*else_val, &to)?;
                self.assign(*dest, format!("{} ? {} : {}", temp_name(*cond), a, b));
            }
            IrInstr::Cast { dest, src, target } => {
                let from = self.ty(*src)?;
                let value = self.cast(&temp_name(*src), &from, target)?;
                self.assign(*dest, value);
            }
            IrInstr::CallStatic { dest, func, args } => {
                let callee = self.gen.index().function(func).ok_or_else(|| CodegenError::UnknownFunction {
                    function: self.func.name.clone(),
                    callee: func.clone(),
                })?;
                let params: Vec<Type> = callee.params.iter().map(|p| p.ty.clone()).collect();
                let args = self.call_args(args, &params)?;
                let call = format!("{}({})", c_function_name(func), args.join(", "));
                self.finish_call(*dest, call, &callee.return_type)?;
            }
            IrInstr::CallMethod {
                dest,
                receiver,
                proto,
                method,
                args,
            } => {
                let base = self.gen.index().require_method(proto, method)?;
                let params = base.param_types();
                let (name, receiver_ty) = if self.gen.index().needs_dispatch(proto, method) {
                    (self.gen.request_dispatcher(proto, method), Type::named(proto.clone()))
                } else {
                    let receiver_ty = params.first().cloned().unwrap_or_else(|| Type::named(proto.clone()));
                    (base.c_name(), receiver_ty)
                };
                let mut lowered = vec![self.coerce_temp(*receiver, &receiver_ty)?];
                lowered.extend(self.call_args(args, params.get(1..).unwrap_or_default())?);
                let call = format!("{}({})", name, lowered.join(", "));
                self.finish_call(*dest, call, &base.return_type())?;
            }
            IrInstr::CallExtern {
                dest,
                module,
                func,
                args,
                ret,
            } => {
                let name = format!("psx_{}_{}", sanitize(module), sanitize(func));
                let mut param_types = Vec::with_capacity(args.len());
                for arg in args {
                    let ty = self.ty(*arg)?;
                    param_types.push(self.gen.c_type(&ty)?);
                }
                let ret_c = self.gen.c_type(ret)?;
                self.gen.declare_extern(&name, &ret_c, &param_types);
                let args: Vec<String> = args.iter().map(|a| temp_name(*a)).collect();
                let call = format!("{}({})", name, args.join(", "));
                self.finish_call(*dest, call, ret)?;
            }
            IrInstr::NewObject { dest, proto } => self.new_object(*dest, proto)?,
            IrInstr::CloneObject { dest, src, proto } => {
                self.gen.index().prototype("Object")?;
                let c_type = self.gen.c_type(&Type::named(proto.clone()))?;
                self.assign(
                    *dest,
                    format!("({})psm_Object__clone((ps_Object*){})", c_type, temp_name(*src)),
                );
            }
            IrInstr::FieldGet {
                dest,
                object,
                proto,
                field,
            } => {
                self.gen.index().field_type(proto, field)?;
                let c_type = self.gen.c_type(&Type::named(proto.clone()))?;
                self.assign(
                    *dest,
                    format!("(({}){})->{}", c_type, temp_name(*object), field_name(field)),
                );
            }
            IrInstr::FieldSet {
                object,
                proto,
                field,
                value,
            } => {
                let field_ty = self.gen.index().field_type(proto, field)?.clone();
                let c_type = self.gen.c_type(&Type::named(proto.clone()))?;
                let value = self.coerce_temp(*value, &field_ty)?;
                self.line(format!(
                    "(({}){})->{} = {};",
                    c_type,
                    temp_name(*object),
                    field_name(field),
                    value
                ));
            }
            IrInstr::IndexGet { dest, object, index } => {
                let ty = self.ty(*object)?;
                let (o, i) = (temp_name(*object), temp_name(*index));
                let value = match ty.generic_kind() {
                    Some(GenericKind::List) => format!("{}->ptr[{}]", o, i),
                    Some(GenericKind::View) | Some(GenericKind::Slice) => format!("{}.ptr[{}]", o, i),
                    Some(GenericKind::Map) => {
                        self.gen.c_type(&ty)?;
                        format!("{}_get({}, {})", container_name(&ty), o, i)
                    }
                    None if ty.is_string() => format!("ps_str_at({}, {})", o, i),
                    None => return Err(self.unsupported("index_get", &ty)),
                };
                self.assign(*dest, value);
            }
            IrInstr::IndexSet {
                object,
                index,
                value,
            } => {
                let ty = self.ty(*object)?;
                let elem = ty.element_type().unwrap_or_else(Type::void);
                let v = self.coerce_temp(*value, &elem)?;
                let (o, i) = (temp_name(*object), temp_name(*index));
                match ty.generic_kind() {
                    Some(GenericKind::List) => self.line(format!("{}->ptr[{}] = {};", o, i, v)),
                    Some(GenericKind::Slice) => self.line(format!("{}.ptr[{}] = {};", o, i, v)),
                    Some(GenericKind::Map) => {
                        self.gen.c_type(&ty)?;
                        self.line(format!("{}_set({}, {}, {});", container_name(&ty), o, i, v));
                    }
                    _ => return Err(self.unsupported("index_set", &ty)),
                }
            }
            IrInstr::MakeList { dest, elem, items } => {
                let ty = Type::list(elem.clone());
                self.gen.c_type(&ty)?;
                let name = container_name(&ty);
                self.assign(*dest, format!("{}_new()", name));
                for item in items {
                    let value = self.coerce_temp(*item, elem)?;
                    self.line(format!("{}_push({}, {});", name, temp_name(*dest), value));
                }
            }
            IrInstr::MakeMap {
                dest,
                key,
                value,
                entries,
            } => {
                let ty = Type::map(key.clone(), value.clone());
                self.gen.c_type(&ty)?;
                let name = container_name(&ty);
                self.assign(*dest, format!("{}_new()", name));
                for (k, v) in entries {
                    let k = self.coerce_temp(*k, key)?;
                    let v = self.coerce_temp(*v, value)?;
                    self.line(format!("{}_set({}, {}, {});", name, temp_name(*dest), k, v));
                }
            }
            IrInstr::MakeView {
                dest,
                source,
                start,
                end,
                elem,
            } => self.make_window(*dest, *source, *start, *end, Type::view(elem.clone()))?,
            IrInstr::MakeSlice {
                dest,
                source,
                start,
                end,
                elem,
            } => self.make_window(*dest, *source, *start, *end, Type::slice(elem.clone()))?,
            IrInstr::ListPush { list, value } => {
                let ty = self.ty(*list)?;
                let elem = ty.element_type().unwrap_or_else(Type::void);
                let v = self.coerce_temp(*value, &elem)?;
                self.gen.c_type(&ty)?;
                self.line(format!("{}_push({}, {});", container_name(&ty), temp_name(*list), v));
            }
            IrInstr::ListPop { dest, list } => {
                let ty = self.ty(*list)?;
                self.gen.c_type(&ty)?;
                self.assign(*dest, format!("{}_pop({})", container_name(&ty), temp_name(*list)));
            }
            IrInstr::ListClear { list } => self.line(format!("{}->len = 0;", temp_name(*list))),
            IrInstr::MapHas { dest, map, key } => {
                let ty = self.ty(*map)?;
                self.gen.c_type(&ty)?;
                self.assign(
                    *dest,
                    format!("{}_has({}, {})", container_name(&ty), temp_name(*map), temp_name(*key)),
                );
            }
            IrInstr::MapRemove { map, key } => {
                let ty = self.ty(*map)?;
                self.gen.c_type(&ty)?;
                self.line(format!(
                    "{}_remove({}, {});",
                    container_name(&ty),
                    temp_name(*map),
                    temp_name(*key)
                ));
            }
            IrInstr::Length { dest, object } => {
                let ty = self.ty(*object)?;
                let value = self.length_of(&temp_name(*object), &ty)?;
                self.assign(*dest, value);
            }
            IrInstr::IterBegin { dest, .. } => self.assign(*dest, "0"),
            IrInstr::IterNext { dest, iter } => self.iter_next(*dest, *iter)?,
            IrInstr::Print { value } => {
                let ty = self.ty(*value)?;
                match ty.as_primitive() {
                    Some(p) if p != PrimitiveType::Void => {
                        self.line(format!("ps_print_{}({});", p.name(), temp_name(*value)))
                    }
                    _ => return Err(self.unsupported("print", &ty)),
                }
            }
            IrInstr::Throw { value } => self.line(format!("ps_throw({});", temp_name(*value))),
            IrInstr::SetupTry { handler } => {
                let slot = format!("ps_try{}", self.try_slots);
                self.try_slots += 1;
                self.line(format!("{}.prev = ps_handlers;", slot));
                self.line(format!("ps_handlers = &{};", slot));
                self.line(format!("if (setjmp({}.env)) goto {};", slot, label_name(handler)));
            }
            IrInstr::EndTry => self.line("ps_handlers = ps_handlers->prev;"),
            IrInstr::CatchValue { dest } => {
                let ty = self.ty(*dest)?;
                let c_type = self.gen.c_type(&ty)?;
                self.assign(*dest, format!("({})ps_current_exception", c_type));
            }
            IrInstr::InstanceOf {
                dest,
                object,
                proto,
            } => {
                let id = self.gen.index().prototype(proto)?.proto_id;
                self.assign(*dest, format!("ps_instance_of({}, {})", temp_name(*object), id));
            }
            IrInstr::CheckOverflow {
                op,
                left,
                right,
                ty,
            } => {
                let name = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                    _ => return Err(self.unsupported("check_overflow", ty)),
                };
                let width = self.integer_suffix(ty, "check_overflow")?;
                self.line(format!(
                    "ps_check_{}_{}({}, {});",
                    name,
                    width,
                    temp_name(*left),
                    temp_name(*right)
                ));
            }
            IrInstr::CheckNegOverflow { operand, ty } => {
                let width = self.integer_suffix(ty, "check_neg_overflow")?;
                self.line(format!("ps_check_neg_{}({});", width, temp_name(*operand)));
            }
            IrInstr::CheckDivZero { divisor } => {
                self.line(format!("ps_check_div_zero({});", temp_name(*divisor)))
            }
            IrInstr::CheckShiftRange { amount, width } => {
                self.line(format!("ps_check_shift({}, {});", temp_name(*amount), width))
            }
            IrInstr::CheckIndexBounds { object, index } => {
                let ty = self.ty(*object)?;
                let len = self.length_of(&temp_name(*object), &ty)?;
                self.line(format!("ps_check_index({}, {});", temp_name(*index), len));
            }
            IrInstr::CheckMapKey { map, key } => {
                let ty = self.ty(*map)?;
                self.gen.c_type(&ty)?;
                self.line(format!(
                    "ps_check_key({}_has({}, {}));",
                    container_name(&ty),
                    temp_name(*map),
                    temp_name(*key)
                ));
            }
        }
        Ok(())
    }

    fn emit_terminator(&mut self, term: &Terminator) -> CodegenResult<()> {
        match term {
            Terminator::Ret { value } => {
                let ret = self.func.return_type.clone();
                let value = self.coerce_temp(*value, &ret)?;
                self.line(format!("return {};", value));
            }
            Terminator::RetVoid => self.line("return;"),
            Terminator::Jump { target } => self.line(format!("goto {};", label_name(target))),
            Terminator::BranchIf {
                cond,
                then_target,
                else_target,
            } => {
                self.line(format!("if ({}) goto {};", temp_name(*cond), label_name(then_target)));
                self.line(format!("goto {};", label_name(else_target)));
            }
            Terminator::BranchIterHasNext { iter, body, done } => {
                let source = self.types.iterator(&self.func.name, *iter)?.clone();
                let len = self.length_of(&temp_name(source.iterable), &source.iterable_type)?;
                self.line(format!("if ({} < {}) goto {};", temp_name(*iter), len, label_name(body)));
                self.line(format!("goto {};", label_name(done)));
            }
            Terminator::Unreachable => self.line("abort();"),
        }
        Ok(())
    }

    fn integer_suffix(&self, ty: &Type, op: &'static str) -> CodegenResult<&'static str> {
        match ty.as_primitive() {
            Some(PrimitiveType::Int) => Ok("int"),
            Some(PrimitiveType::Byte) => Ok("byte"),
            _ => Err(self.unsupported(op, ty)),
        }
    }

    fn call_args(&mut self, args: &[Temp], params: &[Type]) -> CodegenResult<Vec<String>> {
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            match params.get(i) {
                Some(param) => out.push(self.coerce_temp(*arg, param)?),
                None => out.push(temp_name(*arg)),
            }
        }
        Ok(out)
    }

    fn finish_call(&mut self, dest: Option<Temp>, call: String, ret: &Type) -> CodegenResult<()> {
        match dest {
            Some(dest) => {
                let to = self.ty(dest)?;
                let value = self.coerce(call, ret, &to)?;
                self.assign(dest, value);
            }
            None => self.line(format!("{};", call)),
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, l: &str, r: &str, ty: &Type) -> CodegenResult<String> {
        let sym = c_operator(op);
        if ty.as_named().is_some() {
            return match op {
                BinaryOp::Equal | BinaryOp::NotEqual => Ok(format!("((void*){} {} (void*){})", l, sym, r)),
                _ => Err(self.unsupported("bin_op", ty)),
            };
        }
        let Some(p) = ty.as_primitive() else {
            return Err(self.unsupported("bin_op", ty));
        };
        Ok(match p {
            PrimitiveType::String => match op {
                BinaryOp::Add => format!("ps_str_concat({}, {})", l, r),
                _ if op.is_comparison() => format!("(ps_str_cmp({}, {}) {} 0)", l, r, sym),
                _ => return Err(self.unsupported("bin_op", ty)),
            },
            PrimitiveType::Float if op == BinaryOp::Mod => format!("fmod({}, {})", l, r),
            PrimitiveType::Int => match op {
                BinaryOp::Div => format!("ps_div_int({}, {})", l, r),
                BinaryOp::Mod => format!("ps_mod_int({}, {})", l, r),
                BinaryOp::ShiftLeft => format!("ps_shl_int({}, {})", l, r),
                _ => format!("({} {} {})", l, sym, r),
            },
            PrimitiveType::Byte if !op.is_comparison() => format!("(uint8_t)({} {} {})", l, sym, r),
            _ => format!("({} {} {})", l, sym, r),
        })
    }

    fn cast(&self, value: &str, from: &Type, to: &Type) -> CodegenResult<String> {
        use PrimitiveType as P;
        if from == to {
            return Ok(value.to_string());
        }
        match (from.as_primitive(), to.as_primitive()) {
            (Some(P::Int | P::Byte), Some(P::Float)) => Ok(format!("(double){}", value)),
            (Some(P::Byte), Some(P::Int)) => Ok(format!("(int64_t){}", value)),
            (Some(P::Float), Some(P::Int)) => Ok(format!("ps_float_to_int({})", value)),
            (Some(P::Float), Some(P::Byte)) => Ok(format!("ps_float_to_byte({})", value)),
            (Some(P::Int), Some(P::Byte)) => Ok(format!("ps_int_to_byte({})", value)),
            _ => Err(self.unsupported("cast", to)),
        }
    }

    /// Zeroed instance; strings start empty and lists/maps start allocated
    fn new_object(&mut self, dest: Temp, proto: &str) -> CodegenResult<()> {
        let layout = self.gen.index().prototype(proto)?;
        let c_type = self.gen.c_type(&Type::named(proto))?;
        let struct_name = format!("ps_{}", sanitize(proto));
        let d = temp_name(dest);
        self.assign(
            dest,
            format!(
                "({})ps_new_object(sizeof({}), {})",
                c_type, struct_name, layout.proto_id
            ),
        );
        for field in &layout.fields {
            let init = match field.ty.generic_kind() {
                Some(GenericKind::List) | Some(GenericKind::Map) => {
                    self.gen.c_type(&field.ty)?;
                    format!("{}_new()", container_name(&field.ty))
                }
                _ if field.ty.is_string() => "\"\"".to_string(),
                _ => continue,
            };
            self.line(format!("{}->{} = {};", d, field_name(&field.name), init));
        }
        Ok(())
    }

    /// View or slice `[start, end)` over a list, another window, or a string
    fn make_window(&mut self, dest: Temp, source: Temp, start: Temp, end: Temp, ty: Type) -> CodegenResult<()> {
        let source_ty = self.ty(source)?;
        self.gen.c_type(&ty)?;
        let name = container_name(&ty);
        let (src, s, e) = (temp_name(source), temp_name(start), temp_name(end));
        let len = self.length_of(&src, &source_ty)?;
        let ptr = match source_ty.generic_kind() {
            Some(GenericKind::List) => format!("{}->ptr", src),
            Some(GenericKind::View) | Some(GenericKind::Slice) => format!("{}.ptr", src),
            None if source_ty.is_string() => format!("ps_str_decode({})", src),
            _ => return Err(self.unsupported("make_view", &source_ty)),
        };
        self.line(format!("ps_check_range({}, {}, {});", s, e, len));
        self.assign(dest, format!("({}){{ {} + {}, {} - {} }}", name, ptr, s, e, s));
        Ok(())
    }

    fn iter_next(&mut self, dest: Temp, iter: Temp) -> CodegenResult<()> {
        let source = self.types.iterator(&self.func.name, iter)?.clone();
        let (src, it) = (temp_name(source.iterable), temp_name(iter));
        let ty = &source.iterable_type;
        let kind = ty.generic_kind();
        let (value, item_ty) = match (source.kind, kind) {
            (IterKind::Keys, Some(GenericKind::Map)) => {
                (format!("{}->keys[{}++]", src, it), ty.key_type())
            }
            (IterKind::Keys, _) => (format!("{}++", it), Some(Type::int())),
            (IterKind::Values, Some(GenericKind::Map)) => {
                (format!("{}->values[{}++]", src, it), ty.element_type())
            }
            (IterKind::Values, Some(GenericKind::List)) => {
                (format!("{}->ptr[{}++]", src, it), ty.element_type())
            }
            (IterKind::Values, Some(_)) => (format!("{}.ptr[{}++]", src, it), ty.element_type()),
            (IterKind::Values, None) if ty.is_string() => {
                (format!("ps_str_at({}, {}++)", src, it), Some(Type::glyph()))
            }
            (IterKind::Values, None) => return Err(self.unsupported("iter_next", ty)),
        };
        let item_ty = item_ty.unwrap_or_else(Type::void);
        let value = self.coerce(value, &item_ty, &source.elem)?;
        self.assign(dest, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(c_constant(&IrConstant::Int(42)), "INT64_C(42)");
        assert_eq!(c_constant(&IrConstant::Int(i64::MIN)), "INT64_MIN");
        assert_eq!(c_constant(&IrConstant::Byte(7)), "((uint8_t)7)");
        assert_eq!(c_constant(&IrConstant::Float(2.0)), "2.0");
        assert_eq!(c_constant(&IrConstant::Glyph('A')), "UINT32_C(65)");
        assert_eq!(c_constant(&IrConstant::Bool(true)), "true");
    }

    #[test]
    fn test_string_literals_escape() {
        assert_eq!(c_string_literal("a\"b\\"), "\"a\\\"b\\\\\"");
        assert_eq!(c_string_literal("line\n"), "\"line\\n\"");
        assert_eq!(c_string_literal("é"), "\"\\303\\251\"");
        assert_eq!(c_string_literal("??="), "\"\\?\\?=\"");
    }

    #[test]
    fn test_names() {
        assert_eq!(label_name("while_cond1"), "L_while_cond1");
        assert_eq!(var_name("__join3"), "v___join3");
        assert_eq!(zero_value(&Type::view(Type::int())), "{0}");
        assert_eq!(zero_value(&Type::string()), "\"\"");
    }
}
