//! Pretty-printing for IR
//!
//! Provides human-readable output for debugging IR structures.

use super::block::BasicBlock;
use super::function::IrFunction;
use super::instr::{IrInstr, IterKind};
use super::module::IrModule;
use super::value::Temp;
use std::fmt::{self, Write};

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for IrModule {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "; module {}", self.name);
        let _ = writeln!(output);

        for proto in &self.prototypes {
            let _ = writeln!(output, "; prototype {} #{}", proto.name, proto.proto_id);
            for field in &proto.fields {
                let _ = writeln!(output, ";   field {}: {}", field.name, field.ty);
            }
            let _ = writeln!(output);
        }

        for func in &self.functions {
            output.push_str(&func.pretty_print());
            let _ = writeln!(output);
        }

        output
    }
}

impl PrettyPrint for IrFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        let _ = writeln!(
            output,
            "fn {}({}) -> {} {{",
            self.name,
            params.join(", "),
            self.return_type
        );
        for block in &self.blocks {
            output.push_str(&block.pretty_print());
        }
        let _ = writeln!(output, "}}");
        output
    }
}

impl PrettyPrint for BasicBlock {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "  {}:", self.label);
        for instr in &self.instructions {
            let _ = writeln!(output, "    {}", instr);
        }
        let _ = writeln!(output, "    {}", self.terminator);
        output
    }
}

fn temps(list: &[Temp]) -> String {
    list.iter()
        .map(Temp::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn call_dest(dest: &Option<Temp>) -> String {
    dest.map(|d| format!("{} = ", d)).unwrap_or_default()
}

impl fmt::Display for IrInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrInstr::Const { dest, value } => write!(f, "{} = const {}", dest, value),
            IrInstr::Copy { dest, src } => write!(f, "{} = copy {}", dest, src),
            IrInstr::VarDecl { name, ty } => write!(f, "var_decl {}: {}", name, ty),
            IrInstr::LoadVar { dest, name } => write!(f, "{} = load_var {}", dest, name),
            IrInstr::StoreVar { name, src } => write!(f, "store_var {}, {}", name, src),
            IrInstr::BinOp {
                dest,
                op,
                left,
                right,
            } => write!(f, "{} = {} {} {}", dest, left, op, right),
            IrInstr::UnaryOp { dest, op, operand } => write!(f, "{} = {}{}", dest, op, operand),
            IrInstr::Select {
                dest,
                cond,
                then_val,
                else_val,
            } => write!(f, "{} = select {} ? {} : {}", dest, cond, then_val, else_val),
            IrInstr::Cast { dest, src, target } => write!(f, "{} = cast {} to {}", dest, src, target),
            IrInstr::CallStatic { dest, func, args } => {
                write!(f, "{}call {}({})", call_dest(dest), func, temps(args))
            }
            IrInstr::CallMethod {
                dest,
                receiver,
                proto,
                method,
                args,
            } => write!(
                f,
                "{}call_method {}.{}:{}({})",
                call_dest(dest),
                receiver,
                proto,
                method,
                temps(args)
            ),
            IrInstr::CallExtern {
                dest,
                module,
                func,
                args,
                ret,
            } => write!(
                f,
                "{}call_extern {}.{}({}) -> {}",
                call_dest(dest),
                module,
                func,
                temps(args),
                ret
            ),
            IrInstr::NewObject { dest, proto } => write!(f, "{} = new {}", dest, proto),
            IrInstr::CloneObject { dest, src, proto } => {
                write!(f, "{} = clone {} as {}", dest, src, proto)
            }
            IrInstr::FieldGet {
                dest,
                object,
                proto,
                field,
            } => write!(f, "{} = {}.{}:{}", dest, object, proto, field),
            IrInstr::FieldSet {
                object,
                proto,
                field,
                value,
            } => write!(f, "{}.{}:{} = {}", object, proto, field, value),
            IrInstr::IndexGet {
                dest,
                object,
                index,
            } => write!(f, "{} = {}[{}]", dest, object, index),
            IrInstr::IndexSet {
                object,
                index,
                value,
            } => write!(f, "{}[{}] = {}", object, index, value),
            IrInstr::MakeList { dest, elem, items } => {
                write!(f, "{} = make_list<{}> [{}]", dest, elem, temps(items))
            }
            IrInstr::MakeMap {
                dest,
                key,
                value,
                entries,
            } => {
                let pairs: Vec<String> = entries.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{} = make_map<{},{}> {{{}}}", dest, key, value, pairs.join(", "))
            }
            IrInstr::MakeView {
                dest,
                source,
                start,
                end,
                elem,
            } => write!(f, "{} = make_view<{}> {}[{}..{}]", dest, elem, source, start, end),
            IrInstr::MakeSlice {
                dest,
                source,
                start,
                end,
                elem,
            } => write!(f, "{} = make_slice<{}> {}[{}..{}]", dest, elem, source, start, end),
            IrInstr::ListPush { list, value } => write!(f, "list_push {}, {}", list, value),
            IrInstr::ListPop { dest, list } => write!(f, "{} = list_pop {}", dest, list),
            IrInstr::ListClear { list } => write!(f, "list_clear {}", list),
            IrInstr::MapHas { dest, map, key } => write!(f, "{} = map_has {}, {}", dest, map, key),
            IrInstr::MapRemove { map, key } => write!(f, "map_remove {}, {}", map, key),
            IrInstr::Length { dest, object } => write!(f, "{} = length {}", dest, object),
            IrInstr::IterBegin {
                dest,
                iterable,
                kind,
                elem,
            } => {
                let mode = match kind {
                    IterKind::Values => "values",
                    IterKind::Keys => "keys",
                };
                write!(f, "{} = iter_begin {} {} -> {}", dest, mode, iterable, elem)
            }
            IrInstr::IterNext { dest, iter } => write!(f, "{} = iter_next {}", dest, iter),
            IrInstr::Print { value } => write!(f, "print {}", value),
            IrInstr::Throw { value } => write!(f, "throw {}", value),
            IrInstr::SetupTry { handler } => write!(f, "setup_try {}", handler),
            IrInstr::EndTry => write!(f, "end_try"),
            IrInstr::CatchValue { dest } => write!(f, "{} = catch_value", dest),
            IrInstr::InstanceOf {
                dest,
                object,
                proto,
            } => write!(f, "{} = instance_of {}, {}", dest, object, proto),
            IrInstr::CheckOverflow {
                op,
                left,
                right,
                ty,
            } => write!(f, "check_overflow {} {} {} : {}", left, op, right, ty),
            IrInstr::CheckNegOverflow { operand, ty } => {
                write!(f, "check_neg_overflow {} : {}", operand, ty)
            }
            IrInstr::CheckDivZero { divisor } => write!(f, "check_div_zero {}", divisor),
            IrInstr::CheckShiftRange { amount, width } => {
                write!(f, "check_shift_range {} < {}", amount, width)
            }
            IrInstr::CheckIndexBounds { object, index } => {
                write!(f, "check_index_bounds {}[{}]", object, index)
            }
            IrInstr::CheckMapKey { map, key } => write!(f, "check_map_key {}[{}]", map, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::compiler::ir::block::Terminator;
    use crate::compiler::ir::value::IrConstant;
    use crate::types::Type;

    #[test]
    fn test_instruction_display() {
        let add = IrInstr::BinOp {
            dest: Temp(2),
            op: BinaryOp::Add,
            left: Temp(0),
            right: Temp(1),
        };
        assert_eq!(add.to_string(), "t2 = t0 + t1");
        let call = IrInstr::CallStatic {
            dest: Some(Temp(3)),
            func: "double".into(),
            args: vec![Temp(2)],
        };
        assert_eq!(call.to_string(), "t3 = call double(t2)");
    }

    #[test]
    fn test_function_listing() {
        let mut func = IrFunction::new("answer", vec![], Type::int());
        let mut block = BasicBlock::new("entry");
        block.add_instr(IrInstr::Const {
            dest: Temp(0),
            value: IrConstant::Int(42),
        });
        block.set_terminator(Terminator::Ret { value: Temp(0) });
        func.add_block(block);

        let text = func.pretty_print();
        assert!(text.starts_with("fn answer() -> int {"));
        assert!(text.contains("  entry:\n    t0 = const 42\n    ret t0\n"));
    }
}
