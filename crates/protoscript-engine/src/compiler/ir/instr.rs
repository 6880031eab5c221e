//! IR Instructions
//!
//! Flat, `op`-tagged three-address instructions. Every instruction defines
//! at most one temp; program variables are accessed through
//! `var_decl`/`load_var`/`store_var`.

use super::value::{IrConstant, Temp};
use crate::ast::{BinaryOp, UnaryOp};
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Iteration mode of `for-of` (values) and `for-in` (keys or indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterKind {
    Values,
    Keys,
}

/// IR instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IrInstr {
    /// dest = constant
    Const { dest: Temp, value: IrConstant },

    /// dest = src
    Copy { dest: Temp, src: Temp },

    /// Declare a program variable (locals only; parameters are implicit)
    VarDecl { name: String, ty: Type },

    /// dest = variable
    LoadVar { dest: Temp, name: String },

    /// variable = src
    StoreVar { name: String, src: Temp },

    /// dest = left op right
    BinOp {
        dest: Temp,
        #[serde(rename = "operator")]
        op: BinaryOp,
        left: Temp,
        right: Temp,
    },

    /// dest = op operand
    UnaryOp {
        dest: Temp,
        #[serde(rename = "operator")]
        op: UnaryOp,
        operand: Temp,
    },

    /// dest = cond ? then_val : else_val (both operands already evaluated)
    Select {
        dest: Temp,
        cond: Temp,
        then_val: Temp,
        else_val: Temp,
    },

    /// dest = (target) src
    Cast { dest: Temp, src: Temp, target: Type },

    /// Direct call of a function in this module
    CallStatic {
        dest: Option<Temp>,
        func: String,
        args: Vec<Temp>,
    },

    /// Method call dispatched on the receiver's prototype
    CallMethod {
        dest: Option<Temp>,
        receiver: Temp,
        /// Static prototype of the receiver
        proto: String,
        method: String,
        args: Vec<Temp>,
    },

    /// Call into a module or a built-in handle method provided by the host
    CallExtern {
        dest: Option<Temp>,
        module: String,
        func: String,
        args: Vec<Temp>,
        ret: Type,
    },

    /// Fresh instance with zeroed fields
    NewObject { dest: Temp, proto: String },

    /// Shallow copy of an instance
    CloneObject { dest: Temp, src: Temp, proto: String },

    FieldGet {
        dest: Temp,
        object: Temp,
        proto: String,
        field: String,
    },

    FieldSet {
        object: Temp,
        proto: String,
        field: String,
        value: Temp,
    },

    /// dest = object[index] (list/view/slice/string element, map value)
    IndexGet { dest: Temp, object: Temp, index: Temp },

    /// object[index] = value
    IndexSet {
        object: Temp,
        index: Temp,
        value: Temp,
    },

    MakeList {
        dest: Temp,
        elem: Type,
        items: Vec<Temp>,
    },

    MakeMap {
        dest: Temp,
        key: Type,
        value: Type,
        entries: Vec<(Temp, Temp)>,
    },

    /// Read-only window `source[start..end]`
    MakeView {
        dest: Temp,
        source: Temp,
        start: Temp,
        end: Temp,
        elem: Type,
    },

    /// Writable window `source[start..end]`
    MakeSlice {
        dest: Temp,
        source: Temp,
        start: Temp,
        end: Temp,
        elem: Type,
    },

    ListPush { list: Temp, value: Temp },

    ListPop { dest: Temp, list: Temp },

    ListClear { list: Temp },

    MapHas { dest: Temp, map: Temp, key: Temp },

    MapRemove { map: Temp, key: Temp },

    /// Element count of a container or string
    Length { dest: Temp, object: Temp },

    /// Start iterating `iterable`; `elem` is the type `iter_next` yields
    IterBegin {
        dest: Temp,
        iterable: Temp,
        kind: IterKind,
        elem: Type,
    },

    /// Advance an iterator known to have a next item
    IterNext { dest: Temp, iter: Temp },

    Print { value: Temp },

    /// Raise an exception (block ends in `unreachable`)
    Throw { value: Temp },

    /// Route exceptions raised until the matching `end_try` to `handler`
    SetupTry { handler: String },

    EndTry,

    /// dest = exception being handled (first instruction of a handler)
    CatchValue { dest: Temp },

    /// dest = object's prototype is `proto` or inherits from it
    InstanceOf {
        dest: Temp,
        object: Temp,
        proto: String,
    },

    /// R1001 unless `left op right` fits `ty`
    CheckOverflow {
        #[serde(rename = "operator")]
        op: BinaryOp,
        left: Temp,
        right: Temp,
        ty: Type,
    },

    /// R1002 unless `-operand` fits `ty`
    CheckNegOverflow { operand: Temp, ty: Type },

    /// R1003 when divisor is zero
    CheckDivZero { divisor: Temp },

    /// R1004 unless `0 <= amount < width`
    CheckShiftRange { amount: Temp, width: u32 },

    /// R1005 unless `0 <= index < length(object)`
    CheckIndexBounds { object: Temp, index: Temp },

    /// R1006 unless the map holds `key`
    CheckMapKey { map: Temp, key: Temp },
}

/// Every opcode accepted in serialized IR
pub const OPCODES: &[&str] = &[
    "const",
    "copy",
    "var_decl",
    "load_var",
    "store_var",
    "bin_op",
    "unary_op",
    "select",
    "cast",
    "call_static",
    "call_method",
    "call_extern",
    "new_object",
    "clone_object",
    "field_get",
    "field_set",
    "index_get",
    "index_set",
    "make_list",
    "make_map",
    "make_view",
    "make_slice",
    "list_push",
    "list_pop",
    "list_clear",
    "map_has",
    "map_remove",
    "length",
    "iter_begin",
    "iter_next",
    "print",
    "throw",
    "setup_try",
    "end_try",
    "catch_value",
    "instance_of",
    "check_overflow",
    "check_neg_overflow",
    "check_div_zero",
    "check_shift_range",
    "check_index_bounds",
    "check_map_key",
];

impl IrInstr {
    /// Serialized opcode name
    pub fn opcode(&self) -> &'static str {
        match self {
            IrInstr::Const { .. } => "const",
            IrInstr::Copy { .. } => "copy",
            IrInstr::VarDecl { .. } => "var_decl",
            IrInstr::LoadVar { .. } => "load_var",
            IrInstr::StoreVar { .. } => "store_var",
            IrInstr::BinOp { .. } => "bin_op",
            IrInstr::UnaryOp { .. } => "unary_op",
            IrInstr::Select { .. } => "select",
            IrInstr::Cast { .. } => "cast",
            IrInstr::CallStatic { .. } => "call_static",
            IrInstr::CallMethod { .. } => "call_method",
            IrInstr::CallExtern { .. } => "call_extern",
            IrInstr::NewObject { .. } => "new_object",
            IrInstr::CloneObject { .. } => "clone_object",
            IrInstr::FieldGet { .. } => "field_get",
            IrInstr::FieldSet { .. } => "field_set",
            IrInstr::IndexGet { .. } => "index_get",
            IrInstr::IndexSet { .. } => "index_set",
            IrInstr::MakeList { .. } => "make_list",
            IrInstr::MakeMap { .. } => "make_map",
            IrInstr::MakeView { .. } => "make_view",
            IrInstr::MakeSlice { .. } => "make_slice",
            IrInstr::ListPush { .. } => "list_push",
            IrInstr::ListPop { .. } => "list_pop",
            IrInstr::ListClear { .. } => "list_clear",
            IrInstr::MapHas { .. } => "map_has",
            IrInstr::MapRemove { .. } => "map_remove",
            IrInstr::Length { .. } => "length",
            IrInstr::IterBegin { .. } => "iter_begin",
            IrInstr::IterNext { .. } => "iter_next",
            IrInstr::Print { .. } => "print",
            IrInstr::Throw { .. } => "throw",
            IrInstr::SetupTry { .. } => "setup_try",
            IrInstr::EndTry => "end_try",
            IrInstr::CatchValue { .. } => "catch_value",
            IrInstr::InstanceOf { .. } => "instance_of",
            IrInstr::CheckOverflow { .. } => "check_overflow",
            IrInstr::CheckNegOverflow { .. } => "check_neg_overflow",
            IrInstr::CheckDivZero { .. } => "check_div_zero",
            IrInstr::CheckShiftRange { .. } => "check_shift_range",
            IrInstr::CheckIndexBounds { .. } => "check_index_bounds",
            IrInstr::CheckMapKey { .. } => "check_map_key",
        }
    }

    /// Temp defined by this instruction, if any
    pub fn dest(&self) -> Option<Temp> {
        match self {
            IrInstr::Const { dest, .. }
            | IrInstr::Copy { dest, .. }
            | IrInstr::LoadVar { dest, .. }
            | IrInstr::BinOp { dest, .. }
            | IrInstr::UnaryOp { dest, .. }
            | IrInstr::Select { dest, .. }
            | IrInstr::Cast { dest, .. }
            | IrInstr::NewObject { dest, .. }
            | IrInstr::CloneObject { dest, .. }
            | IrInstr::FieldGet { dest, .. }
            | IrInstr::IndexGet { dest, .. }
            | IrInstr::MakeList { dest, .. }
            | IrInstr::MakeMap { dest, .. }
            | IrInstr::MakeView { dest, .. }
            | IrInstr::MakeSlice { dest, .. }
            | IrInstr::ListPop { dest, .. }
            | IrInstr::MapHas { dest, .. }
            | IrInstr::Length { dest, .. }
            | IrInstr::IterBegin { dest, .. }
            | IrInstr::IterNext { dest, .. }
            | IrInstr::CatchValue { dest }
            | IrInstr::InstanceOf { dest, .. } => Some(*dest),
            IrInstr::CallStatic { dest, .. }
            | IrInstr::CallMethod { dest, .. }
            | IrInstr::CallExtern { dest, .. } => *dest,
            _ => None,
        }
    }

    pub fn dest_mut(&mut self) -> Option<&mut Temp> {
        match self {
            IrInstr::Const { dest, .. }
            | IrInstr::Copy { dest, .. }
            | IrInstr::LoadVar { dest, .. }
            | IrInstr::BinOp { dest, .. }
            | IrInstr::UnaryOp { dest, .. }
            | IrInstr::Select { dest, .. }
            | IrInstr::Cast { dest, .. }
            | IrInstr::NewObject { dest, .. }
            | IrInstr::CloneObject { dest, .. }
            | IrInstr::FieldGet { dest, .. }
            | IrInstr::IndexGet { dest, .. }
            | IrInstr::MakeList { dest, .. }
            | IrInstr::MakeMap { dest, .. }
            | IrInstr::MakeView { dest, .. }
            | IrInstr::MakeSlice { dest, .. }
            | IrInstr::ListPop { dest, .. }
            | IrInstr::MapHas { dest, .. }
            | IrInstr::Length { dest, .. }
            | IrInstr::IterBegin { dest, .. }
            | IrInstr::IterNext { dest, .. }
            | IrInstr::CatchValue { dest }
            | IrInstr::InstanceOf { dest, .. } => Some(dest),
            IrInstr::CallStatic { dest, .. }
            | IrInstr::CallMethod { dest, .. }
            | IrInstr::CallExtern { dest, .. } => dest.as_mut(),
            _ => None,
        }
    }

    /// Temps read by this instruction, in operand order
    pub fn operands(&self) -> Vec<Temp> {
        let mut out = Vec::new();
        self.visit_operands(|t| out.push(t));
        out
    }

    fn visit_operands(&self, mut f: impl FnMut(Temp)) {
        match self {
            IrInstr::Const { .. }
            | IrInstr::VarDecl { .. }
            | IrInstr::LoadVar { .. }
            | IrInstr::NewObject { .. }
            | IrInstr::SetupTry { .. }
            | IrInstr::EndTry
            | IrInstr::CatchValue { .. } => {}
            IrInstr::Copy { src, .. }
            | IrInstr::StoreVar { src, .. }
            | IrInstr::Cast { src, .. }
            | IrInstr::CloneObject { src, .. } => f(*src),
            IrInstr::BinOp { left, right, .. } | IrInstr::CheckOverflow { left, right, .. } => {
                f(*left);
                f(*right);
            }
            IrInstr::UnaryOp { operand, .. } | IrInstr::CheckNegOverflow { operand, .. } => {
                f(*operand)
            }
            IrInstr::Select {
                cond,
                then_val,
                else_val,
                ..
            } => {
                f(*cond);
                f(*then_val);
                f(*else_val);
            }
            IrInstr::CallStatic { args, .. } | IrInstr::CallExtern { args, .. } => {
                args.iter().copied().for_each(f)
            }
            IrInstr::CallMethod { receiver, args, .. } => {
                f(*receiver);
                args.iter().copied().for_each(f);
            }
            IrInstr::FieldGet { object, .. }
            | IrInstr::Length { object, .. }
            | IrInstr::InstanceOf { object, .. } => f(*object),
            IrInstr::FieldSet { object, value, .. } => {
                f(*object);
                f(*value);
            }
            IrInstr::IndexGet { object, index, .. }
            | IrInstr::CheckIndexBounds { object, index } => {
                f(*object);
                f(*index);
            }
            IrInstr::IndexSet {
                object,
                index,
                value,
            } => {
                f(*object);
                f(*index);
                f(*value);
            }
            IrInstr::MakeList { items, .. } => items.iter().copied().for_each(f),
            IrInstr::MakeMap { entries, .. } => {
                for (k, v) in entries {
                    f(*k);
                    f(*v);
                }
            }
            IrInstr::MakeView {
                source, start, end, ..
            }
            | IrInstr::MakeSlice {
                source, start, end, ..
            } => {
                f(*source);
                f(*start);
                f(*end);
            }
            IrInstr::ListPush { list, value } => {
                f(*list);
                f(*value);
            }
            IrInstr::ListPop { list, .. } | IrInstr::ListClear { list } => f(*list),
            IrInstr::MapHas { map, key, .. }
            | IrInstr::MapRemove { map, key }
            | IrInstr::CheckMapKey { map, key } => {
                f(*map);
                f(*key);
            }
            IrInstr::IterBegin { iterable, .. } => f(*iterable),
            IrInstr::IterNext { iter, .. } => f(*iter),
            IrInstr::Print { value } | IrInstr::Throw { value } => f(*value),
            IrInstr::CheckDivZero { divisor } => f(*divisor),
            IrInstr::CheckShiftRange { amount, .. } => f(*amount),
        }
    }

    /// Rewrite every operand temp (not the destination)
    pub fn map_operands(&mut self, mut f: impl FnMut(Temp) -> Temp) {
        let mut g = |t: &mut Temp| *t = f(*t);
        match self {
            IrInstr::Const { .. }
            | IrInstr::VarDecl { .. }
            | IrInstr::LoadVar { .. }
            | IrInstr::NewObject { .. }
            | IrInstr::SetupTry { .. }
            | IrInstr::EndTry
            | IrInstr::CatchValue { .. } => {}
            IrInstr::Copy { src, .. }
            | IrInstr::StoreVar { src, .. }
            | IrInstr::Cast { src, .. }
            | IrInstr::CloneObject { src, .. } => g(src),
            IrInstr::BinOp { left, right, .. } | IrInstr::CheckOverflow { left, right, .. } => {
                g(left);
                g(right);
            }
            IrInstr::UnaryOp { operand, .. } | IrInstr::CheckNegOverflow { operand, .. } => {
                g(operand)
            }
            IrInstr::Select {
                cond,
                then_val,
                else_val,
                ..
            } => {
                g(cond);
                g(then_val);
                g(else_val);
            }
            IrInstr::CallStatic { args, .. } | IrInstr::CallExtern { args, .. } => {
                args.iter_mut().for_each(g)
            }
            IrInstr::CallMethod { receiver, args, .. } => {
                g(receiver);
                args.iter_mut().for_each(g);
            }
            IrInstr::FieldGet { object, .. }
            | IrInstr::Length { object, .. }
            | IrInstr::InstanceOf { object, .. } => g(object),
            IrInstr::FieldSet { object, value, .. } => {
                g(object);
                g(value);
            }
            IrInstr::IndexGet { object, index, .. }
            | IrInstr::CheckIndexBounds { object, index } => {
                g(object);
                g(index);
            }
            IrInstr::IndexSet {
                object,
                index,
                value,
            } => {
                g(object);
                g(index);
                g(value);
            }
            IrInstr::MakeList { items, .. } => items.iter_mut().for_each(g),
            IrInstr::MakeMap { entries, .. } => {
                for (k, v) in entries.iter_mut() {
                    g(k);
                    g(v);
                }
            }
            IrInstr::MakeView {
                source, start, end, ..
            }
            | IrInstr::MakeSlice {
                source, start, end, ..
            } => {
                g(source);
                g(start);
                g(end);
            }
            IrInstr::ListPush { list, value } => {
                g(list);
                g(value);
            }
            IrInstr::ListPop { list, .. } | IrInstr::ListClear { list } => g(list),
            IrInstr::MapHas { map, key, .. }
            | IrInstr::MapRemove { map, key }
            | IrInstr::CheckMapKey { map, key } => {
                g(map);
                g(key);
            }
            IrInstr::IterBegin { iterable, .. } => g(iterable),
            IrInstr::IterNext { iter, .. } => g(iter),
            IrInstr::Print { value } | IrInstr::Throw { value } => g(value),
            IrInstr::CheckDivZero { divisor } => g(divisor),
            IrInstr::CheckShiftRange { amount, .. } => g(amount),
        }
    }

    /// Runtime safety check
    pub fn is_check(&self) -> bool {
        matches!(
            self,
            IrInstr::CheckOverflow { .. }
                | IrInstr::CheckNegOverflow { .. }
                | IrInstr::CheckDivZero { .. }
                | IrInstr::CheckShiftRange { .. }
                | IrInstr::CheckIndexBounds { .. }
                | IrInstr::CheckMapKey { .. }
        )
    }

    /// Check if this instruction has side effects
    pub fn has_side_effects(&self) -> bool {
        self.is_check()
            || matches!(
                self,
                IrInstr::VarDecl { .. }
                    | IrInstr::StoreVar { .. }
                    | IrInstr::CallStatic { .. }
                    | IrInstr::CallMethod { .. }
                    | IrInstr::CallExtern { .. }
                    | IrInstr::FieldSet { .. }
                    | IrInstr::IndexSet { .. }
                    | IrInstr::ListPush { .. }
                    | IrInstr::ListPop { .. }
                    | IrInstr::ListClear { .. }
                    | IrInstr::MapRemove { .. }
                    | IrInstr::IterNext { .. }
                    | IrInstr::Print { .. }
                    | IrInstr::Throw { .. }
                    | IrInstr::SetupTry { .. }
                    | IrInstr::EndTry
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dest_and_operands() {
        let add = IrInstr::BinOp {
            dest: Temp(2),
            op: BinaryOp::Add,
            left: Temp(0),
            right: Temp(1),
        };
        assert_eq!(add.dest(), Some(Temp(2)));
        assert_eq!(add.operands(), vec![Temp(0), Temp(1)]);

        let call = IrInstr::CallStatic {
            dest: None,
            func: "f".into(),
            args: vec![Temp(4)],
        };
        assert_eq!(call.dest(), None);
        assert_eq!(call.operands(), vec![Temp(4)]);
    }

    #[test]
    fn test_map_operands_leaves_dest() {
        let mut sel = IrInstr::Select {
            dest: Temp(9),
            cond: Temp(1),
            then_val: Temp(2),
            else_val: Temp(3),
        };
        sel.map_operands(|t| Temp(t.0 + 10));
        assert_eq!(sel.dest(), Some(Temp(9)));
        assert_eq!(sel.operands(), vec![Temp(11), Temp(12), Temp(13)]);
    }

    #[test]
    fn test_opcode_matches_serde_tag() {
        let samples = vec![
            IrInstr::Const {
                dest: Temp(0),
                value: IrConstant::Int(1),
            },
            IrInstr::CheckDivZero { divisor: Temp(0) },
            IrInstr::EndTry,
            IrInstr::MakeMap {
                dest: Temp(1),
                key: Type::string(),
                value: Type::int(),
                entries: vec![],
            },
            IrInstr::IterBegin {
                dest: Temp(2),
                iterable: Temp(1),
                kind: IterKind::Keys,
                elem: Type::string(),
            },
        ];
        for instr in samples {
            let json = serde_json::to_value(&instr).unwrap();
            assert_eq!(json["op"], instr.opcode());
            assert!(OPCODES.contains(&instr.opcode()));
        }
    }

    #[test]
    fn test_operator_fields_keep_the_opcode_tag() {
        let samples = vec![
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Sub,
                left: Temp(0),
                right: Temp(1),
            },
            IrInstr::UnaryOp {
                dest: Temp(1),
                op: UnaryOp::Neg,
                operand: Temp(0),
            },
            IrInstr::CheckOverflow {
                op: BinaryOp::Mul,
                left: Temp(0),
                right: Temp(1),
                ty: Type::int(),
            },
        ];
        for instr in samples {
            let json = serde_json::to_value(&instr).unwrap();
            assert_eq!(json["op"], instr.opcode());
            assert!(json.get("operator").is_some());
            let back: IrInstr = serde_json::from_value(json).unwrap();
            assert_eq!(back, instr);
        }
    }

    #[test]
    fn test_checks_have_side_effects() {
        let check = IrInstr::CheckShiftRange {
            amount: Temp(0),
            width: 64,
        };
        assert!(check.is_check());
        assert!(check.has_side_effects());
        assert!(!IrInstr::Copy {
            dest: Temp(1),
            src: Temp(0)
        }
        .has_side_effects());
    }
}
