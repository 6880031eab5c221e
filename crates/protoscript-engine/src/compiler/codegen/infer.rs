//! Temp and variable typing for C emission
//!
//! A flat fixed-point relaxation over every instruction of a function,
//! ignoring control order: each round types the temps whose operands are
//! already typed, until a round adds nothing. Variables take their declared
//! types. A defined temp left untyped is an error.

use super::index::ModuleIndex;
use super::{CodegenError, CodegenResult};
use crate::compiler::ir::{IrFunction, IrInstr, IterKind, Temp};
use crate::types::{GenericKind, Type};
use rustc_hash::FxHashMap;

/// Iterator created by `iter_begin`
#[derive(Debug, Clone, PartialEq)]
pub struct IterSource {
    pub iterable: Temp,
    pub iterable_type: Type,
    pub kind: IterKind,
    pub elem: Type,
}

/// Inferred types of one function
#[derive(Debug, Clone, Default)]
pub struct FunctionTypes {
    pub temps: FxHashMap<Temp, Type>,
    pub vars: FxHashMap<String, Type>,
    /// Iterator temps (held as an index in C, never in `temps`)
    pub iterators: FxHashMap<Temp, IterSource>,
}

impl FunctionTypes {
    pub fn temp(&self, function: &str, temp: Temp) -> CodegenResult<&Type> {
        self.temps.get(&temp).ok_or_else(|| CodegenError::UntypedTemp {
            function: function.to_string(),
            temp,
        })
    }

    pub fn var(&self, function: &str, name: &str) -> CodegenResult<&Type> {
        self.vars.get(name).ok_or_else(|| CodegenError::UnknownVariable {
            function: function.to_string(),
            name: name.to_string(),
        })
    }

    pub fn iterator(&self, function: &str, temp: Temp) -> CodegenResult<&IterSource> {
        self.iterators.get(&temp).ok_or_else(|| CodegenError::UntypedTemp {
            function: function.to_string(),
            temp,
        })
    }
}

pub fn infer_function(func: &IrFunction, index: &ModuleIndex) -> CodegenResult<FunctionTypes> {
    let mut types = FunctionTypes::default();
    for param in &func.params {
        types.vars.insert(param.name.clone(), param.ty.clone());
    }
    let instrs: Vec<&IrInstr> = func.blocks.iter().flat_map(|b| &b.instructions).collect();
    for instr in &instrs {
        if let IrInstr::VarDecl { name, ty } = instr {
            types.vars.entry(name.clone()).or_insert_with(|| ty.clone());
        }
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for instr in &instrs {
            let Some(dest) = instr.dest() else {
                continue;
            };
            if types.temps.contains_key(&dest) || types.iterators.contains_key(&dest) {
                continue;
            }
            if let IrInstr::IterBegin {
                iterable, kind, elem, ..
            } = instr
            {
                if let Some(iterable_type) = types.temps.get(iterable) {
                    let source = IterSource {
                        iterable: *iterable,
                        iterable_type: iterable_type.clone(),
                        kind: *kind,
                        elem: elem.clone(),
                    };
                    types.iterators.insert(dest, source);
                    changed = true;
                }
                continue;
            }
            if let Some(ty) = infer_instr(instr, &types, index, &func.name)? {
                types.temps.insert(dest, ty);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for instr in &instrs {
        if let Some(dest) = instr.dest() {
            if !types.temps.contains_key(&dest) && !types.iterators.contains_key(&dest) {
                return Err(CodegenError::UntypedTemp {
                    function: func.name.clone(),
                    temp: dest,
                });
            }
        }
    }

    tracing::trace!(function = %func.name, rounds, temps = types.temps.len(), "types inferred");
    Ok(types)
}

/// Type of the temp `instr` defines, once its inputs are known
fn infer_instr(
    instr: &IrInstr,
    types: &FunctionTypes,
    index: &ModuleIndex,
    function: &str,
) -> CodegenResult<Option<Type>> {
    let temp = |t: &Temp| types.temps.get(t).cloned();
    let ty = match instr {
        IrInstr::Const { value, .. } => Some(value.ty()),
        IrInstr::Copy { src, .. } => temp(src),
        IrInstr::LoadVar { name, .. } => Some(types.var(function, name)?.clone()),
        IrInstr::BinOp { op, left, .. } => {
            if op.is_comparison() || op.is_equality() || op.is_logical() {
                Some(Type::bool())
            } else {
                temp(left)
            }
        }
        IrInstr::UnaryOp { operand, .. } => temp(operand),
        IrInstr::Select { then_val, .. } => temp(then_val),
        IrInstr::Cast { target, .. } => Some(target.clone()),
        IrInstr::CallStatic { func, .. } => {
            let callee = index.function(func).ok_or_else(|| CodegenError::UnknownFunction {
                function: function.to_string(),
                callee: func.clone(),
            })?;
            Some(callee.return_type.clone())
        }
        IrInstr::CallMethod { proto, method, .. } => {
            Some(index.require_method(proto, method)?.return_type())
        }
        IrInstr::CallExtern { ret, .. } => Some(ret.clone()),
        IrInstr::NewObject { proto, .. } | IrInstr::CloneObject { proto, .. } => {
            Some(Type::named(proto.clone()))
        }
        IrInstr::FieldGet { proto, field, .. } => Some(index.field_type(proto, field)?.clone()),
        IrInstr::IndexGet { object, .. } | IrInstr::ListPop { list: object, .. } => {
            temp(object).and_then(|t| t.element_type())
        }
        IrInstr::MakeList { elem, .. } => Some(Type::list(elem.clone())),
        IrInstr::MakeMap { key, value, .. } => Some(Type::map(key.clone(), value.clone())),
        IrInstr::MakeView { elem, .. } => Some(Type::view(elem.clone())),
        IrInstr::MakeSlice { elem, .. } => Some(Type::slice(elem.clone())),
        IrInstr::MapHas { .. } | IrInstr::InstanceOf { .. } => Some(Type::bool()),
        IrInstr::Length { .. } => Some(Type::int()),
        IrInstr::IterNext { iter, .. } => types.iterators.get(iter).map(|s| s.elem.clone()),
        IrInstr::CatchValue { .. } => Some(Type::named("Exception")),
        _ => None,
    };
    Ok(ty)
}

/// Whether values of `ty` live behind a pointer in C
pub fn is_reference(ty: &Type) -> bool {
    ty.as_named().is_some()
        || matches!(ty.generic_kind(), Some(GenericKind::List) | Some(GenericKind::Map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::compiler::ir::{BasicBlock, IrConstant, IrModule, IrParam, Terminator};

    fn function(instrs: Vec<IrInstr>) -> IrFunction {
        let mut func = IrFunction::new("f", vec![IrParam::new("n", Type::int())], Type::void());
        let mut entry = BasicBlock::new("entry");
        for instr in instrs {
            entry.add_instr(instr);
        }
        entry.set_terminator(Terminator::RetVoid);
        func.add_block(entry);
        func
    }

    #[test]
    fn test_types_flow_out_of_order() {
        // t1 is defined before its operand in block order
        let func = function(vec![
            IrInstr::Copy {
                dest: Temp(1),
                src: Temp(0),
            },
            IrInstr::LoadVar {
                dest: Temp(0),
                name: "n".into(),
            },
            IrInstr::BinOp {
                dest: Temp(2),
                op: BinaryOp::Less,
                left: Temp(1),
                right: Temp(0),
            },
        ]);
        let module = IrModule::new("m");
        let index = ModuleIndex::new(&module);
        let types = infer_function(&func, &index).unwrap();
        assert_eq!(types.temps[&Temp(1)], Type::int());
        assert_eq!(types.temps[&Temp(2)], Type::bool());
    }

    #[test]
    fn test_container_elements() {
        let func = function(vec![
            IrInstr::Const {
                dest: Temp(0),
                value: IrConstant::Str("a".into()),
            },
            IrInstr::MakeList {
                dest: Temp(1),
                elem: Type::string(),
                items: vec![Temp(0)],
            },
            IrInstr::IterBegin {
                dest: Temp(2),
                iterable: Temp(1),
                kind: IterKind::Values,
                elem: Type::string(),
            },
            IrInstr::IterNext {
                dest: Temp(3),
                iter: Temp(2),
            },
            IrInstr::ListPop {
                dest: Temp(4),
                list: Temp(1),
            },
        ]);
        let module = IrModule::new("m");
        let index = ModuleIndex::new(&module);
        let types = infer_function(&func, &index).unwrap();
        assert_eq!(types.temps[&Temp(1)], Type::list(Type::string()));
        assert_eq!(types.iterators[&Temp(2)].iterable, Temp(1));
        assert_eq!(types.temps[&Temp(3)], Type::string());
        assert_eq!(types.temps[&Temp(4)], Type::string());
    }

    #[test]
    fn test_untyped_temp_is_an_error() {
        // Copy of a temp nothing defines
        let func = function(vec![IrInstr::Copy {
            dest: Temp(1),
            src: Temp(7),
        }]);
        let module = IrModule::new("m");
        let index = ModuleIndex::new(&module);
        assert!(matches!(
            infer_function(&func, &index),
            Err(CodegenError::UntypedTemp { temp: Temp(1), .. })
        ));
    }

    #[test]
    fn test_unknown_callee() {
        let func = function(vec![IrInstr::CallStatic {
            dest: Some(Temp(0)),
            func: "missing".into(),
            args: vec![],
        }]);
        let module = IrModule::new("m");
        let index = ModuleIndex::new(&module);
        assert!(matches!(
            infer_function(&func, &index),
            Err(CodegenError::UnknownFunction { .. })
        ));
    }
}
