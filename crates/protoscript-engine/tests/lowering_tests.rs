//! IR builder integration tests

mod common;

use common::*;
use protoscript_engine::ast::*;
use protoscript_engine::checker::modules::{ModuleInfo, ModuleValue};
use protoscript_engine::compiler::ir::{IrConstant, IrInstr, IterKind, Terminator};
use protoscript_engine::{compile_to_ir, CompilerOptions, ModuleRegistry, OptLevel, Type};

fn animals() -> Program {
    let speak = |text: &str| {
        FunctionDecl::new("speak", vec![], Type::string(), vec![Statement::ret(Expression::string(text))])
    };
    main_with(vec![
        Statement::var(
            Type::named("Animal"),
            "a",
            Expression::method(Expression::ident("Dog"), "clone", vec![]),
        ),
        print(Expression::method(Expression::ident("a"), "speak", vec![])),
    ])
    .with_prototype(
        PrototypeDecl::new("Animal")
            .with_field(FieldDecl::new("name", Type::string(), Some(Expression::string("animal"))))
            .with_method(speak("...")),
    )
    .with_prototype(PrototypeDecl::new("Dog").with_parent("Animal").with_method(speak("woof")))
}

// =============================================================================
// SAFETY CHECKS
// =============================================================================

mod checks {
    use super::*;

    #[test]
    fn test_div_zero_check_precedes_division() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(5)),
            Statement::var(Type::int(), "y", Expression::int(0)),
            Statement::var(
                Type::int(),
                "z",
                Expression::binary(BinaryOp::Div, Expression::ident("x"), Expression::ident("y")),
            ),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        let body = instrs(main);
        let div = body
            .iter()
            .position(|i| matches!(i, IrInstr::BinOp { op: BinaryOp::Div, .. }))
            .unwrap();
        match (body[div - 1], body[div]) {
            (IrInstr::CheckDivZero { divisor }, IrInstr::BinOp { right, .. }) => {
                assert_eq!(divisor, right)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_index_and_key_checks() {
        let program = main_with(vec![
            Statement::var(Type::list(Type::int()), "xs", Expression::list(vec![Expression::int(1)])),
            Statement::var(
                Type::map(Type::string(), Type::int()),
                "m",
                Expression::map(vec![(Expression::string("a"), Expression::int(1))]),
            ),
            print(Expression::index(Expression::ident("xs"), Expression::int(0))),
            print(Expression::index(Expression::ident("m"), Expression::string("a"))),
            Statement::assign(
                Expression::index(Expression::ident("m"), Expression::string("b")),
                Expression::int(2),
            ),
        ]);
        let main_ops = ops(lower(&program).get_function("main").unwrap())
            .into_iter()
            .filter(|op| op.starts_with("check_"))
            .collect::<Vec<_>>();
        assert_eq!(main_ops, vec!["check_index_bounds", "check_map_key"]);
    }
}

// =============================================================================
// STRUCTURE
// =============================================================================

mod structure {
    use super::*;

    #[test]
    fn test_every_function_is_well_formed() {
        let program = animals().with_function(FunctionDecl::new(
            "sum",
            vec![Param::new("xs", Type::list(Type::int()))],
            Type::int(),
            vec![
                Statement::var(Type::int(), "total", Expression::int(0)),
                Statement::for_of(
                    Some(Type::int()),
                    "x",
                    Expression::ident("xs"),
                    vec![Statement::compound(Expression::ident("total"), BinaryOp::Add, Expression::ident("x"))],
                ),
                Statement::ret(Expression::ident("total")),
            ],
        ));
        let module = lower(&program);
        assert!(module.validate().is_ok());
        for func in &module.functions {
            assert!(!func.blocks.is_empty(), "{} has no blocks", func.name);
            let reachable = func.reachable_labels();
            assert!(reachable.contains(func.blocks[0].label.as_str()));
            for block in &func.blocks {
                for succ in block.terminator.successors() {
                    assert!(func.get_block(succ).is_some());
                }
            }
        }
    }

    #[test]
    fn test_methods_and_prototype_clone() {
        let module = lower(&animals());
        let speak = module.get_function("Dog::speak").unwrap();
        assert_eq!(speak.params[0].name, "self");
        assert_eq!(speak.params[0].ty, Type::named("Dog"));

        let main = module.get_function("main").unwrap();
        let body = instrs(main);
        assert!(matches!(body[0], IrInstr::NewObject { proto, .. } if proto == "Dog"));
        assert!(body.iter().any(|i| matches!(
            i,
            IrInstr::FieldSet { field, .. } if field == "name"
        )));
        assert!(body.iter().any(|i| matches!(
            i,
            IrInstr::CallMethod { proto, method, .. } if proto == "Animal" && method == "speak"
        )));
    }

    #[test]
    fn test_for_in_iterates_keys() {
        let program = main_with(vec![
            Statement::var(
                Type::map(Type::string(), Type::int()),
                "m",
                Expression::map(vec![(Expression::string("a"), Expression::int(1))]),
            ),
            Statement::for_in(None, "k", Expression::ident("m"), vec![print(Expression::ident("k"))]),
        ]);
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert!(instrs(main).iter().any(|i| matches!(
            i,
            IrInstr::IterBegin { kind: IterKind::Keys, elem, .. } if *elem == Type::string()
        )));
        assert!(main
            .blocks
            .iter()
            .any(|b| matches!(b.terminator, Terminator::BranchIterHasNext { .. })));
    }
}

// =============================================================================
// CONSTANTS AND EXTERNALS
// =============================================================================

mod constants {
    use super::*;

    #[test]
    fn test_group_member_lowers_to_const() {
        let program = main_with(vec![print(Expression::member(Expression::ident("Color"), "Green"))])
            .with_group(
                GroupDecl::new("Color", Type::int())
                    .with_member("Red", Expression::int(0))
                    .with_member(
                        "Green",
                        Expression::binary(
                            BinaryOp::Add,
                            Expression::member(Expression::ident("Color"), "Red"),
                            Expression::int(1),
                        ),
                    ),
            );
        let module = lower(&program);
        let main = module.get_function("main").unwrap();
        assert_eq!(ops(main), vec!["const", "print"]);
        assert!(matches!(
            instrs(main)[0],
            IrInstr::Const { value: IrConstant::Int(1), .. }
        ));
    }

    #[test]
    fn test_module_members() {
        let modules = ModuleRegistry::new().with_module(
            ModuleInfo::new("math")
                .with_function("sqrt", vec![Type::float()], Type::float())
                .with_constant("pi", Type::float(), ModuleValue::Float(3.5)),
        );
        let program = main_with(vec![print(Expression::method(
            Expression::ident("math"),
            "sqrt",
            vec![Expression::member(Expression::ident("math"), "pi")],
        ))])
        .with_import(Import::namespace("math"));
        let options = CompilerOptions::default().with_opt_level(OptLevel::None);
        let (module, _) = compile_to_ir(&program, &modules, &options).unwrap();
        let main = module.get_function("main").unwrap();
        let body = instrs(main);
        assert!(body
            .iter()
            .any(|i| matches!(i, IrInstr::Const { value: IrConstant::Float(v), .. } if *v == 3.5)));
        assert!(body.iter().any(|i| matches!(
            i,
            IrInstr::CallExtern { module, func, ret, .. }
                if module == "math" && func == "sqrt" && *ret == Type::float()
        )));
    }
}
