//! Optimization pipeline tests

mod common;

use common::*;
use protoscript_engine::ast::*;
use protoscript_engine::compiler::ir::{IrConstant, IrFunction, IrInstr, Temp};
use protoscript_engine::{OptLevel, Optimizer, Type};

/// `print(double(21))`
fn doubled() -> Program {
    main_with(vec![print(Expression::call("double", vec![Expression::int(21)]))]).with_function(double())
}

fn has_call(func: &IrFunction) -> bool {
    ops(func).contains(&"call_static")
}

fn definition(func: &IrFunction, temp: Temp) -> Option<&IrInstr> {
    instrs(func).into_iter().rev().find(|i| i.dest() == Some(temp))
}

#[test]
fn test_full_inlines_and_folds() {
    let module = ir_at(&doubled(), OptLevel::Full);
    let main = module.get_function("main").unwrap();
    assert!(!has_call(main));

    let printed = instrs(main)
        .into_iter()
        .find_map(|i| match i {
            IrInstr::Print { value } => Some(*value),
            _ => None,
        })
        .unwrap();
    assert!(matches!(
        definition(main, printed),
        Some(IrInstr::Const { value: IrConstant::Int(42), .. })
    ));
    // The callee itself keeps its overflow check
    assert!(ops(module.get_function("double").unwrap()).contains(&"check_overflow"));
}

#[test]
fn test_lower_levels_keep_the_call() {
    for level in [OptLevel::None, OptLevel::Basic] {
        let module = ir_at(&doubled(), level);
        assert!(has_call(module.get_function("main").unwrap()), "{:?}", level);
    }
}

#[test]
fn test_optimization_is_idempotent() {
    let optimizer = Optimizer::new(OptLevel::Full);
    let (once, stats) = optimizer.optimize(&lower(&doubled()));
    assert_eq!(stats.calls_inlined, 1);
    assert!(!stats.is_unchanged());

    let (twice, stats) = optimizer.optimize(&once);
    assert!(stats.is_unchanged(), "{:?}", stats);
    assert_eq!(twice, once);
}

/// Loop with a short-circuit condition, a ternary and repeated index reads
fn scanner() -> Program {
    let at_i = || Expression::index(Expression::ident("xs"), Expression::ident("i"));
    let scan = FunctionDecl::new(
        "scan",
        vec![Param::new("xs", Type::list(Type::int()))],
        Type::int(),
        vec![
            Statement::var(Type::int(), "i", Expression::int(0)),
            Statement::var(Type::int(), "hits", Expression::int(0)),
            Statement::var(
                Type::int(),
                "limit",
                Expression::binary(BinaryOp::Mul, Expression::int(5), Expression::int(2)),
            ),
            Statement::while_(
                Expression::binary(
                    BinaryOp::And,
                    Expression::binary(BinaryOp::Less, Expression::ident("i"), Expression::int(3)),
                    Expression::binary(BinaryOp::Less, Expression::ident("hits"), Expression::ident("limit")),
                ),
                vec![
                    Statement::var(
                        Type::int(),
                        "pair",
                        Expression::binary(BinaryOp::Add, at_i(), at_i()),
                    ),
                    Statement::compound(
                        Expression::ident("hits"),
                        BinaryOp::Add,
                        Expression::ternary(
                            Expression::binary(BinaryOp::Greater, Expression::ident("pair"), Expression::int(2)),
                            at_i(),
                            Expression::binary(BinaryOp::Sub, Expression::int(1), Expression::int(1)),
                        ),
                    ),
                    Statement::compound(Expression::ident("i"), BinaryOp::Add, Expression::int(1)),
                ],
            ),
            Statement::ret(Expression::ident("hits")),
        ],
    );
    main_with(vec![
        Statement::var(
            Type::list(Type::int()),
            "xs",
            Expression::list(vec![Expression::int(1), Expression::int(2), Expression::int(3)]),
        ),
        print(Expression::call("scan", vec![Expression::ident("xs")])),
    ])
    .with_function(scan)
}

#[test]
fn test_optimization_is_idempotent_across_blocks() {
    let module = lower(&scanner());
    assert!(module.get_function("scan").unwrap().blocks.len() > 3);

    let optimizer = Optimizer::new(OptLevel::Full);
    let (once, stats) = optimizer.optimize(&module);
    assert!(stats.constants_folded > 0);
    assert!(stats.checks_proven > 0);
    // Not a leaf, so the call survives
    assert!(has_call(once.get_function("main").unwrap()));

    let (twice, stats) = optimizer.optimize(&once);
    assert!(stats.is_unchanged(), "{:?}", stats);
    assert_eq!(twice, once);
    assert!(once.validate().is_ok());
}

#[test]
fn test_input_module_is_not_mutated() {
    let module = lower(&doubled());
    let snapshot = module.clone();
    let (optimized, _) = Optimizer::new(OptLevel::Full).optimize(&module);
    assert_eq!(module, snapshot);
    assert!(has_call(module.get_function("main").unwrap()));
    assert_ne!(optimized, module);
}

#[test]
fn test_constant_checks_are_proven() {
    let program = main_with(vec![print(Expression::binary(
        BinaryOp::Div,
        Expression::int(10),
        Expression::int(2),
    ))]);
    let (_, stats) = Optimizer::new(OptLevel::Basic).optimize(&lower(&program));
    assert_eq!(stats.checks_proven, 1);
    let module = ir_at(&program, OptLevel::Basic);
    let main = module.get_function("main").unwrap();
    assert!(!ops(main).contains(&"check_div_zero"));
}
