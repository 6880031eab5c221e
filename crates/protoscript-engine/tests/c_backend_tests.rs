//! C generation tests over complete programs

mod common;

use common::*;
use protoscript_engine::ast::*;
use protoscript_engine::{compile_to_c, generate_c, CompilerOptions, ModuleRegistry, OptLevel, Type};
use std::process::{Command, Output};
use tempfile::TempDir;

fn speaker(text: &str) -> FunctionDecl {
    FunctionDecl::new("speak", vec![], Type::string(), vec![Statement::ret(Expression::string(text))])
}

fn animals() -> Program {
    main_with(vec![
        Statement::var(
            Type::named("Animal"),
            "a",
            Expression::method(Expression::ident("Dog"), "clone", vec![]),
        ),
        print(Expression::method(Expression::ident("a"), "speak", vec![])),
    ])
    .with_prototype(PrototypeDecl::new("Animal").with_method(speaker("...")))
    .with_prototype(PrototypeDecl::new("Dog").with_parent("Animal").with_method(speaker("woof")))
}

fn add_and_divide() -> Program {
    let binary = |name: &str, op: BinaryOp| {
        FunctionDecl::new(
            name,
            vec![Param::new("a", Type::int()), Param::new("b", Type::int())],
            Type::int(),
            vec![Statement::ret(Expression::binary(op, Expression::ident("a"), Expression::ident("b")))],
        )
    };
    main_with(vec![
        print(Expression::call("add", vec![Expression::int(1), Expression::int(2)])),
        print(Expression::call("divide", vec![Expression::int(8), Expression::int(4)])),
    ])
    .with_function(binary("add", BinaryOp::Add))
    .with_function(binary("divide", BinaryOp::Div))
}

// =============================================================================
// PROTOTYPES
// =============================================================================

mod prototypes {
    use super::*;

    #[test]
    fn test_override_dispatch() {
        let c = c_source(&animals());
        assert!(c.contains("switch (self->proto_id)"));
        assert!(c.contains("psm_Dog__speak((ps_Dog*)self)"));
        assert!(c.contains("psd_Animal__speak("));
        assert!(c.contains("ps_new_object(sizeof(ps_Dog)"));
        assert!(c.contains("struct ps_Dog {"));
    }

    #[test]
    fn test_try_catch() {
        let program = main_with(vec![Statement::try_(
            vec![Statement::throw(Expression::method(
                Expression::ident("ValueException"),
                "clone",
                vec![],
            ))],
            vec![CatchClause::new(
                "ValueException",
                "e",
                vec![print(Expression::method(Expression::ident("e"), "getMessage", vec![]))],
            )],
        )]);
        let c = c_source(&program);
        assert!(c.contains("setjmp(ps_try0.env)"));
        assert!(c.contains("volatile"));
        assert!(c.contains("ps_instance_of("));
        assert!(c.contains("psm_Exception__getMessage"));
        assert!(c.contains("ps_throw("));
    }
}

// =============================================================================
// CONTAINERS
// =============================================================================

mod containers {
    use super::*;

    #[test]
    fn test_for_of_list() {
        let program = main_with(vec![
            Statement::var(
                Type::list(Type::int()),
                "xs",
                Expression::list(vec![Expression::int(1), Expression::int(2)]),
            ),
            Statement::for_of(Some(Type::int()), "x", Expression::ident("xs"), vec![print(Expression::ident("x"))]),
        ]);
        let c = c_source(&program);
        assert!(c.contains("->ptr["));
        assert!(c.contains("goto L_each_body"));
        assert!(c.contains("ps_list_int_push("));
    }

    #[test]
    fn test_map_read_checks_key() {
        let program = main_with(vec![
            Statement::var(
                Type::map(Type::string(), Type::int()),
                "m",
                Expression::map(vec![(Expression::string("a"), Expression::int(1))]),
            ),
            print(Expression::index(Expression::ident("m"), Expression::string("a"))),
        ]);
        let c = c_source(&program);
        assert!(c.contains("ps_check_key(ps_map_string_int_has("));
    }
}

// =============================================================================
// CHECKS AND LAYOUT
// =============================================================================

mod checks {
    use super::*;

    #[test]
    fn test_arithmetic_checks() {
        let c = c_source(&add_and_divide());
        assert!(c.contains("ps_check_add_int("));
        assert!(c.contains("ps_check_div_zero("));
        assert!(c.contains("psf_divide(int64_t v_a, int64_t v_b)"));
    }

    #[test]
    fn test_every_block_has_a_label() {
        let module = ir_at(&animals(), OptLevel::Full);
        let c = generate_c(&module, true).unwrap();
        for func in &module.functions {
            for block in &func.blocks {
                let label = format!("L_{}:;", block.label);
                assert!(c.contains(&label), "missing {} in {}", label, func.name);
            }
        }
    }

    #[test]
    fn test_runtime_header_instead_of_prelude() {
        let options = CompilerOptions {
            emit_prelude: false,
            ..CompilerOptions::default()
        };
        let c = compile_to_c(&add_and_divide(), &ModuleRegistry::new(), &options).unwrap();
        assert!(c.contains("#include \"protoscript_runtime.h\""));
        assert!(!c.contains("#include <setjmp.h>"));
        assert!(c.contains("int main(void) {"));
    }
}

// =============================================================================
// NATIVE EXECUTION
// =============================================================================

mod native {
    use super::*;

    fn cc_available() -> bool {
        Command::new("cc").arg("--version").output().is_ok_and(|o| o.status.success())
    }

    /// Build the generated unit with the system C compiler and run it;
    /// `None` when no compiler is installed
    fn build_and_run(program: &Program) -> Option<Output> {
        if !cc_available() {
            eprintln!("cc not found, skipping native run");
            return None;
        }
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("main.c");
        let binary = dir.path().join("main");
        std::fs::write(&source, c_source(program)).unwrap();

        let build = Command::new("cc")
            .arg(&source)
            .arg("-o")
            .arg(&binary)
            .arg("-lm")
            .output()
            .unwrap();
        assert!(
            build.status.success(),
            "cc failed:\n{}",
            String::from_utf8_lossy(&build.stderr)
        );
        Some(Command::new(&binary).output().unwrap())
    }

    fn stdout(output: &Output) -> String {
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    #[test]
    fn test_inlined_call_prints_result() {
        let program = main_with(vec![print(Expression::call("double", vec![Expression::int(21)]))])
            .with_function(double());
        let Some(output) = build_and_run(&program) else {
            return;
        };
        assert!(output.status.success());
        assert_eq!(stdout(&output), "42\n");
    }

    #[test]
    fn test_dispatch_reaches_override() {
        let Some(output) = build_and_run(&animals()) else {
            return;
        };
        assert!(output.status.success());
        assert_eq!(stdout(&output), "woof\n");
    }

    #[test]
    fn test_list_loop_sums_elements() {
        let program = main_with(vec![
            Statement::var(
                Type::list(Type::int()),
                "xs",
                Expression::list(vec![Expression::int(1), Expression::int(2), Expression::int(3)]),
            ),
            Statement::var(Type::int(), "total", Expression::int(0)),
            Statement::for_of(
                Some(Type::int()),
                "x",
                Expression::ident("xs"),
                vec![Statement::compound(Expression::ident("total"), BinaryOp::Add, Expression::ident("x"))],
            ),
            print(Expression::ident("total")),
        ]);
        let Some(output) = build_and_run(&program) else {
            return;
        };
        assert!(output.status.success());
        assert_eq!(stdout(&output), "6\n");
    }

    #[test]
    fn test_division_by_zero_terminates() {
        let program = main_with(vec![
            Statement::var(Type::int(), "x", Expression::int(5)),
            Statement::var(Type::int(), "y", Expression::int(0)),
            Statement::var(
                Type::int(),
                "z",
                Expression::binary(BinaryOp::Div, Expression::ident("x"), Expression::ident("y")),
            ),
        ]);
        let Some(output) = build_and_run(&program) else {
            return;
        };
        assert_eq!(output.status.code(), Some(1));
        assert_eq!(stdout(&output), "");
        assert_eq!(
            String::from_utf8_lossy(&output.stderr),
            "1:1: R1003 division by zero\n"
        );
    }
}
