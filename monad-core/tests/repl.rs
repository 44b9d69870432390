use inkwell::context::Context;
use monad_core::env::EntryKind;
use monad_core::repl::ReplEngine;
use monad_core::types::Type;

#[test]
fn wrapper_names_increment_per_line() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    assert_eq!(
        engine.compile_line("(define x 42)").unwrap().as_deref(),
        Some("__repl_expr_0")
    );
    assert_eq!(
        engine.compile_line("(show x)").unwrap().as_deref(),
        Some("__repl_expr_1")
    );
}

#[test]
fn blank_lines_produce_no_wrapper() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    assert_eq!(engine.compile_line("").unwrap(), None);
    assert_eq!(engine.compile_line("   \t").unwrap(), None);
}

#[test]
fn define_creates_a_module_global() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    engine.compile_line("(define x 42)").unwrap();

    let ir = engine.module_ir();
    assert!(ir.contains("@x = global i64"), "{ir}");

    match &engine.env().lookup("x").expect("missing x").kind {
        EntryKind::Variable { ty, .. } => assert_eq!(*ty, Type::Int),
        other => panic!("unexpected entry kind: {other:?}"),
    }
}

#[test]
fn earlier_defines_are_visible_to_later_lines() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    engine.compile_line("(define x 1)").unwrap();
    engine.compile_line("(+ x 1)").unwrap();

    let err = engine.compile_line("(+ y 1)").unwrap_err();
    assert_eq!(err.diagnostics()[0].message, "unbound variable: y");
}

#[test]
fn plain_expressions_get_an_extra_print() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    engine.compile_line("(+ 1 2)").unwrap();

    let ir = engine.module_ir();
    assert!(ir.contains("__repl_expr_0"), "{ir}");
    assert!(ir.contains("i64 3"), "result print missing:\n{ir}");
}

#[test]
fn failed_lines_leave_no_wrapper_behind() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");

    assert!(engine.compile_line("(show zz)").is_err());
    assert!(
        !engine.module_ir().contains("__repl_expr_0"),
        "failed wrapper must be deleted"
    );

    // The counter did not advance; the next line reuses the name.
    assert_eq!(
        engine.compile_line("(define ok 1)").unwrap().as_deref(),
        Some("__repl_expr_0")
    );
}

#[test]
fn completion_offers_env_names_and_type_keywords() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");

    let names = engine.completion_names();
    for expected in ["+", "-", "show", "quote", "define", "Int", "String", "Hex"] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }

    engine.compile_line("(define answer 42)").unwrap();
    assert!(engine.completion_names().iter().any(|n| n == "answer"));
}

#[test]
fn jit_executes_a_compiled_line() {
    let context = Context::create();
    let mut engine = ReplEngine::new(&context).expect("engine");
    engine.eval_line("(define x 7)").expect("eval");

    match &engine.env().lookup("x").expect("missing x").kind {
        EntryKind::Variable { ty, .. } => assert_eq!(*ty, Type::Int),
        other => panic!("unexpected entry kind: {other:?}"),
    }
}
