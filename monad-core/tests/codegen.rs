
use harness::{lower_diag, lower_err, lower_ir, with_program};
use monad_core::env::EntryKind;
use monad_core::types::Type;

fn root_variable_type(src: &str, name: &str) -> Type {
    with_program(src, |program| {
        match &program.env.root().lookup(name).expect("missing entry").kind {
            EntryKind::Variable { ty, .. } => ty.clone(),
            other => panic!("unexpected entry kind: {other:?}"),
        }
    })
}

#[test]
fn arithmetic_fold_feeds_the_int_printer() {
    let ir = lower_ir("(show (+ 1 2 3))");
    assert!(ir.contains("@printf"), "missing printf declaration:\n{ir}");
    assert!(ir.contains("@fmt_int"), "missing %ld format:\n{ir}");
    assert!(ir.contains("i64 6"), "constants were not folded:\n{ir}");
}

#[test]
fn main_returns_the_final_value_as_i32() {
    let ir = lower_ir("(+ 1 2)");
    assert!(ir.contains("define i32 @main"), "{ir}");
    assert!(ir.contains("ret i32 3"), "{ir}");
}

#[test]
fn hex_define_keeps_its_base_and_formatter() {
    assert_eq!(root_variable_type("(define x 0xFF) (show x)", "x"), Type::Hex);
    let ir = lower_ir("(define x 0xFF) (show x)");
    assert!(ir.contains("0x%lX"), "hex formatter missing:\n{ir}");
}

#[test]
fn annotated_float_define_coerces_its_value() {
    let src = "(define [y :: Float] 3) (show (+ y 1))";
    assert_eq!(root_variable_type(src, "y"), Type::Float);
    let ir = lower_ir(src);
    assert!(ir.contains("fadd"), "float fold missing:\n{ir}");
    assert!(ir.contains("double"), "{ir}");
}

#[test]
fn function_definition_and_call() {
    let src = "(define (sq [x :: Int] -> Int) (* x x)) (show (sq 5))";
    let ir = lower_ir(src);
    assert!(ir.contains("define i64 @sq"), "{ir}");
    assert!(ir.contains("mul i64"), "{ir}");
    assert!(ir.contains("call i64 @sq"), "{ir}");

    with_program(src, |program| {
        let entry = program.env.root().lookup("sq").expect("missing sq");
        assert_eq!((entry.arity_min, entry.arity_max), (1, 1));
        assert_eq!(entry.describe(), "[sq :: Fn (x) -> Int]");
    });
}

#[test]
fn call_arguments_coerce_to_parameter_types() {
    // Float argument to an Int parameter: fptosi before the call.
    let ir = lower_ir("(define (id [x :: Int] -> Int) x) (show (id 2.5))");
    assert!(ir.contains("call i64 @id(i64 2)"), "{ir}");
}

#[test]
fn quoted_list_prints_structurally() {
    let ir = lower_ir("(show '(a 1 \"b\"))");
    assert!(ir.contains("@lparen"), "{ir}");
    assert!(ir.contains("@rparen"), "{ir}");
    assert!(ir.contains("@space"), "{ir}");
}

#[test]
fn binary_printer_is_generated_once() {
    let ir = lower_ir("(show 0b1010) (show 0b1)");
    assert!(ir.contains("@__print_binary"), "{ir}");
    assert_eq!(
        ir.matches("define i64 @__print_binary").count(),
        1,
        "binary printer must be generated once:\n{ir}"
    );
}

#[test]
fn unary_minus_preserves_the_operand_kind() {
    let ir = lower_ir("(show (- 5))");
    assert!(ir.contains("i64 -5"), "{ir}");
    let ir = lower_ir("(show (- 2.5))");
    assert!(ir.contains("double -2.500000e+00"), "{ir}");
    assert_eq!(
        root_variable_type("(define a 0xF0) (define b (- a))", "b"),
        Type::Hex
    );
}

#[test]
fn unary_reciprocal_promotes_to_float() {
    let ir = lower_ir("(show (/ 2))");
    assert!(ir.contains("5.000000e-01"), "{ir}");
    assert!(ir.contains("@fmt_float"), "{ir}");
}

#[test]
fn char_operands_widen_to_int() {
    let ir = lower_ir("(show (+ 'a' 1))");
    assert!(ir.contains("i64 98"), "{ir}");
    assert!(ir.contains("@fmt_int"), "{ir}");
}

#[test]
fn same_base_arithmetic_keeps_the_base_formatter() {
    let ir = lower_ir("(show (+ 0xF0 0x0F))");
    assert!(ir.contains("i64 255"), "{ir}");
    assert!(ir.contains("0x%lX"), "{ir}");
}

#[test]
fn lowered_modules_verify() {
    let src = "(define (sq [x :: Int] -> Int) (* x x))\n\
               (define x 0xFF)\n\
               (show (sq 3))\n\
               (show '(a 1 \"b\"))\n\
               (show 0b1010)\n\
               (show (+ x 1))";
    with_program(src, |program| {
        program.module.verify().expect("module must verify");
    });
}

#[test]
fn mixing_bases_is_fatal() {
    assert_eq!(
        lower_err("(+ 0xFF 0b10)"),
        "cannot mix Hex and Bin in arithmetic"
    );
}

#[test]
fn unbound_symbols_carry_their_span() {
    let diag = lower_diag("(show zz)");
    assert_eq!(diag.message, "unbound variable: zz");
    assert_eq!((diag.span.line, diag.span.column), (1, 7));
}

#[test]
fn definitions_are_not_visible_before_their_form() {
    assert_eq!(lower_err("(show x) (define x 1)"), "unbound variable: x");
}

#[test]
fn arity_errors() {
    assert_eq!(
        lower_err("(show 1 2)"),
        "'show' requires at most 1 argument(s), got 2"
    );
    assert_eq!(
        lower_err("(define (sq [x :: Int] -> Int) (* x x)) (sq 1 2)"),
        "function 'sq' expects 1 arguments, got 2"
    );
}

#[test]
fn binding_errors() {
    assert_eq!(lower_err("(define x 1) (x 2)"), "'x' is a variable, not a function");
    assert_eq!(lower_err("(f 1)"), "unknown function: f");
    assert_eq!(
        lower_err("(define (f [x]) x) (define g f)"),
        "cannot bind 'f': functions are not first-class values"
    );
}

#[test]
fn type_errors() {
    assert_eq!(
        lower_err("(+ \"a\" 1)"),
        "cannot perform arithmetic on type String"
    );
    assert_eq!(
        lower_err("(define (f [x :: Wat]) x)"),
        "unknown type 'Wat'"
    );
    assert_eq!(
        lower_err("(define (f [x] -> Wat) x)"),
        "unknown return type 'Wat'"
    );
}

#[test]
fn empty_programs_are_rejected() {
    assert_eq!(lower_err(""), "no expression(s) found");
    assert_eq!(lower_err("; only a comment\n"), "no expression(s) found");
}
