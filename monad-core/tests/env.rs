use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::PointerValue;
use monad_core::env::{EntryKind, Env, EnvStack};
use monad_core::types::{FnParam, Type};

/// A throwaway function body so tests can allocate real storage handles
/// to insert into the environment.
fn scratch<'ctx>(context: &'ctx Context) -> (Module<'ctx>, Builder<'ctx>) {
    let module = context.create_module("env_test");
    let builder = context.create_builder();
    let f = module.add_function("f", context.void_type().fn_type(&[], false), None);
    builder.position_at_end(context.append_basic_block(f, "entry"));
    (module, builder)
}

fn slot<'ctx>(context: &'ctx Context, builder: &Builder<'ctx>) -> PointerValue<'ctx> {
    builder
        .build_alloca(context.i64_type(), "slot")
        .expect("alloca")
}

fn variable_type<'ctx>(env: &Env<'ctx>, name: &str) -> Type {
    match &env.lookup(name).expect("missing entry").kind {
        EntryKind::Variable { ty, .. } => ty.clone(),
        other => panic!("unexpected entry kind: {other:?}"),
    }
}

#[test]
fn insert_replaces_in_place() {
    let context = Context::create();
    let (_module, builder) = scratch(&context);

    let mut env = Env::new();
    env.insert_variable("x", Type::Int, slot(&context, &builder));
    env.insert_variable("x", Type::Hex, slot(&context, &builder));
    assert_eq!(env.len(), 1);
    assert_eq!(variable_type(&env, "x"), Type::Hex);
}

#[test]
fn rebinding_across_entry_kinds_replaces_too() {
    let context = Context::create();
    let (_module, builder) = scratch(&context);

    let mut env = Env::new();
    env.insert_builtin("x", 1, 1);
    env.insert_variable("x", Type::Float, slot(&context, &builder));
    assert_eq!(env.len(), 1);
    assert!(matches!(
        env.lookup("x").unwrap().kind,
        EntryKind::Variable { .. }
    ));
}

#[test]
fn lookup_is_innermost_first_and_pop_unshadows() {
    let context = Context::create();
    let (_module, builder) = scratch(&context);

    let mut stack = EnvStack::new();
    stack
        .innermost_mut()
        .insert_variable("x", Type::Int, slot(&context, &builder));
    stack.push();
    stack
        .innermost_mut()
        .insert_variable("x", Type::Float, slot(&context, &builder));

    match &stack.lookup("x").unwrap().kind {
        EntryKind::Variable { ty, .. } => assert_eq!(*ty, Type::Float),
        other => panic!("unexpected entry kind: {other:?}"),
    }

    stack.pop();
    match &stack.lookup("x").unwrap().kind {
        EntryKind::Variable { ty, .. } => assert_eq!(*ty, Type::Int),
        other => panic!("unexpected entry kind: {other:?}"),
    }
}

#[test]
fn inner_definitions_do_not_leak_outward() {
    let context = Context::create();
    let (_module, builder) = scratch(&context);

    let mut stack = EnvStack::new();
    stack.push();
    stack
        .innermost_mut()
        .insert_variable("tmp", Type::Int, slot(&context, &builder));
    stack.pop();
    assert!(stack.lookup("tmp").is_none());
}

#[test]
fn builtin_arity_bounds() {
    let mut env = Env::new();
    env.insert_builtin("show", 1, 1);
    env.insert_builtin("+", 1, -1);

    let show = env.lookup("show").unwrap();
    assert!(show.check_arity(1).is_ok());
    assert_eq!(
        show.check_arity(0).unwrap_err(),
        "'show' requires at least 1 argument(s), got 0"
    );
    assert_eq!(
        show.check_arity(2).unwrap_err(),
        "'show' requires at most 1 argument(s), got 2"
    );

    let plus = env.lookup("+").unwrap();
    assert!(plus.check_arity(1).is_ok());
    assert!(plus.check_arity(17).is_ok());
    assert!(plus.check_arity(0).is_err());
}

#[test]
fn function_arity_is_exactly_its_parameter_count() {
    let context = Context::create();
    let module = context.create_module("env_test");
    let f = module.add_function("sq", context.f64_type().fn_type(&[], false), None);

    let mut env = Env::new();
    env.insert_function(
        "sq",
        vec![FnParam::named("x", Type::Int)],
        Type::Int,
        f,
        Some("squares".into()),
    );
    let entry = env.lookup("sq").unwrap();
    assert_eq!((entry.arity_min, entry.arity_max), (1, 1));
    assert!(entry.check_arity(1).is_ok());
    assert!(entry.check_arity(2).is_err());
}

#[test]
fn describe_formats() {
    let context = Context::create();
    let (module, builder) = scratch(&context);

    let mut env = Env::new();
    env.insert_variable("x", Type::Hex, slot(&context, &builder));
    env.insert_builtin("+", 1, -1);
    env.insert_builtin("show", 1, 1);
    let sq = module.add_function("sq", context.i64_type().fn_type(&[], false), None);
    env.insert_function(
        "sq",
        vec![FnParam::named("x", Type::Int)],
        Type::Int,
        sq,
        Some("squares its argument".into()),
    );

    assert_eq!(env.lookup("x").unwrap().describe(), "[x :: Hex]");
    assert_eq!(env.lookup("+").unwrap().describe(), "[+ :: Fn (_ . _)]");
    assert_eq!(env.lookup("show").unwrap().describe(), "[show :: Fn (_)]");
    assert_eq!(
        env.lookup("sq").unwrap().describe(),
        "[sq :: Fn (x) -> Int]  ; squares its argument"
    );
}
