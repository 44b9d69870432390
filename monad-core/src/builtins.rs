//! Builtin registration.
//!
//! The builtin forms are pre-registered with their arity bounds so call
//! sites can reject bad argument counts before lowering and the REPL can
//! complete their names without consulting the lowering engine.

use crate::env::EnvStack;

/// Type keywords offered by REPL completion alongside environment names.
pub const TYPE_NAMES: &[&str] = &[
    "Int", "Float", "Char", "String", "Hex", "Bin", "Oct", "Bool",
];

/// Register the builtin forms into the root frame.
pub fn register(env: &mut EnvStack<'_>) {
    let root = env.innermost_mut();
    // Arithmetic: unary up to unlimited.
    root.insert_builtin("+", 1, -1);
    root.insert_builtin("-", 1, -1);
    root.insert_builtin("*", 1, -1);
    root.insert_builtin("/", 1, -1);
    root.insert_builtin("show", 1, 1);
    root.insert_builtin("quote", 1, 1);
    // define is a special form; registered so completion and early
    // arity checks see it.
    root.insert_builtin("define", 2, -1);
}
