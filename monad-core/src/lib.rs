//! Compiler core for the Monad language.
//!
//! Pipeline:
//!   source
//!     -> lexer (position tracked, literal text retained)
//!     -> parser (S-expressions, bracket annotations, lambda/define)
//!     -> typed lowering over LLVM (environment-directed)
//!     -> artifacts (.ll/.bc/.s/.o or a linked executable)
//!
//! The interactive evaluator shares the lowering engine and JIT-compiles
//! one wrapper function per input line against a persistent module.

pub use inkwell;

pub mod span;
pub mod source;
pub mod diagnostic;
pub mod error;
pub mod log;

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod env;
pub mod builtins;
pub mod codegen_llvm;
pub mod compiler;
pub mod repl;

pub use compiler::{compile, CompileOptions, CompileOutput};
pub use error::CoreError;
pub use repl::ReplEngine;
pub use source::SourceInfo;
