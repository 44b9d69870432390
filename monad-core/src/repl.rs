//! The interactive evaluator.
//!
//! Each accepted line is parsed as one expression and lowered into a
//! fresh, uniquely named void wrapper function appended to a live
//! module; the wrapper is verified, resolved through the execution
//! engine, and invoked immediately. The environment and module persist
//! across lines: `define`d names point at module globals so later
//! wrappers can load them.
//!
//! Line reading is the caller's problem (the CLI owns the prompt and
//! history); this engine only consumes complete lines.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::OptimizationLevel;

use crate::builtins;
use crate::codegen_llvm::{Lowerer, PrintSupport, StorageMode};
use crate::env::EnvStack;
use crate::error::CoreError;
use crate::parser;

pub struct ReplEngine<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    engine: ExecutionEngine<'ctx>,
    env: EnvStack<'ctx>,
    prints: PrintSupport<'ctx>,
    expr_count: u32,
}

impl<'ctx> ReplEngine<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<ReplEngine<'ctx>, CoreError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(CoreError::backend)?;

        let module = context.create_module("repl_module");
        let builder = context.create_builder();
        let engine = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| CoreError::backend(format!("failed to create execution engine: {}", e)))?;

        let mut env = EnvStack::new();
        builtins::register(&mut env);
        let mut prints = PrintSupport::new();

        // The builder needs a position before format-string globals can
        // be emitted, and they must exist before the first wrapper: park
        // them in a tiny init function.
        let init_type = context.void_type().fn_type(&[], false);
        let init_fn = module.add_function("__repl_init_globals", init_type, None);
        let init_bb = context.append_basic_block(init_fn, "entry");
        builder.position_at_end(init_bb);
        {
            let mut lowerer = Lowerer::new(
                context,
                &module,
                &builder,
                &mut env,
                &mut prints,
                StorageMode::ModuleGlobal,
            );
            lowerer.materialize_formats()?;
        }
        builder.build_return(None)?;

        Ok(ReplEngine {
            context,
            module,
            builder,
            engine,
            env,
            prints,
            expr_count: 0,
        })
    }

    /// Lower one input line into a fresh wrapper function. Returns the
    /// wrapper's name, or `None` for blank input. On any failure the
    /// unfinished wrapper is deleted, leaving the module as it was.
    pub fn compile_line(&mut self, line: &str) -> Result<Option<String>, CoreError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let ast = parser::parse_one(line)?;
        // define and show do their own printing; everything else gets
        // its result echoed.
        let should_print = !matches!(ast.head_symbol(), Some("define") | Some("show"));

        let name = format!("__repl_expr_{}", self.expr_count);
        let fn_type = self.context.void_type().fn_type(&[], false);
        let wrapper = self.module.add_function(&name, fn_type, None);
        let entry = self.context.append_basic_block(wrapper, "entry");
        self.builder.position_at_end(entry);

        let mut lowerer = Lowerer::new(
            self.context,
            &self.module,
            &self.builder,
            &mut self.env,
            &mut self.prints,
            StorageMode::ModuleGlobal,
        );
        let lowered = lowerer.lower_expr(&ast).and_then(|result| {
            if should_print {
                lowerer.emit_print_value(result.value, &result.ty)?;
            }
            Ok(())
        });

        if let Err(e) = lowered {
            unsafe { wrapper.delete() };
            return Err(e);
        }
        self.builder.build_return(None)?;

        if !wrapper.verify(true) {
            unsafe { wrapper.delete() };
            return Err(CoreError::backend("IR verification failed"));
        }

        self.expr_count += 1;
        Ok(Some(name))
    }

    /// Compile and immediately execute one input line.
    pub fn eval_line(&mut self, line: &str) -> Result<(), CoreError> {
        let Some(name) = self.compile_line(line)? else {
            return Ok(());
        };

        let address = self.engine.get_function_address(&name).map_err(|_| {
            CoreError::backend(format!("failed to get function address for {}", name))
        })?;
        let wrapper: extern "C" fn() = unsafe { std::mem::transmute(address) };
        wrapper();
        Ok(())
    }

    /// Names offered by tab completion: everything visible in the
    /// environment plus the type keywords.
    pub fn completion_names(&self) -> Vec<String> {
        let mut names = self.env.visible_names();
        for keyword in builtins::TYPE_NAMES {
            if !names.iter().any(|n| n == keyword) {
                names.push((*keyword).to_string());
            }
        }
        names.sort();
        names
    }

    pub fn env(&self) -> &EnvStack<'ctx> {
        &self.env
    }

    /// The live module's textual IR (for inspection and tests).
    pub fn module_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }
}
