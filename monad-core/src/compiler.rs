//! Batch compilation driver.
//!
//! Pipeline:
//!   source
//!     -> reader (parse_all)
//!     -> lowering into a `main` function (stack storage)
//!     -> module verification
//!     -> artifact emission (.ll / .bc / .s / .o), or an object file
//!        handed back for external linking when no artifact was asked for
//!
//! Lowering is exposed separately from artifact emission so tests can
//! inspect the produced module and environment without touching disk.

use std::path::{Path, PathBuf};

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;

use crate::builtins;
use crate::codegen_llvm::{Lowerer, PrintSupport, StorageMode};
use crate::diagnostic::Diagnostic;
use crate::env::EnvStack;
use crate::error::CoreError;
use crate::log::vlog;
use crate::parser;
use crate::source::SourceInfo;
use crate::span::Span;

/// Which artifacts to emit. With none selected the driver produces an
/// object file for the caller to link into an executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub emit_ir: bool,
    pub emit_bc: bool,
    pub emit_asm: bool,
    pub emit_obj: bool,
}

impl CompileOptions {
    pub fn wants_explicit_artifact(&self) -> bool {
        self.emit_ir || self.emit_bc || self.emit_asm || self.emit_obj
    }
}

#[derive(Debug)]
pub struct CompileOutput {
    /// Artifacts written, in emission order.
    pub written: Vec<PathBuf>,
    /// The intermediate object to pass to the external linker (and then
    /// delete); present only when no explicit artifact was requested.
    pub object_to_link: Option<PathBuf>,
}

/// A lowered but not yet emitted program.
pub struct LoweredProgram<'ctx> {
    pub module: Module<'ctx>,
    pub env: EnvStack<'ctx>,
}

/// Parse and lower a whole source file into a fresh module whose `main`
/// evaluates the top-level forms in order.
pub fn lower_program<'ctx>(
    context: &'ctx Context,
    source: &SourceInfo,
) -> Result<LoweredProgram<'ctx>, CoreError> {
    let exprs = parser::parse_all(&source.text)?;
    if exprs.is_empty() {
        return Err(CoreError::from_diagnostic(Diagnostic::error(
            "no expression(s) found",
            Span::point(1, 1),
        )));
    }

    println!("Compiling {} expression(s)", exprs.len());

    let module = context.create_module("monad_module");
    let builder = context.create_builder();
    let mut env = EnvStack::new();
    builtins::register(&mut env);
    let mut prints = PrintSupport::new();

    let i32_type = context.i32_type();
    let main_fn = module.add_function("main", i32_type.fn_type(&[], false), None);
    let entry = context.append_basic_block(main_fn, "entry");
    builder.position_at_end(entry);

    let mut last = None;
    {
        let mut lowerer = Lowerer::new(
            context,
            &module,
            &builder,
            &mut env,
            &mut prints,
            StorageMode::Stack,
        );
        for expr in &exprs {
            println!("  {}", expr);
            last = Some(lowerer.lower_expr(expr)?);
        }
    }

    // main returns the final expression's value as i32.
    let result_i32 = match last {
        Some(last) if last.ty.is_integer() => {
            let v = last.value.into_int_value();
            match v.get_type().get_bit_width() {
                w if w < 32 => builder.build_int_s_extend(v, i32_type, "result")?,
                32 => v,
                _ => builder.build_int_truncate(v, i32_type, "result")?,
            }
        }
        Some(last) if last.ty.is_float() => {
            builder.build_float_to_signed_int(last.value.into_float_value(), i32_type, "result")?
        }
        _ => i32_type.const_zero(),
    };
    builder.build_return(Some(&result_i32))?;

    Ok(LoweredProgram { module, env })
}

fn artifact_path(base: &Path, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", base.display(), extension))
}

/// Compile a source file to the selected artifacts next to `base`.
pub fn compile(
    source: &SourceInfo,
    base: &Path,
    options: &CompileOptions,
) -> Result<CompileOutput, CoreError> {
    Target::initialize_native(&InitializationConfig::default())
        .map_err(CoreError::backend)?;

    let context = Context::create();
    let program = lower_program(&context, source)?;
    let module = &program.module;

    module
        .verify()
        .map_err(|e| CoreError::backend(format!("module verification failed: {}", e)))?;
    vlog!("module verified: {} functions", module.get_functions().count());

    let mut output = CompileOutput {
        written: Vec::new(),
        object_to_link: None,
    };

    if options.emit_ir {
        let path = artifact_path(base, "ll");
        module
            .print_to_file(&path)
            .map_err(|e| CoreError::backend(format!("failed to write IR: {}", e)))?;
        println!("Wrote IR to {}", path.display());
        output.written.push(path);
    }

    if options.emit_bc {
        let path = artifact_path(base, "bc");
        if !module.write_bitcode_to_path(&path) {
            return Err(CoreError::backend("failed to write bitcode"));
        }
        println!("Wrote bitcode to {}", path.display());
        output.written.push(path);
    }

    let link = !options.wants_explicit_artifact();
    if options.emit_asm || options.emit_obj || link {
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| CoreError::backend(format!("failed to get target: {}", e)))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| CoreError::backend("failed to create target machine"))?;

        if options.emit_asm {
            let path = artifact_path(base, "s");
            machine
                .write_to_file(module, FileType::Assembly, &path)
                .map_err(|e| CoreError::backend(format!("failed to emit assembly: {}", e)))?;
            println!("Wrote assembly to {}", path.display());
            output.written.push(path);
        }

        if options.emit_obj || link {
            let path = artifact_path(base, "o");
            machine
                .write_to_file(module, FileType::Object, &path)
                .map_err(|e| CoreError::backend(format!("failed to emit object file: {}", e)))?;
            if options.emit_obj {
                println!("Wrote object file to {}", path.display());
                output.written.push(path.clone());
            }
            if link {
                output.object_to_link = Some(path);
            }
        }
    }

    println!("\nSymbol Table:");
    println!("{}", program.env.dump_root());

    Ok(output)
}
