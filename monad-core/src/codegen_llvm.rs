//! Typed-IR lowering over LLVM.
//!
//! The lowering engine walks each form, resolves symbols against the
//! environment stack, and emits IR through one shared builder. Batch
//! compilation and the REPL use the same engine; the only difference is
//! `StorageMode`: batch `define`s live in stack slots of the current
//! function, REPL `define`s live in module globals so their address
//! survives across separately JIT-compiled wrapper functions.
//!
//! Print plumbing (the printf declaration, the `%…\n` format-string
//! globals, the generated `__print_binary` helper) is materialised at
//! most once per module and memoised in `PrintSupport`.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, FloatValue, FunctionValue, IntValue, PointerValue,
};
use inkwell::{AddressSpace, IntPredicate};

use crate::ast::{Ast, AstKind, Lambda};
use crate::diagnostic::Diagnostic;
use crate::env::{EntryKind, EnvStack};
use crate::error::CoreError;
use crate::span::Span;
use crate::types::{infer_literal_type, parse_type_annotation, promote, FnParam, PromoteError, Type};

/// Where `define` allocates storage for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// A stack slot in the current function (batch compilation).
    Stack,
    /// A module global with a null initialiser (the REPL, where later
    /// wrapper functions must still see the binding).
    ModuleGlobal,
}

/// A lowered expression: the IR value and its inferred Monad type.
#[derive(Debug, Clone)]
pub struct Lowered<'ctx> {
    pub value: BasicValueEnum<'ctx>,
    pub ty: Type,
}

/// Per-module print helpers, created lazily.
#[derive(Debug, Default)]
pub struct PrintSupport<'ctx> {
    printf: Option<FunctionValue<'ctx>>,
    fmt_str: Option<PointerValue<'ctx>>,
    fmt_char: Option<PointerValue<'ctx>>,
    fmt_int: Option<PointerValue<'ctx>>,
    fmt_float: Option<PointerValue<'ctx>>,
    fmt_hex: Option<PointerValue<'ctx>>,
    fmt_oct: Option<PointerValue<'ctx>>,
    print_binary: Option<FunctionValue<'ctx>>,
}

impl<'ctx> PrintSupport<'ctx> {
    pub fn new() -> PrintSupport<'ctx> {
        PrintSupport::default()
    }
}

pub struct Lowerer<'ctx, 'a> {
    context: &'ctx Context,
    module: &'a Module<'ctx>,
    builder: &'a Builder<'ctx>,
    env: &'a mut EnvStack<'ctx>,
    prints: &'a mut PrintSupport<'ctx>,
    storage: StorageMode,
}

impl<'ctx, 'a> Lowerer<'ctx, 'a> {
    pub fn new(
        context: &'ctx Context,
        module: &'a Module<'ctx>,
        builder: &'a Builder<'ctx>,
        env: &'a mut EnvStack<'ctx>,
        prints: &'a mut PrintSupport<'ctx>,
        storage: StorageMode,
    ) -> Lowerer<'ctx, 'a> {
        Lowerer {
            context,
            module,
            builder,
            env,
            prints,
            storage,
        }
    }

    fn err(&self, message: impl Into<String>, span: Span) -> CoreError {
        CoreError::from_diagnostic(Diagnostic::error(message, span))
    }

    /// The LLVM representation of a Monad type. All integer kinds share
    /// i64; Char is i8 and widens before arithmetic.
    fn type_to_llvm(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Int | Type::Hex | Type::Bin | Type::Oct => {
                self.context.i64_type().as_basic_type_enum()
            }
            Type::Float => self.context.f64_type().as_basic_type_enum(),
            Type::Char => self.context.i8_type().as_basic_type_enum(),
            Type::Str => self
                .context
                .i8_type()
                .ptr_type(AddressSpace::default())
                .as_basic_type_enum(),
            Type::Bool => self.context.bool_type().as_basic_type_enum(),
            Type::Fn(_) | Type::Unknown => self.context.f64_type().as_basic_type_enum(),
        }
    }

    fn const_zero(&self, ty: &Type) -> BasicValueEnum<'ctx> {
        match self.type_to_llvm(ty) {
            BasicTypeEnum::IntType(t) => t.const_zero().into(),
            BasicTypeEnum::FloatType(t) => t.const_zero().into(),
            BasicTypeEnum::PointerType(t) => t.const_null().into(),
            _ => self.context.f64_type().const_zero().into(),
        }
    }

    fn dummy_result(&self) -> Lowered<'ctx> {
        Lowered {
            value: self.context.f64_type().const_float(0.0).into(),
            ty: Type::Float,
        }
    }

    // ---------------------------------------------------------------
    // Print plumbing
    // ---------------------------------------------------------------

    fn printf(&mut self) -> FunctionValue<'ctx> {
        if let Some(f) = self.prints.printf {
            return f;
        }
        let f = self.module.get_function("printf").unwrap_or_else(|| {
            let i8_ptr = self.context.i8_type().ptr_type(AddressSpace::default());
            let fn_type = self.context.i32_type().fn_type(&[i8_ptr.into()], true);
            self.module.add_function("printf", fn_type, None)
        });
        self.prints.printf = Some(f);
        f
    }

    fn build_fmt(&self, text: &str, name: &str) -> Result<PointerValue<'ctx>, CoreError> {
        Ok(self.builder.build_global_string_ptr(text, name)?.as_pointer_value())
    }

    fn fmt_str(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_str {
            return Ok(p);
        }
        let p = self.build_fmt("%s\n", "fmt_str")?;
        self.prints.fmt_str = Some(p);
        Ok(p)
    }

    fn fmt_char(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_char {
            return Ok(p);
        }
        let p = self.build_fmt("%c\n", "fmt_char")?;
        self.prints.fmt_char = Some(p);
        Ok(p)
    }

    fn fmt_int(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_int {
            return Ok(p);
        }
        let p = self.build_fmt("%ld\n", "fmt_int")?;
        self.prints.fmt_int = Some(p);
        Ok(p)
    }

    fn fmt_float(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_float {
            return Ok(p);
        }
        let p = self.build_fmt("%g\n", "fmt_float")?;
        self.prints.fmt_float = Some(p);
        Ok(p)
    }

    fn fmt_hex(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_hex {
            return Ok(p);
        }
        let p = self.build_fmt("0x%lX\n", "fmt_hex")?;
        self.prints.fmt_hex = Some(p);
        Ok(p)
    }

    fn fmt_oct(&mut self) -> Result<PointerValue<'ctx>, CoreError> {
        if let Some(p) = self.prints.fmt_oct {
            return Ok(p);
        }
        let p = self.build_fmt("0o%lo\n", "fmt_oct")?;
        self.prints.fmt_oct = Some(p);
        Ok(p)
    }

    /// Eagerly create the format-string globals. The REPL calls this from
    /// its init function so the globals exist before the first wrapper.
    pub fn materialize_formats(&mut self) -> Result<(), CoreError> {
        self.fmt_str()?;
        self.fmt_char()?;
        self.fmt_int()?;
        self.fmt_float()?;
        self.fmt_hex()?;
        self.fmt_oct()?;
        Ok(())
    }

    fn call_printf(
        &mut self,
        fmt: PointerValue<'ctx>,
        value: Option<BasicValueEnum<'ctx>>,
    ) -> Result<(), CoreError> {
        let printf = self.printf();
        let mut args: Vec<BasicMetadataValueEnum<'ctx>> = vec![fmt.into()];
        if let Some(v) = value {
            args.push(v.into());
        }
        self.builder.build_call(printf, &args, "")?;
        Ok(())
    }

    /// Generate (once per module) the binary printer: prints a 64-bit
    /// value as `0b…`, suppressing leading zeros, `0b0` for zero input.
    fn print_binary_fn(&mut self) -> Result<FunctionValue<'ctx>, CoreError> {
        if let Some(f) = self.prints.print_binary {
            return Ok(f);
        }
        if let Some(f) = self.module.get_function("__print_binary") {
            self.prints.print_binary = Some(f);
            return Ok(f);
        }

        let i32t = self.context.i32_type();
        let i64t = self.context.i64_type();
        let fn_type = i64t.fn_type(&[i64t.into()], false);
        let func = self.module.add_function("__print_binary", fn_type, None);
        let printf = self.printf();

        let saved = self.builder.get_insert_block();
        let entry = self.context.append_basic_block(func, "entry");
        self.builder.position_at_end(entry);

        let n = func
            .get_nth_param(0)
            .ok_or(CoreError::internal("binary printer lost its parameter"))?
            .into_int_value();

        let prefix = self.build_fmt("0b", "bin_prefix")?;
        self.builder.build_call(printf, &[prefix.into()], "")?;

        // Walk bit 63 down to 0, printing once the first set bit is seen.
        let idx_ptr = self.builder.build_alloca(i32t, "idx")?;
        self.builder.build_store(idx_ptr, i32t.const_int(63, false))?;
        let started_ptr = self.builder.build_alloca(i32t, "started")?;
        self.builder.build_store(started_ptr, i32t.const_zero())?;

        let loop_cond = self.context.append_basic_block(func, "loop_cond");
        let loop_body = self.context.append_basic_block(func, "loop_body");
        let loop_end = self.context.append_basic_block(func, "loop_end");
        self.builder.build_unconditional_branch(loop_cond)?;

        self.builder.position_at_end(loop_cond);
        let idx_val = self.builder.build_load(idx_ptr, "idx_val")?.into_int_value();
        let cond = self
            .builder
            .build_int_compare(IntPredicate::SGE, idx_val, i32t.const_zero(), "cond")?;
        self.builder.build_conditional_branch(cond, loop_body, loop_end)?;

        self.builder.position_at_end(loop_body);
        let idx_again = self.builder.build_load(idx_ptr, "idx_again")?.into_int_value();
        let idx64 = self.builder.build_int_s_extend(idx_again, i64t, "idx64")?;
        let bit = self.builder.build_right_shift(n, idx64, false, "bit")?;
        let bit1 = self
            .builder
            .build_and(bit, i64t.const_int(1, false), "bit1")?;
        let started_val = self
            .builder
            .build_load(started_ptr, "started_val")?
            .into_int_value();
        let is_one = self.builder.build_int_compare(
            IntPredicate::EQ,
            bit1,
            i64t.const_int(1, false),
            "is_one",
        )?;
        let is_started = self.builder.build_int_compare(
            IntPredicate::NE,
            started_val,
            i32t.const_zero(),
            "is_started",
        )?;
        let should_print = self.builder.build_or(is_one, is_started, "should_print")?;

        let print_bb = self.context.append_basic_block(func, "print_bit");
        let skip_bb = self.context.append_basic_block(func, "skip_bit");
        self.builder
            .build_conditional_branch(should_print, print_bb, skip_bb)?;

        self.builder.position_at_end(print_bb);
        self.builder.build_store(started_ptr, i32t.const_int(1, false))?;
        let fmt_ld = self.build_fmt("%ld", "fmt_ld")?;
        self.builder
            .build_call(printf, &[fmt_ld.into(), bit1.into()], "")?;
        self.builder.build_unconditional_branch(skip_bb)?;

        self.builder.position_at_end(skip_bb);
        let idx_dec = self.builder.build_load(idx_ptr, "idx_dec")?.into_int_value();
        let new_idx = self
            .builder
            .build_int_sub(idx_dec, i32t.const_int(1, false), "new_idx")?;
        self.builder.build_store(idx_ptr, new_idx)?;
        self.builder.build_unconditional_branch(loop_cond)?;

        // Never started means the input was zero: print "0", then newline.
        self.builder.position_at_end(loop_end);
        let started_final = self
            .builder
            .build_load(started_ptr, "started_final")?
            .into_int_value();
        let never_started = self.builder.build_int_compare(
            IntPredicate::EQ,
            started_final,
            i32t.const_zero(),
            "never_started",
        )?;
        let zero_bb = self.context.append_basic_block(func, "print_zero");
        let newline_bb = self.context.append_basic_block(func, "print_newline");
        self.builder
            .build_conditional_branch(never_started, zero_bb, newline_bb)?;

        self.builder.position_at_end(zero_bb);
        let zero_str = self.build_fmt("0", "zero_str")?;
        self.builder.build_call(printf, &[zero_str.into()], "")?;
        self.builder.build_unconditional_branch(newline_bb)?;

        self.builder.position_at_end(newline_bb);
        let nl = self.build_fmt("\n", "nl")?;
        self.builder.build_call(printf, &[nl.into()], "")?;
        self.builder.build_return(Some(&i64t.const_zero()))?;

        if let Some(bb) = saved {
            self.builder.position_at_end(bb);
        }
        self.prints.print_binary = Some(func);
        Ok(func)
    }

    /// Print a value per its Monad type: the per-kind `printf` path, or
    /// the generated binary printer for Bin.
    pub fn emit_print_value(
        &mut self,
        value: BasicValueEnum<'ctx>,
        ty: &Type,
    ) -> Result<(), CoreError> {
        match ty {
            Type::Char => {
                let fmt = self.fmt_char()?;
                self.call_printf(fmt, Some(value))
            }
            Type::Str => {
                let fmt = self.fmt_str()?;
                self.call_printf(fmt, Some(value))
            }
            Type::Hex => {
                let fmt = self.fmt_hex()?;
                self.call_printf(fmt, Some(value))
            }
            Type::Oct => {
                let fmt = self.fmt_oct()?;
                self.call_printf(fmt, Some(value))
            }
            Type::Bin => {
                let f = self.print_binary_fn()?;
                self.builder.build_call(f, &[value.into()], "")?;
                Ok(())
            }
            t if t.is_integer() => {
                let fmt = self.fmt_int()?;
                self.call_printf(fmt, Some(value))
            }
            _ => {
                let fmt = self.fmt_float()?;
                self.call_printf(fmt, Some(value))
            }
        }
    }

    // ---------------------------------------------------------------
    // Quoted expressions: a structural walk emitting printf calls.
    // Must agree with `Display for Ast`, plus one trailing newline.
    // ---------------------------------------------------------------

    fn emit_quoted(&mut self, ast: &Ast) -> Result<(), CoreError> {
        self.emit_quoted_piece(ast)?;
        let nl = self.build_fmt("\n", "nl")?;
        self.call_printf(nl, None)
    }

    fn emit_quoted_piece(&mut self, ast: &Ast) -> Result<(), CoreError> {
        match &ast.kind {
            AstKind::Number { value, .. } => {
                let fmt = self.build_fmt("%g", "fmt_g")?;
                let num = self.context.f64_type().const_float(*value);
                self.call_printf(fmt, Some(num.into()))
            }
            AstKind::Symbol(name) => {
                let fmt = self.build_fmt("%s", "fmt_s")?;
                let sym = self.build_fmt(name, "sym")?;
                self.call_printf(fmt, Some(sym.into()))
            }
            AstKind::Str(s) => {
                let fmt = self.build_fmt("\"%s\"", "fmt_qs")?;
                let text = self.build_fmt(s, "str")?;
                self.call_printf(fmt, Some(text.into()))
            }
            AstKind::Char(c) => {
                let fmt = self.build_fmt("'%c'", "fmt_qc")?;
                let ch = self.context.i8_type().const_int(*c as u64, false);
                self.call_printf(fmt, Some(ch.into()))
            }
            AstKind::List(items) => {
                let lparen = self.build_fmt("(", "lparen")?;
                self.call_printf(lparen, None)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        let space = self.build_fmt(" ", "space")?;
                        self.call_printf(space, None)?;
                    }
                    self.emit_quoted_piece(item)?;
                }
                let rparen = self.build_fmt(")", "rparen")?;
                self.call_printf(rparen, None)
            }
            AstKind::Lambda(_) => {
                // No runtime structure to recover here; the printed form
                // is fixed at compile time.
                let fmt = self.build_fmt("%s", "fmt_s")?;
                let text = self.build_fmt(&ast.to_string(), "lambda_text")?;
                self.call_printf(fmt, Some(text.into()))
            }
        }
    }

    // ---------------------------------------------------------------
    // Operand widening for arithmetic
    // ---------------------------------------------------------------

    /// Widen an integer-kinded operand to i64 (Char sign-extends).
    fn to_i64(
        &self,
        value: BasicValueEnum<'ctx>,
        ty: &Type,
    ) -> Result<IntValue<'ctx>, CoreError> {
        let v = value.into_int_value();
        if matches!(ty, Type::Char) {
            Ok(self
                .builder
                .build_int_s_extend(v, self.context.i64_type(), "ext")?)
        } else {
            Ok(v)
        }
    }

    /// Bring any numeric operand to f64.
    fn to_f64(
        &self,
        value: BasicValueEnum<'ctx>,
        ty: &Type,
    ) -> Result<FloatValue<'ctx>, CoreError> {
        if ty.is_float() {
            return Ok(value.into_float_value());
        }
        let wide = self.to_i64(value, ty)?;
        Ok(self
            .builder
            .build_signed_int_to_float(wide, self.context.f64_type(), "tofloat")?)
    }

    /// Convert a value between Monad types, following the declared-type
    /// rules of `define` and function calls. Non-numeric mismatches pass
    /// through untouched and are left for module verification.
    fn coerce(
        &self,
        value: BasicValueEnum<'ctx>,
        from: &Type,
        to: &Type,
    ) -> Result<BasicValueEnum<'ctx>, CoreError> {
        if from == to {
            return Ok(value);
        }
        let i8t = self.context.i8_type();
        let i64t = self.context.i64_type();
        match (from, to) {
            (f, Type::Char) if f.is_float() => Ok(self
                .builder
                .build_float_to_signed_int(value.into_float_value(), i8t, "tochar")?
                .into()),
            (f, t) if f.is_float() && t.is_integer() => Ok(self
                .builder
                .build_float_to_signed_int(value.into_float_value(), i64t, "toint")?
                .into()),
            (f, t) if f.is_integer() && t.is_float() => {
                Ok(self.to_f64(value, f)?.into())
            }
            (f, Type::Char) if f.is_integer() => Ok(self
                .builder
                .build_int_truncate(value.into_int_value(), i8t, "tochar")?
                .into()),
            (Type::Char, t) if t.is_integer() => Ok(self
                .builder
                .build_int_s_extend(value.into_int_value(), i64t, "ext")?
                .into()),
            // Int/Hex/Bin/Oct all share i64; everything else passes through.
            _ => Ok(value),
        }
    }

    // ---------------------------------------------------------------
    // Expression lowering
    // ---------------------------------------------------------------

    pub fn lower_expr(&mut self, ast: &Ast) -> Result<Lowered<'ctx>, CoreError> {
        match &ast.kind {
            AstKind::Number { value, literal } => {
                let ty = infer_literal_type(*value, literal.as_deref());
                let lowered: BasicValueEnum<'ctx> = if ty.is_float() {
                    self.context.f64_type().const_float(*value).into()
                } else {
                    self.context
                        .i64_type()
                        .const_int(*value as i64 as u64, true)
                        .into()
                };
                Ok(Lowered { value: lowered, ty })
            }

            AstKind::Char(c) => Ok(Lowered {
                value: self.context.i8_type().const_int(*c as u64, false).into(),
                ty: Type::Char,
            }),

            AstKind::Str(s) => {
                let ptr = self.build_fmt(s, "str")?;
                Ok(Lowered {
                    value: ptr.into(),
                    ty: Type::Str,
                })
            }

            AstKind::Symbol(name) => {
                let (ty, storage) = match self.env.lookup(name) {
                    None => {
                        return Err(
                            self.err(format!("unbound variable: {}", name), ast.span)
                        )
                    }
                    Some(entry) => match &entry.kind {
                        EntryKind::Variable { ty, storage } => (ty.clone(), *storage),
                        _ => {
                            return Err(self.err(
                                format!(
                                    "'{}' is a function; functions are not first-class values",
                                    name
                                ),
                                ast.span,
                            ))
                        }
                    },
                };
                let value = self.builder.build_load(storage, name)?;
                Ok(Lowered { value, ty })
            }

            AstKind::List(items) => self.lower_list(ast, items),

            AstKind::Lambda(_) => Err(self.err(
                "'lambda' is only allowed as the value of a 'define'",
                ast.span,
            )),
        }
    }

    fn lower_list(&mut self, ast: &Ast, items: &[Ast]) -> Result<Lowered<'ctx>, CoreError> {
        if items.is_empty() {
            return Err(self.err("empty list not supported", ast.span));
        }
        let Some(head) = ast.head_symbol() else {
            return Err(self.err(
                "function call requires a symbol in head position",
                ast.span,
            ));
        };
        let head = head.to_string();

        match head.as_str() {
            "define" => self.lower_define(ast, items),
            "show" => self.lower_show(ast, items),
            "quote" => self.lower_quote(ast, items),
            "+" | "-" | "*" | "/" => self.lower_arithmetic(ast, items, &head),
            _ => self.lower_call(ast, items, &head),
        }
    }

    fn check_builtin_arity(&self, name: &str, argc: usize, span: Span) -> Result<(), CoreError> {
        if let Some(entry) = self.env.lookup(name) {
            if let Err(message) = entry.check_arity(argc) {
                return Err(self.err(message, span));
            }
        }
        Ok(())
    }

    /// `quote` in expression position: render the payload through the
    /// structural printer, produce the dummy value.
    fn lower_quote(&mut self, ast: &Ast, items: &[Ast]) -> Result<Lowered<'ctx>, CoreError> {
        self.check_builtin_arity("quote", items.len() - 1, ast.span)?;
        self.emit_quoted(&items[1])?;
        Ok(self.dummy_result())
    }

    fn lower_show(&mut self, ast: &Ast, items: &[Ast]) -> Result<Lowered<'ctx>, CoreError> {
        self.check_builtin_arity("show", items.len() - 1, ast.span)?;
        let arg = &items[1];

        match &arg.kind {
            AstKind::List(quoted) if arg.is_quote() => {
                if quoted.len() == 2 {
                    self.emit_quoted(&quoted[1])?;
                }
            }
            AstKind::Str(s) => {
                let text = self.build_fmt(s, "str")?;
                let fmt = self.fmt_str()?;
                self.call_printf(fmt, Some(text.into()))?;
            }
            AstKind::Char(c) => {
                let ch = self.context.i8_type().const_int(*c as u64, false);
                let fmt = self.fmt_char()?;
                self.call_printf(fmt, Some(ch.into()))?;
            }
            AstKind::Symbol(name) => {
                let (ty, storage) = match self.env.lookup(name) {
                    None => {
                        return Err(
                            self.err(format!("unbound variable: {}", name), arg.span)
                        )
                    }
                    Some(entry) => match &entry.kind {
                        EntryKind::Variable { ty, storage } => (ty.clone(), *storage),
                        _ => {
                            return Err(self.err(
                                format!("cannot show function '{}'", name),
                                arg.span,
                            ))
                        }
                    },
                };
                let loaded = self.builder.build_load(storage, name)?;
                self.emit_print_value(loaded, &ty)?;
            }
            _ => {
                let lowered = self.lower_expr(arg)?;
                self.emit_print_value(lowered.value, &lowered.ty)?;
            }
        }

        Ok(self.dummy_result())
    }

    // ---------------------------------------------------------------
    // Arithmetic
    // ---------------------------------------------------------------

    fn lower_arithmetic(
        &mut self,
        ast: &Ast,
        items: &[Ast],
        op: &str,
    ) -> Result<Lowered<'ctx>, CoreError> {
        let argc = items.len() - 1;
        self.check_builtin_arity(op, argc, ast.span)?;

        let first = self.lower_expr(&items[1])?;
        if !first.ty.is_numeric() {
            return Err(self.err(
                format!("cannot perform arithmetic on type {}", first.ty),
                items[1].span,
            ));
        }

        // (- x): negation, preserving the operand kind.
        if op == "-" && argc == 1 {
            let value: BasicValueEnum<'ctx> = if first.ty.is_float() {
                self.builder
                    .build_float_neg(first.value.into_float_value(), "negtmp")?
                    .into()
            } else {
                let v = first.value.into_int_value();
                let zero = v.get_type().const_zero();
                self.builder.build_int_sub(zero, v, "negtmp")?.into()
            };
            return Ok(Lowered {
                value,
                ty: first.ty,
            });
        }

        // (/ x): reciprocal; integers promote to float first.
        if op == "/" && argc == 1 {
            let one = self.context.f64_type().const_float(1.0);
            let operand = self.to_f64(first.value, &first.ty)?;
            let value = self.builder.build_float_div(one, operand, "invtmp")?;
            return Ok(Lowered {
                value: value.into(),
                ty: Type::Float,
            });
        }

        let mut result_ty = first.ty;
        let mut result_val = first.value;

        for item in &items[2..] {
            let rhs = self.lower_expr(item)?;
            if !rhs.ty.is_numeric() {
                return Err(self.err(
                    format!("cannot perform arithmetic on type {}", rhs.ty),
                    item.span,
                ));
            }

            let new_ty = match promote(&result_ty, &rhs.ty) {
                Ok(ty) => ty,
                Err(PromoteError::MixedBases(lhs, rhs)) => {
                    return Err(self.err(
                        format!("cannot mix {} and {} in arithmetic", lhs, rhs),
                        ast.span,
                    ))
                }
                Err(PromoteError::NonNumeric(ty)) => {
                    return Err(self.err(
                        format!("cannot perform arithmetic on type {}", ty),
                        ast.span,
                    ))
                }
            };

            result_val = if new_ty.is_float() {
                let lhs = self.to_f64(result_val, &result_ty)?;
                let rhs = self.to_f64(rhs.value, &rhs.ty)?;
                match op {
                    "+" => self.builder.build_float_add(lhs, rhs, "addtmp")?,
                    "-" => self.builder.build_float_sub(lhs, rhs, "subtmp")?,
                    "*" => self.builder.build_float_mul(lhs, rhs, "multmp")?,
                    _ => self.builder.build_float_div(lhs, rhs, "divtmp")?,
                }
                .into()
            } else {
                let lhs = self.to_i64(result_val, &result_ty)?;
                let rhs = self.to_i64(rhs.value, &rhs.ty)?;
                match op {
                    "+" => self.builder.build_int_add(lhs, rhs, "addtmp")?,
                    "-" => self.builder.build_int_sub(lhs, rhs, "subtmp")?,
                    "*" => self.builder.build_int_mul(lhs, rhs, "multmp")?,
                    _ => self.builder.build_int_signed_div(lhs, rhs, "divtmp")?,
                }
                .into()
            };
            result_ty = new_ty;
        }

        Ok(Lowered {
            value: result_val,
            ty: result_ty,
        })
    }

    // ---------------------------------------------------------------
    // define
    // ---------------------------------------------------------------

    fn lower_define(&mut self, ast: &Ast, items: &[Ast]) -> Result<Lowered<'ctx>, CoreError> {
        if items.len() < 3 {
            return Err(self.err("'define' requires at least 2 arguments", ast.span));
        }
        let name_expr = &items[1];
        let value_expr = &items[2];

        let (var_name, explicit_ty) = match &name_expr.kind {
            AstKind::Symbol(s) => (s.clone(), None),
            AstKind::List(annotated) => {
                let ty = match parse_type_annotation(name_expr) {
                    Ok(Some(ty)) => ty,
                    Ok(None) => {
                        return Err(self.err(
                            "'define' name must be a symbol or type annotation",
                            name_expr.span,
                        ))
                    }
                    Err(unknown) => {
                        return Err(self.err(
                            format!("unknown type '{}'", unknown.name),
                            unknown.span,
                        ))
                    }
                };
                match annotated.first() {
                    Some(Ast {
                        kind: AstKind::Symbol(s),
                        ..
                    }) => (s.clone(), Some(ty)),
                    _ => {
                        return Err(self.err(
                            "'define' name must be a symbol or type annotation",
                            name_expr.span,
                        ))
                    }
                }
            }
            _ => {
                return Err(self.err(
                    "'define' name must be a symbol or type annotation",
                    name_expr.span,
                ))
            }
        };

        if let AstKind::Lambda(lambda) = &value_expr.kind {
            return self.lower_function_define(&var_name, lambda, value_expr.span);
        }

        // Binding a bare function name would need first-class function
        // values, which the surface language does not have.
        if let AstKind::Symbol(value_sym) = &value_expr.kind {
            if let Some(entry) = self.env.lookup(value_sym) {
                if matches!(entry.kind, EntryKind::Function { .. }) {
                    return Err(self.err(
                        format!(
                            "cannot bind '{}': functions are not first-class values",
                            value_sym
                        ),
                        value_expr.span,
                    ));
                }
            }
        }

        let value = self.lower_expr(value_expr)?;
        let inferred = value.ty.clone();
        let final_ty = explicit_ty.unwrap_or_else(|| inferred.clone());
        let llvm_ty = self.type_to_llvm(&final_ty);

        let storage = match self.storage {
            StorageMode::Stack => self.builder.build_alloca(llvm_ty, &var_name)?,
            StorageMode::ModuleGlobal => match self.module.get_global(&var_name) {
                Some(global) => global.as_pointer_value(),
                None => {
                    let global =
                        self.module
                            .add_global(llvm_ty, Some(AddressSpace::default()), &var_name);
                    global.set_initializer(&self.const_zero(&final_ty));
                    global.set_linkage(Linkage::External);
                    global.as_pointer_value()
                }
            },
        };

        let stored = self.coerce(value.value, &inferred, &final_ty)?;
        self.builder.build_store(storage, stored)?;
        self.env
            .innermost_mut()
            .insert_variable(&var_name, final_ty.clone(), storage);

        match self.storage {
            StorageMode::Stack => println!("Defined {} :: {}", var_name, final_ty),
            StorageMode::ModuleGlobal => println!("{} :: {}", var_name, final_ty),
        }

        Ok(Lowered {
            value: stored,
            ty: final_ty,
        })
    }

    /// A `define` whose value is a lambda: materialise a module function,
    /// lower the body under a fresh scope, register the entry.
    fn lower_function_define(
        &mut self,
        name: &str,
        lambda: &Lambda,
        span: Span,
    ) -> Result<Lowered<'ctx>, CoreError> {
        let mut param_types = Vec::with_capacity(lambda.params.len());
        let mut descriptors = Vec::with_capacity(lambda.params.len());
        for param in &lambda.params {
            let ty = match &param.type_name {
                Some(type_name) => Type::from_name(type_name).ok_or_else(|| {
                    self.err(format!("unknown type '{}'", type_name), param.span)
                })?,
                None => Type::Float,
            };
            descriptors.push(FnParam::named(&param.name, ty.clone()));
            param_types.push(ty);
        }

        let return_type = match &lambda.return_type {
            Some(type_name) => Type::from_name(type_name)
                .ok_or_else(|| self.err(format!("unknown return type '{}'", type_name), span))?,
            None => Type::Float,
        };

        let llvm_params: Vec<BasicMetadataTypeEnum<'ctx>> = param_types
            .iter()
            .map(|ty| self.type_to_llvm(ty).into())
            .collect();
        let fn_type = self.type_to_llvm(&return_type).fn_type(&llvm_params, false);
        let func = self.module.add_function(name, fn_type, None);

        let saved = self.builder.get_insert_block();
        let entry = self.context.append_basic_block(func, "entry");
        self.builder.position_at_end(entry);

        self.env.push();
        for (i, param) in lambda.params.iter().enumerate() {
            let value = func
                .get_nth_param(i as u32)
                .ok_or(CoreError::internal("function lost a parameter"))?;
            set_value_name(value, &param.name);
            let slot = self
                .builder
                .build_alloca(self.type_to_llvm(&param_types[i]), &param.name)?;
            self.builder.build_store(slot, value)?;
            self.env
                .innermost_mut()
                .insert_variable(&param.name, param_types[i].clone(), slot);
        }

        let body = self.lower_expr(&lambda.body);
        // The scope and builder position are restored even on error.
        self.env.pop();
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                if let Some(bb) = saved {
                    self.builder.position_at_end(bb);
                }
                return Err(e);
            }
        };
        let ret = self.coerce(body.value, &body.ty, &return_type)?;
        self.builder.build_return(Some(&ret))?;

        if let Some(bb) = saved {
            self.builder.position_at_end(bb);
        }

        self.env.innermost_mut().insert_function(
            name,
            descriptors,
            return_type.clone(),
            func,
            lambda.docstring.clone(),
        );

        let sig: Vec<&str> = lambda.params.iter().map(|p| p.name.as_str()).collect();
        match self.storage {
            StorageMode::Stack => println!(
                "Defined {} :: Fn ({}) -> {}",
                name,
                sig.join(" "),
                return_type
            ),
            StorageMode::ModuleGlobal => {
                println!("{} :: Fn ({}) -> {}", name, sig.join(" "), return_type)
            }
        }

        Ok(self.dummy_result())
    }

    // ---------------------------------------------------------------
    // User function calls
    // ---------------------------------------------------------------

    fn lower_call(
        &mut self,
        ast: &Ast,
        items: &[Ast],
        name: &str,
    ) -> Result<Lowered<'ctx>, CoreError> {
        let (params, return_type, handle) = match self.env.lookup(name) {
            None => return Err(self.err(format!("unknown function: {}", name), ast.span)),
            Some(entry) => match &entry.kind {
                EntryKind::Variable { .. } => {
                    return Err(self.err(
                        format!("'{}' is a variable, not a function", name),
                        ast.span,
                    ))
                }
                EntryKind::Builtin => {
                    return Err(self.err(format!("unknown function: {}", name), ast.span))
                }
                EntryKind::Function {
                    params,
                    return_type,
                    handle,
                } => (params.clone(), return_type.clone(), *handle),
            },
        };

        let argc = items.len() - 1;
        if argc != params.len() {
            return Err(self.err(
                format!(
                    "function '{}' expects {} arguments, got {}",
                    name,
                    params.len(),
                    argc
                ),
                ast.span,
            ));
        }

        let mut args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(argc);
        for (param, arg_ast) in params.iter().zip(&items[1..]) {
            let lowered = self.lower_expr(arg_ast)?;
            let expected = param.ty.clone().unwrap_or(Type::Float);
            let converted = self.coerce(lowered.value, &lowered.ty, &expected)?;
            args.push(converted.into());
        }

        let call = self.builder.build_call(handle, &args, "calltmp")?;
        let value = call
            .try_as_basic_value()
            .left()
            .ok_or(CoreError::internal("call produced no value"))?;
        Ok(Lowered {
            value,
            ty: return_type,
        })
    }
}

fn set_value_name(value: BasicValueEnum<'_>, name: &str) {
    match value {
        BasicValueEnum::IntValue(v) => v.set_name(name),
        BasicValueEnum::FloatValue(v) => v.set_name(name),
        BasicValueEnum::PointerValue(v) => v.set_name(name),
        _ => {}
    }
}
