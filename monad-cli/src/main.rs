use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use monad_core::inkwell::context::Context;
use monad_core::{CompileOptions, CoreError, ReplEngine, SourceInfo};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};

#[derive(Parser, Debug)]
#[command(name = "monad", version, about = "Compiler and REPL for the Monad language")]
struct Cli {
    /// Input source file; omit to start the REPL.
    input: Option<PathBuf>,

    /// Output file name (default: input name without its extension)
    #[arg(short)]
    output: Option<String>,

    /// Emit LLVM IR (.ll)
    #[arg(long)]
    emit_ir: bool,

    /// Emit LLVM bitcode (.bc)
    #[arg(long)]
    emit_bc: bool,

    /// Emit assembly (.s)
    #[arg(long)]
    emit_asm: bool,

    /// Emit an object file (.o)
    #[arg(long)]
    emit_obj: bool,

    /// Start the interactive evaluator
    #[arg(long)]
    repl: bool,

    /// Verbose compiler logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1, matching compile failures; --help and
            // --version keep their conventional exit code.
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(1);
        }
    };
    monad_core::log::set_verbose(cli.verbose);

    match (&cli.input, cli.repl) {
        (None, _) | (_, true) => run_repl(),
        (Some(input), false) => compile(input.clone(), &cli),
    }
}

fn compile(input: PathBuf, cli: &Cli) -> Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("cannot open file: {}", input.display()))?;
    let source = SourceInfo::new(input.display().to_string(), text);

    let base = match &cli.output {
        Some(name) => PathBuf::from(name),
        None => base_name(&input),
    };
    let options = CompileOptions {
        emit_ir: cli.emit_ir,
        emit_bc: cli.emit_bc,
        emit_asm: cli.emit_asm,
        emit_obj: cli.emit_obj,
    };

    let output = match monad_core::compile(&source, &base, &options) {
        Ok(output) => output,
        Err(e) => {
            render_error(&e, &source);
            return Err(anyhow!("compilation failed"));
        }
    };

    if let Some(object) = output.object_to_link {
        link_executable(&object, &base)?;
    }
    Ok(())
}

/// The artifact base name: the input's file name minus its final
/// extension.
fn base_name(input: &Path) -> PathBuf {
    match input.file_stem() {
        Some(stem) => PathBuf::from(stem),
        None => input.to_path_buf(),
    }
}

/// `cc <obj> -o <base> -lm -no-pie`, then drop the intermediate object.
fn link_executable(object: &Path, base: &Path) -> Result<()> {
    let status = Command::new("cc")
        .arg(object)
        .arg("-o")
        .arg(base)
        .arg("-lm")
        .arg("-no-pie")
        .status()
        .context("failed to run the system C compiler")?;
    if !status.success() {
        return Err(anyhow!("failed to link executable"));
    }
    println!("Created executable: {}", base.display());
    fs::remove_file(object).ok();
    Ok(())
}

fn render_error(err: &CoreError, source: &SourceInfo) {
    match err {
        CoreError::Diagnostics(diags) => {
            for d in diags {
                eprintln!("{}", d.render(source));
            }
        }
        other => eprintln!("{}", other),
    }
}

/// Tab completion over a shared snapshot of environment names; the
/// loop refreshes the snapshot after every evaluated line.
struct ReplHelper {
    names: Rc<RefCell<Vec<String>>>,
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '+' | '*' | '/' | '<' | '>' | '=' | '!' | '?' | '_' | ':'
        )
}

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let start = line[..pos]
            .rfind(|c: char| !is_symbol_char(c))
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &line[start..pos];
        let names = self.names.borrow();
        let matches = names
            .iter()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}
impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

fn run_repl() -> Result<()> {
    let context = Context::create();
    let mut engine = match ReplEngine::new(&context) {
        Ok(engine) => engine,
        Err(e) => return Err(anyhow!("{}", e)),
    };

    println!("Monad REPL v0.1");
    println!("Type expressions to evaluate. Use Ctrl-D to exit.\n");

    let names = Rc::new(RefCell::new(engine.completion_names()));
    let mut editor: Editor<ReplHelper, DefaultHistory> =
        Editor::new().context("failed to initialise line editing")?;
    editor.set_helper(Some(ReplHelper {
        names: Rc::clone(&names),
    }));

    loop {
        match editor.readline("monad> ") {
            Ok(line) => {
                if !line.is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if let Err(e) = engine.eval_line(&line) {
                    let source = SourceInfo::new("<repl>", line.clone());
                    render_error(&e, &source);
                }
                *names.borrow_mut() = engine.completion_names();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(anyhow!("{}", e)),
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["monad", "prog.mon"]);
        assert_eq!(cli.input, Some(PathBuf::from("prog.mon")));
        assert!(!cli.emit_ir && !cli.emit_bc && !cli.emit_asm && !cli.emit_obj);
        assert!(!cli.repl);
        assert!(cli.output.is_none());
    }

    #[test]
    fn cli_parses_emit_flags_and_output() {
        let cli = Cli::parse_from(["monad", "prog.mon", "-o", "out", "--emit-ir", "--emit-obj"]);
        assert_eq!(cli.output.as_deref(), Some("out"));
        assert!(cli.emit_ir && cli.emit_obj);
        assert!(!cli.emit_bc && !cli.emit_asm);
    }

    #[test]
    fn base_name_strips_final_extension() {
        assert_eq!(base_name(Path::new("dir/prog.mon")), PathBuf::from("prog"));
        assert_eq!(base_name(Path::new("prog.tar.mon")), PathBuf::from("prog.tar"));
        assert_eq!(base_name(Path::new("prog")), PathBuf::from("prog"));
    }
}
