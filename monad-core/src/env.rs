//! Name environments for lowering.
//!
//! An `Env` is one owned frame mapping names to entries; rebinding a name
//! replaces its entry in place, so a frame never holds two entries for
//! one name. `EnvStack` is the scope stack: the root frame holds
//! top-level bindings and builtins, function bodies push a child frame
//! whose bindings vanish on exit. Lookup is innermost-first and
//! definitions only ever touch the innermost frame.

use std::collections::HashMap;

use inkwell::values::{FunctionValue, PointerValue};

use crate::types::{FnParam, Type};

#[derive(Debug, Clone)]
pub enum EntryKind<'ctx> {
    /// A variable: its declared type and the storage it loads from.
    Variable {
        ty: Type,
        storage: PointerValue<'ctx>,
    },
    /// A builtin form; only the arity bounds matter.
    Builtin,
    /// A user-defined function.
    Function {
        params: Vec<FnParam>,
        return_type: Type,
        handle: FunctionValue<'ctx>,
    },
}

/// One environment entry. `arity_min`/`arity_max` use −1 for "not
/// constrained"/"unbounded"; user functions always have
/// `arity_min == arity_max == params.len()`.
#[derive(Debug, Clone)]
pub struct EnvEntry<'ctx> {
    pub name: String,
    pub kind: EntryKind<'ctx>,
    pub arity_min: i32,
    pub arity_max: i32,
    pub docstring: Option<String>,
}

impl<'ctx> EnvEntry<'ctx> {
    /// Check an argument count against this entry's arity bounds.
    /// Returns the error message on mismatch.
    pub fn check_arity(&self, argc: usize) -> Result<(), String> {
        let min = self.arity_min;
        let max = self.arity_max;
        if min < 0 {
            return Ok(());
        }
        if (argc as i32) < min {
            return Err(format!(
                "'{}' requires at least {} argument(s), got {}",
                self.name, min, argc
            ));
        }
        if max >= 0 && (argc as i32) > max {
            return Err(format!(
                "'{}' requires at most {} argument(s), got {}",
                self.name, max, argc
            ));
        }
        Ok(())
    }

    /// The Scheme-style one-line display used by the symbol-table dump.
    pub fn describe(&self) -> String {
        let mut out = match &self.kind {
            EntryKind::Variable { ty, .. } => format!("[{} :: {}]", self.name, ty),
            EntryKind::Builtin => {
                let mut sig = String::new();
                if self.arity_min <= 0 && self.arity_max == -1 {
                    sig.push('_');
                } else {
                    for i in 0..self.arity_min {
                        if i > 0 {
                            sig.push(' ');
                        }
                        sig.push('_');
                    }
                    if self.arity_max == -1 {
                        if self.arity_min > 0 {
                            sig.push(' ');
                        }
                        sig.push_str(". _");
                    } else if self.arity_max > self.arity_min {
                        sig.push_str(" #:optional");
                        for _ in self.arity_min..self.arity_max {
                            sig.push_str(" _");
                        }
                    }
                }
                format!("[{} :: Fn ({})]", self.name, sig)
            }
            EntryKind::Function {
                params,
                return_type,
                ..
            } => {
                let mut sig = String::new();
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        sig.push(' ');
                    }
                    match &p.name {
                        Some(name) => sig.push_str(name),
                        None => sig.push('_'),
                    }
                }
                format!("[{} :: Fn ({}) -> {}]", self.name, sig, return_type)
            }
        };
        if let Some(doc) = &self.docstring {
            out.push_str("  ; ");
            out.push_str(doc);
        }
        out
    }
}

/// A single scope frame.
#[derive(Debug, Default)]
pub struct Env<'ctx> {
    entries: HashMap<String, EnvEntry<'ctx>>,
}

impl<'ctx> Env<'ctx> {
    pub fn new() -> Env<'ctx> {
        Env {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&EnvEntry<'ctx>> {
        self.entries.get(name)
    }

    /// Create or replace a variable entry.
    pub fn insert_variable(&mut self, name: &str, ty: Type, storage: PointerValue<'ctx>) {
        self.entries.insert(
            name.to_string(),
            EnvEntry {
                name: name.to_string(),
                kind: EntryKind::Variable { ty, storage },
                arity_min: -1,
                arity_max: -1,
                docstring: None,
            },
        );
    }

    /// Create or replace a builtin entry with its arity bounds.
    pub fn insert_builtin(&mut self, name: &str, arity_min: i32, arity_max: i32) {
        self.entries.insert(
            name.to_string(),
            EnvEntry {
                name: name.to_string(),
                kind: EntryKind::Builtin,
                arity_min,
                arity_max,
                docstring: None,
            },
        );
    }

    /// Create or replace a user-function entry; arity is exactly the
    /// parameter count.
    pub fn insert_function(
        &mut self,
        name: &str,
        params: Vec<FnParam>,
        return_type: Type,
        handle: FunctionValue<'ctx>,
        docstring: Option<String>,
    ) {
        let arity = params.len() as i32;
        self.entries.insert(
            name.to_string(),
            EnvEntry {
                name: name.to_string(),
                kind: EntryKind::Function {
                    params,
                    return_type,
                    handle,
                },
                arity_min: arity,
                arity_max: arity,
                docstring,
            },
        );
    }

    /// Entries sorted by name, for deterministic dumps.
    pub fn sorted_entries(&self) -> Vec<&EnvEntry<'ctx>> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// The scope stack. Always holds at least the root frame.
#[derive(Debug)]
pub struct EnvStack<'ctx> {
    frames: Vec<Env<'ctx>>,
}

impl<'ctx> EnvStack<'ctx> {
    pub fn new() -> EnvStack<'ctx> {
        EnvStack {
            frames: vec![Env::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Env::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the root frame");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Innermost-first lookup across all frames.
    pub fn lookup(&self, name: &str) -> Option<&EnvEntry<'ctx>> {
        self.frames.iter().rev().find_map(|frame| frame.lookup(name))
    }

    /// The frame definitions go into.
    pub fn innermost_mut(&mut self) -> &mut Env<'ctx> {
        self.frames
            .last_mut()
            .expect("env stack always has a root frame")
    }

    /// The outermost frame, holding top-level bindings and builtins.
    pub fn root(&self) -> &Env<'ctx> {
        &self.frames[0]
    }

    /// Names visible from the innermost scope, for completion.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .frames
            .iter()
            .flat_map(|frame| frame.entries.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Render the root frame as the post-compile symbol-table dump: a
    /// count header and one describe() line per entry.
    pub fn dump_root(&self) -> String {
        let root = self.root();
        let mut out = format!("Env ({} entries):", root.len());
        for entry in root.sorted_entries() {
            out.push_str("\n  ");
            out.push_str(&entry.describe());
        }
        out
    }
}

impl<'ctx> Default for EnvStack<'ctx> {
    fn default() -> Self {
        EnvStack::new()
    }
}
