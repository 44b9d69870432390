//! Verbose-mode logging for the compiler pipeline.
//!
//! User-visible chatter (definition notices, artifact writes) uses plain
//! `println!`; anything only useful when debugging the compiler itself
//! goes through `vlog` and is gated on the process-wide verbose flag.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

pub fn verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print to stderr when verbose mode is on.
macro_rules! vlog {
    ($($arg:tt)*) => {
        if $crate::log::verbose() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vlog;
