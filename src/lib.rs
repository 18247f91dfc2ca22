// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! A minimal interpreter for a Tcl-like command language: a token
//! classifier, a substituting evaluator, per-call variable frames, and a
//! small registry of built-in and host-provided commands.

mod builtins;
pub mod command;
mod interp;
pub mod parse;

pub use command::{Command, FnCommand};
pub use interp::{EvalError, EvalResult, Flow, Interp};
