// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Line-at-a-time interactive host and script-file runner.

use std::{
    env, fs,
    io::{self, BufRead, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use minitcl::{EvalResult, Flow, Interp};

fn main() -> Result<()> {
    let mut args = env::args_os().skip(1);
    match (args.next(), args.next()) {
        (None, _) => repl(),
        (Some(path), None) => run_file(Path::new(&path)),
        _ => bail!("usage: minitcl [script]"),
    }
}

fn run_file(path: &Path) -> Result<()> {
    let script = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut interp = Interp::new();
    if let Err(err) = interp.eval(&script) {
        bail!("{err}");
    }
    Ok(())
}

fn repl() -> Result<()> {
    let mut interp = Interp::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = Vec::new();
    loop {
        stdout.write_all(b"minitcl> ")?;
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        let result = interp.eval(&line);
        if !interp.result().is_empty() {
            println!("[{}] {}", return_code(&result), interp.result());
        }
    }
}

/// The numeric return code a host reports: 0 for a normal result, 1 for an
/// error, and 2, 3, 4 for `return`, `break`, and `continue` that unwound
/// to the top level.
fn return_code(result: &EvalResult) -> u8 {
    match result {
        Ok(Flow::Normal) => 0,
        Err(_) => 1,
        Ok(Flow::Return) => 2,
        Ok(Flow::Break) => 3,
        Ok(Flow::Continue) => 4,
    }
}
