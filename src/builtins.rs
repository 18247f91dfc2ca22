// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! The core command set and the dispatcher for script-defined procedures.

use std::io::Write;

use bstr::{BString, ByteSlice};

use crate::{
    command::Command,
    interp::{EvalError, EvalResult, Flow, Interp},
};

type CommandFn = fn(&mut Interp, &[BString]) -> EvalResult;

/// Installs the core commands into a fresh interpreter.
pub(crate) fn register_core(interp: &mut Interp) {
    const CORE: &[(&str, CommandFn)] = &[
        ("+", cmd_math),
        ("-", cmd_math),
        ("*", cmd_math),
        ("/", cmd_math),
        (">", cmd_math),
        (">=", cmd_math),
        ("<", cmd_math),
        ("<=", cmd_math),
        ("==", cmd_math),
        ("!=", cmd_math),
        ("set", cmd_set),
        ("puts", cmd_puts),
        ("if", cmd_if),
        ("while", cmd_while),
        ("break", cmd_break),
        ("continue", cmd_continue),
        ("return", cmd_return),
        ("proc", cmd_proc),
    ];
    for &(name, command) in CORE {
        interp
            .register_fn(name, command)
            .expect("core command names are distinct");
    }
}

fn arity_error(interp: &mut Interp, name: &BString) -> EvalError {
    interp.fail(EvalError::ArityMismatch(name.clone()))
}

/// Parses a leading decimal integer: optional whitespace and sign, then a
/// maximal digit run. Anything unparseable yields 0. Arithmetic on the
/// result wraps rather than overflowing.
fn parse_int(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    while let [b, tail @ ..] = rest {
        if !b.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }
    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    while let [digit @ b'0'..=b'9', tail @ ..] = rest {
        value = value.wrapping_mul(10).wrapping_add((digit - b'0') as i64);
        rest = tail;
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Integer arithmetic and comparison. The operator is the name the command
/// was invoked under; comparisons yield `0` or `1`.
fn cmd_math(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 3 {
        return Err(arity_error(interp, &argv[0]));
    }
    let a = parse_int(&argv[1]);
    let b = parse_int(&argv[2]);
    let value = match argv[0].as_slice() {
        b"+" => a.wrapping_add(b),
        b"-" => a.wrapping_sub(b),
        b"*" => a.wrapping_mul(b),
        // A zero quotient stands in for the undefined division by zero.
        b"/" => {
            if b == 0 {
                0
            } else {
                a.wrapping_div(b)
            }
        }
        b">" => (a > b) as i64,
        b">=" => (a >= b) as i64,
        b"<" => (a < b) as i64,
        b"<=" => (a <= b) as i64,
        b"==" => (a == b) as i64,
        b"!=" => (a != b) as i64,
        op => unreachable!("math command registered as {:?}", op.as_bstr()),
    };
    interp.set_result(value.to_string());
    Ok(Flow::Normal)
}

fn cmd_set(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 3 {
        return Err(arity_error(interp, &argv[0]));
    }
    interp.set_var(&argv[1], &argv[2]);
    interp.set_result(argv[2].clone());
    Ok(Flow::Normal)
}

fn cmd_puts(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 2 {
        return Err(arity_error(interp, &argv[0]));
    }
    // An unwritable sink is a host problem, not a script error.
    let _ = interp
        .out
        .write_all(&argv[1])
        .and_then(|()| interp.out.write_all(b"\n"));
    Ok(Flow::Normal)
}

/// `if cond then`, `if cond then else-body`, or `if cond then else
/// else-body`. The condition is a script whose result is read as an
/// integer; the chosen branch is evaluated in place, so its flow code is
/// the caller's.
fn cmd_if(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if !matches!(argv.len(), 3..=5) {
        return Err(arity_error(interp, &argv[0]));
    }
    match interp.eval(&argv[1])? {
        Flow::Normal => {}
        flow => return Ok(flow),
    }
    if parse_int(interp.result()) != 0 {
        interp.eval(&argv[2])
    } else {
        match argv.len() {
            4 => interp.eval(&argv[3]),
            5 => interp.eval(&argv[4]),
            _ => Ok(Flow::Normal),
        }
    }
}

/// `while cond body`. `continue` in the body restarts the loop, `break`
/// exits it normally, and `return` unwinds past it.
fn cmd_while(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 3 {
        return Err(arity_error(interp, &argv[0]));
    }
    loop {
        match interp.eval(&argv[1])? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
        if parse_int(interp.result()) == 0 {
            return Ok(Flow::Normal);
        }
        match interp.eval(&argv[2])? {
            Flow::Normal | Flow::Continue => {}
            Flow::Break => return Ok(Flow::Normal),
            Flow::Return => return Ok(Flow::Return),
        }
    }
}

fn cmd_break(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 1 {
        return Err(arity_error(interp, &argv[0]));
    }
    Ok(Flow::Break)
}

fn cmd_continue(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    if argv.len() != 1 {
        return Err(arity_error(interp, &argv[0]));
    }
    Ok(Flow::Continue)
}

fn cmd_return(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    match argv {
        [_] => interp.set_result(""),
        [_, value] => interp.set_result(value.clone()),
        _ => return Err(arity_error(interp, &argv[0])),
    }
    Ok(Flow::Return)
}

/// `proc name {formals} {body}`: registers a procedure under `name`.
fn cmd_proc(interp: &mut Interp, argv: &[BString]) -> EvalResult {
    let [_, name, params, body] = argv else {
        return Err(arity_error(interp, &argv[0]));
    };
    interp.register_command(
        name.clone(),
        Proc {
            params: params.clone(),
            body: body.clone(),
        },
    )?;
    Ok(Flow::Normal)
}

/// A script-defined procedure: the formal argument list and body captured
/// by `proc`.
struct Proc {
    params: BString,
    body: BString,
}

impl Command for Proc {
    fn call(&self, interp: &mut Interp, argv: &[BString]) -> EvalResult {
        interp.push_frame();
        let flow = self.call_in_frame(interp, argv);
        interp.pop_frame();
        match flow? {
            // `return` stops the procedure, not the caller.
            Flow::Return => Ok(Flow::Normal),
            flow => Ok(flow),
        }
    }
}

impl Proc {
    /// Binds the formals to `argv[1..]` in the already-pushed frame, then
    /// runs the body.
    fn call_in_frame(&self, interp: &mut Interp, argv: &[BString]) -> EvalResult {
        let mut actuals = argv[1..].iter();
        // Formals are separated by runs of spaces.
        let formals = self
            .params
            .split(|&b| b == b' ')
            .filter(|formal| !formal.is_empty());
        for formal in formals {
            let Some(actual) = actuals.next() else {
                return Err(interp.fail(EvalError::ProcArity(argv[0].clone())));
            };
            interp.set_var(formal, actual);
        }
        if actuals.next().is_some() {
            return Err(interp.fail(EvalError::ProcArity(argv[0].clone())));
        }
        interp.eval(&self.body)
    }
}
