// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! The interpreter: variable frames, the evaluator, and its error type.

use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Write},
    rc::Rc,
};

use bstr::{BStr, BString, ByteSlice};
use static_assertions::assert_not_impl_any;
use thiserror::Error;

use crate::{
    builtins,
    command::{Command, FnCommand, Registry},
    parse::{decode_escapes, Parser, TokenKind},
};

/// How evaluation concluded, short of an error.
///
/// `Return`, `Break`, and `Continue` unwind out of [`Interp::eval`]
/// untouched; the constructs that consume them (`while`, the procedure
/// dispatcher) decide what they mean. When nothing consumes them, they
/// reach the host as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flow {
    /// The script ran to completion.
    Normal,
    Return,
    Break,
    Continue,
}

/// An error from evaluating a script.
///
/// By the time one of these is returned, the same message has been stored
/// in the interpreter result, so a host that prints the result shows the
/// failure text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("No such variable '{0}'")]
    UndefinedVariable(BString),
    #[error("No such command '{0}'")]
    UndefinedCommand(BString),
    #[error("Wrong number of args for {0}")]
    ArityMismatch(BString),
    #[error("Proc '{0}' called with wrong arg num")]
    ProcArity(BString),
    #[error("Command '{0}' already defined")]
    AlreadyDefined(BString),
}

pub type EvalResult = Result<Flow, EvalError>;

/// One variable binding. Names and values are arbitrary byte strings.
struct Var {
    name: BString,
    value: BString,
}

/// The bindings for one activation: the global scope or one procedure
/// call. Lookup is a linear scan of this frame only; procedures do not see
/// their caller's variables.
#[derive(Default)]
struct CallFrame {
    vars: Vec<Var>,
}

impl CallFrame {
    fn get(&self, name: &[u8]) -> Option<&BStr> {
        self.vars
            .iter()
            .find(|var| var.name.as_slice() == name)
            .map(|var| var.value.as_bstr())
    }

    fn set(&mut self, name: &[u8], value: &[u8]) {
        match self.vars.iter_mut().find(|var| var.name.as_slice() == name) {
            Some(var) => var.value = BString::from(value),
            None => self.vars.push(Var {
                name: BString::from(name),
                value: BString::from(value),
            }),
        }
    }
}

/// A command-language interpreter: a stack of variable frames, a command
/// registry, and the result of the last evaluation.
pub struct Interp {
    /// Nesting depth of in-progress `eval` activations. Informational.
    level: usize,
    /// The frame stack. Index 0 is the global frame and is never popped.
    frames: Vec<CallFrame>,
    commands: Registry,
    result: BString,
    /// Where `puts` writes. Defaults to stdout.
    pub(crate) out: Box<dyn Write>,
}

// One interpreter is strictly single-threaded: handlers are `Rc` and all
// evaluation state is unsynchronized.
assert_not_impl_any!(Interp: Send, Sync);

impl Interp {
    /// Creates an interpreter with the core command set registered.
    pub fn new() -> Self {
        let mut interp = Interp {
            level: 0,
            frames: vec![CallFrame::default()],
            commands: Registry::default(),
            result: BString::default(),
            out: Box::new(io::stdout()),
        };
        builtins::register_core(&mut interp);
        interp
    }

    /// The result of the most recent evaluation. After a failed evaluation
    /// this holds the failure message.
    #[inline]
    pub fn result(&self) -> &BStr {
        self.result.as_bstr()
    }

    #[inline]
    pub fn set_result(&mut self, result: impl Into<BString>) {
        self.result = result.into();
    }

    /// Stores the message for `err` as the interpreter result and hands
    /// the error back, so failure sites read `Err(interp.fail(..))`.
    pub fn fail(&mut self, err: EvalError) -> EvalError {
        self.result = err.to_string().into_bytes().into();
        err
    }

    /// Looks up `name` in the current frame.
    pub fn var(&self, name: &[u8]) -> Option<&BStr> {
        self.current_frame().get(name)
    }

    /// Binds `name` in the current frame, overwriting any existing
    /// binding.
    pub fn set_var(&mut self, name: &[u8], value: &[u8]) {
        self.current_frame_mut().set(name, value);
    }

    /// Registers a command for scripts to call.
    pub fn register_command(
        &mut self,
        name: impl Into<BString>,
        command: impl Command + 'static,
    ) -> Result<(), EvalError> {
        self.commands
            .register(name.into(), Rc::new(command))
            .map_err(|err| self.fail(err))
    }

    /// Registers a plain function or closure as a command. A closure's
    /// captures serve as its private data.
    pub fn register_fn<F>(&mut self, name: impl Into<BString>, f: F) -> Result<(), EvalError>
    where
        F: Fn(&mut Interp, &[BString]) -> EvalResult + 'static,
    {
        self.register_command(name, FnCommand(f))
    }

    /// Replaces the sink that `puts` writes to.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// The current depth of nested `eval` calls.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(CallFrame::default());
    }

    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "popped the global frame");
        self.frames.pop();
    }

    fn current_frame(&self) -> &CallFrame {
        self.frames.last().expect("a frame is always live")
    }

    fn current_frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("a frame is always live")
    }

    /// Evaluates `script`, leaving the result of its last command in
    /// [`Interp::result`].
    ///
    /// The `Err` arm carries evaluation failures; the `Ok` arm carries the
    /// flow code, which is `Normal` unless an unconsumed `return`,
    /// `break`, or `continue` unwound to this call.
    pub fn eval(&mut self, script: impl AsRef<[u8]>) -> EvalResult {
        self.level += 1;
        let result = self.eval_script(script.as_ref());
        self.level -= 1;
        result
    }

    fn eval_script(&mut self, script: &[u8]) -> EvalResult {
        self.result.clear();
        let mut parser = Parser::new(script);
        let mut argv: Vec<BString> = Vec::new();
        let mut prev = TokenKind::Eol;
        loop {
            let token = parser.next_token();
            let word = match token.kind {
                TokenKind::Eof => break,
                TokenKind::Sep => {
                    prev = token.kind;
                    continue;
                }
                TokenKind::Eol => {
                    prev = token.kind;
                    if !argv.is_empty() {
                        match self.invoke(&argv)? {
                            Flow::Normal => {}
                            flow => return Ok(flow),
                        }
                    }
                    argv.clear();
                    continue;
                }
                TokenKind::Var => match self.var(token.text) {
                    Some(value) => value.to_owned(),
                    None => {
                        let name = BString::from(token.text);
                        return Err(self.fail(EvalError::UndefinedVariable(name)));
                    }
                },
                TokenKind::Cmd => match self.eval(token.text)? {
                    Flow::Normal => self.result.clone(),
                    flow => return Ok(flow),
                },
                TokenKind::Esc => {
                    let mut word = BString::from(token.text);
                    decode_escapes(&mut word);
                    word
                }
                TokenKind::Str => BString::from(token.text),
            };
            // A token after a separator starts a new word; otherwise it
            // interpolates into the previous one.
            if matches!(prev, TokenKind::Sep | TokenKind::Eol) {
                argv.push(word);
            } else if let Some(last) = argv.last_mut() {
                last.extend_from_slice(&word);
            } else {
                argv.push(word);
            }
            prev = token.kind;
        }
        Ok(Flow::Normal)
    }

    /// Resolves `argv[0]` and invokes its handler.
    fn invoke(&mut self, argv: &[BString]) -> EvalResult {
        let name = &argv[0];
        let command = match self.commands.lookup(name.as_slice()) {
            Some(command) => Rc::clone(command),
            None => return Err(self.fail(EvalError::UndefinedCommand(name.clone()))),
        };
        command.call(self, argv)
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

impl Debug for Interp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interp")
            .field("level", &self.level)
            .field("frames", &self.frames.len())
            .field("commands", &self.commands)
            .field("result", &self.result.as_bstr())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// A `puts` sink the test can read back.
    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn interp_with_sink() -> (Interp, Sink) {
        let sink = Sink::default();
        let mut interp = Interp::new();
        interp.set_output(Box::new(sink.clone()));
        (interp, sink)
    }

    #[test]
    fn empty_source_is_ok_with_empty_result() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval(""), Ok(Flow::Normal));
        assert_eq!(interp.result(), "");
    }

    #[test]
    fn whitespace_and_comment_lines_are_noops() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("   \t  \n"), Ok(Flow::Normal));
        assert_eq!(interp.eval("# just a comment\n"), Ok(Flow::Normal));
        assert_eq!(interp.result(), "");
    }

    #[test]
    fn set_binds_and_returns_the_value() {
        let (mut interp, sink) = interp_with_sink();
        assert_eq!(interp.eval("set x 5"), Ok(Flow::Normal));
        assert_eq!(interp.result(), "5");
        assert_eq!(interp.eval("puts $x"), Ok(Flow::Normal));
        assert_eq!(sink.0.borrow().as_bstr(), "5\n");
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut interp = Interp::new();
        interp.eval("set x V ; set x W").unwrap();
        assert_eq!(interp.result(), "W");
        assert_eq!(interp.var(b"x"), Some("W".as_bytes().as_bstr()));
        let bindings = interp.frames[0]
            .vars
            .iter()
            .filter(|var| var.name == "x")
            .count();
        assert_eq!(bindings, 1);
    }

    #[test]
    fn undefined_variable_fails() {
        let mut interp = Interp::new();
        let err = interp.eval("puts $undef").unwrap_err();
        assert_eq!(err, EvalError::UndefinedVariable("undef".into()));
        assert_eq!(interp.result(), "No such variable 'undef'");
    }

    #[test]
    fn undefined_command_fails() {
        let mut interp = Interp::new();
        let err = interp.eval("frobnicate 1 2").unwrap_err();
        assert_eq!(err, EvalError::UndefinedCommand("frobnicate".into()));
        assert_eq!(interp.result(), "No such command 'frobnicate'");
    }

    #[test]
    fn interpolation_joins_adjacent_tokens() {
        let mut interp = Interp::new();
        interp.eval("set x 5 ; set y a$x!").unwrap();
        assert_eq!(interp.result(), "a5!");
    }

    #[test]
    fn quoted_words_substitute_variables() {
        let mut interp = Interp::new();
        interp
            .eval("set name world ; set msg \"hello $name\"")
            .unwrap();
        assert_eq!(interp.result(), "hello world");
    }

    #[test]
    fn command_substitution_uses_the_inner_result() {
        let mut interp = Interp::new();
        interp.eval("set x [+ 2 3]").unwrap();
        assert_eq!(interp.result(), "5");
    }

    #[test]
    fn quote_state_does_not_leak_into_substitution() {
        let mut interp = Interp::new();
        interp.eval("set x \"v [set y \"q\"] w\"").unwrap();
        assert_eq!(interp.result(), "v q w");
        assert_eq!(interp.var(b"y"), Some("q".as_bytes().as_bstr()));
    }

    #[test]
    fn braced_words_are_verbatim() {
        let mut interp = Interp::new();
        interp.eval("set x {a $y [z] b}").unwrap();
        assert_eq!(interp.result(), "a $y [z] b");
    }

    #[test]
    fn unterminated_brace_takes_the_rest_of_the_input() {
        let mut interp = Interp::new();
        interp.eval("set x {abc").unwrap();
        assert_eq!(interp.result(), "abc");
    }

    #[test]
    fn lone_dollar_is_literal() {
        let mut interp = Interp::new();
        interp.eval("set x $").unwrap();
        assert_eq!(interp.result(), "$");
    }

    #[test]
    fn hash_mid_word_is_literal() {
        let mut interp = Interp::new();
        interp.eval("set x a#b").unwrap();
        assert_eq!(interp.result(), "a#b");
    }

    #[test]
    fn escapes_decode_inside_words() {
        let mut interp = Interp::new();
        interp.eval(b"set x a\\tb".as_slice()).unwrap();
        assert_eq!(interp.result(), "a\tb");
        interp.eval(b"set y \\x41\\x42".as_slice()).unwrap();
        assert_eq!(interp.result(), "AB");
    }

    #[test]
    fn flow_codes_reach_the_top_level() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("break"), Ok(Flow::Break));
        assert_eq!(interp.eval("continue"), Ok(Flow::Continue));
        assert_eq!(interp.eval("return hi"), Ok(Flow::Return));
        assert_eq!(interp.result(), "hi");
    }

    #[test]
    fn flow_codes_abort_the_rest_of_the_script() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("set x 1 ; break ; set x 2"), Ok(Flow::Break));
        assert_eq!(interp.var(b"x"), Some("1".as_bytes().as_bstr()));
    }

    #[test]
    fn procedures_do_not_see_caller_variables() {
        let mut interp = Interp::new();
        interp.eval("set g 1 ; proc p {} { puts $g }").unwrap();
        let err = interp.eval("p").unwrap_err();
        assert_eq!(err, EvalError::UndefinedVariable("g".into()));
    }

    #[test]
    fn frame_stack_depth_survives_errors() {
        let mut interp = Interp::new();
        interp.eval("set g 7 ; proc p {a} { puts $nope }").unwrap();
        assert!(interp.eval("p 1").is_err());
        assert_eq!(interp.frames.len(), 1);
        assert_eq!(interp.level(), 0);
        // Still in the global frame: the binding from before is visible.
        assert_eq!(interp.var(b"g"), Some("7".as_bytes().as_bstr()));
    }

    #[test]
    fn hosts_can_register_commands_with_state() {
        let calls = Rc::new(RefCell::new(0));
        let count = Rc::clone(&calls);
        let mut interp = Interp::new();
        interp
            .register_fn("tick", move |interp: &mut Interp, argv: &[BString]| {
                *count.borrow_mut() += 1;
                interp.set_result(argv.len().to_string());
                Ok(Flow::Normal)
            })
            .unwrap();
        interp.eval("tick ; tick a b").unwrap();
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(interp.result(), "3");
    }

    #[test]
    fn registering_an_existing_name_fails() {
        let mut interp = Interp::new();
        let err = interp
            .register_fn("set", |_: &mut Interp, _: &[BString]| Ok(Flow::Normal))
            .unwrap_err();
        assert_eq!(err, EvalError::AlreadyDefined("set".into()));
        assert_eq!(interp.result(), "Command 'set' already defined");
    }

    #[test]
    fn result_round_trips_plain_words() {
        let (mut interp, sink) = interp_with_sink();
        interp.eval("set x hello-there_42 ; puts $x").unwrap();
        assert_eq!(sink.0.borrow().as_bstr(), "hello-there_42\n");
    }
}
