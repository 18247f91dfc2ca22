// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Command handlers and the per-interpreter command registry.

use std::{
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

use bstr::BString;

use crate::interp::{EvalError, EvalResult, Interp};

/// A handler invoked when a script names it as the first word of a command.
///
/// `argv[0]` is the name the command was invoked under; the remaining
/// elements are the fully substituted argument words. Implementations
/// report failures with [`Interp::fail`], so the result string carries the
/// message alongside the returned error.
pub trait Command {
    fn call(&self, interp: &mut Interp, argv: &[BString]) -> EvalResult;
}

/// Adapter that turns a plain function or closure into a [`Command`]. The
/// captures of a closure play the role of command-private data.
pub struct FnCommand<F>(pub F);

impl<F> Command for FnCommand<F>
where
    F: Fn(&mut Interp, &[BString]) -> EvalResult,
{
    #[inline]
    fn call(&self, interp: &mut Interp, argv: &[BString]) -> EvalResult {
        (self.0)(interp, argv)
    }
}

/// The commands registered in one interpreter, in registration order.
///
/// Lookup is a linear scan. The registry stays small in practice and the
/// evaluator resolves each name once per invocation.
#[derive(Default)]
pub(crate) struct Registry {
    commands: Vec<(BString, Rc<dyn Command>)>,
}

impl Registry {
    pub(crate) fn lookup(&self, name: &[u8]) -> Option<&Rc<dyn Command>> {
        self.commands
            .iter()
            .find(|(registered, _)| registered.as_slice() == name)
            .map(|(_, command)| command)
    }

    /// Registers `command` under `name`. Names are permanent: registering
    /// an existing name again is an error, not a replacement.
    pub(crate) fn register(
        &mut self,
        name: BString,
        command: Rc<dyn Command>,
    ) -> Result<(), EvalError> {
        if self.lookup(name.as_slice()).is_some() {
            return Err(EvalError::AlreadyDefined(name));
        }
        self.commands.push((name, command));
        Ok(())
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.commands.iter().map(|(name, _)| name))
            .finish()
    }
}
