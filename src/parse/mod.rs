// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Tokenization of script source and backslash-escape decoding.

mod parser;
mod quote;

pub use parser::*;
pub use quote::*;
