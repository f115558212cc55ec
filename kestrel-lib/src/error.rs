// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
// Copyright (c) 2020 Brian Campbell
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::error::Error;
use std::fmt;

use crate::source_loc::SourceLoc;

#[derive(Debug)]
pub enum ExecError {
    /// An IR node violated a static precondition, e.g. a pointer-typed
    /// assignment with a non-pointer right hand side. Always fatal.
    Type(String, SourceLoc),
    /// The entry function named on the command line does not exist in
    /// the program.
    NoEntry(String),
    /// A depth or memory bound was exceeded. The offending path has
    /// already been closed with `assume(false)` when this is raised.
    ResourceExhaustion,
    /// Raised when a GOTO binary or prelinked library blob cannot be
    /// decoded.
    BadGotoBinary(String),
    /// The external SMT solver process misbehaved (failed to start,
    /// produced unparseable output, or reported an error).
    Solver(String),
    /// Used for cases that should be unreachable (i.e. are definite
    /// engine bugs rather than bad input).
    Unreachable(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecError::Type(msg, loc) => write!(f, "type invariant violated at {}: {}", loc, msg),
            ExecError::NoEntry(name) => write!(f, "no entry function {}", name),
            ExecError::ResourceExhaustion => write!(f, "resource bound exhausted"),
            ExecError::BadGotoBinary(msg) => write!(f, "bad goto binary: {}", msg),
            ExecError::Solver(msg) => write!(f, "solver error: {}", msg),
            ExecError::Unreachable(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl Error for ExecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
