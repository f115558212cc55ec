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

//! Serialization for GOTO binaries. A binary is a length-prefixed
//! bincode blob containing the raw symbol table and the program
//! definitions; the prelinked C library ships in exactly the same
//! format, one blob per target integer width.

use serde::{Deserialize, Serialize};
use std::convert::TryInto;

use super::{Program, Symtab};
use crate::error::ExecError;

#[derive(Serialize, Deserialize)]
pub struct GotoBinary {
    pub symbols: Vec<String>,
    pub program: Program,
}

pub fn write_binary(symtab: &Symtab, program: &Program) -> Result<Vec<u8>, ExecError> {
    let binary = GotoBinary { symbols: symtab.to_raw_table(), program: program.clone() };
    let payload =
        bincode::serialize(&binary).map_err(|e| ExecError::BadGotoBinary(e.to_string()))?;
    let mut buf = Vec::with_capacity(payload.len() + 8);
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub fn read_binary(bytes: &[u8]) -> Result<GotoBinary, ExecError> {
    if bytes.len() < 8 {
        return Err(ExecError::BadGotoBinary("truncated header".to_string()));
    }
    let len = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    let payload = bytes
        .get(8..8 + len)
        .ok_or_else(|| ExecError::BadGotoBinary("truncated payload".to_string()))?;
    bincode::deserialize(payload).map_err(|e| ExecError::BadGotoBinary(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    #[test]
    fn test_binary_round_trip() {
        let mut symtab = Symtab::new();
        let x = symtab.intern("x");
        let mut program = Program::new(MAIN);
        program.add_function(Function {
            name: MAIN,
            params: Vec::new(),
            ret_ty: Ty::Signed(32),
            body: vec![
                Instr::new(InstrKind::Decl(x, Ty::Signed(32))),
                Instr::new(InstrKind::EndFunction),
            ],
        });
        program.assign_ids();

        let bytes = write_binary(&symtab, &program).unwrap();
        let binary = read_binary(&bytes).unwrap();
        assert_eq!(binary.symbols, symtab.to_raw_table());
        assert_eq!(binary.program.functions.len(), 1);
        assert_eq!(binary.program.function(MAIN).unwrap().body.len(), 2);
    }

    #[test]
    fn test_truncated_binary() {
        assert!(read_binary(&[1, 2, 3]).is_err());
        let mut symtab = Symtab::new();
        let program = Program::new(MAIN);
        let mut bytes = write_binary(&mut symtab, &program).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(read_binary(&bytes).is_err());
    }
}
