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

//! Checker configuration: unwind bounds, depth bound, target widths
//! and the solver command. The driver builds one of these from the
//! command line, optionally seeded from a toml file.

use serde::Deserialize;
use std::collections::HashMap;

use crate::ir::InstrId;

#[derive(Clone, Debug)]
pub struct CheckConfig {
    /// Global loop/recursion unwind bound. `None` leaves loops bounded
    /// only by the depth limit.
    pub unwind: Option<u32>,
    /// Per-instruction overrides, keyed on stable instruction ids.
    pub unwindset: HashMap<InstrId, u32>,
    /// Emit an `assert(false)` when a bound is exhausted, before the
    /// path is closed with `assume(false)`.
    pub unwinding_assertions: bool,
    /// Bound on instructions executed per thread.
    pub max_depth: Option<usize>,
    /// Width of `int` on the target, 16, 32 or 64.
    pub int_width: u32,
    /// Pointer width on the target.
    pub pointer_width: u32,
    /// Encode floating-point operations down to bit-vectors.
    pub floatbv: bool,
    /// Bound on context switches when interleaving subject threads.
    pub context_bound: u32,
    /// Solver command line, e.g. `z3 -in`.
    pub solver: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            unwind: None,
            unwindset: HashMap::new(),
            unwinding_assertions: true,
            max_depth: None,
            int_width: 32,
            pointer_width: 64,
            floatbv: true,
            context_bound: 4,
            solver: "z3 -in".to_string(),
        }
    }
}

impl CheckConfig {
    /// The unwind bound for a specific backward edge.
    pub fn unwind_bound(&self, id: InstrId) -> Option<u32> {
        self.unwindset.get(&id).copied().or(self.unwind)
    }

    /// Parse an `--unwindset` argument of the form `id:k,id:k,...`.
    pub fn parse_unwindset(&mut self, arg: &str) -> Result<(), String> {
        for part in arg.split(',') {
            let mut fields = part.split(':');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(id), Some(k), None) => {
                    let id = id.parse::<u32>().map_err(|e| e.to_string())?;
                    let k = k.parse::<u32>().map_err(|e| e.to_string())?;
                    self.unwindset.insert(InstrId(id), k);
                }
                _ => return Err(format!("bad unwindset entry: {}", part)),
            }
        }
        Ok(())
    }

    pub fn set_int_width(&mut self, width: u32) {
        self.int_width = width;
        self.pointer_width = if width == 16 { 32 } else { width.max(32) };
    }
}

/// The subset of the configuration that can live in a toml file passed
/// with `--config`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub unwind: Option<u32>,
    pub unwindset: Option<String>,
    pub depth: Option<usize>,
    pub solver: Option<String>,
    pub context_bound: Option<u32>,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    pub fn apply(&self, cfg: &mut CheckConfig) -> Result<(), String> {
        if let Some(unwind) = self.unwind {
            cfg.unwind = Some(unwind);
        }
        if let Some(unwindset) = &self.unwindset {
            cfg.parse_unwindset(unwindset)?;
        }
        if let Some(depth) = self.depth {
            cfg.max_depth = Some(depth);
        }
        if let Some(solver) = &self.solver {
            cfg.solver = solver.clone();
        }
        if let Some(bound) = self.context_bound {
            cfg.context_bound = bound;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwindset_overrides_global() {
        let mut cfg = CheckConfig::default();
        cfg.unwind = Some(10);
        cfg.parse_unwindset("3:5,7:0").unwrap();
        assert_eq!(cfg.unwind_bound(InstrId(3)), Some(5));
        assert_eq!(cfg.unwind_bound(InstrId(7)), Some(0));
        assert_eq!(cfg.unwind_bound(InstrId(4)), Some(10));
        assert!(cfg.parse_unwindset("nonsense").is_err());
    }

    #[test]
    fn test_config_file() {
        let file = ConfigFile::parse("unwind = 8\nsolver = \"cvc5 --incremental\"\n").unwrap();
        let mut cfg = CheckConfig::default();
        file.apply(&mut cfg).unwrap();
        assert_eq!(cfg.unwind, Some(8));
        assert_eq!(cfg.solver, "cvc5 --incremental");
    }
}
