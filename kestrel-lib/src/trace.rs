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

//! The equation trace: the append-only record of renamed assignments,
//! assumptions, assertions and informational output that symbolic
//! execution produces, and which is later flattened into one SMT
//! formula. In any prefix of the trace each SSA name appears as an
//! assignment left-hand side at most once.

use std::collections::{HashMap, HashSet};

use crate::guard::Guard;
use crate::ir::{Exp, Symtab, Ty};
use crate::renaming::SsaName;
use crate::source_loc::SourceLoc;

#[derive(Clone, Debug)]
pub enum Step {
    Assignment { guard: Guard, lhs: SsaName, rhs: Exp<SsaName> },
    /// Same shape as an assignment; marks a merge at a join point.
    Phi { guard: Guard, lhs: SsaName, rhs: Exp<SsaName> },
    Assumption { guard: Guard, cond: Exp<SsaName> },
    Assertion { guard: Guard, cond: Exp<SsaName>, msg: String, loc: SourceLoc },
    /// Informational; not part of satisfiability.
    Output { guard: Guard, args: Vec<Exp<SsaName>> },
}

impl Step {
    pub fn guard(&self) -> &Guard {
        match self {
            Step::Assignment { guard, .. }
            | Step::Phi { guard, .. }
            | Step::Assumption { guard, .. }
            | Step::Assertion { guard, .. }
            | Step::Output { guard, .. } => guard,
        }
    }

    pub fn defines(&self) -> Option<SsaName> {
        match self {
            Step::Assignment { lhs, .. } | Step::Phi { lhs, .. } => Some(*lhs),
            _ => None,
        }
    }
}

/// A named proof obligation extracted from an assertion step.
#[derive(Clone, Debug)]
pub struct Property {
    pub index: usize,
    pub msg: String,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, Default)]
pub struct Trace {
    steps: Vec<Step>,
    /// Declared type of every SSA symbol mentioned in the trace, for
    /// sort assignment when lowering to SMT.
    types: HashMap<SsaName, Ty, ahash::RandomState>,
}

impl Trace {
    pub fn new() -> Self {
        Trace::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn ty_of(&self, name: SsaName) -> Option<&Ty> {
        self.types.get(&name)
    }

    pub fn record_type(&mut self, name: SsaName, ty: Ty) {
        self.types.entry(name).or_insert(ty);
    }

    pub fn assignment(&mut self, guard: Guard, lhs: SsaName, rhs: Exp<SsaName>, ty: Ty) {
        debug_assert!(self.check_ssa_fresh(lhs), "SSA name assigned twice: {}", lhs);
        self.record_type(lhs, ty);
        self.steps.push(Step::Assignment { guard, lhs, rhs });
    }

    pub fn phi(&mut self, guard: Guard, lhs: SsaName, rhs: Exp<SsaName>, ty: Ty) {
        debug_assert!(self.check_ssa_fresh(lhs), "SSA name assigned twice: {}", lhs);
        self.record_type(lhs, ty);
        self.steps.push(Step::Phi { guard, lhs, rhs });
    }

    pub fn assumption(&mut self, guard: Guard, cond: Exp<SsaName>) {
        self.steps.push(Step::Assumption { guard, cond });
    }

    pub fn assertion(&mut self, guard: Guard, cond: Exp<SsaName>, msg: &str, loc: SourceLoc) {
        self.steps.push(Step::Assertion { guard, cond, msg: msg.to_string(), loc });
    }

    pub fn output(&mut self, guard: Guard, args: Vec<Exp<SsaName>>) {
        self.steps.push(Step::Output { guard, args });
    }

    pub fn properties(&self) -> Vec<Property> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(index, step)| match step {
                Step::Assertion { msg, loc, .. } => {
                    Some(Property { index, msg: msg.clone(), loc: *loc })
                }
                _ => None,
            })
            .collect()
    }

    fn check_ssa_fresh(&self, lhs: SsaName) -> bool {
        !self.steps.iter().any(|step| step.defines() == Some(lhs))
    }

    /// Check the single-assignment invariant over the whole trace.
    pub fn check_ssa(&self) -> bool {
        let mut seen = HashSet::new();
        self.steps.iter().filter_map(Step::defines).all(|lhs| seen.insert(lhs))
    }

    pub fn dump(&self, symtab: &Symtab) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for step in &self.steps {
            match step {
                Step::Assignment { lhs, rhs, .. } => {
                    let _ = writeln!(out, "{} = {:?}", SsaName::to_string(*lhs, symtab), rhs);
                }
                Step::Phi { lhs, rhs, .. } => {
                    let _ = writeln!(out, "{} = {:?} (phi)", SsaName::to_string(*lhs, symtab), rhs);
                }
                Step::Assumption { cond, .. } => {
                    let _ = writeln!(out, "assume {:?}", cond);
                }
                Step::Assertion { cond, msg, .. } => {
                    let _ = writeln!(out, "assert {:?} [{}]", cond, msg);
                }
                Step::Output { args, .. } => {
                    let _ = writeln!(out, "output {:?}", args);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Guard;
    use crate::ir::Name;
    use crate::renaming::L1Name;

    fn ssa(n: u32, version: u32) -> SsaName {
        SsaName { l1: L1Name::global(Name::from_u32(n)), version }
    }

    #[test]
    fn test_ssa_invariant() {
        let mut trace = Trace::new();
        trace.assignment(Guard::new(), ssa(10, 1), Exp::Bool(true), Ty::Bool);
        trace.assignment(Guard::new(), ssa(10, 2), Exp::Bool(false), Ty::Bool);
        trace.phi(Guard::new(), ssa(10, 3), Exp::Id(ssa(10, 2)), Ty::Bool);
        assert!(trace.check_ssa());
    }

    #[test]
    fn test_properties() {
        let mut trace = Trace::new();
        trace.assumption(Guard::new(), Exp::Bool(true));
        trace.assertion(Guard::new(), Exp::Bool(false), "no-overflow", SourceLoc::unknown());
        let props = trace.properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].msg, "no-overflow");
        assert_eq!(props[0].index, 1);
    }

    #[test]
    fn test_types_recorded() {
        let mut trace = Trace::new();
        trace.assignment(Guard::new(), ssa(10, 1), Exp::Bool(true), Ty::Bool);
        assert_eq!(trace.ty_of(ssa(10, 1)), Some(&Ty::Bool));
        assert_eq!(trace.ty_of(ssa(10, 2)), None);
    }
}
