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

//! Path-condition guards: deduplicated, associativity-flattened
//! conjunctions of boolean atoms. Guards are monotone along a single
//! path; merging at a join point is the only operation that weakens
//! one, via [Guard::or_with].

use crate::ir::{short_circuit_and, short_circuit_or, Exp, Op};
use crate::renaming::SsaName;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Guard {
    /// Invariant: no `Bool` atoms, except the singleton `[Bool(false)]`
    /// representing the unsatisfiable guard. Empty means true.
    atoms: Vec<Exp<SsaName>>,
}

impl Guard {
    pub fn new() -> Self {
        Guard { atoms: Vec::new() }
    }

    pub fn is_true(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn is_false(&self) -> bool {
        matches!(self.atoms.as_slice(), [Exp::Bool(false)])
    }

    pub fn make_false(&mut self) {
        self.atoms.clear();
        self.atoms.push(Exp::Bool(false));
    }

    fn negates(lhs: &Exp<SsaName>, rhs: &Exp<SsaName>) -> bool {
        match (lhs, rhs) {
            (Exp::Call(Op::Not, args), _) if args.len() == 1 => args[0] == *rhs,
            (_, Exp::Call(Op::Not, args)) if args.len() == 1 => args[0] == *lhs,
            _ => false,
        }
    }

    /// Conjoin a new atom.
    pub fn add(&mut self, exp: Exp<SsaName>) {
        if self.is_false() {
            return;
        }
        match exp.simplify() {
            Exp::Bool(true) => (),
            Exp::Bool(false) => self.make_false(),
            exp => {
                if self.atoms.iter().any(|atom| Guard::negates(atom, &exp)) {
                    self.make_false()
                } else if !self.atoms.contains(&exp) {
                    self.atoms.push(exp)
                }
            }
        }
    }

    /// Weaken this guard to the disjunction of itself and `other`,
    /// keeping the common prefix of atoms conjoined and or-ing the
    /// remainders.
    pub fn or_with(&mut self, other: &Guard) {
        if self.is_true() || other.is_false() {
            return;
        }
        if self.is_false() {
            *self = other.clone();
            return;
        }
        if other.is_true() {
            self.atoms.clear();
            return;
        }
        let common =
            self.atoms.iter().zip(other.atoms.iter()).take_while(|(a, b)| a == b).count();
        let rest_self = conjoin(&self.atoms[common..]);
        let rest_other = conjoin(&other.atoms[common..]);
        self.atoms.truncate(common);
        match short_circuit_or(rest_self, rest_other).simplify() {
            Exp::Bool(true) => (),
            Exp::Bool(false) => self.make_false(),
            exp => self.atoms.push(exp),
        }
    }

    /// The guard as a single boolean expression.
    pub fn as_expr(&self) -> Exp<SsaName> {
        conjoin(&self.atoms)
    }

    /// `as_expr() ⇒ exp`, eliding the implication when the guard is
    /// trivially true.
    pub fn guard_expr(&self, exp: Exp<SsaName>) -> Exp<SsaName> {
        if self.is_true() {
            exp
        } else {
            Exp::Call(Op::Implies, vec![self.as_expr(), exp])
        }
    }
}

fn conjoin(atoms: &[Exp<SsaName>]) -> Exp<SsaName> {
    let mut result = Exp::Bool(true);
    for atom in atoms {
        result = short_circuit_and(result, atom.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Name;
    use crate::renaming::L1Name;

    fn atom(n: u32) -> Exp<SsaName> {
        Exp::Id(SsaName { l1: L1Name::global(Name::from_u32(n)), version: 1 })
    }

    #[test]
    fn test_true_unit() {
        let mut g = Guard::new();
        assert!(g.is_true());
        g.add(Exp::Bool(true));
        assert!(g.is_true());
        assert_eq!(g.as_expr(), Exp::Bool(true));
    }

    #[test]
    fn test_add_dedups() {
        let mut g = Guard::new();
        g.add(atom(10));
        g.add(atom(10));
        assert_eq!(g.as_expr(), atom(10));
    }

    #[test]
    fn test_contradiction_is_false() {
        let mut g = Guard::new();
        g.add(atom(10));
        g.add(atom(10).bool_not());
        assert!(g.is_false());
    }

    #[test]
    fn test_monotone_along_path() {
        let mut g = Guard::new();
        g.add(atom(10));
        g.add(atom(11));
        let before = g.clone();
        g.add(atom(12));
        // extending never removes old conjuncts
        assert_eq!(&g.atoms[..2], &before.atoms[..]);
    }

    #[test]
    fn test_or_with_true_is_true() {
        let mut g = Guard::new();
        g.add(atom(10));
        g.or_with(&Guard::new());
        assert!(g.is_true());
    }

    #[test]
    fn test_or_with_common_prefix() {
        let mut g = Guard::new();
        g.add(atom(10));
        g.add(atom(11));
        let mut h = Guard::new();
        h.add(atom(10));
        h.add(atom(12));
        g.or_with(&h);
        assert_eq!(g.atoms[0], atom(10));
        assert_eq!(g.atoms[1], Exp::Call(Op::Or, vec![atom(11), atom(12)]));
    }

    #[test]
    fn test_or_with_complement_cancels() {
        let mut g = Guard::new();
        g.add(atom(10));
        let mut h = Guard::new();
        h.add(atom(10).bool_not());
        g.or_with(&h);
        assert!(g.is_true());
    }

    #[test]
    fn test_guard_expr_elides_trivial_implication() {
        let g = Guard::new();
        assert_eq!(g.guard_expr(atom(10)), atom(10));
        let mut g = Guard::new();
        g.add(atom(11));
        assert_eq!(g.guard_expr(atom(10)), Exp::Call(Op::Implies, vec![atom(11), atom(10)]));
    }
}
