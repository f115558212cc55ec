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

//! The three-level identifier versioning scheme. A source identifier
//! (L0, a plain [Name]) is first given an activation-record version
//! (L1) distinguishing recursive and concurrent invocations of the
//! same function, and then an SSA version (L2) incremented on every
//! assignment. The printed form is `L0?L1!L2`.
//!
//! L2 version numbers are drawn from an [SsaAllocator] owned by the
//! execution state: the allocator is monotone for the lifetime of a
//! trace and is never rewound, while the [Level2] map of *current*
//! versions is cloned into goto-state snapshots and restored freely.
//! This keeps every allocated SSA name unique within a trace no matter
//! how often the current state is rolled back.

use std::collections::HashMap;
use std::fmt;

use crate::ir::{Exp, Name, Symtab};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct L1Name {
    pub name: Name,
    pub thread: u32,
    pub activation: u32,
    pub inst: u32,
}

impl L1Name {
    /// The L1 name of a global: globals belong to no activation record.
    pub fn global(name: Name) -> Self {
        L1Name { name, thread: 0, activation: 0, inst: 0 }
    }

    pub fn to_string(self, symtab: &Symtab) -> String {
        format!("{}?{}.{}.{}", symtab.to_str(self.name), self.thread, self.activation, self.inst)
    }
}

impl fmt::Display for L1Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}.{}.{}", self.name.to_u32(), self.thread, self.activation, self.inst)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SsaName {
    pub l1: L1Name,
    pub version: u32,
}

impl SsaName {
    pub fn to_string(self, symtab: &Symtab) -> String {
        format!("{}!{}", self.l1.to_string(symtab), self.version)
    }
}

impl fmt::Display for SsaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.l1, self.version)
    }
}

/// The L1 renaming context of one stack frame.
#[derive(Clone, Debug)]
pub struct Level1 {
    pub thread: u32,
    pub activation: u32,
    inst_counters: HashMap<Name, u32, ahash::RandomState>,
    bindings: HashMap<Name, L1Name, ahash::RandomState>,
}

impl Level1 {
    pub fn new(thread: u32, activation: u32) -> Self {
        Level1 { thread, activation, inst_counters: HashMap::default(), bindings: HashMap::default() }
    }

    /// Bind a fresh L1 name for `name`. Re-activating the same name
    /// (loop body re-entry of a declaration) yields a new instantiation
    /// so names captured by pending goto-states stay distinct.
    pub fn activate(&mut self, name: Name) -> L1Name {
        let inst = self.inst_counters.entry(name).or_insert(0);
        let l1 = L1Name { name, thread: self.thread, activation: self.activation, inst: *inst };
        *inst += 1;
        self.bindings.insert(name, l1);
        l1
    }

    /// The current binding, or the global L1 name for identifiers this
    /// frame never declared.
    pub fn rename(&self, name: Name) -> L1Name {
        match self.bindings.get(&name) {
            Some(l1) => *l1,
            None => L1Name::global(name),
        }
    }

    pub fn is_bound(&self, name: Name) -> bool {
        self.bindings.contains_key(&name)
    }

    pub fn unbind(&mut self, name: Name) {
        self.bindings.remove(&name);
    }
}

/// Allocator for L2 version numbers, monotone per trace.
#[derive(Clone, Debug, Default)]
pub struct SsaAllocator {
    counters: HashMap<L1Name, u32, ahash::RandomState>,
}

impl SsaAllocator {
    pub fn new() -> Self {
        SsaAllocator::default()
    }

    fn fresh(&mut self, l1: L1Name) -> u32 {
        let counter = self.counters.entry(l1).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Map from L1 names to their current L2 version, plus the constant
/// bindings used for propagation. Cloned wholesale into goto-state
/// snapshots.
#[derive(Clone, Debug, Default)]
pub struct Level2 {
    current: HashMap<L1Name, u32, ahash::RandomState>,
    constants: HashMap<L1Name, Exp<SsaName>, ahash::RandomState>,
}

impl Level2 {
    pub fn new() -> Self {
        Level2::default()
    }

    /// The current version of `l1`. Version 0 is the "initial" version
    /// of a variable that has never been assigned.
    pub fn read(&self, l1: L1Name) -> SsaName {
        SsaName { l1, version: self.current.get(&l1).copied().unwrap_or(0) }
    }

    pub fn version(&self, l1: L1Name) -> u32 {
        self.current.get(&l1).copied().unwrap_or(0)
    }

    pub fn assign(&mut self, alloc: &mut SsaAllocator, l1: L1Name) -> SsaName {
        let version = alloc.fresh(l1);
        self.current.insert(l1, version);
        SsaName { l1, version }
    }

    pub fn constant(&self, l1: L1Name) -> Option<&Exp<SsaName>> {
        self.constants.get(&l1)
    }

    pub fn record_constant(&mut self, l1: L1Name, exp: Exp<SsaName>) {
        self.constants.insert(l1, exp);
    }

    pub fn kill_constant(&mut self, l1: L1Name) {
        self.constants.remove(&l1);
    }

    /// All L1 names with a non-initial version, for phi comparison at
    /// merge points.
    pub fn assigned(&self) -> impl Iterator<Item = (&L1Name, &u32)> {
        self.current.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Signedness;
    use crate::bitvector::B64;

    fn name(n: u32) -> Name {
        Name::from_u32(n)
    }

    #[test]
    fn test_activation_freshness() {
        let mut l1 = Level1::new(0, 1);
        let x = name(10);
        let first = l1.activate(x);
        let second = l1.activate(x);
        assert_ne!(first, second);
        assert_eq!(l1.rename(x), second);
        l1.unbind(x);
        assert_eq!(l1.rename(x), L1Name::global(x));
    }

    #[test]
    fn test_renaming_deterministic() {
        let x = L1Name::global(name(10));
        let mut alloc = SsaAllocator::new();
        let mut l2 = Level2::new();
        assert_eq!(l2.read(x).version, 0);
        assert_eq!(l2.read(x), l2.read(x));
        let v1 = l2.assign(&mut alloc, x);
        assert_eq!(v1.version, 1);
        assert_eq!(l2.read(x), v1);
    }

    #[test]
    fn test_clone_isolation() {
        let x = L1Name::global(name(10));
        let mut alloc = SsaAllocator::new();
        let mut l2 = Level2::new();
        l2.assign(&mut alloc, x);
        let snapshot = l2.clone();
        l2.assign(&mut alloc, x);
        assert_eq!(snapshot.read(x).version, 1);
        assert_eq!(l2.read(x).version, 2);
    }

    #[test]
    fn test_allocator_survives_restore() {
        let x = L1Name::global(name(10));
        let mut alloc = SsaAllocator::new();
        let mut l2 = Level2::new();
        let snapshot = l2.clone();
        let v1 = l2.assign(&mut alloc, x);
        // roll the current state back, as function-pointer expansion does
        l2 = snapshot;
        let v2 = l2.assign(&mut alloc, x);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_constants() {
        let x = L1Name::global(name(10));
        let mut l2 = Level2::new();
        let exp = Exp::Bits(B64::new(7, 32), Signedness::Signed);
        l2.record_constant(x, exp.clone());
        assert_eq!(l2.constant(x), Some(&exp));
        l2.kill_constant(x);
        assert_eq!(l2.constant(x), None);
    }
}
