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

//! The pointer value-set tracker. For every L1 pointer variable this
//! over-approximates the set of abstract targets the pointer may
//! address: named objects with a byte offset, the NULL object, an
//! invalid marker, numbered heap allocations, or function symbols.
//! Joins are pointwise set union.

use std::collections::{BTreeSet, HashMap};

use crate::guard::Guard;
use crate::ir::Name;
use crate::renaming::L1Name;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Null,
    Invalid,
    Named(L1Name),
    Dynamic(u32),
    Function(Name),
}

impl ObjectId {
    pub fn is_valid(self) -> bool {
        !matches!(self, ObjectId::Null | ObjectId::Invalid)
    }
}

/// Offsets are tracked concretely where possible; any arithmetic with a
/// symbolic operand collapses to `Unknown`, which widens bound checks
/// at dereference time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Offset {
    Concrete(i64),
    Unknown,
}

impl Offset {
    pub fn add(self, delta: Offset) -> Offset {
        match (self, delta) {
            (Offset::Concrete(a), Offset::Concrete(b)) => Offset::Concrete(a.wrapping_add(b)),
            _ => Offset::Unknown,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub object: ObjectId,
    pub offset: Offset,
}

impl Target {
    pub fn new(object: ObjectId, offset: i64) -> Self {
        Target { object, offset: Offset::Concrete(offset) }
    }

    pub fn null() -> Self {
        Target { object: ObjectId::Null, offset: Offset::Concrete(0) }
    }

    pub fn invalid() -> Self {
        Target { object: ObjectId::Invalid, offset: Offset::Concrete(0) }
    }
}

pub type Targets = BTreeSet<Target>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueSet {
    map: HashMap<L1Name, Targets, ahash::RandomState>,
}

impl ValueSet {
    pub fn new() -> Self {
        ValueSet::default()
    }

    pub fn assign(&mut self, lhs: L1Name, targets: Targets) {
        self.map.insert(lhs, targets);
    }

    pub fn read(&self, lhs: L1Name) -> Option<&Targets> {
        self.map.get(&lhs)
    }

    /// Pointwise union with `other`, used at merge points.
    pub fn join(&mut self, other: &ValueSet) {
        for (l1, targets) in &other.map {
            self.map.entry(*l1).or_default().extend(targets.iter().copied());
        }
    }

    /// Scope this value set by the guard of the path it was recorded
    /// on, used at merge points before the union. A set of targets
    /// cannot condition individual entries on a symbolic guard, so the
    /// only refinement available is dropping the facts of an
    /// unreachable path; under any satisfiable guard every target is
    /// kept as an over-approximation.
    pub fn apply_guard(&mut self, g: &Guard) {
        if g.is_false() {
            self.map.clear();
        }
    }

    /// Shift every target of `lhs` by a byte offset (pointer
    /// arithmetic).
    pub fn add_offset(&mut self, lhs: L1Name, delta: Offset) {
        if let Some(targets) = self.map.get_mut(&lhs) {
            let shifted: Targets =
                targets.iter().map(|t| Target { object: t.object, offset: t.offset.add(delta) }).collect();
            *targets = shifted;
        }
    }

    /// Mark a heap object as freed: every pointer whose target set
    /// mentions it now also admits the invalid marker.
    pub fn invalidate(&mut self, object: ObjectId) {
        for targets in self.map.values_mut() {
            if targets.iter().any(|t| t.object == object) {
                targets.retain(|t| t.object != object);
                targets.insert(Target::invalid());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Name;

    fn l1(n: u32) -> L1Name {
        L1Name::global(Name::from_u32(n))
    }

    fn singleton(object: ObjectId) -> Targets {
        let mut set = Targets::new();
        set.insert(Target::new(object, 0));
        set
    }

    #[test]
    fn test_assign_read() {
        let mut vs = ValueSet::new();
        let p = l1(10);
        vs.assign(p, singleton(ObjectId::Named(l1(11))));
        assert_eq!(vs.read(p), Some(&singleton(ObjectId::Named(l1(11)))));
        assert_eq!(vs.read(l1(12)), None);
    }

    #[test]
    fn test_join_laws() {
        let p = l1(10);
        let a = {
            let mut vs = ValueSet::new();
            vs.assign(p, singleton(ObjectId::Null));
            vs
        };
        let b = {
            let mut vs = ValueSet::new();
            vs.assign(p, singleton(ObjectId::Dynamic(0)));
            vs
        };
        let c = {
            let mut vs = ValueSet::new();
            vs.assign(p, singleton(ObjectId::Invalid));
            vs
        };

        // commutative
        let mut ab = a.clone();
        ab.join(&b);
        let mut ba = b.clone();
        ba.join(&a);
        assert_eq!(ab, ba);

        // associative
        let mut ab_c = ab.clone();
        ab_c.join(&c);
        let mut bc = b.clone();
        bc.join(&c);
        let mut a_bc = a.clone();
        a_bc.join(&bc);
        assert_eq!(ab_c, a_bc);

        // idempotent
        let mut aa = a.clone();
        aa.join(&a);
        assert_eq!(aa, a);
    }

    #[test]
    fn test_offset_arithmetic() {
        let mut vs = ValueSet::new();
        let p = l1(10);
        vs.assign(p, singleton(ObjectId::Dynamic(3)));
        vs.add_offset(p, Offset::Concrete(8));
        assert_eq!(vs.read(p).unwrap().iter().next().unwrap().offset, Offset::Concrete(8));
        vs.add_offset(p, Offset::Unknown);
        assert_eq!(vs.read(p).unwrap().iter().next().unwrap().offset, Offset::Unknown);
    }

    #[test]
    fn test_apply_guard() {
        let mut vs = ValueSet::new();
        let p = l1(10);
        vs.assign(p, singleton(ObjectId::Dynamic(0)));

        // any satisfiable guard keeps the over-approximation intact
        let mut live = vs.clone();
        live.apply_guard(&Guard::new());
        assert_eq!(live, vs);

        // an unreachable path contributes no pointer facts
        let mut unreachable = Guard::new();
        unreachable.make_false();
        let mut dead = vs.clone();
        dead.apply_guard(&unreachable);
        assert_eq!(dead.read(p), None);
        assert_eq!(dead, ValueSet::new());
    }

    #[test]
    fn test_invalidate() {
        let mut vs = ValueSet::new();
        let p = l1(10);
        vs.assign(p, singleton(ObjectId::Dynamic(0)));
        vs.invalidate(ObjectId::Dynamic(0));
        assert_eq!(vs.read(p), Some(&{
            let mut set = Targets::new();
            set.insert(Target::invalid());
            set
        }));
    }
}
