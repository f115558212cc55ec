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

//! State carried during symbolic execution: per-thread states with
//! their call stacks, the detached goto-states pending a merge, and
//! the execution-wide renaming and pointer-tracking structures.

use std::collections::{HashMap, HashSet};

use crate::guard::Guard;
use crate::ir::{Exp, InstrId, Name, Ty, INVALID_OBJECT, NULL_OBJECT};
use crate::renaming::{L1Name, Level1, Level2, SsaAllocator, SsaName};
use crate::trace::Trace;
use crate::value_set::{ObjectId, ValueSet};

/// A program counter: a function and an index into its body.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pc {
    pub function: Name,
    pub index: usize,
}

/// A detached snapshot of the path state, filed at a jump target and
/// merged back in with a phi when execution reaches that target.
/// Immutable once filed.
#[derive(Clone, Debug)]
pub struct GotoState {
    pub depth: usize,
    pub level2: Level2,
    pub value_set: ValueSet,
    pub guard: Guard,
    pub thread: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Normal,
    /// A call made on behalf of function-pointer expansion; its exit
    /// state is filed at the join point instead of resuming the caller.
    FpCandidate,
}

/// Bookkeeping for expanding a call through a function pointer: the
/// candidate callees still to run, the snapshot to restore between
/// candidates, and the join point their exit states are filed at.
#[derive(Clone, Debug)]
pub struct FpExpansion {
    pub candidates: Vec<Name>,
    pub next: usize,
    pub join_index: usize,
    pub lhs: Option<Exp<Name>>,
    pub args: Vec<Exp<Name>>,
    pub pointer: Exp<SsaName>,
    pub saved: GotoState,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub function: Name,
    pub kind: FrameKind,
    pub level1: Level1,
    /// The caller-side lvalue the return value is assigned to.
    pub return_lhs: Option<Exp<Name>>,
    /// Where to resume in the caller; `None` on the entry frame.
    pub return_pc: Option<Pc>,
    /// Index of this function's `EndFunction` instruction.
    pub end_index: usize,
    /// L1 names introduced as locals, reset on frame exit.
    pub locals: HashSet<L1Name>,
    /// Merge points: detached states keyed by target instruction id,
    /// drained when execution reaches the target.
    pub goto_states: HashMap<InstrId, Vec<GotoState>, ahash::RandomState>,
    /// L0 names already declared on this path, to freshen L1 on
    /// re-entry of a declaration.
    pub declaration_history: HashSet<Name>,
    pub catch_stack: Vec<HashMap<Name, usize>>,
    pub throw_decls: HashSet<Name>,
    pub has_throw_decl: bool,
    pub fp_expansion: Option<FpExpansion>,
}

impl Frame {
    pub fn new(function: Name, thread: u32, activation: u32, end_index: usize) -> Self {
        Frame {
            function,
            kind: FrameKind::Normal,
            level1: Level1::new(thread, activation),
            return_lhs: None,
            return_pc: None,
            end_index,
            locals: HashSet::new(),
            goto_states: HashMap::default(),
            declaration_history: HashSet::new(),
            catch_stack: Vec::new(),
            throw_decls: HashSet::new(),
            has_throw_decl: false,
            fp_expansion: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ThreadState {
    pub id: u32,
    pub pc: Option<Pc>,
    pub depth: usize,
    pub guard: Guard,
    /// Invocation count per function, the L1 activation discriminator.
    pub function_frame: HashMap<Name, u32, ahash::RandomState>,
    /// Traversal count per backward edge, keyed on instruction id.
    pub unwind_map: HashMap<InstrId, u32, ahash::RandomState>,
    /// Recursion depth per function.
    pub function_unwind: HashMap<Name, u32, ahash::RandomState>,
    pub call_stack: Vec<Frame>,
    pub ended: bool,
}

impl ThreadState {
    pub fn new(id: u32) -> Self {
        ThreadState {
            id,
            pc: None,
            depth: 0,
            guard: Guard::new(),
            function_frame: HashMap::default(),
            unwind_map: HashMap::default(),
            function_unwind: HashMap::default(),
            call_stack: Vec::new(),
            ended: false,
        }
    }

    pub fn top(&self) -> &Frame {
        self.call_stack.last().expect("empty call stack")
    }

    pub fn top_mut(&mut self) -> &mut Frame {
        self.call_stack.last_mut().expect("empty call stack")
    }

    pub fn runnable(&self) -> bool {
        !self.ended && self.pc.is_some()
    }

    /// Bump the invocation counter for `function` and return this
    /// activation's discriminator.
    pub fn next_activation(&mut self, function: Name) -> u32 {
        let counter = self.function_frame.entry(function).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Maps abstract pointer targets to the object numbers used in the
/// packed `object:offset` pointer encoding. NULL and INVALID have
/// fixed numbers.
#[derive(Clone, Debug)]
pub struct ObjectRegistry {
    ids: HashMap<ObjectId, u32, ahash::RandomState>,
    rev: Vec<ObjectId>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        let mut registry = ObjectRegistry { ids: HashMap::default(), rev: Vec::new() };
        let null = registry.number(ObjectId::Null);
        let invalid = registry.number(ObjectId::Invalid);
        debug_assert_eq!(null, NULL_OBJECT);
        debug_assert_eq!(invalid, INVALID_OBJECT);
        registry
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        ObjectRegistry::default()
    }

    pub fn number(&mut self, object: ObjectId) -> u32 {
        if let Some(n) = self.ids.get(&object) {
            return *n;
        }
        let n = self.rev.len() as u32;
        self.rev.push(object);
        self.ids.insert(object, n);
        n
    }

    pub fn object(&self, number: u32) -> Option<ObjectId> {
        self.rev.get(number as usize).copied()
    }
}

/// The whole execution state of one schedule: every subject thread,
/// the shared renaming and pointer state, and the equation trace being
/// produced. Cloned when the scheduler forks an interleaving.
#[derive(Clone, Debug)]
pub struct ExecutionState {
    pub threads: Vec<ThreadState>,
    pub active: usize,
    /// Nesting depth of atomic sections; interleaving is inhibited
    /// while non-zero.
    pub atomic: u32,
    pub switches: u32,
    pub level2: Level2,
    pub alloc: SsaAllocator,
    pub value_set: ValueSet,
    pub trace: Trace,
    pub objects: ObjectRegistry,
    /// Declared type of every L1 name seen so far.
    pub types: HashMap<L1Name, Ty, ahash::RandomState>,
    pub nondet_count: u32,
    pub dynamic_count: u32,
    pub exhausted: bool,
}

impl ExecutionState {
    pub fn new() -> Self {
        ExecutionState {
            threads: Vec::new(),
            active: 0,
            atomic: 0,
            switches: 0,
            level2: Level2::new(),
            alloc: SsaAllocator::new(),
            value_set: ValueSet::new(),
            trace: Trace::new(),
            objects: ObjectRegistry::new(),
            types: HashMap::default(),
            nondet_count: 0,
            dynamic_count: 0,
            exhausted: false,
        }
    }

    pub fn active_thread(&self) -> &ThreadState {
        &self.threads[self.active]
    }

    pub fn active_thread_mut(&mut self) -> &mut ThreadState {
        let active = self.active;
        &mut self.threads[active]
    }

    pub fn next_runnable(&self) -> Option<usize> {
        let n = self.threads.len();
        (0..n).map(|i| (self.active + i) % n).find(|i| self.threads[*i].runnable())
    }

    pub fn runnable_count(&self) -> usize {
        self.threads.iter().filter(|t| t.runnable()).count()
    }

    pub fn fresh_nondet(&mut self) -> u32 {
        let n = self.nondet_count;
        self.nondet_count += 1;
        n
    }

    pub fn fresh_dynamic(&mut self) -> u32 {
        let n = self.dynamic_count;
        self.dynamic_count += 1;
        n
    }

    /// Snapshot the sharable path state of the active thread.
    pub fn snapshot(&self) -> GotoState {
        GotoState {
            depth: self.active_thread().depth,
            level2: self.level2.clone(),
            value_set: self.value_set.clone(),
            guard: self.active_thread().guard.clone(),
            thread: self.active_thread().id,
        }
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        ExecutionState::new()
    }
}
