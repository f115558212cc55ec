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

//! The core of the symbolic execution engine: a whole-program
//! interpreter over the GOTO IR that flattens every explored path into
//! an SSA equation trace. Control-flow joins become phi assignments
//! over detached goto-states, loops and recursion are bounded by the
//! configured unwind limits, function pointers are expanded into their
//! candidate callees, and subject-program concurrency is explored by
//! cloning the execution state at visible actions.

use std::collections::HashSet;

use crate::config::CheckConfig;
use crate::error::ExecError;
use crate::ir::{
    collect_instr_ids, Exp, Function, Instr, InstrKind, Name, Op, Program, Signedness, Symtab,
    Ty, TypeNamespace, ALLOC, FREE, RETURN, THROWN,
};
use crate::bitvector::B64;
use crate::log;
use crate::renaming::{L1Name, SsaName};
use crate::source_loc::SourceLoc;
use crate::trace::Trace;
use crate::value_set::{ObjectId, Offset, Target, Targets};

pub mod state;

use state::{ExecutionState, Frame, FrameKind, FpExpansion, GotoState, Pc, ThreadState};

/// Constant bindings larger than this are not propagated.
const CONST_PROP_MAX_SIZE: usize = 8;

/// The outcome of symbolically executing one schedule: the equation
/// trace, plus whether a resource bound closed some path early.
#[derive(Debug)]
pub struct PathResult {
    pub trace: Trace,
    pub exhausted: bool,
}

pub struct Executor<'p> {
    program: &'p Program,
    symtab: &'p Symtab,
    ns: &'p TypeNamespace,
    cfg: &'p CheckConfig,
}

impl<'p> Executor<'p> {
    pub fn new(
        program: &'p Program,
        symtab: &'p Symtab,
        ns: &'p TypeNamespace,
        cfg: &'p CheckConfig,
    ) -> Self {
        Executor { program, symtab, ns, cfg }
    }

    /// Symbolically execute the program from its entry function,
    /// exploring every schedule admitted by the context-switch bound.
    /// Each schedule produces its own equation trace.
    pub fn run(&self) -> Result<Vec<PathResult>, ExecError> {
        let entry = self.program.entry;
        let entry_fn = self
            .program
            .function(entry)
            .ok_or_else(|| ExecError::NoEntry(self.symtab.to_str(entry).to_string()))?;

        let mut init = ExecutionState::new();
        for (global, ty) in &self.program.globals {
            init.types.insert(L1Name::global(*global), ty.clone());
        }

        let mut thread = ThreadState::new(0);
        let activation = thread.next_activation(entry);
        let frame = Frame::new(entry, 0, activation, entry_fn.end_index());
        thread.call_stack.push(frame);
        thread.pc = Some(Pc { function: entry, index: 0 });
        init.threads.push(thread);

        self.init_globals(&mut init);
        self.bind_formals_nondet(&mut init, entry)?;

        let mut worklist = vec![init];
        let mut results = Vec::new();
        while let Some(mut st) = worklist.pop() {
            loop {
                if !st.active_thread().runnable() {
                    match st.next_runnable() {
                        Some(next) => st.active = next,
                        None => break,
                    }
                }
                self.maybe_interleave(&mut st, &mut worklist);
                self.step(&mut st)?;
            }
            debug_assert!(st.trace.check_ssa());
            results.push(PathResult { trace: st.trace, exhausted: st.exhausted });
        }
        Ok(results)
    }

    /// Zero-initialize scalar globals, as the C runtime does. Composite
    /// globals stay unconstrained.
    fn init_globals(&self, st: &mut ExecutionState) {
        let mut globals = self.program.globals.clone();
        globals.sort_by_key(|(name, _)| *name);
        for (global, ty) in globals {
            let l1 = L1Name::global(global);
            let init = match self.ns.resolve(&ty) {
                Ty::Bool => Exp::Bool(false),
                Ty::Signed(w) if *w <= 64 => Exp::Bits(B64::zeros(*w), Signedness::Signed),
                Ty::Unsigned(w) if *w <= 64 => Exp::Bits(B64::zeros(*w), Signedness::Unsigned),
                Ty::Float(fp) if fp.packed_width() <= 64 => {
                    Exp::FloatBits(B64::zeros(fp.packed_width()), *fp)
                }
                Ty::Pointer(_) => Exp::null(),
                _ => continue,
            };
            if ty.is_pointer() {
                let mut targets = Targets::new();
                targets.insert(Target::null());
                st.value_set.assign(l1, targets);
            }
            let fresh = st.level2.assign(&mut st.alloc, l1);
            let guard = st.active_thread().guard.clone();
            st.trace.assignment(guard, fresh, init.clone(), ty.clone());
            st.level2.record_constant(l1, init);
        }
    }

    /// Entry and thread functions get their formals bound to fresh
    /// nondeterministic symbols.
    fn bind_formals_nondet(&self, st: &mut ExecutionState, f: Name) -> Result<(), ExecError> {
        let function = self.program.function(f).unwrap();
        let params = function.params.clone();
        for (param, ty) in params {
            let l1 = st.active_thread_mut().top_mut().level1.activate(param);
            st.active_thread_mut().top_mut().locals.insert(l1);
            st.active_thread_mut().top_mut().declaration_history.insert(param);
            st.types.insert(l1, ty.clone());
            let n = st.fresh_nondet();
            let fresh = st.level2.assign(&mut st.alloc, l1);
            let guard = st.active_thread().guard.clone();
            st.trace.assignment(guard, fresh, Exp::Nondet(ty.clone(), n), ty);
        }
        Ok(())
    }

    fn function_of(&self, pc: Pc) -> &Function {
        self.program.function(pc.function).expect("pc in unknown function")
    }

    /// Fork the scheduler at a visible action: every other runnable
    /// thread gets a clone of the whole execution state with itself
    /// as the active thread.
    fn maybe_interleave(&self, st: &mut ExecutionState, worklist: &mut Vec<ExecutionState>) {
        if st.atomic > 0 || st.switches >= self.cfg.context_bound || st.runnable_count() < 2 {
            return;
        }
        let pc = match st.active_thread().pc {
            Some(pc) => pc,
            None => return,
        };
        let instr = &self.function_of(pc).body[pc.index];
        if !self.is_visible(instr) {
            return;
        }
        for (i, thread) in st.threads.iter().enumerate() {
            if i != st.active && thread.runnable() {
                let mut clone = st.clone();
                clone.active = i;
                clone.switches += 1;
                log!(log::SCHEDULE, &format!("context switch to thread {}", i));
                worklist.push(clone);
            }
        }
    }

    /// A visible action is one the scheduler may interleave at: an
    /// access to a shared variable, an atomic boundary, or a thread
    /// lifecycle event.
    fn is_visible(&self, instr: &Instr) -> bool {
        use InstrKind::*;
        match &instr.kind {
            AtomicBegin | AtomicEnd | StartThread(_) | EndThread => true,
            Skip | EndFunction | Decl(..) | Dead(_) => false,
            kind => {
                let mut ids = HashSet::new();
                collect_instr_ids(kind, &mut ids);
                ids.iter().any(|name| self.program.is_global(*name))
            }
        }
    }

    fn advance(&self, st: &mut ExecutionState) {
        let thread = st.active_thread_mut();
        if let Some(pc) = thread.pc.as_mut() {
            pc.index += 1;
        }
    }

    fn jump(&self, st: &mut ExecutionState, index: usize) {
        let thread = st.active_thread_mut();
        if let Some(pc) = thread.pc.as_mut() {
            pc.index = index;
        }
    }

    /// Execute the instruction at the active thread's program counter.
    fn step(&self, st: &mut ExecutionState) -> Result<(), ExecError> {
        let pc = st.active_thread().pc.expect("step on stopped thread");
        let function = self.function_of(pc);
        let instr = &function.body[pc.index];
        let loc = instr.loc;

        let depth = {
            let thread = st.active_thread_mut();
            thread.depth += 1;
            thread.depth
        };
        if let Some(max) = self.cfg.max_depth {
            if depth > max {
                let guard = st.active_thread().guard.clone();
                st.trace.assumption(guard, Exp::Bool(false));
                st.exhausted = true;
                let thread = st.active_thread_mut();
                thread.ended = true;
                thread.pc = None;
                return Ok(());
            }
        }

        // drain any states waiting to merge at this instruction
        self.merge_goto_states(st, instr);

        log_from!(st.active, log::SYMEX, &format!("{:?}", instr.kind));

        match &instr.kind {
            InstrKind::Skip => self.advance(st),

            InstrKind::Catch(handlers) => {
                let frame = st.active_thread_mut().top_mut();
                if handlers.is_empty() {
                    frame.catch_stack.pop();
                } else {
                    frame.catch_stack.push(handlers.iter().copied().collect());
                }
                self.advance(st)
            }

            InstrKind::ThrowDecl(tags) => {
                let frame = st.active_thread_mut().top_mut();
                frame.throw_decls = tags.iter().copied().collect();
                frame.has_throw_decl = true;
                self.advance(st)
            }

            InstrKind::Decl(name, ty) => {
                self.exec_decl(st, *name, ty.clone())?;
                self.advance(st)
            }

            InstrKind::Dead(name) => {
                let l1 = st.active_thread().top().level1.rename(*name);
                st.level2.kill_constant(l1);
                st.active_thread_mut().top_mut().level1.unbind(*name);
                self.advance(st)
            }

            InstrKind::Assign(lhs, rhs) => {
                self.exec_assign(st, lhs, rhs, loc)?;
                self.advance(st)
            }

            InstrKind::Assume(cond) => {
                let cond = self.rename_rhs(st, cond, loc)?.simplify();
                let guard = st.active_thread().guard.clone();
                st.trace.assumption(guard, cond.clone());
                st.active_thread_mut().guard.add(cond);
                self.advance(st)
            }

            InstrKind::Assert(cond, msg) => {
                let cond = self.rename_rhs(st, cond, loc)?.simplify();
                let guard = st.active_thread().guard.clone();
                st.trace.assertion(guard, cond, msg, loc);
                self.advance(st)
            }

            InstrKind::Goto { target, cond } => self.exec_goto(st, instr, *target, cond, loc)?,

            InstrKind::FunctionCall { lhs, function: callee, args } => {
                self.exec_call(st, pc, lhs, callee, args, loc)?
            }

            InstrKind::Return(value) => {
                if let Some(value) = value {
                    let ret_ty = self.function_of(pc).ret_ty.clone();
                    let frame = st.active_thread_mut().top_mut();
                    if !frame.level1.is_bound(RETURN) {
                        frame.level1.activate(RETURN);
                    }
                    let ret = Exp::Id(RETURN);
                    self.assign_scalar(st, &ret, value, ret_ty, loc)?;
                }
                // suspend this path at the end of the function and
                // sweep on, like a taken forward jump
                let end = st.active_thread().top().end_index;
                let end_id = self.function_of(pc).body[end].id;
                let snapshot = st.snapshot();
                st.active_thread_mut()
                    .top_mut()
                    .goto_states
                    .entry(end_id)
                    .or_default()
                    .push(snapshot);
                st.active_thread_mut().guard.make_false();
                self.advance(st)
            }

            InstrKind::EndFunction => self.exec_end_function(st, loc)?,

            InstrKind::Throw(tag, value) => self.exec_throw(st, *tag, value, loc)?,

            InstrKind::AtomicBegin => {
                st.atomic += 1;
                self.advance(st)
            }

            InstrKind::AtomicEnd => {
                st.atomic = st.atomic.saturating_sub(1);
                self.advance(st)
            }

            InstrKind::StartThread(f) => {
                self.exec_start_thread(st, *f)?;
                self.advance(st)
            }

            InstrKind::EndThread => {
                let thread = st.active_thread_mut();
                thread.ended = true;
                thread.pc = None;
            }

            InstrKind::Output(args) => {
                let mut renamed = Vec::new();
                for arg in args {
                    renamed.push(self.rename_rhs(st, arg, loc)?.simplify());
                }
                let guard = st.active_thread().guard.clone();
                st.trace.output(guard, renamed);
                self.advance(st)
            }
        }
        Ok(())
    }

    fn exec_decl(&self, st: &mut ExecutionState, name: Name, ty: Ty) -> Result<(), ExecError> {
        // Any re-execution of a declaration already seen on this path
        // gets a fresh L1, so pending goto-states keep the previous
        // iteration's instance intact.
        let l1 = {
            let frame = st.active_thread_mut().top_mut();
            frame.declaration_history.insert(name);
            let l1 = frame.level1.activate(name);
            frame.locals.insert(l1);
            l1
        };
        st.types.insert(l1, ty.clone());
        let n = st.fresh_nondet();
        let fresh = st.level2.assign(&mut st.alloc, l1);
        let guard = st.active_thread().guard.clone();
        st.trace.assignment(guard, fresh, Exp::Nondet(ty.clone(), n), ty.clone());
        st.level2.kill_constant(l1);
        if ty.is_pointer() {
            let mut targets = Targets::new();
            targets.insert(Target::invalid());
            st.value_set.assign(l1, targets);
        }
        Ok(())
    }

    fn exec_goto(
        &self,
        st: &mut ExecutionState,
        instr: &Instr,
        target: usize,
        cond: &Option<Exp<Name>>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let pc = st.active_thread().pc.unwrap();
        let backward = target <= pc.index;
        let cond = match cond {
            None => Exp::Bool(true),
            Some(cond) => self.rename_rhs(st, cond, loc)?.simplify(),
        };

        if backward {
            let count = {
                let thread = st.active_thread_mut();
                let count = thread.unwind_map.entry(instr.id).or_insert(0);
                *count += 1;
                *count
            };
            if let Some(bound) = self.cfg.unwind_bound(instr.id) {
                if count > bound {
                    log!(log::UNWIND, &format!("unwind bound {} exhausted at {}", bound, instr.id));
                    let msg = format!("unwinding assertion loop {}", instr.id);
                    self.close_exhausted_path(st, &cond, &msg, loc);
                    self.advance(st);
                    return Ok(());
                }
            }
        }

        match cond {
            Exp::Bool(false) => self.advance(st),
            Exp::Bool(true) if backward => self.jump(st, target),
            cond if backward => {
                // keep unrolling under the loop condition; the exit
                // state waits at the fall-through instruction
                let mut exit_guard = st.active_thread().guard.clone();
                exit_guard.add(cond.clone().bool_not());
                let mut snapshot = st.snapshot();
                snapshot.guard = exit_guard;
                let next_id = self.function_of(pc).body[pc.index + 1].id;
                st.active_thread_mut()
                    .top_mut()
                    .goto_states
                    .entry(next_id)
                    .or_default()
                    .push(snapshot);
                st.active_thread_mut().guard.add(cond);
                self.jump(st, target)
            }
            cond => {
                // forward jumps suspend the jumping path at the target
                // and sweep on linearly, so intermediate merge points
                // are still visited
                let mut jump_guard = st.active_thread().guard.clone();
                let taken = matches!(cond, Exp::Bool(true));
                if !taken {
                    jump_guard.add(cond.clone());
                }
                let mut snapshot = st.snapshot();
                snapshot.guard = jump_guard;
                let target_id = self.function_of(pc).body[target].id;
                st.active_thread_mut()
                    .top_mut()
                    .goto_states
                    .entry(target_id)
                    .or_default()
                    .push(snapshot);
                if taken {
                    st.active_thread_mut().guard.make_false();
                } else {
                    st.active_thread_mut().guard.add(cond.bool_not());
                }
                self.advance(st)
            }
        }
        Ok(())
    }

    /// Close the residual iterations of an exhausted loop or recursion:
    /// an `assert(false)` if unwinding assertions are enabled, then an
    /// `assume(false)`, both under the guard that would have continued.
    fn close_exhausted_path(
        &self,
        st: &mut ExecutionState,
        cond: &Exp<SsaName>,
        msg: &str,
        loc: SourceLoc,
    ) {
        let mut continuing = st.active_thread().guard.clone();
        continuing.add(cond.clone());
        if !continuing.is_false() {
            if self.cfg.unwinding_assertions {
                st.trace.assertion(continuing.clone(), Exp::Bool(false), msg, loc);
            }
            st.trace.assumption(continuing, Exp::Bool(false));
        }
        st.active_thread_mut().guard.add(cond.clone().bool_not());
    }

    /// Drain the current frame's pending goto-states for this
    /// instruction and phi-merge each one.
    fn merge_goto_states(&self, st: &mut ExecutionState, instr: &Instr) {
        let pending = st.active_thread_mut().top_mut().goto_states.remove(&instr.id);
        if let Some(pending) = pending {
            for snapshot in pending {
                self.phi_merge(st, snapshot);
            }
        }
    }

    fn phi_merge(&self, st: &mut ExecutionState, mut snapshot: GotoState) {
        if snapshot.guard.is_false() {
            return;
        }
        if st.active_thread().guard.is_false() {
            // nothing live to merge with: adopt the snapshot wholesale
            st.level2 = snapshot.level2;
            st.value_set = snapshot.value_set;
            st.active_thread_mut().guard = snapshot.guard;
            return;
        }

        let mut new_guard = st.active_thread().guard.clone();
        new_guard.or_with(&snapshot.guard);

        let mut diff: Vec<L1Name> = Vec::new();
        for (l1, version) in snapshot.level2.assigned() {
            if st.level2.version(*l1) != *version {
                diff.push(*l1);
            }
        }
        for (l1, version) in st.level2.assigned() {
            if snapshot.level2.version(*l1) != *version && !diff.contains(l1) {
                diff.push(*l1);
            }
        }
        diff.sort();

        for l1 in diff {
            let ty = match st.types.get(&l1) {
                Some(ty) => ty.clone(),
                None => continue,
            };
            let current = st.level2.read(l1);
            let snapshotted = snapshot.level2.read(l1);
            let fresh = st.level2.assign(&mut st.alloc, l1);
            st.level2.kill_constant(l1);
            let rhs = Exp::Ite(
                Box::new(snapshot.guard.as_expr()),
                Box::new(Exp::Id(snapshotted)),
                Box::new(Exp::Id(current)),
            )
            .simplify();
            log!(log::PHI, &format!("phi {} = {:?}", fresh, rhs));
            st.trace.phi(new_guard.clone(), fresh, rhs, ty);
        }

        // scope the snapshot's pointer facts by the guard they were
        // recorded under before the union
        snapshot.value_set.apply_guard(&snapshot.guard);
        st.value_set.join(&snapshot.value_set);
        st.active_thread_mut().guard = new_guard;
    }

    /// The L1 renaming of an identifier in the active frame, falling
    /// back to the global namespace.
    fn l1_of(&self, st: &ExecutionState, name: Name) -> L1Name {
        st.active_thread().top().level1.rename(name)
    }

    fn ty_of_l1(&self, st: &ExecutionState, l1: L1Name) -> Result<Ty, ExecError> {
        st.types.get(&l1).cloned().ok_or_else(|| {
            ExecError::Type(
                format!("undeclared identifier {}", l1.to_string(self.symtab)),
                SourceLoc::unknown(),
            )
        })
    }

    /// The static type of an expression.
    fn ty_of(&self, st: &ExecutionState, exp: &Exp<Name>) -> Result<Ty, ExecError> {
        use Exp::*;
        match exp {
            Id(name) => self.ty_of_l1(st, self.l1_of(st, *name)),
            Bool(_) => Ok(Ty::Bool),
            Bits(bv, Signedness::Signed) => Ok(Ty::Signed(bv.len())),
            Bits(bv, Signedness::Unsigned) => Ok(Ty::Unsigned(bv.len())),
            FloatBits(_, fp) => Ok(Ty::Float(*fp)),
            Nondet(ty, _) | Invalid(ty) | Cast(ty, _) => Ok(ty.clone()),
            Pointer { .. } => Ok(Ty::Pointer(Box::new(Ty::Empty))),
            AddrOf(inner) => Ok(Ty::Pointer(Box::new(self.ty_of(st, inner)?))),
            Deref(p) => match self.ns.resolve(&self.ty_of(st, p)?) {
                Ty::Pointer(inner) => Ok((**inner).clone()),
                ty => Err(ExecError::Type(
                    format!("dereference of non-pointer type {:?}", ty),
                    SourceLoc::unknown(),
                )),
            },
            Index(base, _) => match self.ns.resolve(&self.ty_of(st, base)?) {
                Ty::Array(elem, _) => Ok((**elem).clone()),
                ty => Err(ExecError::Type(
                    format!("index into non-array type {:?}", ty),
                    SourceLoc::unknown(),
                )),
            },
            Field(base, field) => match self.ns.resolve(&self.ty_of(st, base)?) {
                Ty::Struct(name) | Ty::Union(name) => {
                    self.ns.field_ty(*name, *field).cloned().ok_or_else(|| {
                        ExecError::Type("unknown struct field".to_string(), SourceLoc::unknown())
                    })
                }
                ty => Err(ExecError::Type(
                    format!("field access on non-struct type {:?}", ty),
                    SourceLoc::unknown(),
                )),
            },
            Ite(_, t, _) | With(t, _, _) => self.ty_of(st, t),
            WithField(base, _, _) => self.ty_of(st, base),
            Call(op, args) => match op {
                Op::Not
                | Op::And
                | Op::Or
                | Op::Implies
                | Op::Eq
                | Op::Neq
                | Op::Lt
                | Op::Le
                | Op::Gt
                | Op::Ge
                | Op::SameObject
                | Op::FpEq
                | Op::FpLt
                | Op::FpLe
                | Op::FpGt
                | Op::FpGe
                | Op::FpIsNan
                | Op::FpIsInf
                | Op::FpIsZero
                | Op::FpIsNormal
                | Op::FpIsDenormal => Ok(Ty::Bool),
                Op::PtrOffset => Ok(Ty::Unsigned(self.ns.pointer_width)),
                _ => self.ty_of(st, &args[0]),
            },
        }
    }

    /// Read the current SSA version of a variable, substituting its
    /// constant binding when one is recorded.
    fn read_var(&self, st: &mut ExecutionState, name: Name) -> Exp<SsaName> {
        let l1 = self.l1_of(st, name);
        if let Some(constant) = st.level2.constant(l1) {
            return constant.clone();
        }
        let ssa = st.level2.read(l1);
        if let Some(ty) = st.types.get(&l1) {
            st.trace.record_type(ssa, ty.clone());
        }
        Exp::Id(ssa)
    }

    /// Rename an rvalue at L1/L2: identifiers get their current SSA
    /// version (or their propagated constant), address-of
    /// subexpressions rename only at L1 into packed pointer values,
    /// and dereferences are expanded against the value set.
    fn rename_rhs(
        &self,
        st: &mut ExecutionState,
        exp: &Exp<Name>,
        loc: SourceLoc,
    ) -> Result<Exp<SsaName>, ExecError> {
        use Exp::*;
        Ok(match exp {
            Id(name) => self.read_var(st, *name),
            Bool(b) => Bool(*b),
            Bits(bv, sg) => Bits(*bv, *sg),
            FloatBits(bv, fp) => FloatBits(*bv, *fp),
            Invalid(ty) => Invalid(ty.clone()),
            Nondet(ty, _) => {
                let n = st.fresh_nondet();
                Nondet(ty.clone(), n)
            }
            Pointer { object, offset } => {
                Pointer { object: *object, offset: Box::new(self.rename_rhs(st, offset, loc)?) }
            }
            AddrOf(inner) => self.address_of(st, inner, loc)?,
            Deref(p) => self.deref_read(st, p, loc)?,
            Index(base, index) => {
                let base_ty = self.ty_of(st, base)?;
                let index_renamed = self.rename_rhs(st, index, loc)?.simplify();
                if let Ty::Array(_, len) = self.ns.resolve(&base_ty) {
                    self.array_bounds_assertion(st, &index_renamed, *len, loc);
                }
                let base = self.rename_rhs(st, base, loc)?;
                Index(Box::new(base), Box::new(index_renamed))
            }
            Field(base, field) => Field(Box::new(self.rename_rhs(st, base, loc)?), *field),
            Ite(c, t, e) => Ite(
                Box::new(self.rename_rhs(st, c, loc)?),
                Box::new(self.rename_rhs(st, t, loc)?),
                Box::new(self.rename_rhs(st, e, loc)?),
            ),
            With(base, index, value) => With(
                Box::new(self.rename_rhs(st, base, loc)?),
                Box::new(self.rename_rhs(st, index, loc)?),
                Box::new(self.rename_rhs(st, value, loc)?),
            ),
            WithField(base, field, value) => WithField(
                Box::new(self.rename_rhs(st, base, loc)?),
                *field,
                Box::new(self.rename_rhs(st, value, loc)?),
            ),
            Cast(ty, inner) => Cast(ty.clone(), Box::new(self.rename_rhs(st, inner, loc)?)),
            Call(op, args) => {
                let mut renamed = Vec::with_capacity(args.len());
                for arg in args {
                    renamed.push(self.rename_rhs(st, arg, loc)?);
                }
                Call(*op, renamed)
            }
        })
    }

    fn array_bounds_assertion(
        &self,
        st: &mut ExecutionState,
        index: &Exp<SsaName>,
        len: u64,
        loc: SourceLoc,
    ) {
        let width = self.cfg.pointer_width;
        let bound = Exp::Bits(B64::truncated(len, width), Signedness::Unsigned);
        let index = Exp::Cast(Ty::Unsigned(width), Box::new(index.clone()));
        let cond = Exp::Call(Op::Lt, vec![index, bound]).simplify();
        if cond != Exp::Bool(true) {
            let guard = st.active_thread().guard.clone();
            st.trace.assertion(guard, cond, "array bounds violated", loc);
        }
    }

    /// Rename an address-of expression. Only the L1 level applies: the
    /// result is a packed pointer constant over the object registry.
    fn address_of(
        &self,
        st: &mut ExecutionState,
        inner: &Exp<Name>,
        loc: SourceLoc,
    ) -> Result<Exp<SsaName>, ExecError> {
        let zero_offset =
            || Exp::Bits(B64::zeros(self.cfg.pointer_width), Signedness::Unsigned);
        Ok(match inner {
            Exp::Id(name) if self.program.function(*name).is_some() => {
                let object = st.objects.number(ObjectId::Function(*name));
                Exp::Pointer { object, offset: Box::new(zero_offset()) }
            }
            Exp::Id(name) => {
                let l1 = self.l1_of(st, *name);
                let object = st.objects.number(ObjectId::Named(l1));
                Exp::Pointer { object, offset: Box::new(zero_offset()) }
            }
            Exp::Index(base, index) => {
                let elem_size = self
                    .ns
                    .size_of(&self.ty_of(st, &Exp::Index(base.clone(), index.clone()))?)
                    .unwrap_or(1);
                let base_ptr = self.address_of(st, base, loc)?;
                match base_ptr {
                    Exp::Pointer { object, offset } => {
                        let index = self.rename_rhs(st, index, loc)?;
                        let width = self.cfg.pointer_width;
                        let scaled = Exp::Call(
                            Op::Mul,
                            vec![
                                Exp::Cast(Ty::Unsigned(width), Box::new(index)),
                                Exp::Bits(B64::truncated(elem_size, width), Signedness::Unsigned),
                            ],
                        );
                        let offset = Exp::Call(Op::Add, vec![*offset, scaled]).simplify();
                        Exp::Pointer { object, offset: Box::new(offset) }
                    }
                    other => other,
                }
            }
            Exp::Field(base, field) => {
                let base_ty = self.ty_of(st, base)?;
                let offset = match self.ns.resolve(&base_ty) {
                    Ty::Struct(name) => self.ns.offset_of(*name, *field).unwrap_or(0),
                    _ => 0,
                };
                let base_ptr = self.address_of(st, base, loc)?;
                match base_ptr {
                    Exp::Pointer { object, offset: base_offset } => {
                        let width = self.cfg.pointer_width;
                        let offset = Exp::Call(
                            Op::Add,
                            vec![
                                *base_offset,
                                Exp::Bits(B64::truncated(offset, width), Signedness::Unsigned),
                            ],
                        )
                        .simplify();
                        Exp::Pointer { object, offset: Box::new(offset) }
                    }
                    other => other,
                }
            }
            // &*p is p
            Exp::Deref(p) => self.rename_rhs(st, p, loc)?,
            _ => {
                let object = st.objects.number(ObjectId::Invalid);
                Exp::Pointer { object, offset: Box::new(zero_offset()) }
            }
        })
    }

    /// Over-approximate the targets of a pointer rvalue for the value
    /// set. Anything the tracker cannot follow collapses to the
    /// invalid marker, which dereference assertions then catch.
    fn targets_of(&self, st: &mut ExecutionState, exp: &Exp<Name>) -> Targets {
        let mut invalid = Targets::new();
        invalid.insert(Target::invalid());
        match exp {
            Exp::Id(name) => {
                let l1 = self.l1_of(st, *name);
                st.value_set.read(l1).cloned().unwrap_or(invalid)
            }
            Exp::AddrOf(inner) => {
                let mut targets = Targets::new();
                match &**inner {
                    Exp::Id(name) if self.program.function(*name).is_some() => {
                        targets.insert(Target::new(ObjectId::Function(*name), 0));
                    }
                    Exp::Id(name) => {
                        let l1 = self.l1_of(st, *name);
                        targets.insert(Target::new(ObjectId::Named(l1), 0));
                    }
                    Exp::Index(base, index) => {
                        if let Exp::Id(name) = &**base {
                            let l1 = self.l1_of(st, *name);
                            let offset = match index.clone().simplify() {
                                Exp::Bits(bv, _) => {
                                    let elem = self
                                        .ty_of(st, inner)
                                        .ok()
                                        .and_then(|ty| self.ns.size_of(&ty))
                                        .unwrap_or(1);
                                    Offset::Concrete(bv.signed() as i64 * elem as i64)
                                }
                                _ => Offset::Unknown,
                            };
                            targets.insert(Target { object: ObjectId::Named(l1), offset });
                        } else {
                            return invalid;
                        }
                    }
                    Exp::Field(base, field) => {
                        if let Exp::Id(name) = &**base {
                            let l1 = self.l1_of(st, *name);
                            let offset = self
                                .ty_of(st, base)
                                .ok()
                                .and_then(|ty| match self.ns.resolve(&ty) {
                                    Ty::Struct(s) => self.ns.offset_of(*s, *field),
                                    _ => None,
                                })
                                .map(|o| Offset::Concrete(o as i64))
                                .unwrap_or(Offset::Unknown);
                            targets.insert(Target { object: ObjectId::Named(l1), offset });
                        } else {
                            return invalid;
                        }
                    }
                    _ => return invalid,
                }
                targets
            }
            Exp::Pointer { object, offset } => {
                let mut targets = Targets::new();
                let object = match st.objects.object(*object) {
                    Some(object) => object,
                    None => return invalid,
                };
                let offset = match offset.clone().simplify() {
                    Exp::Bits(bv, _) => Offset::Concrete(bv.signed() as i64),
                    _ => Offset::Unknown,
                };
                targets.insert(Target { object, offset });
                targets
            }
            Exp::Cast(_, inner) => self.targets_of(st, inner),
            Exp::Ite(_, t, e) => {
                let mut targets = self.targets_of(st, t);
                targets.extend(self.targets_of(st, e).iter().copied());
                targets
            }
            Exp::Call(Op::PtrAdd, args) if args.len() == 2 => {
                let base = self.targets_of(st, &args[0]);
                let delta = match args[1].clone().simplify() {
                    Exp::Bits(bv, _) => Offset::Concrete(bv.signed() as i64),
                    _ => Offset::Unknown,
                };
                base.iter().map(|t| Target { object: t.object, offset: t.offset.add(delta) }).collect()
            }
            _ => invalid,
        }
    }

    fn same_object(&self, pointer: Exp<SsaName>, object: u32) -> Exp<SsaName> {
        let zero = Exp::Bits(B64::zeros(self.cfg.pointer_width), Signedness::Unsigned);
        Exp::Call(
            Op::SameObject,
            vec![pointer, Exp::Pointer { object, offset: Box::new(zero) }],
        )
    }

    /// The backing SSA variable of an abstract object. Dynamic objects
    /// are keyed on the allocator builtin with the allocation index as
    /// the L1 instantiation.
    fn object_l1(&self, object: ObjectId) -> Option<L1Name> {
        match object {
            ObjectId::Named(l1) => Some(l1),
            ObjectId::Dynamic(k) => {
                Some(L1Name { name: ALLOC, thread: 0, activation: 0, inst: k })
            }
            _ => None,
        }
    }

    /// Expand a dereference for reading into an ite cascade over the
    /// pointer's target set, with a pointer-validity assertion.
    fn deref_read(
        &self,
        st: &mut ExecutionState,
        p: &Exp<Name>,
        loc: SourceLoc,
    ) -> Result<Exp<SsaName>, ExecError> {
        let ty = self.ty_of(st, &Exp::Deref(Box::new(p.clone())))?;
        let targets = self.targets_of(st, p);
        let pointer = self.rename_rhs(st, p, loc)?.simplify();

        self.deref_validity_assertion(st, &pointer, &targets, loc);

        let mut value = Exp::Invalid(ty.clone());
        for target in targets.iter().rev() {
            let backing = match self.object_l1(target.object) {
                Some(l1) => l1,
                None => continue,
            };
            let object = st.objects.number(target.object);
            let read = self.read_object(st, backing, *target, &ty, &pointer, loc)?;
            let cond = self.same_object(pointer.clone(), object);
            value = Exp::Ite(Box::new(cond), Box::new(read), Box::new(value));
        }
        Ok(value.simplify())
    }

    fn deref_validity_assertion(
        &self,
        st: &mut ExecutionState,
        pointer: &Exp<SsaName>,
        targets: &Targets,
        loc: SourceLoc,
    ) {
        let mut valid = Exp::Bool(false);
        for target in targets {
            if target.object.is_valid() {
                let object = st.objects.number(target.object);
                valid = crate::ir::short_circuit_or(
                    valid,
                    self.same_object(pointer.clone(), object),
                );
            }
        }
        let valid = valid.simplify();
        if valid != Exp::Bool(true) {
            let guard = st.active_thread().guard.clone();
            st.trace.assertion(guard, valid, "dereference failure: invalid pointer", loc);
        }
    }

    /// The value of an abstract object at a target's offset, given the
    /// type the dereference expects.
    fn read_object(
        &self,
        st: &mut ExecutionState,
        backing: L1Name,
        target: Target,
        ty: &Ty,
        pointer: &Exp<SsaName>,
        loc: SourceLoc,
    ) -> Result<Exp<SsaName>, ExecError> {
        // dynamic objects take their type from the first access
        if !st.types.contains_key(&backing) {
            st.types.insert(backing, ty.clone());
        }
        let object_ty = self.ty_of_l1(st, backing)?;
        let ssa = st.level2.read(backing);
        st.trace.record_type(ssa, object_ty.clone());
        let base = Exp::Id(ssa);

        match self.ns.resolve(&object_ty) {
            Ty::Array(elem, len) => {
                let elem_size = self.ns.size_of(elem).unwrap_or(1).max(1);
                let width = self.cfg.pointer_width;
                let index = match target.offset {
                    Offset::Concrete(offset) => Exp::Bits(
                        B64::truncated((offset as u64) / elem_size, width),
                        Signedness::Unsigned,
                    ),
                    Offset::Unknown => {
                        let offset = Exp::Call(Op::PtrOffset, vec![pointer.clone()]);
                        Exp::Call(
                            Op::Div,
                            vec![
                                offset,
                                Exp::Bits(B64::truncated(elem_size, width), Signedness::Unsigned),
                            ],
                        )
                    }
                };
                self.array_bounds_assertion(st, &index, *len, loc);
                Ok(Exp::Index(Box::new(base), Box::new(index)))
            }
            Ty::Struct(name) => match target.offset {
                Offset::Concrete(offset) => {
                    let field = self.ns.fields(*name).and_then(|fields| {
                        fields
                            .iter()
                            .find(|(f, _)| self.ns.offset_of(*name, *f) == Some(offset as u64))
                            .map(|(f, _)| *f)
                    });
                    match field {
                        Some(field) => Ok(Exp::Field(Box::new(base), field)),
                        None => Ok(Exp::Invalid(ty.clone())),
                    }
                }
                Offset::Unknown => Ok(Exp::Invalid(ty.clone())),
            },
            _ => {
                // scalar object: any non-zero offset is out of bounds
                if let Offset::Concrete(offset) = target.offset {
                    if offset != 0 {
                        let guard = st.active_thread().guard.clone();
                        st.trace.assertion(
                            guard,
                            Exp::Bool(false),
                            "dereference failure: offset out of bounds",
                            loc,
                        );
                    }
                }
                Ok(base)
            }
        }
    }

    /// Guarded write through a pointer: every valid target gets a
    /// fresh SSA version selected between the stored value and its old
    /// contents.
    fn deref_write(
        &self,
        st: &mut ExecutionState,
        p: &Exp<Name>,
        rhs: Exp<SsaName>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let ty = self.ty_of(st, &Exp::Deref(Box::new(p.clone())))?;
        let targets = self.targets_of(st, p);
        let pointer = self.rename_rhs(st, p, loc)?.simplify();

        self.deref_validity_assertion(st, &pointer, &targets, loc);

        for target in targets.iter() {
            let backing = match self.object_l1(target.object) {
                Some(l1) => l1,
                None => continue,
            };
            if !st.types.contains_key(&backing) {
                st.types.insert(backing, ty.clone());
            }
            let object_ty = self.ty_of_l1(st, backing)?;
            let object = st.objects.number(target.object);
            let old = st.level2.read(backing);
            st.trace.record_type(old, object_ty.clone());
            let cond = self.same_object(pointer.clone(), object);

            let stored: Exp<SsaName> = match self.ns.resolve(&object_ty) {
                Ty::Array(elem, _) => {
                    let elem_size = self.ns.size_of(elem).unwrap_or(1).max(1);
                    let width = self.cfg.pointer_width;
                    let index = match target.offset {
                        Offset::Concrete(offset) => Exp::Bits(
                            B64::truncated((offset as u64) / elem_size, width),
                            Signedness::Unsigned,
                        ),
                        Offset::Unknown => {
                            let offset = Exp::Call(Op::PtrOffset, vec![pointer.clone()]);
                            Exp::Call(
                                Op::Div,
                                vec![
                                    offset,
                                    Exp::Bits(
                                        B64::truncated(elem_size, width),
                                        Signedness::Unsigned,
                                    ),
                                ],
                            )
                        }
                    };
                    Exp::With(Box::new(Exp::Id(old)), Box::new(index), Box::new(rhs.clone()))
                }
                _ => rhs.clone(),
            };

            let value =
                Exp::Ite(Box::new(cond), Box::new(stored), Box::new(Exp::Id(old))).simplify();
            let fresh = st.level2.assign(&mut st.alloc, backing);
            st.level2.kill_constant(backing);
            let guard = st.active_thread().guard.clone();
            st.trace.assignment(guard, fresh, value, object_ty);
        }
        Ok(())
    }

    /// Assign an already-renamed value to an lvalue.
    fn assign_renamed(
        &self,
        st: &mut ExecutionState,
        lhs: &Exp<Name>,
        rhs: Exp<SsaName>,
        rhs_targets: Option<Targets>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        match lhs {
            Exp::Id(name) => {
                let l1 = self.l1_of(st, *name);
                let ty = self.ty_of_l1(st, l1)?;
                if ty.is_pointer() {
                    let targets = rhs_targets.unwrap_or_else(|| {
                        let mut invalid = Targets::new();
                        invalid.insert(Target::invalid());
                        invalid
                    });
                    st.value_set.assign(l1, targets);
                }
                let fresh = st.level2.assign(&mut st.alloc, l1);
                let guard = st.active_thread().guard.clone();
                st.trace.assignment(guard.clone(), fresh, rhs.clone(), ty.clone());
                // constants are only tracked while the path guard is
                // trivially true
                let propagate = guard.is_true()
                    && rhs.is_constant()
                    && rhs.size_heuristic() <= CONST_PROP_MAX_SIZE;
                if propagate {
                    st.level2.record_constant(l1, rhs);
                } else {
                    st.level2.kill_constant(l1);
                }
                Ok(())
            }
            Exp::Deref(p) => self.deref_write(st, p, rhs, loc),
            Exp::Index(base, index) => {
                let base_ty = self.ty_of(st, base)?;
                let index_renamed = self.rename_rhs(st, index, loc)?.simplify();
                if let Ty::Array(_, len) = self.ns.resolve(&base_ty) {
                    self.array_bounds_assertion(st, &index_renamed, *len, loc);
                }
                let old = self.rename_rhs(st, base, loc)?;
                let with = Exp::With(Box::new(old), Box::new(index_renamed), Box::new(rhs));
                self.assign_renamed(st, base, with, None, loc)
            }
            Exp::Field(base, field) => {
                let old = self.rename_rhs(st, base, loc)?;
                let with = Exp::WithField(Box::new(old), *field, Box::new(rhs));
                self.assign_renamed(st, base, with, None, loc)
            }
            _ => Err(ExecError::Type(format!("bad assignment target {:?}", lhs), loc)),
        }
    }

    fn exec_assign(
        &self,
        st: &mut ExecutionState,
        lhs: &Exp<Name>,
        rhs: &Exp<Name>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let lhs_ty = self.ty_of(st, lhs)?;
        let rhs_renamed = self.rename_rhs(st, rhs, loc)?.simplify();
        let rhs_targets =
            if lhs_ty.is_pointer() { Some(self.targets_of(st, rhs)) } else { None };
        self.assign_renamed(st, lhs, rhs_renamed, rhs_targets, loc)
    }

    /// Assignment helper for internal scalar writes (return values).
    fn assign_scalar(
        &self,
        st: &mut ExecutionState,
        lhs: &Exp<Name>,
        rhs: &Exp<Name>,
        ty: Ty,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        if let Exp::Id(name) = lhs {
            let l1 = self.l1_of(st, *name);
            st.types.entry(l1).or_insert(ty);
        }
        self.exec_assign(st, lhs, rhs, loc)
    }

    fn exec_call(
        &self,
        st: &mut ExecutionState,
        pc: Pc,
        lhs: &Option<Exp<Name>>,
        callee: &Exp<Name>,
        args: &[Exp<Name>],
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        match callee {
            Exp::Id(f) if *f == ALLOC => {
                self.exec_alloc(st, lhs, loc)?;
                self.advance(st);
                Ok(())
            }
            Exp::Id(f) if *f == FREE => {
                self.exec_free(st, args, loc)?;
                self.advance(st);
                Ok(())
            }
            Exp::Id(f) if self.program.function(*f).is_some() => {
                let return_pc = Pc { function: pc.function, index: pc.index + 1 };
                self.direct_call(st, *f, lhs.clone(), args, return_pc, FrameKind::Normal, loc)
            }
            Exp::Id(f) if st.types.contains_key(&self.l1_of(st, *f)) => {
                // a call through a function-pointer variable
                self.expand_function_pointer(st, pc, lhs, callee, args, loc)
            }
            Exp::Id(_) => {
                // bodyless extern: havoc the return value
                if let Some(lhs) = lhs {
                    let ty = self.ty_of(st, lhs)?;
                    let nondet = Exp::Nondet(ty.clone(), 0);
                    self.assign_scalar(st, lhs, &nondet, ty, loc)?;
                }
                self.advance(st);
                Ok(())
            }
            Exp::Deref(inner) => {
                self.expand_function_pointer(st, pc, lhs, inner, args, loc)
            }
            _ => self.expand_function_pointer(st, pc, lhs, callee, args, loc),
        }
    }

    fn exec_alloc(
        &self,
        st: &mut ExecutionState,
        lhs: &Option<Exp<Name>>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let k = st.fresh_dynamic();
        let object = ObjectId::Dynamic(k);
        let number = st.objects.number(object);
        if let Some(Exp::Id(name)) = lhs {
            let l1 = self.l1_of(st, *name);
            let mut targets = Targets::new();
            targets.insert(Target::new(object, 0));
            st.value_set.assign(l1, targets);
            let zero = Exp::Bits(B64::zeros(self.cfg.pointer_width), Signedness::Unsigned);
            let pointer = Exp::Pointer { object: number, offset: Box::new(zero) };
            let ty = self.ty_of_l1(st, l1)?;
            let fresh = st.level2.assign(&mut st.alloc, l1);
            let guard = st.active_thread().guard.clone();
            st.trace.assignment(guard.clone(), fresh, pointer.clone(), ty);
            if guard.is_true() {
                st.level2.record_constant(l1, pointer);
            } else {
                st.level2.kill_constant(l1);
            }
        } else if lhs.is_some() {
            return Err(ExecError::Type("allocation target must be a variable".to_string(), loc));
        }
        Ok(())
    }

    fn exec_free(
        &self,
        st: &mut ExecutionState,
        args: &[Exp<Name>],
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let p = args
            .first()
            .ok_or_else(|| ExecError::Type("free takes one argument".to_string(), loc))?;
        let targets = self.targets_of(st, p);
        let pointer = self.rename_rhs(st, p, loc)?.simplify();
        self.deref_validity_assertion(st, &pointer, &targets, loc);
        for target in targets {
            if let ObjectId::Dynamic(_) = target.object {
                st.value_set.invalidate(target.object);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn direct_call(
        &self,
        st: &mut ExecutionState,
        f: Name,
        lhs: Option<Exp<Name>>,
        args: &[Exp<Name>],
        return_pc: Pc,
        kind: FrameKind,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let function = self.program.function(f).expect("direct call to unknown function");

        // recursion bound, counted per function
        let recursion = {
            let thread = st.active_thread_mut();
            let count = thread.function_unwind.entry(f).or_insert(0);
            *count += 1;
            *count
        };
        if let Some(bound) = self.cfg.unwind {
            if recursion > bound + 1 {
                let msg =
                    format!("unwinding assertion recursion {}", self.symtab.to_str(f));
                self.close_exhausted_path(st, &Exp::Bool(true), &msg, loc);
                let thread = st.active_thread_mut();
                *thread.function_unwind.get_mut(&f).unwrap() -= 1;
                thread.pc = Some(return_pc);
                return Ok(());
            }
        }

        // rename actuals in the caller's context
        let params = function.params.clone();
        let mut actuals = Vec::with_capacity(params.len());
        for (i, (_, ty)) in params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or(Exp::Nondet(ty.clone(), 0));
            let renamed = self.rename_rhs(st, &arg, loc)?.simplify();
            let targets = if ty.is_pointer() { Some(self.targets_of(st, &arg)) } else { None };
            actuals.push((renamed, targets));
        }

        let thread_id = st.active_thread().id;
        let activation = st.active_thread_mut().next_activation(f);
        let mut frame = Frame::new(f, thread_id, activation, function.end_index());
        frame.kind = kind;
        frame.return_lhs = lhs;
        frame.return_pc = Some(return_pc);
        st.active_thread_mut().call_stack.push(frame);

        // bind formals to the renamed actuals
        for ((param, ty), (actual, targets)) in params.iter().zip(actuals) {
            let l1 = {
                let frame = st.active_thread_mut().top_mut();
                frame.declaration_history.insert(*param);
                let l1 = frame.level1.activate(*param);
                frame.locals.insert(l1);
                l1
            };
            st.types.insert(l1, ty.clone());
            if let Some(targets) = targets {
                st.value_set.assign(l1, targets);
            }
            let fresh = st.level2.assign(&mut st.alloc, l1);
            let guard = st.active_thread().guard.clone();
            st.trace.assignment(guard.clone(), fresh, actual.clone(), ty.clone());
            let propagate = guard.is_true()
                && actual.is_constant()
                && actual.size_heuristic() <= CONST_PROP_MAX_SIZE;
            if propagate {
                st.level2.record_constant(l1, actual);
            } else {
                st.level2.kill_constant(l1);
            }
        }

        st.active_thread_mut().pc = Some(Pc { function: f, index: 0 });
        Ok(())
    }

    fn exec_end_function(&self, st: &mut ExecutionState, loc: SourceLoc) -> Result<(), ExecError> {
        // gather the return value in the callee's context before the
        // frame disappears
        let (ret_ty, has_lhs) = {
            let frame = st.active_thread().top();
            let function = self.program.function(frame.function).unwrap();
            (function.ret_ty.clone(), frame.return_lhs.is_some())
        };
        let ret = if has_lhs && ret_ty != Ty::Empty {
            let l1 = st.active_thread().top().level1.rename(RETURN);
            let ssa = st.level2.read(l1);
            st.trace.record_type(ssa, ret_ty.clone());
            let value = match st.level2.constant(l1) {
                Some(constant) => constant.clone(),
                None => Exp::Id(ssa),
            };
            let targets = if ret_ty.is_pointer() {
                Some(st.value_set.read(l1).cloned().unwrap_or_else(|| {
                    let mut invalid = Targets::new();
                    invalid.insert(Target::invalid());
                    invalid
                }))
            } else {
                None
            };
            Some((value, targets))
        } else {
            None
        };

        let popped = st.active_thread_mut().call_stack.pop().expect("end of empty stack");
        if let Some(count) = st.active_thread_mut().function_unwind.get_mut(&popped.function) {
            *count = count.saturating_sub(1);
        }

        if st.active_thread().call_stack.is_empty() {
            let thread = st.active_thread_mut();
            thread.ended = true;
            thread.pc = None;
            return Ok(());
        }

        if let (Some(lhs), Some((ret, targets))) = (popped.return_lhs.clone(), ret) {
            self.assign_renamed(st, &lhs, ret, targets, loc)?;
        }

        match popped.kind {
            FrameKind::Normal => {
                let return_pc = popped.return_pc.expect("inner frame without return pc");
                st.active_thread_mut().pc = Some(return_pc);
                Ok(())
            }
            FrameKind::FpCandidate => self.fp_candidate_returned(st, loc),
        }
    }

    /// A function-pointer candidate call just returned: file its exit
    /// state at the join point and move on to the next candidate.
    fn fp_candidate_returned(&self, st: &mut ExecutionState, loc: SourceLoc) -> Result<(), ExecError> {
        let join_index = {
            let frame = st.active_thread().top();
            let expansion = frame.fp_expansion.as_ref().expect("candidate without expansion");
            expansion.join_index
        };
        let caller_fn = st.active_thread().top().function;
        let join_id = self.program.function(caller_fn).unwrap().body[join_index].id;
        let snapshot = st.snapshot();
        st.active_thread_mut().top_mut().goto_states.entry(join_id).or_default().push(snapshot);
        self.next_fp_candidate(st, loc)
    }

    fn next_fp_candidate(&self, st: &mut ExecutionState, loc: SourceLoc) -> Result<(), ExecError> {
        let (candidate, expansion) = {
            let frame = st.active_thread_mut().top_mut();
            let expansion = frame.fp_expansion.as_mut().expect("no expansion in progress");
            let candidate = if expansion.next < expansion.candidates.len() {
                let f = expansion.candidates[expansion.next];
                expansion.next += 1;
                Some(f)
            } else {
                None
            };
            (candidate, expansion.clone())
        };

        // restore the pre-call state between candidates
        st.level2 = expansion.saved.level2.clone();
        st.value_set = expansion.saved.value_set.clone();
        st.active_thread_mut().guard = expansion.saved.guard.clone();

        match candidate {
            Some(f) => {
                let object = st.objects.number(ObjectId::Function(f));
                let cond = self.same_object(expansion.pointer.clone(), object).simplify();
                st.active_thread_mut().guard.add(cond);
                let caller_fn = st.active_thread().top().function;
                let return_pc = Pc { function: caller_fn, index: expansion.join_index };
                self.direct_call(
                    st,
                    f,
                    expansion.lhs.clone(),
                    &expansion.args,
                    return_pc,
                    FrameKind::FpCandidate,
                    loc,
                )
            }
            None => {
                // no candidate matched: this residual path is infeasible
                for f in &expansion.candidates {
                    let object = st.objects.number(ObjectId::Function(*f));
                    let cond = self.same_object(expansion.pointer.clone(), object).bool_not();
                    st.active_thread_mut().guard.add(cond.simplify());
                }
                let guard = st.active_thread().guard.clone();
                if !guard.is_false() {
                    st.trace.assumption(guard, Exp::Bool(false));
                }
                st.active_thread_mut().guard.make_false();
                st.active_thread_mut().top_mut().fp_expansion = None;
                self.jump(st, expansion.join_index);
                Ok(())
            }
        }
    }

    fn expand_function_pointer(
        &self,
        st: &mut ExecutionState,
        pc: Pc,
        lhs: &Option<Exp<Name>>,
        pointer_exp: &Exp<Name>,
        args: &[Exp<Name>],
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        let targets = self.targets_of(st, pointer_exp);
        let candidates: Vec<Name> = targets
            .iter()
            .filter_map(|t| match t.object {
                ObjectId::Function(f) if self.program.function(f).is_some() => Some(f),
                _ => None,
            })
            .collect();
        let pointer = self.rename_rhs(st, pointer_exp, loc)?.simplify();

        // a validity obligation: the pointer must match some candidate
        let mut valid = Exp::Bool(false);
        for f in &candidates {
            let object = st.objects.number(ObjectId::Function(*f));
            valid = crate::ir::short_circuit_or(valid, self.same_object(pointer.clone(), object));
        }
        let valid = valid.simplify();
        if valid != Exp::Bool(true) {
            let guard = st.active_thread().guard.clone();
            st.trace.assertion(guard, valid, "dereferenced function pointer is invalid", loc);
        }

        match candidates.len() {
            0 => {
                self.advance(st);
                Ok(())
            }
            1 => {
                let return_pc = Pc { function: pc.function, index: pc.index + 1 };
                self.direct_call(st, candidates[0], lhs.clone(), args, return_pc, FrameKind::Normal, loc)
            }
            _ => {
                let saved = st.snapshot();
                st.active_thread_mut().top_mut().fp_expansion = Some(FpExpansion {
                    candidates,
                    next: 0,
                    join_index: pc.index + 1,
                    lhs: lhs.clone(),
                    args: args.to_vec(),
                    pointer,
                    saved,
                });
                self.next_fp_candidate(st, loc)
            }
        }
    }

    fn exec_throw(
        &self,
        st: &mut ExecutionState,
        tag: Name,
        value: &Option<Exp<Name>>,
        loc: SourceLoc,
    ) -> Result<(), ExecError> {
        {
            let frame = st.active_thread().top();
            if frame.has_throw_decl && !frame.throw_decls.contains(&tag) {
                let guard = st.active_thread().guard.clone();
                st.trace.assertion(guard, Exp::Bool(false), "no matching throw declaration", loc);
            }
        }

        let handler = st
            .active_thread()
            .call_stack
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, frame)| {
                frame
                    .catch_stack
                    .iter()
                    .rev()
                    .find_map(|handlers| handlers.get(&tag).copied())
                    .map(|index| (i, index))
            });

        match handler {
            Some((frame_index, handler_index)) => {
                if let Some(value) = value {
                    let ty = self.ty_of(st, value)?;
                    let renamed = self.rename_rhs(st, value, loc)?.simplify();
                    let l1 = L1Name::global(THROWN);
                    st.types.insert(l1, ty.clone());
                    let fresh = st.level2.assign(&mut st.alloc, l1);
                    st.level2.kill_constant(l1);
                    let guard = st.active_thread().guard.clone();
                    st.trace.assignment(guard, fresh, renamed, ty);
                }
                // suspend the throwing path at the handler; the frames
                // in between run out under a false guard and pop
                // normally
                let handler_frame = &st.active_thread().call_stack[frame_index];
                let handler_id =
                    self.program.function(handler_frame.function).unwrap().body[handler_index].id;
                let snapshot = st.snapshot();
                st.active_thread_mut().call_stack[frame_index]
                    .goto_states
                    .entry(handler_id)
                    .or_default()
                    .push(snapshot);
                st.active_thread_mut().guard.make_false();
                self.advance(st);
                Ok(())
            }
            None => {
                let guard = st.active_thread().guard.clone();
                st.trace.assertion(guard, Exp::Bool(false), "uncaught exception", loc);
                st.active_thread_mut().guard.make_false();
                self.advance(st);
                Ok(())
            }
        }
    }

    fn exec_start_thread(&self, st: &mut ExecutionState, f: Name) -> Result<(), ExecError> {
        let function = self
            .program
            .function(f)
            .ok_or_else(|| ExecError::NoEntry(self.symtab.to_str(f).to_string()))?;
        let tid = st.threads.len() as u32;
        let mut thread = ThreadState::new(tid);
        thread.guard = st.active_thread().guard.clone();
        let activation = thread.next_activation(f);
        let frame = Frame::new(f, tid, activation, function.end_index());
        thread.call_stack.push(frame);
        thread.pc = Some(Pc { function: f, index: 0 });
        st.threads.push(thread);

        // bind the new thread's formals to fresh nondet values, in its
        // own context
        let previous = st.active;
        st.active = st.threads.len() - 1;
        self.bind_formals_nondet(st, f)?;
        st.active = previous;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, InstrKind, Program, Symtab, TypeDef};
    use crate::trace::Step;
    use crate::value_set::ObjectId;

    fn int_lit(v: i64) -> Exp<Name> {
        Exp::Bits(B64::from_i64(v, 32), Signedness::Signed)
    }

    fn var(name: Name) -> Exp<Name> {
        Exp::Id(name)
    }

    fn binop(op: Op, lhs: Exp<Name>, rhs: Exp<Name>) -> Exp<Name> {
        Exp::Call(op, vec![lhs, rhs])
    }

    fn body(kinds: Vec<InstrKind>) -> Vec<Instr> {
        kinds.into_iter().map(Instr::new).collect()
    }

    struct Harness {
        symtab: Symtab,
        program: Program,
        ns: TypeNamespace,
        cfg: CheckConfig,
    }

    impl Harness {
        fn new() -> Self {
            let symtab = Symtab::new();
            let program = Program::new(crate::ir::MAIN);
            let ns = TypeNamespace::new(64);
            let cfg = CheckConfig { unwind: Some(10), ..CheckConfig::default() };
            Harness { symtab, program, ns, cfg }
        }

        fn run(&mut self) -> Vec<PathResult> {
            self.program.assign_ids();
            let executor = Executor::new(&self.program, &self.symtab, &self.ns, &self.cfg);
            let results = executor.run().unwrap();
            for result in &results {
                assert!(result.trace.check_ssa(), "SSA violated:\n{}", result.trace.dump(&self.symtab));
            }
            results
        }
    }

    fn assignments_to<'t>(trace: &'t Trace, name: Name) -> Vec<&'t Step> {
        trace
            .steps()
            .iter()
            .filter(|step| match step {
                Step::Assignment { lhs, .. } | Step::Phi { lhs, .. } => lhs.l1.name == name,
                _ => false,
            })
            .collect()
    }

    #[test]
    fn test_overflow_obligation_shape() {
        let mut h = Harness::new();
        let x = h.symtab.intern("x");
        // int x = nondet(); assert(!(x + 1 > x))
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Signed(32),
            body: body(vec![
                InstrKind::Decl(x, Ty::Signed(32)),
                InstrKind::Assert(
                    binop(Op::Gt, binop(Op::Add, var(x), int_lit(1)), var(x)).bool_not(),
                    "no-overflow".to_string(),
                ),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        assert_eq!(results.len(), 1);
        let trace = &results[0].trace;
        let props = trace.properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].msg, "no-overflow");
        // the condition must stay symbolic; only the solver can decide it
        match &trace.steps()[props[0].index] {
            Step::Assertion { cond, .. } => {
                assert!(!matches!(cond, Exp::Bool(_)), "condition folded: {:?}", cond)
            }
            _ => panic!("property index does not point at an assertion"),
        }
    }

    #[test]
    fn test_diamond_merge_phi() {
        let mut h = Harness::new();
        let c = h.symtab.intern("c");
        let x = h.symtab.intern("x");
        // if (c) x = 1; else x = 2;
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(c, Ty::Bool),                                   // 0
                InstrKind::Decl(x, Ty::Signed(32)),                             // 1
                InstrKind::Goto { target: 5, cond: Some(var(c)) },              // 2
                InstrKind::Assign(var(x), int_lit(2)),                          // 3
                InstrKind::Goto { target: 6, cond: None },                      // 4
                InstrKind::Assign(var(x), int_lit(1)),                          // 5
                InstrKind::Skip,                                                // 6
                InstrKind::Assert(binop(Op::Gt, var(x), int_lit(0)), "positive".to_string()), // 7
                InstrKind::EndFunction,                                         // 8
            ]),
        });
        let results = h.run();
        assert_eq!(results.len(), 1);
        let trace = &results[0].trace;

        let phis: Vec<&Step> = trace
            .steps()
            .iter()
            .filter(|step| matches!(step, Step::Phi { .. }))
            .collect();
        assert!(!phis.is_empty(), "no phi at the join:\n{}", trace.dump(&h.symtab));
        // both arms merged: the guard of the phi covers both branches
        if let Step::Phi { guard, lhs, rhs } = phis[phis.len() - 1] {
            assert!(guard.is_true(), "merged guard should be c | !c = true");
            assert_eq!(lhs.l1.name, x);
            assert!(matches!(rhs, Exp::Ite(..)), "phi rhs is a selection: {:?}", rhs);
        }
        // the assertion sees the merged version
        let props = trace.properties();
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_loop_unwind_assertion() {
        let mut h = Harness::new();
        h.cfg.unwind = Some(5);
        let i = h.symtab.intern("i");
        // int i = 0; while (i < 10) i = i + 1;
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(i, Ty::Signed(32)),                                      // 0
                InstrKind::Assign(var(i), int_lit(0)),                                   // 1
                InstrKind::Goto {
                    target: 5,
                    cond: Some(binop(Op::Lt, var(i), int_lit(10)).bool_not()),
                },                                                                       // 2
                InstrKind::Assign(var(i), binop(Op::Add, var(i), int_lit(1))),           // 3
                InstrKind::Goto { target: 2, cond: None },                               // 4
                InstrKind::Skip,                                                         // 5
                InstrKind::EndFunction,                                                  // 6
            ]),
        });
        let results = h.run();
        assert_eq!(results.len(), 1);
        let trace = &results[0].trace;
        let props = trace.properties();
        assert_eq!(props.len(), 1, "trace:\n{}", trace.dump(&h.symtab));
        assert!(props[0].msg.starts_with("unwinding assertion loop"), "{}", props[0].msg);
        // five unrolled increments happened before the bound tripped
        let increments = assignments_to(trace, i);
        assert!(increments.len() >= 6, "i assigned {} times", increments.len());
    }

    #[test]
    fn test_no_unwinding_assertions_truncates_silently() {
        let mut h = Harness::new();
        h.cfg.unwind = Some(2);
        h.cfg.unwinding_assertions = false;
        let i = h.symtab.intern("i");
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(i, Ty::Signed(32)),
                InstrKind::Assign(var(i), int_lit(0)),
                InstrKind::Assign(var(i), binop(Op::Add, var(i), int_lit(1))),
                InstrKind::Goto { target: 2, cond: None },
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        assert_eq!(results[0].trace.properties().len(), 0);
    }

    #[test]
    fn test_call_return_and_constant_propagation() {
        let mut h = Harness::new();
        let f = h.symtab.intern("f");
        let a = h.symtab.intern("a");
        let y = h.symtab.intern("y");
        // int f(int a) { return a + 1; }  int main() { int y = f(3); }
        h.program.add_function(Function {
            name: f,
            params: vec![(a, Ty::Signed(32))],
            ret_ty: Ty::Signed(32),
            body: body(vec![
                InstrKind::Return(Some(binop(Op::Add, var(a), int_lit(1)))),
                InstrKind::EndFunction,
            ]),
        });
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(y, Ty::Signed(32)),
                InstrKind::FunctionCall {
                    lhs: Some(var(y)),
                    function: var(f),
                    args: vec![int_lit(3)],
                },
                InstrKind::Assert(binop(Op::Eq, var(y), int_lit(4)), "four".to_string()),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;
        // the argument propagates: y's final value folds to 4 and the
        // assertion becomes trivially true
        let props = trace.properties();
        assert_eq!(props.len(), 1);
        match &trace.steps()[props[0].index] {
            Step::Assertion { cond, .. } => assert_eq!(*cond, Exp::Bool(true)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_recursion_bound() {
        let mut h = Harness::new();
        h.cfg.unwind = Some(3);
        let f = h.symtab.intern("f");
        // void f() { f(); }
        h.program.add_function(Function {
            name: f,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::FunctionCall { lhs: None, function: var(f), args: Vec::new() },
                InstrKind::EndFunction,
            ]),
        });
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::FunctionCall { lhs: None, function: var(f), args: Vec::new() },
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let props = results[0].trace.properties();
        assert_eq!(props.len(), 1);
        assert!(props[0].msg.starts_with("unwinding assertion recursion"), "{}", props[0].msg);
    }

    #[test]
    fn test_function_pointer_expansion() {
        let mut h = Harness::new();
        let f = h.symtab.intern("f");
        let g = h.symtab.intern("g");
        let p = h.symtab.intern("p");
        let c = h.symtab.intern("c");
        let y = h.symtab.intern("y");
        let code_ty = Ty::Code { args: Vec::new(), ret: Box::new(Ty::Signed(32)) };
        let fp_ty = Ty::Pointer(Box::new(code_ty));

        for (name, value) in [(f, 111), (g, 222)] {
            h.program.add_function(Function {
                name,
                params: Vec::new(),
                ret_ty: Ty::Signed(32),
                body: body(vec![
                    InstrKind::Return(Some(int_lit(value))),
                    InstrKind::EndFunction,
                ]),
            });
        }
        // int (*p)() = c ? &f : &g;  y = p();
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(c, Ty::Bool),
                InstrKind::Decl(p, fp_ty),
                InstrKind::Decl(y, Ty::Signed(32)),
                InstrKind::Assign(
                    var(p),
                    Exp::Ite(
                        Box::new(var(c)),
                        Box::new(Exp::AddrOf(Box::new(var(f)))),
                        Box::new(Exp::AddrOf(Box::new(var(g)))),
                    ),
                ),
                InstrKind::FunctionCall { lhs: Some(var(y)), function: var(p), args: Vec::new() },
                InstrKind::Skip, // join point
                InstrKind::Assert(binop(Op::Gt, var(y), int_lit(0)), "called".to_string()),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        assert_eq!(results.len(), 1);
        let trace = &results[0].trace;

        // both candidates were explored: both constants appear as
        // return-value assignments
        let mut saw = (false, false);
        for step in trace.steps() {
            if let Step::Assignment { rhs, .. } = step {
                if *rhs == Exp::Bits(B64::from_i64(111, 32), Signedness::Signed) {
                    saw.0 = true;
                }
                if *rhs == Exp::Bits(B64::from_i64(222, 32), Signedness::Signed) {
                    saw.1 = true;
                }
            }
        }
        assert!(saw.0 && saw.1, "both candidates explored:\n{}", trace.dump(&h.symtab));

        // the two exit states merged at the join
        let phis = trace.steps().iter().filter(|s| matches!(s, Step::Phi { .. })).count();
        assert!(phis >= 1, "no merge at the join");
    }

    #[test]
    fn test_thread_interleaving_exposes_race() {
        let mut h = Harness::new();
        let worker = h.symtab.intern("worker");
        let flag = h.symtab.intern("flag");
        let crit = h.symtab.intern("crit");
        h.program.globals.push((flag, Ty::Signed(32)));
        h.program.globals.push((crit, Ty::Signed(32)));
        // void worker() { if (flag == 0) { flag = 1; crit = crit + 1; } }
        h.program.add_function(Function {
            name: worker,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Goto {
                    target: 3,
                    cond: Some(binop(Op::Neq, var(flag), int_lit(0))),
                },
                InstrKind::Assign(var(flag), int_lit(1)),
                InstrKind::Assign(var(crit), binop(Op::Add, var(crit), int_lit(1))),
                InstrKind::EndFunction,
            ]),
        });
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::StartThread(worker),
                InstrKind::StartThread(worker),
                InstrKind::Assert(binop(Op::Le, var(crit), int_lit(1)), "critical section".to_string()),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        assert!(results.len() > 1, "only one schedule explored");

        // some interleaving lets both workers pass the flag test and
        // the assertion folds to false there
        let mut race_found = false;
        for result in &results {
            for step in result.trace.steps() {
                if let Step::Assertion { cond, msg, .. } = step {
                    if msg == "critical section" && *cond == Exp::Bool(false) {
                        race_found = true;
                    }
                }
            }
        }
        assert!(race_found, "no schedule exposed the race");
    }

    #[test]
    fn test_throw_catch() {
        let mut h = Harness::new();
        let g = h.symtab.intern("g");
        let x = h.symtab.intern("x");
        let tag = h.symtab.intern("range_error");
        // main: try { g(); } catch (range_error) { x = 7; }
        h.program.add_function(Function {
            name: g,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Throw(tag, Some(int_lit(42))),
                InstrKind::EndFunction,
            ]),
        });
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(x, Ty::Signed(32)),                              // 0
                InstrKind::Catch(vec![(tag, 5)]),                                // 1
                InstrKind::FunctionCall { lhs: None, function: var(g), args: Vec::new() }, // 2
                InstrKind::Catch(Vec::new()),                                    // 3
                InstrKind::Goto { target: 6, cond: None },                       // 4
                InstrKind::Assign(var(x), int_lit(7)),                           // 5
                InstrKind::Skip,                                                 // 6
                InstrKind::EndFunction,                                          // 7
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;

        let thrown = assignments_to(trace, crate::ir::THROWN);
        assert_eq!(thrown.len(), 1, "thrown value recorded:\n{}", trace.dump(&h.symtab));

        // the handler body ran on a live path
        let handler_writes: Vec<_> = assignments_to(trace, x)
            .into_iter()
            .filter(|step| match step {
                Step::Assignment { rhs, guard, .. } => {
                    *rhs == Exp::Bits(B64::from_i64(7, 32), Signedness::Signed)
                        && !guard.is_false()
                }
                _ => false,
            })
            .collect();
        assert_eq!(handler_writes.len(), 1);
    }

    #[test]
    fn test_uncaught_exception() {
        let mut h = Harness::new();
        let tag = h.symtab.intern("oops");
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Throw(tag, None),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let props = results[0].trace.properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].msg, "uncaught exception");
    }

    #[test]
    fn test_alloc_free_use_after_free() {
        let mut h = Harness::new();
        let p = h.symtab.intern("p");
        let x = h.symtab.intern("x");
        let int_ptr = Ty::Pointer(Box::new(Ty::Signed(32)));
        // int *p = alloc(); *p = 5; free(p); int x = *p;
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(p, int_ptr),
                InstrKind::Decl(x, Ty::Signed(32)),
                InstrKind::FunctionCall {
                    lhs: Some(var(p)),
                    function: var(ALLOC),
                    args: Vec::new(),
                },
                InstrKind::Assign(Exp::Deref(Box::new(var(p))), int_lit(5)),
                InstrKind::FunctionCall { lhs: None, function: var(FREE), args: vec![var(p)] },
                InstrKind::Assign(var(x), Exp::Deref(Box::new(var(p)))),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;

        // the dereference after the free has no valid target left
        let fatal: Vec<_> = trace
            .steps()
            .iter()
            .filter(|step| match step {
                Step::Assertion { cond, msg, .. } => {
                    msg == "dereference failure: invalid pointer" && *cond == Exp::Bool(false)
                }
                _ => false,
            })
            .collect();
        assert_eq!(fatal.len(), 1, "trace:\n{}", trace.dump(&h.symtab));
    }

    #[test]
    fn test_pointer_diamond_merges_value_set() {
        let mut h = Harness::new();
        let a = h.symtab.intern("a");
        let b = h.symtab.intern("b");
        let p = h.symtab.intern("p");
        let c = h.symtab.intern("c");
        let x = h.symtab.intern("x");
        let int_ptr = Ty::Pointer(Box::new(Ty::Signed(32)));
        // p = c ? &a : &b; x = *p;
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(c, Ty::Bool),                                     // 0
                InstrKind::Decl(a, Ty::Signed(32)),                               // 1
                InstrKind::Decl(b, Ty::Signed(32)),                               // 2
                InstrKind::Decl(p, int_ptr),                                      // 3
                InstrKind::Decl(x, Ty::Signed(32)),                               // 4
                InstrKind::Goto { target: 8, cond: Some(var(c)) },                // 5
                InstrKind::Assign(var(p), Exp::AddrOf(Box::new(var(b)))),         // 6
                InstrKind::Goto { target: 9, cond: None },                        // 7
                InstrKind::Assign(var(p), Exp::AddrOf(Box::new(var(a)))),         // 8
                InstrKind::Skip,                                                  // 9
                InstrKind::Assign(var(x), Exp::Deref(Box::new(var(p)))),          // 10
                InstrKind::EndFunction,                                           // 11
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;
        // the dereference expands over both targets
        let deref = trace
            .steps()
            .iter()
            .find_map(|step| match step {
                Step::Assignment { lhs, rhs, .. } if lhs.l1.name == x => Some(rhs),
                _ => None,
            })
            .expect("deref assignment missing");
        assert!(matches!(deref, Exp::Ite(..)), "expected a target selection: {:?}", deref);
    }

    #[test]
    fn test_decl_reentry_allocates_fresh_l1() {
        let mut h = Harness::new();
        h.cfg.unwind = Some(3);
        let i = h.symtab.intern("i");
        let t = h.symtab.intern("t");
        // while (i < 2) { int t; t = i; i = i + 1; }
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(i, Ty::Signed(32)),                                      // 0
                InstrKind::Assign(var(i), int_lit(0)),                                   // 1
                InstrKind::Goto {
                    target: 7,
                    cond: Some(binop(Op::Lt, var(i), int_lit(2)).bool_not()),
                },                                                                       // 2
                InstrKind::Decl(t, Ty::Signed(32)),                                      // 3
                InstrKind::Assign(var(t), var(i)),                                       // 4
                InstrKind::Assign(var(i), binop(Op::Add, var(i), int_lit(1))),           // 5
                InstrKind::Goto { target: 2, cond: None },                               // 6
                InstrKind::Skip,                                                         // 7
                InstrKind::EndFunction,                                                  // 8
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;
        let mut insts = std::collections::HashSet::new();
        for step in trace.steps() {
            if let Step::Assignment { lhs, .. } = step {
                if lhs.l1.name == t {
                    insts.insert(lhs.l1.inst);
                }
            }
        }
        assert!(insts.len() >= 2, "re-entered declaration reused its L1: {:?}", insts);
    }

    #[test]
    fn test_assume_strengthens_guard() {
        let mut h = Harness::new();
        let x = h.symtab.intern("x");
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(x, Ty::Signed(32)),
                InstrKind::Assume(binop(Op::Gt, var(x), int_lit(0))),
                InstrKind::Assert(binop(Op::Ge, var(x), int_lit(0)), "nonneg".to_string()),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;
        let props = trace.properties();
        match &trace.steps()[props[0].index] {
            Step::Assertion { guard, .. } => {
                assert!(!guard.is_true(), "assume did not strengthen the assertion guard")
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_atomic_section_inhibits_interleaving() {
        let mut h = Harness::new();
        let worker = h.symtab.intern("worker");
        let counter = h.symtab.intern("counter");
        h.program.globals.push((counter, Ty::Signed(32)));
        h.program.add_function(Function {
            name: worker,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::AtomicBegin,
                InstrKind::Assign(var(counter), binop(Op::Add, var(counter), int_lit(1))),
                InstrKind::AtomicEnd,
                InstrKind::EndFunction,
            ]),
        });
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::StartThread(worker),
                InstrKind::AtomicBegin,
                InstrKind::Assign(var(counter), binop(Op::Add, var(counter), int_lit(1))),
                InstrKind::AtomicEnd,
                InstrKind::EndFunction,
            ]),
        });
        // with every shared access inside an atomic section the only
        // fork points are the atomic boundaries themselves
        let results = h.run();
        assert!(!results.is_empty());
        for result in &results {
            assert!(result.trace.check_ssa());
        }
    }

    #[test]
    fn test_struct_field_assignment() {
        let mut h = Harness::new();
        let pair = h.symtab.intern("pair");
        let fst = h.symtab.intern("fst");
        let snd = h.symtab.intern("snd");
        let s = h.symtab.intern("s");
        h.ns.types.insert(
            pair,
            TypeDef::Struct(vec![(fst, Ty::Signed(32)), (snd, Ty::Signed(32))]),
        );
        h.program.add_function(Function {
            name: crate::ir::MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: body(vec![
                InstrKind::Decl(s, Ty::Struct(pair)),
                InstrKind::Assign(Exp::Field(Box::new(var(s)), fst), int_lit(3)),
                InstrKind::Assert(
                    binop(Op::Eq, Exp::Field(Box::new(var(s)), fst), int_lit(3)),
                    "field".to_string(),
                ),
                InstrKind::EndFunction,
            ]),
        });
        let results = h.run();
        let trace = &results[0].trace;
        let writes = assignments_to(trace, s);
        // declaration init plus the field update
        assert!(writes.len() >= 2);
        assert!(writes.iter().any(|step| matches!(
            step,
            Step::Assignment { rhs: Exp::WithField(..), .. }
        )));
    }

    #[test]
    fn test_dynamic_object_registry() {
        let mut registry = state::ObjectRegistry::new();
        assert_eq!(registry.number(ObjectId::Null), crate::ir::NULL_OBJECT);
        assert_eq!(registry.number(ObjectId::Invalid), crate::ir::INVALID_OBJECT);
        let d0 = registry.number(ObjectId::Dynamic(0));
        let d1 = registry.number(ObjectId::Dynamic(1));
        assert_ne!(d0, d1);
        assert_eq!(registry.number(ObjectId::Dynamic(0)), d0);
        assert_eq!(registry.object(d1), Some(ObjectId::Dynamic(1)));
    }
}
