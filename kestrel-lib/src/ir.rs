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

//! This module defines the GOTO intermediate representation the
//! checker consumes. It is a simple goto/conditional branch language:
//! each function is a flat instruction list, control flow is expressed
//! with (possibly conditional) jumps to instruction indices, and all
//! names are interned into a symbol table ([Symtab]) as [Name] values,
//! which are wrappers around `u32`.
//!
//! Expressions ([Exp]) are parametric in the identifier type: the
//! program as loaded uses `Exp<Name>`, and the symbolic executor
//! produces renamed `Exp<SsaName>` trees of the same shape, so all the
//! traversal machinery is shared.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::bitvector::B64;
use crate::source_loc::SourceLoc;

pub mod serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Name {
    id: u32,
}

impl Name {
    pub fn from_u32(id: u32) -> Self {
        Name { id }
    }

    pub fn to_u32(self) -> u32 {
        self.id
    }
}

/// When a function executes a `Return` instruction, the returned value
/// is bound to the special [RETURN] variable, which the caller reads
/// after the frame is popped.
pub const RETURN: Name = Name { id: 0 };

/// Builtin performing a heap allocation; calls bind a fresh dynamic
/// object in the value set and return its address.
pub const ALLOC: Name = Name { id: 1 };

/// Builtin releasing a heap allocation; subsequent dereferences of the
/// freed pointer fail their validity assertion.
pub const FREE: Name = Name { id: 2 };

/// [THROWN] is the variable a `Throw` instruction assigns the thrown
/// value to before control transfers to the matching handler.
pub const THROWN: Name = Name { id: 3 };

/// The default entry function.
pub const MAIN: Name = Name { id: 4 };

/// A [Symtab] maps each `u32` identifier used in the IR to its string
/// name and vice-versa. The first few entries are reserved for the
/// builtins above.
#[derive(Clone, Debug)]
pub struct Symtab {
    symbols: Vec<String>,
    table: HashMap<String, u32, ahash::RandomState>,
    next: u32,
}

impl Symtab {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let mut symtab =
            Symtab { symbols: Vec::new(), table: HashMap::default(), next: 0 };
        symtab.intern("__return_value");
        symtab.intern("__kestrel_alloc");
        symtab.intern("__kestrel_free");
        symtab.intern("__thrown_value");
        symtab.intern("main");
        symtab
    }

    pub fn intern(&mut self, sym: &str) -> Name {
        match self.table.get(sym) {
            None => {
                let n = self.next;
                self.symbols.push(sym.to_string());
                self.table.insert(sym.to_string(), n);
                self.next += 1;
                Name::from_u32(n)
            }
            Some(n) => Name::from_u32(*n),
        }
    }

    pub fn to_str(&self, n: Name) -> &str {
        match self.symbols.get(n.id as usize) {
            Some(s) => s,
            None => "<unknown>",
        }
    }

    pub fn get(&self, sym: &str) -> Option<Name> {
        self.table.get(sym).copied().map(Name::from_u32)
    }

    pub fn to_raw_table(&self) -> Vec<String> {
        self.symbols.clone()
    }

    pub fn from_raw_table(raw: &[String]) -> Self {
        let mut symtab = Symtab::new();
        for sym in raw {
            symtab.intern(sym);
        }
        symtab
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FpTy {
    ebits: u32,
    sbits: u32,
}

impl FpTy {
    pub fn new(ebits: u32, sbits: u32) -> Self {
        assert!(ebits > 2 && sbits > 2);
        FpTy { ebits, sbits }
    }

    pub fn exponent_width(self) -> u32 {
        self.ebits
    }

    pub fn significand_width(self) -> u32 {
        self.sbits
    }

    /// Width of the packed representation: sign, biased exponent, and
    /// the trailing significand without its implicit leading bit.
    pub fn packed_width(self) -> u32 {
        1 + self.ebits + self.sbits - 1
    }

    pub fn fp16() -> Self {
        FpTy { ebits: 5, sbits: 11 }
    }

    pub fn fp32() -> Self {
        FpTy { ebits: 8, sbits: 24 }
    }

    pub fn fp64() -> Self {
        FpTy { ebits: 11, sbits: 53 }
    }

    pub fn fp128() -> Self {
        FpTy { ebits: 15, sbits: 113 }
    }
}

/// The five IEEE-754 rounding modes, in their fixed 3-bit encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round to nearest, ties to even
    Rne = 0,
    /// Round to nearest, ties away from zero
    Rta = 1,
    /// Round toward +infinity
    Rtp = 2,
    /// Round toward -infinity
    Rtn = 3,
    /// Round toward zero
    Rtz = 4,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signedness {
    Signed,
    Unsigned,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Empty,
    Bool,
    Signed(u32),
    Unsigned(u32),
    Float(FpTy),
    Pointer(Box<Ty>),
    Array(Box<Ty>, u64),
    Struct(Name),
    Union(Name),
    Named(Name),
    Code { args: Vec<Ty>, ret: Box<Ty> },
}

impl Ty {
    pub fn signed(width: u32) -> Self {
        Ty::Signed(width)
    }

    pub fn unsigned(width: u32) -> Self {
        Ty::Unsigned(width)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Pointer(_))
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Ty::Code { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float(_))
    }

    /// The bit width of a scalar type, if it has one.
    pub fn scalar_width(&self, pointer_width: u32) -> Option<u32> {
        match self {
            Ty::Bool => Some(1),
            Ty::Signed(w) | Ty::Unsigned(w) => Some(*w),
            Ty::Float(fp) => Some(fp.packed_width()),
            Ty::Pointer(_) => Some(pointer_width),
            _ => None,
        }
    }

    pub fn signedness(&self) -> Signedness {
        match self {
            Ty::Signed(_) => Signedness::Signed,
            _ => Signedness::Unsigned,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Not,
    And,
    Or,
    Implies,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Bvnot,
    Bvand,
    Bvor,
    Bvxor,
    Shl,
    Lshr,
    Ashr,
    /// Pointer arithmetic: base pointer plus a byte offset.
    PtrAdd,
    /// True when both pointer operands address the same object.
    SameObject,
    /// The byte offset component of a pointer value.
    PtrOffset,
    FpAdd(RoundingMode),
    FpSub(RoundingMode),
    FpMul(RoundingMode),
    FpDiv(RoundingMode),
    FpSqrt(RoundingMode),
    FpNeg,
    FpAbs,
    FpEq,
    FpLt,
    FpLe,
    FpGt,
    FpGe,
    FpIsNan,
    FpIsInf,
    FpIsZero,
    FpIsNormal,
    FpIsDenormal,
}

/// Object numbers for the two distinguished pointer targets. Every
/// other object gets a number above these from the executor's object
/// registry.
pub const NULL_OBJECT: u32 = 0;
pub const INVALID_OBJECT: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exp<A> {
    Id(A),
    Bool(bool),
    Bits(B64, Signedness),
    /// A floating-point literal, stored packed.
    FloatBits(B64, FpTy),
    /// A nondeterministic value. The counter is zero in input programs;
    /// the executor freshens it so each evaluation is a distinct symbol.
    Nondet(Ty, u32),
    /// A concrete pointer value: an object number from the executor's
    /// registry and a byte offset.
    Pointer { object: u32, offset: Box<Exp<A>> },
    AddrOf(Box<Exp<A>>),
    Deref(Box<Exp<A>>),
    Index(Box<Exp<A>>, Box<Exp<A>>),
    Field(Box<Exp<A>>, Name),
    Ite(Box<Exp<A>>, Box<Exp<A>>, Box<Exp<A>>),
    Cast(Ty, Box<Exp<A>>),
    /// A copy of an array value with one element replaced.
    With(Box<Exp<A>>, Box<Exp<A>>, Box<Exp<A>>),
    /// A copy of a struct value with one field replaced.
    WithField(Box<Exp<A>>, Name, Box<Exp<A>>),
    /// The value read through an invalid dereference. Always shadowed by
    /// a failed pointer-validity assertion on the same path.
    Invalid(Ty),
    Call(Op, Vec<Exp<A>>),
}

impl<A> Exp<A> {
    pub fn null() -> Self {
        Exp::Pointer { object: NULL_OBJECT, offset: Box::new(Exp::Bits(B64::zeros(64), Signedness::Unsigned)) }
    }

    pub fn bool_not(self) -> Self {
        match self {
            Exp::Bool(b) => Exp::Bool(!b),
            Exp::Call(Op::Not, mut args) if args.len() == 1 => args.pop().unwrap(),
            exp => Exp::Call(Op::Not, vec![exp]),
        }
    }

    /// A number abstractly representing how 'big' an expression is,
    /// used to decide whether constant propagation is worthwhile.
    pub fn size_heuristic(&self) -> usize {
        use Exp::*;
        match self {
            Call(_, exps) => 1 + exps.iter().map(Exp::size_heuristic).sum::<usize>(),
            AddrOf(exp) | Deref(exp) | Cast(_, exp) | Field(exp, _) => 1 + exp.size_heuristic(),
            Pointer { offset, .. } => 1 + offset.size_heuristic(),
            Index(lhs, rhs) => 1 + lhs.size_heuristic() + rhs.size_heuristic(),
            Ite(c, t, e) | With(c, t, e) => 1 + c.size_heuristic() + t.size_heuristic() + e.size_heuristic(),
            WithField(base, _, value) => 1 + base.size_heuristic() + value.size_heuristic(),
            _ => 1,
        }
    }
}

impl<A: Hash + Eq + Clone> Exp<A> {
    pub fn collect_ids(&self, ids: &mut HashSet<A>) {
        use Exp::*;
        match self {
            Id(id) => {
                ids.insert(id.clone());
            }
            Bool(_) | Bits(..) | FloatBits(..) | Nondet(..) | Invalid(_) => (),
            Pointer { offset, .. } => offset.collect_ids(ids),
            AddrOf(exp) | Deref(exp) | Cast(_, exp) | Field(exp, _) => exp.collect_ids(ids),
            Index(lhs, rhs) => {
                lhs.collect_ids(ids);
                rhs.collect_ids(ids);
            }
            Ite(c, t, e) | With(c, t, e) => {
                c.collect_ids(ids);
                t.collect_ids(ids);
                e.collect_ids(ids);
            }
            WithField(base, _, value) => {
                base.collect_ids(ids);
                value.collect_ids(ids);
            }
            Call(_, exps) => exps.iter().for_each(|exp| exp.collect_ids(ids)),
        }
    }

    /// Rebuild the expression with every `Id` leaf replaced by whatever
    /// expression `f` maps it to. This is how both renaming levels and
    /// constant substitution are applied.
    pub fn map_ids<B, E, F>(&self, f: &mut F) -> Result<Exp<B>, E>
    where
        F: FnMut(&A) -> Result<Exp<B>, E>,
    {
        use Exp::*;
        Ok(match self {
            Id(id) => f(id)?,
            Bool(b) => Bool(*b),
            Bits(bv, sg) => Bits(*bv, *sg),
            FloatBits(bv, fp) => FloatBits(*bv, *fp),
            Nondet(ty, n) => Nondet(ty.clone(), *n),
            Invalid(ty) => Invalid(ty.clone()),
            Pointer { object, offset } => Pointer { object: *object, offset: Box::new(offset.map_ids(f)?) },
            AddrOf(exp) => AddrOf(Box::new(exp.map_ids(f)?)),
            Deref(exp) => Deref(Box::new(exp.map_ids(f)?)),
            Cast(ty, exp) => Cast(ty.clone(), Box::new(exp.map_ids(f)?)),
            Field(exp, field) => Field(Box::new(exp.map_ids(f)?), *field),
            Index(lhs, rhs) => Index(Box::new(lhs.map_ids(f)?), Box::new(rhs.map_ids(f)?)),
            Ite(c, t, e) => Ite(Box::new(c.map_ids(f)?), Box::new(t.map_ids(f)?), Box::new(e.map_ids(f)?)),
            With(base, index, value) => With(
                Box::new(base.map_ids(f)?),
                Box::new(index.map_ids(f)?),
                Box::new(value.map_ids(f)?),
            ),
            WithField(base, field, value) => {
                WithField(Box::new(base.map_ids(f)?), *field, Box::new(value.map_ids(f)?))
            }
            Call(op, exps) => {
                Call(*op, exps.iter().map(|exp| exp.map_ids(f)).collect::<Result<_, _>>()?)
            }
        })
    }
}

pub fn short_circuit_and<A>(lhs: Exp<A>, rhs: Exp<A>) -> Exp<A> {
    match (lhs, rhs) {
        (Exp::Bool(false), _) => Exp::Bool(false),
        (_, Exp::Bool(false)) => Exp::Bool(false),
        (Exp::Bool(true), rhs) => rhs,
        (lhs, Exp::Bool(true)) => lhs,
        (lhs, rhs) => Exp::Call(Op::And, vec![lhs, rhs]),
    }
}

fn negation_pair<A: PartialEq>(lhs: &Exp<A>, rhs: &Exp<A>) -> bool {
    match (lhs, rhs) {
        (Exp::Call(Op::Not, args), _) if args.len() == 1 => args[0] == *rhs,
        (_, Exp::Call(Op::Not, args)) if args.len() == 1 => args[0] == *lhs,
        _ => false,
    }
}

pub fn short_circuit_or<A>(lhs: Exp<A>, rhs: Exp<A>) -> Exp<A> {
    match (lhs, rhs) {
        (Exp::Bool(true), _) => Exp::Bool(true),
        (_, Exp::Bool(true)) => Exp::Bool(true),
        (Exp::Bool(false), rhs) => rhs,
        (lhs, Exp::Bool(false)) => lhs,
        (lhs, rhs) => Exp::Call(Op::Or, vec![lhs, rhs]),
    }
}

impl<A: Hash + Eq + Clone + PartialEq> Exp<A> {
    /// Bottom-up constant folding. Only rewrites that are sound for any
    /// identifier valuation are applied; in particular division by a
    /// zero literal is left alone so the corresponding obligation still
    /// reaches the solver.
    pub fn simplify(self) -> Self {
        use Exp::*;
        use Signedness::*;
        match self {
            Call(op, exps) => {
                let exps: Vec<Exp<A>> = exps.into_iter().map(Exp::simplify).collect();
                match (op, exps.as_slice()) {
                    (Op::Not, [Bool(b)]) => Bool(!b),
                    (Op::And, [lhs, rhs]) if negation_pair(lhs, rhs) => Bool(false),
                    (Op::And, [lhs, rhs]) => short_circuit_and(lhs.clone(), rhs.clone()),
                    (Op::Or, [lhs, rhs]) if negation_pair(lhs, rhs) => Bool(true),
                    (Op::Or, [lhs, rhs]) => short_circuit_or(lhs.clone(), rhs.clone()),
                    (Op::Implies, [Bool(false), _]) => Bool(true),
                    (Op::Implies, [Bool(true), rhs]) => rhs.clone(),
                    (Op::Eq, [lhs, rhs]) if lhs == rhs => Bool(true),
                    (Op::Eq, [Bits(x, _), Bits(y, _)]) => Bool(x == y),
                    (Op::Neq, [Bits(x, _), Bits(y, _)]) => Bool(x != y),
                    (Op::Lt, [Bits(x, Signed), Bits(y, Signed)]) => Bool(x.signed() < y.signed()),
                    (Op::Lt, [Bits(x, Unsigned), Bits(y, Unsigned)]) => Bool(x.unsigned() < y.unsigned()),
                    (Op::Le, [Bits(x, Signed), Bits(y, Signed)]) => Bool(x.signed() <= y.signed()),
                    (Op::Le, [Bits(x, Unsigned), Bits(y, Unsigned)]) => Bool(x.unsigned() <= y.unsigned()),
                    (Op::Gt, [Bits(x, Signed), Bits(y, Signed)]) => Bool(x.signed() > y.signed()),
                    (Op::Gt, [Bits(x, Unsigned), Bits(y, Unsigned)]) => Bool(x.unsigned() > y.unsigned()),
                    (Op::Ge, [Bits(x, Signed), Bits(y, Signed)]) => Bool(x.signed() >= y.signed()),
                    (Op::Ge, [Bits(x, Unsigned), Bits(y, Unsigned)]) => Bool(x.unsigned() >= y.unsigned()),
                    (Op::Add, [Bits(x, sg), Bits(y, _)]) => Bits(*x + *y, *sg),
                    (Op::Sub, [Bits(x, sg), Bits(y, _)]) => Bits(*x - *y, *sg),
                    (Op::Mul, [Bits(x, sg), Bits(y, _)]) => Bits(x.mul(*y), *sg),
                    (Op::Neg, [Bits(x, sg)]) => Bits(-*x, *sg),
                    (Op::Bvnot, [Bits(x, sg)]) => Bits(!*x, *sg),
                    (Op::Bvand, [Bits(x, sg), Bits(y, _)]) => Bits(*x & *y, *sg),
                    (Op::Bvor, [Bits(x, sg), Bits(y, _)]) => Bits(*x | *y, *sg),
                    (Op::Bvxor, [Bits(x, sg), Bits(y, _)]) => Bits(*x ^ *y, *sg),
                    (Op::Shl, [Bits(x, sg), Bits(y, _)]) => Bits(*x << *y, *sg),
                    (Op::Lshr, [Bits(x, sg), Bits(y, _)]) => Bits(*x >> *y, *sg),
                    (Op::SameObject, [Pointer { object: a, .. }, Pointer { object: b, .. }]) => {
                        Bool(a == b)
                    }
                    (Op::PtrOffset, [Pointer { offset, .. }]) => (**offset).clone(),
                    (Op::PtrAdd, [Pointer { object, offset }, delta @ Bits(..)]) => Pointer {
                        object: *object,
                        offset: Box::new(
                            Call(Op::Add, vec![(**offset).clone(), delta.clone()]).simplify(),
                        ),
                    },
                    _ => Call(op, exps),
                }
            }
            Ite(c, t, e) => {
                let c = c.simplify();
                match c {
                    Bool(true) => t.simplify(),
                    Bool(false) => e.simplify(),
                    c => Ite(Box::new(c), Box::new(t.simplify()), Box::new(e.simplify())),
                }
            }
            Cast(ty, exp) => {
                let exp = exp.simplify();
                match (&ty, &exp) {
                    // sign- or zero-extension follows the source type
                    (Ty::Signed(w), Bits(bv, Signed)) if *w <= 64 => {
                        Bits(B64::from_i64(bv.signed() as i64, *w), Signed)
                    }
                    (Ty::Signed(w), Bits(bv, Unsigned)) if *w <= 64 => {
                        Bits(B64::truncated(bv.lower_u64(), *w), Signed)
                    }
                    (Ty::Unsigned(w), Bits(bv, Unsigned)) if *w <= 64 => {
                        Bits(B64::truncated(bv.lower_u64(), *w), Unsigned)
                    }
                    (Ty::Unsigned(w), Bits(bv, Signed)) if *w <= 64 => {
                        Bits(B64::from_i64(bv.signed() as i64, *w), Unsigned)
                    }
                    _ => Cast(ty, Box::new(exp)),
                }
            }
            exp => exp,
        }
    }

    pub fn is_constant(&self) -> bool {
        use Exp::*;
        match self {
            Bool(_) | Bits(..) | FloatBits(..) => true,
            Pointer { offset, .. } => offset.is_constant(),
            _ => false,
        }
    }
}

/// A stable identifier for an instruction, unique across the whole
/// program. Unwind counters and pending merge states are keyed on
/// these, never on instruction indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrId(pub u32);

impl InstrId {
    pub const INVALID: InstrId = InstrId(u32::MAX);
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InstrKind {
    Assign(Exp<Name>, Exp<Name>),
    Assume(Exp<Name>),
    Assert(Exp<Name>, String),
    Goto { target: usize, cond: Option<Exp<Name>> },
    FunctionCall { lhs: Option<Exp<Name>>, function: Exp<Name>, args: Vec<Exp<Name>> },
    Return(Option<Exp<Name>>),
    Decl(Name, Ty),
    Dead(Name),
    Skip,
    EndFunction,
    Throw(Name, Option<Exp<Name>>),
    /// A non-empty map installs handlers on the current frame, an empty
    /// one removes the most recently installed set.
    Catch(Vec<(Name, usize)>),
    ThrowDecl(Vec<Name>),
    AtomicBegin,
    AtomicEnd,
    StartThread(Name),
    EndThread,
    Output(Vec<Exp<Name>>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    pub kind: InstrKind,
    pub id: InstrId,
    pub loc: SourceLoc,
}

impl Instr {
    pub fn new(kind: InstrKind) -> Self {
        Instr { kind, id: InstrId::INVALID, loc: SourceLoc::unknown() }
    }

    pub fn at(kind: InstrKind, loc: SourceLoc) -> Self {
        Instr { kind, id: InstrId::INVALID, loc }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub name: Name,
    pub params: Vec<(Name, Ty)>,
    pub ret_ty: Ty,
    pub body: Vec<Instr>,
}

impl Function {
    /// Index of the function's `EndFunction` instruction, the implicit
    /// target of every `Return`.
    pub fn end_index(&self) -> usize {
        self.body
            .iter()
            .position(|i| matches!(i.kind, InstrKind::EndFunction))
            .unwrap_or_else(|| self.body.len().saturating_sub(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub functions: HashMap<Name, Function, ahash::RandomState>,
    pub globals: Vec<(Name, Ty)>,
    pub entry: Name,
    pub files: Vec<String>,
}

impl Program {
    pub fn new(entry: Name) -> Self {
        Program { functions: HashMap::default(), globals: Vec::new(), entry, files: Vec::new() }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name, function);
    }

    pub fn function(&self, name: Name) -> Option<&Function> {
        self.functions.get(&name)
    }

    pub fn is_global(&self, name: Name) -> bool {
        self.globals.iter().any(|(g, _)| *g == name)
    }

    pub fn global_ty(&self, name: Name) -> Option<&Ty> {
        self.globals.iter().find(|(g, _)| *g == name).map(|(_, ty)| ty)
    }

    /// Assign each instruction a program-wide stable id. Functions are
    /// visited in name order so ids are deterministic across runs.
    pub fn assign_ids(&mut self) {
        let mut next = 0u32;
        let mut names: Vec<Name> = self.functions.keys().copied().collect();
        names.sort();
        for name in names {
            if let Some(function) = self.functions.get_mut(&name) {
                for instr in function.body.iter_mut() {
                    instr.id = InstrId(next);
                    next += 1;
                }
            }
        }
    }

    /// Function names referenced anywhere in a body, used by the
    /// prelinked-library fixed point.
    pub fn referenced_symbols(&self) -> HashSet<Name> {
        let mut refs = HashSet::new();
        for function in self.functions.values() {
            for instr in &function.body {
                collect_instr_ids(&instr.kind, &mut refs);
            }
        }
        refs
    }
}

pub fn collect_instr_ids(kind: &InstrKind, ids: &mut HashSet<Name>) {
    use InstrKind::*;
    match kind {
        Assign(lhs, rhs) => {
            lhs.collect_ids(ids);
            rhs.collect_ids(ids);
        }
        Assume(cond) | Assert(cond, _) => cond.collect_ids(ids),
        Goto { cond: Some(cond), .. } => cond.collect_ids(ids),
        FunctionCall { lhs, function, args } => {
            if let Some(lhs) = lhs {
                lhs.collect_ids(ids)
            }
            function.collect_ids(ids);
            args.iter().for_each(|arg| arg.collect_ids(ids));
        }
        Return(Some(exp)) => exp.collect_ids(ids),
        Throw(_, Some(exp)) => exp.collect_ids(ids),
        StartThread(f) => {
            ids.insert(*f);
        }
        Output(args) => args.iter().for_each(|arg| arg.collect_ids(ids)),
        _ => (),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TypeDef {
    Struct(Vec<(Name, Ty)>),
    Union(Vec<(Name, Ty)>),
    Alias(Ty),
}

/// Resolves struct/union/typedef names to their layout. Queried by the
/// value-set tracker and by pointer dereference expansion.
#[derive(Clone, Debug)]
pub struct TypeNamespace {
    pub types: HashMap<Name, TypeDef, ahash::RandomState>,
    pub pointer_width: u32,
}

impl TypeNamespace {
    pub fn new(pointer_width: u32) -> Self {
        TypeNamespace { types: HashMap::default(), pointer_width }
    }

    pub fn resolve<'a>(&'a self, ty: &'a Ty) -> &'a Ty {
        match ty {
            Ty::Named(name) => match self.types.get(name) {
                Some(TypeDef::Alias(ty)) => self.resolve(ty),
                _ => ty,
            },
            _ => ty,
        }
    }

    pub fn fields(&self, name: Name) -> Option<&[(Name, Ty)]> {
        match self.types.get(&name) {
            Some(TypeDef::Struct(fields)) | Some(TypeDef::Union(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Size in bytes, C-style: scalars round up to whole bytes, arrays
    /// multiply out, structs are laid out with natural alignment.
    pub fn size_of(&self, ty: &Ty) -> Option<u64> {
        match self.resolve(ty) {
            Ty::Empty => Some(0),
            Ty::Bool => Some(1),
            Ty::Signed(w) | Ty::Unsigned(w) => Some(u64::from((w + 7) / 8)),
            Ty::Float(fp) => Some(u64::from((fp.packed_width() + 7) / 8)),
            Ty::Pointer(_) | Ty::Code { .. } => Some(u64::from(self.pointer_width / 8)),
            Ty::Array(elem, n) => Some(self.size_of(elem)? * n),
            Ty::Struct(name) => {
                let mut offset = 0;
                let mut align = 1;
                for (_, field_ty) in self.fields(*name)? {
                    let sz = self.size_of(field_ty)?;
                    let a = self.align_of(field_ty)?;
                    offset = round_up(offset, a) + sz;
                    align = align.max(a);
                }
                Some(round_up(offset, align))
            }
            Ty::Union(name) => {
                let mut size = 0;
                let mut align = 1;
                for (_, field_ty) in self.fields(*name)? {
                    size = size.max(self.size_of(field_ty)?);
                    align = align.max(self.align_of(field_ty)?);
                }
                Some(round_up(size, align))
            }
            Ty::Named(_) => None,
        }
    }

    fn align_of(&self, ty: &Ty) -> Option<u64> {
        match self.resolve(ty) {
            Ty::Array(elem, _) => self.align_of(elem),
            Ty::Struct(name) | Ty::Union(name) => {
                let mut align = 1;
                for (_, field_ty) in self.fields(*name)? {
                    align = align.max(self.align_of(field_ty)?);
                }
                Some(align)
            }
            ty => Some(self.size_of(ty)?.clamp(1, 8)),
        }
    }

    pub fn offset_of(&self, struct_name: Name, field: Name) -> Option<u64> {
        let mut offset = 0;
        for (name, field_ty) in self.fields(struct_name)? {
            let a = self.align_of(field_ty)?;
            offset = round_up(offset, a);
            if *name == field {
                return Some(offset);
            }
            offset += self.size_of(field_ty)?;
        }
        None
    }

    pub fn field_ty(&self, name: Name, field: Name) -> Option<&Ty> {
        self.fields(name)?.iter().find(|(f, _)| *f == field).map(|(_, ty)| ty)
    }
}

fn round_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        offset
    } else {
        (offset + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symtab_reserved() {
        let mut symtab = Symtab::new();
        assert_eq!(symtab.get("main"), Some(MAIN));
        assert_eq!(symtab.intern("foo"), symtab.intern("foo"));
        assert_ne!(symtab.intern("foo"), symtab.intern("bar"));
        let foo = symtab.intern("foo");
        assert_eq!(symtab.to_str(foo), "foo");
    }

    #[test]
    fn test_simplify_arith() {
        use Exp::*;
        use Signedness::*;
        let one: Exp<Name> = Bits(B64::new(1, 32), Signed);
        let two: Exp<Name> = Bits(B64::new(2, 32), Signed);
        let minus_one: Exp<Name> = Bits(B64::ones(32), Signed);
        assert_eq!(Call(Op::Add, vec![one.clone(), two.clone()]).simplify(), Bits(B64::new(3, 32), Signed));
        assert_eq!(Call(Op::Lt, vec![one.clone(), two.clone()]).simplify(), Bool(true));
        assert_eq!(Call(Op::Lt, vec![minus_one, one]).simplify(), Bool(true));
        let umax: Exp<Name> = Bits(B64::ones(32), Unsigned);
        let uone: Exp<Name> = Bits(B64::new(1, 32), Unsigned);
        assert_eq!(Call(Op::Lt, vec![umax, uone]).simplify(), Bool(false));
    }

    #[test]
    fn test_simplify_ite_and_guards() {
        use Exp::*;
        let x: Exp<Name> = Id(Name::from_u32(40));
        let ite = Ite(Box::new(Bool(true)), Box::new(x.clone()), Box::new(Bool(false)));
        assert_eq!(ite.simplify(), x.clone());
        assert_eq!(short_circuit_and(Bool(true), x.clone()), x);
        assert_eq!(short_circuit_or::<Name>(Bool(true), Id(Name::from_u32(41))), Bool(true));
    }

    #[test]
    fn test_struct_layout() {
        let mut symtab = Symtab::new();
        let s = symtab.intern("pair");
        let a = symtab.intern("a");
        let b = symtab.intern("b");
        let mut ns = TypeNamespace::new(64);
        ns.types.insert(s, TypeDef::Struct(vec![(a, Ty::Signed(8)), (b, Ty::Signed(32))]));
        assert_eq!(ns.offset_of(s, a), Some(0));
        assert_eq!(ns.offset_of(s, b), Some(4));
        assert_eq!(ns.size_of(&Ty::Struct(s)), Some(8));
        assert_eq!(ns.size_of(&Ty::Array(Box::new(Ty::Signed(32)), 4)), Some(16));
    }
}
