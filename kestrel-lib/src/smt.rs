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

//! The SMT layer. Terms live in an arena ([TermArena]) and are
//! identified by [TermId] indices; nodes are immutable and
//! structurally interned, so equal subterms share one id. The arena
//! folds constants at construction time, which keeps the formulas the
//! floating-point encoder emits small and makes encoder outputs on
//! concrete inputs directly testable.
//!
//! The [SmtCtx] trait is the minimal abstract factory the encoder and
//! the trace lowering consume; the arena is its only in-tree
//! implementation, with solver adapters reading the finished terms.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::collections::HashMap;
use std::fmt;

pub mod convert;
pub mod fp;
pub mod solver;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    BitVec(u32),
    /// A packed floating-point sort: an alias for a bit-vector of
    /// width `1 + ebits + (sbits - 1)` that remembers its field split.
    Float { ebits: u32, sbits: u32 },
}

impl Sort {
    pub fn is_bool(self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Width of the underlying bit-vector representation.
    pub fn data_width(self) -> u32 {
        match self {
            Sort::Bool => 1,
            Sort::BitVec(w) => w,
            Sort::Float { ebits, sbits } => 1 + ebits + (sbits - 1),
        }
    }

    pub fn exponent_width(self) -> u32 {
        match self {
            Sort::Float { ebits, .. } => ebits,
            _ => panic!("exponent_width on non-float sort"),
        }
    }

    /// Significand width including the implicit leading bit.
    pub fn significand_width(self) -> u32 {
        match self {
            Sort::Float { sbits, .. } => sbits,
            _ => panic!("significand_width on non-float sort"),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {})", w),
            Sort::Float { .. } => write!(f, "(_ BitVec {})", self.data_width()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FuncKind {
    Eq,
    Not,
    And,
    Or,
    Xor,
    Bvadd,
    Bvsub,
    Bvmul,
    Bvudiv,
    Bvsdiv,
    Bvurem,
    Bvsrem,
    Bvshl,
    Bvlshr,
    Bvashr,
    Bvand,
    Bvor,
    Bvxor,
    Bvnot,
    Bvneg,
    Bvult,
    Bvule,
    Bvslt,
    Bvsle,
    Concat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(index: usize) -> Self {
        TermId(index as u32)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermKind {
    Bool(bool),
    Bits(BigUint),
    Symbol(String),
    Extract(u32, u32, TermId),
    ZeroExtend(u32, TermId),
    SignExtend(u32, TermId),
    Ite(TermId, TermId, TermId),
    /// Identity at the bit level; only the sort changes. Used to move
    /// between a float sort and its underlying bit-vector sort.
    Reinterpret(TermId),
    App(FuncKind, Vec<TermId>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Term {
    pub kind: TermKind,
    pub sort: Sort,
}

/// The abstract SMT construction interface. Pure: constructed nodes
/// are immutable and structurally interned by the implementation.
pub trait SmtCtx {
    fn mk_bv_sort(&self, signed: bool, width: u32) -> Sort;
    fn mk_bool_sort(&self) -> Sort;
    fn mk_fp_sort(&self, ebits: u32, sbits: u32) -> Sort;
    fn mk_smt_bv(&mut self, sort: Sort, value: BigInt) -> TermId;
    fn mk_smt_bool(&mut self, b: bool) -> TermId;
    fn mk_smt_symbol(&mut self, name: &str, sort: Sort) -> TermId;
    fn mk_extract(&mut self, x: TermId, hi: u32, lo: u32) -> TermId;
    fn mk_concat(&mut self, a: TermId, b: TermId) -> TermId;
    fn mk_zero_ext(&mut self, x: TermId, extra: u32) -> TermId;
    fn mk_sign_ext(&mut self, x: TermId, extra: u32) -> TermId;
    fn mk_bvredor(&mut self, x: TermId) -> TermId;
    fn mk_bvredand(&mut self, x: TermId) -> TermId;
    fn mk_ite(&mut self, cond: TermId, t: TermId, e: TermId) -> TermId;
    fn mk_func_app(&mut self, sort: Sort, kind: FuncKind, args: &[TermId]) -> TermId;
    fn sort_of(&self, t: TermId) -> Sort;
    /// Reinterpret a bit-vector term at a float sort of the same data
    /// width, or back again.
    fn mk_reinterpret(&mut self, x: TermId, sort: Sort) -> TermId;
}

#[derive(Default)]
pub struct TermArena {
    terms: Vec<Term>,
    intern: HashMap<Term, TermId, ahash::RandomState>,
}

fn mask(width: u32) -> BigUint {
    (BigUint::one() << width) - BigUint::one()
}

fn to_unsigned(value: &BigInt, width: u32) -> BigUint {
    let modulus = BigInt::one() << width;
    let mut v = value % &modulus;
    if v.sign() == Sign::Minus {
        v += &modulus;
    }
    v.to_biguint().unwrap()
}

fn to_signed(value: &BigUint, width: u32) -> BigInt {
    let v = BigInt::from(value.clone());
    if width > 0 && value.bit(u64::from(width - 1)) {
        v - (BigInt::one() << width)
    } else {
        v
    }
}

impl TermArena {
    pub fn new() -> Self {
        TermArena::default()
    }

    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn intern(&mut self, term: Term) -> TermId {
        if let Some(id) = self.intern.get(&term) {
            return *id;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term.clone());
        self.intern.insert(term, id);
        id
    }

    pub fn as_bool(&self, id: TermId) -> Option<bool> {
        match &self.term(id).kind {
            TermKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bits(&self, id: TermId) -> Option<&BigUint> {
        match &self.term(id).kind {
            TermKind::Bits(bits) => Some(bits),
            TermKind::Reinterpret(inner) => self.as_bits(*inner),
            _ => None,
        }
    }

    fn mk_bits(&mut self, bits: BigUint, sort: Sort) -> TermId {
        debug_assert!(bits <= mask(sort.data_width()));
        self.intern(Term { kind: TermKind::Bits(bits), sort })
    }

    fn fold_app(&mut self, sort: Sort, kind: FuncKind, args: &[TermId]) -> Option<TermId> {
        use FuncKind::*;
        match kind {
            Not => {
                let b = self.as_bool(args[0])?;
                Some(self.mk_smt_bool(!b))
            }
            And | Or | Xor if self.term(args[0]).sort.is_bool() => {
                let lhs = self.as_bool(args[0]);
                let rhs = self.as_bool(args[1]);
                match (kind, lhs, rhs) {
                    (And, Some(false), _) | (And, _, Some(false)) => Some(self.mk_smt_bool(false)),
                    (And, Some(true), _) => Some(args[1]),
                    (And, _, Some(true)) => Some(args[0]),
                    (Or, Some(true), _) | (Or, _, Some(true)) => Some(self.mk_smt_bool(true)),
                    (Or, Some(false), _) => Some(args[1]),
                    (Or, _, Some(false)) => Some(args[0]),
                    (Xor, Some(a), Some(b)) => Some(self.mk_smt_bool(a != b)),
                    _ => None,
                }
            }
            Eq => {
                if args[0] == args[1] {
                    return Some(self.mk_smt_bool(true));
                }
                if let (Some(a), Some(b)) = (self.as_bool(args[0]), self.as_bool(args[1])) {
                    return Some(self.mk_smt_bool(a == b));
                }
                let (a, b) = (self.as_bits(args[0])?.clone(), self.as_bits(args[1])?.clone());
                Some(self.mk_smt_bool(a == b))
            }
            Bvult | Bvule | Bvslt | Bvsle => {
                let w = self.term(args[0]).sort.data_width();
                let a = self.as_bits(args[0])?.clone();
                let b = self.as_bits(args[1])?.clone();
                let result = match kind {
                    Bvult => a < b,
                    Bvule => a <= b,
                    Bvslt => to_signed(&a, w) < to_signed(&b, w),
                    Bvsle => to_signed(&a, w) <= to_signed(&b, w),
                    _ => unreachable!(),
                };
                Some(self.mk_smt_bool(result))
            }
            Bvnot | Bvneg => {
                let w = sort.data_width();
                let a = self.as_bits(args[0])?.clone();
                let result = match kind {
                    Bvnot => mask(w) ^ &a,
                    Bvneg => (&mask(w) - &a + BigUint::one()) & mask(w),
                    _ => unreachable!(),
                };
                Some(self.mk_bits(result, sort))
            }
            Concat => {
                let low_w = self.term(args[1]).sort.data_width();
                let a = self.as_bits(args[0])?.clone();
                let b = self.as_bits(args[1])?.clone();
                Some(self.mk_bits((a << low_w) | b, sort))
            }
            _ => {
                let w = sort.data_width();
                let a = self.as_bits(args[0])?.clone();
                let b = self.as_bits(args[1])?.clone();
                let result = match kind {
                    Bvadd => (a + b) & mask(w),
                    Bvsub => ((a + (mask(w) ^ &b)) + BigUint::one()) & mask(w),
                    Bvmul => (a * b) & mask(w),
                    // SMT-LIB division semantics on a zero divisor
                    Bvudiv => {
                        if b.is_zero() {
                            mask(w)
                        } else {
                            a / b
                        }
                    }
                    Bvurem => {
                        if b.is_zero() {
                            a
                        } else {
                            a % b
                        }
                    }
                    Bvsdiv => {
                        let (sa, sb) = (to_signed(&a, w), to_signed(&b, w));
                        let q = if sb.is_zero() {
                            if sa.sign() == Sign::Minus {
                                BigInt::one()
                            } else {
                                -BigInt::one()
                            }
                        } else {
                            // truncating division
                            &sa / &sb
                        };
                        to_unsigned(&q, w)
                    }
                    Bvsrem => {
                        let (sa, sb) = (to_signed(&a, w), to_signed(&b, w));
                        let r = if sb.is_zero() { sa } else { &sa % &sb };
                        to_unsigned(&r, w)
                    }
                    Bvand => a & b,
                    Bvor => a | b,
                    Bvxor => a ^ b,
                    Bvshl => {
                        let shift = b.clone();
                        if shift >= BigUint::from(w) {
                            BigUint::zero()
                        } else {
                            (a << u32::try_from(shift).unwrap()) & mask(w)
                        }
                    }
                    Bvlshr => {
                        let shift = b.clone();
                        if shift >= BigUint::from(w) {
                            BigUint::zero()
                        } else {
                            a >> u32::try_from(shift).unwrap()
                        }
                    }
                    Bvashr => {
                        let top = w > 0 && a.bit(u64::from(w - 1));
                        let shift = b.clone();
                        if shift >= BigUint::from(w) {
                            if top {
                                mask(w)
                            } else {
                                BigUint::zero()
                            }
                        } else {
                            let n = u32::try_from(shift).unwrap();
                            let fill = if top { mask(w) ^ mask(w - n) } else { BigUint::zero() };
                            (a >> n) | fill
                        }
                    }
                    _ => return None,
                };
                Some(self.mk_bits(result, sort))
            }
        }
    }
}

impl SmtCtx for TermArena {
    fn mk_bv_sort(&self, _signed: bool, width: u32) -> Sort {
        Sort::BitVec(width)
    }

    fn mk_bool_sort(&self) -> Sort {
        Sort::Bool
    }

    fn mk_fp_sort(&self, ebits: u32, sbits: u32) -> Sort {
        Sort::Float { ebits, sbits }
    }

    fn mk_smt_bv(&mut self, sort: Sort, value: BigInt) -> TermId {
        let bits = to_unsigned(&value, sort.data_width());
        self.mk_bits(bits, sort)
    }

    fn mk_smt_bool(&mut self, b: bool) -> TermId {
        self.intern(Term { kind: TermKind::Bool(b), sort: Sort::Bool })
    }

    fn mk_smt_symbol(&mut self, name: &str, sort: Sort) -> TermId {
        self.intern(Term { kind: TermKind::Symbol(name.to_string()), sort })
    }

    fn mk_extract(&mut self, x: TermId, hi: u32, lo: u32) -> TermId {
        let width = self.term(x).sort.data_width();
        assert!(lo <= hi && hi < width, "extract [{}:{}] of width {}", hi, lo, width);
        let sort = Sort::BitVec(hi - lo + 1);
        if let Some(bits) = self.as_bits(x) {
            let result = (bits >> lo) & mask(hi - lo + 1);
            return self.mk_bits(result, sort);
        }
        if hi + 1 == width && lo == 0 && matches!(self.term(x).sort, Sort::BitVec(_)) {
            return x;
        }
        self.intern(Term { kind: TermKind::Extract(hi, lo, x), sort })
    }

    fn mk_concat(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = Sort::BitVec(self.term(a).sort.data_width() + self.term(b).sort.data_width());
        match self.fold_app(sort, FuncKind::Concat, &[a, b]) {
            Some(id) => id,
            None => self.intern(Term { kind: TermKind::App(FuncKind::Concat, vec![a, b]), sort }),
        }
    }

    fn mk_zero_ext(&mut self, x: TermId, extra: u32) -> TermId {
        if extra == 0 {
            return x;
        }
        let sort = Sort::BitVec(self.term(x).sort.data_width() + extra);
        if let Some(bits) = self.as_bits(x) {
            let bits = bits.clone();
            return self.mk_bits(bits, sort);
        }
        self.intern(Term { kind: TermKind::ZeroExtend(extra, x), sort })
    }

    fn mk_sign_ext(&mut self, x: TermId, extra: u32) -> TermId {
        if extra == 0 {
            return x;
        }
        let width = self.term(x).sort.data_width();
        let sort = Sort::BitVec(width + extra);
        if let Some(bits) = self.as_bits(x) {
            let value = to_signed(bits, width);
            let result = to_unsigned(&value, width + extra);
            return self.mk_bits(result, sort);
        }
        self.intern(Term { kind: TermKind::SignExtend(extra, x), sort })
    }

    fn mk_bvredor(&mut self, x: TermId) -> TermId {
        if let Some(bits) = self.as_bits(x) {
            let result = !bits.is_zero();
            let bit = if result { BigUint::one() } else { BigUint::zero() };
            return self.mk_bits(bit, Sort::BitVec(1));
        }
        // encoded as x != 0
        let w = self.term(x).sort.data_width();
        let zero = self.mk_smt_bv(Sort::BitVec(w), BigInt::zero());
        let eq = self.mk_func_app(Sort::Bool, FuncKind::Eq, &[x, zero]);
        let ne = self.mk_func_app(Sort::Bool, FuncKind::Not, &[eq]);
        let one = self.mk_smt_bv(Sort::BitVec(1), BigInt::one());
        let nil = self.mk_smt_bv(Sort::BitVec(1), BigInt::zero());
        self.mk_ite(ne, one, nil)
    }

    fn mk_bvredand(&mut self, x: TermId) -> TermId {
        let w = self.term(x).sort.data_width();
        if let Some(bits) = self.as_bits(x) {
            let result = *bits == mask(w);
            let bit = if result { BigUint::one() } else { BigUint::zero() };
            return self.mk_bits(bit, Sort::BitVec(1));
        }
        let ones = self.mk_smt_bv(Sort::BitVec(w), BigInt::from(-1));
        let eq = self.mk_func_app(Sort::Bool, FuncKind::Eq, &[x, ones]);
        let one = self.mk_smt_bv(Sort::BitVec(1), BigInt::one());
        let nil = self.mk_smt_bv(Sort::BitVec(1), BigInt::zero());
        self.mk_ite(eq, one, nil)
    }

    fn mk_ite(&mut self, cond: TermId, t: TermId, e: TermId) -> TermId {
        assert!(self.term(cond).sort.is_bool());
        match self.as_bool(cond) {
            Some(true) => t,
            Some(false) => e,
            None if t == e => t,
            None => {
                let sort = self.term(t).sort;
                self.intern(Term { kind: TermKind::Ite(cond, t, e), sort })
            }
        }
    }

    fn mk_func_app(&mut self, sort: Sort, kind: FuncKind, args: &[TermId]) -> TermId {
        if let Some(id) = self.fold_app(sort, kind, args) {
            return id;
        }
        self.intern(Term { kind: TermKind::App(kind, args.to_vec()), sort })
    }

    fn sort_of(&self, t: TermId) -> Sort {
        self.term(t).sort
    }

    fn mk_reinterpret(&mut self, x: TermId, sort: Sort) -> TermId {
        let current = self.term(x).sort;
        if current == sort {
            return x;
        }
        assert_eq!(current.data_width(), sort.data_width());
        if let TermKind::Reinterpret(inner) = self.term(x).kind {
            if self.term(inner).sort == sort {
                return inner;
            }
        }
        self.intern(Term { kind: TermKind::Reinterpret(x), sort })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(ctx: &mut TermArena, value: i64, width: u32) -> TermId {
        ctx.mk_smt_bv(Sort::BitVec(width), BigInt::from(value))
    }

    #[test]
    fn test_interning_shares_structure() {
        let mut ctx = TermArena::new();
        let x = ctx.mk_smt_symbol("x", Sort::BitVec(8));
        let y = ctx.mk_smt_symbol("x", Sort::BitVec(8));
        assert_eq!(x, y);
        let a = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvadd, &[x, y]);
        let b = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvadd, &[x, y]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_arith_folding() {
        let mut ctx = TermArena::new();
        let a = bv(&mut ctx, 200, 8);
        let b = bv(&mut ctx, 100, 8);
        let sum = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvadd, &[a, b]);
        assert_eq!(ctx.as_bits(sum), Some(&BigUint::from(44u32)));
        let diff = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvsub, &[b, a]);
        assert_eq!(ctx.as_bits(diff), Some(&BigUint::from(156u32)));
        let neg = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvneg, &[b]);
        assert_eq!(ctx.as_bits(neg), Some(&BigUint::from(156u32)));
    }

    #[test]
    fn test_division_by_zero_semantics() {
        let mut ctx = TermArena::new();
        let a = bv(&mut ctx, 7, 8);
        let z = bv(&mut ctx, 0, 8);
        let udiv = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvudiv, &[a, z]);
        assert_eq!(ctx.as_bits(udiv), Some(&BigUint::from(255u32)));
        let urem = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvurem, &[a, z]);
        assert_eq!(ctx.as_bits(urem), Some(&BigUint::from(7u32)));
        let neg = bv(&mut ctx, -7, 8);
        let sdiv = ctx.mk_func_app(Sort::BitVec(8), FuncKind::Bvsdiv, &[neg, z]);
        assert_eq!(ctx.as_bits(sdiv), Some(&BigUint::from(1u32)));
    }

    #[test]
    fn test_signed_comparison_folding() {
        let mut ctx = TermArena::new();
        let minus_one = bv(&mut ctx, -1, 8);
        let one = bv(&mut ctx, 1, 8);
        let slt = ctx.mk_func_app(Sort::Bool, FuncKind::Bvslt, &[minus_one, one]);
        assert_eq!(ctx.as_bool(slt), Some(true));
        let ult = ctx.mk_func_app(Sort::Bool, FuncKind::Bvult, &[minus_one, one]);
        assert_eq!(ctx.as_bool(ult), Some(false));
    }

    #[test]
    fn test_extract_concat_extend() {
        let mut ctx = TermArena::new();
        let a = bv(&mut ctx, 0b1101, 4);
        let hi = ctx.mk_extract(a, 3, 2);
        assert_eq!(ctx.as_bits(hi), Some(&BigUint::from(0b11u32)));
        let b = bv(&mut ctx, 0b01, 2);
        let cat = ctx.mk_concat(hi, b);
        assert_eq!(ctx.as_bits(cat), Some(&BigUint::from(0b1101u32)));
        assert_eq!(ctx.sort_of(cat), Sort::BitVec(4));
        let sext = ctx.mk_sign_ext(a, 4);
        assert_eq!(ctx.as_bits(sext), Some(&BigUint::from(0b1111_1101u32)));
        let zext = ctx.mk_zero_ext(a, 4);
        assert_eq!(ctx.as_bits(zext), Some(&BigUint::from(0b1101u32)));
    }

    #[test]
    fn test_reductions() {
        let mut ctx = TermArena::new();
        let zero = bv(&mut ctx, 0, 4);
        let ones = bv(&mut ctx, 0b1111, 4);
        let some = bv(&mut ctx, 0b0100, 4);
        let redor_zero = ctx.mk_bvredor(zero);
        let redor_some = ctx.mk_bvredor(some);
        let redand_ones = ctx.mk_bvredand(ones);
        let redand_some = ctx.mk_bvredand(some);
        assert_eq!(ctx.as_bits(redor_zero), Some(&BigUint::zero()));
        assert_eq!(ctx.as_bits(redor_some), Some(&BigUint::one()));
        assert_eq!(ctx.as_bits(redand_ones), Some(&BigUint::one()));
        assert_eq!(ctx.as_bits(redand_some), Some(&BigUint::zero()));
    }

    #[test]
    fn test_ite_folding() {
        let mut ctx = TermArena::new();
        let t = ctx.mk_smt_bool(true);
        let a = bv(&mut ctx, 1, 8);
        let b = bv(&mut ctx, 2, 8);
        assert_eq!(ctx.mk_ite(t, a, b), a);
        let c = ctx.mk_smt_symbol("c", Sort::Bool);
        assert_eq!(ctx.mk_ite(c, a, a), a);
    }

    #[test]
    fn test_reinterpret_round_trip() {
        let mut ctx = TermArena::new();
        let fp32 = ctx.mk_fp_sort(8, 24);
        assert_eq!(fp32.data_width(), 32);
        let x = ctx.mk_smt_symbol("x", Sort::BitVec(32));
        let as_fp = ctx.mk_reinterpret(x, fp32);
        assert_eq!(ctx.sort_of(as_fp), fp32);
        let back = ctx.mk_reinterpret(as_fp, Sort::BitVec(32));
        assert_eq!(back, x);
    }
}
