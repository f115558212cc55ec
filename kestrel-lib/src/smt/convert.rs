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

//! Lowering from the equation trace to SMT terms. Assignments and
//! assumptions become guarded equalities in one big conjunction;
//! every assertion step becomes a separate proof obligation of the
//! form `guard ∧ ¬condition`. All floating-point operations are
//! routed through the bit-vector encoder, pointers are packed
//! `object:offset` bit-vectors, and fixed-size arrays and structs are
//! flattened to wide bit-vectors.

use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::HashMap;

use crate::error::ExecError;
use crate::ir::{Exp, Op, RoundingMode, Signedness, Symtab, Ty, TypeNamespace};
use crate::renaming::SsaName;
use crate::smt::fp::FpToBv;
use crate::smt::{FuncKind, SmtCtx, Sort, TermArena, TermId};
use crate::trace::{Property, Step, Trace};

/// Width of the object-number field in a packed pointer.
pub const OBJECT_BITS: u32 = 32;

#[derive(Clone, Debug)]
pub struct Obligation {
    pub property: Property,
    /// `guard ∧ ¬condition`: satisfiable iff the property can fail.
    pub negated: TermId,
}

#[derive(Debug, Default)]
pub struct Formula {
    /// Boolean constraints encoding the assignments and assumptions.
    pub defs: Vec<TermId>,
    pub obligations: Vec<Obligation>,
}

pub struct Lowerer<'a> {
    ctx: &'a mut TermArena,
    trace: &'a Trace,
    symtab: &'a Symtab,
    ns: &'a TypeNamespace,
    cache: HashMap<SsaName, TermId, ahash::RandomState>,
    invalids: u32,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        ctx: &'a mut TermArena,
        trace: &'a Trace,
        symtab: &'a Symtab,
        ns: &'a TypeNamespace,
    ) -> Self {
        Lowerer { ctx, trace, symtab, ns, cache: HashMap::default(), invalids: 0 }
    }

    pub fn lower(mut self) -> Result<Formula, ExecError> {
        let mut formula = Formula::default();
        for (index, step) in self.trace.steps().iter().enumerate() {
            match step {
                Step::Assignment { guard, lhs, rhs } | Step::Phi { guard, lhs, rhs } => {
                    let lhs_term = self.symbol(*lhs)?;
                    let rhs_term = self.exp(rhs)?;
                    let rhs_term = self.coerce(rhs_term, self.ctx.sort_of(lhs_term));
                    let eq = self.ctx.mk_func_app(Sort::Bool, FuncKind::Eq, &[lhs_term, rhs_term]);
                    let guard_term = self.exp(&guard.as_expr())?;
                    let def = self.implies(guard_term, eq);
                    formula.defs.push(def);
                }
                Step::Assumption { guard, cond } => {
                    let cond = self.exp(cond)?;
                    let guard_term = self.exp(&guard.as_expr())?;
                    let def = self.implies(guard_term, cond);
                    formula.defs.push(def);
                }
                Step::Assertion { guard, cond, msg, loc } => {
                    let cond = self.exp(cond)?;
                    let guard_term = self.exp(&guard.as_expr())?;
                    let not_cond = self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[cond]);
                    let negated =
                        self.ctx.mk_func_app(Sort::Bool, FuncKind::And, &[guard_term, not_cond]);
                    formula.obligations.push(Obligation {
                        property: Property { index, msg: msg.clone(), loc: *loc },
                        negated,
                    });
                }
                Step::Output { .. } => (),
            }
        }
        Ok(formula)
    }

    fn implies(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        let not_lhs = self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[lhs]);
        self.ctx.mk_func_app(Sort::Bool, FuncKind::Or, &[not_lhs, rhs])
    }

    fn pointer_width(&self) -> u32 {
        self.ns.pointer_width
    }

    /// The bit width of a type when flattened to a bit-vector.
    fn flat_width(&self, ty: &Ty) -> Result<u32, ExecError> {
        match self.ns.resolve(ty) {
            Ty::Bool => Ok(1),
            Ty::Signed(w) | Ty::Unsigned(w) => Ok(*w),
            Ty::Float(fp) => Ok(fp.packed_width()),
            Ty::Pointer(_) | Ty::Code { .. } => Ok(OBJECT_BITS + self.pointer_width()),
            Ty::Array(elem, n) => Ok(self.flat_width(elem)? * (*n as u32)),
            Ty::Struct(name) | Ty::Union(name) => {
                let size = self.ns.size_of(&Ty::Struct(*name)).ok_or_else(|| {
                    ExecError::Unreachable("unsized struct in lowering".to_string())
                })?;
                Ok(size as u32 * 8)
            }
            ty => Err(ExecError::Unreachable(format!("no flat width for {:?}", ty))),
        }
    }

    fn sort_of_ty(&self, ty: &Ty) -> Result<Sort, ExecError> {
        match self.ns.resolve(ty) {
            Ty::Bool => Ok(Sort::Bool),
            Ty::Float(fp) => {
                Ok(Sort::Float { ebits: fp.exponent_width(), sbits: fp.significand_width() })
            }
            ty => Ok(Sort::BitVec(self.flat_width(ty)?)),
        }
    }

    fn ty_of(&self, exp: &Exp<SsaName>) -> Result<Ty, ExecError> {
        use Exp::*;
        match exp {
            Id(ssa) => self.trace.ty_of(*ssa).cloned().ok_or_else(|| {
                ExecError::Unreachable(format!("untyped SSA symbol {}", ssa))
            }),
            Bool(_) => Ok(Ty::Bool),
            Bits(bv, Signedness::Signed) => Ok(Ty::Signed(bv.len())),
            Bits(bv, Signedness::Unsigned) => Ok(Ty::Unsigned(bv.len())),
            FloatBits(_, fp) => Ok(Ty::Float(*fp)),
            Nondet(ty, _) | Invalid(ty) | Cast(ty, _) => Ok(ty.clone()),
            Pointer { .. } => Ok(Ty::Pointer(Box::new(Ty::Empty))),
            AddrOf(inner) => Ok(Ty::Pointer(Box::new(self.ty_of(inner)?))),
            Deref(p) => match self.ns.resolve(&self.ty_of(p)?) {
                Ty::Pointer(inner) => Ok((**inner).clone()),
                _ => Err(ExecError::Unreachable("deref survived renaming".to_string())),
            },
            Index(base, _) => match self.ns.resolve(&self.ty_of(base)?) {
                Ty::Array(elem, _) => Ok((**elem).clone()),
                ty => Err(ExecError::Unreachable(format!("index into {:?}", ty))),
            },
            Field(base, field) => match self.ns.resolve(&self.ty_of(base)?) {
                Ty::Struct(name) | Ty::Union(name) => {
                    self.ns.field_ty(*name, *field).cloned().ok_or_else(|| {
                        ExecError::Unreachable("unknown field in lowering".to_string())
                    })
                }
                ty => Err(ExecError::Unreachable(format!("field of {:?}", ty))),
            },
            Ite(_, t, _) | With(t, _, _) => self.ty_of(t),
            WithField(base, _, _) => self.ty_of(base),
            Call(op, args) => match op {
                Op::Not | Op::And | Op::Or | Op::Implies | Op::Eq | Op::Neq | Op::Lt | Op::Le
                | Op::Gt | Op::Ge | Op::SameObject | Op::FpEq | Op::FpLt | Op::FpLe | Op::FpGt
                | Op::FpGe | Op::FpIsNan | Op::FpIsInf | Op::FpIsZero | Op::FpIsNormal
                | Op::FpIsDenormal => Ok(Ty::Bool),
                Op::PtrOffset => Ok(Ty::Unsigned(self.pointer_width())),
                _ => self.ty_of(&args[0]),
            },
        }
    }

    fn symbol(&mut self, ssa: SsaName) -> Result<TermId, ExecError> {
        if let Some(term) = self.cache.get(&ssa) {
            return Ok(*term);
        }
        let ty = self.trace.ty_of(ssa).cloned().ok_or_else(|| {
            ExecError::Unreachable(format!("untyped SSA symbol {}", ssa))
        })?;
        let sort = self.sort_of_ty(&ty)?;
        let name = ssa.to_string(self.symtab);
        let term = self.ctx.mk_smt_symbol(&name, sort);
        self.cache.insert(ssa, term);
        Ok(term)
    }

    /// Bit-level sort repair between a value and an expected sort of
    /// the same width, e.g. a float constant flowing into a bit-vector
    /// field.
    fn coerce(&mut self, term: TermId, expected: Sort) -> TermId {
        let actual = self.ctx.sort_of(term);
        if actual == expected || actual.is_bool() || expected.is_bool() {
            term
        } else if actual.data_width() == expected.data_width() {
            self.ctx.mk_reinterpret(term, expected)
        } else {
            term
        }
    }

    fn bool_to_bit(&mut self, term: TermId) -> TermId {
        if self.ctx.sort_of(term).is_bool() {
            let one = self.ctx.mk_smt_bv(Sort::BitVec(1), BigInt::from(1));
            let zero = self.ctx.mk_smt_bv(Sort::BitVec(1), BigInt::zero());
            self.ctx.mk_ite(term, one, zero)
        } else {
            term
        }
    }

    /// Resize a bit-vector term, sign- or zero-extending according to
    /// the signedness of its source type.
    fn resize(&mut self, term: TermId, to: u32, signed: bool) -> TermId {
        let from = self.ctx.sort_of(term).data_width();
        if from == to {
            term
        } else if from < to {
            if signed {
                self.ctx.mk_sign_ext(term, to - from)
            } else {
                self.ctx.mk_zero_ext(term, to - from)
            }
        } else {
            self.ctx.mk_extract(term, to - 1, 0)
        }
    }

    pub fn exp(&mut self, exp: &Exp<SsaName>) -> Result<TermId, ExecError> {
        use Exp::*;
        match exp {
            Id(ssa) => self.symbol(*ssa),
            Bool(b) => Ok(self.ctx.mk_smt_bool(*b)),
            Bits(bv, _) => {
                let sort = Sort::BitVec(bv.len());
                Ok(self.ctx.mk_smt_bv(sort, BigInt::from(bv.lower_u64())))
            }
            FloatBits(bv, fp) => {
                let bits = self.ctx.mk_smt_bv(
                    Sort::BitVec(fp.packed_width()),
                    BigInt::from(bv.lower_u64()),
                );
                let sort = Sort::Float { ebits: fp.exponent_width(), sbits: fp.significand_width() };
                Ok(self.ctx.mk_reinterpret(bits, sort))
            }
            Nondet(ty, n) => {
                let sort = self.sort_of_ty(ty)?;
                Ok(self.ctx.mk_smt_symbol(&format!("nondet!{}", n), sort))
            }
            Invalid(ty) => {
                let sort = self.sort_of_ty(ty)?;
                let n = self.invalids;
                self.invalids += 1;
                Ok(self.ctx.mk_smt_symbol(&format!("invalid!{}", n), sort))
            }
            Pointer { object, offset } => {
                let object =
                    self.ctx.mk_smt_bv(Sort::BitVec(OBJECT_BITS), BigInt::from(*object));
                let offset_ty = self.ty_of(offset)?;
                let offset = self.exp(offset)?;
                let offset = self.bool_to_bit(offset);
                let offset = self.resize(
                    offset,
                    self.pointer_width(),
                    offset_ty.signedness() == Signedness::Signed,
                );
                Ok(self.ctx.mk_concat(object, offset))
            }
            Ite(c, t, e) => {
                let c = self.exp(c)?;
                let t = self.exp(t)?;
                let e = self.exp(e)?;
                let e = self.coerce(e, self.ctx.sort_of(t));
                Ok(self.ctx.mk_ite(c, t, e))
            }
            Cast(ty, inner) => self.cast(ty, inner),
            Index(base, index) => {
                let (elem_width, array_width) = self.array_widths(base)?;
                let base_term = self.exp(base)?;
                let shift = self.element_shift(index, elem_width, array_width)?;
                let shifted = self.ctx.mk_func_app(
                    Sort::BitVec(array_width),
                    FuncKind::Bvlshr,
                    &[base_term, shift],
                );
                let elem_ty = self.ty_of(exp)?;
                let raw = self.ctx.mk_extract(shifted, elem_width - 1, 0);
                let sort = self.sort_of_ty(&elem_ty)?;
                Ok(self.coerce(raw, sort))
            }
            With(base, index, value) => {
                let (elem_width, array_width) = self.array_widths(base)?;
                let base_term = self.exp(base)?;
                let shift = self.element_shift(index, elem_width, array_width)?;
                let value = self.exp(value)?;
                let value = self.bool_to_bit(value);
                let value = self.coerce(value, Sort::BitVec(self.ctx.sort_of(value).data_width()));
                let value_ext = self.resize(value, array_width, false);
                let ones = (BigInt::from(1) << elem_width) - 1;
                let mask = self.ctx.mk_smt_bv(Sort::BitVec(array_width), ones);
                let mask = self.ctx.mk_func_app(
                    Sort::BitVec(array_width),
                    FuncKind::Bvshl,
                    &[mask, shift],
                );
                let not_mask =
                    self.ctx.mk_func_app(Sort::BitVec(array_width), FuncKind::Bvnot, &[mask]);
                let cleared = self.ctx.mk_func_app(
                    Sort::BitVec(array_width),
                    FuncKind::Bvand,
                    &[base_term, not_mask],
                );
                let inserted = self.ctx.mk_func_app(
                    Sort::BitVec(array_width),
                    FuncKind::Bvshl,
                    &[value_ext, shift],
                );
                Ok(self.ctx.mk_func_app(
                    Sort::BitVec(array_width),
                    FuncKind::Bvor,
                    &[cleared, inserted],
                ))
            }
            Field(base, field) => {
                let (offset, width) = self.field_slice(base, *field)?;
                let base_term = self.exp(base)?;
                let raw = self.ctx.mk_extract(base_term, offset + width - 1, offset);
                let field_ty = self.ty_of(exp)?;
                let sort = self.sort_of_ty(&field_ty)?;
                Ok(self.coerce(raw, sort))
            }
            WithField(base, field, value) => {
                let (offset, width) = self.field_slice(base, *field)?;
                let base_term = self.exp(base)?;
                let total = self.ctx.sort_of(base_term).data_width();
                let value = self.exp(value)?;
                let value = self.bool_to_bit(value);
                let value_ext = self.resize(value, total, false);
                let ones = (BigInt::from(1) << width) - 1;
                let mask_val = ones << offset;
                let mask = self.ctx.mk_smt_bv(Sort::BitVec(total), mask_val);
                let not_mask = self.ctx.mk_func_app(Sort::BitVec(total), FuncKind::Bvnot, &[mask]);
                let cleared = self.ctx.mk_func_app(
                    Sort::BitVec(total),
                    FuncKind::Bvand,
                    &[base_term, not_mask],
                );
                let shift =
                    self.ctx.mk_smt_bv(Sort::BitVec(total), BigInt::from(offset));
                let inserted =
                    self.ctx.mk_func_app(Sort::BitVec(total), FuncKind::Bvshl, &[value_ext, shift]);
                Ok(self.ctx.mk_func_app(
                    Sort::BitVec(total),
                    FuncKind::Bvor,
                    &[cleared, inserted],
                ))
            }
            AddrOf(_) | Deref(_) => {
                Err(ExecError::Unreachable("pointer expression survived renaming".to_string()))
            }
            Call(op, args) => self.call(*op, args),
        }
    }

    fn array_widths(&mut self, base: &Exp<SsaName>) -> Result<(u32, u32), ExecError> {
        match self.ns.resolve(&self.ty_of(base)?) {
            Ty::Array(elem, n) => {
                let elem_width = self.flat_width(elem)?;
                Ok((elem_width, elem_width * (*n as u32)))
            }
            ty => Err(ExecError::Unreachable(format!("array op on {:?}", ty))),
        }
    }

    fn element_shift(
        &mut self,
        index: &Exp<SsaName>,
        elem_width: u32,
        array_width: u32,
    ) -> Result<TermId, ExecError> {
        let index_ty = self.ty_of(index)?;
        let index = self.exp(index)?;
        let index = self.bool_to_bit(index);
        let index = self.resize(
            index,
            array_width,
            index_ty.signedness() == Signedness::Signed,
        );
        let elem = self.ctx.mk_smt_bv(Sort::BitVec(array_width), BigInt::from(elem_width));
        Ok(self.ctx.mk_func_app(Sort::BitVec(array_width), FuncKind::Bvmul, &[index, elem]))
    }

    fn field_slice(&mut self, base: &Exp<SsaName>, field: crate::ir::Name) -> Result<(u32, u32), ExecError> {
        match self.ns.resolve(&self.ty_of(base)?) {
            Ty::Struct(name) => {
                let offset = self.ns.offset_of(*name, field).ok_or_else(|| {
                    ExecError::Unreachable("unknown field offset".to_string())
                })? as u32
                    * 8;
                let width = self
                    .ns
                    .field_ty(*name, field)
                    .ok_or_else(|| ExecError::Unreachable("unknown field".to_string()))
                    .and_then(|ty| self.flat_width(ty))?;
                Ok((offset, width))
            }
            Ty::Union(name) => {
                let width = self
                    .ns
                    .field_ty(*name, field)
                    .ok_or_else(|| ExecError::Unreachable("unknown field".to_string()))
                    .and_then(|ty| self.flat_width(ty))?;
                Ok((0, width))
            }
            ty => Err(ExecError::Unreachable(format!("field op on {:?}", ty))),
        }
    }

    fn cast(&mut self, to: &Ty, inner: &Exp<SsaName>) -> Result<TermId, ExecError> {
        let from_ty = self.ty_of(inner)?;
        let term = self.exp(inner)?;
        let from = self.ns.resolve(&from_ty).clone();
        let to_resolved = self.ns.resolve(to).clone();
        match (&from, &to_resolved) {
            // int/bool/pointer to int
            (Ty::Bool, Ty::Signed(w)) | (Ty::Bool, Ty::Unsigned(w)) => {
                let bit = self.bool_to_bit(term);
                Ok(self.resize(bit, *w, false))
            }
            (_, Ty::Bool) => match &from {
                Ty::Bool => Ok(term),
                Ty::Float(_) => {
                    let mut fp = FpToBv::new(self.ctx);
                    let is_zero = fp.is_zero(term);
                    Ok(self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[is_zero]))
                }
                _ => {
                    let w = self.ctx.sort_of(term).data_width();
                    let zero = self.ctx.mk_smt_bv(Sort::BitVec(w), BigInt::zero());
                    let eq = self.ctx.mk_func_app(Sort::Bool, FuncKind::Eq, &[term, zero]);
                    Ok(self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[eq]))
                }
            },
            (Ty::Float(_), Ty::Signed(w)) => {
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(RoundingMode::Rtz);
                Ok(fp.to_sbv(term, rm, *w))
            }
            (Ty::Float(_), Ty::Unsigned(w)) => {
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(RoundingMode::Rtz);
                Ok(fp.to_ubv(term, rm, *w))
            }
            (Ty::Signed(_), Ty::Float(fp_ty)) => {
                let sort =
                    Sort::Float { ebits: fp_ty.exponent_width(), sbits: fp_ty.significand_width() };
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(RoundingMode::Rne);
                Ok(fp.from_sbv(term, sort, rm))
            }
            (Ty::Unsigned(_), Ty::Float(fp_ty)) | (Ty::Bool, Ty::Float(fp_ty)) => {
                let term = self.bool_to_bit(term);
                let sort =
                    Sort::Float { ebits: fp_ty.exponent_width(), sbits: fp_ty.significand_width() };
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(RoundingMode::Rne);
                Ok(fp.from_ubv(term, sort, rm))
            }
            (Ty::Float(_), Ty::Float(fp_ty)) => {
                let sort =
                    Sort::Float { ebits: fp_ty.exponent_width(), sbits: fp_ty.significand_width() };
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(RoundingMode::Rne);
                Ok(fp.to_fp(term, sort, rm))
            }
            // anything else is a raw bit-level resize
            (from, to) => {
                let signed = matches!(from, Ty::Signed(_));
                let width = self.flat_width(to)?;
                Ok(self.resize(term, width, signed))
            }
        }
    }

    fn call(&mut self, op: Op, args: &[Exp<SsaName>]) -> Result<TermId, ExecError> {
        use FuncKind::*;
        let signed = self
            .ty_of(&args[0])
            .map(|ty| matches!(self.ns.resolve(&ty), Ty::Signed(_)))
            .unwrap_or(false);
        match op {
            Op::Not => {
                let a = self.exp(&args[0])?;
                Ok(self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[a]))
            }
            Op::And | Op::Or => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                let kind = if matches!(op, Op::And) { And } else { Or };
                Ok(self.ctx.mk_func_app(Sort::Bool, kind, &[a, b]))
            }
            Op::Implies => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                Ok(self.implies(a, b))
            }
            Op::Eq | Op::Neq => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                let b = self.coerce(b, self.ctx.sort_of(a));
                let eq = self.ctx.mk_func_app(Sort::Bool, Eq, &[a, b]);
                if matches!(op, Op::Eq) {
                    Ok(eq)
                } else {
                    Ok(self.ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[eq]))
                }
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let mut a = self.exp(&args[0])?;
                let mut b = self.exp(&args[1])?;
                if matches!(op, Op::Gt | Op::Ge) {
                    std::mem::swap(&mut a, &mut b);
                }
                let b = self.coerce(b, self.ctx.sort_of(a));
                let kind = match (op, signed) {
                    (Op::Lt, true) | (Op::Gt, true) => Bvslt,
                    (Op::Lt, false) | (Op::Gt, false) => Bvult,
                    (_, true) => Bvsle,
                    (_, false) => Bvule,
                };
                Ok(self.ctx.mk_func_app(Sort::Bool, kind, &[a, b]))
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem | Op::Bvand | Op::Bvor | Op::Bvxor
            | Op::Shl | Op::Lshr | Op::Ashr => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                let sort = self.ctx.sort_of(a);
                let b = self.coerce(b, sort);
                let kind = match op {
                    Op::Add => Bvadd,
                    Op::Sub => Bvsub,
                    Op::Mul => Bvmul,
                    Op::Div if signed => Bvsdiv,
                    Op::Div => Bvudiv,
                    Op::Rem if signed => Bvsrem,
                    Op::Rem => Bvurem,
                    Op::Bvand => Bvand,
                    Op::Bvor => Bvor,
                    Op::Bvxor => Bvxor,
                    Op::Shl => Bvshl,
                    Op::Lshr => Bvlshr,
                    Op::Ashr => Bvashr,
                    _ => unreachable!(),
                };
                Ok(self.ctx.mk_func_app(sort, kind, &[a, b]))
            }
            Op::Neg => {
                let a = self.exp(&args[0])?;
                let sort = self.ctx.sort_of(a);
                Ok(self.ctx.mk_func_app(sort, Bvneg, &[a]))
            }
            Op::Bvnot => {
                let a = self.exp(&args[0])?;
                let sort = self.ctx.sort_of(a);
                Ok(self.ctx.mk_func_app(sort, Bvnot, &[a]))
            }
            Op::PtrAdd => {
                let p = self.exp(&args[0])?;
                let delta_ty = self.ty_of(&args[1])?;
                let delta = self.exp(&args[1])?;
                let pw = self.pointer_width();
                let total = OBJECT_BITS + pw;
                let object = self.ctx.mk_extract(p, total - 1, pw);
                let offset = self.ctx.mk_extract(p, pw - 1, 0);
                let delta = self.resize(
                    delta,
                    pw,
                    delta_ty.signedness() == Signedness::Signed,
                );
                let offset =
                    self.ctx.mk_func_app(Sort::BitVec(pw), Bvadd, &[offset, delta]);
                Ok(self.ctx.mk_concat(object, offset))
            }
            Op::SameObject => {
                let p = self.exp(&args[0])?;
                let q = self.exp(&args[1])?;
                let pw = self.pointer_width();
                let total = OBJECT_BITS + pw;
                let p_obj = self.ctx.mk_extract(p, total - 1, pw);
                let q_obj = self.ctx.mk_extract(q, total - 1, pw);
                Ok(self.ctx.mk_func_app(Sort::Bool, Eq, &[p_obj, q_obj]))
            }
            Op::PtrOffset => {
                let p = self.exp(&args[0])?;
                let pw = self.pointer_width();
                Ok(self.ctx.mk_extract(p, pw - 1, 0))
            }
            Op::FpAdd(rm) | Op::FpSub(rm) | Op::FpMul(rm) | Op::FpDiv(rm) => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                let sort = self.ctx.sort_of(a);
                let b = self.coerce(b, sort);
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(rm);
                Ok(match op {
                    Op::FpAdd(_) => fp.add(a, b, rm),
                    Op::FpSub(_) => fp.sub(a, b, rm),
                    Op::FpMul(_) => fp.mul(a, b, rm),
                    _ => fp.div(a, b, rm),
                })
            }
            Op::FpSqrt(rm) => {
                let a = self.exp(&args[0])?;
                let mut fp = FpToBv::new(self.ctx);
                let rm = fp.rm(rm);
                Ok(fp.sqrt(a, rm))
            }
            Op::FpNeg => {
                let a = self.exp(&args[0])?;
                let mut fp = FpToBv::new(self.ctx);
                Ok(fp.neg(a))
            }
            Op::FpAbs => {
                let a = self.exp(&args[0])?;
                let mut fp = FpToBv::new(self.ctx);
                Ok(fp.abs(a))
            }
            Op::FpEq | Op::FpLt | Op::FpLe | Op::FpGt | Op::FpGe => {
                let a = self.exp(&args[0])?;
                let b = self.exp(&args[1])?;
                let b = self.coerce(b, self.ctx.sort_of(a));
                let mut fp = FpToBv::new(self.ctx);
                Ok(match op {
                    Op::FpEq => fp.fp_eq(a, b),
                    Op::FpLt => fp.fp_lt(a, b),
                    Op::FpLe => fp.fp_le(a, b),
                    Op::FpGt => fp.fp_gt(a, b),
                    _ => fp.fp_ge(a, b),
                })
            }
            Op::FpIsNan | Op::FpIsInf | Op::FpIsZero | Op::FpIsNormal | Op::FpIsDenormal => {
                let a = self.exp(&args[0])?;
                let mut fp = FpToBv::new(self.ctx);
                Ok(match op {
                    Op::FpIsNan => fp.is_nan(a),
                    Op::FpIsInf => fp.is_inf(a),
                    Op::FpIsZero => fp.is_zero(a),
                    Op::FpIsNormal => fp.is_normal(a),
                    _ => fp.is_denormal(a),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::B64;
    use crate::guard::Guard;
    use crate::ir::{FpTy, Symtab};
    use crate::renaming::L1Name;
    use crate::source_loc::SourceLoc;

    fn ssa(symtab: &mut Symtab, name: &str, version: u32) -> SsaName {
        let name = symtab.intern(name);
        SsaName { l1: L1Name::global(name), version }
    }

    fn harness() -> (TermArena, Symtab, TypeNamespace) {
        (TermArena::new(), Symtab::new(), TypeNamespace::new(64))
    }

    #[test]
    fn test_assignment_becomes_equality() {
        let (mut ctx, mut symtab, ns) = harness();
        let mut trace = Trace::new();
        let x = ssa(&mut symtab, "x", 1);
        trace.assignment(
            Guard::new(),
            x,
            Exp::Bits(B64::new(7, 32), Signedness::Signed),
            Ty::Signed(32),
        );
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        assert_eq!(formula.defs.len(), 1);
        assert!(formula.obligations.is_empty());
        // x!1 = 7 is not a constant, but it is a boolean equality
        assert!(ctx.sort_of(formula.defs[0]).is_bool());
    }

    #[test]
    fn test_assertion_becomes_negated_obligation() {
        let (mut ctx, mut symtab, ns) = harness();
        let mut trace = Trace::new();
        let x = ssa(&mut symtab, "x", 1);
        trace.record_type(x, Ty::Signed(32));
        let cond = Exp::Call(
            Op::Gt,
            vec![Exp::Id(x), Exp::Bits(B64::zeros(32), Signedness::Signed)],
        );
        trace.assertion(Guard::new(), cond, "positive", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        assert_eq!(formula.obligations.len(), 1);
        assert_eq!(formula.obligations[0].property.msg, "positive");
        assert!(ctx.as_bool(formula.obligations[0].negated).is_none());
    }

    #[test]
    fn test_concrete_violation_folds_to_true() {
        let (mut ctx, symtab, ns) = harness();
        let mut trace = Trace::new();
        trace.assertion(Guard::new(), Exp::Bool(false), "fails", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        // guard ∧ ¬false is trivially satisfiable
        assert_eq!(ctx.as_bool(formula.obligations[0].negated), Some(true));
    }

    #[test]
    fn test_fp_operation_routes_through_encoder() {
        let (mut ctx, mut symtab, ns) = harness();
        let mut trace = Trace::new();
        let c = ssa(&mut symtab, "c", 1);
        // c = (0.1f + 0.2f == 0.3f) must fold to false through the
        // bit-vector encoding of the additions
        let fp32 = FpTy::fp32();
        let lit = |f: f32| Exp::FloatBits(B64::new(f.to_bits() as u64, 32), fp32);
        let sum = Exp::Call(Op::FpAdd(RoundingMode::Rne), vec![lit(0.1), lit(0.2)]);
        let cond = Exp::Call(Op::FpEq, vec![sum, lit(0.3)]);
        trace.assertion(Guard::new(), cond, "exact", SourceLoc::unknown());
        trace.record_type(c, Ty::Bool);
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        // 0.1f + 0.2f != 0.3f in IEEE-754, so the obligation is
        // concretely satisfiable: a counterexample exists
        assert_eq!(ctx.as_bool(formula.obligations[0].negated), Some(true));
    }

    #[test]
    fn test_double_division_is_inf() {
        let (mut ctx, symtab, ns) = harness();
        let mut trace = Trace::new();
        let fp64 = FpTy::fp64();
        let lit = |f: f64| Exp::FloatBits(B64::new(f.to_bits(), 64), fp64);
        // y = 1.0 / 0.0; assert(isinf(y))
        let y = Exp::Call(Op::FpDiv(RoundingMode::Rne), vec![lit(1.0), lit(0.0)]);
        let cond = Exp::Call(Op::FpIsInf, vec![y]);
        trace.assertion(Guard::new(), cond, "isinf", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        // verification successful: the negated obligation is unsat
        assert_eq!(ctx.as_bool(formula.obligations[0].negated), Some(false));
    }

    #[test]
    fn test_pointer_packing() {
        let (mut ctx, symtab, ns) = harness();
        let mut trace = Trace::new();
        let p = Exp::Pointer {
            object: 3,
            offset: Box::new(Exp::Bits(B64::new(8, 64), Signedness::Unsigned)),
        };
        let q = Exp::Pointer {
            object: 3,
            offset: Box::new(Exp::Bits(B64::zeros(64), Signedness::Unsigned)),
        };
        let cond = Exp::Call(Op::SameObject, vec![p, q]);
        trace.assertion(Guard::new(), cond, "same", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        // same object, different offsets: obligation folds to unsat
        assert_eq!(ctx.as_bool(formula.obligations[0].negated), Some(false));
    }

    #[test]
    fn test_array_flattening_round_trip() {
        let (mut ctx, mut symtab, ns) = harness();
        let mut trace = Trace::new();
        let a = ssa(&mut symtab, "a", 1);
        let array_ty = Ty::Array(Box::new(Ty::Unsigned(8)), 4);
        trace.record_type(a, array_ty);
        let idx = Exp::Bits(B64::new(2, 32), Signedness::Unsigned);
        let updated = Exp::With(
            Box::new(Exp::Id(a)),
            Box::new(idx.clone()),
            Box::new(Exp::Bits(B64::new(0xAB, 8), Signedness::Unsigned)),
        );
        let read = Exp::Index(Box::new(updated), Box::new(idx));
        let cond = Exp::Call(
            Op::Eq,
            vec![read, Exp::Bits(B64::new(0xAB, 8), Signedness::Unsigned)],
        );
        trace.assertion(Guard::new(), cond, "stored", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        // reading back the stored element holds for any array value,
        // but the obligation is not concrete because `a` is symbolic;
        // check instead on a concrete base
        assert!(ctx.as_bool(formula.obligations[0].negated).is_none());

        let mut trace = Trace::new();
        let base = Exp::Bits(B64::new(0x04030201, 32), Signedness::Unsigned);
        let base_ty = Ty::Array(Box::new(Ty::Unsigned(8)), 4);
        let updated = Exp::With(
            Box::new(Exp::Cast(base_ty, Box::new(base))),
            Box::new(Exp::Bits(B64::new(2, 32), Signedness::Unsigned)),
            Box::new(Exp::Bits(B64::new(0xAB, 8), Signedness::Unsigned)),
        );
        let read = Exp::Index(
            Box::new(updated),
            Box::new(Exp::Bits(B64::new(2, 32), Signedness::Unsigned)),
        );
        let cond = Exp::Call(
            Op::Eq,
            vec![read, Exp::Bits(B64::new(0xAB, 8), Signedness::Unsigned)],
        );
        trace.assertion(Guard::new(), cond, "stored", SourceLoc::unknown());
        let formula = Lowerer::new(&mut ctx, &trace, &symtab, &ns).lower().unwrap();
        assert_eq!(ctx.as_bool(formula.obligations[0].negated), Some(false));
    }
}
