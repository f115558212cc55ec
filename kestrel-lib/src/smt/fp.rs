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

//! The floating-point to bit-vector encoder. Every IEEE-754 operation
//! is translated into pure bit-vector and boolean terms with exact
//! rounding semantics, so the resulting formulas can be discharged by
//! bit-vector-only solvers.
//!
//! All values round-trip through `unpack -> round -> pack`: `unpack`
//! splits a packed value into sign, significand (with the implicit
//! leading bit materialised), exponent and leading-zero count, and
//! `round` consumes an `sbits + 4` bit significand carrying
//! guard/round/sticky bits together with an `ebits + 2` bit signed
//! exponent, producing the packed result for any of the five rounding
//! modes. The square root uses the classical digit recurrence
//! (Handbook of Floating-Point Arithmetic, algorithm 10.2).
//!
//! Only the canonical positive quiet NaN is ever produced; inputs are
//! classified as NaN by pattern, not by bit-exact match.

use num_bigint::BigInt;
use num_traits::One;

use crate::ir::RoundingMode;
use crate::smt::{FuncKind, SmtCtx, Sort, TermId};

fn power2(k: u32) -> BigInt {
    BigInt::one() << k
}

fn power2m1(k: u32) -> BigInt {
    (BigInt::one() << k) - BigInt::one()
}

/// The unpacked form of a floating-point value. Width contract:
/// `(1, sbits, ebits, ebits)` for `(sgn, sig, exp, lz)`.
pub struct Unpacked {
    pub sgn: TermId,
    pub sig: TermId,
    pub exp: TermId,
    pub lz: TermId,
}

pub struct FpToBv<'c, C> {
    ctx: &'c mut C,
    unspecified: u32,
}

impl<'c, C: SmtCtx> FpToBv<'c, C> {
    pub fn new(ctx: &'c mut C) -> Self {
        FpToBv { ctx, unspecified: 0 }
    }

    fn ubv(&mut self, value: impl Into<BigInt>, width: u32) -> TermId {
        let sort = self.ctx.mk_bv_sort(false, width);
        self.ctx.mk_smt_bv(sort, value.into())
    }

    fn sbv(&mut self, value: impl Into<BigInt>, width: u32) -> TermId {
        let sort = self.ctx.mk_bv_sort(true, width);
        self.ctx.mk_smt_bv(sort, value.into())
    }

    fn bool_sort(&self) -> Sort {
        self.ctx.mk_bool_sort()
    }

    fn app(&mut self, sort: Sort, kind: FuncKind, args: &[TermId]) -> TermId {
        self.ctx.mk_func_app(sort, kind, args)
    }

    fn eq(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Eq, &[a, b])
    }

    fn not(&mut self, a: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Not, &[a])
    }

    fn and(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::And, &[a, b])
    }

    fn or(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Or, &[a, b])
    }

    fn xor(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Xor, &[a, b])
    }

    fn bvop(&mut self, kind: FuncKind, a: TermId, b: TermId) -> TermId {
        let sort = self.ctx.sort_of(a);
        self.app(sort, kind, &[a, b])
    }

    fn bvadd(&mut self, a: TermId, b: TermId) -> TermId {
        self.bvop(FuncKind::Bvadd, a, b)
    }

    fn bvsub(&mut self, a: TermId, b: TermId) -> TermId {
        self.bvop(FuncKind::Bvsub, a, b)
    }

    fn bvor(&mut self, a: TermId, b: TermId) -> TermId {
        self.bvop(FuncKind::Bvor, a, b)
    }

    fn bvnot(&mut self, a: TermId) -> TermId {
        let sort = self.ctx.sort_of(a);
        self.app(sort, FuncKind::Bvnot, &[a])
    }

    fn bvneg(&mut self, a: TermId) -> TermId {
        let sort = self.ctx.sort_of(a);
        self.app(sort, FuncKind::Bvneg, &[a])
    }

    fn bvule(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Bvule, &[a, b])
    }

    fn bvult(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Bvult, &[a, b])
    }

    fn bvsle(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Bvsle, &[a, b])
    }

    fn bvslt(&mut self, a: TermId, b: TermId) -> TermId {
        let sort = self.bool_sort();
        self.app(sort, FuncKind::Bvslt, &[a, b])
    }

    fn ite(&mut self, c: TermId, t: TermId, e: TermId) -> TermId {
        self.ctx.mk_ite(c, t, e)
    }

    fn width(&self, t: TermId) -> u32 {
        self.ctx.sort_of(t).data_width()
    }

    fn extract_signbit(&mut self, fp: TermId) -> TermId {
        let dw = self.width(fp);
        let bv = self.as_bv(fp);
        self.ctx.mk_extract(bv, dw - 1, dw - 1)
    }

    fn extract_exponent(&mut self, fp: TermId) -> TermId {
        let sort = self.ctx.sort_of(fp);
        let exp_top = sort.data_width() - 2;
        let exp_bot = sort.significand_width() - 2;
        let bv = self.as_bv(fp);
        self.ctx.mk_extract(bv, exp_top, exp_bot + 1)
    }

    fn extract_significand(&mut self, fp: TermId) -> TermId {
        let sort = self.ctx.sort_of(fp);
        let bv = self.as_bv(fp);
        self.ctx.mk_extract(bv, sort.significand_width() - 2, 0)
    }

    fn extract_exp_sig(&mut self, fp: TermId) -> TermId {
        let dw = self.width(fp);
        let bv = self.as_bv(fp);
        self.ctx.mk_extract(bv, dw - 2, 0)
    }

    fn as_bv(&mut self, fp: TermId) -> TermId {
        let w = self.width(fp);
        let sort = self.ctx.mk_bv_sort(false, w);
        self.ctx.mk_reinterpret(fp, sort)
    }

    fn pack(&mut self, bv: TermId, ebits: u32, sbits: u32) -> TermId {
        let sort = self.ctx.mk_fp_sort(ebits, sbits);
        self.ctx.mk_reinterpret(bv, sort)
    }

    /// The 3-bit rounding mode constant.
    pub fn rm(&mut self, mode: RoundingMode) -> TermId {
        self.ubv(mode as u32, 3)
    }

    fn is_rm(&mut self, rme: TermId, mode: RoundingMode) -> TermId {
        let constant = self.rm(mode);
        self.eq(rme, constant)
    }

    fn fresh_unspecified(&mut self, width: u32) -> TermId {
        let name = format!("unspecified_fp!{}", self.unspecified);
        self.unspecified += 1;
        let sort = self.ctx.mk_bv_sort(false, width);
        self.ctx.mk_smt_symbol(&name, sort)
    }

    fn mk_top_exp(&mut self, sz: u32) -> TermId {
        let v = power2m1(sz);
        self.ubv(v, sz)
    }

    fn mk_bot_exp(&mut self, sz: u32) -> TermId {
        self.ubv(0, sz)
    }

    fn mk_min_exp(&mut self, ebits: u32) -> TermId {
        let z = -power2m1(ebits - 1) + BigInt::one();
        self.sbv(z, ebits)
    }

    fn mk_max_exp(&mut self, ebits: u32) -> TermId {
        let z = power2m1(ebits - 1);
        self.ubv(z, ebits)
    }

    pub fn nan(&mut self, ebits: u32, sbits: u32) -> TermId {
        let top_exp = self.mk_top_exp(ebits);
        let sgn = self.ubv(0, 1);
        let sig = self.ubv(1, sbits - 1);
        let exp_sig = self.ctx.mk_concat(top_exp, sig);
        let packed = self.ctx.mk_concat(sgn, exp_sig);
        self.pack(packed, ebits, sbits)
    }

    fn inf(&mut self, sgn: u64, ebits: u32, sbits: u32) -> TermId {
        let top_exp = self.mk_top_exp(ebits);
        let sgn = self.ubv(sgn, 1);
        let sig = self.ubv(0, sbits - 1);
        let exp_sig = self.ctx.mk_concat(top_exp, sig);
        let packed = self.ctx.mk_concat(sgn, exp_sig);
        self.pack(packed, ebits, sbits)
    }

    pub fn pinf(&mut self, ebits: u32, sbits: u32) -> TermId {
        self.inf(0, ebits, sbits)
    }

    pub fn ninf(&mut self, ebits: u32, sbits: u32) -> TermId {
        self.inf(1, ebits, sbits)
    }

    fn zero(&mut self, sgn: u64, ebits: u32, sbits: u32) -> TermId {
        let bot_exp = self.mk_bot_exp(ebits);
        let sgn = self.ubv(sgn, 1);
        let sig = self.ubv(0, sbits - 1);
        let exp_sig = self.ctx.mk_concat(bot_exp, sig);
        let packed = self.ctx.mk_concat(sgn, exp_sig);
        self.pack(packed, ebits, sbits)
    }

    pub fn pzero(&mut self, ebits: u32, sbits: u32) -> TermId {
        self.zero(0, ebits, sbits)
    }

    pub fn nzero(&mut self, ebits: u32, sbits: u32) -> TermId {
        self.zero(1, ebits, sbits)
    }

    pub fn is_nan(&mut self, op: TermId) -> TermId {
        let exp = self.extract_exponent(op);
        let sig = self.extract_significand(op);
        let top_exp = self.mk_top_exp(self.ctx.sort_of(op).exponent_width());
        let zero = self.ubv(0, self.width(sig));
        let sig_is_zero = self.eq(sig, zero);
        let sig_is_not_zero = self.not(sig_is_zero);
        let exp_is_top = self.eq(exp, top_exp);
        self.and(exp_is_top, sig_is_not_zero)
    }

    pub fn is_inf(&mut self, op: TermId) -> TermId {
        let exp = self.extract_exponent(op);
        let sig = self.extract_significand(op);
        let top_exp = self.mk_top_exp(self.ctx.sort_of(op).exponent_width());
        let zero = self.ubv(0, self.width(sig));
        let sig_is_zero = self.eq(sig, zero);
        let exp_is_top = self.eq(exp, top_exp);
        self.and(exp_is_top, sig_is_zero)
    }

    pub fn is_zero(&mut self, op: TermId) -> TermId {
        let ew_sw = self.extract_exp_sig(op);
        let zero = self.ubv(0, self.width(op) - 1);
        self.eq(ew_sw, zero)
    }

    pub fn is_denormal(&mut self, op: TermId) -> TermId {
        let exp = self.extract_exponent(op);
        let zero = self.ubv(0, self.width(exp));
        let zexp = self.eq(exp, zero);
        let is_zero = self.is_zero(op);
        let n_is_zero = self.not(is_zero);
        self.and(n_is_zero, zexp)
    }

    pub fn is_normal(&mut self, op: TermId) -> TermId {
        let exp = self.extract_exponent(op);
        let is_denormal = self.is_denormal(op);
        let is_zero = self.is_zero(op);
        let ebits = self.width(exp);
        let p = self.ubv(power2m1(ebits), ebits);
        let is_special = self.eq(exp, p);
        let or_ex = self.or(is_special, is_denormal);
        let or_ex = self.or(is_zero, or_ex);
        self.not(or_ex)
    }

    pub fn is_negative(&mut self, op: TermId) -> TermId {
        let sign = self.extract_signbit(op);
        let zero = self.ubv(0, 1);
        let is_zero_bit = self.eq(sign, zero);
        self.not(is_zero_bit)
    }

    pub fn is_positive(&mut self, op: TermId) -> TermId {
        let sign = self.extract_signbit(op);
        let zero = self.ubv(0, 1);
        self.eq(sign, zero)
    }

    fn is_pzero(&mut self, op: TermId) -> TermId {
        let z = self.is_zero(op);
        let p = self.is_positive(op);
        self.and(z, p)
    }

    fn is_nzero(&mut self, op: TermId) -> TermId {
        let z = self.is_zero(op);
        let n = self.is_negative(op);
        self.and(z, n)
    }

    fn is_pinf(&mut self, op: TermId) -> TermId {
        let i = self.is_inf(op);
        let p = self.is_positive(op);
        self.and(i, p)
    }

    fn is_ninf(&mut self, op: TermId) -> TermId {
        let i = self.is_inf(op);
        let n = self.is_negative(op);
        self.and(i, n)
    }

    pub fn abs(&mut self, op: TermId) -> TermId {
        let sort = self.ctx.sort_of(op);
        let ew_sw = self.extract_exp_sig(op);
        let zero = self.ubv(0, 1);
        let packed = self.ctx.mk_concat(zero, ew_sw);
        self.ctx.mk_reinterpret(packed, sort)
    }

    pub fn neg(&mut self, op: TermId) -> TermId {
        let sort = self.ctx.sort_of(op);
        let ew_sw = self.extract_exp_sig(op);
        let sgn = self.extract_signbit(op);
        let c = self.is_nan(op);
        let nsgn = self.bvnot(sgn);
        let r_sgn = self.ite(c, sgn, nsgn);
        let packed = self.ctx.mk_concat(r_sgn, ew_sw);
        self.ctx.mk_reinterpret(packed, sort)
    }

    /// Count of leading zero bits of `src`, as a `max_bits` wide
    /// bit-vector, by recursive halving.
    fn leading_zeros(&mut self, src: TermId, max_bits: u32) -> TermId {
        let bv_sz = self.width(src);
        if bv_sz == 0 {
            return self.ubv(0, max_bits);
        }
        if bv_sz == 1 {
            let nil_1 = self.ubv(0, 1);
            let one_m = self.ubv(1, max_bits);
            let nil_m = self.ubv(0, max_bits);
            let eq = self.eq(src, nil_1);
            return self.ite(eq, one_m, nil_m);
        }

        let h = self.ctx.mk_extract(src, bv_sz - 1, bv_sz / 2);
        let l = self.ctx.mk_extract(src, bv_sz / 2 - 1, 0);
        let h_size = self.width(h);

        let lz_h = self.leading_zeros(h, max_bits);
        let lz_l = self.leading_zeros(l, max_bits);

        let nil_h = self.ubv(0, h_size);
        let h_is_zero = self.eq(h, nil_h);
        let h_m = self.ubv(h_size, max_bits);
        let sum = self.bvadd(h_m, lz_l);
        self.ite(h_is_zero, sum, lz_h)
    }

    /// Remove the exponent bias, yielding a signed exponent of the same
    /// width.
    fn unbias(&mut self, src: TermId) -> TermId {
        let ebits = self.width(src);
        let one = self.ubv(1, ebits);
        let e_plus_one = self.bvadd(src, one);
        let leading = self.ctx.mk_extract(e_plus_one, ebits - 1, ebits - 1);
        let n_leading = self.bvnot(leading);
        let rest = self.ctx.mk_extract(e_plus_one, ebits - 2, 0);
        self.ctx.mk_concat(n_leading, rest)
    }

    fn bias(&mut self, e: TermId) -> TermId {
        let ebits = self.width(e);
        let bias = self.sbv(power2m1(ebits - 1), ebits);
        self.bvadd(e, bias)
    }

    /// Split a packed value into `(sgn, sig, exp, lz)`. Normal values
    /// get the implicit leading bit materialised and the exponent
    /// unbiased; denormals, when `normalize` is set, are shifted left
    /// by their leading-zero count so the significand has the same
    /// `1.xxx` shape as a normal's.
    pub fn unpack(&mut self, src: TermId, normalize: bool) -> Unpacked {
        let sort = self.ctx.sort_of(src);
        let sbits = sort.significand_width();
        let ebits = sort.exponent_width();

        let sgn = self.extract_signbit(src);
        let exp = self.extract_exponent(src);
        let sig = self.extract_significand(src);

        debug_assert_eq!(self.width(sgn), 1);
        debug_assert_eq!(self.width(exp), ebits);
        debug_assert_eq!(self.width(sig), sbits - 1);

        let is_normal = self.is_normal(src);
        let one_1 = self.ubv(1, 1);
        let normal_sig = self.ctx.mk_concat(one_1, sig);
        let normal_exp = self.unbias(exp);

        let mut denormal_sig = self.ctx.mk_zero_ext(sig, 1);
        let denormal_exp = self.ubv(1, ebits);
        let denormal_exp = self.unbias(denormal_exp);

        let zero_e = self.ubv(0, ebits);
        let lz;
        if normalize {
            let zero_s = self.ubv(0, sbits);
            let is_sig_zero = self.eq(zero_s, denormal_sig);

            let lz_d = self.leading_zeros(denormal_sig, ebits);

            let norm_or_zero = self.or(is_normal, is_sig_zero);
            lz = self.ite(norm_or_zero, zero_e, lz_d);

            let shift = self.ite(is_sig_zero, zero_e, lz);
            debug_assert_eq!(self.width(shift), ebits);
            if ebits <= sbits {
                let q = self.ctx.mk_zero_ext(shift, sbits - ebits);
                denormal_sig = self.bvop(FuncKind::Bvshl, denormal_sig, q);
            } else {
                // the maximum shift is sbits, because after that the
                // significand is zero anyway, so the shift variable can
                // be cut down as long as the high bits are checked
                let zero_ems = self.ubv(0, ebits - sbits);
                let sbits_s = self.ubv(sbits, sbits);
                let sh = self.ctx.mk_extract(shift, ebits - 1, sbits);
                let is_sh_zero = self.eq(zero_ems, sh);
                let short_shift = self.ctx.mk_extract(shift, sbits - 1, 0);
                let sl = self.ite(is_sh_zero, short_shift, sbits_s);
                denormal_sig = self.bvop(FuncKind::Bvshl, denormal_sig, sl);
            }
        } else {
            lz = zero_e;
        }

        let sig = self.ite(is_normal, normal_sig, denormal_sig);
        let exp = self.ite(is_normal, normal_exp, denormal_exp);

        debug_assert_eq!(self.width(sig), sbits);
        debug_assert_eq!(self.width(exp), ebits);
        Unpacked { sgn, sig, exp, lz }
    }

    /// The rounding decision bit, from mode, sign, the last kept bit,
    /// the round bit and the sticky bit:
    /// RNE `round & (last | sticky)`, RTA `round`,
    /// RTP `!sgn & (round | sticky)`, RTN `sgn & (round | sticky)`,
    /// RTZ `0`.
    fn rounding_decision(
        &mut self,
        rm: TermId,
        sgn: TermId,
        last: TermId,
        round: TermId,
        sticky: TermId,
    ) -> TermId {
        let last_or_sticky = self.bvor(last, sticky);
        let round_or_sticky = self.bvor(round, sticky);

        let not_round = self.bvnot(round);
        let not_lors = self.bvnot(last_or_sticky);
        let not_rors = self.bvnot(round_or_sticky);
        let not_sgn = self.bvnot(sgn);

        let inner_teven = self.bvor(not_round, not_lors);
        let inc_teven = self.bvnot(inner_teven);
        let inc_taway = round;
        let inner_pos = self.bvor(sgn, not_rors);
        let inc_pos = self.bvnot(inner_pos);
        let inner_neg = self.bvor(not_sgn, not_rors);
        let inc_neg = self.bvnot(inner_neg);

        let nil_1 = self.ubv(0, 1);

        let rm_is_to_neg = self.is_rm(rm, RoundingMode::Rtn);
        let rm_is_to_pos = self.is_rm(rm, RoundingMode::Rtp);
        let rm_is_away = self.is_rm(rm, RoundingMode::Rta);
        let rm_is_even = self.is_rm(rm, RoundingMode::Rne);

        let inc_c4 = self.ite(rm_is_to_neg, inc_neg, nil_1);
        let inc_c3 = self.ite(rm_is_to_pos, inc_pos, inc_c4);
        let inc_c2 = self.ite(rm_is_away, inc_taway, inc_c3);
        self.ite(rm_is_even, inc_teven, inc_c2)
    }

    /// The shared rounder. `sig` is an `sbits + 4` bit significand of
    /// the form `f[-1:0] . f[1:sbits-1] [guard, round, sticky]`, `exp`
    /// is an `ebits + 2` bit signed exponent; the result is a packed
    /// value of the `(ebits, sbits)` sort.
    pub fn round(
        &mut self,
        rm: TermId,
        sgn: TermId,
        sig: TermId,
        exp: TermId,
        ebits: u32,
        sbits: u32,
    ) -> TermId {
        debug_assert_eq!(self.width(sig), sbits + 4);
        debug_assert_eq!(self.width(exp), ebits + 2);

        let e_min = self.mk_min_exp(ebits);
        let e_max = self.mk_max_exp(ebits);

        let one_1 = self.ubv(1, 1);
        let h_exp = self.ctx.mk_extract(exp, ebits + 1, ebits + 1);
        let sh_exp = self.ctx.mk_extract(exp, ebits, ebits);
        let th_exp = self.ctx.mk_extract(exp, ebits - 1, ebits - 1);
        let e3 = self.eq(h_exp, one_1);
        let e2 = self.eq(sh_exp, one_1);
        let e1 = self.eq(th_exp, one_1);
        let e21 = self.or(e2, e1);
        let ne3 = self.not(e3);
        let e_top_three = self.and(ne3, e21);

        let ext_emax = self.ctx.mk_zero_ext(e_max, 2);
        let t_sig = self.ctx.mk_extract(sig, sbits + 3, sbits + 3);
        let e_eq_emax = self.eq(ext_emax, exp);
        let sigm1 = self.eq(t_sig, one_1);
        let e_eq_emax_and_sigm1 = self.and(e_eq_emax, sigm1);
        let ovf1 = self.or(e_top_three, e_eq_emax_and_sigm1);

        let lz = self.leading_zeros(sig, ebits + 2);

        let one_e2 = self.ubv(1, ebits + 2);
        let t = self.bvadd(exp, one_e2);
        let t = self.bvsub(t, lz);
        let e_min_ext = self.ctx.mk_sign_ext(e_min, 2);
        let t = self.bvsub(t, e_min_ext);
        let minus_one_e2 = self.ubv(power2m1(ebits + 2), ebits + 2);
        let tiny = self.bvsle(t, minus_one_e2);

        let exp_m_lz = self.bvsub(exp, lz);
        let beta = self.bvadd(exp_m_lz, one_e2);

        let sigma_add = self.bvsub(exp, e_min_ext);
        let sigma_add = self.bvadd(sigma_add, one_e2);
        let sigma = self.ite(tiny, sigma_add, lz);

        // Normalization shift
        let sig_size = sbits + 4;
        let sigma_size = ebits + 2;

        let sigma_neg = self.bvneg(sigma);
        let sigma_cap = self.ubv(sbits + 2, sigma_size);
        let sigma_le_cap = self.bvule(sigma_neg, sigma_cap);
        let sigma_neg_capped = self.ite(sigma_le_cap, sigma_neg, sigma_cap);
        let minus_one_ss = self.ubv(power2m1(sigma_size), sigma_size);
        let sigma_lt_zero = self.bvsle(sigma, minus_one_ss);

        let zeros_ss = self.ubv(0, sig_size);
        let sig_ext = self.ctx.mk_concat(sig, zeros_ss);
        let rshift = self.ctx.mk_zero_ext(sigma_neg_capped, 2 * sig_size - sigma_size);
        let rs_sig = self.bvop(FuncKind::Bvlshr, sig_ext, rshift);
        let lshift = self.ctx.mk_zero_ext(sigma, 2 * sig_size - sigma_size);
        let ls_sig = self.bvop(FuncKind::Bvshl, sig_ext, lshift);
        let big_sh_sig = self.ite(sigma_lt_zero, rs_sig, ls_sig);

        let sig_extract_low_bit = (2 * sig_size - 1) - (sbits + 2) + 1;
        let sig = self.ctx.mk_extract(big_sh_sig, 2 * sig_size - 1, sig_extract_low_bit);
        let dropped = self.ctx.mk_extract(big_sh_sig, sig_extract_low_bit - 1, 0);
        let sticky = self.ctx.mk_bvredor(dropped);

        // fold the sticky bit into the significand
        let ext_sticky = self.ctx.mk_zero_ext(sticky, sbits + 1);
        let sig = self.bvor(sig, ext_sticky);

        let ext_emin = self.ctx.mk_zero_ext(e_min, 2);
        let exp = self.ite(tiny, ext_emin, beta);

        // Significand rounding
        let sticky = self.ctx.mk_extract(sig, 0, 0);
        let round = self.ctx.mk_extract(sig, 1, 1);
        let last = self.ctx.mk_extract(sig, 2, 2);

        let sig = self.ctx.mk_extract(sig, sbits + 1, 2);

        let inc = self.rounding_decision(rm, sgn, last, round, sticky);

        let sig_ext1 = self.ctx.mk_zero_ext(sig, 1);
        let inc_ext = self.ctx.mk_zero_ext(inc, sbits);
        let sig = self.bvadd(sig_ext1, inc_ext);

        let t_sig = self.ctx.mk_extract(sig, sbits, sbits);
        let sig_ovf = self.eq(t_sig, one_1);

        let hallbut1_sig = self.ctx.mk_extract(sig, sbits, 1);
        let lallbut1_sig = self.ctx.mk_extract(sig, sbits - 1, 0);
        let sig = self.ite(sig_ovf, hallbut1_sig, lallbut1_sig);

        let exp_p1 = self.bvadd(exp, one_e2);
        let exp = self.ite(sig_ovf, exp_p1, exp);

        // Exponent adjustment and rounding
        let exp_low = self.ctx.mk_extract(exp, ebits - 1, 0);
        let biased_exp = self.bias(exp_low);

        let exp_redand = self.ctx.mk_bvredand(biased_exp);
        let pre_ovf2 = self.eq(exp_redand, one_1);
        let ovf2 = self.and(sig_ovf, pre_ovf2);
        let pem2m1 = self.ubv(power2m1(ebits - 2), ebits);
        let biased_exp = self.ite(ovf2, pem2m1, biased_exp);
        let ovf = self.or(ovf1, ovf2);

        let top_exp = self.mk_top_exp(ebits);
        let bot_exp = self.mk_bot_exp(ebits);

        let nil_1 = self.ubv(0, 1);

        let rm_is_to_zero = self.is_rm(rm, RoundingMode::Rtz);
        let rm_is_to_neg = self.is_rm(rm, RoundingMode::Rtn);
        let rm_is_to_pos = self.is_rm(rm, RoundingMode::Rtp);
        let rm_zero_or_neg = self.or(rm_is_to_zero, rm_is_to_neg);
        let rm_zero_or_pos = self.or(rm_is_to_zero, rm_is_to_pos);

        let zero1 = self.ubv(0, 1);
        let sgn_is_zero = self.eq(sgn, zero1);

        let max_sig = self.ubv(power2m1(sbits - 1), sbits - 1);
        let max_exp_hi = self.ubv(power2m1(ebits - 1), ebits - 1);
        let max_exp_lo = self.ubv(0, 1);
        let max_exp = self.ctx.mk_concat(max_exp_hi, max_exp_lo);
        let inf_sig = self.ubv(0, sbits - 1);
        let inf_exp = top_exp;

        let max_inf_exp_neg = self.ite(rm_zero_or_pos, max_exp, inf_exp);
        let max_inf_exp_pos = self.ite(rm_zero_or_neg, max_exp, inf_exp);
        let ovfl_exp = self.ite(sgn_is_zero, max_inf_exp_pos, max_inf_exp_neg);
        let t_sig = self.ctx.mk_extract(sig, sbits - 1, sbits - 1);
        let n_d_check = self.eq(t_sig, nil_1);
        let n_d_exp = self.ite(n_d_check, bot_exp, biased_exp);
        let exp = self.ite(ovf, ovfl_exp, n_d_exp);

        let max_inf_sig_neg = self.ite(rm_zero_or_pos, max_sig, inf_sig);
        let max_inf_sig_pos = self.ite(rm_zero_or_neg, max_sig, inf_sig);
        let ovfl_sig = self.ite(sgn_is_zero, max_inf_sig_pos, max_inf_sig_neg);
        let rest_sig = self.ctx.mk_extract(sig, sbits - 2, 0);
        let sig = self.ite(ovf, ovfl_sig, rest_sig);

        let exp_sig = self.ctx.mk_concat(exp, sig);
        let packed = self.ctx.mk_concat(sgn, exp_sig);
        self.pack(packed, ebits, sbits)
    }

    pub fn add(&mut self, x: TermId, y: TermId, rm: TermId) -> TermId {
        let sort = self.ctx.sort_of(x);
        assert_eq!(sort, self.ctx.sort_of(y));
        let ebits = sort.exponent_width();
        let sbits = sort.significand_width();

        let nan = self.nan(ebits, sbits);
        let pzero = self.pzero(ebits, sbits);
        let nzero = self.nzero(ebits, sbits);

        let x_is_nan = self.is_nan(x);
        let y_is_nan = self.is_nan(y);
        let x_is_zero = self.is_zero(x);
        let y_is_zero = self.is_zero(y);
        let x_is_inf = self.is_inf(x);
        let y_is_inf = self.is_inf(y);
        let x_is_pos = self.is_positive(x);
        let y_is_pos = self.is_positive(y);

        let rm_is_to_neg = self.is_rm(rm, RoundingMode::Rtn);
        let signed_zero = self.ite(rm_is_to_neg, nzero, pzero);

        // (x is NaN) || (y is NaN) -> NaN
        let c1 = self.or(x_is_nan, y_is_nan);
        let v1 = nan;

        // (x is +-oo) -> NaN if y is the opposite infinity, else x
        let c2 = x_is_inf;
        let signs_differ = self.xor(x_is_pos, y_is_pos);
        let opposite_inf = self.and(y_is_inf, signs_differ);
        let v2 = self.ite(opposite_inf, nan, x);

        // (y is +-oo) -> y
        let c3 = y_is_inf;
        let v3 = y;

        // both zero -> keep the shared sign, or the mode-dependent zero
        let c4 = self.and(x_is_zero, y_is_zero);
        let v4 = self.ite(signs_differ, signed_zero, x);

        // one zero -> the other operand
        let c5 = x_is_zero;
        let v5 = y;
        let c6 = y_is_zero;
        let v6 = x;

        // else comes the actual addition
        let a = self.unpack(x, true);
        let b = self.unpack(y, true);

        let a_exp_ext = self.ctx.mk_sign_ext(a.exp, 2);
        let a_lz_ext = self.ctx.mk_zero_ext(a.lz, 2);
        let ea = self.bvsub(a_exp_ext, a_lz_ext);
        let b_exp_ext = self.ctx.mk_sign_ext(b.exp, 2);
        let b_lz_ext = self.ctx.mk_zero_ext(b.lz, 2);
        let eb = self.bvsub(b_exp_ext, b_lz_ext);

        // order so that c has the larger exponent
        let swap = self.bvslt(ea, eb);
        let c_sgn = self.ite(swap, b.sgn, a.sgn);
        let c_sig = self.ite(swap, b.sig, a.sig);
        let c_exp = self.ite(swap, eb, ea);
        let d_sgn = self.ite(swap, a.sgn, b.sgn);
        let d_sig = self.ite(swap, a.sig, b.sig);
        let d_exp = self.ite(swap, ea, eb);

        let delta = self.bvsub(c_exp, d_exp);
        let cap = self.ubv(sbits + 3, ebits + 2);
        let delta_le_cap = self.bvsle(delta, cap);
        let delta = self.ite(delta_le_cap, delta, cap);

        // significands as [carry].[unit].[fraction][g r s]
        let w = sbits + 4;
        let zero1 = self.ubv(0, 1);
        let grs = self.ubv(0, 3);
        let c_sig_grs = self.ctx.mk_concat(c_sig, grs);
        let c_big = self.ctx.mk_concat(zero1, c_sig_grs);
        let d_sig_grs = self.ctx.mk_concat(d_sig, grs);
        let d_big = self.ctx.mk_concat(zero1, d_sig_grs);

        // align d, collecting the shifted-out bits into sticky
        let zeros_w = self.ubv(0, w);
        let d_ext = self.ctx.mk_concat(d_big, zeros_w);
        let shift = self.ctx.mk_zero_ext(delta, 2 * w - (ebits + 2));
        let d_shifted = self.bvop(FuncKind::Bvlshr, d_ext, shift);
        let d_kept = self.ctx.mk_extract(d_shifted, 2 * w - 1, w);
        let d_dropped = self.ctx.mk_extract(d_shifted, w - 1, 0);
        let d_sticky = self.ctx.mk_bvredor(d_dropped);
        let d_sticky_ext = self.ctx.mk_zero_ext(d_sticky, w - 1);
        let d_aligned = self.bvor(d_kept, d_sticky_ext);

        let same_sign = self.eq(c_sgn, d_sgn);
        let sum = self.bvadd(c_big, d_aligned);
        let c_lt_d = self.bvult(c_big, d_aligned);
        let c_m_d = self.bvsub(c_big, d_aligned);
        let d_m_c = self.bvsub(d_aligned, c_big);
        let mag = self.ite(c_lt_d, d_m_c, c_m_d);
        let diff_sgn = self.ite(c_lt_d, d_sgn, c_sgn);

        let res_sig = self.ite(same_sign, sum, mag);
        let res_sgn = self.ite(same_sign, c_sgn, diff_sgn);

        let zero_w = self.ubv(0, w);
        let cancelled = self.eq(mag, zero_w);
        let cancel = self.not(same_sign);
        let cancel = self.and(cancel, cancelled);

        let rounded = self.round(rm, res_sgn, res_sig, c_exp, ebits, sbits);
        let v7 = self.ite(cancel, signed_zero, rounded);

        // tie the special cases together
        let result = self.ite(c6, v6, v7);
        let result = self.ite(c5, v5, result);
        let result = self.ite(c4, v4, result);
        let result = self.ite(c3, v3, result);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    pub fn sub(&mut self, x: TermId, y: TermId, rm: TermId) -> TermId {
        let t = self.neg(y);
        self.add(x, t, rm)
    }

    pub fn mul(&mut self, x: TermId, y: TermId, rm: TermId) -> TermId {
        let sort = self.ctx.sort_of(x);
        assert_eq!(sort, self.ctx.sort_of(y));
        let ebits = sort.exponent_width();
        let sbits = sort.significand_width();

        let nan = self.nan(ebits, sbits);
        let nzero = self.nzero(ebits, sbits);
        let pzero = self.pzero(ebits, sbits);
        let ninf = self.ninf(ebits, sbits);
        let pinf = self.pinf(ebits, sbits);

        let x_is_nan = self.is_nan(x);
        let x_is_zero = self.is_zero(x);
        let x_is_pos = self.is_positive(x);
        let y_is_nan = self.is_nan(y);
        let y_is_zero = self.is_zero(y);
        let y_is_pos = self.is_positive(y);

        // (x is NaN) || (y is NaN) -> NaN
        let c1 = self.or(x_is_nan, y_is_nan);
        let v1 = nan;

        // (x is +oo) -> if (y is 0) then NaN else inf with y's sign
        let c2 = self.is_pinf(x);
        let y_sgn_inf = self.ite(y_is_pos, pinf, ninf);
        let v2 = self.ite(y_is_zero, nan, y_sgn_inf);

        // (y is +oo) -> if (x is 0) then NaN else inf with x's sign
        let c3 = self.is_pinf(y);
        let x_sgn_inf = self.ite(x_is_pos, pinf, ninf);
        let v3 = self.ite(x_is_zero, nan, x_sgn_inf);

        // (x is -oo) -> if (y is 0) then NaN else inf with -y's sign
        let c4 = self.is_ninf(x);
        let neg_y_sgn_inf = self.ite(y_is_pos, ninf, pinf);
        let v4 = self.ite(y_is_zero, nan, neg_y_sgn_inf);

        // (y is -oo) -> if (x is 0) then NaN else inf with -x's sign
        let c5 = self.is_ninf(y);
        let neg_x_sgn_inf = self.ite(x_is_pos, ninf, pinf);
        let v5 = self.ite(x_is_zero, nan, neg_x_sgn_inf);

        // (x is 0) || (y is 0) -> zero with sign = x.sign ^ y.sign
        let c6 = self.or(x_is_zero, y_is_zero);
        let sign_xor = self.xor(x_is_pos, y_is_pos);
        let v6 = self.ite(sign_xor, nzero, pzero);

        // else comes the actual multiplication
        let a = self.unpack(x, true);
        let b = self.unpack(y, true);

        let a_lz_ext = self.ctx.mk_zero_ext(a.lz, 2);
        let b_lz_ext = self.ctx.mk_zero_ext(b.lz, 2);

        let a_sig_ext = self.ctx.mk_zero_ext(a.sig, sbits);
        let b_sig_ext = self.ctx.mk_zero_ext(b.sig, sbits);

        // the unpacked exponents are signed
        let a_exp_ext = self.ctx.mk_sign_ext(a.exp, 2);
        let b_exp_ext = self.ctx.mk_sign_ext(b.exp, 2);

        let res_sgn = self.bvop(FuncKind::Bvxor, a.sgn, b.sgn);

        let a_exp_m_lz = self.bvsub(a_exp_ext, a_lz_ext);
        let b_exp_m_lz = self.bvsub(b_exp_ext, b_lz_ext);
        let res_exp = self.bvadd(a_exp_m_lz, b_exp_m_lz);

        let product = self.bvop(FuncKind::Bvmul, a_sig_ext, b_sig_ext);
        debug_assert_eq!(self.width(product), 2 * sbits);

        let h_p = self.ctx.mk_extract(product, 2 * sbits - 1, sbits);
        let l_p = self.ctx.mk_extract(product, sbits - 1, 0);

        let rbits = if sbits >= 4 {
            let low = self.ctx.mk_extract(product, sbits - 4, 0);
            let sticky = self.ctx.mk_bvredor(low);
            let high3 = self.ctx.mk_extract(product, sbits - 1, sbits - 3);
            self.ctx.mk_concat(high3, sticky)
        } else {
            let zeros = self.ubv(0, 4 - sbits);
            self.ctx.mk_concat(l_p, zeros)
        };
        debug_assert_eq!(self.width(rbits), 4);
        let res_sig = self.ctx.mk_concat(h_p, rbits);

        let v7 = self.round(rm, res_sgn, res_sig, res_exp, ebits, sbits);

        // tie the special cases together
        let result = self.ite(c6, v6, v7);
        let result = self.ite(c5, v5, result);
        let result = self.ite(c4, v4, result);
        let result = self.ite(c3, v3, result);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    pub fn div(&mut self, x: TermId, y: TermId, rm: TermId) -> TermId {
        let sort = self.ctx.sort_of(x);
        assert_eq!(sort, self.ctx.sort_of(y));
        let ebits = sort.exponent_width();
        let sbits = sort.significand_width();

        let nan = self.nan(ebits, sbits);
        let nzero = self.nzero(ebits, sbits);
        let pzero = self.pzero(ebits, sbits);
        let ninf = self.ninf(ebits, sbits);
        let pinf = self.pinf(ebits, sbits);

        let x_is_nan = self.is_nan(x);
        let x_is_zero = self.is_zero(x);
        let x_is_pos = self.is_positive(x);
        let x_is_inf = self.is_inf(x);
        let y_is_nan = self.is_nan(y);
        let y_is_zero = self.is_zero(y);
        let y_is_pos = self.is_positive(y);
        let y_is_inf = self.is_inf(y);

        // (x is NaN) || (y is NaN) -> NaN
        let c1 = self.or(x_is_nan, y_is_nan);
        let v1 = nan;

        // (x is +oo) -> if (y is oo) then NaN else inf with y's sign
        let c2 = self.is_pinf(x);
        let y_sgn_inf = self.ite(y_is_pos, pinf, ninf);
        let v2 = self.ite(y_is_inf, nan, y_sgn_inf);

        // (y is +oo) -> if (x is oo) then NaN else 0 with sign x.sgn ^ y.sgn
        let c3 = self.is_pinf(y);
        let signs_xor = self.xor(x_is_pos, y_is_pos);
        let xy_zero = self.ite(signs_xor, nzero, pzero);
        let v3 = self.ite(x_is_inf, nan, xy_zero);

        // (x is -oo) -> if (y is oo) then NaN else inf with -y's sign
        let c4 = self.is_ninf(x);
        let neg_y_sgn_inf = self.ite(y_is_pos, ninf, pinf);
        let v4 = self.ite(y_is_inf, nan, neg_y_sgn_inf);

        // (y is -oo) -> if (x is oo) then NaN else 0 with sign x.sgn ^ y.sgn
        let c5 = self.is_ninf(y);
        let v5 = self.ite(x_is_inf, nan, xy_zero);

        // (y is 0) -> if (x is 0) then NaN else inf with xor sign
        let c6 = y_is_zero;
        let sgn_inf = self.ite(signs_xor, ninf, pinf);
        let v6 = self.ite(x_is_zero, nan, sgn_inf);

        // (x is 0) -> zero with sign x.sgn ^ y.sgn; this avoids
        // problems with the unpacking of zero
        let c7 = x_is_zero;
        let v7 = self.ite(signs_xor, nzero, pzero);

        // else comes the actual division
        assert!(ebits <= sbits);

        let a = self.unpack(x, true);
        let b = self.unpack(y, true);

        let extra_bits = sbits + 2;
        let zeros_se = self.ubv(0, sbits + extra_bits);
        let a_sig_ext = self.ctx.mk_concat(a.sig, zeros_se);
        let b_sig_ext = self.ctx.mk_zero_ext(b.sig, sbits + extra_bits);

        let a_exp_ext = self.ctx.mk_sign_ext(a.exp, 2);
        let b_exp_ext = self.ctx.mk_sign_ext(b.exp, 2);

        let res_sgn = self.bvop(FuncKind::Bvxor, a.sgn, b.sgn);

        let a_lz_ext = self.ctx.mk_zero_ext(a.lz, 2);
        let b_lz_ext = self.ctx.mk_zero_ext(b.lz, 2);

        let a_exp_m_lz = self.bvsub(a_exp_ext, a_lz_ext);
        let b_exp_m_lz = self.bvsub(b_exp_ext, b_lz_ext);
        let res_exp = self.bvsub(a_exp_m_lz, b_exp_m_lz);

        // b_sig_ext cannot be zero here, the y == 0 case is handled above
        let quotient = self.bvop(FuncKind::Bvudiv, a_sig_ext, b_sig_ext);
        debug_assert_eq!(self.width(quotient), sbits + sbits + extra_bits);

        let q_low = self.ctx.mk_extract(quotient, extra_bits - 2, 0);
        let sticky = self.ctx.mk_bvredor(q_low);
        let q_high = self.ctx.mk_extract(quotient, extra_bits + sbits + 1, extra_bits - 1);
        let res_sig = self.ctx.mk_concat(q_high, sticky);
        debug_assert_eq!(self.width(res_sig), sbits + 4);

        let res_sig_lz = self.leading_zeros(res_sig, sbits + 4);
        let one_s4 = self.ubv(1, sbits + 4);
        let res_sig_shift_amount = self.bvsub(res_sig_lz, one_s4);
        let shift_cond = self.bvule(res_sig_lz, one_s4);
        let res_sig_shifted = self.bvop(FuncKind::Bvshl, res_sig, res_sig_shift_amount);
        let shift_low = self.ctx.mk_extract(res_sig_shift_amount, ebits + 1, 0);
        let res_exp_shifted = self.bvsub(res_exp, shift_low);
        let res_sig = self.ite(shift_cond, res_sig, res_sig_shifted);
        let res_exp = self.ite(shift_cond, res_exp, res_exp_shifted);

        let v8 = self.round(rm, res_sgn, res_sig, res_exp, ebits, sbits);

        // tie the special cases together
        let result = self.ite(c7, v7, v8);
        let result = self.ite(c6, v6, result);
        let result = self.ite(c5, v5, result);
        let result = self.ite(c4, v4, result);
        let result = self.ite(c3, v3, result);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    pub fn sqrt(&mut self, x: TermId, rm: TermId) -> TermId {
        let sort = self.ctx.sort_of(x);
        let ebits = sort.exponent_width();
        let sbits = sort.significand_width();

        let nan = self.nan(ebits, sbits);

        let zero1 = self.ubv(0, 1);
        let one1 = self.ubv(1, 1);

        // (x is NaN) -> NaN
        let c1 = self.is_nan(x);
        let v1 = nan;

        // (x is +oo) -> +oo
        let c2 = self.is_pinf(x);
        let v2 = x;

        // (x is +-0) -> +-0
        let c3 = self.is_zero(x);
        let v3 = x;

        // (x < 0) -> NaN
        let c4 = self.is_negative(x);
        let v4 = nan;

        // else comes the actual square root
        let a = self.unpack(x, true);

        debug_assert_eq!(self.width(a.sig), sbits);
        debug_assert_eq!(self.width(a.exp), ebits);

        let res_sgn = zero1;

        let a_exp_ext = self.ctx.mk_sign_ext(a.exp, 1);
        let a_lz_ext = self.ctx.mk_zero_ext(a.lz, 1);
        let real_exp = self.bvsub(a_exp_ext, a_lz_ext);
        let real_exp_high = self.ctx.mk_extract(real_exp, ebits, 1);
        let res_exp = self.ctx.mk_sign_ext(real_exp_high, 2);

        let real_exp_low = self.ctx.mk_extract(real_exp, 0, 0);
        let e_is_odd = self.eq(real_exp_low, one1);

        let a_z = self.ctx.mk_concat(a.sig, zero1);
        let z_a = self.ctx.mk_concat(zero1, a.sig);
        let sig_prime = self.ite(e_is_odd, a_z, z_a);
        debug_assert_eq!(self.width(sig_prime), sbits + 1);

        // digit recurrence, algorithm 10.2 in the Handbook of
        // Floating-Point Arithmetic
        let mut q = self.ubv(power2(sbits + 3), sbits + 5);
        let zeros4 = self.ubv(0, 4);
        let sig_prime_ext = self.ctx.mk_concat(sig_prime, zeros4);
        let mut r = self.bvsub(sig_prime_ext, q);
        let mut s = q;

        for _ in 0..sbits + 3 {
            s = {
                let s_shifted = self.ctx.mk_extract(s, sbits + 4, 1);
                self.ctx.mk_concat(zero1, s_shifted)
            };

            let q_ext = self.ctx.mk_concat(q, zero1);
            let s_ext = self.ctx.mk_concat(zero1, s);
            let two_q_plus_s = self.bvadd(q_ext, s_ext);
            let r_ext = self.ctx.mk_concat(r, zero1);
            let t = self.bvsub(r_ext, two_q_plus_s);

            debug_assert_eq!(self.width(t), sbits + 6);

            let t_top = self.ctx.mk_extract(t, sbits + 5, sbits + 5);
            let t_lt_0 = self.eq(t_top, one1);

            let q_or_s = self.bvor(q, s);
            q = self.ite(t_lt_0, q, q_or_s);
            let r_low = self.ctx.mk_extract(r, sbits + 3, 0);
            let r_shftd = self.ctx.mk_concat(r_low, zero1);
            let t_low = self.ctx.mk_extract(t, sbits + 4, 0);
            r = self.ite(t_lt_0, r_shftd, t_low);
        }

        let zero_s5 = self.ubv(0, sbits + 5);
        let is_exact = self.eq(r, zero_s5);

        let last = self.ctx.mk_extract(q, 0, 0);
        let rest = self.ctx.mk_extract(q, sbits + 3, 1);
        let rest_ext = self.ctx.mk_zero_ext(rest, 1);
        let last_ext = self.ctx.mk_zero_ext(last, sbits + 3);
        let one_s4 = self.ubv(1, sbits + 4);
        let sticky = self.ite(is_exact, last_ext, one_s4);
        let res_sig = self.bvor(rest_ext, sticky);

        debug_assert_eq!(self.width(res_sig), sbits + 4);

        let v5 = self.round(rm, res_sgn, res_sig, res_exp, ebits, sbits);

        // tie the special cases together
        let result = self.ite(c4, v4, v5);
        let result = self.ite(c3, v3, result);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    fn to_bv(&mut self, x: TermId, rm: TermId, is_signed: bool, width: u32) -> TermId {
        let xs = self.ctx.sort_of(x);
        let sbits = xs.significand_width();
        let bv_sz = width;

        let bv0 = self.ubv(0, 1);
        let bv1 = self.ubv(1, 1);

        let x_is_nan = self.is_nan(x);
        let x_is_inf = self.is_inf(x);
        let x_is_zero = self.is_zero(x);
        let x_is_neg = self.is_negative(x);

        // NaN or Inf -> unspecified
        let c1 = self.or(x_is_nan, x_is_inf);
        let unspec_v = self.fresh_unspecified(width);
        let v1 = unspec_v;

        // +-0 -> 0
        let c2 = x_is_zero;
        let v2 = self.ubv(0, width);

        // Otherwise...
        let u = self.unpack(x, true);
        let (sgn, exp, lz) = (u.sgn, u.exp, u.lz);
        let mut sig = u.sig;

        // the unpacked value reads +- [1].[sig] * 2^(exp - lz)
        debug_assert_eq!(self.width(sgn), 1);
        debug_assert_eq!(self.width(sig), sbits);

        let mut sig_sz = sbits;
        if sig_sz < bv_sz + 3 {
            let zeros = self.ubv(0, bv_sz - sig_sz + 3);
            sig = self.ctx.mk_concat(sig, zeros);
        }
        sig_sz = self.width(sig);
        debug_assert!(sig_sz >= bv_sz + 3);

        // the significand now reads +- [1].[sig][g][r][s] and is at least bv_sz + 3 wide
        let exp_ext = self.ctx.mk_sign_ext(exp, 2);
        let lz_ext = self.ctx.mk_zero_ext(lz, 2);
        let exp_m_lz = self.bvsub(exp_ext, lz_ext);

        // widen so the integer part has room for bv_sz + 2 bits
        let sig_ext2 = self.ctx.mk_zero_ext(sig, bv_sz + 2);
        let big_sig = self.ctx.mk_concat(sig_ext2, bv0);
        let big_sig_sz = sig_sz + 1 + bv_sz + 2;
        debug_assert_eq!(self.width(big_sig), big_sig_sz);

        let exp_m_lz_width = self.width(exp_m_lz);
        let zero_emlz = self.ubv(0, exp_m_lz_width);
        let is_neg_shift = self.bvsle(exp_m_lz, zero_emlz);
        let neg_shift = self.bvneg(exp_m_lz);
        let mut shift = self.ite(is_neg_shift, neg_shift, exp_m_lz);
        if exp_m_lz_width < big_sig_sz {
            shift = self.ctx.mk_zero_ext(shift, big_sig_sz - exp_m_lz_width);
        } else if exp_m_lz_width > big_sig_sz {
            let upper = self.ctx.mk_extract(shift, exp_m_lz_width - 1, big_sig_sz);
            let lower = self.ctx.mk_extract(shift, big_sig_sz - 1, 0);
            let upper_w = self.width(upper);
            let zero_u = self.ubv(0, upper_w);
            let upper_is_zero = self.eq(upper, zero_u);
            let capped = self.ubv(big_sig_sz - 1, big_sig_sz);
            shift = self.ite(upper_is_zero, lower, capped);
        }

        let shift_limit = self.ubv(bv_sz + 2, self.width(shift));
        let shift_in_limit = self.bvule(shift, shift_limit);
        shift = self.ite(shift_in_limit, shift, shift_limit);

        let shifted_right = self.bvop(FuncKind::Bvlshr, big_sig, shift);
        let shifted_left = self.bvop(FuncKind::Bvshl, big_sig, shift);
        let big_sig_shifted = self.ite(is_neg_shift, shifted_right, shifted_left);
        let int_part =
            self.ctx.mk_extract(big_sig_shifted, big_sig_sz - 1, big_sig_sz - (bv_sz + 3));
        debug_assert_eq!(self.width(int_part), bv_sz + 3);
        let last = self
            .ctx
            .mk_extract(big_sig_shifted, big_sig_sz - (bv_sz + 3), big_sig_sz - (bv_sz + 3));
        let round = self
            .ctx
            .mk_extract(big_sig_shifted, big_sig_sz - (bv_sz + 4), big_sig_sz - (bv_sz + 4));
        let stickies = self.ctx.mk_extract(big_sig_shifted, big_sig_sz - (bv_sz + 5), 0);
        let sticky = self.ctx.mk_bvredor(stickies);

        let rounding_decision = self.rounding_decision(rm, sgn, last, round, sticky);
        debug_assert_eq!(self.width(rounding_decision), 1);

        let inc = self.ctx.mk_zero_ext(rounding_decision, bv_sz + 2);
        let pre_rounded = self.bvadd(int_part, inc);

        let neg_pre = self.bvneg(pre_rounded);
        let pre_rounded = self.ite(x_is_neg, neg_pre, pre_rounded);

        let (ll, ul) = if !is_signed {
            let ll = self.ubv(0, bv_sz + 3);
            let ones_sz = self.ubv(power2m1(bv_sz), bv_sz);
            let ul = self.ctx.mk_zero_ext(ones_sz, 3);
            (ll, ul)
        } else {
            let zeros_low = self.ubv(0, bv_sz - 1);
            let min_body = self.ctx.mk_concat(bv1, zeros_low);
            let ll = self.ctx.mk_sign_ext(min_body, 3);
            let ones_m1 = self.ubv(power2m1(bv_sz - 1), bv_sz - 1);
            let ul = self.ctx.mk_zero_ext(ones_m1, 4);
            (ll, ul)
        };
        let ll_le = self.bvsle(ll, pre_rounded);
        let le_ul = self.bvsle(pre_rounded, ul);
        let in_range = self.and(ll_le, le_ul);

        let rounded = self.ctx.mk_extract(pre_rounded, bv_sz - 1, 0);

        let out_of_range = self.not(in_range);
        let result = self.ite(out_of_range, unspec_v, rounded);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    pub fn to_ubv(&mut self, x: TermId, rm: TermId, width: u32) -> TermId {
        self.to_bv(x, rm, false, width)
    }

    pub fn to_sbv(&mut self, x: TermId, rm: TermId, width: u32) -> TermId {
        self.to_bv(x, rm, true, width)
    }

    fn from_bv(&mut self, x: TermId, to: Sort, rm: TermId, is_signed: bool) -> TermId {
        let ebits = to.exponent_width();
        let sbits = to.significand_width();
        let mut bv_sz = self.width(x);

        let bv0_1 = self.ubv(0, 1);
        let bv1_1 = self.ubv(1, 1);
        let bv0_sz = self.ubv(0, bv_sz);

        let is_zero = self.eq(x, bv0_sz);
        let pzero = self.pzero(ebits, sbits);

        // x == 0 -> +0
        let c1 = is_zero;
        let v1 = pzero;

        // x != 0: the sign and magnitude of the input
        let (sgn, x_abs) = if is_signed {
            let is_neg_bit = self.ctx.mk_extract(x, bv_sz - 1, bv_sz - 1);
            let is_neg = self.eq(is_neg_bit, bv1_1);
            let neg_x = self.bvneg(x);
            let x_abs = self.ite(is_neg, neg_x, x);
            (is_neg_bit, x_abs)
        } else {
            (bv0_1, x)
        };

        // the top bit of x_abs is the unit bit for the rounder
        let mut lz = self.leading_zeros(x_abs, bv_sz);
        let shifted_sig = self.bvop(FuncKind::Bvshl, x_abs, lz);

        // we want extra rounding bits
        let sig_sz = sbits + 4;

        let mut sig_4;
        if sig_sz <= bv_sz {
            let kept = self.ctx.mk_extract(shifted_sig, bv_sz - 1, bv_sz - sig_sz + 1);
            let sig_rest = self.ctx.mk_extract(shifted_sig, bv_sz - sig_sz, 0);
            let sticky = self.ctx.mk_bvredor(sig_rest);
            sig_4 = self.ctx.mk_concat(kept, sticky);
        } else {
            let extra_bits = sig_sz - bv_sz;
            let extra_zeros = self.ubv(0, extra_bits);
            sig_4 = self.ctx.mk_concat(shifted_sig, extra_zeros);
            let lz_ext = self.ctx.mk_concat(extra_zeros, lz);
            let extra = self.ubv(extra_bits, sig_sz);
            lz = self.bvadd(lz_ext, extra);
            bv_sz += extra_bits;
        }
        debug_assert_eq!(self.width(sig_4), sig_sz);

        let bv_sz_m2 = self.ubv(bv_sz - 2, bv_sz);
        let s_exp = self.bvsub(bv_sz_m2, lz);

        // s_exp is (bv_sz - 2) - lz, signed
        debug_assert_eq!(self.width(s_exp), bv_sz);

        let exp_sz = ebits + 2;
        let mut exp_2 = self.ctx.mk_extract(s_exp, exp_sz - 1, 0);

        // the exponent is at most bv_sz, so we need floor(log2(bv_sz)) + 1
        // exponent bits; the remaining bits are zero when ebits is large
        // enough
        let exp_worst_case_sz = 32 - (bv_sz as u32).leading_zeros();

        if exp_sz < exp_worst_case_sz {
            // take the maximum legal exponent to keep the most precision
            let max_exp = self.mk_max_exp(exp_sz);
            let max_exp_bvsz = self.ctx.mk_zero_ext(max_exp, bv_sz - exp_sz);
            let one_sz = self.ubv(1, bv_sz);
            let max_exp_p1 = self.bvadd(max_exp_bvsz, one_sz);
            let exp_too_large = self.bvule(max_exp_p1, s_exp);
            let zero_sig_sz = self.ubv(0, sig_sz);
            sig_4 = self.ite(exp_too_large, zero_sig_sz, sig_4);
            exp_2 = self.ite(exp_too_large, max_exp, exp_2);
        }

        debug_assert_eq!(self.width(sig_4), sbits + 4);
        debug_assert_eq!(self.width(exp_2), ebits + 2);

        let v2 = self.round(rm, sgn, sig_4, exp_2, ebits, sbits);

        self.ite(c1, v1, v2)
    }

    pub fn from_ubv(&mut self, x: TermId, to: Sort, rm: TermId) -> TermId {
        self.from_bv(x, to, rm, false)
    }

    pub fn from_sbv(&mut self, x: TermId, to: Sort, rm: TermId) -> TermId {
        self.from_bv(x, to, rm, true)
    }

    /// Conversion between floating-point sorts.
    pub fn to_fp(&mut self, x: TermId, to: Sort, rm: TermId) -> TermId {
        let from = self.ctx.sort_of(x);
        let from_sbits = from.significand_width();
        let from_ebits = from.exponent_width();
        let to_sbits = to.significand_width();
        let to_ebits = to.exponent_width();

        if from_sbits == to_sbits && from_ebits == to_ebits {
            return x;
        }

        let pinf = self.pinf(to_ebits, to_sbits);
        let ninf = self.ninf(to_ebits, to_sbits);

        // NaN -> NaN
        let c1 = self.is_nan(x);
        let v1 = self.nan(to_ebits, to_sbits);

        // +0 -> +0
        let c2 = self.is_pzero(x);
        let v2 = self.pzero(to_ebits, to_sbits);

        // -0 -> -0
        let c3 = self.is_nzero(x);
        let v3 = self.nzero(to_ebits, to_sbits);

        // +oo -> +oo
        let c4 = self.is_pinf(x);
        let v4 = pinf;

        // -oo -> -oo
        let c5 = self.is_ninf(x);
        let v5 = ninf;

        // otherwise: the actual conversion with rounding
        let u = self.unpack(x, true);
        let (sgn, sig, exp, lz) = (u.sgn, u.sig, u.exp, u.lz);

        let res_sgn = sgn;

        debug_assert_eq!(self.width(sig), from_sbits);
        debug_assert_eq!(self.width(exp), from_ebits);

        let mut res_sig = if from_sbits < to_sbits + 3 {
            // widen sig to at least to_sbits + 3 bits
            let zeros = self.ubv(0, to_sbits + 3 - from_sbits);
            self.ctx.mk_concat(sig, zeros)
        } else if from_sbits > to_sbits + 3 {
            // collapse the extra bits into a sticky bit
            let high = self.ctx.mk_extract(sig, from_sbits - 1, from_sbits - to_sbits - 2);
            debug_assert_eq!(self.width(high), to_sbits + 2);
            let low = self.ctx.mk_extract(sig, from_sbits - to_sbits - 3, 0);
            let sticky = self.ctx.mk_bvredor(low);
            self.ctx.mk_concat(high, sticky)
        } else {
            sig
        };

        // extra zero in the front for the rounder
        res_sig = self.ctx.mk_zero_ext(res_sig, 1);
        debug_assert_eq!(self.width(res_sig), to_sbits + 4);

        let res_exp = if from_ebits < to_ebits + 2 {
            let ext = self.ctx.mk_sign_ext(exp, to_ebits - from_ebits + 2);
            // subtract lz for subnormal numbers
            let lz_ext = self.ctx.mk_zero_ext(lz, to_ebits - from_ebits + 2);
            self.bvsub(ext, lz_ext)
        } else if from_ebits > to_ebits + 2 {
            let ebits_diff = from_ebits - (to_ebits + 2);

            // subtract lz for subnormal numbers
            let exp_ext = self.ctx.mk_sign_ext(exp, 2);
            let lz_ext = self.ctx.mk_sign_ext(lz, 2);
            let exp_sub_lz = self.bvsub(exp_ext, lz_ext);

            // check whether the exponent is within the roundable
            // (to_ebits + 2) range
            let max_exp_hi = self.ubv(power2m1(to_ebits), to_ebits + 1);
            let max_exp_lo = self.ubv(0, 1);
            let max_exp = self.ctx.mk_concat(max_exp_hi, max_exp_lo);
            let z = -power2(to_ebits + 1);
            let min_exp = self.sbv(z + 2, to_ebits + 2);

            let ovft = power2m1(to_ebits + 1);
            let first_ovf_exp = self.ubv(ovft, from_ebits + 2);
            let ones_hi = self.sbv(-1, ebits_diff + 3);
            let one_lo = self.ubv(1, to_ebits + 1);
            let first_udf_exp = self.ctx.mk_concat(ones_hi, one_lo);

            let exp_in_range = self.ctx.mk_extract(exp_sub_lz, to_ebits + 1, 0);
            debug_assert_eq!(self.width(exp_in_range), to_ebits + 2);

            let ovf_cond = self.bvsle(first_ovf_exp, exp_sub_lz);
            let udf_cond = self.bvsle(exp_sub_lz, first_udf_exp);

            let res_exp = exp_in_range;
            let res_exp = self.ite(ovf_cond, max_exp, res_exp);
            self.ite(udf_cond, min_exp, res_exp)
        } else {
            // from_ebits == to_ebits + 2
            self.bvsub(exp, lz)
        };

        debug_assert_eq!(self.width(res_exp), to_ebits + 2);

        let v6 = self.round(rm, res_sgn, res_sig, res_exp, to_ebits, to_sbits);

        // tie the special cases together
        let result = self.ite(c5, v5, v6);
        let result = self.ite(c4, v4, result);
        let result = self.ite(c3, v3, result);
        let result = self.ite(c2, v2, result);
        self.ite(c1, v1, result)
    }

    /// IEEE equality: true iff neither operand is NaN and the operands
    /// are both zero (of either sign) or bitwise equal.
    pub fn fp_eq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        let lhs_is_nan = self.is_nan(lhs);
        let rhs_is_nan = self.is_nan(rhs);
        let either_is_nan = self.or(lhs_is_nan, rhs_is_nan);

        let lhs_is_zero = self.is_zero(lhs);
        let rhs_is_zero = self.is_zero(rhs);
        let both_zero = self.and(lhs_is_zero, rhs_is_zero);

        let lhs_bv = self.as_bv(lhs);
        let rhs_bv = self.as_bv(rhs);
        let are_equal = self.eq(lhs_bv, rhs_bv);

        let either_zero_or_equal = self.or(both_zero, are_equal);
        let not_nan = self.not(either_is_nan);
        self.and(either_zero_or_equal, not_nan)
    }

    /// IEEE less-than: false on any NaN and on two zeros; otherwise an
    /// unsigned comparison of the exponent-significand slice when the
    /// signs agree, and the sign of the left operand when they differ.
    pub fn fp_lt(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        let lhs_is_nan = self.is_nan(lhs);
        let rhs_is_nan = self.is_nan(rhs);
        let either_is_nan = self.or(lhs_is_nan, rhs_is_nan);
        let not_nan = self.not(either_is_nan);

        let lhs_is_zero = self.is_zero(lhs);
        let rhs_is_zero = self.is_zero(rhs);
        let both_zero = self.and(lhs_is_zero, rhs_is_zero);
        let not_zero = self.not(both_zero);

        let lhs_exp_sig = self.extract_exp_sig(lhs);
        let lhs_sign = self.extract_signbit(lhs);
        let rhs_exp_sig = self.extract_exp_sig(rhs);
        let rhs_sign = self.extract_signbit(rhs);

        let signs_equal = self.eq(lhs_sign, rhs_sign);

        let ult = self.bvult(lhs_exp_sig, rhs_exp_sig);
        let ugt = self.bvult(rhs_exp_sig, lhs_exp_sig);

        let one1 = self.ubv(1, 1);
        let lhs_sign_eq_1 = self.eq(lhs_sign, one1);

        // both negative: the magnitude order flips
        let same_sign_lt = self.ite(lhs_sign_eq_1, ugt, ult);
        let comp = self.ite(signs_equal, same_sign_lt, lhs_sign_eq_1);

        let not_zeros_not_nan = self.and(not_zero, not_nan);
        self.and(not_zeros_not_nan, comp)
    }

    pub fn fp_gt(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        self.fp_lt(rhs, lhs)
    }

    pub fn fp_le(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        let lt = self.fp_lt(lhs, rhs);
        let eq = self.fp_eq(lhs, rhs);
        self.or(lt, eq)
    }

    pub fn fp_ge(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        let lt = self.fp_lt(lhs, rhs);
        self.not(lt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::TermArena;
    use num_bigint::BigUint;

    fn fp32(ctx: &mut TermArena, f: f32) -> TermId {
        let sort = ctx.mk_fp_sort(8, 24);
        let bv_sort = ctx.mk_bv_sort(false, 32);
        let bv = ctx.mk_smt_bv(bv_sort, BigInt::from(f.to_bits()));
        ctx.mk_reinterpret(bv, sort)
    }

    fn fp64(ctx: &mut TermArena, f: f64) -> TermId {
        let sort = ctx.mk_fp_sort(11, 53);
        let bv_sort = ctx.mk_bv_sort(false, 64);
        let bv = ctx.mk_smt_bv(bv_sort, BigInt::from(f.to_bits()));
        ctx.mk_reinterpret(bv, sort)
    }

    fn bits32(ctx: &TermArena, t: TermId) -> u32 {
        let bits = ctx.as_bits(t).expect("term did not fold to a constant");
        u32::try_from(bits.clone()).unwrap()
    }

    fn bits64(ctx: &TermArena, t: TermId) -> u64 {
        let bits = ctx.as_bits(t).expect("term did not fold to a constant");
        u64::try_from(bits.clone()).unwrap()
    }

    // the canonical quiet NaN: 0 11111111 00000000000000000000001
    const CANONICAL_NAN32: u32 = 0x7F80_0001;

    #[test]
    fn test_classifiers() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let one = fp32(fp.ctx, 1.0);
        let nzero = fp32(fp.ctx, -0.0);
        let inf = fp32(fp.ctx, f32::INFINITY);
        let nan = fp32(fp.ctx, f32::NAN);
        let denorm = fp32(fp.ctx, f32::from_bits(1));
        let neg = fp32(fp.ctx, -1.5);

        let t = fp.is_normal(one);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_zero(nzero);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_negative(nzero);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_inf(inf);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_nan(inf);
        assert_eq!(fp.ctx.as_bool(t), Some(false));
        let t = fp.is_nan(nan);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_denormal(denorm);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_normal(denorm);
        assert_eq!(fp.ctx.as_bool(t), Some(false));
        let t = fp.is_negative(neg);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.is_positive(one);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
    }

    #[test]
    fn test_neg_abs() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let x = fp32(fp.ctx, -3.5);
        let abs = fp.abs(x);
        assert_eq!(bits32(fp.ctx, abs), 3.5f32.to_bits());

        let neg = fp.neg(x);
        assert_eq!(bits32(fp.ctx, neg), 3.5f32.to_bits());
        let double_neg = {
            let n = fp.neg(x);
            fp.neg(n)
        };
        assert_eq!(bits32(fp.ctx, double_neg), (-3.5f32).to_bits());
    }

    /// round on an already-rounded representable must reproduce it
    /// exactly, for every rounding mode.
    #[test]
    fn test_round_idempotent_on_representables() {
        let values =
            [1.0f32, 0.5, 2.0, 3.1415926, 6.02214e23, 1.17549435e-38, 1e-40, 123456.78, 0.0015];
        for mode in
            [RoundingMode::Rne, RoundingMode::Rta, RoundingMode::Rtp, RoundingMode::Rtn, RoundingMode::Rtz]
        {
            for value in values {
                let mut ctx = TermArena::new();
                let mut fp = FpToBv::new(&mut ctx);
                let x = fp32(fp.ctx, value);
                let u = fp.unpack(x, true);
                // rebuild the rounder's input shape: a zero carry bit,
                // the significand, and zero guard/round/sticky bits
                let zero1 = fp.ubv(0, 1);
                let grs = fp.ubv(0, 3);
                let sig_grs = fp.ctx.mk_concat(u.sig, grs);
                let sig = fp.ctx.mk_concat(zero1, sig_grs);
                let exp_ext = fp.ctx.mk_sign_ext(u.exp, 2);
                let lz_ext = fp.ctx.mk_zero_ext(u.lz, 2);
                let exp_sort = fp.ctx.sort_of(exp_ext);
                let exp = fp.ctx.mk_func_app(exp_sort, FuncKind::Bvsub, &[exp_ext, lz_ext]);
                let rm = fp.rm(mode);
                let rounded = fp.round(rm, u.sgn, sig, exp, 8, 24);
                assert_eq!(
                    bits32(fp.ctx, rounded),
                    value.to_bits(),
                    "round not idempotent on {} under {:?}",
                    value,
                    mode
                );
            }
        }
    }

    #[test]
    fn test_add_matches_native() {
        let cases = [
            (0.1f32, 0.2f32),
            (1.5, 2.25),
            (123.456, 789.012),
            (1e-40, 1e-40),
            (1e38, 3e38),
            (-7.25, 7.25),
            (-0.0, -0.0),
            (1.0, -0.75),
            (1048576.0, -0.03125),
        ];
        for (a, b) in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let x = fp32(fp.ctx, a);
            let y = fp32(fp.ctx, b);
            let rm = fp.rm(RoundingMode::Rne);
            let sum = fp.add(x, y, rm);
            assert_eq!(bits32(fp.ctx, sum), (a + b).to_bits(), "{} + {}", a, b);
        }
    }

    #[test]
    fn test_add_special_cases() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let inf = fp32(fp.ctx, f32::INFINITY);
        let ninf = fp32(fp.ctx, f32::NEG_INFINITY);
        let rm = fp.rm(RoundingMode::Rne);
        let t = fp.add(inf, ninf, rm);
        assert_eq!(bits32(fp.ctx, t), CANONICAL_NAN32);

        let nan = fp32(fp.ctx, f32::NAN);
        let one = fp32(fp.ctx, 1.0);
        let t = fp.add(nan, one, rm);
        assert_eq!(bits32(fp.ctx, t), CANONICAL_NAN32);

        let t = fp.add(inf, one, rm);
        assert_eq!(bits32(fp.ctx, t), f32::INFINITY.to_bits());

        // exact cancellation: +0 under all modes except RTN
        let x = fp32(fp.ctx, 5.5);
        let y = fp32(fp.ctx, -5.5);
        let t = fp.add(x, y, rm);
        assert_eq!(bits32(fp.ctx, t), 0.0f32.to_bits());
        let rtn = fp.rm(RoundingMode::Rtn);
        let t = fp.add(x, y, rtn);
        assert_eq!(bits32(fp.ctx, t), (-0.0f32).to_bits());
    }

    /// 1 + 2^-24 sits exactly halfway between 1.0 and the next float
    /// up, which separates all five rounding modes by sign.
    #[test]
    fn test_rounding_mode_table() {
        let tiny = f32::from_bits(0x3380_0000); // 2^-24
        let up = 0x3F80_0001u32; // nextafter(1.0)
        let cases = [
            (RoundingMode::Rne, 1.0f32.to_bits()),
            (RoundingMode::Rta, up),
            (RoundingMode::Rtp, up),
            (RoundingMode::Rtn, 1.0f32.to_bits()),
            (RoundingMode::Rtz, 1.0f32.to_bits()),
        ];
        for (mode, expected) in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let one = fp32(fp.ctx, 1.0);
            let t = fp32(fp.ctx, tiny);
            let rm = fp.rm(mode);
            let sum = fp.add(one, t, rm);
            assert_eq!(bits32(fp.ctx, sum), expected, "mode {:?}", mode);
        }
        // mirrored for the negative operand
        let down = 0xBF80_0001u32;
        let cases = [
            (RoundingMode::Rne, (-1.0f32).to_bits()),
            (RoundingMode::Rta, down),
            (RoundingMode::Rtp, (-1.0f32).to_bits()),
            (RoundingMode::Rtn, down),
            (RoundingMode::Rtz, (-1.0f32).to_bits()),
        ];
        for (mode, expected) in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let one = fp32(fp.ctx, -1.0);
            let t = fp32(fp.ctx, -tiny);
            let rm = fp.rm(mode);
            let sum = fp.add(one, t, rm);
            assert_eq!(bits32(fp.ctx, sum), expected, "mode {:?}", mode);
        }
    }

    #[test]
    fn test_mul_matches_native() {
        let cases = [
            (0.1f32, 0.2f32),
            (1.5, 2.0),
            (-3.0, 0.5),
            (3.1415926, 2.7182817),
            (1e38, 1e38),
            (1e-30, 1e-30),
            (0.0, -5.0),
        ];
        for (a, b) in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let x = fp32(fp.ctx, a);
            let y = fp32(fp.ctx, b);
            let rm = fp.rm(RoundingMode::Rne);
            let prod = fp.mul(x, y, rm);
            assert_eq!(bits32(fp.ctx, prod), (a * b).to_bits(), "{} * {}", a, b);
        }
    }

    #[test]
    fn test_div_matches_native() {
        let cases = [(1.0f32, 3.0f32), (7.5, 2.5), (-1.0, 0.0), (1.0, 1e-40), (355.0, 113.0)];
        for (a, b) in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let x = fp32(fp.ctx, a);
            let y = fp32(fp.ctx, b);
            let rm = fp.rm(RoundingMode::Rne);
            let quot = fp.div(x, y, rm);
            assert_eq!(bits32(fp.ctx, quot), (a / b).to_bits(), "{} / {}", a, b);
        }

        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let zero = fp32(fp.ctx, 0.0);
        let rm = fp.rm(RoundingMode::Rne);
        let t = fp.div(zero, zero, rm);
        assert_eq!(bits32(fp.ctx, t), CANONICAL_NAN32);
    }

    #[test]
    fn test_sqrt_matches_native() {
        let cases = [4.0f32, 2.0, 0.25, 144.0, 3.1415926];
        for a in cases {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let x = fp32(fp.ctx, a);
            let rm = fp.rm(RoundingMode::Rne);
            let root = fp.sqrt(x, rm);
            assert_eq!(bits32(fp.ctx, root), a.sqrt().to_bits(), "sqrt {}", a);
        }

        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let neg = fp32(fp.ctx, -1.0);
        let rm = fp.rm(RoundingMode::Rne);
        let t = fp.sqrt(neg, rm);
        assert_eq!(bits32(fp.ctx, t), CANONICAL_NAN32);
        let nzero = fp32(fp.ctx, -0.0);
        let t = fp.sqrt(nzero, rm);
        assert_eq!(bits32(fp.ctx, t), (-0.0f32).to_bits());
    }

    #[test]
    fn test_to_sbv() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let x = fp32(fp.ctx, 5.75);
        let rm = fp.rm(RoundingMode::Rtz);
        let t = fp.to_sbv(x, rm, 32);
        assert_eq!(bits32(fp.ctx, t), 5);

        let x = fp32(fp.ctx, -5.75);
        let t = fp.to_sbv(x, rm, 32);
        assert_eq!(bits32(fp.ctx, t), (-5i32) as u32);

        // NaN and infinity produce an unconstrained symbol
        let nan = fp32(fp.ctx, f32::NAN);
        let t = fp.to_sbv(nan, rm, 32);
        assert!(fp.ctx.as_bits(t).is_none());
    }

    #[test]
    fn test_to_ubv() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let x = fp32(fp.ctx, 3e9);
        let rm = fp.rm(RoundingMode::Rtz);
        let t = fp.to_ubv(x, rm, 32);
        assert_eq!(bits32(fp.ctx, t), 3_000_000_000u32);

        // negative values are out of the unsigned range
        let x = fp32(fp.ctx, -1.0);
        let t = fp.to_ubv(x, rm, 32);
        assert!(fp.ctx.as_bits(t).is_none());
    }

    #[test]
    fn test_from_sbv_sign() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let sort = fp.ctx.mk_bv_sort(true, 32);
        let x = fp.ctx.mk_smt_bv(sort, BigInt::from(-7));
        let to = fp.ctx.mk_fp_sort(8, 24);
        let rm = fp.rm(RoundingMode::Rne);
        let t = fp.from_sbv(x, to, rm);
        assert_eq!(bits32(fp.ctx, t), (-7.0f32).to_bits());

        let y = fp.ctx.mk_smt_bv(sort, BigInt::from(7));
        let t = fp.from_sbv(y, to, rm);
        assert_eq!(bits32(fp.ctx, t), 7.0f32.to_bits());
    }

    #[test]
    fn test_from_ubv_round_trip() {
        // ubv -> fp -> ubv is the identity for integers representable
        // in the significand, under RTZ
        let values = [0u32, 1, 7, 12_345_678, 1 << 23];
        for value in values {
            let mut ctx = TermArena::new();
            let mut fp = FpToBv::new(&mut ctx);
            let sort = fp.ctx.mk_bv_sort(false, 32);
            let x = fp.ctx.mk_smt_bv(sort, BigInt::from(value));
            let to = fp.ctx.mk_fp_sort(8, 24);
            let rtz = fp.rm(RoundingMode::Rtz);
            let as_fp = fp.from_ubv(x, to, rtz);
            assert_eq!(bits32(fp.ctx, as_fp), (value as f32).to_bits());
            if value == 0 {
                continue; // zero short-circuits to +0, conversion back folds anyway
            }
            let back = fp.to_ubv(as_fp, rtz, 32);
            assert_eq!(bits32(fp.ctx, back), value);
        }

        // 2^24 + 1 is not representable and rounds down under RNE
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let sort = fp.ctx.mk_bv_sort(false, 32);
        let x = fp.ctx.mk_smt_bv(sort, BigInt::from((1u32 << 24) + 1));
        let to = fp.ctx.mk_fp_sort(8, 24);
        let rne = fp.rm(RoundingMode::Rne);
        let as_fp = fp.from_ubv(x, to, rne);
        assert_eq!(bits32(fp.ctx, as_fp), (((1u32 << 24) + 1) as f32).to_bits());
    }

    #[test]
    fn test_fp_to_fp() {
        // widening is exact
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let x = fp32(fp.ctx, 1.1);
        let to = fp.ctx.mk_fp_sort(11, 53);
        let rm = fp.rm(RoundingMode::Rne);
        let wide = fp.to_fp(x, to, rm);
        assert_eq!(bits64(fp.ctx, wide), (1.1f32 as f64).to_bits());

        // widen-then-narrow is the identity
        let back_sort = fp.ctx.mk_fp_sort(8, 24);
        let back = fp.to_fp(wide, back_sort, rm);
        assert_eq!(bits32(fp.ctx, back), 1.1f32.to_bits());

        // narrowing rounds
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let x = fp64(fp.ctx, 0.1);
        let to = fp.ctx.mk_fp_sort(8, 24);
        let rm = fp.rm(RoundingMode::Rne);
        let narrow = fp.to_fp(x, to, rm);
        assert_eq!(bits32(fp.ctx, narrow), (0.1f64 as f32).to_bits());

        // f32 subnormals become f64 normals and survive the round trip
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let x = fp32(fp.ctx, f32::from_bits(1));
        let to = fp.ctx.mk_fp_sort(11, 53);
        let rm = fp.rm(RoundingMode::Rne);
        let wide = fp.to_fp(x, to, rm);
        assert_eq!(bits64(fp.ctx, wide), (f32::from_bits(1) as f64).to_bits());
        let back_sort = fp.ctx.mk_fp_sort(8, 24);
        let back = fp.to_fp(wide, back_sort, rm);
        assert_eq!(bits32(fp.ctx, back), 1);

        // down to fp16: 1.5 is 0 01111 1000000000
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);
        let x = fp32(fp.ctx, 1.5);
        let to = fp.ctx.mk_fp_sort(5, 11);
        let rm = fp.rm(RoundingMode::Rne);
        let half = fp.to_fp(x, to, rm);
        assert_eq!(fp.ctx.as_bits(half), Some(&BigUint::from(0x3E00u32)));
    }

    #[test]
    fn test_comparisons() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let pzero = fp32(fp.ctx, 0.0);
        let nzero = fp32(fp.ctx, -0.0);
        let t = fp.fp_eq(pzero, nzero);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.fp_lt(nzero, pzero);
        assert_eq!(fp.ctx.as_bool(t), Some(false));

        let nan = fp32(fp.ctx, f32::NAN);
        let t = fp.fp_eq(nan, nan);
        assert_eq!(fp.ctx.as_bool(t), Some(false));

        let one = fp32(fp.ctx, 1.0);
        let two = fp32(fp.ctx, 2.0);
        let t = fp.fp_lt(one, two);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.fp_le(one, one);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.fp_gt(two, one);
        assert_eq!(fp.ctx.as_bool(t), Some(true));

        // ordering of negative operands
        let m2 = fp32(fp.ctx, -2.0);
        let m3 = fp32(fp.ctx, -3.0);
        let t = fp.fp_lt(m3, m2);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
        let t = fp.fp_lt(m2, m3);
        assert_eq!(fp.ctx.as_bool(t), Some(false));
        let t = fp.fp_lt(m2, one);
        assert_eq!(fp.ctx.as_bool(t), Some(true));
    }

    #[test]
    fn test_fp128_smoke() {
        let mut ctx = TermArena::new();
        let mut fp = FpToBv::new(&mut ctx);

        let sort = fp.ctx.mk_bv_sort(false, 64);
        let one_bv = fp.ctx.mk_smt_bv(sort, BigInt::from(1));
        let to = fp.ctx.mk_fp_sort(15, 113);
        let rm = fp.rm(RoundingMode::Rne);
        let one = fp.from_ubv(one_bv, to, rm);
        // 1.0 at fp128 is 0x3FFF << 112
        let expected = BigUint::from(0x3FFFu32) << 112;
        assert_eq!(fp.ctx.as_bits(one), Some(&expected));

        let two = fp.add(one, one, rm);
        let expected = BigUint::from(0x4000u32) << 112;
        assert_eq!(fp.ctx.as_bits(two), Some(&expected));
    }
}
