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

//! This module defines a concrete bitvector type [B64] for values up
//! to 64 bits wide. It is used for integer and packed floating-point
//! literals in the GOTO IR; arbitrary-width constants only exist at
//! the SMT level, where they are big-integer valued.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Neg, Not, Shl, Shr, Sub};

/// Zero the bits of `bits` from index `len` upwards.
pub fn bzhi_u64(bits: u64, len: u32) -> u64 {
    if len >= 64 {
        bits
    } else {
        bits & ((1u64 << len) - 1)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct B64 {
    len: u32,
    bits: u64,
}

impl fmt::Display for B64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len % 4 == 0 {
            write!(f, "#x{:0width$x}", self.bits, width = (self.len / 4) as usize)
        } else {
            write!(f, "#b{:0width$b}", self.bits, width = self.len as usize)
        }
    }
}

impl Not for B64 {
    type Output = B64;

    fn not(self) -> Self::Output {
        B64 { len: self.len, bits: bzhi_u64(!self.bits, self.len) }
    }
}

impl BitXor for B64 {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        B64 { len: self.len, bits: self.bits ^ rhs.bits }
    }
}

impl BitOr for B64 {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        B64 { len: self.len, bits: self.bits | rhs.bits }
    }
}

impl BitAnd for B64 {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        B64 { len: self.len, bits: self.bits & rhs.bits }
    }
}

impl Neg for B64 {
    type Output = B64;

    fn neg(self) -> Self::Output {
        B64 { len: self.len, bits: bzhi_u64((self.bits as i64).wrapping_neg() as u64, self.len) }
    }
}

impl Add<B64> for B64 {
    type Output = B64;

    fn add(self, rhs: Self) -> Self::Output {
        B64 { len: self.len, bits: bzhi_u64(self.bits.wrapping_add(rhs.bits), self.len) }
    }
}

impl Sub<B64> for B64 {
    type Output = B64;

    fn sub(self, rhs: Self) -> Self::Output {
        B64 { len: self.len, bits: bzhi_u64(self.bits.wrapping_sub(rhs.bits), self.len) }
    }
}

impl Shl<B64> for B64 {
    type Output = B64;

    fn shl(self, rhs: Self) -> Self::Output {
        if rhs.bits >= 64 {
            B64 { len: self.len, bits: 0 }
        } else {
            B64 { len: self.len, bits: bzhi_u64(self.bits << rhs.bits, self.len) }
        }
    }
}

impl Shr<B64> for B64 {
    type Output = B64;

    fn shr(self, rhs: Self) -> Self::Output {
        if rhs.bits >= 64 {
            B64 { len: self.len, bits: 0 }
        } else {
            B64 { len: self.len, bits: bzhi_u64(self.bits >> rhs.bits, self.len) }
        }
    }
}

impl B64 {
    pub fn new(bits: u64, len: u32) -> Self {
        assert!(len <= 64 && bits == bzhi_u64(bits, len));
        B64 { len, bits }
    }

    /// Like [B64::new], but masks the value down to `len` bits rather
    /// than asserting it already fits.
    pub fn truncated(bits: u64, len: u32) -> Self {
        assert!(len <= 64);
        B64 { len, bits: bzhi_u64(bits, len) }
    }

    pub fn from_i64(value: i64, len: u32) -> Self {
        B64::truncated(value as u64, len)
    }

    pub fn zeros(len: u32) -> Self {
        assert!(len <= 64);
        B64 { len, bits: 0 }
    }

    pub fn ones(len: u32) -> Self {
        assert!(len <= 64);
        B64 { len, bits: bzhi_u64(0xFFFF_FFFF_FFFF_FFFF, len) }
    }

    pub fn len(self) -> u32 {
        self.len
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    pub fn is_zero(self) -> bool {
        self.bits == 0
    }

    pub fn lower_u64(self) -> u64 {
        self.bits
    }

    pub fn leading_zeros(self) -> u32 {
        self.bits.leading_zeros() - (64 - self.len)
    }

    pub fn zero_extend(self, new_len: u32) -> Self {
        assert!(self.len <= new_len && new_len <= 64);
        B64 { len: new_len, bits: self.bits }
    }

    pub fn sign_extend(self, new_len: u32) -> Self {
        assert!(self.len <= new_len && new_len <= 64);
        if self.len > 0 && (self.bits >> (self.len - 1)) & 0b1 == 0b1 {
            let top = bzhi_u64(0xFFFF_FFFF_FFFF_FFFF, new_len) & !bzhi_u64(0xFFFF_FFFF_FFFF_FFFF, self.len);
            B64 { len: new_len, bits: self.bits | top }
        } else {
            B64 { len: new_len, bits: self.bits }
        }
    }

    pub fn unsigned(self) -> i128 {
        i128::from(self.bits)
    }

    pub fn signed(self) -> i128 {
        i128::from(self.sign_extend(64).bits as i64)
    }

    pub fn extract(self, hi: u32, lo: u32) -> Option<Self> {
        let len = (hi - lo) + 1;
        if lo <= hi && hi < self.len {
            Some(B64 { len, bits: bzhi_u64(self.bits >> lo, len) })
        } else {
            None
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        B64 { len: self.len, bits: bzhi_u64(self.bits.wrapping_mul(rhs.bits), self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", B64::zeros(4)), "#x0");
        assert_eq!(format!("{}", B64::zeros(16)), "#x0000");
        assert_eq!(format!("{}", B64::ones(12)), "#xfff");
        assert_eq!(format!("{}", B64::new(0b101, 3)), "#b101");
        assert_eq!(format!("{}", B64::new(0xDEAD_BEEF, 32)), "#xdeadbeef");
    }

    #[test]
    fn test_add_wraps() {
        assert_eq!(B64::new(0xFFFF_FFFF_FFFF_FFFF, 64) + B64::new(1, 64), B64::new(0, 64));
        assert_eq!(B64::new(0xFF, 8) + B64::new(2, 8), B64::new(1, 8));
    }

    #[test]
    fn test_neg() {
        assert_eq!(-B64::new(0b001, 3), B64::new(0b111, 3));
        assert_eq!(-B64::new(0xFF, 8), B64::new(0x1, 8));
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(B64::new(0b100, 3).sign_extend(8), B64::new(0b1111_1100, 8));
        assert_eq!(B64::new(0b011, 3).sign_extend(8), B64::new(0b011, 8));
        assert_eq!(B64::new(0b100, 3).signed(), -4);
        assert_eq!(B64::new(0b100, 3).unsigned(), 4);
    }

    #[test]
    fn test_extract() {
        assert_eq!(B64::new(0b1101, 4).extract(3, 1), Some(B64::new(0b110, 3)));
        assert_eq!(B64::new(0b1101, 4).extract(4, 0), None);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(B64::new(0b0001, 4).leading_zeros(), 3);
        assert_eq!(B64::zeros(7).leading_zeros(), 7);
        assert_eq!(B64::ones(7).leading_zeros(), 0);
    }
}
