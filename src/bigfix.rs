//! Fixed-point limb arithmetic for deep zooms.
//!
//! A `BigFix` is a sign plus a most-significant-first vector of 32-bit limbs:
//! one integer limb followed by a run-time-chosen number of fractional limbs.
//! Only the operations the escape iteration needs are provided; this is not a
//! general bignum library. Multiplication keeps the aligned limbs of the full
//! double-width product and drops the rest, so precision loss is bounded by
//! the safety margin built into the precision decision.

use serde::{Deserialize, Serialize};

pub const LIMB_BITS: u32 = 32;
const LIMB_BASE: f64 = 4294967296.0; // 2^32

/// Signed fixed-point number: `limbs[0]` is the integer part, the remaining
/// limbs are fractional, most significant first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigFix {
    neg: bool,
    limbs: Vec<u32>,
}

impl BigFix {
    pub fn zero(frac_limbs: usize) -> Self {
        Self {
            neg: false,
            limbs: vec![0; frac_limbs + 1],
        }
    }

    pub fn from_f64(value: f64, frac_limbs: usize) -> Self {
        let neg = value < 0.0;
        let mut mag = value.abs();
        let mut limbs = Vec::with_capacity(frac_limbs + 1);
        limbs.push(mag.trunc() as u32);
        mag -= mag.trunc();
        for _ in 0..frac_limbs {
            mag *= LIMB_BASE;
            let limb = mag.trunc() as u32;
            limbs.push(limb);
            mag -= mag.trunc();
        }
        Self { neg, limbs }.normalized()
    }

    pub fn to_f64(&self) -> f64 {
        let mut acc = 0.0;
        for &limb in self.limbs[1..].iter().rev() {
            acc = (acc + limb as f64) / LIMB_BASE;
        }
        let mag = self.limbs[0] as f64 + acc;
        if self.neg {
            -mag
        } else {
            mag
        }
    }

    pub fn frac_limbs(&self) -> usize {
        self.limbs.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    pub fn is_negative(&self) -> bool {
        self.neg
    }

    /// Truncate or zero-extend to the given fractional limb count.
    pub fn resized(&self, frac_limbs: usize) -> Self {
        let mut limbs = self.limbs.clone();
        limbs.resize(frac_limbs + 1, 0);
        Self {
            neg: self.neg,
            limbs,
        }
        .normalized()
    }

    pub fn negated(&self) -> Self {
        Self {
            neg: !self.neg && !self.is_zero(),
            limbs: self.limbs.clone(),
        }
    }

    /// Signed addition. Both operands must carry the same limb count.
    pub fn add(&self, other: &Self) -> Self {
        debug_assert_eq!(self.limbs.len(), other.limbs.len());
        if self.neg == other.neg {
            return Self {
                neg: self.neg,
                limbs: mag_add(&self.limbs, &other.limbs),
            }
            .normalized();
        }
        match mag_cmp(&self.limbs, &other.limbs) {
            std::cmp::Ordering::Equal => Self::zero(self.frac_limbs()),
            std::cmp::Ordering::Greater => Self {
                neg: self.neg,
                limbs: mag_sub(&self.limbs, &other.limbs),
            }
            .normalized(),
            std::cmp::Ordering::Less => Self {
                neg: other.neg,
                limbs: mag_sub(&other.limbs, &self.limbs),
            }
            .normalized(),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.negated())
    }

    /// Full double-width product truncated to the aligned limb count of the
    /// operands. Carry out of the integer limb is discarded.
    pub fn mul(&self, other: &Self) -> Self {
        debug_assert_eq!(self.limbs.len(), other.limbs.len());
        Self {
            neg: self.neg != other.neg,
            limbs: mag_mul(&self.limbs, &other.limbs),
        }
        .normalized()
    }

    /// Multiply the magnitude by a small unsigned integer.
    pub fn mul_u32(&self, k: u32) -> Self {
        let mut limbs = vec![0u32; self.limbs.len()];
        let mut carry: u64 = 0;
        for i in (0..self.limbs.len()).rev() {
            let v = self.limbs[i] as u64 * k as u64 + carry;
            limbs[i] = v as u32;
            carry = v >> LIMB_BITS;
        }
        Self {
            neg: self.neg,
            limbs,
        }
        .normalized()
    }

    pub fn cmp_value(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self.neg, other.neg) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => mag_cmp(&self.limbs, &other.limbs),
            (true, true) => mag_cmp(&other.limbs, &self.limbs),
        }
    }

    fn normalized(mut self) -> Self {
        if self.neg && self.is_zero() {
            self.neg = false;
        }
        self
    }
}

fn mag_add(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = vec![0u32; a.len()];
    let mut carry: u64 = 0;
    for i in (0..a.len()).rev() {
        let v = a[i] as u64 + b[i] as u64 + carry;
        out[i] = v as u32;
        carry = v >> LIMB_BITS;
    }
    // carry out of the integer limb is dropped; the precision decision keeps
    // all values well inside the field width
    out
}

fn mag_sub(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = vec![0u32; a.len()];
    let mut borrow: i64 = 0;
    for i in (0..a.len()).rev() {
        let v = a[i] as i64 - b[i] as i64 - borrow;
        if v < 0 {
            out[i] = (v + (1i64 << LIMB_BITS)) as u32;
            borrow = 1;
        } else {
            out[i] = v as u32;
            borrow = 0;
        }
    }
    out
}

fn mag_cmp(a: &[u32], b: &[u32]) -> std::cmp::Ordering {
    a.cmp(b)
}

fn mag_mul(a: &[u32], b: &[u32]) -> Vec<u32> {
    let n = a.len();
    // schoolbook product in little-endian order
    let mut prod = vec![0u64; 2 * n];
    for (i, &ai) in a.iter().rev().enumerate() {
        let mut carry: u64 = 0;
        for (j, &bj) in b.iter().rev().enumerate() {
            let v = ai as u64 * bj as u64 + prod[i + j] + carry;
            prod[i + j] = v & 0xffff_ffff;
            carry = v >> LIMB_BITS;
        }
        let mut k = i + n;
        while carry > 0 && k < 2 * n {
            let v = prod[k] + carry;
            prod[k] = v & 0xffff_ffff;
            carry = v >> LIMB_BITS;
            k += 1;
        }
    }
    // keep limbs aligned with the operands' fixed-point scale
    let mut out = vec![0u32; n];
    for i in 0..n {
        out[n - 1 - i] = prod[n - 1 + i] as u32;
    }
    out
}
