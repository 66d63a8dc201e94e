//! Per-render arithmetic selection.
//!
//! Decided once from the magnification and the target pixel width, never
//! re-evaluated per pixel: compute the binary exponent of one pixel's width
//! in the complex plane, derive the required mantissa bits with a 4-bit
//! safety margin, and fall back to native f64 whenever that fits inside the
//! double mantissa.

use crate::bigfix::LIMB_BITS;

/// Bits an f64 mantissa provides; below this the float path is exact enough.
pub const FLOAT_BITS: u32 = 53;
const SAFETY_BITS: i32 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrecisionDecision {
    pub required_bits: u32,
    /// Fractional limbs for the bigfix path; 0 selects the f64 path.
    pub frac_limbs: usize,
}

impl PrecisionDecision {
    /// `pixel_delta` is the width of one pixel in the complex plane.
    pub fn for_pixel_delta(pixel_delta: f64) -> Self {
        debug_assert!(pixel_delta > 0.0);
        let exponent = pixel_delta.log2().floor() as i32;
        let required_bits = (SAFETY_BITS - exponent).max(0) as u32;
        let frac_limbs = if required_bits < FLOAT_BITS {
            0
        } else {
            required_bits.div_ceil(LIMB_BITS) as usize
        };
        Self {
            required_bits,
            frac_limbs,
        }
    }

    pub fn uses_float(&self) -> bool {
        self.frac_limbs == 0
    }
}
