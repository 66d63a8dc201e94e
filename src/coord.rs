//! Pixel-grid to complex-plane mapping.
//!
//! A view is described by its center and a magnification; magnification 1.0
//! spans 4 units of the real axis across the image width. Pixels are square,
//! the imaginary axis grows upward while pixel rows grow downward.

use crate::bigfix::BigFix;

/// Real-axis span of the plane at magnification 1.0.
pub const BASE_SPAN: f64 = 4.0;

/// Maps pixel coordinates to plane coordinates, in both arithmetic forms.
/// The bigfix form is only populated when the precision decision asked for
/// limbs; offsets are exact limb multiples of the pixel delta.
#[derive(Clone, Debug)]
pub struct PixelMap {
    pub width: usize,
    pub height: usize,
    delta: f64,
    left: f64,
    top: f64,
    big: Option<BigPixelMap>,
}

#[derive(Clone, Debug)]
struct BigPixelMap {
    delta: BigFix,
    left: BigFix,
    top: BigFix,
}

impl PixelMap {
    pub fn new(
        center_re: &BigFix,
        center_im: &BigFix,
        magnification: f64,
        width: usize,
        height: usize,
        frac_limbs: usize,
    ) -> Self {
        let delta = BASE_SPAN / magnification / width as f64;
        let cr = center_re.to_f64();
        let ci = center_im.to_f64();
        let left = cr - delta * (width / 2) as f64;
        let top = ci + delta * (height / 2) as f64;
        let big = (frac_limbs > 0).then(|| {
            let d = BigFix::from_f64(delta, frac_limbs);
            BigPixelMap {
                left: center_re
                    .resized(frac_limbs)
                    .sub(&d.mul_u32((width / 2) as u32)),
                top: center_im
                    .resized(frac_limbs)
                    .add(&d.mul_u32((height / 2) as u32)),
                delta: d,
            }
        });
        Self {
            width,
            height,
            delta,
            left,
            top,
            big,
        }
    }

    pub fn pixel_delta(&self) -> f64 {
        self.delta
    }

    pub fn point_f64(&self, x: usize, y: usize) -> (f64, f64) {
        (
            self.left + self.delta * x as f64,
            self.top - self.delta * y as f64,
        )
    }

    pub fn point_big(&self, x: usize, y: usize) -> (BigFix, BigFix) {
        let big = self
            .big
            .as_ref()
            .expect("bigfix coordinates requested on a float-only map");
        (
            big.left.add(&big.delta.mul_u32(x as u32)),
            big.top.sub(&big.delta.mul_u32(y as u32)),
        )
    }
}
