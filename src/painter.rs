use image::{Rgb, RgbImage};
use lazy_static::lazy_static;
use ndarray::Array2;

use crate::render::UNRENDERED;

pub trait Painter {
    fn i_value_color(&self, i_value: i32) -> Rgb<u8>;

    fn paint(&self, i_values: &Array2<i32>) -> RgbImage {
        let width: u32 = i_values.ncols().try_into().unwrap();
        let height: u32 = i_values.nrows().try_into().unwrap();

        let mut img = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let i_value = i_values[[y as usize, x as usize]];
                let color = if i_value == UNRENDERED {
                    Rgb([0, 0, 0])
                } else {
                    self.i_value_color(i_value)
                };
                img.put_pixel(x, y, color);
            }
        }
        img
    }
}

lazy_static! {
    /// Built-in cyclic palette, interpolated from the rainbow anchors.
    pub static ref DEFAULT_PALETTE: Vec<Rgb<u8>> = {
        let mut colors = Vec::with_capacity(64);
        for n in 0..64 {
            let pos = n as f64 / 64.0 * 9.0;
            let lo = rainbow_color(pos as i32);
            let hi = rainbow_color(pos as i32 + 1);
            let frac = pos - pos.floor();
            colors.push(Rgb([
                mix(lo[0], hi[0], frac),
                mix(lo[1], hi[1], frac),
                mix(lo[2], hi[2], frac),
            ]));
        }
        colors
    };
}

/// Cyclic palette: color index is the stored value modulo the palette size.
pub struct PalettePainter {
    colors: Vec<Rgb<u8>>,
    inside_value: i32,
}

impl PalettePainter {
    pub fn new(colors: Vec<Rgb<u8>>, inside_value: i32) -> Self {
        assert!(!colors.is_empty(), "palette must have at least one color");
        Self {
            colors,
            inside_value,
        }
    }

    /// Built-in palette with the inside threshold taken from the spec's
    /// representation (see `FractalSpec::inside_value`).
    pub fn standard(inside_value: i32) -> Self {
        Self::new(DEFAULT_PALETTE.clone(), inside_value)
    }
}

impl Painter for PalettePainter {
    fn i_value_color(&self, i_value: i32) -> Rgb<u8> {
        if i_value >= self.inside_value {
            return Rgb([0, 0, 0]);
        }
        self.colors[i_value.max(0) as usize % self.colors.len()]
    }
}

pub struct GreyscalePainter {
    max_i_value: f64,
}

impl GreyscalePainter {
    pub fn new(max_i_value: f64) -> Self {
        Self { max_i_value }
    }
}

impl Painter for GreyscalePainter {
    fn i_value_color(&self, i_value: i32) -> Rgb<u8> {
        let frac: f64 = i_value as f64 / self.max_i_value;
        let frac = frac.clamp(0.0, 1.0);
        let v: u8 = 255 - (frac * 255.0).round() as u8;
        Rgb([v, v, v])
    }
}

fn rainbow_color(n: i32) -> [u8; 3] {
    match n {
        0 => [0xbe, 0x0a, 0xff],
        1 => [0x58, 0x0a, 0xff],
        2 => [0x14, 0x7d, 0xf5],
        3 => [0x0a, 0xef, 0xff],
        4 => [0x0a, 0xff, 0x99],
        5 => [0xa1, 0xff, 0x0a],
        6 => [0xde, 0xff, 0x0a],
        7 => [0xff, 0xd3, 0x00],
        8 => [0xff, 0x87, 0x00],
        _ => [0xff, 0x00, 0x00],
    }
}

fn mix(a: u8, b: u8, frac: f64) -> u8 {
    let af = a as f64;
    let bf = b as f64;
    let m = af * (1.0 - frac) + bf * frac;
    f64::round(m) as u8
}
