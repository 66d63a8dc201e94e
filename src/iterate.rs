//! Per-point escape iteration.
//!
//! Two arithmetic paths share one contract: given a pixel's plane coordinate,
//! produce the iteration count, whether the orbit escaped, and optionally a
//! distance estimate. The f64 path covers every view where the pixel delta
//! fits inside a double mantissa; the bigfix path takes over beyond that.
//!
//! Brent-style periodicity detection short-circuits bounded orbits: a
//! checkpoint with a doubling period, reset whenever the countdown runs out.
//! It only ever changes how early "inside" is detected, never the result.

use num::complex::Complex;

use crate::bigfix::BigFix;
use crate::spec::{FractalKind, FractalSpec};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointResult {
    pub iterations: u32,
    pub escaped: bool,
    pub distance: Option<f64>,
}

impl PointResult {
    fn inside(max_iterations: u32) -> Self {
        Self {
            iterations: max_iterations,
            escaped: false,
            distance: None,
        }
    }
}

/// Mandelbrot varies `c` per pixel and seeds `z0 = c`; Julia fixes `c` and
/// varies `z0`. The one place fractal kind is polymorphic.
enum KindParams {
    Mandelbrot,
    Julia {
        re: BigFix,
        im: BigFix,
        re_f: f64,
        im_f: f64,
    },
}

/// Bound once per render: spec constants, precision, and the binomial
/// coefficient tables the `power > 2` expansion needs.
pub struct Evaluator {
    power: u32,
    max_iterations: u32,
    with_distance: bool,
    periodicity: bool,
    kind: KindParams,
    frac_limbs: usize,
    // Pascal's triangle rows for z^power and z^(power-1)
    binomials: Vec<f64>,
    binomials_dz: Vec<f64>,
}

impl Evaluator {
    pub fn new(spec: &FractalSpec, frac_limbs: usize) -> Self {
        let kind = match &spec.kind {
            FractalKind::Mandelbrot => KindParams::Mandelbrot,
            FractalKind::Julia { re, im } => KindParams::Julia {
                re: re.resized(frac_limbs.max(1)),
                im: im.resized(frac_limbs.max(1)),
                re_f: re.to_f64(),
                im_f: im.to_f64(),
            },
        };
        Self {
            power: spec.power,
            max_iterations: spec.max_iterations,
            with_distance: spec.needs_distance(),
            periodicity: true,
            kind,
            frac_limbs,
            binomials: pascal_row(spec.power),
            binomials_dz: pascal_row(spec.power - 1),
        }
    }

    /// Disable cycle detection; classification is unaffected, only the
    /// iteration count at which bounded orbits give up.
    pub fn without_periodicity(mut self) -> Self {
        self.periodicity = false;
        self
    }

    pub fn frac_limbs(&self) -> usize {
        self.frac_limbs
    }

    pub fn eval_f64(&self, x0: f64, y0: f64) -> PointResult {
        let (z0, c) = match &self.kind {
            KindParams::Mandelbrot => {
                let c = Complex::new(x0, y0);
                (c, c)
            }
            KindParams::Julia { re_f, im_f, .. } => {
                (Complex::new(x0, y0), Complex::new(*re_f, *im_f))
            }
        };

        let mut z = z0;
        let mut dz = Complex::new(0.0, 0.0);
        let mut checkpoint = z0;
        let mut period: u32 = 1;
        let mut countdown: u32 = 1;

        for n in 1..=self.max_iterations {
            if self.with_distance {
                let zp1 = if self.power == 2 {
                    z
                } else {
                    complex_pow(z, self.power - 1, &self.binomials_dz)
                };
                dz = zp1 * dz * self.power as f64 + Complex::new(1.0, 0.0);
            }
            z = if self.power == 2 {
                Complex::new(z.re * z.re - z.im * z.im, 2.0 * z.re * z.im) + c
            } else {
                complex_pow(z, self.power, &self.binomials) + c
            };
            let norm_sqr = z.re * z.re + z.im * z.im;
            if norm_sqr >= 4.0 {
                let distance = self.with_distance.then(|| distance_estimate(z, dz));
                return PointResult {
                    iterations: n,
                    escaped: true,
                    distance,
                };
            }
            if self.periodicity {
                if z == checkpoint {
                    return PointResult::inside(self.max_iterations);
                }
                countdown -= 1;
                if countdown == 0 {
                    checkpoint = z;
                    period *= 2;
                    countdown = period;
                }
            }
        }
        PointResult::inside(self.max_iterations)
    }

    pub fn eval_big(&self, x0: &BigFix, y0: &BigFix) -> PointResult {
        let n_limbs = self.frac_limbs;
        let four = BigFix::from_f64(4.0, n_limbs);
        let (zr0, zi0, cr, ci) = match &self.kind {
            KindParams::Mandelbrot => (x0.clone(), y0.clone(), x0.clone(), y0.clone()),
            KindParams::Julia { re, im, .. } => (
                x0.clone(),
                y0.clone(),
                re.resized(n_limbs),
                im.resized(n_limbs),
            ),
        };

        let mut zr = zr0.clone();
        let mut zi = zi0.clone();
        // derivative tracked in f64; its magnitude never needs limb precision
        let mut dz = Complex::new(0.0, 0.0);
        let mut cp_r = zr0;
        let mut cp_i = zi0;
        let mut period: u32 = 1;
        let mut countdown: u32 = 1;

        for n in 1..=self.max_iterations {
            if self.with_distance {
                let zf = Complex::new(zr.to_f64(), zi.to_f64());
                let zp1 = if self.power == 2 {
                    zf
                } else {
                    complex_pow(zf, self.power - 1, &self.binomials_dz)
                };
                dz = zp1 * dz * self.power as f64 + Complex::new(1.0, 0.0);
            }
            let (mut wr, mut wi) = if self.power == 2 {
                let rr = zr.mul(&zr);
                let ii = zi.mul(&zi);
                let ri = zr.mul(&zi);
                (rr.sub(&ii), ri.mul_u32(2))
            } else {
                let (mut wr, mut wi) = (zr.clone(), zi.clone());
                for _ in 1..self.power {
                    let nr = wr.mul(&zr).sub(&wi.mul(&zi));
                    let ni = wr.mul(&zi).add(&wi.mul(&zr));
                    wr = nr;
                    wi = ni;
                }
                (wr, wi)
            };
            wr = wr.add(&cr);
            wi = wi.add(&ci);
            zr = wr;
            zi = wi;

            let norm_sqr = zr.mul(&zr).add(&zi.mul(&zi));
            if norm_sqr.cmp_value(&four) != std::cmp::Ordering::Less {
                let distance = self.with_distance.then(|| {
                    distance_estimate(Complex::new(zr.to_f64(), zi.to_f64()), dz)
                });
                return PointResult {
                    iterations: n,
                    escaped: true,
                    distance,
                };
            }
            if self.periodicity {
                if zr == cp_r && zi == cp_i {
                    return PointResult::inside(self.max_iterations);
                }
                countdown -= 1;
                if countdown == 0 {
                    cp_r = zr.clone();
                    cp_i = zi.clone();
                    period *= 2;
                    countdown = period;
                }
            }
        }
        PointResult::inside(self.max_iterations)
    }
}

/// `|z| * ln(|z|^2) / |dz|`, valid on escape.
fn distance_estimate(z: Complex<f64>, dz: Complex<f64>) -> f64 {
    let norm = z.norm();
    let dnorm = dz.norm();
    if dnorm == 0.0 {
        return f64::INFINITY;
    }
    norm * (norm * norm).ln() / dnorm
}

/// Binomial coefficients `C(p, j)` for `j = 0..=p`.
fn pascal_row(p: u32) -> Vec<f64> {
    let mut row = vec![1.0];
    for _ in 0..p {
        let mut next = vec![1.0];
        for w in row.windows(2) {
            next.push(w[0] + w[1]);
        }
        next.push(1.0);
        row = next;
    }
    row
}

/// `z^p` by binomial expansion: `i^j` cycles through `1, i, -1, -i`.
fn complex_pow(z: Complex<f64>, p: u32, row: &[f64]) -> Complex<f64> {
    debug_assert_eq!(row.len(), p as usize + 1);
    let p = p as usize;
    let mut xk = vec![1.0; p + 1];
    let mut yk = vec![1.0; p + 1];
    for k in 1..=p {
        xk[k] = xk[k - 1] * z.re;
        yk[k] = yk[k - 1] * z.im;
    }
    let mut re = 0.0;
    let mut im = 0.0;
    for (j, &coeff) in row.iter().enumerate() {
        let term = coeff * xk[p - j] * yk[j];
        match j % 4 {
            0 => re += term,
            1 => im += term,
            2 => re -= term,
            _ => im -= term,
        }
    }
    Complex::new(re, im)
}
