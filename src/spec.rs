//! The immutable description of one render: what to compute and how to
//! represent it. Serializable so it can travel in a `RENDER` body; cloning
//! deep-copies the arbitrary-precision fields.

use serde::{Deserialize, Serialize};

use crate::bigfix::BigFix;
use crate::error::ConfigError;

/// Fractional limbs used for coordinates held in a spec; renders resize to
/// their own precision decision.
pub const SPEC_FRAC_LIMBS: usize = 8;

/// Largest color index the distance representation produces for an escaped
/// pixel; inside pixels store one past it.
pub const DISTANCE_RANGE: i32 = 512;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FractalKind {
    Mandelbrot,
    Julia { re: BigFix, im: BigFix },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Representation {
    /// Raw iteration count.
    Escape,
    /// `ln`-compressed iteration count.
    EscapeLog { base: f64 },
    /// Distance-estimate color index, smooth near the set boundary.
    Distance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub center_re: BigFix,
    pub center_im: BigFix,
    pub magnification: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FractalSpec {
    pub kind: FractalKind,
    pub power: u32,
    pub max_iterations: u32,
    pub area: Area,
    pub representation: Representation,
}

impl FractalSpec {
    /// Standard Mandelbrot viewport: real axis -2.5..1.5 at magnification 1.
    pub fn mandelbrot(max_iterations: u32) -> Self {
        Self {
            kind: FractalKind::Mandelbrot,
            power: 2,
            max_iterations,
            area: Area {
                center_re: BigFix::from_f64(-0.5, SPEC_FRAC_LIMBS),
                center_im: BigFix::from_f64(0.0, SPEC_FRAC_LIMBS),
                magnification: 1.0,
            },
            representation: Representation::Escape,
        }
    }

    pub fn julia(param_re: f64, param_im: f64, max_iterations: u32) -> Self {
        Self {
            kind: FractalKind::Julia {
                re: BigFix::from_f64(param_re, SPEC_FRAC_LIMBS),
                im: BigFix::from_f64(param_im, SPEC_FRAC_LIMBS),
            },
            power: 2,
            max_iterations,
            area: Area {
                center_re: BigFix::from_f64(0.0, SPEC_FRAC_LIMBS),
                center_im: BigFix::from_f64(0.0, SPEC_FRAC_LIMBS),
                magnification: 1.0,
            },
            representation: Representation::Escape,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.area.magnification > 0.0) || !self.area.magnification.is_finite() {
            return Err(ConfigError::BadMagnification(self.area.magnification));
        }
        if self.power < 2 {
            return Err(ConfigError::BadPower(self.power));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if let Representation::EscapeLog { base } = self.representation {
            if !(base > 1.0) || !base.is_finite() {
                return Err(ConfigError::BadLogBase(base));
            }
        }
        Ok(())
    }

    pub fn needs_distance(&self) -> bool {
        matches!(self.representation, Representation::Distance)
    }

    /// The buffer value an inside-the-set pixel takes under this
    /// representation. Escaped pixels always store less; painters treat
    /// everything at or above it as inside.
    pub fn inside_value(&self) -> i32 {
        match self.representation {
            Representation::Escape => self.max_iterations as i32,
            Representation::EscapeLog { base } => {
                ((self.max_iterations as f64 + 1.0).ln() * 256.0 / base.ln()).round() as i32
            }
            Representation::Distance => DISTANCE_RANGE + 1,
        }
    }

    /// Per-frame animation variant with the magnification scaled.
    pub fn zoomed(&self, factor: f64) -> Self {
        let mut spec = self.clone();
        spec.area.magnification *= factor;
        spec
    }
}
