//! Escape-time fractal renderer: Mandelbrot and Julia sets at arbitrary
//! integer power, with fixed-point deep zoom, adaptive pixel scan
//! strategies, and frame distribution over TCP.

use image::RgbImage;

use crate::error::ConfigError;
use crate::painter::{Painter, PalettePainter};
use crate::render::RenderContext;
use crate::scan::ScanStrategy;
use crate::spec::FractalSpec;

pub mod bigfix;
pub mod coord;
pub mod error;
pub mod iterate;
pub mod net;
pub mod painter;
pub mod precision;
pub mod render;
pub mod scan;
pub mod spec;
pub mod threads;

/// Render one frame start to finish with the default cyclic palette. The
/// painter's inside threshold follows the spec's representation, so log and
/// distance frames keep their escaped pixels colored.
pub fn render_frame(
    spec: &FractalSpec,
    width: usize,
    height: usize,
    strategy: ScanStrategy,
    threads: usize,
) -> Result<RgbImage, ConfigError> {
    let painter = PalettePainter::standard(spec.inside_value());
    render_frame_with(spec, width, height, strategy, threads, &painter)
}

/// Render one frame with a caller-supplied painter: context, scan, paint.
pub fn render_frame_with(
    spec: &FractalSpec,
    width: usize,
    height: usize,
    strategy: ScanStrategy,
    threads: usize,
    painter: &dyn Painter,
) -> Result<RgbImage, ConfigError> {
    let ctx = RenderContext::new(spec.clone(), width, height)?;
    let stats = scan::run(&ctx, strategy, threads);
    log::debug!(
        "rendered {}x{}: {} evaluated, {} filled",
        width,
        height,
        stats.evaluated,
        stats.filled
    );
    Ok(painter.paint(&ctx.i_values()))
}
