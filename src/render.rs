//! Renderer context: one render invocation's pixel buffer, progress counter,
//! cancellation flag, and representation mapping.
//!
//! The buffer holds `i32` per pixel, `-1` meaning unrendered. Writes are
//! disjoint by traversal-order invariants of the scan strategies; atomics
//! make the sharing sound and keep `render_pixel` idempotent under races.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use ndarray::Array2;

use crate::coord::PixelMap;
use crate::error::ConfigError;
use crate::iterate::{Evaluator, PointResult};
use crate::precision::PrecisionDecision;
use crate::spec::{FractalSpec, Representation, DISTANCE_RANGE};

pub const UNRENDERED: i32 = -1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UpdateRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

pub type UpdateNotifier = Box<dyn Fn(UpdateRect) + Send + Sync>;

pub struct RenderContext {
    spec: FractalSpec,
    map: PixelMap,
    precision: PrecisionDecision,
    evaluator: Evaluator,
    buf: Vec<AtomicI32>,
    done: AtomicUsize,
    evaluated: AtomicUsize,
    cancel: AtomicBool,
    notifier: Option<UpdateNotifier>,
}

impl RenderContext {
    pub fn new(spec: FractalSpec, width: usize, height: usize) -> Result<Self, ConfigError> {
        spec.validate()?;
        if width == 0 || height == 0 {
            return Err(ConfigError::BadDimensions(width, height));
        }
        let map = PixelMap::new(
            &spec.area.center_re,
            &spec.area.center_im,
            spec.area.magnification,
            width,
            height,
            0,
        );
        let precision = PrecisionDecision::for_pixel_delta(map.pixel_delta());
        let map = PixelMap::new(
            &spec.area.center_re,
            &spec.area.center_im,
            spec.area.magnification,
            width,
            height,
            precision.frac_limbs,
        );
        let evaluator = Evaluator::new(&spec, precision.frac_limbs);
        let mut buf = Vec::with_capacity(width * height);
        buf.resize_with(width * height, || AtomicI32::new(UNRENDERED));
        Ok(Self {
            spec,
            map,
            precision,
            evaluator,
            buf,
            done: AtomicUsize::new(0),
            evaluated: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
            notifier: None,
        })
    }

    pub fn with_notifier(mut self, notifier: UpdateNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn width(&self) -> usize {
        self.map.width
    }

    pub fn height(&self) -> usize {
        self.map.height
    }

    pub fn spec(&self) -> &FractalSpec {
        &self.spec
    }

    pub fn precision(&self) -> PrecisionDecision {
        self.precision
    }

    /// Evaluate one pixel, or return the stored value if it is already
    /// rendered. Losing a store race also returns the winner's value, so
    /// repeated calls always agree.
    pub fn render_pixel(&self, x: usize, y: usize) -> i32 {
        let idx = y * self.map.width + x;
        let stored = self.buf[idx].load(Ordering::Acquire);
        if stored != UNRENDERED {
            return stored;
        }
        let result = if self.precision.uses_float() {
            let (px, py) = self.map.point_f64(x, y);
            self.evaluator.eval_f64(px, py)
        } else {
            let (px, py) = self.map.point_big(x, y);
            self.evaluator.eval_big(&px, &py)
        };
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        let value = self.represent(&result);
        match self.buf[idx].compare_exchange(
            UNRENDERED,
            value,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.done.fetch_add(1, Ordering::Relaxed);
                self.notify(UpdateRect { x, y, w: 1, h: 1 });
                value
            }
            Err(winner) => winner,
        }
    }

    /// Store a value propagated from a neighbor without evaluating.
    pub fn fill_pixel(&self, x: usize, y: usize, value: i32) {
        let idx = y * self.map.width + x;
        if self.buf[idx]
            .compare_exchange(UNRENDERED, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.done.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Raw buffer read; `UNRENDERED` when the pixel has not been touched.
    pub fn value(&self, x: usize, y: usize) -> i32 {
        self.buf[y * self.map.width + x].load(Ordering::Acquire)
    }

    pub fn progress(&self) -> f64 {
        self.done.load(Ordering::Relaxed) as f64 / (self.map.width * self.map.height) as f64
    }

    pub fn pixels_done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn pixels_evaluated(&self) -> usize {
        self.evaluated.load(Ordering::Relaxed)
    }

    /// Cooperative cancellation, observed at scan-loop granularity.
    pub fn terminate(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn notify(&self, rect: UpdateRect) {
        if let Some(notifier) = &self.notifier {
            notifier(rect);
        }
    }

    /// Snapshot of the iteration buffer for painting.
    pub fn i_values(&self) -> Array2<i32> {
        Array2::from_shape_fn((self.map.height, self.map.width), |(y, x)| self.value(x, y))
    }

    fn represent(&self, result: &PointResult) -> i32 {
        match self.spec.representation {
            Representation::Escape => result.iterations as i32,
            Representation::EscapeLog { base } => {
                let factor = 256.0 / base.ln();
                ((result.iterations as f64 + 1.0).ln() * factor).round() as i32
            }
            Representation::Distance => distance_index(result.distance, self.map.pixel_delta()),
        }
    }
}

/// Map a distance estimate to a color index: 0 far away, `DISTANCE_RANGE`
/// touching the boundary, one past it for inside pixels. An infinite
/// estimate (zero derivative at escape) is maximally far.
fn distance_index(distance: Option<f64>, pixel_delta: f64) -> i32 {
    match distance {
        None => DISTANCE_RANGE + 1,
        Some(d) if d == f64::INFINITY => 0,
        Some(d) if d > 0.0 && d.is_finite() => {
            let index = -8.0 * (d / pixel_delta).log2();
            index.round().clamp(0.0, DISTANCE_RANGE as f64) as i32
        }
        // zero, negative or NaN: treat as touching the boundary
        Some(_) => DISTANCE_RANGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn render_pixel_is_idempotent() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(100), 16, 16).unwrap();
        let first = ctx.render_pixel(0, 0);
        let evaluated = ctx.pixels_evaluated();
        let second = ctx.render_pixel(0, 0);
        assert_eq!(first, second);
        assert_eq!(ctx.pixels_evaluated(), evaluated, "second call must not evaluate");
        assert_eq!(ctx.pixels_done(), 1);
    }

    #[test]
    fn progress_is_monotonic() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(50), 8, 8).unwrap();
        assert_eq!(ctx.progress(), 0.0);
        let mut last = 0.0;
        for y in 0..8 {
            for x in 0..8 {
                ctx.render_pixel(x, y);
                let p = ctx.progress();
                assert!(p >= last);
                last = p;
            }
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn fill_does_not_overwrite() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(50), 8, 8).unwrap();
        let v = ctx.render_pixel(3, 3);
        ctx.fill_pixel(3, 3, v + 17);
        assert_eq!(ctx.value(3, 3), v);
        assert_eq!(ctx.pixels_done(), 1);
    }

    #[test]
    fn notifier_sees_every_pixel() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let ctx = RenderContext::new(FractalSpec::mandelbrot(50), 4, 4)
            .unwrap()
            .with_notifier(Box::new(move |rect| {
                assert_eq!((rect.w, rect.h), (1, 1));
                seen.fetch_add(1, Ordering::Relaxed);
            }));
        for y in 0..4 {
            for x in 0..4 {
                ctx.render_pixel(x, y);
            }
        }
        assert_eq!(count.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn concrete_precision_boundary_pixel() {
        // 64x64, power 2, 100 iterations: pixel (0,0) of the standard
        // viewport escapes at iteration 1 on both arithmetic paths
        let shallow = FractalSpec::mandelbrot(100);
        let ctx = RenderContext::new(shallow.clone(), 64, 64).unwrap();
        assert!(ctx.precision().uses_float());
        assert_eq!(ctx.render_pixel(0, 0), 1);

        let mut deep = shallow;
        deep.area.magnification = 2f64.powi(55);
        let ctx = RenderContext::new(deep, 64, 64).unwrap();
        assert!(!ctx.precision().uses_float());
        // the deep view sits at the same center, far inside the set
        let v = ctx.render_pixel(0, 0);
        assert_eq!(v, 100);
    }

    #[test]
    fn distance_index_orders_by_proximity() {
        let delta = 0.01;
        assert_eq!(distance_index(None, delta), DISTANCE_RANGE + 1);
        assert_eq!(distance_index(Some(f64::INFINITY), delta), 0);
        assert_eq!(distance_index(Some(100.0), delta), 0);
        assert_eq!(distance_index(Some(delta), delta), 0);
        assert_eq!(distance_index(Some(delta / 4.0), delta), 16);
        assert_eq!(distance_index(Some(0.0), delta), DISTANCE_RANGE);
        assert_eq!(distance_index(Some(1e-300), delta), DISTANCE_RANGE);
    }

    #[test]
    fn escape_log_compresses() {
        let mut spec = FractalSpec::mandelbrot(100);
        spec.representation = Representation::EscapeLog { base: 2.0 };
        let ctx = RenderContext::new(spec, 16, 16).unwrap();
        let v = ctx.render_pixel(0, 0);
        // iteration 1 maps to round(ln(2) * 256/ln(2)) = 256
        assert_eq!(v, 256);
    }
}
