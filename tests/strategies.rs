//! End-to-end checks that the pixel scan strategies produce complete,
//! consistent images.

use mandelnet::bigfix::BigFix;
use mandelnet::render::{RenderContext, UNRENDERED};
use mandelnet::scan::{self, ScanStrategy};
use mandelnet::spec::{FractalSpec, Representation, SPEC_FRAC_LIMBS};

const STRATEGIES: [ScanStrategy; 3] = [
    ScanStrategy::SuccessiveRefinement,
    ScanStrategy::MarianiSilver,
    ScanStrategy::BoundaryTrace,
];

fn values(ctx: &RenderContext) -> Vec<i32> {
    ctx.i_values().iter().copied().collect()
}

#[test]
fn every_strategy_completes_a_detailed_view() {
    for strategy in STRATEGIES {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(64), 52, 36).unwrap();
        scan::run(&ctx, strategy, 2);
        for (i, v) in values(&ctx).iter().enumerate() {
            assert_ne!(*v, UNRENDERED, "{:?} left pixel {} unrendered", strategy, i);
            assert!(
                (1..=64).contains(v),
                "{:?} produced out-of-range value {} at pixel {}",
                strategy,
                v,
                i
            );
        }
        assert_eq!(ctx.pixels_done(), 52 * 36);
    }
}

#[test]
fn uniform_escape_view_is_exact() {
    // center far outside the set: every orbit escapes on the first iteration,
    // so neighbor propagation cannot disagree with direct evaluation
    let mut spec = FractalSpec::mandelbrot(64);
    spec.area.center_re = BigFix::from_f64(10.0, SPEC_FRAC_LIMBS);
    for strategy in STRATEGIES {
        let ctx = RenderContext::new(spec.clone(), 40, 40).unwrap();
        scan::run(&ctx, strategy, 2);
        assert!(
            values(&ctx).iter().all(|v| *v == 1),
            "{:?} broke a constant view",
            strategy
        );
        assert!(
            ctx.pixels_evaluated() < 40 * 40,
            "{:?} never propagated on a constant view",
            strategy
        );
    }
}

#[test]
fn uniform_inside_view_is_exact() {
    // z^2 with c = 0 never escapes inside the unit disk
    let mut spec = FractalSpec::julia(0.0, 0.0, 50);
    spec.area.magnification = 16.0;
    for strategy in STRATEGIES {
        let ctx = RenderContext::new(spec.clone(), 32, 32).unwrap();
        scan::run(&ctx, strategy, 2);
        assert!(
            values(&ctx).iter().all(|v| *v == 50),
            "{:?} broke a constant inside view",
            strategy
        );
    }
}

#[test]
fn strategies_agree_on_smooth_band_view() {
    // a view left of the set: every point escapes and the iteration bands
    // are smooth, so every propagation heuristic is exact and all three
    // strategies must match direct per-pixel evaluation
    let mut spec = FractalSpec::mandelbrot(32);
    spec.area.center_re = BigFix::from_f64(-3.0, SPEC_FRAC_LIMBS);
    spec.area.magnification = 2.0;

    let direct = RenderContext::new(spec.clone(), 48, 48).unwrap();
    for y in 0..48 {
        for x in 0..48 {
            direct.render_pixel(x, y);
        }
    }
    let truth = values(&direct);

    for strategy in STRATEGIES {
        let ctx = RenderContext::new(spec.clone(), 48, 48).unwrap();
        scan::run(&ctx, strategy, 1);
        assert_eq!(values(&ctx), truth, "{:?} diverged from direct evaluation", strategy);
    }
}

#[test]
fn mariani_thread_count_does_not_change_pixels() {
    let spec = FractalSpec::mandelbrot(48);
    let single = RenderContext::new(spec.clone(), 40, 40).unwrap();
    scan::run(&single, ScanStrategy::MarianiSilver, 1);
    let threaded = RenderContext::new(spec, 40, 40).unwrap();
    scan::run(&threaded, ScanStrategy::MarianiSilver, 4);
    assert_eq!(values(&single), values(&threaded));
}

#[test]
fn refinement_thread_count_does_not_change_pixels() {
    let spec = FractalSpec::mandelbrot(48);
    let single = RenderContext::new(spec.clone(), 40, 40).unwrap();
    scan::run(&single, ScanStrategy::SuccessiveRefinement, 1);
    let threaded = RenderContext::new(spec, 40, 40).unwrap();
    scan::run(&threaded, ScanStrategy::SuccessiveRefinement, 4);
    assert_eq!(values(&single), values(&threaded));
}

#[test]
fn second_scan_is_a_noop() {
    let ctx = RenderContext::new(FractalSpec::mandelbrot(32), 24, 24).unwrap();
    scan::run(&ctx, ScanStrategy::SuccessiveRefinement, 1);
    let before = values(&ctx);
    let evaluated = ctx.pixels_evaluated();
    scan::run(&ctx, ScanStrategy::MarianiSilver, 1);
    assert_eq!(values(&ctx), before);
    assert_eq!(ctx.pixels_evaluated(), evaluated);
}

#[test]
fn distance_values_stay_in_index_range() {
    let mut spec = FractalSpec::mandelbrot(100);
    spec.representation = Representation::Distance;
    let inside = spec.inside_value();
    let ctx = RenderContext::new(spec, 48, 32).unwrap();
    scan::run(&ctx, ScanStrategy::SuccessiveRefinement, 2);
    for v in values(&ctx) {
        assert!((0..=inside).contains(&v), "distance index {} out of range", v);
    }
}

#[test]
fn deep_zoom_uses_limbs_and_completes() {
    let mut spec = FractalSpec::mandelbrot(40);
    spec.area.magnification = 2f64.powi(55);
    let ctx = RenderContext::new(spec, 12, 12).unwrap();
    assert!(!ctx.precision().uses_float());
    scan::run(&ctx, ScanStrategy::MarianiSilver, 1);
    assert_eq!(ctx.pixels_done(), 12 * 12);
}
