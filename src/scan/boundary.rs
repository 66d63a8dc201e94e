//! Boundary trace: walk iso-value contours and fill their insides.
//!
//! The outer loop visits pixels in scan order. Each unrendered pixel starts
//! a turtle walk along its iso-value region, keeping the wall on the right
//! (try right turn, then straight, then left, then back; four failures mean
//! an isolated pixel). A second pass along the recorded contour sweeps
//! perpendicular runs inward, filling a run only when it terminates at a
//! rendered pixel of the traced value; unresolved runs are left for the
//! outer loop. Single-threaded by design.

use crate::render::{RenderContext, UNRENDERED};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    fn delta(self) -> (isize, isize) {
        match self {
            Dir::East => (1, 0),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
            Dir::North => (0, -1),
        }
    }

    /// Clockwise in screen coordinates.
    fn right(self) -> Dir {
        match self {
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
            Dir::North => Dir::East,
        }
    }

    fn left(self) -> Dir {
        self.right().right().right()
    }
}

pub fn run(ctx: &RenderContext) {
    for y in 0..ctx.height() {
        if ctx.cancelled() {
            return;
        }
        for x in 0..ctx.width() {
            if ctx.value(x, y) == UNRENDERED {
                trace_region(ctx, x, y);
            }
        }
    }
}

fn trace_region(ctx: &RenderContext, x: usize, y: usize) {
    let v = ctx.render_pixel(x, y);
    if let Some(contour) = walk_contour(ctx, x, y, v) {
        fill_contour(ctx, &contour, v);
    }
}

/// Wall-on-the-right walk starting westward (the start pixel is the first
/// unrendered pixel of its row, so its wall is up or to the left). Returns
/// the contour as (position, heading) steps, or `None` for walks that did
/// not close (then the outer scan handles the region pixel by pixel).
fn walk_contour(
    ctx: &RenderContext,
    x: usize,
    y: usize,
    v: i32,
) -> Option<Vec<(usize, usize, Dir)>> {
    let start = (x, y, Dir::West);
    let mut pos = (x, y);
    let mut dir = Dir::West;
    let mut contour = Vec::new();
    // deterministic walk over at most 4 states per pixel
    let limit = 4 * ctx.width() * ctx.height();

    for _ in 0..limit {
        let mut moved = false;
        for next_dir in [dir.right(), dir, dir.left(), dir.left().left()] {
            if let Some(next) = step(ctx, pos, next_dir) {
                if ctx.render_pixel(next.0, next.1) == v {
                    contour.push((pos.0, pos.1, next_dir));
                    pos = next;
                    dir = next_dir;
                    moved = true;
                    break;
                }
            }
        }
        if !moved {
            // isolated pixel: four turns with no escape
            return Some(contour);
        }
        if (pos.0, pos.1, dir) == start {
            return Some(contour);
        }
    }
    None
}

fn step(ctx: &RenderContext, pos: (usize, usize), dir: Dir) -> Option<(usize, usize)> {
    let (dx, dy) = dir.delta();
    let nx = pos.0 as isize + dx;
    let ny = pos.1 as isize + dy;
    if nx < 0 || ny < 0 || nx as usize >= ctx.width() || ny as usize >= ctx.height() {
        return None;
    }
    Some((nx as usize, ny as usize))
}

/// Sweep perpendicular lines toward the interior (left of travel) and fill
/// unrendered runs bounded by the traced value.
fn fill_contour(ctx: &RenderContext, contour: &[(usize, usize, Dir)], v: i32) {
    for &(cx, cy, dir) in contour {
        let inward = dir.left();
        let mut run = Vec::new();
        let mut pos = (cx, cy);
        loop {
            match step(ctx, pos, inward) {
                None => break, // ran off the image: not enclosed, leave it
                Some(next) => {
                    let value = ctx.value(next.0, next.1);
                    if value == UNRENDERED {
                        run.push(next);
                        pos = next;
                    } else {
                        if value == v {
                            for (fx, fy) in run {
                                ctx.fill_pixel(fx, fy, v);
                            }
                        }
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FractalSpec;

    #[test]
    fn boundary_fills_every_pixel() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(64), 48, 32).unwrap();
        run(&ctx);
        for y in 0..32 {
            for x in 0..48 {
                assert_ne!(ctx.value(x, y), UNRENDERED, "pixel ({}, {})", x, y);
            }
        }
        assert_eq!(ctx.pixels_done(), 48 * 32);
    }

    #[test]
    fn uniform_view_traces_once() {
        let mut spec = FractalSpec::mandelbrot(64);
        spec.area.center_re = crate::bigfix::BigFix::from_f64(10.0, 8);
        let ctx = RenderContext::new(spec, 32, 32).unwrap();
        run(&ctx);
        assert_eq!(ctx.pixels_done(), 32 * 32);
        // the contour walk touches the edges; the interior is filled
        assert!(ctx.pixels_evaluated() < 32 * 32 / 2);
    }

    #[test]
    fn single_pixel_image() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(16), 1, 1).unwrap();
        run(&ctx);
        assert_eq!(ctx.pixels_done(), 1);
    }

    #[test]
    fn cancellation_observed_between_rows() {
        let ctx = RenderContext::new(FractalSpec::mandelbrot(64), 16, 16).unwrap();
        ctx.terminate();
        run(&ctx);
        assert_eq!(ctx.pixels_done(), 0);
    }
}
