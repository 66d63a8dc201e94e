//! Mariani-Silver rectangle subdivision.
//!
//! Evaluate a rectangle's border; a uniform border fills the interior with
//! that value (regions with a uniform border are assumed uniform — a known
//! heuristic kept for output parity, not verified). A mixed border splits the
//! rectangle along its longer axis, evaluates the splitting line, and
//! recurses into halves that still have an interior.
//!
//! The parallel form replaces recursion with the shared job queue; workers
//! push halves instead of descending, and the queue's idle-count rule
//! detects completion.

use crate::render::{RenderContext, UpdateRect};
use crate::threads::{run_workers, JobQueue};

/// Inclusive pixel rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    fn has_interior(&self) -> bool {
        self.x1 - self.x0 >= 2 && self.y1 - self.y0 >= 2
    }
}

pub fn run(ctx: &RenderContext, threads: usize) {
    let full = Rect {
        x0: 0,
        y0: 0,
        x1: ctx.width() - 1,
        y1: ctx.height() - 1,
    };
    if threads > 1 {
        let queue = JobQueue::new(threads);
        queue.push(full);
        run_workers(threads, |_| {
            while let Some(rect) = queue.next() {
                if ctx.cancelled() {
                    queue.close();
                    return;
                }
                subdivide(ctx, rect, &mut |half| queue.push(half));
            }
        });
    } else {
        let mut stack = vec![full];
        while let Some(rect) = stack.pop() {
            if ctx.cancelled() {
                return;
            }
            subdivide(ctx, rect, &mut |half| stack.push(half));
        }
    }
}

/// One subdivision step: border, uniform-fill or split, handing halves with
/// a non-empty interior to `pending`.
fn subdivide(ctx: &RenderContext, rect: Rect, pending: &mut dyn FnMut(Rect)) {
    if let Some(v) = uniform_border(ctx, rect) {
        fill_interior(ctx, rect, v);
        return;
    }
    if !rect.has_interior() {
        return;
    }
    let (a, b) = if rect.x1 - rect.x0 >= rect.y1 - rect.y0 {
        let mid = (rect.x0 + rect.x1) / 2;
        for y in rect.y0..=rect.y1 {
            ctx.render_pixel(mid, y);
        }
        (
            Rect { x1: mid, ..rect },
            Rect { x0: mid, ..rect },
        )
    } else {
        let mid = (rect.y0 + rect.y1) / 2;
        for x in rect.x0..=rect.x1 {
            ctx.render_pixel(x, mid);
        }
        (
            Rect { y1: mid, ..rect },
            Rect { y0: mid, ..rect },
        )
    };
    for half in [a, b] {
        if half.has_interior() {
            pending(half);
        }
    }
}

/// Render the border; `Some(v)` when every border pixel came out `v`.
fn uniform_border(ctx: &RenderContext, rect: Rect) -> Option<i32> {
    let v = ctx.render_pixel(rect.x0, rect.y0);
    let mut uniform = true;
    for x in rect.x0..=rect.x1 {
        uniform &= ctx.render_pixel(x, rect.y0) == v;
        uniform &= ctx.render_pixel(x, rect.y1) == v;
    }
    for y in rect.y0..=rect.y1 {
        uniform &= ctx.render_pixel(rect.x0, y) == v;
        uniform &= ctx.render_pixel(rect.x1, y) == v;
    }
    uniform.then_some(v)
}

fn fill_interior(ctx: &RenderContext, rect: Rect, v: i32) {
    for y in rect.y0 + 1..rect.y1 {
        for x in rect.x0 + 1..rect.x1 {
            ctx.fill_pixel(x, y, v);
        }
    }
    ctx.notify(UpdateRect {
        x: rect.x0,
        y: rect.y0,
        w: rect.x1 - rect.x0 + 1,
        h: rect.y1 - rect.y0 + 1,
    });
}
