//! Successive refinement: coarse-to-fine grid passes.
//!
//! Pass `k` evaluates a grid of stride `2^k`, starting at `INITIAL_CHUNK`
//! and halving down to 1. A pixel that is not on the coarser grid copies its
//! coarse parent's value when the parent and all of the parent's same-stride
//! neighbors agree; otherwise it is evaluated directly. Every pass completes
//! before the next begins; parallel workers pull rows from a shared cursor.

use crate::render::{RenderContext, UpdateRect, UNRENDERED};
use crate::threads::{run_workers, RowCursor};

pub const INITIAL_CHUNK: usize = 32;

pub fn run(ctx: &RenderContext, threads: usize) {
    let mut chunk = INITIAL_CHUNK
        .min(ctx.width().max(ctx.height()).next_power_of_two())
        .max(1);
    let mut first = true;
    loop {
        if ctx.cancelled() {
            return;
        }
        if threads > 1 {
            let cursor = RowCursor::new(chunk, ctx.height());
            run_workers(threads, |_| {
                while let Some(y) = cursor.next() {
                    if ctx.cancelled() {
                        return;
                    }
                    scan_row(ctx, y, chunk, first);
                }
            });
            // joining the workers is the hard barrier between passes
        } else {
            let mut y = 0;
            while y < ctx.height() {
                if ctx.cancelled() {
                    return;
                }
                scan_row(ctx, y, chunk, first);
                y += chunk;
            }
        }
        if chunk == 1 {
            return;
        }
        chunk /= 2;
        first = false;
    }
}

fn scan_row(ctx: &RenderContext, y: usize, chunk: usize, first: bool) {
    let coarse = chunk * 2;
    let mut x = 0;
    while x < ctx.width() {
        let on_coarse_grid = !first && x % coarse == 0 && y % coarse == 0;
        if !on_coarse_grid {
            refine_pixel(ctx, x, y, chunk, first);
        }
        x += chunk;
    }
}

fn refine_pixel(ctx: &RenderContext, x: usize, y: usize, chunk: usize, first: bool) {
    if ctx.value(x, y) != UNRENDERED {
        return;
    }
    if !first {
        let coarse = chunk * 2;
        let px = x - x % coarse;
        let py = y - y % coarse;
        if let Some(v) = uniform_neighborhood(ctx, px, py, coarse) {
            ctx.fill_pixel(x, y, v);
            return;
        }
    }
    ctx.render_pixel(x, y);
    if chunk > 1 {
        ctx.notify(UpdateRect {
            x,
            y,
            w: chunk.min(ctx.width() - x),
            h: chunk.min(ctx.height() - y),
        });
    }
}

/// The coarse parent's value when it agrees with all eight of its
/// same-stride neighbors; anything unrendered, disagreeing or out of bounds
/// disqualifies, so pixels near the image edge are always evaluated.
fn uniform_neighborhood(ctx: &RenderContext, px: usize, py: usize, coarse: usize) -> Option<i32> {
    let parent = ctx.value(px, py);
    if parent == UNRENDERED {
        return None;
    }
    let step = coarse as isize;
    for dy in [-step, 0, step] {
        for dx in [-step, 0, step] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = px as isize + dx;
            let ny = py as isize + dy;
            if nx < 0 || ny < 0 || nx as usize >= ctx.width() || ny as usize >= ctx.height() {
                return None;
            }
            if ctx.value(nx as usize, ny as usize) != parent {
                return None;
            }
        }
    }
    Some(parent)
}
