//! Pixel traversal strategies.
//!
//! All three drive `RenderContext::render_pixel` and differ only in which
//! pixels they evaluate directly and which they propagate from neighbors.
//! Each run ends with every pixel filled, unless termination was requested.

use crate::render::RenderContext;

pub mod boundary;
pub mod mariani;
pub mod refine;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanStrategy {
    SuccessiveRefinement,
    MarianiSilver,
    BoundaryTrace,
}

impl std::str::FromStr for ScanStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refine" => Ok(Self::SuccessiveRefinement),
            "mariani" => Ok(Self::MarianiSilver),
            "boundary" => Ok(Self::BoundaryTrace),
            other => Err(format!(
                "unknown scan strategy {:?} (expected refine, mariani or boundary)",
                other
            )),
        }
    }
}

/// Counts returned from a scan run instead of mutated global counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Pixels that went through the complex iterator.
    pub evaluated: usize,
    /// Pixels propagated from neighbors without evaluation.
    pub filled: usize,
}

/// Run a whole scan over the context. `threads <= 1` selects the
/// single-threaded form of each strategy.
pub fn run(ctx: &RenderContext, strategy: ScanStrategy, threads: usize) -> ScanStats {
    match strategy {
        ScanStrategy::SuccessiveRefinement => refine::run(ctx, threads),
        ScanStrategy::MarianiSilver => mariani::run(ctx, threads),
        ScanStrategy::BoundaryTrace => {
            if threads > 1 {
                log::debug!("boundary trace is single-threaded; ignoring thread count");
            }
            boundary::run(ctx)
        }
    }
    ScanStats {
        evaluated: ctx.pixels_evaluated(),
        filled: ctx.pixels_done().saturating_sub(ctx.pixels_evaluated()),
    }
}
