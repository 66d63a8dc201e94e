use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use mandelnet::bigfix::BigFix;
use mandelnet::net::coordinator::{run_animation, CoordinatorConfig};
use mandelnet::net::{FrameGenerator, PngDirSink};
use mandelnet::scan::ScanStrategy;
use mandelnet::spec::{FractalSpec, SPEC_FRAC_LIMBS};

#[derive(StructOpt)]
#[structopt(
    name = "mandelnet-animate",
    about = "Render a zoom animation, optionally distributing frames to workers"
)]
struct Opt {
    #[structopt(short, long, default_value = "1280")]
    width: usize,

    #[structopt(long, default_value = "720")]
    height: usize,

    #[structopt(short, long, default_value = "120")]
    frames: usize,

    /// Magnification multiplier applied per frame.
    #[structopt(short, long, default_value = "1.05")]
    zoom: f64,

    /// Real part of the zoom target.
    #[structopt(long, default_value = "-0.743643887037151", allow_hyphen_values = true)]
    center_re: f64,

    /// Imaginary part of the zoom target.
    #[structopt(long, default_value = "0.13182590420533", allow_hyphen_values = true)]
    center_im: f64,

    #[structopt(short, long, default_value = "1000")]
    iterations: u32,

    #[structopt(short, long, default_value = "2")]
    power: u32,

    /// Pixel traversal: refine, mariani or boundary.
    #[structopt(short, long, default_value = "refine")]
    strategy: ScanStrategy,

    /// Local render threads; 0 leaves all frames to connected workers.
    #[structopt(short = "t", long)]
    local_threads: Option<usize>,

    /// Listen address for worker processes, e.g. 0.0.0.0:7331.
    #[structopt(short, long)]
    listen: Option<String>,

    /// Directory receiving frame_NNNNN.png files.
    #[structopt(short, long, default_value = "frames", parse(from_os_str))]
    outdir: PathBuf,

    /// Write a per-frame "who rendered it" index to this file.
    #[structopt(long, parse(from_os_str))]
    index: Option<PathBuf>,
}

fn run(opt: Opt) -> Result<(), String> {
    std::fs::create_dir_all(&opt.outdir).map_err(|e| e.to_string())?;

    let mut base = FractalSpec::mandelbrot(opt.iterations);
    base.power = opt.power;
    base.area.center_re = BigFix::from_f64(opt.center_re, SPEC_FRAC_LIMBS);
    base.area.center_im = BigFix::from_f64(opt.center_im, SPEC_FRAC_LIMBS);
    let zoom = opt.zoom;
    let generator: FrameGenerator = Box::new(move |frame| base.zoomed(zoom.powi(frame as i32)));

    let config = CoordinatorConfig {
        width: opt.width,
        height: opt.height,
        frames: opt.frames,
        strategy: opt.strategy,
        local_threads: opt
            .local_threads
            .unwrap_or_else(mandelnet::threads::default_thread_count),
        listen: opt.listen,
        index_path: opt.index,
    };
    let sink = Arc::new(PngDirSink::new(&opt.outdir));
    let outcomes = run_animation(&config, generator, sink).map_err(|e| e.to_string())?;
    log::info!("animation complete: {} frames in {}", outcomes.len(), opt.outdir.display());
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Opt::from_args()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
