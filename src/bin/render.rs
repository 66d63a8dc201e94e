use std::path::PathBuf;

use structopt::StructOpt;

use mandelnet::bigfix::BigFix;
use mandelnet::painter::GreyscalePainter;
use mandelnet::scan::ScanStrategy;
use mandelnet::{render_frame, render_frame_with};
use mandelnet::spec::{FractalKind, FractalSpec, Representation, SPEC_FRAC_LIMBS};

#[derive(StructOpt)]
#[structopt(name = "mandelnet-render", about = "Render a single fractal image")]
struct Opt {
    #[structopt(short, long, default_value = "1920")]
    width: usize,

    #[structopt(long, default_value = "1080")]
    height: usize,

    /// Real part of the view center.
    #[structopt(long, default_value = "-0.5", allow_hyphen_values = true)]
    center_re: f64,

    /// Imaginary part of the view center.
    #[structopt(long, default_value = "0.0", allow_hyphen_values = true)]
    center_im: f64,

    #[structopt(short, long, default_value = "1.0")]
    magnification: f64,

    /// Exponent in z^p + c.
    #[structopt(short, long, default_value = "2")]
    power: u32,

    #[structopt(short, long, default_value = "1000")]
    iterations: u32,

    /// Julia parameter as "re,im"; omit for the Mandelbrot set.
    #[structopt(short, long, allow_hyphen_values = true)]
    julia: Option<String>,

    /// Pixel traversal: refine, mariani or boundary.
    #[structopt(short, long, default_value = "refine")]
    strategy: ScanStrategy,

    #[structopt(short, long)]
    threads: Option<usize>,

    /// Value mapping: escape, log or distance.
    #[structopt(short, long, default_value = "escape")]
    representation: String,

    #[structopt(long, default_value = "2.0")]
    log_base: f64,

    /// Paint with the greyscale ramp instead of the cyclic palette.
    #[structopt(short, long)]
    greyscale: bool,

    #[structopt(short, long, default_value = "out.png", parse(from_os_str))]
    output: PathBuf,
}

fn parse_julia(s: &str) -> Result<FractalKind, String> {
    let (re, im) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"re,im\", got {:?}", s))?;
    let re: f64 = re.trim().parse().map_err(|_| format!("bad real part {:?}", re))?;
    let im: f64 = im.trim().parse().map_err(|_| format!("bad imaginary part {:?}", im))?;
    Ok(FractalKind::Julia {
        re: BigFix::from_f64(re, SPEC_FRAC_LIMBS),
        im: BigFix::from_f64(im, SPEC_FRAC_LIMBS),
    })
}

fn build_spec(opt: &Opt) -> Result<FractalSpec, String> {
    let mut spec = FractalSpec::mandelbrot(opt.iterations);
    if let Some(julia) = &opt.julia {
        spec.kind = parse_julia(julia)?;
    }
    spec.power = opt.power;
    spec.area.center_re = BigFix::from_f64(opt.center_re, SPEC_FRAC_LIMBS);
    spec.area.center_im = BigFix::from_f64(opt.center_im, SPEC_FRAC_LIMBS);
    spec.area.magnification = opt.magnification;
    spec.representation = match opt.representation.as_str() {
        "escape" => Representation::Escape,
        "log" => Representation::EscapeLog { base: opt.log_base },
        "distance" => Representation::Distance,
        other => return Err(format!("unknown representation {:?}", other)),
    };
    Ok(spec)
}

fn run(opt: Opt) -> Result<(), String> {
    let spec = build_spec(&opt)?;
    let threads = opt.threads.unwrap_or_else(mandelnet::threads::default_thread_count);
    let img = if opt.greyscale {
        let painter = GreyscalePainter::new(spec.inside_value() as f64);
        render_frame_with(&spec, opt.width, opt.height, opt.strategy, threads, &painter)
    } else {
        render_frame(&spec, opt.width, opt.height, opt.strategy, threads)
    }
    .map_err(|e| e.to_string())?;
    img.save(&opt.output).map_err(|e| e.to_string())?;
    log::info!("wrote {}", opt.output.display());
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Opt::from_args()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
