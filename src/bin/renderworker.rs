use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use mandelnet::net::worker::{run_worker, WorkerConfig};
use mandelnet::net::PngDirSink;
use mandelnet::scan::ScanStrategy;

#[derive(StructOpt)]
#[structopt(
    name = "mandelnet-worker",
    about = "Connect to a coordinator and render the frames it assigns"
)]
struct Opt {
    /// Coordinator address, e.g. 10.0.0.1:7331.
    #[structopt(short, long)]
    connect: String,

    /// Concurrent frames to offer; defaults to the physical core count.
    #[structopt(short, long)]
    threads: Option<usize>,

    /// Pixel traversal: refine, mariani or boundary.
    #[structopt(short, long, default_value = "refine")]
    strategy: ScanStrategy,

    /// Directory receiving frame_NNNNN.png files.
    #[structopt(short, long, default_value = "frames", parse(from_os_str))]
    outdir: PathBuf,
}

fn run(opt: Opt) -> Result<(), String> {
    std::fs::create_dir_all(&opt.outdir).map_err(|e| e.to_string())?;
    let config = WorkerConfig {
        addr: opt.connect,
        threads: opt
            .threads
            .unwrap_or_else(mandelnet::threads::default_thread_count)
            .max(1),
        strategy: opt.strategy,
    };
    let sink = Arc::new(PngDirSink::new(&opt.outdir));
    run_worker(&config, sink).map_err(|e| e.to_string())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Opt::from_args()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
