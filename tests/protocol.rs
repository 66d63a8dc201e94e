//! Loopback coordinator/worker sessions: frame distribution, requeueing on
//! worker death, and protocol violation handling.

use std::io::BufReader;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::RgbImage;

use mandelnet::error::NetError;
use mandelnet::net::coordinator::{run_animation, CoordinatorConfig};
use mandelnet::net::proto::{self, CoordMsg};
use mandelnet::net::worker::{run_worker, WorkerConfig};
use mandelnet::net::{FrameGenerator, FrameOutcome, FrameSink};
use mandelnet::scan::ScanStrategy;
use mandelnet::spec::FractalSpec;

struct CollectingSink {
    frames: Mutex<Vec<usize>>,
}

impl CollectingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
        })
    }

    fn sorted(&self) -> Vec<usize> {
        let mut frames = self.frames.lock().unwrap().clone();
        frames.sort_unstable();
        frames
    }
}

impl FrameSink for CollectingSink {
    fn write_frame(&self, frame: usize, _image: &RgbImage) -> std::io::Result<()> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

/// Reserve a loopback address by binding an ephemeral port and releasing it.
fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

fn connect_retry(addr: &str) -> TcpStream {
    for _ in 0..200 {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("no listener appeared on {}", addr);
}

fn run_worker_retry(config: &WorkerConfig, sink: Arc<dyn FrameSink>) -> Result<(), NetError> {
    for _ in 0..200 {
        match run_worker(config, sink.clone()) {
            Err(NetError::Connect { .. }) => thread::sleep(Duration::from_millis(10)),
            other => return other,
        }
    }
    panic!("no listener appeared on {}", config.addr);
}

fn animation_config(frames: usize, local_threads: usize, listen: String) -> CoordinatorConfig {
    CoordinatorConfig {
        width: 8,
        height: 8,
        frames,
        strategy: ScanStrategy::MarianiSilver,
        local_threads,
        listen: Some(listen),
        index_path: None,
    }
}

fn zoom_generator() -> FrameGenerator {
    Box::new(|frame| FractalSpec::mandelbrot(16).zoomed(1.1f64.powi(frame as i32)))
}

#[test]
fn remote_worker_renders_every_frame() {
    let addr = free_addr();
    let config = animation_config(5, 0, addr.clone());
    let coord_sink = CollectingSink::new();
    let coord_sink_arc: Arc<dyn FrameSink> = coord_sink.clone();
    let coordinator =
        thread::spawn(move || run_animation(&config, zoom_generator(), coord_sink_arc));

    let worker_sink = CollectingSink::new();
    let worker_config = WorkerConfig {
        addr,
        threads: 2,
        strategy: ScanStrategy::MarianiSilver,
    };
    run_worker_retry(&worker_config, worker_sink.clone()).unwrap();

    let outcomes = coordinator.join().unwrap().unwrap();
    assert_eq!(outcomes.len(), 5);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, FrameOutcome::Remote(_))));
    assert_eq!(worker_sink.sorted(), vec![0, 1, 2, 3, 4]);
    assert!(coord_sink.sorted().is_empty());
}

#[test]
fn dead_worker_frames_are_requeued() {
    let addr = free_addr();
    let config = animation_config(2, 0, addr.clone());
    let coord_sink: Arc<dyn FrameSink> = CollectingSink::new();
    let coordinator = thread::spawn(move || run_animation(&config, zoom_generator(), coord_sink));

    // a worker that takes one frame and dies without finishing it
    {
        let mut stream = connect_retry(&addr);
        proto::send_moin(&mut stream, 1).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        match proto::read_coord_msg(&mut reader).unwrap() {
            CoordMsg::Render { frame, .. } => assert_eq!(frame, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    let worker_sink = CollectingSink::new();
    let worker_config = WorkerConfig {
        addr,
        threads: 2,
        strategy: ScanStrategy::MarianiSilver,
    };
    run_worker_retry(&worker_config, worker_sink.clone()).unwrap();

    let outcomes = coordinator.join().unwrap().unwrap();
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, FrameOutcome::Remote(_))));
    // the abandoned frame was reassigned, nothing rendered twice
    assert_eq!(worker_sink.sorted(), vec![0, 1]);
}

#[test]
fn requeued_frame_reaches_an_idle_client() {
    let addr = free_addr();
    let config = animation_config(2, 0, addr.clone());
    let coord_sink: Arc<dyn FrameSink> = CollectingSink::new();
    let coordinator = thread::spawn(move || run_animation(&config, zoom_generator(), coord_sink));

    // client A takes the first frame and stalls on it
    let a = connect_retry(&addr);
    let mut a_writer = a.try_clone().unwrap();
    proto::send_moin(&mut a_writer, 1).unwrap();
    let mut a_reader = BufReader::new(a.try_clone().unwrap());
    match proto::read_coord_msg(&mut a_reader).unwrap() {
        CoordMsg::Render { frame, .. } => assert_eq!(frame, 0),
        other => panic!("unexpected {:?}", other),
    }

    // client B finishes the second frame, then sits idle with a free slot
    let b = connect_retry(&addr);
    let mut b_writer = b.try_clone().unwrap();
    proto::send_moin(&mut b_writer, 1).unwrap();
    let mut b_reader = BufReader::new(b.try_clone().unwrap());
    match proto::read_coord_msg(&mut b_reader).unwrap() {
        CoordMsg::Render { slot, frame, .. } => {
            assert_eq!(frame, 1);
            proto::send_done(&mut b_writer, slot).unwrap();
        }
        other => panic!("unexpected {:?}", other),
    }

    // kill A only after B has gone idle: its frame must reach B anyway
    thread::sleep(Duration::from_millis(200));
    a.shutdown(Shutdown::Both).unwrap();
    loop {
        match proto::read_coord_msg(&mut b_reader).unwrap() {
            CoordMsg::Render { slot, frame, .. } => {
                assert_eq!(frame, 0);
                proto::send_done(&mut b_writer, slot).unwrap();
            }
            CoordMsg::Terminate => break,
        }
    }

    let outcomes = coordinator.join().unwrap().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, FrameOutcome::Remote(_))));
}

#[test]
fn misbehaving_client_does_not_stall_the_animation() {
    let addr = free_addr();
    // frames heavy enough that the listener outlives the rogue connect below
    let mut config = animation_config(2, 1, addr.clone());
    config.width = 400;
    config.height = 400;
    let generator: FrameGenerator = Box::new(|frame| {
        let mut spec = FractalSpec::mandelbrot(2000);
        spec.area.center_re = mandelnet::bigfix::BigFix::from_f64(-0.743643887037151, 8);
        spec.area.center_im = mandelnet::bigfix::BigFix::from_f64(0.13182590420533, 8);
        spec.area.magnification = 50.0 * 1.1f64.powi(frame as i32);
        spec
    });
    let coord_sink = CollectingSink::new();
    let coord_sink_arc: Arc<dyn FrameSink> = coord_sink.clone();
    let coordinator = thread::spawn(move || run_animation(&config, generator, coord_sink_arc));

    let mut stream = connect_retry(&addr);
    std::io::Write::write_all(&mut stream, b"BOGUS 1\r\n").unwrap();

    let outcomes = coordinator.join().unwrap().unwrap();
    assert!(outcomes.iter().all(|o| *o == FrameOutcome::Local));
    assert_eq!(coord_sink.sorted(), vec![0, 1]);

    // the violating connection was closed by the coordinator
    let mut reader = BufReader::new(stream);
    assert!(proto::read_line(&mut reader).is_err());
}
