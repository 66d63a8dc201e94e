//! Worker process: connects to a coordinator, announces its slot count, and
//! renders the frames it is handed until told to terminate.
//!
//! One dispatcher thread (the caller) reads coordinator commands; each slot
//! gets a dedicated render thread fed over a channel, so a long frame on one
//! slot never delays commands for the others. DONE lines go out through a
//! shared write half under a mutex.

use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{NetError, ProtocolError};
use crate::net::proto::{self, CoordMsg};
use crate::net::FrameSink;
use crate::render_frame;
use crate::scan::ScanStrategy;
use crate::spec::FractalSpec;

pub struct WorkerConfig {
    /// Coordinator address, e.g. "10.0.0.1:7331".
    pub addr: String,
    /// Slot count announced in MOIN; one render thread per slot.
    pub threads: usize,
    pub strategy: ScanStrategy,
}

struct SlotJob {
    frame: u32,
    width: usize,
    height: usize,
    spec: FractalSpec,
}

/// Run one worker session to completion. Returns `Ok` after a clean
/// TERMINATE, `Err` when the coordinator violates the protocol or the
/// connection drops.
pub fn run_worker(config: &WorkerConfig, sink: Arc<dyn FrameSink>) -> Result<(), NetError> {
    let stream = TcpStream::connect(&config.addr).map_err(|source| NetError::Connect {
        addr: config.addr.clone(),
        source,
    })?;
    log::info!("connected to coordinator at {}", config.addr);
    let writer = Arc::new(Mutex::new(stream.try_clone().map_err(NetError::Io)?));
    proto::send_moin(&mut *writer.lock().unwrap(), config.threads as u32)
        .map_err(NetError::Protocol)?;

    let mut senders: Vec<Sender<SlotJob>> = Vec::with_capacity(config.threads);
    let mut handles = Vec::with_capacity(config.threads);
    for slot in 0..config.threads {
        let (tx, rx) = channel::<SlotJob>();
        senders.push(tx);
        let writer = writer.clone();
        let sink = sink.clone();
        let strategy = config.strategy;
        let stream = stream.try_clone().map_err(NetError::Io)?;
        handles.push(thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                let result = render_frame(&job.spec, job.width, job.height, strategy, 1)
                    .map_err(|e| e.to_string())
                    .and_then(|img| {
                        sink.write_frame(job.frame as usize, &img)
                            .map_err(|e| e.to_string())
                    });
                match result {
                    Ok(()) => {
                        log::debug!("slot {} finished frame {}", slot, job.frame);
                        if proto::send_done(&mut *writer.lock().unwrap(), slot as u32).is_err() {
                            return;
                        }
                    }
                    Err(message) => {
                        // cannot complete the slot's work: drop the session
                        log::error!("frame {} failed: {}", job.frame, message);
                        let _ = stream.shutdown(Shutdown::Both);
                        return;
                    }
                }
            }
        }));
    }

    let mut reader = BufReader::new(stream.try_clone().map_err(NetError::Io)?);
    let outcome = dispatch(&mut reader, &senders, config.threads);
    let _ = stream.shutdown(Shutdown::Both);
    drop(senders);
    for handle in handles {
        let _ = handle.join();
    }
    outcome.map_err(NetError::Protocol)
}

fn dispatch(
    reader: &mut BufReader<TcpStream>,
    senders: &[Sender<SlotJob>],
    threads: usize,
) -> Result<(), ProtocolError> {
    loop {
        match proto::read_coord_msg(reader)? {
            CoordMsg::Render {
                slot,
                frame,
                width,
                height,
                spec,
            } => {
                if slot as usize >= threads {
                    return Err(ProtocolError::UnexpectedMessage(format!(
                        "RENDER for slot {} of {}",
                        slot, threads
                    )));
                }
                log::debug!("frame {} assigned to slot {}", frame, slot);
                let job = SlotJob {
                    frame,
                    width: width as usize,
                    height: height as usize,
                    spec,
                };
                if senders[slot as usize].send(job).is_err() {
                    // slot thread died rendering an earlier frame
                    return Err(ProtocolError::ConnectionClosed);
                }
            }
            CoordMsg::Terminate => {
                log::info!("received TERMINATE, shutting down");
                return Ok(());
            }
        }
    }
}
