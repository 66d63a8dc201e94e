//! Coordinator: drives an animation by handing frames to local worker
//! threads and to connected worker processes.
//!
//! All protocol state lives on the event-loop thread; per-client reader
//! threads only frame lines and forward them over one mpsc channel, and the
//! local pool reports completions through the same channel, which doubles as
//! the wake mechanism while the loop waits. Writes to clients happen only
//! from the event loop.

use std::collections::{HashMap, VecDeque};
use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{ConfigError, NetError, ProtocolError, RenderError};
use crate::net::proto::{self, WorkerMsg};
use crate::net::{FrameGenerator, FrameOutcome, FrameSink, WorkItem};
use crate::render_frame;
use crate::scan::ScanStrategy;

/// Upper bound on slots a single client may announce.
const MAX_SLOTS: u32 = 256;
const TICK: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct CoordinatorConfig {
    pub width: usize,
    pub height: usize,
    pub frames: usize,
    pub strategy: ScanStrategy,
    /// Local render threads; may be 0 when a listener carries all the work.
    pub local_threads: usize,
    /// Bind address for worker processes, e.g. "0.0.0.0:7331".
    pub listen: Option<String>,
    /// Optional per-frame "who rendered it" index file.
    pub index_path: Option<PathBuf>,
}

enum Event {
    Accepted(TcpStream),
    FromClient(usize, WorkerMsg),
    ClientGone(usize, ProtocolError),
    LocalDone(usize),
    LocalFailed(usize, String),
}

/// Coordinator side of one worker connection. In-flight WorkItems live in
/// `slots`; they return to the pending list if the session dies.
struct ClientSession {
    name: String,
    stream: TcpStream,
    slots: Vec<Option<WorkItem>>,
    announced: bool,
}

struct PendingState {
    items: VecDeque<WorkItem>,
    closed: bool,
}

/// The global pending list: local workers block on it, the event loop polls
/// it when dispatching to clients, and dead clients' work returns to its head.
struct Pending {
    state: Mutex<PendingState>,
    available: Condvar,
}

impl Pending {
    fn new(items: VecDeque<WorkItem>) -> Self {
        Self {
            state: Mutex::new(PendingState {
                items,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Blocking pop for local workers; `None` only after close.
    fn pop_wait(&self) -> Option<WorkItem> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    fn pop(&self) -> Option<WorkItem> {
        self.state.lock().unwrap().items.pop_front()
    }

    /// Return an interrupted item to the head so it is retried first.
    fn requeue_front(&self, item: WorkItem) {
        let mut state = self.state.lock().unwrap();
        state.items.push_front(item);
        drop(state);
        self.available.notify_one();
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }
}

/// Render every frame of the animation, locally and across connected worker
/// processes. Returns the per-frame outcomes in frame order.
pub fn run_animation(
    config: &CoordinatorConfig,
    generator: FrameGenerator,
    sink: Arc<dyn FrameSink>,
) -> Result<Vec<FrameOutcome>, RenderError> {
    if config.local_threads == 0 && config.listen.is_none() {
        return Err(ConfigError::NoCapacity.into());
    }

    let items: VecDeque<WorkItem> = (0..config.frames)
        .map(|frame| WorkItem {
            frame,
            spec: generator(frame),
        })
        .collect();
    for item in &items {
        item.spec.validate()?;
    }
    let pending = Arc::new(Pending::new(items));
    let shutdown = Arc::new(AtomicBool::new(false));
    let (tx, rx) = channel::<Event>();

    let mut handles = Vec::new();
    if let Some(addr) = &config.listen {
        match TcpListener::bind(addr) {
            Ok(listener) => {
                log::info!("listening for workers on {}", addr);
                handles.push(spawn_acceptor(listener, tx.clone(), shutdown.clone()));
            }
            Err(source) => {
                let err = NetError::Bind {
                    addr: addr.clone(),
                    source,
                };
                if config.local_threads == 0 {
                    return Err(err.into());
                }
                // degraded but functional: local threads carry the animation
                log::warn!("{}; continuing with local threads only", err);
            }
        }
    }
    for _ in 0..config.local_threads {
        handles.push(spawn_local_worker(
            pending.clone(),
            tx.clone(),
            sink.clone(),
            config.clone(),
        ));
    }

    let mut outcomes = vec![FrameOutcome::NotDone; config.frames];
    let mut resolved = 0usize;
    let mut clients: HashMap<usize, ClientSession> = HashMap::new();
    let mut next_client_id = 0usize;

    // event loop: the single place protocol state changes
    while resolved < config.frames {
        let event = match rx.recv_timeout(TICK) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                // requeued work may be waiting on clients that are idle
                dispatch_pending(&pending, &mut clients, config);
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match event {
            Event::Accepted(stream) => match register_client(stream, next_client_id, &tx) {
                Ok(session) => {
                    log::info!("worker connected from {}", session.name);
                    clients.insert(next_client_id, session);
                    next_client_id += 1;
                }
                Err(e) => log::warn!("failed to register worker: {}", e),
            },
            Event::FromClient(id, WorkerMsg::Moin { threads }) => {
                let valid = clients
                    .get(&id)
                    .map(|c| !c.announced && threads > 0)
                    .unwrap_or(false);
                if !valid {
                    kill_client(&pending, &mut clients, id);
                    continue;
                }
                let client = clients.get_mut(&id).unwrap();
                client.announced = true;
                client.slots = vec![None; threads.min(MAX_SLOTS) as usize];
                log::info!("worker {} offers {} slots", client.name, threads);
                if dispatch_to_client(&pending, client, config).is_err() {
                    kill_client(&pending, &mut clients, id);
                    dispatch_pending(&pending, &mut clients, config);
                }
            }
            Event::FromClient(id, WorkerMsg::Done { slot }) => {
                let finished = clients.get_mut(&id).and_then(|client| {
                    client
                        .slots
                        .get_mut(slot as usize)
                        .and_then(|s| s.take())
                        .map(|item| (item, client.name.clone()))
                });
                match finished {
                    Some((item, name)) => {
                        log::debug!("frame {} rendered by {}", item.frame, name);
                        outcomes[item.frame] = FrameOutcome::Remote(name);
                        resolved += 1;
                        let client = clients.get_mut(&id).unwrap();
                        if dispatch_to_client(&pending, client, config).is_err() {
                            kill_client(&pending, &mut clients, id);
                            dispatch_pending(&pending, &mut clients, config);
                        }
                    }
                    None => {
                        kill_client(&pending, &mut clients, id);
                        dispatch_pending(&pending, &mut clients, config);
                    }
                }
            }
            Event::ClientGone(id, err) => {
                if clients.contains_key(&id) {
                    log::warn!("worker connection {} lost: {}", id, err);
                    kill_client(&pending, &mut clients, id);
                    dispatch_pending(&pending, &mut clients, config);
                }
            }
            Event::LocalDone(frame) => {
                outcomes[frame] = FrameOutcome::Local;
                resolved += 1;
            }
            Event::LocalFailed(frame, message) => {
                log::error!("local render of frame {} failed: {}", frame, message);
                resolved += 1;
            }
        }
    }

    // nothing pending and nothing in flight: tear everything down
    shutdown.store(true, Ordering::SeqCst);
    pending.close();
    for (_, client) in clients.drain() {
        let mut stream = client.stream;
        let _ = proto::send_terminate(&mut stream);
        let _ = stream.shutdown(Shutdown::Both);
    }
    drop(tx);
    drop(rx);
    for handle in handles {
        let _ = handle.join();
    }

    if let Some(path) = &config.index_path {
        write_index(path, &outcomes).map_err(NetError::Io)?;
    }
    Ok(outcomes)
}

/// Split the connection: the read half feeds a reader thread, the write half
/// stays with the session in the event loop.
fn register_client(
    stream: TcpStream,
    id: usize,
    tx: &Sender<Event>,
) -> std::io::Result<ClientSession> {
    let name = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| format!("client-{}", id));
    let write_half = stream.try_clone()?;
    spawn_reader(id, stream, tx.clone());
    Ok(ClientSession {
        name,
        stream: write_half,
        slots: Vec::new(),
        announced: false,
    })
}

fn spawn_reader(id: usize, stream: TcpStream, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        loop {
            let msg =
                proto::read_line(&mut reader).and_then(|line| proto::parse_worker_msg(&line));
            match msg {
                Ok(msg) => {
                    if tx.send(Event::FromClient(id, msg)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Event::ClientGone(id, err));
                    return;
                }
            }
        }
    });
}

/// Fill every free slot with pending work.
fn dispatch_to_client(
    pending: &Pending,
    client: &mut ClientSession,
    config: &CoordinatorConfig,
) -> Result<(), ProtocolError> {
    for slot in 0..client.slots.len() {
        if client.slots[slot].is_some() {
            continue;
        }
        let item = match pending.pop() {
            Some(item) => item,
            None => return Ok(()),
        };
        let result = proto::send_render(
            &mut client.stream,
            slot as u32,
            item.frame as u32,
            config.width as u32,
            config.height as u32,
            &item.spec,
        );
        // record in-flight before checking: a failed send must requeue too
        client.slots[slot] = Some(item);
        result?;
    }
    Ok(())
}

/// Offer pending work to every announced client with free slots. Needed
/// whenever work returns to the list outside a client's own Moin/Done flow,
/// otherwise requeued frames would wait on clients that never speak again.
fn dispatch_pending(
    pending: &Pending,
    clients: &mut HashMap<usize, ClientSession>,
    config: &CoordinatorConfig,
) {
    let ids: Vec<usize> = clients.keys().copied().collect();
    for id in ids {
        let failed = match clients.get_mut(&id) {
            Some(client) if client.announced => {
                dispatch_to_client(pending, client, config).is_err()
            }
            _ => false,
        };
        if failed {
            kill_client(pending, clients, id);
        }
    }
}

/// Disconnect a client and return its in-flight work to the pending head.
fn kill_client(pending: &Pending, clients: &mut HashMap<usize, ClientSession>, id: usize) {
    if let Some(mut client) = clients.remove(&id) {
        log::warn!("disconnecting worker {}", client.name);
        let _ = client.stream.shutdown(Shutdown::Both);
        for slot in client.slots.iter_mut() {
            if let Some(item) = slot.take() {
                log::info!("requeueing frame {}", item.frame);
                pending.requeue_front(item);
            }
        }
    }
}

fn spawn_local_worker(
    pending: Arc<Pending>,
    tx: Sender<Event>,
    sink: Arc<dyn FrameSink>,
    config: CoordinatorConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Some(item) = pending.pop_wait() {
            let result = render_frame(&item.spec, config.width, config.height, config.strategy, 1)
                .map_err(|e| e.to_string())
                .and_then(|img| {
                    sink.write_frame(item.frame, &img).map_err(|e| e.to_string())
                });
            let event = match result {
                Ok(()) => Event::LocalDone(item.frame),
                Err(message) => Event::LocalFailed(item.frame, message),
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    })
}

fn spawn_acceptor(
    listener: TcpListener,
    tx: Sender<Event>,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if listener.set_nonblocking(true).is_err() {
            log::warn!("cannot poll listener; dropping network capability");
            return;
        }
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let _ = stream.set_nonblocking(false);
                    if tx.send(Event::Accepted(stream)).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(TICK);
                }
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    thread::sleep(TICK);
                }
            }
        }
    })
}

fn write_index(path: &PathBuf, outcomes: &[FrameOutcome]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for (frame, outcome) in outcomes.iter().enumerate() {
        writeln!(file, "{} {}", frame, outcome)?;
    }
    Ok(())
}
