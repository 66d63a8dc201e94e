//! Work distribution: a coordinator hands whole animation frames to local
//! threads and, optionally, to worker processes over TCP.

use std::io;
use std::path::PathBuf;

use image::RgbImage;

use crate::spec::FractalSpec;

pub mod coordinator;
pub mod proto;
pub mod worker;

/// One renderable unit: a frame of the animation. Owned by exactly one
/// place at a time: the pending list, a client's in-flight slot, or a local
/// worker currently rendering it.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkItem {
    pub frame: usize,
    pub spec: FractalSpec,
}

/// Who rendered a frame, for the per-frame index file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    NotDone,
    Local,
    Remote(String),
}

impl std::fmt::Display for FrameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameOutcome::NotDone => write!(f, "<NOT DONE>"),
            FrameOutcome::Local => write!(f, "<LOCAL>"),
            FrameOutcome::Remote(name) => write!(f, "{}", name),
        }
    }
}

/// Where finished frames go. The coordinator uses it for locally rendered
/// frames; worker processes use it for everything they render.
pub trait FrameSink: Send + Sync {
    fn write_frame(&self, frame: usize, image: &RgbImage) -> io::Result<()>;
}

/// Writes `frame_NNNNN.png` files into a directory.
pub struct PngDirSink {
    dir: PathBuf,
}

impl PngDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FrameSink for PngDirSink {
    fn write_frame(&self, frame: usize, image: &RgbImage) -> io::Result<()> {
        let path = self.dir.join(format!("frame_{:05}.png", frame));
        image
            .save(&path)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Produces the spec for each frame index.
pub type FrameGenerator = Box<dyn Fn(usize) -> FractalSpec + Send>;
