//! Error taxonomy.
//!
//! Configuration errors abort before a render starts; resource errors degrade
//! the affected capability; protocol violations are fatal to one connection
//! only; invariant violations are defects and are surfaced loudly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("magnification must be positive, got {0}")]
    BadMagnification(f64),

    #[error("power must be at least 2, got {0}")]
    BadPower(u32),

    #[error("max_iterations must be positive")]
    ZeroIterations,

    #[error("image dimensions must be nonzero, got {0}x{1}")]
    BadDimensions(usize, usize),

    #[error("log representation base must be greater than 1, got {0}")]
    BadLogBase(f64),

    #[error("no local threads and no network listener; nothing can render")]
    NoCapacity,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("line exceeds {0} bytes")]
    OverlongLine(usize),

    #[error("unknown keyword {0:?}")]
    UnknownKeyword(String),

    #[error("malformed {field} in {keyword} message")]
    MalformedField {
        keyword: &'static str,
        field: &'static str,
    },

    #[error("message {0:?} not valid in current session state")]
    UnexpectedMessage(String),

    #[error("render body is not a valid fractal spec: {0}")]
    BadBody(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("failed to connect to coordinator at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write frame {frame}: {source}")]
    Sink {
        frame: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Net(#[from] NetError),
}
