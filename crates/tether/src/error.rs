//! Errors surfaced to controller and worker code.

use tetherwire::Value;

use crate::transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The channel refused the message.
    Transport(transport::Error),
    /// A message or value did not have the expected shape.
    Wire(tetherwire::Error),
    /// The remote function failed; the payload is exactly what it failed with.
    Remote(Value),
    /// The channel closed while the call was outstanding, or before it was sent.
    ChannelClosed,
    /// `attach` was called somewhere other than inside a worker.
    OutsideWorker,
    /// `attach` was called a second time in the same worker.
    AlreadyAttached,
    /// A router needs at least one target.
    EmptyPool,
    /// The worker thread could not be started.
    Spawn(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Wire(e) => write!(f, "Wire error: {}", e),
            Self::Remote(value) => write!(f, "Remote failure: {}", value),
            Self::ChannelClosed => write!(f, "Channel closed"),
            Self::OutsideWorker => write!(f, "Responder can only be attached inside a worker"),
            Self::AlreadyAttached => write!(f, "A responder is already attached to this worker"),
            Self::EmptyPool => write!(f, "Pool has no workers"),
            Self::Spawn(msg) => write!(f, "Failed to spawn worker: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<tetherwire::Error> for Error {
    fn from(e: tetherwire::Error) -> Self {
        Self::Wire(e)
    }
}

impl Error {
    /// The failure payload of a remote error, if this is one.
    pub fn remote_value(&self) -> Option<&Value> {
        match self {
            Self::Remote(value) => Some(value),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
