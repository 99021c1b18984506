//! # Transport Abstraction
//!
//! A minimal, duplex interface for moving envelopes between a controller and a worker.
//!
//! ## Philosophy
//!
//! - **Value-Oriented**: The Transport moves `Envelope`s as they are. It knows
//!   nothing about correlation; that lives in the ledger.
//! - **Fire and Receive**: Sending never waits. Receiving is the only suspension
//!   point, and it belongs to exactly one pump task per endpoint.
//! - **Order per Direction**: Envelopes sent on one side arrive on the other in
//!   send order. Nothing is promised across directions.

use std::sync::Arc;
use std::sync::Mutex;

use tetherwire::Envelope;
use tokio::sync::mpsc;

/// Errors that occur at the channel layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The other side went away while the message was in flight.
    ConnectionLost(String),
    /// This side was closed locally.
    Closed,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Closed => write!(f, "Transport closed"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// One end of a duplex message channel.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Queues an envelope for the other side and returns immediately.
    ///
    /// # invariants
    /// - Must not suspend; staging and sending happen in one uninterrupted step.
    /// - Must return `Err` once the other side is gone or `close` was called.
    fn send(&self, envelope: Envelope) -> Result<()>;

    /// Waits for the next envelope from the other side.
    ///
    /// Returns `Ok(None)` once the other side has closed and everything it sent
    /// has been drained.
    async fn recv(&self) -> Result<Option<Envelope>>;

    /// Stops sending. The other side observes end-of-stream after draining.
    fn close(&self) {}
}

/// A duplex channel built from two unbounded tokio mpsc queues.
///
/// Messages sent on one half appear on the other half's `recv` and vice versa.
pub struct DuplexTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

impl DuplexTransport {
    /// Creates a transport from separate tx and rx halves.
    pub fn new(
        tx: mpsc::UnboundedSender<Envelope>,
        rx: mpsc::UnboundedReceiver<Envelope>,
    ) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    /// Creates a pair of transports connected to each other.
    ///
    /// Messages sent on `a` are received by `b` and vice versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (Self::new(tx_a, rx_b), Self::new(tx_b, rx_a))
    }
}

#[async_trait::async_trait]
impl Transport for DuplexTransport {
    fn send(&self, envelope: Envelope) -> Result<()> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(Error::Closed);
        };
        tx.send(envelope)
            .map_err(|_| Error::ConnectionLost("receiver dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Envelope>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}
