//! # Remote call proxy with async pump
//!
//! This module provides the `Peer`, the controller side of one channel. It turns
//! "call `name` with `args`" into a `Deferred` and uses an async pump task to
//! demultiplex incoming results onto the pending calls recorded in its ledger.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tetherwire::CallMessage;
use tetherwire::Envelope;
use tetherwire::Frame;
use tetherwire::TransferSet;
use tetherwire::Value;
use tokio::task::JoinHandle;

use crate::deferred::Deferred;
use crate::error::Error;
use crate::interface::Remote;
use crate::ledger::Ledger;
use crate::transport::Transport;

/// Controller end of one channel.
///
/// The peer spawns a background task that continuously reads from the transport
/// and routes results to the matching pending call by id.
///
/// Each Peer owns its transport exclusively, so call ids are scoped to a single
/// channel. When the channel ends, for whatever reason, every call still
/// outstanding is rejected with [`Error::ChannelClosed`].
pub struct Peer {
    peer_name: String,
    transport: Arc<dyn Transport>,
    ledger: Arc<Ledger>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl Peer {
    /// Creates a new peer and spawns the background pump task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(peer_name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self::with_ledger(peer_name, transport, Ledger::new())
    }

    /// Like [`Peer::new`], with a caller-supplied ledger.
    pub(crate) fn with_ledger(
        peer_name: impl Into<String>,
        transport: Box<dyn Transport>,
        ledger: Ledger,
    ) -> Self {
        let peer_name = peer_name.into();
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let ledger = Arc::new(ledger);
        let closed = Arc::new(AtomicBool::new(false));

        let pump = tokio::spawn(Self::pump(
            peer_name.clone(),
            transport.clone(),
            ledger.clone(),
            closed.clone(),
        ));

        Self { peer_name, transport, ledger, closed, pump }
    }

    /// Returns the name used for this peer in logs.
    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// Number of calls sent and not yet answered.
    pub fn outstanding(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a call and returns immediately.
    ///
    /// The name is not checked here; an unknown name is rejected by the worker.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Deferred {
        self.invoke_with(name, args, TransferSet::new())
    }

    /// Sends a call carrying the objects staged in `transfers`.
    ///
    /// Registering, draining the staged set and sending happen without any
    /// suspension in between.
    pub fn invoke_with(&self, name: &str, args: Vec<Value>, mut transfers: TransferSet) -> Deferred {
        if self.is_closed() {
            return Deferred::failed(None, Error::ChannelClosed);
        }

        let (id, rx) = self.ledger.register(name);
        let call = CallMessage::new(id, name, args);
        let envelope = Envelope::with_transfers(Frame::Call(call), transfers.drain_and_reset());

        if let Err(e) = self.transport.send(envelope) {
            tracing::warn!(peer = %self.peer_name, %id, name, error = %e, "send failed");
            self.ledger.withdraw(id, e.into());
        } else {
            tracing::debug!(peer = %self.peer_name, %id, name, "call sent");
        }

        // Teardown flips the flag before sweeping the ledger. An entry that
        // raced past the first check is withdrawn here instead of hanging.
        if self.is_closed() {
            self.ledger.withdraw(id, Error::ChannelClosed);
        }

        Deferred::waiting(id, rx)
    }

    /// Tears the channel down and rejects every outstanding call.
    ///
    /// Idempotent. Later invocations reject immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.close();
        self.pump.abort();
        let rejected = self.ledger.reject_all(Error::ChannelClosed);
        tracing::debug!(peer = %self.peer_name, rejected, "peer closed");
    }

    async fn pump(
        peer_name: String,
        transport: Arc<dyn Transport>,
        ledger: Arc<Ledger>,
        closed: Arc<AtomicBool>,
    ) {
        loop {
            match transport.recv().await {
                Ok(Some(envelope)) => {
                    let Envelope { frame, transfers } = envelope;
                    let result = match frame.into_result() {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!(peer = %peer_name, error = %e, "ignoring frame");
                            continue;
                        }
                    };
                    let id = result.id;
                    if !ledger.settle(result, TransferSet::from(transfers)) {
                        tracing::warn!(peer = %peer_name, %id, "dropping result for unknown call");
                    }
                }
                Ok(None) => {
                    tracing::debug!(peer = %peer_name, "channel closed by worker");
                    break;
                }
                Err(e) => {
                    tracing::warn!(peer = %peer_name, error = %e, "transport error in pump");
                    break;
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        let rejected = ledger.reject_all(Error::ChannelClosed);
        if rejected > 0 {
            tracing::warn!(peer = %peer_name, rejected, "rejected calls orphaned by closed channel");
        }
    }
}

impl Remote for Peer {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        self.invoke_with(name, args, transfers)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.close();
    }
}
