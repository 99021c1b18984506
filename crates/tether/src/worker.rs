//! # Workers
//!
//! A worker is an execution unit on its own OS thread, driven by a
//! single-threaded tokio runtime and connected to the controller by one
//! duplex channel. The controller keeps a [`Worker`] handle; the worker thread
//! carries a thread-local scope, which is what [`attach`](crate::attach)
//! checks for. Every task on the worker's runtime sees the same scope.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use tetherwire::TransferSet;
use tetherwire::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::deferred::Deferred;
use crate::error::Error;
use crate::error::Result;
use crate::interface::Remote;
use crate::peer::Peer;
use crate::transport::DuplexTransport;
use crate::transport::Transport;

thread_local! {
    /// Set for the lifetime of a worker thread, empty everywhere else.
    static SCOPE: RefCell<Option<WorkerScope>> = const { RefCell::new(None) };
}

/// The worker's view of its own channel, reachable from anywhere on the worker thread.
#[derive(Clone)]
pub(crate) struct WorkerScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    name: String,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    serving: Mutex<Option<JoinHandle<()>>>,
    stopped: Notify,
}

impl WorkerScope {
    fn new(name: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name,
                transport: Mutex::new(Some(transport)),
                serving: Mutex::new(None),
                stopped: Notify::new(),
            }),
        }
    }

    /// The scope of the worker thread we are running on, if any.
    pub(crate) fn current() -> Option<Self> {
        SCOPE.with(|scope| scope.borrow().clone())
    }

    fn enter(&self) {
        SCOPE.with(|scope| *scope.borrow_mut() = Some(self.clone()));
    }

    fn leave() {
        SCOPE.with(|scope| scope.borrow_mut().take());
    }

    pub(crate) fn name(&self) -> &str {
        &self.inner.name
    }

    /// Hands out the channel once; a second taker gets `None`.
    pub(crate) fn take_transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner.transport.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Runs the message loop on the worker's runtime. When it ends the worker
    /// stops waiting on its entry.
    pub(crate) fn spawn_serving<F>(&self, serve: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let scope = self.clone();
        let handle = tokio::spawn(async move {
            serve.await;
            scope.inner.stopped.notify_one();
        });
        *self.inner.serving.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    fn take_serving(&self) -> Option<JoinHandle<()>> {
        self.inner.serving.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn stopped(&self) {
        self.inner.stopped.notified().await;
    }
}

/// Controller handle to one worker.
///
/// Owns the controller end of the worker's channel, and with it the ledger of
/// calls outstanding on that channel. Dropping the handle terminates the worker.
pub struct Worker {
    name: String,
    peer: Peer,
    thread: std::thread::JoinHandle<()>,
}

impl Worker {
    /// Starts a worker running `entry`, with default settings.
    ///
    /// `entry` runs on the worker thread. It is expected to call
    /// [`attach`](crate::attach) with the functions it exposes; once it returns,
    /// the worker keeps answering calls until the controller terminates it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut, E>(entry: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + 'static,
        E: std::fmt::Display + 'static,
    {
        crate::builder::WorkerBuilder::new().spawn(entry)
    }

    pub(crate) fn spawn_named<F, Fut, E>(name: String, entry: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + 'static,
        E: std::fmt::Display + 'static,
    {
        let (controller_end, worker_end) = DuplexTransport::pair();
        let worker_end: Arc<dyn Transport> = Arc::new(worker_end);

        let thread_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(thread_name, worker_end, entry))
            .map_err(|e| Error::Spawn(e.to_string()))?;

        let peer = Peer::new(name.clone(), Box::new(controller_end));
        tracing::info!(worker = %name, "worker spawned");

        Ok(Self { name, peer, thread })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controller end of this worker's channel.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Closes the channel. Outstanding calls reject with [`Error::ChannelClosed`]
    /// and the worker thread winds down once it notices.
    pub fn terminate(&self) {
        if !self.peer.is_closed() {
            tracing::info!(worker = %self.name, outstanding = self.peer.outstanding(), "terminating worker");
        }
        self.peer.close();
    }

    pub fn is_terminated(&self) -> bool {
        self.peer.is_closed()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

impl Remote for Worker {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        self.peer.invoke_with(name, args, transfers)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("outstanding", &self.peer.outstanding())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Body of the worker thread.
fn run<F, Fut, E>(name: String, transport: Arc<dyn Transport>, entry: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(worker = %name, error = %e, "failed to build worker runtime");
            transport.close();
            return;
        }
    };

    let scope = WorkerScope::new(name.clone(), transport.clone());
    scope.enter();
    runtime.block_on(async {
        tokio::select! {
            outcome = entry() => {
                if let Err(e) = outcome {
                    tracing::error!(worker = %name, error = %e, "worker entry failed");
                }
                match scope.take_serving() {
                    Some(serving) => {
                        let _ = serving.await;
                    }
                    None => tracing::warn!(worker = %name, "worker exited without attaching a responder"),
                }
            }
            // The controller went away while the entry was still running.
            _ = scope.stopped() => {
                tracing::debug!(worker = %name, "channel closed, dropping worker entry");
            }
        }
    });
    drop(runtime);
    WorkerScope::leave();

    transport.close();
    tracing::debug!(worker = %name, "worker thread exiting");
}
