//! # Call responder
//!
//! The worker side of a channel: executes incoming calls against a table of
//! named functions and answers each with exactly one result.
//!
//! ## Invariants
//!
//! - Every call gets an answer. An unknown name, a failing function and a
//!   panicking function all become error-flagged results; none of them stops
//!   the message loop.
//! - Transfers staged by a function travel only with its success result. On the
//!   error path they are dropped with the function's `Return`.
//! - Each call runs in its own task, so answers may go out in any order.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tetherwire::CallId;
use tetherwire::CallMessage;
use tetherwire::Envelope;
use tetherwire::Frame;
use tetherwire::ResultMessage;
use tetherwire::TransferSet;
use tetherwire::Value;

use crate::error::Error;
use crate::error::Result;
use crate::transport::Transport;
use crate::worker::WorkerScope;

/// One incoming call as seen by a function.
#[derive(Debug)]
pub struct Invocation {
    pub id: CallId,
    pub name: String,
    pub args: Vec<Value>,
    /// Objects the controller moved along with this call.
    pub transfers: TransferSet,
}

/// A function's successful answer.
#[derive(Debug)]
pub struct Return {
    pub value: Value,
    /// Objects to move back with the answer.
    pub transfers: TransferSet,
}

impl Return {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into(), transfers: TransferSet::new() }
    }

    pub fn with_transfers(value: impl Into<Value>, transfers: TransferSet) -> Self {
        Self { value: value.into(), transfers }
    }
}

impl From<Value> for Return {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

pub type HandlerFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Return, Value>> + Send + 'static>>;

/// A callable entry in a [`FunctionTable`].
///
/// `Err(value)` is the function's failure; `value` reaches the caller unchanged.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, invocation: Invocation) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Return, Value>> + Send + 'static,
{
    fn call(&self, invocation: Invocation) -> HandlerFuture {
        Box::pin(self(invocation))
    }
}

/// Named functions a worker exposes to its controller.
#[derive(Clone, Default)]
pub struct FunctionTable {
    funcs: HashMap<String, Arc<dyn Handler>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous function over plain arguments.
    pub fn func<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> std::result::Result<Value, Value> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.handler(name, move |invocation: Invocation| {
            let f = f.clone();
            async move { f(invocation.args).map(Return::from) }
        })
    }

    /// Registers an asynchronous function over plain arguments.
    pub fn async_func<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, Value>> + Send + 'static,
    {
        self.handler(name, move |invocation: Invocation| {
            let fut = f(invocation.args);
            async move { fut.await.map(Return::from) }
        })
    }

    /// Registers a full handler, which sees incoming transfers and can stage outgoing ones.
    pub fn handler<H: Handler>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.funcs.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTable").field("funcs", &self.names()).finish()
    }
}

/// Wires `table` to the current worker's channel and returns it.
///
/// Works from the worker entry and from any task it spawns on the worker
/// thread.
///
/// # Errors
///
/// Calling this anywhere but on a worker thread is a programming error. It is
/// logged at `error` level and reported as [`Error::OutsideWorker`]; callers
/// should treat it as fatal rather than retry. A second call in the same worker
/// fails with [`Error::AlreadyAttached`] and leaves the first table serving.
pub fn attach(table: FunctionTable) -> Result<FunctionTable> {
    let Some(scope) = WorkerScope::current() else {
        tracing::error!("attach called outside a worker");
        return Err(Error::OutsideWorker);
    };
    let transport = scope.take_transport().ok_or(Error::AlreadyAttached)?;

    tracing::info!(worker = scope.name(), functions = ?table.names(), "responder attached");
    scope.spawn_serving(serve(transport, table.clone()));

    Ok(table)
}

/// Answers calls arriving on `transport` until the controller goes away.
pub async fn serve(transport: Arc<dyn Transport>, table: FunctionTable) {
    let table = Arc::new(table);

    loop {
        match transport.recv().await {
            Ok(Some(envelope)) => {
                let Envelope { frame, transfers } = envelope;
                let call = match frame.into_call() {
                    Ok(call) => call,
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring frame");
                        continue;
                    }
                };

                let transport = transport.clone();
                let table = table.clone();
                tokio::spawn(async move {
                    let id = call.id;
                    let reply = respond(&table, call, TransferSet::from(transfers)).await;
                    if let Err(e) = transport.send(reply) {
                        tracing::debug!(%id, error = %e, "controller gone before answer");
                    }
                });
            }
            Ok(None) => {
                tracing::debug!("channel closed by controller");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport error in responder");
                break;
            }
        }
    }
}

/// Runs one call against `table` and builds its result envelope.
pub async fn respond(table: &FunctionTable, call: CallMessage, transfers: TransferSet) -> Envelope {
    let CallMessage { id, name, args } = call;

    let Some(handler) = table.get(&name).cloned() else {
        tracing::warn!(%id, name = %name, "call to unknown function");
        let reason = Value::String(format!("function not found: {}", name));
        return ResultMessage::err(id, reason).into();
    };

    let invocation = Invocation { id, name: name.clone(), args, transfers };
    let outcome = AssertUnwindSafe(async move { handler.call(invocation).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(Return { value, mut transfers })) => {
            tracing::debug!(%id, name = %name, "call answered");
            let result = Frame::Result(ResultMessage::ok(id, value));
            Envelope::with_transfers(result, transfers.drain_and_reset())
        }
        Ok(Err(value)) => {
            tracing::debug!(%id, name = %name, error = %value, "call failed");
            ResultMessage::err(id, value).into()
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(%id, name = %name, panic = message, "function panicked");
            let reason = Value::String(format!("function '{}' panicked: {}", name, message));
            ResultMessage::err(id, reason).into()
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
