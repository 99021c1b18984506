//! The controller-side handle to a call that has been sent but not answered.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tetherwire::CallId;
use tetherwire::TransferSet;
use tetherwire::Value;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::error::Result;

/// A successful answer together with whatever the worker moved back.
#[derive(Debug)]
pub struct Settled {
    pub value: Value,
    pub transfers: TransferSet,
}

pub(crate) type Completion = Result<Settled>;

/// A remote call in flight.
///
/// Awaiting it yields the result value. Use [`Deferred::settled`] when the
/// worker also moves objects back. Dropping it does not cancel the remote
/// call; the answer is simply discarded when it arrives.
#[derive(Debug)]
pub struct Deferred {
    id: Option<CallId>,
    state: State,
}

#[derive(Debug)]
enum State {
    Waiting(oneshot::Receiver<Completion>),
    Failed(Option<Error>),
}

impl Deferred {
    pub(crate) fn waiting(id: CallId, rx: oneshot::Receiver<Completion>) -> Self {
        Self { id: Some(id), state: State::Waiting(rx) }
    }

    /// A deferred that was rejected before anything reached the channel.
    pub(crate) fn failed(id: Option<CallId>, error: Error) -> Self {
        Self { id, state: State::Failed(Some(error)) }
    }

    /// The id this call was registered under, if it got that far.
    pub fn id(&self) -> Option<CallId> {
        self.id
    }

    /// Waits for the answer, keeping the transfers that came with it.
    pub async fn settled(mut self) -> Result<Settled> {
        std::future::poll_fn(|cx| self.poll_settled(cx)).await
    }

    fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<Result<Settled>> {
        match &mut self.state {
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(completion)) => Poll::Ready(completion),
                // The ledger entry was dropped without an answer.
                Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ChannelClosed)),
                Poll::Pending => Poll::Pending,
            },
            State::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(Error::ChannelClosed)))
            }
        }
    }
}

impl Future for Deferred {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut()
            .poll_settled(cx)
            .map(|completion| completion.map(|settled| settled.value))
    }
}
