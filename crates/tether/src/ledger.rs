//! # Ledger of outstanding calls
//!
//! The Ledger is the correlation table of one channel endpoint. It maps every
//! `CallId` that has been sent but not yet answered to the one-shot slot its
//! caller is waiting on.
//!
//! ## Philosophy
//!
//! - **Insert Before Send**: An entry exists before its call can reach the worker,
//!   so an answer can never arrive for an id the ledger does not know yet.
//! - **Match by Id**: Results are paired strictly by id, never by arrival order.
//! - **Exactly Once**: An entry is removed before it is completed, so no answer
//!   and no teardown can complete it twice.
//!
//! Ids come from a per-ledger counter. It wraps around at `u64::MAX` and skips
//! ids that are still outstanding, so two live calls never share an id.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tetherwire::CallId;
use tetherwire::ResultMessage;
use tetherwire::TransferSet;
use tokio::sync::oneshot;

use crate::deferred::Completion;
use crate::deferred::Settled;
use crate::error::Error;

struct PendingCall {
    name: String,
    tx: oneshot::Sender<Completion>,
}

/// Correlation table for one channel.
pub struct Ledger {
    pending: DashMap<CallId, PendingCall>,
    next: AtomicU64,
}

impl Ledger {
    /// Creates an empty ledger with ids starting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty ledger whose first id is `first`.
    pub(crate) fn starting_at(first: u64) -> Self {
        Self {
            pending: DashMap::new(),
            next: AtomicU64::new(first),
        }
    }

    /// Allocates a fresh id and records a pending call under it.
    pub(crate) fn register(&self, name: &str) -> (CallId, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let pending = PendingCall { name: name.to_string(), tx };

        loop {
            // fetch_add wraps on overflow.
            let id = CallId(self.next.fetch_add(1, Ordering::Relaxed));
            match self.pending.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(pending);
                    return (id, rx);
                }
                Entry::Occupied(_) => {
                    tracing::debug!(%id, "call id still outstanding after wraparound, skipping");
                }
            }
        }
    }

    /// Completes the pending call matching `result`.
    ///
    /// Returns `false` if no call with that id is outstanding; the result is dropped.
    pub(crate) fn settle(&self, result: ResultMessage, transfers: TransferSet) -> bool {
        let Some((id, pending)) = self.pending.remove(&result.id) else {
            return false;
        };

        let completion = match result.into_result() {
            Ok(value) => Ok(Settled { value, transfers }),
            Err(value) => Err(Error::Remote(value)),
        };

        tracing::debug!(%id, name = %pending.name, ok = completion.is_ok(), "call settled");
        // The caller may have dropped its deferred; nobody to tell then.
        let _ = pending.tx.send(completion);
        true
    }

    /// Removes one pending call and rejects it with `error`.
    pub(crate) fn withdraw(&self, id: CallId, error: Error) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            return false;
        };
        let _ = pending.tx.send(Err(error));
        true
    }

    /// Rejects every outstanding call with `error` and empties the ledger.
    pub(crate) fn reject_all(&self, error: Error) -> usize {
        let ids: Vec<CallId> = self.pending.iter().map(|e| *e.key()).collect();
        let mut rejected = 0;
        for id in ids {
            if self.withdraw(id, error.clone()) {
                rejected += 1;
            }
        }
        rejected
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
