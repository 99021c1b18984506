//! # Round-robin pools
//!
//! A [`Router`] presents N independent targets as one [`Remote`]. Each call
//! goes to the next target in turn, regardless of the function name, and is
//! correlated on that target's own channel. The router itself keeps nothing
//! but the index of the next target.
//!
//! The target is picked and the call dispatched in one synchronous step, so a
//! tight loop of calls spreads across the pool instead of piling onto the
//! target that happened to be current when the loop started.

use std::num::NonZeroUsize;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tetherwire::TransferSet;
use tetherwire::Value;

use crate::deferred::Deferred;
use crate::error::Error;
use crate::error::Result;
use crate::interface::Remote;
use crate::worker::Worker;

/// Round-robin dispatch over a fixed set of targets.
pub struct Router<T> {
    targets: Vec<T>,
    next: AtomicUsize,
}

impl<T: Remote> Router<T> {
    pub fn new(targets: Vec<T>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::EmptyPool);
        }
        Ok(Self { targets, next: AtomicUsize::new(0) })
    }

    pub fn route(&self, name: &str, args: Vec<Value>) -> Deferred {
        self.route_with(name, args, TransferSet::new())
    }

    /// Sends the call to the current target and advances the index.
    pub fn route_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        let idx = self.advance();
        tracing::trace!(target_index = idx, name, "routing call");
        self.targets[idx].call_with(name, args, transfers)
    }

    /// Index of the target the next call will go to.
    pub fn index(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> &[T] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Claims the current index and moves it on, mod N.
    fn advance(&self) -> usize {
        let n = self.targets.len();
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % n))
            .unwrap_or_else(|i| i)
    }
}

impl<T: Remote> Remote for Router<T> {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        self.route_with(name, args, transfers)
    }
}

/// The host's available parallelism, or 1 when it cannot be determined.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// A fixed set of workers behind one round-robin [`Router`].
pub struct Pool {
    router: Router<Worker>,
}

impl Pool {
    /// Starts `size` workers (default: available parallelism), worker `i` running `factory(i)`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut, E>(size: Option<usize>, factory: F) -> Result<Self>
    where
        F: Fn(usize) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future<Output = std::result::Result<(), E>> + 'static,
        E: std::fmt::Display + 'static,
    {
        let mut builder = crate::builder::PoolBuilder::new();
        if let Some(size) = size {
            builder = builder.size(size);
        }
        builder.spawn(factory)
    }

    pub(crate) fn from_workers(workers: Vec<Worker>) -> Result<Self> {
        Ok(Self { router: Router::new(workers)? })
    }

    /// The worker handles, in routing order.
    pub fn workers(&self) -> &[Worker] {
        self.router.targets()
    }

    pub fn size(&self) -> usize {
        self.router.len()
    }

    /// Index of the worker the next call will go to.
    pub fn index(&self) -> usize {
        self.router.index()
    }

    pub fn router(&self) -> &Router<Worker> {
        &self.router
    }

    /// Terminates every worker in the pool.
    pub fn terminate(&self) {
        for worker in self.workers() {
            worker.terminate();
        }
    }
}

impl Remote for Pool {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        self.router.route_with(name, args, transfers)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use tetherwire::args;

    use super::*;

    /// Records which target each call landed on, by target id.
    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<(usize, String)>>>,
    }

    impl Remote for Recorder {
        fn call_with(&self, name: &str, _args: Vec<Value>, _transfers: TransferSet) -> Deferred {
            self.log.lock().unwrap().push((self.id, name.to_string()));
            Deferred::failed(None, Error::ChannelClosed)
        }
    }

    fn router(width: usize) -> (Router<Recorder>, Arc<Mutex<Vec<(usize, String)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let targets = (0..width).map(|id| Recorder { id, log: log.clone() }).collect();
        (Router::new(targets).unwrap(), log)
    }

    #[test]
    fn calls_cycle_through_targets_in_order() {
        let (router, log) = router(3);
        for _ in 0..7 {
            let _ = router.route("f", args![]);
        }
        let landed: Vec<usize> = log.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(landed, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn index_is_call_count_mod_width() {
        for width in 1..5 {
            for calls in 0..12 {
                let (router, _) = router(width);
                for _ in 0..calls {
                    let _ = router.route("f", args![]);
                }
                assert_eq!(router.index(), calls % width);
            }
        }
    }

    #[test]
    fn distribution_ignores_function_name() {
        let (router, log) = router(2);
        let _ = router.route("a", args![]);
        let _ = router.route("a", args![]);
        let _ = router.route("b", args![]);
        assert_eq!(*log.lock().unwrap(), vec![
            (0, "a".to_string()),
            (1, "a".to_string()),
            (0, "b".to_string()),
        ]);
    }

    #[test]
    fn deferreds_are_bound_before_they_are_awaited() {
        let (router, log) = router(4);
        let batch: Vec<Deferred> = (0..4).map(|_| router.route("f", args![])).collect();
        // Every call was dispatched during the loop, one per target.
        let landed: Vec<usize> = log.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(landed, vec![0, 1, 2, 3]);
        drop(batch);
    }

    #[test]
    fn empty_router_is_rejected() {
        assert!(matches!(Router::<Recorder>::new(Vec::new()), Err(Error::EmptyPool)));
    }

    #[test]
    fn default_size_is_positive() {
        assert!(default_pool_size() >= 1);
    }
}
