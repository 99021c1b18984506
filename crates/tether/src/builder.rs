//! # Worker and Pool Builders
//!
//! Provides a fluent API for configuring workers before they are started.

use std::future::Future;

use crate::error::Error;
use crate::error::Result;
use crate::pool::Pool;
use crate::pool::default_pool_size;
use crate::worker::Worker;

/// Fluent builder for a single worker.
#[derive(Debug, Clone)]
pub struct WorkerBuilder {
    name: String,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self { name: "tether-worker".to_string() }
    }

    /// Name of the worker thread, also used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn spawn<F, Fut, E>(self, entry: F) -> Result<Worker>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + 'static,
        E: std::fmt::Display + 'static,
    {
        Worker::spawn_named(self.name, entry)
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for a pool of workers.
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    name: String,
    size: Option<usize>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self { name: "tether-pool".to_string(), size: None }
    }

    /// Prefix for worker names; worker `i` is called `<name>-<i>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of workers. Defaults to the host's available parallelism.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Starts the workers, worker `i` running `factory(i)`.
    ///
    /// If any worker fails to start, the ones already started are terminated.
    pub fn spawn<F, Fut, E>(self, factory: F) -> Result<Pool>
    where
        F: Fn(usize) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + 'static,
        E: std::fmt::Display + 'static,
    {
        let size = self.size.unwrap_or_else(default_pool_size);
        if size == 0 {
            return Err(Error::EmptyPool);
        }

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let factory = factory.clone();
            let name = format!("{}-{}", self.name, index);
            workers.push(Worker::spawn_named(name, move || factory(index))?);
        }

        tracing::info!(pool = %self.name, size, "pool spawned");
        Pool::from_workers(workers)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
