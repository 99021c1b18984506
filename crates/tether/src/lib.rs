//! # Tether
//!
//! Call functions that run inside worker threads and await their results as if
//! they were local.
//!
//! ## Architecture
//!
//! - [`peer::Peer`] is the controller end of one channel. It registers every
//!   call in its [`ledger::Ledger`] before sending, and a pump task pairs
//!   incoming results with pending calls by id.
//! - [`responder`] is the worker end: it runs calls against a
//!   [`FunctionTable`] and answers each one exactly once, failures included.
//! - [`pool::Router`] spreads calls round-robin over several channels.
//! - Objects that must be moved rather than copied are staged per call in a
//!   [`TransferSet`].

pub mod builder;
pub mod deferred;
pub mod error;
pub mod interface;
pub mod ledger;
pub mod peer;
pub mod pool;
pub mod responder;
pub mod transport;
pub mod worker;

pub use builder::PoolBuilder;
pub use builder::WorkerBuilder;
pub use deferred::Deferred;
pub use deferred::Settled;
pub use error::Error;
pub use error::Result;
pub use interface::Remote;
pub use peer::Peer;
pub use pool::Pool;
pub use pool::Router;
pub use responder::FunctionTable;
pub use responder::Invocation;
pub use responder::Return;
pub use responder::attach;
pub use worker::Worker;

pub use tetherwire::CallId;
pub use tetherwire::Transfer;
pub use tetherwire::TransferSet;
pub use tetherwire::Value;
pub use tetherwire::args;

#[cfg(test)]
mod tests;
