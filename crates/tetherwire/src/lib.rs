//! # Tetherwire
//!
//! The two message shapes that travel between a controller and a worker,
//! and the values they carry.
//!
//! ## Philosophy
//!
//! - **Two Shapes**: A `CallMessage` goes controller -> worker, a `ResultMessage`
//!   comes back. Everything else is orchestration around these.
//! - **Native Values**: The channel moves Rust values, so there is no byte codec.
//!   Payloads are dynamic `Value`s, modelled after component-model values.
//! - **Explicit Moves**: Objects that must be moved rather than copied ride in a
//!   side list of `Transfer`s, staged per call in a `TransferSet`.

pub mod error;
pub mod message;
pub mod transfer;
pub mod value;

mod macros;

pub use error::Error;
pub use error::Result;
pub use message::CallId;
pub use message::CallMessage;
pub use message::Envelope;
pub use message::Frame;
pub use message::ResultMessage;
pub use transfer::Transfer;
pub use transfer::TransferSet;
pub use value::Value;
