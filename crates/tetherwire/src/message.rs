//! # Protocol messages
//!
//! Defines the two frame shapes (Call vs Result) and the envelope that carries
//! a frame together with its move-only transfers.
//!
//! ## Invariants
//! - A `ResultMessage` always echoes the `CallId` of the call it answers.
//! - `is_error` selects the branch; the `value` is passed through untouched.

use crate::error::Error;
use crate::error::Result;
use crate::transfer::Transfer;
use crate::value::Value;

/// Pairs one outgoing call with its one result on a channel.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Controller -> worker: run `name` with `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMessage {
    pub id: CallId,
    pub name: String,
    pub args: Vec<Value>,
}

impl CallMessage {
    pub fn new(id: CallId, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self { id, name: name.into(), args }
    }
}

/// Worker -> controller: the outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    pub id: CallId,
    pub value: Value,
    pub is_error: bool,
}

impl ResultMessage {
    pub fn ok(id: CallId, value: Value) -> Self {
        Self { id, value, is_error: false }
    }

    pub fn err(id: CallId, value: Value) -> Self {
        Self { id, value, is_error: true }
    }

    /// Splits the message into success or failure payload.
    pub fn into_result(self) -> std::result::Result<Value, Value> {
        if self.is_error { Err(self.value) } else { Ok(self.value) }
    }
}

/// The only two things that ever travel on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call(CallMessage),
    Result(ResultMessage),
}

impl Frame {
    pub fn id(&self) -> CallId {
        match self {
            Self::Call(call) => call.id,
            Self::Result(result) => result.id,
        }
    }

    /// Expects a call frame; a result here means the peer is confused about its role.
    pub fn into_call(self) -> Result<CallMessage> {
        match self {
            Self::Call(call) => Ok(call),
            Self::Result(result) => Err(Error::ProtocolViolation(format!(
                "received result for {} where a call was expected",
                result.id
            ))),
        }
    }

    /// Expects a result frame; a call here means the peer is confused about its role.
    pub fn into_result(self) -> Result<ResultMessage> {
        match self {
            Self::Result(result) => Ok(result),
            Self::Call(call) => Err(Error::ProtocolViolation(format!(
                "received call '{}' ({}) where a result was expected",
                call.name, call.id
            ))),
        }
    }
}

/// One message on the channel: a frame plus the objects moved along with it.
#[derive(Debug)]
pub struct Envelope {
    pub frame: Frame,
    pub transfers: Vec<Transfer>,
}

impl Envelope {
    pub fn new(frame: Frame) -> Self {
        Self { frame, transfers: Vec::new() }
    }

    pub fn with_transfers(frame: Frame, transfers: Vec<Transfer>) -> Self {
        Self { frame, transfers }
    }
}

impl From<CallMessage> for Envelope {
    fn from(call: CallMessage) -> Self {
        Self::new(Frame::Call(call))
    }
}

impl From<ResultMessage> for Envelope {
    fn from(result: ResultMessage) -> Self {
        Self::new(Frame::Result(result))
    }
}
